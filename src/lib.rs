//! Inbound dispatch stage for a SIP stack.
//! This crate turns the fan-in of parsed messages arriving on transport
//! threads into per-conversation FIFO streams: every message is routed to a
//! named serializer by dialog, transaction, or hash affinity, unidentified
//! senders are pinned to a synthetic endpoint, and authentication is
//! enforced before anything reaches the application.

pub mod config;
pub mod error;
pub mod serializer;
pub mod sip;

pub use config::DistributorConfig;
pub use error::{Error, Result};
pub use serializer::{Serializer, SerializerRegistry, current_serializer_name};
pub use sip::{
    AuthKind, AuthVerdict, AuthVerifier, Dialog, Distributor, DistributorBuilder,
    EndpointResolver, ModuleAction, ModuleRegistry, NoopSecurityReporter, RxData,
    SecurityReporter, SipAuth, SipEndpoint, SipModule, SipStack, Transaction, TransactionKey,
    TransactionRole, TxData,
};
