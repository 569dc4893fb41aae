pub mod dialog;
pub mod distributor;
pub mod endpoint;
pub mod message;
pub mod module;
pub mod services;
pub mod transaction;

pub use dialog::Dialog;
pub use distributor::{Distributor, DistributorBuilder};
pub use endpoint::{AuthKind, SipAuth, SipEndpoint};
pub use message::{RxData, TxData};
pub use module::{
    ModuleAction, ModuleRegistry, PRIORITY_APPLICATION, PRIORITY_DIALOG_USAGE,
    PRIORITY_TRANSPORT_LAYER, PRIORITY_TSX_LAYER, PRIORITY_UA_PROXY_LAYER, SipModule,
};
pub use services::{
    AuthVerdict, AuthVerifier, EndpointResolver, NoopSecurityReporter, SecurityReporter, SipStack,
};
pub use transaction::{Transaction, TransactionKey, TransactionRole};
