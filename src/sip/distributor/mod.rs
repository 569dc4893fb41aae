//! Inbound request distribution.
//!
//! Three modules cooperate on the inbound path: the distributor proper picks
//! a serializer for every message and re-queues it, the endpoint identifier
//! resolves who sent it, and the authenticator gates it. The outbound hook
//! records serializer names on transmitted requests so responses can be
//! routed back to the serializer that sent them.

mod authenticate;
mod builder;
mod dispatch;
mod identify;
mod state;
mod utils;

#[cfg(test)]
pub(crate) mod test_support;

pub use builder::{Distributor, DistributorBuilder};
