use std::sync::Arc;

use async_trait::async_trait;
use rsip::Method;
use tracing::warn;

use crate::sip::message::RxData;
use crate::sip::module::{ModuleAction, PRIORITY_TSX_LAYER, SipModule};

use super::state::DistributorContext;

pub(super) const ENDPOINT_MOD_NAME: &str = "endpoint-identifier";

/// Attaches the originating endpoint to every request entering the
/// serialized part of the chain.
pub(super) struct EndpointIdentifierModule {
    ctx: Arc<DistributorContext>,
}

impl EndpointIdentifierModule {
    pub(super) fn new(ctx: Arc<DistributorContext>) -> Arc<Self> {
        Arc::new(Self { ctx })
    }
}

#[async_trait]
impl SipModule for EndpointIdentifierModule {
    fn name(&self) -> &str {
        ENDPOINT_MOD_NAME
    }

    fn priority(&self) -> u32 {
        PRIORITY_TSX_LAYER - 3
    }

    async fn on_rx_request(&self, rdata: &RxData) -> ModuleAction {
        if rdata.endpoint().is_some() {
            // The dialog already told the distributor who this is.
            return ModuleAction::Continue;
        }

        if let Some(endpoint) = self.ctx.resolver.identify(rdata).await {
            rdata.attach_endpoint(endpoint);
            return ModuleAction::Continue;
        }

        if rdata.is_method(Method::Ack) {
            // Nothing can be sent in reply to an ACK.
            return ModuleAction::Continue;
        }

        // Unidentified requests get the synthetic endpoint so the
        // authenticator challenges them instead of letting them probe for
        // accounts.
        let endpoint = self.ctx.artificial_endpoint();
        let user = rdata.from_user().unwrap_or_default();
        warn!(
            from = %rdata.from_uri().unwrap_or_default(),
            source = %rdata.source(),
            call_id = %rdata.call_id(),
            "no matching endpoint found for request"
        );
        self.ctx.reporter.invalid_endpoint(&user, rdata);
        rdata.attach_endpoint(endpoint);

        ModuleAction::Continue
    }
}
