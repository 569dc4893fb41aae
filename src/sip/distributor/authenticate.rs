use std::sync::Arc;

use async_trait::async_trait;
use rsip::{Method, StatusCode};
use tracing::warn;

use crate::sip::message::RxData;
use crate::sip::module::{ModuleAction, PRIORITY_APPLICATION, SipModule};
use crate::sip::services::AuthVerdict;

use super::state::DistributorContext;

pub(super) const AUTH_MOD_NAME: &str = "request-authenticator";

/// Gates requests whose endpoint requires authentication.
pub(super) struct AuthenticatorModule {
    ctx: Arc<DistributorContext>,
}

impl AuthenticatorModule {
    pub(super) fn new(ctx: Arc<DistributorContext>) -> Arc<Self> {
        Arc::new(Self { ctx })
    }
}

#[async_trait]
impl SipModule for AuthenticatorModule {
    fn name(&self) -> &str {
        AUTH_MOD_NAME
    }

    fn priority(&self) -> u32 {
        PRIORITY_APPLICATION - 2
    }

    async fn on_rx_request(&self, rdata: &RxData) -> ModuleAction {
        if rdata.is_method(Method::Ack) {
            // An ACK cannot be answered, challenged or otherwise.
            return ModuleAction::Continue;
        }

        // The identifier guarantees an endpoint on every non-ACK request.
        let Some(endpoint) = rdata.endpoint() else {
            return ModuleAction::Continue;
        };

        if !self.ctx.verifier.requires_authentication(&endpoint, rdata) {
            return ModuleAction::Continue;
        }

        let mut tdata = match self
            .ctx
            .stack
            .create_response(rdata, StatusCode::Unauthorized)
            .await
        {
            Ok(tdata) => tdata,
            Err(err) => {
                warn!(error = %err, "failed to create 401 for authentication");
                if let Err(err) = self
                    .ctx
                    .stack
                    .respond_stateless(rdata, StatusCode::ServerInternalError)
                    .await
                {
                    warn!(error = %err, "failed to send 500 after response creation failure");
                }
                return ModuleAction::Consume;
            }
        };

        match self.ctx.verifier.check(&endpoint, rdata, &mut tdata).await {
            AuthVerdict::Challenge => {
                self.ctx.reporter.auth_challenge_sent(&endpoint, rdata, &tdata);
                if let Err(err) = self.ctx.stack.send_response(rdata, tdata).await {
                    warn!(error = %err, "failed to send 401 challenge");
                }
                ModuleAction::Consume
            }
            AuthVerdict::Success => {
                self.ctx.reporter.auth_success(&endpoint, rdata);
                ModuleAction::Continue
            }
            AuthVerdict::Failed => {
                self.ctx.reporter.failed_challenge_response(&endpoint, rdata);
                if let Err(err) = self.ctx.stack.send_response(rdata, tdata).await {
                    warn!(error = %err, "failed to send 401 rejection");
                }
                ModuleAction::Consume
            }
            AuthVerdict::Error => {
                self.ctx.reporter.failed_challenge_response(&endpoint, rdata);
                if let Err(err) = self
                    .ctx
                    .stack
                    .respond_stateless(rdata, StatusCode::ServerInternalError)
                    .await
                {
                    warn!(error = %err, "failed to send 500 after authentication error");
                }
                ModuleAction::Consume
            }
        }
    }
}
