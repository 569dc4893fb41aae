use std::sync::Arc;

use async_trait::async_trait;
use rsip::{Method, StatusCode};
use tracing::{debug, error, warn};

use crate::serializer::{Serializer, current_serializer_name};
use crate::sip::dialog::Dialog;
use crate::sip::message::{RxData, TxData};
use crate::sip::module::{ModuleAction, PRIORITY_TSX_LAYER, SipModule};
use crate::sip::transaction::{TransactionKey, TransactionRole};

use super::state::DistributorContext;

pub(super) const DISTRIBUTOR_MOD_NAME: &str = "request-distributor";

/// First inbound module: resolves the serializer every message must ride,
/// then hands a clone of the message to it. Always consumes, so the
/// transport thread does no further work.
pub(super) struct DistributorModule {
    ctx: Arc<DistributorContext>,
}

impl DistributorModule {
    pub(super) fn new(ctx: Arc<DistributorContext>) -> Arc<Self> {
        Arc::new(Self { ctx })
    }

    async fn distribute_rx(&self, rdata: &RxData) -> ModuleAction {
        if !self.ctx.is_booted() {
            // Not ready for traffic yet. Peers retransmit until we are.
            return ModuleAction::Consume;
        }

        let mut dialog_endpoint = None;
        let mut serializer = None;
        if let Some(dialog) = self.find_dialog(rdata).await {
            dialog_endpoint = dialog.endpoint();
            serializer = dialog.serializer();
            if let Some(found) = &serializer {
                debug!(
                    serializer = %found.name(),
                    dialog = %dialog.id(),
                    "found serializer on dialog"
                );
            }
        }

        let serializer = if serializer.is_some() {
            serializer
        } else if !rdata.is_request() {
            match self.find_request_serializer(rdata).await {
                Some(found) => Some(found),
                None if self.ctx.serializers.overload_alert() => {
                    debug!(
                        call_id = %rdata.call_id(),
                        "overload alert: ignoring unmatched response"
                    );
                    return ModuleAction::Consume;
                }
                // Maybe the stack can still make sense of the unmatched
                // response on a pool serializer.
                None => self.ctx.serializer_for(rdata),
            }
        } else if rdata.is_method(Method::Bye) || rdata.is_method(Method::Cancel) {
            // A BYE or CANCEL that matched nothing refers to a conversation
            // we do not know about.
            if let Err(err) = self
                .ctx
                .stack
                .respond_stateless(rdata, StatusCode::CallTransactionDoesNotExist)
                .await
            {
                warn!(error = %err, "failed to send 481 for unmatched request");
            }
            return ModuleAction::Consume;
        } else if self.ctx.serializers.overload_alert() {
            // Backed-up serializers mean we are overloaded. Ignore the
            // request and rely on the peer's transport layer to retransmit;
            // the backlog usually clears within seconds.
            debug!(call_id = %rdata.call_id(), "overload alert: ignoring request");
            return ModuleAction::Consume;
        } else {
            self.ctx.serializer_for(rdata)
        };

        let Some(serializer) = serializer else {
            return ModuleAction::Consume;
        };

        let clone = Arc::new(rdata.clone());
        if let Some(endpoint) = dialog_endpoint {
            clone.attach_endpoint(endpoint);
        }

        let ctx = self.ctx.clone();
        let task_rdata = clone.clone();
        if let Err(err) = serializer.push(async move { distribute(ctx, task_rdata).await }) {
            debug!(error = %err, "dropping message for closed serializer");
            clone.take_endpoint();
        }

        ModuleAction::Consume
    }

    /// Find the dialog this message belongs to, if any.
    async fn find_dialog(&self, rdata: &RxData) -> Option<Arc<Dialog>> {
        let call_id = rdata.call_id();
        if call_id.is_empty() {
            return None;
        }

        let from_tag = rdata.from_tag();
        let to_tag = rdata.to_tag();
        let (local_tag, remote_tag) = if rdata.is_request() {
            (to_tag.clone(), from_tag)
        } else {
            (from_tag, to_tag.clone())
        };

        // The direct lookup covers responses, non-CANCEL requests, and
        // CANCEL requests carrying a to-tag.
        if !rdata.is_request() || !rdata.is_method(Method::Cancel) || to_tag.is_some() {
            return self
                .ctx
                .stack
                .find_dialog(&call_id, local_tag.as_deref(), remote_tag.as_deref())
                .await;
        }

        // A CANCEL without a to-tag can only reach its dialog through the
        // INVITE transaction it cancels.
        let key = match TransactionKey::from_rx(TransactionRole::Uas, Method::Invite, rdata) {
            Ok(key) => key,
            Err(err) => {
                debug!(error = %err, "cannot build INVITE transaction key for CANCEL");
                return None;
            }
        };
        let Some(transaction) = self.ctx.stack.find_transaction(&key).await else {
            error!("could not find matching INVITE transaction for CANCEL request");
            return None;
        };
        transaction.dialog()
    }

    /// Recover the serializer that sent the request this response answers.
    async fn find_request_serializer(&self, rdata: &RxData) -> Option<Serializer> {
        let method = rdata.cseq_method()?;
        let key = TransactionKey::from_rx(TransactionRole::Uac, method.clone(), rdata).ok()?;
        let Some(transaction) = self.ctx.stack.find_transaction(&key).await else {
            debug!(method = %method, "could not find transaction for response");
            return None;
        };

        let name = transaction
            .last_tx()
            .and_then(|tdata| tdata.serializer_name().map(str::to_string))?;
        if name.is_empty() {
            return None;
        }
        let serializer = self.ctx.serializers.get(&name);
        if serializer.is_some() {
            debug!(
                serializer = %name,
                transaction = %transaction.id(),
                "found serializer on transaction"
            );
        }
        serializer
    }
}

#[async_trait]
impl SipModule for DistributorModule {
    fn name(&self) -> &str {
        DISTRIBUTOR_MOD_NAME
    }

    fn priority(&self) -> u32 {
        PRIORITY_TSX_LAYER - 6
    }

    async fn on_rx_request(&self, rdata: &RxData) -> ModuleAction {
        self.distribute_rx(rdata).await
    }

    async fn on_rx_response(&self, rdata: &RxData) -> ModuleAction {
        self.distribute_rx(rdata).await
    }

    fn on_tx_request(&self, tdata: &mut TxData) {
        // Remember which serializer is sending so the response can ride the
        // same one.
        if let Some(name) = current_serializer_name() {
            if !name.is_empty() {
                tdata.record_serializer_name(&name);
            }
        }
    }
}

/// Task body run on the chosen serializer: push the clone through the rest
/// of the module chain.
async fn distribute(ctx: Arc<DistributorContext>, rdata: Arc<RxData>) {
    let handled = ctx
        .modules
        .process_rx_after(DISTRIBUTOR_MOD_NAME, &rdata)
        .await;
    if !handled && rdata.is_request() && !rdata.is_method(Method::Ack) {
        if let Err(err) = ctx
            .stack
            .respond_stateless(&rdata, StatusCode::NotImplemented)
            .await
        {
            warn!(error = %err, "failed to send 501 for unhandled request");
        }
    }

    // The identified endpoint is released here and nowhere else.
    rdata.take_endpoint();
}
