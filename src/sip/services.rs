use std::sync::Arc;

use async_trait::async_trait;
use rsip::StatusCode;

use crate::error::Result;
use crate::sip::dialog::Dialog;
use crate::sip::endpoint::SipEndpoint;
use crate::sip::message::{RxData, TxData};
use crate::sip::transaction::{Transaction, TransactionKey};

/// Verdict from the credential verifier for one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthVerdict {
    /// No usable credentials yet; the prepared 401 now carries a challenge.
    Challenge,
    Success,
    /// Credentials were presented and rejected.
    Failed,
    /// The verifier itself failed.
    Error,
}

/// Dialog and transaction bookkeeping plus response transmission, provided
/// by the embedding SIP stack.
#[async_trait]
pub trait SipStack: Send + Sync {
    /// Standard dialog lookup on (Call-ID, local tag, remote tag).
    async fn find_dialog(
        &self,
        call_id: &str,
        local_tag: Option<&str>,
        remote_tag: Option<&str>,
    ) -> Option<Arc<Dialog>>;

    async fn find_transaction(&self, key: &TransactionKey) -> Option<Arc<Transaction>>;

    /// Build an empty response to `rdata` with the given status.
    async fn create_response(&self, rdata: &RxData, status: StatusCode) -> Result<TxData>;

    /// Send a response built with `create_response`.
    async fn send_response(&self, rdata: &RxData, tdata: TxData) -> Result<()>;

    /// Generate and send a response statelessly.
    async fn respond_stateless(&self, rdata: &RxData, status: StatusCode) -> Result<()>;
}

/// Resolves the configured endpoint a request originates from.
#[async_trait]
pub trait EndpointResolver: Send + Sync {
    async fn identify(&self, rdata: &RxData) -> Option<Arc<SipEndpoint>>;
}

/// Credential verification for endpoints whose policy gates requests.
#[async_trait]
pub trait AuthVerifier: Send + Sync {
    /// Whether `endpoint`'s policy gates this request.
    fn requires_authentication(&self, endpoint: &SipEndpoint, rdata: &RxData) -> bool;

    /// Evaluate the request against the endpoint's auth records, populating
    /// the prepared 401 with a challenge when one must be issued.
    async fn check(
        &self,
        endpoint: &Arc<SipEndpoint>,
        rdata: &RxData,
        tdata: &mut TxData,
    ) -> AuthVerdict;
}

/// Sink for security-relevant events on the inbound path.
pub trait SecurityReporter: Send + Sync {
    fn invalid_endpoint(&self, _name: &str, _rdata: &RxData) {}
    fn auth_challenge_sent(&self, _endpoint: &SipEndpoint, _rdata: &RxData, _tdata: &TxData) {}
    fn auth_success(&self, _endpoint: &SipEndpoint, _rdata: &RxData) {}
    fn failed_challenge_response(&self, _endpoint: &SipEndpoint, _rdata: &RxData) {}
}

/// Reporter that drops every event.
pub struct NoopSecurityReporter;

impl SecurityReporter for NoopSecurityReporter {}
