//! In-memory collaborators for exercising the distributor without a real
//! SIP stack underneath.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use rsip::message::HasHeaders;
use rsip::{Header, Headers, Response, SipMessage, StatusCode, Version};
use tokio::sync::mpsc;

use crate::config::DistributorConfig;
use crate::error::Result;
use crate::serializer::current_serializer_name;
use crate::sip::dialog::Dialog;
use crate::sip::endpoint::SipEndpoint;
use crate::sip::message::{RxData, TxData};
use crate::sip::module::{ModuleAction, ModuleRegistry, PRIORITY_APPLICATION, SipModule};
use crate::sip::services::{
    AuthVerdict, AuthVerifier, EndpointResolver, SecurityReporter, SipStack,
};
use crate::sip::transaction::{Transaction, TransactionKey};

use super::builder::{Distributor, DistributorBuilder};
use super::state::DistributorContext;

const TEST_SOURCE: &str = "198.51.100.10:5060";

pub(crate) fn rx(raw: &str) -> RxData {
    let message = SipMessage::try_from(raw).expect("parse test message");
    RxData::new(message, TEST_SOURCE.parse().unwrap())
}

pub(crate) fn request(
    method: &str,
    call_id: &str,
    from_tag: &str,
    to_tag: Option<&str>,
    branch: &str,
) -> RxData {
    let to = match to_tag {
        Some(tag) => format!("<sip:bob@example.com>;tag={tag}"),
        None => "<sip:bob@example.com>".to_string(),
    };
    rx(&format!(
        "{method} sip:bob@example.com SIP/2.0\r\n\
         Via: SIP/2.0/UDP 198.51.100.10:5060;branch={branch}\r\n\
         Max-Forwards: 70\r\n\
         From: <sip:alice@example.com>;tag={from_tag}\r\n\
         To: {to}\r\n\
         Call-ID: {call_id}\r\n\
         CSeq: 1 {method}\r\n\
         Content-Length: 0\r\n\r\n"
    ))
}

pub(crate) fn invite(call_id: &str, from_tag: &str, branch: &str) -> RxData {
    request("INVITE", call_id, from_tag, None, branch)
}

pub(crate) fn ack(call_id: &str, from_tag: &str, to_tag: &str, branch: &str) -> RxData {
    request("ACK", call_id, from_tag, Some(to_tag), branch)
}

pub(crate) fn response(
    code: u16,
    reason: &str,
    call_id: &str,
    from_tag: &str,
    to_tag: &str,
    cseq_method: &str,
    branch: &str,
) -> RxData {
    rx(&format!(
        "SIP/2.0 {code} {reason}\r\n\
         Via: SIP/2.0/UDP 198.51.100.10:5060;branch={branch}\r\n\
         From: <sip:alice@example.com>;tag={from_tag}\r\n\
         To: <sip:bob@example.com>;tag={to_tag}\r\n\
         Call-ID: {call_id}\r\n\
         CSeq: 1 {cseq_method}\r\n\
         Content-Length: 0\r\n\r\n"
    ))
}

type DialogKey = (String, Option<String>, Option<String>);

/// Stack double: in-memory dialog and transaction tables plus a log of
/// every response the distributor asked it to send.
#[derive(Default)]
pub(crate) struct FakeStack {
    dialogs: Mutex<HashMap<DialogKey, Arc<Dialog>>>,
    transactions: Mutex<HashMap<TransactionKey, Arc<Transaction>>>,
    pub(crate) transaction_lookups: Mutex<Vec<TransactionKey>>,
    /// (status, Call-ID, serializer the send ran on)
    pub(crate) stateless: Mutex<Vec<(u16, String, Option<String>)>>,
    /// (status, serializer the send ran on)
    pub(crate) sent: Mutex<Vec<(u16, Option<String>)>>,
}

impl FakeStack {
    pub(crate) fn add_dialog(
        &self,
        call_id: &str,
        local_tag: Option<&str>,
        remote_tag: Option<&str>,
        dialog: Arc<Dialog>,
    ) {
        let key = (
            call_id.to_string(),
            local_tag.map(str::to_string),
            remote_tag.map(str::to_string),
        );
        self.dialogs.lock().unwrap().insert(key, dialog);
    }

    pub(crate) fn add_transaction(&self, transaction: Arc<Transaction>) {
        self.transactions
            .lock()
            .unwrap()
            .insert(transaction.key().clone(), transaction);
    }

    pub(crate) fn sent_codes(&self) -> Vec<u16> {
        self.sent.lock().unwrap().iter().map(|(code, _)| *code).collect()
    }

    pub(crate) fn stateless_codes(&self) -> Vec<u16> {
        self.stateless
            .lock()
            .unwrap()
            .iter()
            .map(|(code, _, _)| *code)
            .collect()
    }
}

#[async_trait]
impl SipStack for FakeStack {
    async fn find_dialog(
        &self,
        call_id: &str,
        local_tag: Option<&str>,
        remote_tag: Option<&str>,
    ) -> Option<Arc<Dialog>> {
        let key = (
            call_id.to_string(),
            local_tag.map(str::to_string),
            remote_tag.map(str::to_string),
        );
        self.dialogs.lock().unwrap().get(&key).cloned()
    }

    async fn find_transaction(&self, key: &TransactionKey) -> Option<Arc<Transaction>> {
        self.transaction_lookups.lock().unwrap().push(key.clone());
        self.transactions.lock().unwrap().get(key).cloned()
    }

    async fn create_response(&self, rdata: &RxData, status: StatusCode) -> Result<TxData> {
        let mut headers = Vec::new();
        for header in rdata.message().headers().iter() {
            match header {
                Header::Via(_)
                | Header::From(_)
                | Header::To(_)
                | Header::CallId(_)
                | Header::CSeq(_) => headers.push(header.clone()),
                _ => {}
            }
        }
        headers.push(Header::ContentLength("0".into()));

        let response = Response {
            status_code: status,
            headers: Headers::from(headers),
            body: Vec::new(),
            version: Version::V2,
        };
        Ok(TxData::new(SipMessage::Response(response)))
    }

    async fn send_response(&self, _rdata: &RxData, tdata: TxData) -> Result<()> {
        let code = tdata.status_code().map(u16::from).unwrap_or_default();
        self.sent
            .lock()
            .unwrap()
            .push((code, current_serializer_name()));
        Ok(())
    }

    async fn respond_stateless(&self, rdata: &RxData, status: StatusCode) -> Result<()> {
        self.stateless.lock().unwrap().push((
            u16::from(status),
            rdata.call_id(),
            current_serializer_name(),
        ));
        Ok(())
    }
}

#[derive(Default)]
pub(crate) struct FakeResolver {
    pub(crate) endpoint: Mutex<Option<Arc<SipEndpoint>>>,
}

#[async_trait]
impl EndpointResolver for FakeResolver {
    async fn identify(&self, _rdata: &RxData) -> Option<Arc<SipEndpoint>> {
        self.endpoint.lock().unwrap().clone()
    }
}

pub(crate) struct FakeVerifier {
    pub(crate) verdict: Mutex<AuthVerdict>,
}

impl Default for FakeVerifier {
    fn default() -> Self {
        Self {
            verdict: Mutex::new(AuthVerdict::Challenge),
        }
    }
}

#[async_trait]
impl AuthVerifier for FakeVerifier {
    fn requires_authentication(&self, endpoint: &SipEndpoint, _rdata: &RxData) -> bool {
        !endpoint.inbound_auths().is_empty()
    }

    async fn check(
        &self,
        _endpoint: &Arc<SipEndpoint>,
        _rdata: &RxData,
        tdata: &mut TxData,
    ) -> AuthVerdict {
        let verdict = *self.verdict.lock().unwrap();
        if verdict == AuthVerdict::Challenge {
            tdata.message_mut().headers_mut().push(Header::Other(
                "WWW-Authenticate".into(),
                "Digest realm=\"asterisk\", nonce=\"f00d\"".into(),
            ));
        }
        verdict
    }
}

#[derive(Default)]
pub(crate) struct RecordingReporter {
    pub(crate) events: Mutex<Vec<String>>,
}

impl SecurityReporter for RecordingReporter {
    fn invalid_endpoint(&self, _name: &str, _rdata: &RxData) {
        self.events.lock().unwrap().push("invalid-endpoint".into());
    }

    fn auth_challenge_sent(&self, _endpoint: &SipEndpoint, _rdata: &RxData, _tdata: &TxData) {
        self.events.lock().unwrap().push("challenge-sent".into());
    }

    fn auth_success(&self, _endpoint: &SipEndpoint, _rdata: &RxData) {
        self.events.lock().unwrap().push("auth-success".into());
    }

    fn failed_challenge_response(&self, _endpoint: &SipEndpoint, _rdata: &RxData) {
        self.events.lock().unwrap().push("failed-challenge".into());
    }
}

/// What the probe module saw for one message reaching the application slot.
#[derive(Debug)]
pub(crate) struct ProbeHit {
    pub(crate) kind: String,
    pub(crate) call_id: String,
    pub(crate) serializer: Option<String>,
    pub(crate) endpoint: Option<String>,
}

/// Application stand-in registered after the authenticator; reports every
/// message it sees together with the serializer carrying it.
struct ProbeModule {
    hits: mpsc::UnboundedSender<ProbeHit>,
}

#[async_trait]
impl SipModule for ProbeModule {
    fn name(&self) -> &str {
        "probe"
    }

    fn priority(&self) -> u32 {
        PRIORITY_APPLICATION
    }

    async fn on_rx_request(&self, rdata: &RxData) -> ModuleAction {
        self.report(rdata);
        ModuleAction::Continue
    }

    async fn on_rx_response(&self, rdata: &RxData) -> ModuleAction {
        self.report(rdata);
        ModuleAction::Continue
    }
}

impl ProbeModule {
    fn report(&self, rdata: &RxData) {
        let kind = match rdata.method() {
            Some(method) => method.to_string(),
            None => rdata
                .status_code()
                .map(|code| u16::from(code).to_string())
                .unwrap_or_default(),
        };
        let _ = self.hits.send(ProbeHit {
            kind,
            call_id: rdata.call_id(),
            serializer: current_serializer_name(),
            endpoint: rdata.endpoint().map(|e| e.name().to_string()),
        });
    }
}

/// A built distributor wired to fakes, with a probe module sitting where
/// the application would.
pub(crate) struct Harness {
    pub(crate) distributor: Distributor,
    pub(crate) modules: Arc<ModuleRegistry>,
    pub(crate) stack: Arc<FakeStack>,
    pub(crate) resolver: Arc<FakeResolver>,
    pub(crate) verifier: Arc<FakeVerifier>,
    pub(crate) reporter: Arc<RecordingReporter>,
    pub(crate) probe_rx: mpsc::UnboundedReceiver<ProbeHit>,
}

impl Harness {
    pub(crate) async fn new() -> Self {
        Self::with_config(DistributorConfig::default()).await
    }

    pub(crate) async fn with_config(config: DistributorConfig) -> Self {
        let harness = Self::build(config).await;
        harness.distributor.set_booted();
        harness
    }

    /// Harness whose boot gate is still closed.
    pub(crate) async fn unbooted() -> Self {
        Self::build(DistributorConfig::default()).await
    }

    async fn build(config: DistributorConfig) -> Self {
        let stack = Arc::new(FakeStack::default());
        let resolver = Arc::new(FakeResolver::default());
        let verifier = Arc::new(FakeVerifier::default());
        let reporter = Arc::new(RecordingReporter::default());
        let modules = ModuleRegistry::new();

        let distributor = DistributorBuilder::new(config)
            .with_stack(stack.clone())
            .with_resolver(resolver.clone())
            .with_verifier(verifier.clone())
            .with_reporter(reporter.clone())
            .with_modules(modules.clone())
            .build()
            .await
            .expect("build distributor");

        let (hits, probe_rx) = mpsc::unbounded_channel();
        modules
            .register(Arc::new(ProbeModule { hits }))
            .expect("register probe");

        Self {
            distributor,
            modules,
            stack,
            resolver,
            verifier,
            reporter,
            probe_rx,
        }
    }

    pub(crate) fn context(&self) -> Arc<DistributorContext> {
        self.distributor.context()
    }

    /// Wait for the next message to reach the probe.
    pub(crate) async fn next_hit(&mut self) -> ProbeHit {
        tokio::time::timeout(Duration::from_secs(5), self.probe_rx.recv())
            .await
            .expect("timed out waiting for probe hit")
            .expect("probe channel closed")
    }

    /// Shut the distributor down, draining the pool so every queued task
    /// has finished.
    pub(crate) async fn teardown(self) {
        self.distributor.shutdown().await;
    }
}
