use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use rsip::headers::{ToTypedHeader, UntypedHeader};
use rsip::message::headers_ext::HeadersExt;
use rsip::{Method, Param, SipMessage, StatusCode};

use crate::sip::endpoint::SipEndpoint;

/// Parsed inbound message plus the packet-level info the distributor needs.
///
/// The endpoint identified for the message rides along in a dedicated slot
/// so later modules can read it without another lookup.
pub struct RxData {
    message: SipMessage,
    source: SocketAddr,
    endpoint: Mutex<Option<Arc<SipEndpoint>>>,
}

impl RxData {
    pub fn new(message: SipMessage, source: SocketAddr) -> Self {
        Self {
            message,
            source,
            endpoint: Mutex::new(None),
        }
    }

    pub fn message(&self) -> &SipMessage {
        &self.message
    }

    pub fn source(&self) -> SocketAddr {
        self.source
    }

    pub fn is_request(&self) -> bool {
        matches!(self.message, SipMessage::Request(_))
    }

    /// Request-line method; `None` for responses.
    pub fn method(&self) -> Option<Method> {
        match &self.message {
            SipMessage::Request(request) => Some(request.method.clone()),
            SipMessage::Response(_) => None,
        }
    }

    pub fn is_method(&self, method: Method) -> bool {
        self.method() == Some(method)
    }

    /// Status code; `None` for requests.
    pub fn status_code(&self) -> Option<StatusCode> {
        match &self.message {
            SipMessage::Request(_) => None,
            SipMessage::Response(response) => Some(response.status_code.clone()),
        }
    }

    /// Method carried in the CSeq header.
    pub fn cseq_method(&self) -> Option<Method> {
        let cseq = match &self.message {
            SipMessage::Request(request) => request.cseq_header(),
            SipMessage::Response(response) => response.cseq_header(),
        };
        cseq.ok().and_then(|header| header.typed().ok()).map(|cseq| cseq.method)
    }

    /// Call-ID, or the empty string when the header is absent.
    pub fn call_id(&self) -> String {
        let header = match &self.message {
            SipMessage::Request(request) => request.call_id_header(),
            SipMessage::Response(response) => response.call_id_header(),
        };
        header.map(|h| h.value().to_string()).unwrap_or_default()
    }

    pub fn from_tag(&self) -> Option<String> {
        let header = match &self.message {
            SipMessage::Request(request) => request.from_header(),
            SipMessage::Response(response) => response.from_header(),
        };
        header
            .ok()
            .and_then(|h| h.tag().ok().flatten())
            .map(|tag| tag.to_string())
    }

    pub fn to_tag(&self) -> Option<String> {
        let header = match &self.message {
            SipMessage::Request(request) => request.to_header(),
            SipMessage::Response(response) => response.to_header(),
        };
        header
            .ok()
            .and_then(|h| h.tag().ok().flatten())
            .map(|tag| tag.to_string())
    }

    /// From URI rendered for logging.
    pub fn from_uri(&self) -> Option<String> {
        let header = match &self.message {
            SipMessage::Request(request) => request.from_header(),
            SipMessage::Response(response) => response.from_header(),
        };
        header
            .ok()
            .and_then(|h| h.typed().ok())
            .map(|from| from.uri.to_string())
    }

    /// User part of the From URI.
    pub fn from_user(&self) -> Option<String> {
        let header = match &self.message {
            SipMessage::Request(request) => request.from_header(),
            SipMessage::Response(response) => response.from_header(),
        };
        header
            .ok()
            .and_then(|h| h.typed().ok())
            .and_then(|from| from.uri.auth.map(|auth| auth.user))
    }

    /// Branch parameter of the top Via.
    pub fn branch(&self) -> Option<String> {
        let header = match &self.message {
            SipMessage::Request(request) => request.via_header(),
            SipMessage::Response(response) => response.via_header(),
        };
        header.ok().and_then(|h| h.typed().ok()).and_then(|via| {
            via.params.iter().find_map(|param| match param {
                Param::Branch(branch) => Some(branch.to_string()),
                _ => None,
            })
        })
    }

    /// Endpoint identified for this message, reference bumped.
    pub fn endpoint(&self) -> Option<Arc<SipEndpoint>> {
        self.endpoint.lock().unwrap().clone()
    }

    pub fn attach_endpoint(&self, endpoint: Arc<SipEndpoint>) {
        *self.endpoint.lock().unwrap() = Some(endpoint);
    }

    /// Clear the endpoint slot, releasing the reference it held.
    pub fn take_endpoint(&self) -> Option<Arc<SipEndpoint>> {
        self.endpoint.lock().unwrap().take()
    }
}

impl Clone for RxData {
    fn clone(&self) -> Self {
        Self {
            message: self.message.clone(),
            source: self.source,
            endpoint: Mutex::new(self.endpoint.lock().unwrap().clone()),
        }
    }
}

/// Outbound message under construction.
pub struct TxData {
    message: SipMessage,
    serializer_name: Option<String>,
}

impl TxData {
    pub fn new(message: SipMessage) -> Self {
        Self {
            message,
            serializer_name: None,
        }
    }

    pub fn message(&self) -> &SipMessage {
        &self.message
    }

    pub fn message_mut(&mut self) -> &mut SipMessage {
        &mut self.message
    }

    pub fn status_code(&self) -> Option<StatusCode> {
        match &self.message {
            SipMessage::Request(_) => None,
            SipMessage::Response(response) => Some(response.status_code.clone()),
        }
    }

    /// Name of the serializer that last sent this message.
    pub fn serializer_name(&self) -> Option<&str> {
        self.serializer_name.as_deref()
    }

    /// Record the serializer sending this message. A matching name already
    /// recorded is left untouched.
    pub fn record_serializer_name(&mut self, name: &str) {
        if self.serializer_name.as_deref() != Some(name) {
            self.serializer_name = Some(name.to_string());
        }
    }
}
