use std::sync::{Arc, Mutex};

use crate::serializer::Serializer;
use crate::sip::endpoint::SipEndpoint;

#[derive(Default)]
struct DialogAffinity {
    serializer: Option<Serializer>,
    endpoint: Option<Arc<SipEndpoint>>,
}

/// Handle to a dialog owned by the embedding SIP stack.
///
/// The distributor attaches only affinity data: the serializer that carries
/// the dialog's messages and the endpoint the dialog belongs to. Both live
/// exactly as long as the handle.
pub struct Dialog {
    id: String,
    affinity: Mutex<DialogAffinity>,
}

impl Dialog {
    pub fn new(id: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            id: id.into(),
            affinity: Mutex::new(DialogAffinity::default()),
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Pin every message on this dialog to one serializer.
    pub fn set_serializer(&self, serializer: Option<Serializer>) {
        self.affinity.lock().unwrap().serializer = serializer;
    }

    pub fn serializer(&self) -> Option<Serializer> {
        self.affinity.lock().unwrap().serializer.clone()
    }

    pub fn set_endpoint(&self, endpoint: Option<Arc<SipEndpoint>>) {
        self.affinity.lock().unwrap().endpoint = endpoint;
    }

    /// Endpoint associated with this dialog, reference bumped.
    pub fn endpoint(&self) -> Option<Arc<SipEndpoint>> {
        self.affinity.lock().unwrap().endpoint.clone()
    }
}
