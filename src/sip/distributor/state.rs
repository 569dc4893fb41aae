use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use tracing::debug;

use crate::config::DistributorConfig;
use crate::serializer::{Serializer, SerializerRegistry};
use crate::sip::endpoint::{SipAuth, SipEndpoint};
use crate::sip::message::RxData;
use crate::sip::module::ModuleRegistry;
use crate::sip::services::{AuthVerifier, EndpointResolver, SecurityReporter, SipStack};

use super::utils;

/// State shared by the distributor's modules and its public handle.
pub(crate) struct DistributorContext {
    pub(crate) config: DistributorConfig,
    pub(crate) stack: Arc<dyn SipStack>,
    pub(crate) resolver: Arc<dyn EndpointResolver>,
    pub(crate) verifier: Arc<dyn AuthVerifier>,
    pub(crate) reporter: Arc<dyn SecurityReporter>,
    pub(crate) serializers: Arc<SerializerRegistry>,
    pub(crate) modules: Arc<ModuleRegistry>,
    pub(crate) pool: Mutex<Vec<Serializer>>,
    pub(crate) artificial_endpoint: Arc<SipEndpoint>,
    pub(crate) artificial_auth: Arc<SipAuth>,
    pub(crate) booted: AtomicBool,
}

impl DistributorContext {
    pub(crate) fn is_booted(&self) -> bool {
        self.booted.load(Ordering::SeqCst)
    }

    pub(crate) fn set_booted(&self) {
        self.booted.store(true, Ordering::SeqCst);
    }

    pub(crate) fn artificial_endpoint(&self) -> Arc<SipEndpoint> {
        self.artificial_endpoint.clone()
    }

    pub(crate) fn artificial_auth(&self) -> Arc<SipAuth> {
        self.artificial_auth.clone()
    }

    /// Pick a pool serializer by hashing the message's Call-ID and remote
    /// tag. `None` only once the pool has been torn down.
    pub(crate) fn serializer_for(&self, rdata: &RxData) -> Option<Serializer> {
        let remote_tag = if rdata.is_request() {
            rdata.from_tag()
        } else {
            rdata.to_tag()
        };

        let pool = self.pool.lock().unwrap();
        if pool.is_empty() {
            return None;
        }
        let bucket = utils::pool_bucket(
            &rdata.call_id(),
            remote_tag.as_deref().unwrap_or(""),
            pool.len(),
        );
        let serializer = pool[bucket].clone();
        debug!(
            serializer = %serializer.name(),
            bucket,
            call_id = %rdata.call_id(),
            "calculated pool serializer"
        );
        Some(serializer)
    }

    pub(crate) fn take_pool(&self) -> Vec<Serializer> {
        std::mem::take(&mut *self.pool.lock().unwrap())
    }
}
