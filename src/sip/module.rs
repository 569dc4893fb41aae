use std::sync::{Arc, RwLock};

use async_trait::async_trait;

use crate::error::{Error, Result};
use crate::sip::message::{RxData, TxData};

/// Module priorities mirror the layering of the embedding stack; lower runs
/// earlier on the inbound path.
pub const PRIORITY_TRANSPORT_LAYER: u32 = 8;
pub const PRIORITY_TSX_LAYER: u32 = 16;
pub const PRIORITY_UA_PROXY_LAYER: u32 = 32;
pub const PRIORITY_DIALOG_USAGE: u32 = 48;
pub const PRIORITY_APPLICATION: u32 = 64;

/// What an inbound hook did with the message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModuleAction {
    /// The module consumed the message; later modules do not see it.
    Consume,
    /// Hand the message to the next module.
    Continue,
}

/// Processing hook registered with the module chain.
#[async_trait]
pub trait SipModule: Send + Sync {
    fn name(&self) -> &str;
    fn priority(&self) -> u32;

    async fn on_rx_request(&self, _rdata: &RxData) -> ModuleAction {
        ModuleAction::Continue
    }

    async fn on_rx_response(&self, _rdata: &RxData) -> ModuleAction {
        ModuleAction::Continue
    }

    fn on_tx_request(&self, _tdata: &mut TxData) {}
}

/// Priority-ordered module chain of the embedding stack.
pub struct ModuleRegistry {
    modules: RwLock<Vec<Arc<dyn SipModule>>>,
}

impl ModuleRegistry {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            modules: RwLock::new(Vec::new()),
        })
    }

    /// Insert a module at its priority. Modules sharing a priority keep
    /// registration order.
    pub fn register(&self, module: Arc<dyn SipModule>) -> Result<()> {
        let mut modules = self.modules.write().unwrap();
        if modules.iter().any(|existing| existing.name() == module.name()) {
            return Err(Error::ModuleExists(module.name().to_string()));
        }
        let at = modules
            .iter()
            .position(|existing| existing.priority() > module.priority())
            .unwrap_or(modules.len());
        modules.insert(at, module);
        Ok(())
    }

    pub fn unregister(&self, name: &str) {
        let mut modules = self.modules.write().unwrap();
        modules.retain(|module| module.name() != name);
    }

    /// Run the inbound chain from the top. True when some module consumed
    /// the message.
    pub async fn receive(&self, rdata: &RxData) -> bool {
        let snapshot = self.snapshot();
        Self::run_rx(&snapshot, rdata).await
    }

    /// Re-run the inbound chain starting just after the module named
    /// `start`. True when some module consumed the message.
    pub async fn process_rx_after(&self, start: &str, rdata: &RxData) -> bool {
        let snapshot = self.snapshot();
        let Some(at) = snapshot.iter().position(|module| module.name() == start) else {
            return false;
        };
        Self::run_rx(&snapshot[at + 1..], rdata).await
    }

    /// Run tx-request hooks in priority order.
    pub fn transmit(&self, tdata: &mut TxData) {
        for module in self.snapshot() {
            module.on_tx_request(tdata);
        }
    }

    fn snapshot(&self) -> Vec<Arc<dyn SipModule>> {
        self.modules.read().unwrap().clone()
    }

    async fn run_rx(modules: &[Arc<dyn SipModule>], rdata: &RxData) -> bool {
        for module in modules {
            let action = if rdata.is_request() {
                module.on_rx_request(rdata).await
            } else {
                module.on_rx_response(rdata).await
            };
            if action == ModuleAction::Consume {
                return true;
            }
        }
        false
    }
}
