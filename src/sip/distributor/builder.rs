use std::sync::Mutex;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use tracing::{debug, info};

use crate::config::DistributorConfig;
use crate::error::{Error, Result};
use crate::serializer::{Serializer, SerializerRegistry};
use crate::sip::endpoint::{SipAuth, SipEndpoint};
use crate::sip::message::RxData;
use crate::sip::module::{ModuleRegistry, SipModule};
use crate::sip::services::{
    AuthVerifier, EndpointResolver, NoopSecurityReporter, SecurityReporter, SipStack,
};

use super::authenticate::{AUTH_MOD_NAME, AuthenticatorModule};
use super::dispatch::{DISTRIBUTOR_MOD_NAME, DistributorModule};
use super::identify::{ENDPOINT_MOD_NAME, EndpointIdentifierModule};
use super::state::DistributorContext;

/// Base for the generated pool serializer names.
const POOL_NAME_BASE: &str = "sip/distributor";

/// Wires the distributor subsystem to the embedding stack and its services.
pub struct DistributorBuilder {
    config: DistributorConfig,
    stack: Option<Arc<dyn SipStack>>,
    resolver: Option<Arc<dyn EndpointResolver>>,
    verifier: Option<Arc<dyn AuthVerifier>>,
    reporter: Arc<dyn SecurityReporter>,
    modules: Option<Arc<ModuleRegistry>>,
}

impl DistributorBuilder {
    pub fn new(config: DistributorConfig) -> Self {
        Self {
            config,
            stack: None,
            resolver: None,
            verifier: None,
            reporter: Arc::new(NoopSecurityReporter),
            modules: None,
        }
    }

    pub fn with_stack(mut self, stack: Arc<dyn SipStack>) -> Self {
        self.stack = Some(stack);
        self
    }

    pub fn with_resolver(mut self, resolver: Arc<dyn EndpointResolver>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    pub fn with_verifier(mut self, verifier: Arc<dyn AuthVerifier>) -> Self {
        self.verifier = Some(verifier);
        self
    }

    pub fn with_reporter(mut self, reporter: Arc<dyn SecurityReporter>) -> Self {
        self.reporter = reporter;
        self
    }

    /// Module chain to register with. A fresh one is created when the
    /// embedding stack does not supply its own.
    pub fn with_modules(mut self, modules: Arc<ModuleRegistry>) -> Self {
        self.modules = Some(modules);
        self
    }

    /// Create the serializer pool and the synthetic endpoint and auth, then
    /// register the three inbound modules. Unwinds everything on failure.
    pub async fn build(self) -> Result<Distributor> {
        self.config.validate()?;
        let stack = self
            .stack
            .ok_or_else(|| Error::Configuration("missing sip stack".into()))?;
        let resolver = self
            .resolver
            .ok_or_else(|| Error::Configuration("missing endpoint resolver".into()))?;
        let verifier = self
            .verifier
            .ok_or_else(|| Error::Configuration("missing auth verifier".into()))?;
        let modules = self.modules.unwrap_or_else(ModuleRegistry::new);

        let serializers = SerializerRegistry::new(
            self.config.queue_high_water,
            self.config.queue_low_water,
        );

        let mut pool = Vec::with_capacity(self.config.pool_size);
        for _ in 0..self.config.pool_size {
            let name = serializers.build_name(POOL_NAME_BASE);
            match serializers.create(&name) {
                Ok(serializer) => pool.push(serializer),
                Err(err) => {
                    drain_pool(pool).await;
                    return Err(err);
                }
            }
        }

        let ctx = Arc::new(DistributorContext {
            artificial_endpoint: SipEndpoint::artificial(),
            artificial_auth: Arc::new(SipAuth::artificial(&self.config.artificial_realm)),
            stack,
            resolver,
            verifier,
            reporter: self.reporter,
            serializers,
            modules,
            pool: Mutex::new(pool),
            booted: AtomicBool::new(false),
            config: self.config,
        });

        let inbound: [Arc<dyn SipModule>; 3] = [
            DistributorModule::new(ctx.clone()),
            EndpointIdentifierModule::new(ctx.clone()),
            AuthenticatorModule::new(ctx.clone()),
        ];
        let mut registered: Vec<String> = Vec::with_capacity(inbound.len());
        for module in inbound {
            let name = module.name().to_string();
            if let Err(err) = ctx.modules.register(module) {
                for name in registered.iter().rev() {
                    ctx.modules.unregister(name);
                }
                drain_pool(ctx.take_pool()).await;
                return Err(err);
            }
            registered.push(name);
        }

        info!(pool_size = ctx.config.pool_size, "request distributor initialized");
        Ok(Distributor { ctx })
    }
}

/// Running distributor subsystem.
///
/// Until `set_booted` is called every inbound message is silently consumed,
/// leaving recovery to peer retransmission. Call `shutdown` to quiesce.
pub struct Distributor {
    ctx: Arc<DistributorContext>,
}

impl std::fmt::Debug for Distributor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Distributor").finish_non_exhaustive()
    }
}

impl Distributor {
    pub fn builder(config: DistributorConfig) -> DistributorBuilder {
        DistributorBuilder::new(config)
    }

    /// Open the boot gate and start dispatching traffic.
    pub fn set_booted(&self) {
        self.ctx.set_booted();
        debug!("request distributor accepting traffic");
    }

    /// The module chain the distributor registered with.
    pub fn modules(&self) -> Arc<ModuleRegistry> {
        self.ctx.modules.clone()
    }

    /// Registry holding the pool and any application-created serializers.
    pub fn serializers(&self) -> Arc<SerializerRegistry> {
        self.ctx.serializers.clone()
    }

    /// Pool serializer for a message with no affinity, picked by hashing
    /// its Call-ID and remote tag.
    pub fn serializer_for(&self, rdata: &RxData) -> Option<Serializer> {
        self.ctx.serializer_for(rdata)
    }

    /// The synthetic endpoint substituted for unidentified requests,
    /// reference bumped.
    pub fn artificial_endpoint(&self) -> Arc<SipEndpoint> {
        self.ctx.artificial_endpoint()
    }

    /// The synthetic auth record paired with the synthetic endpoint.
    pub fn artificial_auth(&self) -> Arc<SipAuth> {
        self.ctx.artificial_auth()
    }

    #[cfg(test)]
    pub(crate) fn context(&self) -> Arc<DistributorContext> {
        self.ctx.clone()
    }

    /// Quiesce: unregister the modules so no new work arrives, drain the
    /// pool serializers, then release the synthetics with the context.
    pub async fn shutdown(self) {
        for name in [AUTH_MOD_NAME, ENDPOINT_MOD_NAME, DISTRIBUTOR_MOD_NAME] {
            self.ctx.modules.unregister(name);
        }
        drain_pool(self.ctx.take_pool()).await;
        info!("request distributor shut down");
    }
}

async fn drain_pool(pool: Vec<Serializer>) {
    for serializer in pool {
        serializer.shutdown().await;
    }
}
