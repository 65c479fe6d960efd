use std::collections::HashMap;
use std::sync::Arc;

use gproxy_common::Provider;

use crate::capability::{DeviceCodeCapable, OAuthCapable, ServiceAccountCapable};

/// Dispatch table from the closed `Provider` discriminant to whichever
/// capability handlers that provider implements. A provider may
/// register into more than one table: Vertex registers only
/// service-account, most OAuth providers register only oauth, Copilot
/// registers only device-code.
#[derive(Default)]
pub struct ProviderRegistry {
    oauth: HashMap<Provider, Arc<dyn OAuthCapable>>,
    device_code: HashMap<Provider, Arc<dyn DeviceCodeCapable>>,
    service_account: HashMap<Provider, Arc<dyn ServiceAccountCapable>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_oauth(&mut self, handler: Arc<dyn OAuthCapable>) {
        self.oauth.insert(handler.provider(), handler);
    }

    pub fn register_device_code(&mut self, handler: Arc<dyn DeviceCodeCapable>) {
        self.device_code.insert(handler.provider(), handler);
    }

    pub fn register_service_account(&mut self, handler: Arc<dyn ServiceAccountCapable>) {
        self.service_account.insert(handler.provider(), handler);
    }

    pub fn oauth(&self, provider: Provider) -> Option<Arc<dyn OAuthCapable>> {
        self.oauth.get(&provider).cloned()
    }

    pub fn device_code(&self, provider: Provider) -> Option<Arc<dyn DeviceCodeCapable>> {
        self.device_code.get(&provider).cloned()
    }

    pub fn service_account(&self, provider: Provider) -> Option<Arc<dyn ServiceAccountCapable>> {
        self.service_account.get(&provider).cloned()
    }
}
