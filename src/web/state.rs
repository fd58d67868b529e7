//! Shared state handed to every request handler.

use crate::device::DeviceFacade;
use crate::notify::{DeviceTokenRegistry, LogNotifier, Notifier};
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub facade: Arc<dyn DeviceFacade>,
    /// Token registry; `/deviceToken` and `/pushNotification` answer
    /// `Unsupported` without one
    pub registry: Option<Arc<DeviceTokenRegistry>>,
    pub notifier: Arc<dyn Notifier>,
}

impl AppState {
    pub fn new(facade: Arc<dyn DeviceFacade>) -> Self {
        Self {
            facade,
            registry: None,
            notifier: Arc::new(LogNotifier),
        }
    }

    pub fn with_registry(mut self, registry: Arc<DeviceTokenRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }
}
