//! Device token registration and push notification fan-out.
//!
//! Delivery is behind the [`Notifier`] trait; the shipped [`LogNotifier`] only
//! logs what would have been sent.

use crate::error::{RelayError, Result};
use crate::model::time;
use crate::model::{DeviceToken, PushNotification, PushReceipt, RegisteredToken, Stamped};
use crate::store::{Category, Lookback, PartitionKey, PartitionedTimeStore, StoreBackend};
use async_trait::async_trait;
use chrono::Duration;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, warn};
use uuid::Uuid;

/// Delivers one notification to one registered device.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, target: &RegisteredToken, notification: &PushNotification) -> Result<()>;
}

/// Notifier that writes each delivery to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, target: &RegisteredToken, notification: &PushNotification) -> Result<()> {
        info!(
            "Push to {} ({}): {} / {} / {}",
            target.device_name,
            target.endpoint_id,
            notification.title,
            notification.subtitle,
            notification.message
        );
        Ok(())
    }
}

/// Registered device tokens, persisted in the time store.
pub struct DeviceTokenRegistry {
    store: PartitionedTimeStore<Stamped<RegisteredToken>>,
    // All tokens share one partition; registrations are serialized so each
    // gets a distinct sort key.
    register_lock: Mutex<()>,
}

impl DeviceTokenRegistry {
    pub fn new(backend: Arc<dyn StoreBackend>) -> Self {
        Self {
            store: PartitionedTimeStore::new(backend).with_lookback(Lookback::Unbounded),
            register_lock: Mutex::new(()),
        }
    }

    fn partition() -> PartitionKey {
        PartitionKey::new(Category::DeviceToken, None)
    }

    /// Register a token, reusing the endpoint id of an earlier registration.
    pub async fn register(&self, token: DeviceToken) -> Result<RegisteredToken> {
        if token.token.trim().is_empty() {
            return Err(RelayError::decode_failure("device token", "token is empty"));
        }

        let _guard = self.register_lock.lock().await;
        let history = self.store.recent(&Self::partition()).await?;

        let endpoint_id = history
            .iter()
            .rev()
            .find(|existing| existing.value.token == token.token)
            .map(|existing| existing.value.endpoint_id)
            .unwrap_or_else(Uuid::new_v4);

        let mut recorded_at = time::now();
        if let Some(last) = history.last() {
            if last.recorded_at >= recorded_at {
                recorded_at = last.recorded_at + Duration::milliseconds(1);
            }
        }

        let registered = RegisteredToken {
            token: token.token,
            device_name: token.device_name,
            endpoint_id,
        };
        let stored = self
            .store
            .append(Stamped::new(recorded_at, registered))
            .await?;
        info!(
            "Registered device '{}' as endpoint {}",
            stored.value.device_name, stored.value.endpoint_id
        );
        Ok(stored.value)
    }

    /// Every registered token once, with its most recent registration.
    pub async fn tokens(&self) -> Result<Vec<RegisteredToken>> {
        let mut latest: HashMap<String, RegisteredToken> = HashMap::new();
        for stamped in self.store.recent(&Self::partition()).await? {
            latest.insert(stamped.value.token.clone(), stamped.value);
        }
        let mut tokens: Vec<RegisteredToken> = latest.into_values().collect();
        tokens.sort_by(|a, b| a.device_name.cmp(&b.device_name));
        Ok(tokens)
    }

    /// Send `notification` to every registered device.
    ///
    /// Delivery failures are logged and left out of the receipt.
    pub async fn broadcast(
        &self,
        notifier: &dyn Notifier,
        notification: &PushNotification,
    ) -> Result<PushReceipt> {
        let mut recipients = 0;
        for target in self.tokens().await? {
            match notifier.notify(&target, notification).await {
                Ok(()) => recipients += 1,
                Err(e) => warn!("Push to {} failed: {}", target.endpoint_id, e),
            }
        }
        Ok(PushReceipt { recipients })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryBackend;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn token(token: &str, name: &str) -> DeviceToken {
        DeviceToken {
            token: token.to_string(),
            device_name: name.to_string(),
        }
    }

    struct CountingNotifier(AtomicUsize);

    #[async_trait]
    impl Notifier for CountingNotifier {
        async fn notify(&self, _target: &RegisteredToken, _n: &PushNotification) -> Result<()> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_reregistration_keeps_endpoint() {
        let registry = DeviceTokenRegistry::new(Arc::new(MemoryBackend::new()));
        let first = registry.register(token("aaa", "phone")).await.unwrap();
        let again = registry.register(token("aaa", "renamed phone")).await.unwrap();
        assert_eq!(first.endpoint_id, again.endpoint_id);

        let tokens = registry.tokens().await.unwrap();
        assert_eq!(tokens.len(), 1);
        assert_eq!(tokens[0].device_name, "renamed phone");
    }

    #[tokio::test]
    async fn test_broadcast_reaches_every_device() {
        let registry = DeviceTokenRegistry::new(Arc::new(MemoryBackend::new()));
        registry.register(token("aaa", "phone")).await.unwrap();
        registry.register(token("bbb", "tablet")).await.unwrap();

        let notifier = CountingNotifier(AtomicUsize::new(0));
        let receipt = registry
            .broadcast(
                &notifier,
                &PushNotification {
                    title: "Light".to_string(),
                    subtitle: "Office".to_string(),
                    message: "It got dark".to_string(),
                },
            )
            .await
            .unwrap();
        assert_eq!(receipt.recipients, 2);
        assert_eq!(notifier.0.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_empty_token_is_rejected() {
        let registry = DeviceTokenRegistry::new(Arc::new(MemoryBackend::new()));
        assert!(registry.register(token("  ", "phone")).await.is_err());
    }
}
