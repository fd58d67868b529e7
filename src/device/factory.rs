//! Construction-time selection of a facade variant.

use super::hardware::HardwareFacade;
use super::remote::RemoteFacade;
use super::stored::StoreFacade;
use super::DeviceFacade;
use crate::config::{RelayConfig, StoreBackendKind, StoreConfig};
use crate::error::{RelayError, Result};
use crate::model::Host;
use crate::store::{JsonlBackend, MemoryBackend, StoreBackend};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Which [`DeviceFacade`] implementation to build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum FacadeKind {
    /// Local ADC and GPIO pins
    Hardware,
    /// A peer's HTTP surface
    Remote,
    /// The time store
    Store,
}

impl fmt::Display for FacadeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Hardware => "hardware",
            Self::Remote => "remote",
            Self::Store => "store",
        };
        f.write_str(name)
    }
}

/// Open the storage backend described by `config`.
pub async fn open_backend(config: &StoreConfig) -> Result<Arc<dyn StoreBackend>> {
    match config.backend {
        StoreBackendKind::Memory => {
            info!("Using in-memory store for table '{}'", config.table);
            Ok(Arc::new(MemoryBackend::new()))
        }
        StoreBackendKind::File => {
            let backend = JsonlBackend::open(config.log_path()).await?;
            Ok(Arc::new(backend))
        }
    }
}

/// Build the facade variant `kind` from `config`.
pub async fn build_facade(kind: FacadeKind, config: &RelayConfig) -> Result<Arc<dyn DeviceFacade>> {
    let channels = config.hardware.channels.clone();
    channels.validate()?;

    let facade: Arc<dyn DeviceFacade> = match kind {
        FacadeKind::Hardware => Arc::new(HardwareFacade::open(channels, config.hardware.spi_hz)?),
        FacadeKind::Remote => {
            let base_url = config.upstream.base_url.as_deref().ok_or_else(|| {
                RelayError::config_error("remote facade needs upstream.base_url or API_GATEWAY_URL")
            })?;
            Arc::new(RemoteFacade::new(base_url, config.upstream.timeout())?.with_channels(channels))
        }
        FacadeKind::Store => {
            let backend = open_backend(&config.store).await?;
            Arc::new(StoreFacade::new(backend, channels, config.store.lookback()))
        }
    };

    info!("Built {} facade", facade.describe());
    Ok(facade)
}

/// A remote facade aimed at a registered host.
pub fn peer_from_host(host: &Host, timeout: Duration) -> Result<RemoteFacade> {
    RemoteFacade::new(&host.base_url(), timeout)
}

/// Look up the most recently registered host through `registry` and aim a
/// remote facade at it.
pub async fn locate_peer(registry: &dyn DeviceFacade, timeout: Duration) -> Result<RemoteFacade> {
    let host = registry.get_host().await?;
    info!("Located peer at {}:{}", host.ip_address, host.port);
    peer_from_host(&host, timeout)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::StoreFacade;
    use crate::store::Lookback;

    #[test]
    fn test_peer_url_from_host() {
        let peer = peer_from_host(&Host::new("192.168.0.42", 9000), Duration::from_secs(2)).unwrap();
        assert_eq!(peer.base_url().as_str(), "http://192.168.0.42:9000/");
    }

    #[tokio::test]
    async fn test_remote_without_url_is_config_error() {
        let config = RelayConfig::default();
        let err = build_facade(FacadeKind::Remote, &config).await.err().unwrap();
        assert!(matches!(err, RelayError::Config(_)));
    }

    #[tokio::test]
    async fn test_store_facade_from_default_config() {
        let facade = build_facade(FacadeKind::Store, &RelayConfig::default())
            .await
            .unwrap();
        assert_eq!(facade.describe(), "store");
    }

    #[tokio::test]
    async fn test_locate_peer_uses_latest_host() {
        let registry = StoreFacade::new(
            Arc::new(MemoryBackend::new()),
            Default::default(),
            Lookback::default(),
        );
        registry.post_host(Host::new("10.1.1.1", 8080)).await.unwrap();
        let peer = locate_peer(&registry, Duration::from_secs(1)).await.unwrap();
        assert_eq!(peer.base_url().host_str(), Some("10.1.1.1"));
    }
}
