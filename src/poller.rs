//! Periodic sampling of analog channels and relaying to an upstream facade.

use crate::device::DeviceFacade;
use crate::model::{AnalogReading, Channel};
use futures_util::stream::{self, BoxStream, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, error, info};

/// Samples a fixed set of analog channels on every tick.
pub struct ReadingPoller {
    facade: Arc<dyn DeviceFacade>,
    channels: Vec<Channel>,
    interval: Duration,
}

/// Totals reported when a relay loop ends.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RelayStats {
    pub forwarded: u64,
    pub failed: u64,
}

impl ReadingPoller {
    pub fn new(facade: Arc<dyn DeviceFacade>, channels: Vec<Channel>, interval: Duration) -> Self {
        Self {
            facade,
            channels,
            interval,
        }
    }

    /// Sample every channel once. Channels that fail are logged and skipped.
    pub async fn sample(&self) -> Vec<AnalogReading> {
        let mut readings = Vec::with_capacity(self.channels.len());
        for &channel in &self.channels {
            match self.facade.get_analog_reading(channel).await {
                Ok(reading) => readings.push(reading),
                Err(e) => error!("Failed to read channel {}: {}", channel, e),
            }
        }
        readings
    }

    /// Endless stream of readings, one batch per tick; the first batch is immediate.
    pub fn stream(self) -> BoxStream<'static, AnalogReading> {
        let mut ticker = time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let batches = stream::unfold((self, ticker), |(poller, mut ticker)| async move {
            ticker.tick().await;
            let batch = poller.sample().await;
            debug!("Sampled {} channels", batch.len());
            Some((stream::iter(batch), (poller, ticker)))
        });

        Box::pin(batches.flatten())
    }
}

/// Forward every reading from `readings` to `upstream` until the stream ends.
///
/// Failed forwards are logged and dropped; nothing is retried.
pub async fn relay(
    mut readings: BoxStream<'static, AnalogReading>,
    upstream: Arc<dyn DeviceFacade>,
) -> RelayStats {
    info!("Relaying readings to {}", upstream.describe());
    let mut stats = RelayStats::default();

    while let Some(reading) = readings.next().await {
        match upstream.update_analog_reading(reading.clone()).await {
            Ok(_) => {
                stats.forwarded += 1;
                debug!("Forwarded channel {} = {:.2}", reading.channel, reading.value);
            }
            Err(e) => {
                stats.failed += 1;
                error!("Failed to forward channel {}: {}", reading.channel, e);
            }
        }
    }

    info!(
        "Relay finished: {} forwarded, {} failed",
        stats.forwarded, stats.failed
    );
    stats
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::{ChannelMap, HardwareFacade, SimulatedAdc, SimulatedPins, StoreFacade};
    use crate::store::{Category, Lookback, MemoryBackend, PartitionKey, PartitionedTimeStore};

    fn hardware() -> Arc<dyn DeviceFacade> {
        Arc::new(HardwareFacade::new(
            SimulatedAdc::new(),
            SimulatedPins::new(),
            ChannelMap::default(),
        ))
    }

    #[tokio::test]
    async fn test_sample_skips_unconfigured_channels() {
        let poller = ReadingPoller::new(hardware(), vec![1, 6, 2], Duration::from_secs(60));
        let channels: Vec<Channel> = poller.sample().await.iter().map(|r| r.channel).collect();
        assert_eq!(channels, vec![1, 2]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_relay_forwards_into_store() {
        let backend = Arc::new(MemoryBackend::new());
        let upstream: Arc<dyn DeviceFacade> = Arc::new(StoreFacade::new(
            backend.clone(),
            ChannelMap::default(),
            Lookback::Unbounded,
        ));

        let poller = ReadingPoller::new(hardware(), vec![0, 1, 2], Duration::from_secs(300));
        let readings = poller.stream().take(6).boxed();
        let stats = relay(readings, upstream).await;
        assert_eq!(stats, RelayStats { forwarded: 6, failed: 0 });

        let store = PartitionedTimeStore::<AnalogReading>::new(backend).with_lookback(Lookback::Unbounded);
        let recent = store
            .recent(&PartitionKey::new(Category::AnalogReading, Some(1)))
            .await
            .unwrap();
        assert!(!recent.is_empty());
    }
}
