//! Simulated SUMP analyzer.
//!
//! [`VirtualDevice`] stands in for real hardware in tests and demos. It
//! produces a counter test pattern masked to the enabled channel groups,
//! delivered in chunks with a configurable delay between them. The
//! cancellation token is checked before every chunk.
//!
//! Behavior can be scripted with [`VirtualBehavior`]:
//!
//! - [`VirtualBehavior::Complete`] - deliver the full buffer
//! - [`VirtualBehavior::HoldUntilCancelled`] - deliver, then keep the
//!   transfer open (like a device waiting on a trigger) until cancelled
//! - [`VirtualBehavior::FailAfterChunks`] - fail with an I/O error after N chunks

use std::io;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use sump_core::{AcquisitionParameters, DeviceProfile, TransportError};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::device::{DeviceId, SumpDevice};

/// How a [`VirtualDevice`] transfer ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VirtualBehavior {
    /// Deliver every sample, then return
    #[default]
    Complete,
    /// Deliver every sample, then wait for cancellation
    HoldUntilCancelled,
    /// Fail with a broken-pipe error after this many chunks
    FailAfterChunks(usize),
}

/// In-memory analyzer implementing [`SumpDevice`].
pub struct VirtualDevice {
    id: DeviceId,
    profile: Arc<DeviceProfile>,
    behavior: VirtualBehavior,
    chunk_size: usize,
    chunk_delay: Duration,
    captures: AtomicU64,
    last_parameters: Mutex<Option<AcquisitionParameters>>,
}

impl VirtualDevice {
    /// Create a device with the default Logic Sniffer profile.
    pub fn new(id: impl Into<DeviceId>) -> Self {
        Self {
            id: id.into(),
            profile: Arc::new(DeviceProfile::default()),
            behavior: VirtualBehavior::Complete,
            chunk_size: 256,
            chunk_delay: Duration::from_millis(1),
            captures: AtomicU64::new(0),
            last_parameters: Mutex::new(None),
        }
    }

    /// Use a different capability profile.
    pub fn with_profile(mut self, profile: DeviceProfile) -> Self {
        self.profile = Arc::new(profile);
        self
    }

    /// Script how transfers end.
    pub fn with_behavior(mut self, behavior: VirtualBehavior) -> Self {
        self.behavior = behavior;
        self
    }

    /// Samples per chunk (at least 1).
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    /// Delay between chunks.
    pub fn with_chunk_delay(mut self, delay: Duration) -> Self {
        self.chunk_delay = delay;
        self
    }

    /// Number of transfers started on this device.
    pub fn capture_count(&self) -> u64 {
        self.captures.load(Ordering::SeqCst)
    }

    /// Parameters of the most recent transfer.
    pub fn last_parameters(&self) -> Option<AcquisitionParameters> {
        *self.last_parameters.lock()
    }
}

impl SumpDevice for VirtualDevice {
    fn id(&self) -> DeviceId {
        self.id.clone()
    }

    fn profile(&self) -> Arc<DeviceProfile> {
        self.profile.clone()
    }

    fn capture(
        &self,
        params: &AcquisitionParameters,
        cancel: &CancellationToken,
    ) -> Result<Vec<u32>, TransportError> {
        self.captures.fetch_add(1, Ordering::SeqCst);
        *self.last_parameters.lock() = Some(*params);

        let total = params.sample_count as usize;
        let mask = params.sample_mask();
        let mut samples = Vec::with_capacity(total);
        let mut chunk = 0usize;

        debug!(device = %self.id, total, mask, behavior = ?self.behavior, "Virtual transfer armed");

        loop {
            if cancel.is_cancelled() {
                debug!(device = %self.id, received = samples.len(), "Virtual transfer stopped");
                break;
            }

            if samples.len() >= total {
                if self.behavior == VirtualBehavior::HoldUntilCancelled {
                    std::thread::sleep(self.chunk_delay.max(Duration::from_millis(1)));
                    continue;
                }
                break;
            }

            if let VirtualBehavior::FailAfterChunks(limit) = self.behavior {
                if chunk >= limit {
                    return Err(TransportError::Io(io::Error::new(
                        io::ErrorKind::BrokenPipe,
                        format!("virtual link dropped after {} chunks", chunk),
                    )));
                }
            }

            let start = samples.len();
            let end = (start + self.chunk_size).min(total);
            samples.extend((start..end).map(|i| i as u32 & mask));
            chunk += 1;
            trace!(chunk, received = end, "Virtual chunk");

            if !self.chunk_delay.is_zero() {
                std::thread::sleep(self.chunk_delay);
            }
        }

        Ok(samples)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sump_core::CaptureConfig;

    fn params(count: i64, mask: u32) -> AcquisitionParameters {
        let mut config = CaptureConfig::new(Arc::new(DeviceProfile::default()));
        config.set_sample_count(count).unwrap();
        config.set_enabled_channels(mask);
        config.resolve()
    }

    #[test]
    fn test_pattern_masked_to_enabled_groups() {
        let device = VirtualDevice::new("v0").with_chunk_delay(Duration::ZERO);
        let samples = device
            .capture(&params(1024, 0x0000_00FF), &CancellationToken::new())
            .unwrap();

        assert_eq!(samples.len(), 1024);
        assert_eq!(samples[0x1FF], 0xFF);
        assert!(samples.iter().all(|&s| s <= 0xFF));
        assert_eq!(device.capture_count(), 1);
    }

    #[test]
    fn test_cancelled_before_start_returns_nothing() {
        let device = VirtualDevice::new("v0");
        let cancel = CancellationToken::new();
        cancel.cancel();

        let samples = device.capture(&params(1024, u32::MAX), &cancel).unwrap();
        assert!(samples.is_empty());
    }

    #[test]
    fn test_fail_after_chunks() {
        let device = VirtualDevice::new("v0")
            .with_chunk_size(100)
            .with_chunk_delay(Duration::ZERO)
            .with_behavior(VirtualBehavior::FailAfterChunks(2));

        let err = device
            .capture(&params(1024, u32::MAX), &CancellationToken::new())
            .unwrap_err();
        assert!(matches!(err, TransportError::Io(ref e) if e.kind() == io::ErrorKind::BrokenPipe));
    }
}
