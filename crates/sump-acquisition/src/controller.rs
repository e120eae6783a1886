//! Acquisition lifecycle controller.
//!
//! The controller keeps one capture session per device, keyed by
//! [`DeviceId`]. Each session is guarded by its own lock, so acquisitions on
//! unrelated devices never contend with each other.
//!
//! # Lifecycle
//!
//! ```text
//!            acquire                capture returns
//!   ┌──────┐ ───────▶ ┌───────────┐ ───────────────▶ ┌──────┐
//!   │ Idle │          │ Acquiring │  (done, failed,  │ Idle │
//!   └──────┘          └───────────┘   or cancelled)  └──────┘
//!                         ▲    │
//!                 cancel  │    │ token observed by transport
//!                         └────┘
//! ```
//!
//! [`AcquisitionController::acquire`] blocks until the transport returns.
//! [`AcquisitionController::cancel`] and the `is_*` queries never block on a
//! transfer and may be called from any thread while one is in flight.
//! Cancellation is cooperative: the session stays `Acquiring` until the
//! transport has actually stopped.
//!
//! No timeout is imposed here. Callers that need a deadline can run
//! [`AcquisitionController::acquire_async`] under a timer and cancel on expiry.

use std::sync::Arc;
use std::time::Instant;

use dashmap::DashMap;
use sump_core::{CaptureConfig, Result, SumpError, TransportError};
use tracing::{debug, info, warn};

use crate::capture::{AcquisitionOutcome, CaptureResult};
use crate::device::{DeviceId, SumpDevice};
use crate::session::{AcquiringGuard, AcquisitionState, CaptureSession, StartRefusal};

/// Drives captures on SUMP devices.
#[derive(Default)]
pub struct AcquisitionController {
    sessions: DashMap<DeviceId, Arc<CaptureSession>>,
}

impl AcquisitionController {
    /// Create a controller with no sessions.
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire from `device` using the last configuration stored for it.
    ///
    /// # Errors
    ///
    /// - [`SumpError::NoConfiguration`] if no configuration was ever associated
    /// - [`SumpError::AlreadyAcquiring`] if the device is busy
    /// - [`SumpError::AcquisitionFailed`] if the transport fails or the device
    ///   is not attached
    pub fn acquire<D>(&self, device: &Arc<D>) -> Result<AcquisitionOutcome>
    where
        D: SumpDevice + 'static,
    {
        let handle: Arc<dyn SumpDevice> = device.clone();
        let session = self.session(&handle);
        self.run(session, handle)
    }

    /// Store `config` as the device's configuration, then acquire with it.
    ///
    /// The configuration is bound to the device's own profile before it is
    /// stored. It is kept even if the acquisition is refused.
    pub fn acquire_with_config<D>(
        &self,
        device: &Arc<D>,
        config: CaptureConfig,
    ) -> Result<AcquisitionOutcome>
    where
        D: SumpDevice + 'static,
    {
        self.configure(device, config);
        self.acquire(device)
    }

    /// Associate `config` with `device` without starting a capture.
    ///
    /// Safe to call while the device is acquiring; the in-flight capture
    /// keeps the configuration it started with.
    pub fn configure<D>(&self, device: &Arc<D>, mut config: CaptureConfig)
    where
        D: SumpDevice + 'static,
    {
        let handle: Arc<dyn SumpDevice> = device.clone();
        config.set_device_profile(handle.profile());
        self.session(&handle).store_config(config);
    }

    /// Run an acquisition on the blocking thread pool.
    ///
    /// Dropping the returned future does not stop the capture; call
    /// [`AcquisitionController::cancel`] for that.
    pub async fn acquire_async<D>(
        self: Arc<Self>,
        device: Arc<D>,
        config: Option<CaptureConfig>,
    ) -> Result<AcquisitionOutcome>
    where
        D: SumpDevice + 'static,
    {
        let id = device.id();
        tokio::task::spawn_blocking(move || match config {
            Some(config) => self.acquire_with_config(&device, config),
            None => self.acquire(&device),
        })
        .await
        .map_err(|e| SumpError::AcquisitionFailed {
            device: id.to_string(),
            source: TransportError::Aborted {
                message: e.to_string(),
            },
        })?
    }

    /// Request cancellation of the in-flight acquisition on `device`.
    ///
    /// Returns once the request is signalled, not once the transfer stopped.
    pub fn cancel(&self, device: &DeviceId) -> Result<()> {
        let session = self.sessions.get(device).map(|entry| entry.value().clone());

        match session {
            Some(session) if session.request_cancel() => {
                info!(device = %device, "Cancellation requested");
                Ok(())
            }
            _ => Err(SumpError::NotAcquiring {
                device: device.to_string(),
            }),
        }
    }

    /// Whether any device is currently acquiring.
    pub fn is_acquiring(&self) -> bool {
        self.sessions
            .iter()
            .any(|entry| entry.value().is_acquiring())
    }

    /// Whether `device` is currently acquiring.
    pub fn is_device_acquiring(&self, device: &DeviceId) -> bool {
        self.state(device) == AcquisitionState::Acquiring
    }

    /// Lifecycle state of `device`. Unknown devices are `Idle`.
    pub fn state(&self, device: &DeviceId) -> AcquisitionState {
        self.sessions
            .get(device)
            .map(|entry| entry.value().state())
            .unwrap_or(AcquisitionState::Idle)
    }

    /// A copy of the configuration last associated with `device`.
    pub fn configuration(&self, device: &DeviceId) -> Option<CaptureConfig> {
        self.sessions
            .get(device)
            .and_then(|entry| entry.value().config())
    }

    /// Cancel every in-flight acquisition and forget all configurations.
    ///
    /// Idle sessions are dropped. A session whose transfer is still stopping
    /// stays registered and keeps reporting `Acquiring` until the transport
    /// returns, so the device cannot be armed a second time underneath it.
    /// It comes back `Idle` with no configuration.
    pub fn dispose(&self) {
        self.sessions.retain(|id, session| {
            let in_flight = session.dispose();
            if in_flight {
                debug!(device = %id, "Cancelled on dispose");
            }
            in_flight
        });
    }

    fn session(&self, device: &Arc<dyn SumpDevice>) -> Arc<CaptureSession> {
        self.sessions
            .entry(device.id())
            .or_insert_with(|| {
                debug!(device = %device.id(), "Created capture session");
                Arc::new(CaptureSession::new(device.clone()))
            })
            .value()
            .clone()
    }

    fn run(
        &self,
        session: Arc<CaptureSession>,
        device: Arc<dyn SumpDevice>,
    ) -> Result<AcquisitionOutcome> {
        let id = session.id().clone();

        let armed = session.try_start(device).map_err(|refusal| match refusal {
            StartRefusal::NoConfiguration => SumpError::NoConfiguration {
                device: id.to_string(),
            },
            StartRefusal::AlreadyAcquiring => SumpError::AlreadyAcquiring {
                device: id.to_string(),
            },
        })?;
        let _guard = AcquiringGuard::new(session);

        if !armed.device.profile().attached {
            warn!(device = %id, "Refusing to acquire from detached device");
            return Err(SumpError::AcquisitionFailed {
                device: id.to_string(),
                source: TransportError::Detached,
            });
        }

        let parameters = armed.config.resolve();
        info!(
            device = %id,
            sample_rate = parameters.sample_rate,
            sample_count = parameters.sample_count,
            channels = parameters.channel_count,
            "Starting acquisition"
        );
        debug!(
            divider = parameters.divider,
            group_mask = parameters.group_mask,
            rle_data_width = parameters.rle_data_width,
            stop_counter = parameters.stop_counter,
            ddr = parameters.double_data_rate,
            "Resolved acquisition parameters"
        );

        let started = Instant::now();
        let samples = armed
            .device
            .capture(&parameters, &armed.cancel)
            .map_err(|source| {
                warn!(device = %id, error = %source, "Acquisition failed");
                SumpError::AcquisitionFailed {
                    device: id.to_string(),
                    source,
                }
            })?;

        let result = CaptureResult {
            device: id.clone(),
            parameters,
            samples,
            elapsed: started.elapsed(),
        };

        if armed.cancel.is_cancelled() {
            info!(device = %id, samples = result.len(), "Acquisition cancelled");
            Ok(AcquisitionOutcome::Cancelled(result))
        } else {
            info!(
                device = %id,
                samples = result.len(),
                elapsed_ms = result.elapsed.as_millis() as u64,
                "Acquisition complete"
            );
            Ok(AcquisitionOutcome::Completed(result))
        }
    }
}

impl Drop for AcquisitionController {
    fn drop(&mut self) {
        self.dispose();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::virtual_device::{VirtualBehavior, VirtualDevice};
    use std::time::Duration;
    use sump_core::DeviceProfile;
    use tracing_test::traced_test;

    fn wait_until_acquiring(controller: &AcquisitionController, id: &DeviceId) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while !controller.is_device_acquiring(id) {
            assert!(Instant::now() < deadline, "device never started acquiring");
            std::thread::sleep(Duration::from_millis(1));
        }
    }

    #[test]
    fn test_configuration_bound_to_device_profile() {
        let profile = DeviceProfile {
            max_clock_hz: 50_000_000,
            ..DeviceProfile::default()
        };
        let device = Arc::new(VirtualDevice::new("ols0").with_profile(profile));
        let controller = AcquisitionController::new();

        let config = CaptureConfig::new(Arc::new(DeviceProfile::default()));
        controller.acquire_with_config(&device, config).unwrap();

        let stored = controller.configuration(&device.id()).unwrap();
        assert_eq!(stored.clock_speed(), 50_000_000);
    }

    #[test]
    fn test_detached_device_refused() {
        let profile = DeviceProfile {
            attached: false,
            ..DeviceProfile::default()
        };
        let device = Arc::new(VirtualDevice::new("ols0").with_profile(profile));
        let controller = AcquisitionController::new();
        let config = CaptureConfig::new(device.profile());

        let err = controller.acquire_with_config(&device, config).unwrap_err();
        assert!(matches!(
            err,
            SumpError::AcquisitionFailed {
                source: TransportError::Detached,
                ..
            }
        ));
        assert!(!controller.is_acquiring());
        assert_eq!(device.capture_count(), 0);
    }

    #[test]
    #[traced_test]
    fn test_lifecycle_is_logged() {
        let device = Arc::new(
            VirtualDevice::new("ols0").with_behavior(VirtualBehavior::HoldUntilCancelled),
        );
        let controller = Arc::new(AcquisitionController::new());
        let config = CaptureConfig::new(device.profile());

        let canceller = {
            let controller = controller.clone();
            let id = device.id();
            std::thread::spawn(move || {
                wait_until_acquiring(&controller, &id);
                controller.cancel(&id)
            })
        };

        let outcome = controller.acquire_with_config(&device, config).unwrap();
        assert!(outcome.is_cancelled());
        canceller.join().unwrap().unwrap();

        assert!(logs_contain("Starting acquisition"));
        assert!(logs_contain("Acquisition cancelled"));
    }

    #[test]
    fn test_dispose_cancels_in_flight() {
        let device = Arc::new(
            VirtualDevice::new("ols0").with_behavior(VirtualBehavior::HoldUntilCancelled),
        );
        let controller = Arc::new(AcquisitionController::new());
        let config = CaptureConfig::new(device.profile());

        let worker = {
            let controller = controller.clone();
            let device = device.clone();
            std::thread::spawn(move || controller.acquire_with_config(&device, config))
        };

        wait_until_acquiring(&controller, &device.id());
        controller.dispose();

        assert!(worker.join().unwrap().unwrap().is_cancelled());
        assert!(controller.configuration(&device.id()).is_none());
    }
}
