//! Per-device capture sessions.
//!
//! A [`CaptureSession`] is created the first time a device is used for an
//! acquisition and lives until the controller is disposed while it is idle. Its device
//! handle, last configuration and lifecycle state sit behind one mutex, so
//! the `Idle -> Acquiring` check and transition happen atomically.

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use sump_core::CaptureConfig;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::device::{DeviceId, SumpDevice};

/// Observable lifecycle state of a device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcquisitionState {
    /// Ready for a new acquisition
    Idle,
    /// A transfer is in flight
    Acquiring,
}

enum SessionState {
    Idle,
    Acquiring {
        cancel: CancellationToken,
        started: Instant,
    },
}

struct SessionInner {
    device: Arc<dyn SumpDevice>,
    config: Option<CaptureConfig>,
    state: SessionState,
    /// Dropped from the registry; never starts again
    disposed: bool,
}

/// Session record for one device.
pub(crate) struct CaptureSession {
    id: DeviceId,
    inner: Mutex<SessionInner>,
}

/// Everything an acquiring thread needs once the session is marked busy.
pub(crate) struct ArmedCapture {
    pub device: Arc<dyn SumpDevice>,
    pub config: CaptureConfig,
    pub cancel: CancellationToken,
}

/// Why a session refused to start an acquisition.
pub(crate) enum StartRefusal {
    NoConfiguration,
    AlreadyAcquiring,
}

impl CaptureSession {
    pub fn new(device: Arc<dyn SumpDevice>) -> Self {
        Self {
            id: device.id(),
            inner: Mutex::new(SessionInner {
                device,
                config: None,
                state: SessionState::Idle,
                disposed: false,
            }),
        }
    }

    pub fn id(&self) -> &DeviceId {
        &self.id
    }

    /// Replace the stored configuration.
    pub fn store_config(&self, config: CaptureConfig) {
        self.inner.lock().config = Some(config);
    }

    pub fn config(&self) -> Option<CaptureConfig> {
        self.inner.lock().config.clone()
    }

    /// Atomically move `Idle -> Acquiring` using the stored configuration.
    ///
    /// `device` replaces the stored handle when the transition succeeds. The
    /// configuration is cloned so later edits never reach the in-flight
    /// capture.
    pub fn try_start(&self, device: Arc<dyn SumpDevice>) -> Result<ArmedCapture, StartRefusal> {
        let mut inner = self.inner.lock();

        if inner.disposed {
            return Err(StartRefusal::NoConfiguration);
        }

        let config = inner
            .config
            .clone()
            .ok_or(StartRefusal::NoConfiguration)?;

        if matches!(inner.state, SessionState::Acquiring { .. }) {
            return Err(StartRefusal::AlreadyAcquiring);
        }

        let cancel = CancellationToken::new();
        inner.state = SessionState::Acquiring {
            cancel: cancel.clone(),
            started: Instant::now(),
        };
        inner.device = device;

        Ok(ArmedCapture {
            device: inner.device.clone(),
            config,
            cancel,
        })
    }

    /// Return to `Idle`, reporting how long the session was busy.
    pub fn finish(&self) -> Option<Duration> {
        let mut inner = self.inner.lock();
        match std::mem::replace(&mut inner.state, SessionState::Idle) {
            SessionState::Acquiring { started, .. } => Some(started.elapsed()),
            SessionState::Idle => None,
        }
    }

    /// Fire the in-flight cancellation token. Returns `false` when idle.
    pub fn request_cancel(&self) -> bool {
        match &self.inner.lock().state {
            SessionState::Acquiring { cancel, .. } => {
                cancel.cancel();
                true
            }
            SessionState::Idle => false,
        }
    }

    /// Forget the stored configuration and cancel any in-flight transfer.
    ///
    /// Returns `true` while a transfer is still running; the session must
    /// then stay registered so the device reads as busy until the transport
    /// stops. An idle session is marked disposed and refuses to start.
    pub fn dispose(&self) -> bool {
        let mut inner = self.inner.lock();
        inner.config = None;

        let in_flight = match &inner.state {
            SessionState::Acquiring { cancel, .. } => {
                cancel.cancel();
                true
            }
            SessionState::Idle => false,
        };
        if !in_flight {
            inner.disposed = true;
        }
        in_flight
    }

    pub fn state(&self) -> AcquisitionState {
        match self.inner.lock().state {
            SessionState::Idle => AcquisitionState::Idle,
            SessionState::Acquiring { .. } => AcquisitionState::Acquiring,
        }
    }

    pub fn is_acquiring(&self) -> bool {
        self.state() == AcquisitionState::Acquiring
    }
}

/// Returns the session to `Idle` when the acquiring scope ends, including
/// on unwind out of a transport.
pub(crate) struct AcquiringGuard {
    session: Arc<CaptureSession>,
}

impl AcquiringGuard {
    pub fn new(session: Arc<CaptureSession>) -> Self {
        Self { session }
    }
}

impl Drop for AcquiringGuard {
    fn drop(&mut self) {
        if let Some(busy) = self.session.finish() {
            debug!(device = %self.session.id(), busy_ms = busy.as_millis() as u64, "Session idle");
        }
    }
}
