//! Device handle abstraction.
//!
//! A [`SumpDevice`] is the transport collaborator the controller drives: it
//! accepts resolved [`AcquisitionParameters`], performs the physical read and
//! hands back the raw sample buffer. Byte framing of SUMP commands lives
//! behind this trait.

use std::fmt;
use std::sync::Arc;

use sump_core::{AcquisitionParameters, DeviceProfile, TransportError};
use tokio_util::sync::CancellationToken;

/// Stable identifier of a device, used as the session registry key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DeviceId(String);

impl DeviceId {
    /// Create a device identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DeviceId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for DeviceId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// A connected SUMP-compatible analyzer.
///
/// Implementations must be usable from several threads: the controller calls
/// [`SumpDevice::capture`] on the acquiring thread while other threads query
/// the profile or cancel through the token.
pub trait SumpDevice: Send + Sync {
    /// Identifier of this device.
    fn id(&self) -> DeviceId;

    /// The device's capability profile.
    fn profile(&self) -> Arc<DeviceProfile>;

    /// Arm the device with `params` and read samples until the buffer is full.
    ///
    /// Blocks the calling thread. Implementations check `cancel` at their
    /// natural suspension points and, once it fires, stop the transfer and
    /// return whatever was received so far. Transport failures are returned
    /// as-is; retrying is up to the implementation.
    fn capture(
        &self,
        params: &AcquisitionParameters,
        cancel: &CancellationToken,
    ) -> Result<Vec<u32>, TransportError>;
}
