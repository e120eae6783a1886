//! Error types for capture configuration and acquisition.
//!
//! [`SumpError`] covers every failure a caller of the configuration engine or
//! the acquisition controller can observe. Transport failures are carried as
//! a [`TransportError`] inside [`SumpError::AcquisitionFailed`] so the
//! underlying cause is never lost.
//!
//! All errors are reported synchronously to the caller that triggered them;
//! nothing in this workspace retries internally.

use thiserror::Error;

/// Result type alias for SUMP operations.
pub type Result<T> = std::result::Result<T, SumpError>;

/// Errors raised by the configuration engine and the acquisition controller.
#[derive(Error, Debug)]
pub enum SumpError {
    /// Out-of-range configuration input. The configuration is left unchanged.
    #[error("Invalid {parameter}: {message}")]
    InvalidParameter {
        /// Name of the rejected input
        parameter: &'static str,
        /// What was wrong with it
        message: String,
    },

    /// Acquisition attempted on a device that never had a configuration.
    #[error("No capture configuration known for device '{device}'")]
    NoConfiguration {
        /// Device identifier
        device: String,
    },

    /// Acquisition attempted while the device is already capturing.
    #[error("Device '{device}' is already acquiring")]
    AlreadyAcquiring {
        /// Device identifier
        device: String,
    },

    /// Cancellation requested for a device that is not capturing.
    #[error("Device '{device}' is not acquiring")]
    NotAcquiring {
        /// Device identifier
        device: String,
    },

    /// The transport failed while a capture was in flight.
    #[error("Acquisition on device '{device}' failed: {source}")]
    AcquisitionFailed {
        /// Device identifier
        device: String,
        /// Underlying transport failure
        #[source]
        source: TransportError,
    },
}

impl SumpError {
    pub(crate) fn invalid(parameter: &'static str, message: impl Into<String>) -> Self {
        Self::InvalidParameter {
            parameter,
            message: message.into(),
        }
    }

    /// Check if this is a rejected configuration value.
    pub fn is_invalid_parameter(&self) -> bool {
        matches!(self, Self::InvalidParameter { .. })
    }

    /// Check if the device was busy.
    pub fn is_busy(&self) -> bool {
        matches!(self, Self::AlreadyAcquiring { .. })
    }
}

/// Failures reported by a device transport.
#[derive(Error, Debug)]
pub enum TransportError {
    /// I/O error from the underlying port.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The device answered with something the transport could not interpret.
    #[error("Protocol error: {message}")]
    Protocol {
        /// Description of the unexpected reply
        message: String,
    },

    /// The device profile reports the hardware as not attached.
    #[error("Device is not attached")]
    Detached,

    /// The transfer was torn down before it could report a result.
    #[error("Transfer aborted: {message}")]
    Aborted {
        /// Why the transfer was torn down
        message: String,
    },
}
