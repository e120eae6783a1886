//! Acquisition lifecycle control for SUMP-compatible logic analyzers.
//!
//! This crate drives a [`CaptureConfig`](sump_core::CaptureConfig) against a
//! connected device: it starts a capture, tracks whether the device is busy,
//! lets another thread cancel the transfer, and reports the result.
//!
//! # Architecture
//!
//! - [`AcquisitionController`] - Per-device session registry and lifecycle
//! - [`SumpDevice`] - Transport seam: resolved parameters in, samples out
//! - [`AcquisitionOutcome`] / [`CaptureResult`] - What a capture produced
//! - [`VirtualDevice`] - Simulated analyzer for tests and demos
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use sump_acquisition::{AcquisitionController, SumpDevice, VirtualDevice};
//! use sump_core::CaptureConfig;
//!
//! # fn main() -> sump_core::Result<()> {
//! let device = Arc::new(VirtualDevice::new("ols0"));
//! let controller = AcquisitionController::new();
//!
//! let mut config = CaptureConfig::new(device.profile());
//! config.set_sample_rate(10_000_000)?;
//! config.set_sample_count(1024)?;
//!
//! let outcome = controller.acquire_with_config(&device, config)?;
//! assert_eq!(outcome.result().len(), 1024);
//!
//! // Later captures reuse the stored configuration
//! let again = controller.acquire(&device)?;
//! assert!(!again.is_cancelled());
//! # Ok(())
//! # }
//! ```

pub mod capture;
pub mod controller;
pub mod device;
mod session;
pub mod virtual_device;

pub use capture::{AcquisitionOutcome, CaptureResult};
pub use controller::AcquisitionController;
pub use device::{DeviceId, SumpDevice};
pub use session::AcquisitionState;
pub use virtual_device::{VirtualBehavior, VirtualDevice};
