//! Capture configuration engine for SUMP-compatible logic analyzers.
//!
//! This crate turns user-level capture intent into the numeric fields the
//! SUMP protocol expects. It performs no I/O and holds no shared state.
//!
//! # Overview
//!
//! - [`DeviceProfile`] - Capabilities of one analyzer (reference clock,
//!   channel count, sample-count field width), loadable from TOML
//! - [`CaptureConfig`] - User inputs plus lazily derived protocol values
//! - [`AcquisitionParameters`] - Snapshot of the derived values for a transport
//! - [`SumpError`] / [`TransportError`] - Error kinds shared with the
//!   acquisition controller
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use sump_core::{CaptureConfig, DeviceProfile};
//!
//! # fn main() -> sump_core::Result<()> {
//! let mut config = CaptureConfig::new(Arc::new(DeviceProfile::default()));
//! config.set_sample_rate(25_000_000)?;
//! config.set_enabled_channels(0x0000_00FFu32);
//! config.set_sample_count(8192)?;
//! config.set_trigger_ratio(0.25)?;
//!
//! let params = config.resolve();
//! assert_eq!(params.divider, 3);
//! assert_eq!(params.rle_data_width, 8);
//! assert_eq!(params.stop_counter, 2048);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod parameters;
pub mod profile;

pub use config::{CaptureConfig, ChannelMask, DEFAULT_SAMPLE_COUNT, FIELD_MAX_RATE};
pub use error::{Result, SumpError, TransportError};
pub use parameters::AcquisitionParameters;
pub use profile::{DeviceProfile, ProfileError};
