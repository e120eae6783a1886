//! Capture configuration engine.
//!
//! [`CaptureConfig`] stores the four user-level inputs of a capture (sample
//! rate, enabled channels, requested sample count, trigger ratio) together
//! with the active [`DeviceProfile`], and derives every protocol-level field
//! from them on demand.
//!
//! # Read-order contract
//!
//! No derived value is ever stored. Each getter is a pure function of
//! `(sample_rate, enabled_channels, raw_sample_count, trigger_ratio, profile)`
//! evaluated at the time of the call. Changing the sample rate therefore
//! changes what [`CaptureConfig::sample_count`] and
//! [`CaptureConfig::enabled_group_count`] return on the next read, because
//! crossing the reference clock toggles double-data-rate mode:
//!
//! ```
//! use std::sync::Arc;
//! use sump_core::{CaptureConfig, DeviceProfile};
//!
//! # fn main() -> sump_core::Result<()> {
//! let profile = Arc::new(DeviceProfile::default());
//! let clock = profile.max_clock_hz as i64;
//! let mut config = CaptureConfig::new(profile);
//!
//! config.set_sample_count(12)?;
//! config.set_sample_rate(clock)?;
//! assert_eq!(config.sample_count(), 12);
//!
//! // DDR quantizes to multiples of 8
//! config.set_sample_rate(clock + 1)?;
//! assert_eq!(config.sample_count(), 8);
//! # Ok(())
//! # }
//! ```
//!
//! # Double data rate
//!
//! Requesting a rate above the profile's reference clock switches the device
//! into DDR mode: two samples per clock, half the channels, no noise filter,
//! and a coarser sample-count quantum.

use std::sync::Arc;

use tracing::trace;

use crate::error::{Result, SumpError};
use crate::parameters::AcquisitionParameters;
use crate::profile::DeviceProfile;

/// Largest sample rate the protocol's rate field can carry (2^28 - 1).
pub const FIELD_MAX_RATE: u32 = 0x0FFF_FFFF;

/// Sample count used by a fresh configuration.
pub const DEFAULT_SAMPLE_COUNT: u64 = 4096;

/// Sample-count quantum without DDR.
const SDR_COUNT_UNIT: u64 = 4;
/// Sample-count quantum with DDR.
const DDR_COUNT_UNIT: u64 = 8;

/// Raw 32-bit channel enable pattern.
///
/// Converting from `i32` keeps the two's-complement bit pattern, so `-1`
/// becomes `0xFFFF_FFFF` rather than being clamped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ChannelMask(pub u32);

impl ChannelMask {
    /// Every channel enabled.
    pub const ALL: ChannelMask = ChannelMask(u32::MAX);

    /// The raw bit pattern.
    pub fn bits(self) -> u32 {
        self.0
    }
}

impl From<u32> for ChannelMask {
    fn from(bits: u32) -> Self {
        Self(bits)
    }
}

impl From<i32> for ChannelMask {
    fn from(bits: i32) -> Self {
        Self(bits as u32)
    }
}

/// User-level capture settings for one device.
#[derive(Debug, Clone)]
pub struct CaptureConfig {
    profile: Arc<DeviceProfile>,
    sample_rate: u32,
    enabled_channels: u32,
    sample_count: u64,
    trigger_ratio: f64,
    rle_enabled: bool,
    filter_enabled: bool,
}

impl CaptureConfig {
    /// Create a configuration bound to `profile`.
    ///
    /// Starts at the profile's native clock with every channel enabled,
    /// [`DEFAULT_SAMPLE_COUNT`] samples and the trigger centered.
    pub fn new(profile: Arc<DeviceProfile>) -> Self {
        Self {
            sample_rate: profile.max_clock_hz.clamp(1, FIELD_MAX_RATE),
            profile,
            enabled_channels: ChannelMask::ALL.bits(),
            sample_count: DEFAULT_SAMPLE_COUNT,
            trigger_ratio: 0.5,
            rle_enabled: false,
            filter_enabled: false,
        }
    }

    // =========================================================================
    // Stored fields
    // =========================================================================

    /// Set the requested sample rate in Hz.
    ///
    /// Values above [`FIELD_MAX_RATE`] are clamped down to it.
    pub fn set_sample_rate(&mut self, hz: i64) -> Result<()> {
        if hz <= 0 {
            return Err(SumpError::invalid(
                "sample rate",
                format!("must be positive, got {}", hz),
            ));
        }

        self.sample_rate = hz.min(FIELD_MAX_RATE as i64) as u32;
        trace!(requested = hz, stored = self.sample_rate, "Set sample rate");
        Ok(())
    }

    /// Requested sample rate in Hz, after clamping.
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Set the requested number of samples.
    ///
    /// The raw value is kept as-is; quantization happens in
    /// [`CaptureConfig::sample_count`].
    pub fn set_sample_count(&mut self, count: i64) -> Result<()> {
        if count <= 0 {
            return Err(SumpError::invalid(
                "sample count",
                format!("must be positive, got {}", count),
            ));
        }

        self.sample_count = count as u64;
        Ok(())
    }

    /// The sample count exactly as requested.
    pub fn raw_sample_count(&self) -> u64 {
        self.sample_count
    }

    /// Set the enabled channel bitmask. Never rejects.
    pub fn set_enabled_channels(&mut self, mask: impl Into<ChannelMask>) {
        self.enabled_channels = mask.into().bits();
    }

    /// The enabled channel bitmask as stored.
    pub fn enabled_channels_mask(&self) -> u32 {
        self.enabled_channels
    }

    /// Set the trigger position as a fraction of the buffer, `0.0..=1.0`.
    pub fn set_trigger_ratio(&mut self, ratio: f64) -> Result<()> {
        if !(0.0..=1.0).contains(&ratio) {
            return Err(SumpError::invalid(
                "trigger ratio",
                format!("must be within [0.0, 1.0], got {}", ratio),
            ));
        }

        self.trigger_ratio = ratio;
        Ok(())
    }

    /// Trigger position as a fraction of the buffer.
    pub fn trigger_ratio(&self) -> f64 {
        self.trigger_ratio
    }

    /// Associate a different device profile.
    pub fn set_device_profile(&mut self, profile: Arc<DeviceProfile>) {
        self.profile = profile;
    }

    /// The active device profile.
    pub fn device_profile(&self) -> &Arc<DeviceProfile> {
        &self.profile
    }

    /// Enable run-length encoding on the device.
    pub fn set_rle_enabled(&mut self, enabled: bool) {
        self.rle_enabled = enabled;
    }

    /// Whether run-length encoding is requested.
    pub fn is_rle_enabled(&self) -> bool {
        self.rle_enabled
    }

    /// Request the noise filter. Only honored when [`CaptureConfig::is_filter_available`].
    pub fn set_filter_enabled(&mut self, enabled: bool) {
        self.filter_enabled = enabled;
    }

    /// Whether the noise filter will actually be used.
    pub fn is_filter_enabled(&self) -> bool {
        self.filter_enabled && self.is_filter_available()
    }

    // =========================================================================
    // Derived values
    // =========================================================================

    /// The profile's native reference clock, independent of the sample rate.
    pub fn clock_speed(&self) -> u32 {
        self.profile.max_clock_hz
    }

    /// DDR is used whenever the requested rate exceeds the reference clock.
    pub fn is_double_data_rate_enabled(&self) -> bool {
        self.sample_rate > self.profile.max_clock_hz
    }

    /// Usable channels: the full bus, or half of it under DDR.
    ///
    /// The bus width comes from the profile. The Logic Sniffer's 32 channels
    /// give 32, or 16 under DDR; a 16-channel profile gives 16 or 8.
    pub fn channel_count(&self) -> u32 {
        if self.is_double_data_rate_enabled() {
            self.profile.channel_count / 2
        } else {
            self.profile.channel_count
        }
    }

    /// Number of 8-bit channel groups available at the current rate.
    pub fn group_count(&self) -> u32 {
        self.channel_count() / 8
    }

    /// Clock divider: `max(0, floor(clock / rate) - 1)`.
    pub fn divider(&self) -> u32 {
        (self.profile.max_clock_hz / self.sample_rate).saturating_sub(1)
    }

    /// Whether any channel in byte `group` of the raw mask is enabled.
    ///
    /// This is a plain per-byte test; it does not consult
    /// [`CaptureConfig::group_count`].
    pub fn is_group_enabled(&self, group: u32) -> bool {
        group < 4 && (self.enabled_channels >> (group * 8)) & 0xFF != 0
    }

    /// Bit `g` is set for each available group `g` with an enabled channel.
    pub fn enabled_group_mask(&self) -> u8 {
        (0..self.group_count())
            .filter(|&g| self.is_group_enabled(g))
            .fold(0u8, |mask, g| mask | (1 << g))
    }

    /// Enabled groups, restricted to the groups available at the current rate.
    pub fn enabled_group_count(&self) -> u32 {
        self.enabled_group_mask().count_ones()
    }

    /// Bits per sample sent by the RLE encoder.
    pub fn rle_data_width(&self) -> u32 {
        self.enabled_group_count() * 8
    }

    /// The noise filter cannot be combined with DDR.
    pub fn is_filter_available(&self) -> bool {
        !self.is_double_data_rate_enabled()
    }

    /// Requested sample count quantized for the device.
    ///
    /// Rounded down to a multiple of 4 (8 under DDR), then clamped to the
    /// largest such multiple the profile's count field can hold.
    pub fn sample_count(&self) -> u32 {
        let unit = if self.is_double_data_rate_enabled() {
            DDR_COUNT_UNIT
        } else {
            SDR_COUNT_UNIT
        };
        let field = 1u64
            .checked_shl(self.profile.sample_count_bits)
            .unwrap_or(u64::MAX)
            .saturating_sub(unit);
        let max_field = field.min(u64::from(u32::MAX)) / unit * unit;

        ((self.sample_count / unit) * unit).min(max_field) as u32
    }

    /// Sample index at which the trigger sits in the quantized buffer.
    pub fn stop_counter(&self) -> u32 {
        (f64::from(self.sample_count()) * self.trigger_ratio).round() as u32
    }

    /// Snapshot every derived value for the transport.
    pub fn resolve(&self) -> AcquisitionParameters {
        AcquisitionParameters {
            clock_hz: self.clock_speed(),
            sample_rate: self.sample_rate,
            divider: self.divider(),
            double_data_rate: self.is_double_data_rate_enabled(),
            channel_count: self.channel_count(),
            enabled_channels: self.enabled_channels,
            group_mask: self.enabled_group_mask(),
            rle_data_width: self.rle_data_width(),
            rle_enabled: self.rle_enabled,
            filter_enabled: self.is_filter_enabled(),
            sample_count: self.sample_count(),
            stop_counter: self.stop_counter(),
        }
    }
}
