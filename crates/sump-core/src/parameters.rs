//! Resolved protocol parameters handed to a device transport.

use serde::Serialize;

/// Every protocol-level value a transport needs to arm the device.
///
/// Produced by [`CaptureConfig::resolve`](crate::CaptureConfig::resolve).
/// Serializing these values into SUMP command bytes is the transport's job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AcquisitionParameters {
    /// Reference clock of the device in Hz
    pub clock_hz: u32,
    /// Requested sample rate in Hz
    pub sample_rate: u32,
    /// Clock divider
    pub divider: u32,
    /// Double-data-rate sampling
    pub double_data_rate: bool,
    /// Usable channels at this rate
    pub channel_count: u32,
    /// Raw channel enable mask
    pub enabled_channels: u32,
    /// Enabled channel groups, bit `g` for group `g`
    pub group_mask: u8,
    /// Bits per sample sent by the RLE encoder
    pub rle_data_width: u32,
    /// Run-length encoding requested
    pub rle_enabled: bool,
    /// Noise filter in effect
    pub filter_enabled: bool,
    /// Quantized sample count
    pub sample_count: u32,
    /// Trigger position within the buffer
    pub stop_counter: u32,
}

impl AcquisitionParameters {
    /// Value for the device's read-count register, in units of 4 samples.
    pub fn read_count(&self) -> u32 {
        self.sample_count / 4
    }

    /// Value for the device's delay-count register, in units of 4 samples.
    pub fn delay_count(&self) -> u32 {
        self.stop_counter / 4
    }

    /// Number of enabled groups within the available ones.
    pub fn enabled_group_count(&self) -> u32 {
        self.group_mask.count_ones()
    }

    /// Bit mask covering every channel of the enabled groups.
    pub fn sample_mask(&self) -> u32 {
        (0..4u32)
            .filter(|&g| self.group_mask & (1u8 << g) != 0)
            .fold(0u32, |mask, g| mask | (0xFFu32 << (g * 8)))
    }
}
