//! Results of a finished acquisition.

use std::time::Duration;

use sump_core::AcquisitionParameters;

use crate::device::DeviceId;

/// Samples read from a device together with the parameters that produced them.
#[derive(Debug, Clone)]
pub struct CaptureResult {
    /// Device the samples came from
    pub device: DeviceId,
    /// Parameters the device was armed with
    pub parameters: AcquisitionParameters,
    /// Raw samples, one 32-bit word per sample
    pub samples: Vec<u32>,
    /// Time spent in the transport
    pub elapsed: Duration,
}

impl CaptureResult {
    /// Number of samples received.
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Whether no samples arrived.
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Index of the trigger sample, if the buffer reaches it.
    pub fn trigger_position(&self) -> Option<usize> {
        let position = self.parameters.stop_counter as usize;
        (position <= self.samples.len()).then_some(position)
    }

    /// Values of one channel across the buffer.
    pub fn channel(&self, channel: u32) -> Vec<bool> {
        if channel >= 32 {
            return Vec::new();
        }
        self.samples
            .iter()
            .map(|&sample| sample & (1 << channel) != 0)
            .collect()
    }
}

/// How an acquisition ended.
#[derive(Debug, Clone)]
pub enum AcquisitionOutcome {
    /// The transport delivered the full buffer.
    Completed(CaptureResult),
    /// The caller cancelled; holds whatever arrived before the transfer stopped.
    Cancelled(CaptureResult),
}

impl AcquisitionOutcome {
    /// Whether the caller cancelled the acquisition.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled(_))
    }

    /// The captured data, regardless of how the acquisition ended.
    pub fn result(&self) -> &CaptureResult {
        match self {
            Self::Completed(result) | Self::Cancelled(result) => result,
        }
    }

    /// Consume the outcome, keeping the captured data.
    pub fn into_result(self) -> CaptureResult {
        match self {
            Self::Completed(result) | Self::Cancelled(result) => result,
        }
    }
}
