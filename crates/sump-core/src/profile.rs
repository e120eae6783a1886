//! Device capability profiles.
//!
//! A [`DeviceProfile`] declares what a particular analyzer can do: its native
//! reference clock, how many channels it has, and how wide its sample-count
//! field is. The configuration engine never hard-codes these values; every
//! derivation reads them from the active profile.
//!
//! Profiles are plain TOML:
//!
//! ```toml
//! name = "Logic Sniffer"
//! max_clock_hz = 100000000
//! channel_count = 32
//! sample_count_bits = 20
//! attached = true
//! ```
//!
//! Any field can be overridden through `SUMP_PROFILE_<FIELD>` environment
//! variables, e.g. `SUMP_PROFILE_MAX_CLOCK_HZ=200000000`.

use std::path::Path;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Prefix for environment overrides of profile fields.
pub const ENV_PREFIX: &str = "SUMP_PROFILE_";

/// Errors raised while loading a device profile.
#[derive(Debug, thiserror::Error)]
pub enum ProfileError {
    /// File not found
    #[error("Profile file not found: {0}")]
    NotFound(String),

    /// Invalid TOML or mistyped field
    #[error("Failed to parse profile: {0}")]
    Parse(String),

    /// Parsed, but the values make no sense for a SUMP device
    #[error("Profile validation failed: {0}")]
    Invalid(String),
}

/// Capabilities of a SUMP-compatible analyzer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceProfile {
    /// Human-readable device name
    pub name: String,
    /// Native reference clock in Hz
    pub max_clock_hz: u32,
    /// Physical channel count, 16 or 32
    pub channel_count: u32,
    /// Width in bits of the device's sample-count field
    pub sample_count_bits: u32,
    /// Whether the hardware is currently attached
    pub attached: bool,
}

impl Default for DeviceProfile {
    fn default() -> Self {
        // Open Bench Logic Sniffer
        Self {
            name: "Logic Sniffer".to_string(),
            max_clock_hz: 100_000_000,
            channel_count: 32,
            sample_count_bits: 20,
            attached: true,
        }
    }
}

impl DeviceProfile {
    /// Load a profile from a TOML file, applying environment overrides.
    ///
    /// Fields missing from the file fall back to [`DeviceProfile::default`].
    pub fn load(path: &Path) -> Result<Self, ProfileError> {
        if !path.exists() {
            return Err(ProfileError::NotFound(path.display().to_string()));
        }

        debug!("Loading device profile from: {}", path.display());

        let profile: DeviceProfile = Figment::from(Serialized::defaults(DeviceProfile::default()))
            .merge(Toml::file(path))
            .merge(Env::prefixed(ENV_PREFIX))
            .extract()
            .map_err(|e| ProfileError::Parse(e.to_string()))?;

        profile.validate()?;

        info!(
            name = %profile.name,
            max_clock_hz = profile.max_clock_hz,
            channel_count = profile.channel_count,
            "Loaded device profile"
        );

        Ok(profile)
    }

    /// Check that the declared capabilities are usable.
    pub fn validate(&self) -> Result<(), ProfileError> {
        if self.max_clock_hz == 0 {
            return Err(ProfileError::Invalid(
                "max_clock_hz must be greater than 0".to_string(),
            ));
        }

        // DDR halves the bus, which must still leave whole 8-channel groups
        if !matches!(self.channel_count, 16 | 32) {
            return Err(ProfileError::Invalid(format!(
                "channel_count must be 16 or 32, got {}",
                self.channel_count
            )));
        }

        if !(4..=32).contains(&self.sample_count_bits) {
            return Err(ProfileError::Invalid(format!(
                "sample_count_bits must be in 4..=32, got {}",
                self.sample_count_bits
            )));
        }

        Ok(())
    }

    /// Number of 8-bit channel groups on the bus.
    pub fn group_count(&self) -> u32 {
        self.channel_count / 8
    }
}
