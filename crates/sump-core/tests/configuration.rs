//! Derived-value behavior of the capture configuration engine.
//!
//! Every test runs against the default Logic Sniffer profile (100 MHz
//! reference clock, 32 channels, 20-bit sample-count field).

use std::path::Path;
use std::sync::Arc;

use sump_core::{CaptureConfig, DeviceProfile, SumpError, FIELD_MAX_RATE};

const CLOCK: i64 = 100_000_000;

fn config() -> CaptureConfig {
    CaptureConfig::new(Arc::new(DeviceProfile::default()))
}

fn with_ddr(ddr: bool) -> CaptureConfig {
    let mut config = config();
    config
        .set_sample_rate(if ddr { CLOCK + 1 } else { 1 })
        .unwrap();
    config
}

// =============================================================================
// Input validation
// =============================================================================

#[test]
fn test_sample_rate_clamped_to_field_max() {
    let mut config = config();

    config.set_sample_rate(1).unwrap();
    assert_eq!(config.sample_rate(), 1);

    config.set_sample_rate(0x0FFF_FFFE).unwrap();
    assert_eq!(config.sample_rate(), 0x0FFF_FFFE);

    for hz in [0x0FFF_FFFF, 0x1000_0000, i64::from(i32::MAX), i64::MAX] {
        config.set_sample_rate(hz).unwrap();
        assert_eq!(config.sample_rate(), FIELD_MAX_RATE, "rate {hz:#x}");
    }
}

#[test]
fn test_non_positive_inputs_rejected() {
    let mut config = config();

    for hz in [0, -1, i64::MIN] {
        let err = config.set_sample_rate(hz).unwrap_err();
        assert!(matches!(err, SumpError::InvalidParameter { .. }));
    }

    assert!(config.set_sample_count(0).unwrap_err().is_invalid_parameter());
    assert!(config.set_sample_count(-4).unwrap_err().is_invalid_parameter());
}

#[test]
fn test_trigger_ratio_bounds() {
    let mut config = config();

    config.set_trigger_ratio(0.0).unwrap();
    assert_eq!(config.trigger_ratio(), 0.0);
    config.set_trigger_ratio(1.0).unwrap();
    assert_eq!(config.trigger_ratio(), 1.0);

    assert!(config.set_trigger_ratio(-0.1).is_err());
    assert!(config.set_trigger_ratio(1.1).is_err());
    assert_eq!(config.trigger_ratio(), 1.0);
}

#[test]
fn test_enabled_channels_keep_bit_pattern() {
    let mut config = config();

    config.set_enabled_channels(0u32);
    assert_eq!(config.enabled_channels_mask(), 0);

    config.set_enabled_channels(0xFFFF_FFFFu32);
    assert_eq!(config.enabled_channels_mask(), 0xFFFF_FFFF);

    config.set_enabled_channels(-1i32);
    assert_eq!(config.enabled_channels_mask(), 0xFFFF_FFFF);

    config.set_enabled_channels(i32::MIN);
    assert_eq!(config.enabled_channels_mask(), 0x8000_0000);
}

// =============================================================================
// Clock and DDR
// =============================================================================

#[test]
fn test_clock_speed_is_profile_clock() {
    let mut config = config();
    assert_eq!(config.clock_speed(), 100_000_000);

    config.set_sample_rate(CLOCK * 2).unwrap();
    assert_eq!(config.clock_speed(), 100_000_000);
}

#[test]
fn test_double_data_rate_threshold() {
    let mut config = config();

    for (hz, ddr, channels, groups) in [
        (1, false, 32, 4),
        (CLOCK, false, 32, 4),
        (CLOCK + 1, true, 16, 2),
    ] {
        config.set_sample_rate(hz).unwrap();
        assert_eq!(config.is_double_data_rate_enabled(), ddr, "rate {hz}");
        assert_eq!(config.channel_count(), channels, "rate {hz}");
        assert_eq!(config.group_count(), groups, "rate {hz}");
        assert_eq!(config.is_filter_available(), !ddr, "rate {hz}");
    }
}

#[test]
fn test_divider() {
    let mut config = config();

    for (hz, divider) in [
        (i64::from(i32::MAX), 0),
        (CLOCK, 0),
        (CLOCK >> 1, 1),
        (CLOCK >> 2, 3),
        (1_000_000, 99),
    ] {
        config.set_sample_rate(hz).unwrap();
        assert_eq!(config.divider(), divider, "rate {hz}");
    }
}

// =============================================================================
// Channel groups
// =============================================================================

#[test]
fn test_enabled_group_count() {
    let cases = [
        (0x0000_0000u32, 0, 0),
        (0x0000_00FF, 1, 1),
        (0x0000_FFFF, 2, 2),
        (0x00FF_FFFF, 3, 2),
        (0xFFFF_FFFF, 4, 2),
    ];

    for (mask, without_ddr, with_ddr_count) in cases {
        let mut config = with_ddr(false);
        config.set_enabled_channels(mask);
        assert_eq!(config.enabled_group_count(), without_ddr, "mask {mask:#010x}");
        assert_eq!(config.rle_data_width(), without_ddr * 8, "mask {mask:#010x}");

        let mut config = with_ddr(true);
        config.set_enabled_channels(mask);
        assert_eq!(config.enabled_group_count(), with_ddr_count, "mask {mask:#010x}");
        assert_eq!(config.rle_data_width(), with_ddr_count * 8, "mask {mask:#010x}");
    }
}

#[test]
fn test_is_group_enabled_is_per_byte() {
    let cases: [(u32, [bool; 4]); 15] = [
        (0x0000_00FF, [true, false, false, false]),
        (0x0000_FF00, [false, true, false, false]),
        (0x00FF_0000, [false, false, true, false]),
        (0xFF00_0000, [false, false, false, true]),
        (0x0000_FFFF, [true, true, false, false]),
        (0x00FF_FF00, [false, true, true, false]),
        (0xFFFF_0000, [false, false, true, true]),
        (0xFF00_FF00, [false, true, false, true]),
        (0x00FF_00FF, [true, false, true, false]),
        (0xFF00_00FF, [true, false, false, true]),
        (0x00FF_FFFF, [true, true, true, false]),
        (0xFFFF_FF00, [false, true, true, true]),
        (0xFFFF_00FF, [true, false, true, true]),
        (0xFF00_FFFF, [true, true, false, true]),
        (0xFFFF_FFFF, [true, true, true, true]),
    ];

    for ddr in [false, true] {
        let mut config = with_ddr(ddr);
        for (mask, expected) in cases {
            config.set_enabled_channels(mask);
            for (group, &enabled) in expected.iter().enumerate() {
                assert_eq!(
                    config.is_group_enabled(group as u32),
                    enabled,
                    "mask {mask:#010x} group {group} ddr {ddr}"
                );
            }
        }
    }
}

#[test]
fn test_single_channel_enables_its_group() {
    let mut config = with_ddr(false);
    config.set_enabled_channels(1u32 << 17);
    assert!(config.is_group_enabled(2));
    assert_eq!(config.enabled_group_count(), 1);
}

// =============================================================================
// Sample count and stop counter
// =============================================================================

#[test]
fn test_sample_count_quantization_without_ddr() {
    let mut config = with_ddr(false);

    for (requested, quantized) in [
        (0x03, 0),
        (0x04, 0x04),
        (0x0F_FFFC, 0x0F_FFFC),
        (0x0F_FFFD, 0x0F_FFFC),
        (i64::from(i32::MAX), 0x0F_FFFC),
    ] {
        config.set_sample_count(requested).unwrap();
        assert_eq!(config.sample_count(), quantized, "count {requested:#x}");
    }
}

#[test]
fn test_sample_count_quantization_with_ddr() {
    let mut config = with_ddr(true);

    for (requested, quantized) in [
        (7, 0),
        (8, 8),
        (0x0F_FFF8, 0x0F_FFF8),
        (0x0F_FFF9, 0x0F_FFF8),
        (i64::from(i32::MAX), 0x0F_FFF8),
    ] {
        config.set_sample_count(requested).unwrap();
        assert_eq!(config.sample_count(), quantized, "count {requested:#x}");
    }
}

#[test]
fn test_sample_count_follows_later_rate_change() {
    let mut config = with_ddr(false);
    config.set_sample_count(12).unwrap();
    assert_eq!(config.sample_count(), 12);

    config.set_sample_rate(CLOCK + 1).unwrap();
    assert_eq!(config.sample_count(), 8);
    assert_eq!(config.raw_sample_count(), 12);

    config.set_sample_rate(CLOCK).unwrap();
    assert_eq!(config.sample_count(), 12);
}

#[test]
fn test_stop_counter() {
    let mut config = config();
    config.set_sample_count(1000).unwrap();

    for (ratio, stop) in [(1.0, 1000), (0.5, 500), (0.1, 100), (0.0, 0)] {
        config.set_trigger_ratio(ratio).unwrap();
        assert_eq!(config.stop_counter(), stop, "ratio {ratio}");
    }
}

#[test]
fn test_stop_counter_uses_quantized_count() {
    let mut config = with_ddr(true);
    config.set_sample_count(1003).unwrap();
    config.set_trigger_ratio(1.0).unwrap();

    assert_eq!(config.sample_count(), 1000);
    assert_eq!(config.stop_counter(), 1000);
}

// =============================================================================
// Bundled profiles
// =============================================================================

fn bundled(name: &str) -> DeviceProfile {
    let path = Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("../../profiles")
        .join(name);
    DeviceProfile::load(&path).unwrap()
}

#[test]
fn test_bundled_logic_sniffer_profile_matches_default() {
    assert_eq!(bundled("ols.toml"), DeviceProfile::default());
}

#[test]
fn test_sixteen_channel_profile() {
    let mut config = CaptureConfig::new(Arc::new(bundled("sump-basic.toml")));
    config.set_enabled_channels(u32::MAX);

    assert_eq!(config.group_count(), 2);
    assert_eq!(config.enabled_group_mask(), 0b0011);

    config.set_sample_rate(CLOCK + 1).unwrap();
    assert_eq!(config.channel_count(), 8);
    assert_eq!(config.rle_data_width(), 8);

    config.set_sample_count(i64::from(u32::MAX)).unwrap();
    assert_eq!(config.sample_count(), 0x3FF8);
}
