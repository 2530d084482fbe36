//! mm ↔ driver-pulse conversion and axis geometry constants.
//!
//! All motion math downstream of this module operates in driver-scale
//! pulses (§3: `pulses_per_rev_driver == 16_777_216`). This is the only
//! place the physical mm-per-revolution constants are named.

use serde::{Deserialize, Serialize};

/// Encoder pulses per motor revolution, before the driver's position factor.
pub const PULSES_PER_REV: i64 = 8_388_608;

/// Driver-side position factor applied uniformly to every target/actual value.
pub const POSITION_FACTOR: i64 = 2;

/// Effective pulses-per-revolution at driver scale (`16_777_216`).
pub const PULSES_PER_REV_DRIVER: i64 = PULSES_PER_REV * POSITION_FACTOR;

static_assertions::const_assert_eq!(PULSES_PER_REV_DRIVER, 16_777_216);

/// Which physical axis a slave drives, selecting its mm-per-revolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AxisKind {
    /// X-axis lead screw: 11.9993 mm per revolution.
    X,
    /// Z-axis lead screw: 5.9997 mm per revolution.
    Z,
}

impl AxisKind {
    /// Millimeters advanced per one motor revolution.
    #[inline]
    pub const fn mm_per_rev(self) -> f64 {
        match self {
            Self::X => 11.9993,
            Self::Z => 5.9997,
        }
    }

    /// Convert a relative distance in mm to relative driver-scale pulses.
    #[inline]
    pub fn mm_to_pulses(self, mm: f64) -> i64 {
        let rev = mm / self.mm_per_rev();
        (rev * PULSES_PER_REV_DRIVER as f64).round() as i64
    }

    /// Convert relative driver-scale pulses back to mm.
    #[inline]
    pub fn pulses_to_mm(self, pulses: i64) -> f64 {
        let rev = pulses as f64 / PULSES_PER_REV_DRIVER as f64;
        rev * self.mm_per_rev()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pulses_per_rev_driver_is_16_777_216() {
        assert_eq!(PULSES_PER_REV_DRIVER, 16_777_216);
    }

    #[test]
    fn s1_z_axis_minus_50mm_matches_formula() {
        // rel = round((mm / mm_per_rev) * pulses_per_rev_driver)
        let expected = ((-50.0_f64 / AxisKind::Z.mm_per_rev()) * PULSES_PER_REV_DRIVER as f64)
            .round() as i64;
        assert_eq!(AxisKind::Z.mm_to_pulses(-50.0), expected);
        // Sanity: well within a driver revolution's fraction of the target mm.
        assert!((AxisKind::Z.pulses_to_mm(expected) - (-50.0)).abs() < 0.001);
    }

    #[test]
    fn round_trip_within_one_pulse() {
        for axis in [AxisKind::X, AxisKind::Z] {
            for mm in [-123.456, -1.0, 0.0, 0.001, 50.0, 999.999] {
                let pulses = axis.mm_to_pulses(mm);
                let back = axis.pulses_to_mm(pulses);
                let back_pulses = axis.mm_to_pulses(back);
                assert!(
                    (back_pulses - pulses).abs() <= 1,
                    "axis={axis:?} mm={mm} pulses={pulses} back_pulses={back_pulses}"
                );
            }
        }
    }

    #[test]
    fn position_factor_keeps_targets_even_multiples_of_pulses_per_rev_factor() {
        // Every encoded target is an integer multiple of POSITION_FACTOR
        // applied uniformly, so dividing by PULSES_PER_REV always yields
        // an integral "revolution * factor" value with even factor baked in.
        let target = AxisKind::Z.mm_to_pulses(-50.0);
        assert_eq!(target % POSITION_FACTOR, 0);
    }
}
