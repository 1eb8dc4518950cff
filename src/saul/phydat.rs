//! Fixed-point physical values exchanged with SAUL drivers.
//!
//! Drivers speak [`Phydat`]: up to three `i16` readings that share one
//! power-of-ten exponent. Scripts speak `f64`. [`encode`] picks the exponent
//! that keeps the most significant digits without overflowing `i16`, and
//! [`decode`] undoes it.
//!
//! # Known limitation
//!
//! The exponent search works on absolute values against [`PHYDAT_MAX`], so
//! `i16::MIN` is never produced by [`encode`]. `-32768` comes back as
//! `-32770` after a round trip.

use thiserror::Error;

/// Number of values carried by one [`Phydat`].
pub const PHYDAT_DIM: usize = 3;

/// Largest magnitude [`encode`] stores in a value slot.
pub const PHYDAT_MAX: i16 = i16::MAX;

/// Unit tag for "no unit". Units are passed through, never interpreted.
pub const UNIT_UNDEF: u8 = 0;

/// A scaled reading: `val[i] * 10^scale`, tagged with an opaque unit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Phydat {
    /// Raw fixed-point values. Slots past the driver's count are unspecified.
    pub val: [i16; PHYDAT_DIM],
    /// Opaque unit tag.
    pub unit: u8,
    /// Decimal exponent shared by every value.
    pub scale: i8,
}

/// Reasons a value list cannot be encoded.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PhydatError {
    /// No values were given.
    #[error("expected at least one value")]
    Empty,
    /// More than [`PHYDAT_DIM`] values were given.
    #[error("at most 3 values are supported, got {0}")]
    TooManyValues(usize),
    /// NaN or infinity.
    #[error("value {0} is not a finite number")]
    NonFinite(f64),
    /// The magnitude needs an exponent beyond `i8::MAX`.
    #[error("value magnitude {0} is too large to represent")]
    Unrepresentable(f64),
}

/// `value / 10^scale`, using an exact power of ten on the divisor side.
fn unscale(value: f64, scale: i32) -> f64 {
    if scale >= 0 {
        value / 10f64.powi(scale)
    } else {
        value * 10f64.powi(-scale)
    }
}

/// `value * 10^scale`, using an exact power of ten on the divisor side.
fn rescale(value: f64, scale: i32) -> f64 {
    if scale >= 0 {
        value * 10f64.powi(scale)
    } else {
        value / 10f64.powi(-scale)
    }
}

/// Encode 1 to 3 floats into a [`Phydat`].
///
/// A single integral value that fits in range is stored as-is with exponent
/// 0, so integers survive unchanged. Otherwise the exponent is chosen so the
/// largest magnitude lands just below [`PHYDAT_MAX`].
pub fn encode(values: &[f64]) -> Result<Phydat, PhydatError> {
    if values.is_empty() {
        return Err(PhydatError::Empty);
    }
    if values.len() > PHYDAT_DIM {
        return Err(PhydatError::TooManyValues(values.len()));
    }
    if let Some(bad) = values.iter().find(|v| !v.is_finite()) {
        return Err(PhydatError::NonFinite(*bad));
    }

    let max = f64::from(PHYDAT_MAX);
    let input_maxabs = values.iter().fold(0.0_f64, |m, v| m.max(v.abs()));
    let mut maxabs = input_maxabs;
    let mut scale: i32 = 0;

    let exact_integer = values.len() == 1 && maxabs == maxabs.round() && maxabs <= max;

    if !exact_integer {
        if maxabs > max {
            while maxabs > max {
                maxabs /= 10.0;
                scale += 1;
            }
        } else {
            // Zero never scales up; the exponent floor bounds subnormal input.
            while maxabs != 0.0 && maxabs * 10.0 < max && scale > i32::from(i8::MIN) {
                maxabs *= 10.0;
                scale -= 1;
            }
        }
    }

    let scale_i8 =
        i8::try_from(scale).map_err(|_overflow| PhydatError::Unrepresentable(input_maxabs))?;

    let mut data = Phydat {
        val: [0; PHYDAT_DIM],
        unit: UNIT_UNDEF,
        scale: scale_i8,
    };
    for (slot, v) in data.val.iter_mut().zip(values) {
        // `as` saturates; the exponent search keeps |v| <= PHYDAT_MAX anyway.
        *slot = unscale(*v, scale).round() as i16;
    }

    Ok(data)
}

/// Decode the first `count` values of a [`Phydat`] (clamped to 3).
pub fn decode(data: &Phydat, count: usize) -> Vec<f64> {
    data.val
        .iter()
        .take(count.min(PHYDAT_DIM))
        .map(|v| rescale(f64::from(*v), i32::from(data.scale)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn round_trip(values: &[f64]) -> (Phydat, Vec<f64>) {
        let data = encode(values).expect("values should encode");
        let back = decode(&data, values.len());
        (data, back)
    }

    /// Half of one quantization step for the chosen exponent.
    fn half_step(data: &Phydat) -> f64 {
        rescale(0.5, i32::from(data.scale))
    }

    #[test]
    fn test_single_integer_kept_exact() {
        let (data, back) = round_trip(&[5.0]);
        assert_eq!(data.scale, 0);
        assert_eq!(data.val[0], 5);
        assert_eq!(back, vec![5.0]);
    }

    #[test]
    fn test_single_negative_integer_kept_exact() {
        let (data, back) = round_trip(&[-1200.0]);
        assert_eq!(data.scale, 0);
        assert_eq!(back, vec![-1200.0]);
    }

    #[test]
    fn test_fraction_maximizes_precision() {
        let (data, back) = round_trip(&[1.5, -2.25, 0.001]);
        assert_eq!(data.scale, -4);
        assert_eq!(data.val, [15000, -22500, 10]);
        assert_eq!(back, vec![1.5, -2.25, 0.001]);
    }

    #[test]
    fn test_large_values_scale_down() {
        let (data, back) = round_trip(&[123_456.0]);
        assert_eq!(data.scale, 1);
        assert_eq!(data.val[0], 12346);
        assert!((back[0] - 123_456.0).abs() <= half_step(&data));
    }

    #[test]
    fn test_integers_in_vectors_are_scaled() {
        // The exact-integer shortcut only applies to a single value.
        let (data, back) = round_trip(&[3.0, 4.0]);
        assert_eq!(data.scale, -3);
        assert_eq!(data.val[..2], [3000, 4000]);
        assert_eq!(back, vec![3.0, 4.0]);
    }

    #[test]
    fn test_zero_vector_terminates() {
        let (data, back) = round_trip(&[0.0, 0.0, 0.0]);
        assert_eq!(data.scale, 0);
        assert_eq!(data.val, [0, 0, 0]);
        assert_eq!(back, vec![0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_round_trip_within_half_step() {
        let cases: &[&[f64]] = &[
            &[21.37],
            &[-0.000_123_4],
            &[9.81, -9.81, 0.5],
            &[32_767.5],
            &[1.0e9, 2.0],
            &[0.333_333, 0.666_666],
        ];
        for values in cases {
            let (data, back) = round_trip(values);
            for (orig, got) in values.iter().zip(&back) {
                assert!(
                    (orig - got).abs() <= half_step(&data) * 1.000_001,
                    "{orig} decoded as {got} (scale {})",
                    data.scale
                );
            }
        }
    }

    #[test]
    fn test_encoded_values_stay_in_range() {
        let (data, _) = round_trip(&[32_767.49, -32_767.49]);
        assert!(data.val.iter().all(|v| *v > i16::MIN));
    }

    #[test]
    fn test_most_negative_value_is_not_produced() {
        // Known boundary: -32768 fits i16 but is rescaled anyway.
        let (data, back) = round_trip(&[-32_768.0]);
        assert_eq!(data.scale, 1);
        assert_eq!(data.val[0], -3277);
        assert_eq!(back, vec![-32_770.0]);
    }

    #[test]
    fn test_tiny_values_hit_exponent_floor() {
        let (data, back) = round_trip(&[1.0e-200]);
        assert_eq!(data.scale, i8::MIN);
        assert_eq!(back, vec![0.0]);
    }

    #[test]
    fn test_rejects_contract_violations() {
        assert_eq!(encode(&[]), Err(PhydatError::Empty));
        assert_eq!(
            encode(&[1.0, 2.0, 3.0, 4.0]),
            Err(PhydatError::TooManyValues(4))
        );
        assert!(matches!(encode(&[f64::NAN]), Err(PhydatError::NonFinite(_))));
        assert!(matches!(
            encode(&[1.0, f64::INFINITY]),
            Err(PhydatError::NonFinite(_))
        ));
        assert!(matches!(
            encode(&[1.0e300]),
            Err(PhydatError::Unrepresentable(_))
        ));
    }

    #[test]
    fn test_decode_respects_count() {
        let data = Phydat {
            val: [12, 34, 56],
            unit: UNIT_UNDEF,
            scale: -1,
        };
        assert_eq!(decode(&data, 1), vec![1.2]);
        assert_eq!(decode(&data, 3), vec![1.2, 3.4, 5.6]);
        assert_eq!(decode(&data, 7).len(), 3);
        assert!(decode(&data, 0).is_empty());
    }
}
