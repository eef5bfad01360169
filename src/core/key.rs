use crate::core::features::Fingerprint;
use std::fmt;

pub const DEFAULT_KEY_PRECISION: u8 = 3;
pub const MAX_KEY_PRECISION: u8 = 6;
pub const KEY_DELIMITER: char = '-';

/// Grouping key: every fingerprint bin rounded to a fixed number of
/// fractional digits and stored as an integer.
///
/// Rounding follows fixed-point decimal formatting of the exact value
/// (`format!("{:.3}", v)`), so two fingerprints share a key exactly when
/// their formatted bins agree. `Display` renders that textual form
/// (`0.125-0.000-...`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FeatureKey {
    precision: u8,
    bins: Box<[u32]>,
}

impl FeatureKey {
    /// Quantize `features` to `precision` fractional digits. Empty fingerprints,
    /// and fingerprints holding a non-finite value, have no key.
    pub fn from_fingerprint(features: &Fingerprint, precision: u8) -> Option<Self> {
        if features.is_empty() {
            return None;
        }

        let precision = precision.clamp(1, MAX_KEY_PRECISION);
        let bins = features
            .values()
            .iter()
            .map(|&value| quantize(value, precision))
            .collect::<Option<Box<[u32]>>>()?;

        Some(Self { precision, bins })
    }

    pub fn precision(&self) -> u8 {
        self.precision
    }

    pub fn bins(&self) -> &[u32] {
        &self.bins
    }
}

/// `value` formatted with `precision` fractional digits, read back as an
/// integer count of `10^-precision` steps.
fn quantize(value: f64, precision: u8) -> Option<u32> {
    if !value.is_finite() {
        return None;
    }

    let text = format!("{:.*}", precision as usize, value.max(0.0));
    let (whole, fraction) = text.trim_start_matches('-').split_once('.')?;
    let scale = 10u32.checked_pow(precision as u32)?;
    whole
        .parse::<u32>()
        .ok()?
        .checked_mul(scale)?
        .checked_add(fraction.parse::<u32>().ok()?)
}

impl fmt::Display for FeatureKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let scale = 10u32.pow(self.precision as u32);
        let width = self.precision as usize;
        for (index, bin) in self.bins.iter().enumerate() {
            if index > 0 {
                write!(f, "{}", KEY_DELIMITER)?;
            }
            write!(f, "{}.{:0width$}", bin / scale, bin % scale, width = width)?;
        }
        Ok(())
    }
}
