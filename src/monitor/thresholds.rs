//! Severity bands: a strictly descending ratio table terminated by the `0` re-arm sentinel.

use crate::core::errors::{MonError, Result};

/// Default bands, most severe first. The trailing `0.0` is the re-arm sentinel.
pub const DEFAULT_THRESHOLDS: [f64; 12] = [
    0.999, 0.998, 0.997, 0.996, 0.995, 0.99, 0.985, 0.98, 0.95, 0.9, 0.8, 0.0,
];

/// Band selected for a usage ratio.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Band {
    /// Below every alerting threshold: the volume is fully re-armed.
    Sentinel,
    /// The tightest alerting threshold the ratio meets or exceeds.
    Threshold(f64),
}

/// Ordered alerting thresholds.
///
/// Invariant: values are finite, lie in `[0, 1]`, strictly descend, and the last
/// one is exactly `0.0`. Construction rejects anything else, so lookups never
/// depend on the caller keeping the list sorted.
#[derive(Debug, Clone, PartialEq)]
pub struct ThresholdTable {
    bands: Vec<f64>,
}

impl ThresholdTable {
    /// Build a table, validating the descending-with-sentinel invariant.
    pub fn new(bands: Vec<f64>) -> Result<Self> {
        validate_bands(&bands)?;
        Ok(Self { bands })
    }

    /// Thresholds in scan order, sentinel included.
    #[must_use]
    pub fn bands(&self) -> &[f64] {
        &self.bands
    }

    /// Alerting thresholds only (sentinel excluded).
    pub fn alerting(&self) -> impl Iterator<Item = f64> + '_ {
        self.bands.iter().copied().filter(|t| *t > 0.0)
    }

    /// First (highest) band the ratio meets or exceeds. Ties count as meeting.
    #[must_use]
    pub fn band_for(&self, ratio: f64) -> Band {
        match self.bands.iter().copied().find(|t| ratio >= *t) {
            Some(t) if t > 0.0 => Band::Threshold(t),
            _ => Band::Sentinel,
        }
    }
}

impl Default for ThresholdTable {
    fn default() -> Self {
        Self {
            bands: DEFAULT_THRESHOLDS.to_vec(),
        }
    }
}

/// Check the table invariant without building a table.
pub fn validate_bands(bands: &[f64]) -> Result<()> {
    let Some(last) = bands.last() else {
        return Err(MonError::InvalidConfig {
            details: "thresholds must not be empty".to_string(),
        });
    };
    if let Some(bad) = bands
        .iter()
        .find(|t| !t.is_finite() || !(0.0..=1.0).contains(*t))
    {
        return Err(MonError::InvalidConfig {
            details: format!("thresholds must be finite ratios in [0, 1], got {bad}"),
        });
    }
    if let Some(pair) = bands.windows(2).find(|pair| pair[0] <= pair[1]) {
        return Err(MonError::InvalidConfig {
            details: format!(
                "thresholds must strictly descend, but {} is followed by {}",
                pair[0], pair[1]
            ),
        });
    }
    if *last != 0.0 {
        return Err(MonError::InvalidConfig {
            details: format!("thresholds must end with the 0 sentinel, got {last}"),
        });
    }
    Ok(())
}
