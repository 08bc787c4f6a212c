//! Threshold hysteresis engine.
//!
//! Decides, for one volume snapshot, whether usage has risen into a band that
//! has not alerted since the volume was last fully re-armed. State per volume
//! is a single value: the band last recorded. Only a drop into the `0`
//! sentinel band clears it.
//!
//! Dropping from a high band into a lower non-zero band records the lower band
//! without alerting, so a later climb back past the higher band alerts again
//! while a climb back to the lower band does not.

#![allow(missing_docs)]
#![allow(clippy::cast_precision_loss)]

use crate::core::errors::{MonError, Result};
use crate::monitor::alert_state::AlertState;
use crate::monitor::thresholds::{Band, ThresholdTable};

/// One observed volume at one instant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VolumeSnapshot {
    pub location: String,
    pub used: u64,
    pub free: u64,
}

impl VolumeSnapshot {
    #[must_use]
    pub fn new(location: impl Into<String>, used: u64, free: u64) -> Self {
        Self {
            location: location.into(),
            used,
            free,
        }
    }

    #[must_use]
    pub const fn size(&self) -> u64 {
        self.used.saturating_add(self.free)
    }

    /// Used fraction of total capacity. Zero-size volumes have no ratio.
    pub fn ratio(&self) -> Result<f64> {
        let size = self.size();
        if size == 0 {
            return Err(MonError::EmptyVolume {
                location: self.location.clone(),
            });
        }
        Ok(self.used as f64 / size as f64)
    }

    /// Whole-percentage usage, rounded down.
    pub fn percent_used(&self) -> Result<u64> {
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let pct = (self.ratio()? * 100.0).floor() as u64;
        Ok(pct)
    }
}

/// What happened to a location's stored threshold.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StateUpdate {
    /// No entry before or after (sentinel band, never alerted).
    Unchanged,
    /// Entry now holds this threshold.
    Set(f64),
    /// Entry removed: the volume is fully re-armed.
    Cleared,
}

/// Outcome of evaluating one snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    pub band: Band,
    pub alert: Option<String>,
    pub update: StateUpdate,
}

/// Alert line for a volume, e.g. `DISK "/data" is at 97%`.
#[must_use]
pub fn alert_message(location: &str, percent: u64) -> String {
    format!("DISK \"{location}\" is at {percent}%")
}

/// Stateless decision logic bound to a threshold table.
#[derive(Debug, Clone, Default)]
pub struct HysteresisEngine {
    table: ThresholdTable,
}

impl HysteresisEngine {
    #[must_use]
    pub fn new(table: ThresholdTable) -> Self {
        Self { table }
    }

    #[must_use]
    pub fn table(&self) -> &ThresholdTable {
        &self.table
    }

    /// Evaluate a snapshot and apply the resulting update to `state`.
    ///
    /// A zero-size snapshot returns [`MonError::EmptyVolume`] and leaves
    /// `state` untouched.
    pub fn evaluate(
        &self,
        snapshot: &VolumeSnapshot,
        state: &mut AlertState,
    ) -> Result<Evaluation> {
        let ratio = snapshot.ratio()?;
        let band = self.table.band_for(ratio);
        let location = snapshot.location.as_str();

        let threshold = match band {
            Band::Sentinel => {
                let update = if state.clear(location) {
                    StateUpdate::Cleared
                } else {
                    StateUpdate::Unchanged
                };
                return Ok(Evaluation {
                    band,
                    alert: None,
                    update,
                });
            }
            Band::Threshold(t) => t,
        };

        let stored = state.get(location).unwrap_or(0.0);
        let alert = if stored < threshold {
            Some(alert_message(location, snapshot.percent_used()?))
        } else {
            None
        };
        state.set(location, threshold);

        Ok(Evaluation {
            band,
            alert,
            update: StateUpdate::Set(threshold),
        })
    }
}
