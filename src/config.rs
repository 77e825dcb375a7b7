//! Pipeline configuration settings.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Which column-axis direction counts as an entrance.
///
/// The traversal axis is fixed to the grid's column axis by the data model;
/// this only decides which direction of travel along it is the entrance.
#[allow(clippy::module_name_repetitions)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum EntrancePolarity {
    /// Increasing column index is an entrance.
    PlusAxis,
    /// Decreasing column index is an entrance.
    MinusAxis,
}

/// All tunables recognized by the doorway counting pipeline.
///
/// Every field has a sensible default via [`Config::default`]; call
/// [`Config::validate`] before building a [`crate::pipeline::Pipeline`] from
/// a `Config` that didn't come from `Default`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case", default)]
pub struct Config {
    /// Nominal sensor sampling rate, in Hz.
    pub frame_hz: f32,
    /// Number of frames consumed by background calibration.
    pub calibration_frames: u32,
    /// Background EMA weight applied to non-foreground cells each frame.
    pub adaptive_alpha: f32,
    /// Gate A: minimum `max(Δ)` for a frame to be considered non-empty.
    pub activity_threshold_c: f32,
    /// Gate B: reject the frame if the Otsu "warm" class covers more than
    /// this fraction of the grid.
    pub otsu_max_foreground_fraction: f32,
    /// Gate C: minimum per-cell Δ to survive into the refined mask.
    pub tracking_temp_threshold_c: f32,
    /// Minimum cell count for a connected component to be a body.
    pub min_body_cells: usize,
    /// Maximum cell count for a connected component to be a body.
    pub max_body_cells: usize,
    /// Cell count above which a component is considered for peak-splitting.
    pub single_body_cells: usize,
    /// Minimum Chebyshev separation between the two peaks of a split.
    pub min_peak_separation: usize,
    /// Maximum spatial (cell) distance for a track/detection match.
    pub spatial_distance_threshold: f32,
    /// Maximum temperature distance (°C) for a track/detection match.
    pub temperature_distance_threshold: f32,
    /// Spatial weight in the track/detection matching cost.
    pub w_s: f32,
    /// Temperature weight in the track/detection matching cost.
    pub w_t: f32,
    /// Trajectory samples required before a track is confirmed.
    pub min_confirm_samples: usize,
    /// Consecutive missed frames tolerated before a track dies.
    pub max_misses: u32,
    /// Minimum traversal-axis span (in cells) for a trajectory to qualify
    /// as a crossing.
    pub min_crossing_span: f32,
    /// Which column-axis direction counts as an entrance.
    pub entrance_polarity: EntrancePolarity,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            frame_hz: 10.0,
            calibration_frames: 250,
            adaptive_alpha: 0.01,
            activity_threshold_c: 0.25,
            otsu_max_foreground_fraction: 0.60,
            tracking_temp_threshold_c: 0.25,
            min_body_cells: 2,
            max_body_cells: 20,
            single_body_cells: 8,
            min_peak_separation: 2,
            spatial_distance_threshold: 3.0,
            temperature_distance_threshold: 1.5,
            w_s: 1.0,
            w_t: 1.0,
            min_confirm_samples: 3,
            max_misses: 3,
            min_crossing_span: 4.0,
            entrance_polarity: EntrancePolarity::PlusAxis,
        }
    }
}

impl Config {
    /// Validates every constraint the pipeline relies on at construction
    /// time, returning the first violation found.
    pub fn validate(&self) -> Result<(), Error> {
        if self.frame_hz <= 0.0 {
            return Err(Error::ConfigInvalid("frame_hz must be positive"));
        }
        if self.calibration_frames == 0 {
            return Err(Error::ConfigInvalid("calibration_frames must be positive"));
        }
        if !(0.0..=1.0).contains(&self.adaptive_alpha) {
            return Err(Error::ConfigInvalid("adaptive_alpha must be in [0, 1]"));
        }
        if self.activity_threshold_c < 0.0 {
            return Err(Error::ConfigInvalid("activity_threshold_c must not be negative"));
        }
        if !(0.0..=1.0).contains(&self.otsu_max_foreground_fraction) {
            return Err(Error::ConfigInvalid("otsu_max_foreground_fraction must be in [0, 1]"));
        }
        if self.tracking_temp_threshold_c < 0.0 {
            return Err(Error::ConfigInvalid("tracking_temp_threshold_c must not be negative"));
        }
        if self.min_body_cells == 0 {
            return Err(Error::ConfigInvalid("min_body_cells must be positive"));
        }
        if self.min_body_cells > self.max_body_cells {
            return Err(Error::ConfigInvalid("min_body_cells must not exceed max_body_cells"));
        }
        if self.single_body_cells > self.max_body_cells {
            return Err(Error::ConfigInvalid("single_body_cells must not exceed max_body_cells"));
        }
        if self.min_peak_separation == 0 {
            return Err(Error::ConfigInvalid("min_peak_separation must be positive"));
        }
        if self.spatial_distance_threshold < 0.0 {
            return Err(Error::ConfigInvalid("spatial_distance_threshold must not be negative"));
        }
        if self.temperature_distance_threshold < 0.0 {
            return Err(Error::ConfigInvalid(
                "temperature_distance_threshold must not be negative",
            ));
        }
        if self.w_s < 0.0 || self.w_t < 0.0 {
            return Err(Error::ConfigInvalid("w_s and w_t must not be negative"));
        }
        if self.min_confirm_samples == 0 {
            return Err(Error::ConfigInvalid("min_confirm_samples must be positive"));
        }
        if self.min_crossing_span < 0.0 {
            return Err(Error::ConfigInvalid("min_crossing_span must not be negative"));
        }
        Ok(())
    }
}
