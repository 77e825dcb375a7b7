//! Adaptive background estimation.
//!
//! A calibration phase averages the first `calibration_frames` frames to
//! establish a per-cell baseline, then an adaptive phase folds in
//! non-foreground cells each frame with a small exponential weight.

use crate::frame::{Background, Frame, Mask};

/// Result of feeding one frame to [`BackgroundModel::feed_calibration`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CalibrationStatus {
    /// More calibration frames are needed.
    More,
    /// Calibration is complete; the background is ready.
    Ready,
}

/// Maintains the per-cell baseline temperature and its adaptation policy.
///
/// See [the module-level documentation](self) for details.
#[derive(Clone, Debug)]
pub struct BackgroundModel {
    adaptive_alpha: f32,
    calibration_frames: u32,
    calibration_sum: [[f64; crate::consts::GRID_COLS]; crate::consts::GRID_ROWS],
    calibration_count: u32,
    background: Background,
    calibrated: bool,
}

impl BackgroundModel {
    /// Creates a model that starts in the calibration phase.
    #[must_use]
    pub fn new(calibration_frames: u32, adaptive_alpha: f32) -> Self {
        Self {
            adaptive_alpha,
            calibration_frames,
            calibration_sum: [[0.0; crate::consts::GRID_COLS]; crate::consts::GRID_ROWS],
            calibration_count: 0,
            background: Background::filled(0.0),
            calibrated: false,
        }
    }

    /// Creates a model that skips calibration, using `background` as the
    /// initial baseline (e.g. loaded from a persisted background file).
    #[must_use]
    pub fn with_background(background: Background, adaptive_alpha: f32) -> Self {
        Self {
            adaptive_alpha,
            calibration_frames: 0,
            calibration_sum: [[0.0; crate::consts::GRID_COLS]; crate::consts::GRID_ROWS],
            calibration_count: 0,
            background,
            calibrated: true,
        }
    }

    /// `true` once calibration has completed and `current` reflects a
    /// usable baseline.
    #[must_use]
    pub fn is_calibrated(&self) -> bool {
        self.calibrated
    }

    /// Discards the accumulated calibration average and restarts
    /// calibration from scratch. Used to service a host `recalibrate`
    /// control signal.
    pub fn reset_calibration(&mut self) {
        self.calibration_sum = [[0.0; crate::consts::GRID_COLS]; crate::consts::GRID_ROWS];
        self.calibration_count = 0;
        self.calibrated = false;
    }

    /// Feeds one frame to the calibration accumulator.
    ///
    /// A frame with any non-finite cell is discarded and does not advance
    /// the calibration counter.
    pub fn feed_calibration(&mut self, frame: &Frame) -> CalibrationStatus {
        if self.calibrated {
            return CalibrationStatus::Ready;
        }
        if !frame.is_finite() {
            return CalibrationStatus::More;
        }
        for (cell, value) in frame.iter_cells() {
            self.calibration_sum[cell.row][cell.col] += f64::from(value);
        }
        self.calibration_count += 1;
        if self.calibration_count >= self.calibration_frames {
            let count = f64::from(self.calibration_count);
            self.background = Background::from_fn(|cell| {
                (self.calibration_sum[cell.row][cell.col] / count) as f32
            });
            self.calibrated = true;
            CalibrationStatus::Ready
        } else {
            CalibrationStatus::More
        }
    }

    /// The current baseline. Before calibration completes this is all
    /// zeroes and should not be consulted.
    #[must_use]
    pub fn current(&self) -> &Background {
        &self.background
    }

    /// Folds `frame` into the baseline with the configured EMA weight,
    /// skipping cells the current frame classified as foreground.
    pub fn update_adaptive(&mut self, frame: &Frame, foreground_mask: &Mask) {
        for (cell, is_foreground) in foreground_mask.iter_cells() {
            if is_foreground {
                continue;
            }
            let bg = self.background[cell];
            let value = frame[cell];
            self.background[cell] = (1.0 - self.adaptive_alpha) * bg + self.adaptive_alpha * value;
        }
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;

    use super::*;
    use crate::frame::Mask;

    #[test]
    fn calibration_converges_to_constant_input() {
        let mut model = BackgroundModel::new(250, 0.01);
        for _ in 0..249 {
            assert_eq!(model.feed_calibration(&Frame::filled(22.0)), CalibrationStatus::More);
        }
        assert_eq!(model.feed_calibration(&Frame::filled(22.0)), CalibrationStatus::Ready);
        assert!(model.is_calibrated());
        for (_, value) in model.current().iter_cells() {
            assert_abs_diff_eq!(value, 22.0, epsilon = 1e-6);
        }
    }

    #[test]
    fn calibration_discards_non_finite_frames() {
        let mut model = BackgroundModel::new(3, 0.01);
        assert_eq!(model.feed_calibration(&Frame::filled(22.0)), CalibrationStatus::More);
        let mut bad = Frame::filled(22.0);
        bad.set(0, 0, f32::NAN);
        assert_eq!(model.feed_calibration(&bad), CalibrationStatus::More);
        assert_eq!(model.feed_calibration(&Frame::filled(22.0)), CalibrationStatus::More);
        assert_eq!(model.feed_calibration(&Frame::filled(22.0)), CalibrationStatus::Ready);
    }

    #[test]
    fn adaptive_phase_moves_monotonically_toward_empty_frame() {
        let mut model = BackgroundModel::with_background(Background::filled(20.0), 0.1);
        let empty_mask = Mask::filled(false);
        let frame = Frame::filled(22.0);
        let mut previous = 20.0;
        for _ in 0..20 {
            model.update_adaptive(&frame, &empty_mask);
            let current = model.current().get(0, 0);
            assert!(current >= previous, "background should move monotonically toward 22.0");
            assert!(current <= 22.0);
            previous = current;
        }
    }

    #[test]
    fn adaptive_phase_skips_foreground_cells() {
        let mut model = BackgroundModel::with_background(Background::filled(20.0), 0.5);
        let mut mask = Mask::filled(false);
        mask.set(3, 3, true);
        model.update_adaptive(&Frame::filled(30.0), &mask);
        assert_eq!(model.current().get(3, 3), 20.0, "foreground cell must not adapt");
        assert_eq!(model.current().get(0, 0), 25.0, "non-foreground cell adapts by alpha");
    }
}
