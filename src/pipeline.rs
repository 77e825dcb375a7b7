//! Top-level orchestration: pulls frames, runs them through background,
//! foreground, body and tracker stages in order, and reports crossings.

use std::time::{Duration, SystemTime};

use crate::{
    background::{BackgroundModel, CalibrationStatus},
    body::BodyExtractor,
    config::Config,
    consts::SENSOR_STALL_GRACE_MULTIPLIER,
    error::{Error, Result},
    event::EventSink,
    foreground::Discriminator,
    frame::{Background, Frame},
    tracker::Tracker,
};

/// Supplies frames to a [`Pipeline`], one at a time.
pub trait FrameSource {
    /// Returns the next frame and the wall-clock time it was captured, or
    /// `None` if the source is exhausted.
    fn next_frame(&mut self) -> Option<(SystemTime, Frame)>;
}

/// Runs the full doorway counting pipeline over a sequence of frames.
///
/// See [the module-level documentation](self) for details.
pub struct Pipeline {
    config: Config,
    background: BackgroundModel,
    discriminator: Discriminator,
    extractor: BodyExtractor,
    tracker: Tracker,
    frame_index: u64,
    invalid_frame_burst: bool,
}

impl Pipeline {
    /// Builds a pipeline from `config`, validating it first. Background
    /// estimation starts from scratch.
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;
        let background = BackgroundModel::new(config.calibration_frames, config.adaptive_alpha);
        Ok(Self::assemble(config, background))
    }

    /// Builds a pipeline from `config` and a previously persisted
    /// `background`, skipping the calibration phase entirely.
    pub fn with_background(config: Config, background: Background) -> Result<Self> {
        config.validate()?;
        let model = BackgroundModel::with_background(background, config.adaptive_alpha);
        Ok(Self::assemble(config, model))
    }

    fn assemble(config: Config, background: BackgroundModel) -> Self {
        let discriminator = Discriminator::new(
            config.activity_threshold_c,
            config.otsu_max_foreground_fraction,
            config.tracking_temp_threshold_c,
            config.min_body_cells,
        );
        let extractor = BodyExtractor::new(
            config.min_body_cells,
            config.max_body_cells,
            config.single_body_cells,
            config.min_peak_separation,
        );
        let tracker = Tracker::new(&config);
        Self {
            config,
            background,
            discriminator,
            extractor,
            tracker,
            frame_index: 0,
            invalid_frame_burst: false,
        }
    }

    /// The configuration this pipeline was built from.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The current background baseline, suitable for persisting via
    /// [`crate::frame::Grid::to_bytes`].
    #[must_use]
    pub fn background(&self) -> &Background {
        self.background.current()
    }

    /// `true` once background calibration has completed and the pipeline is
    /// actively discriminating and tracking.
    #[must_use]
    pub fn is_calibrated(&self) -> bool {
        self.background.is_calibrated()
    }

    /// Discards the current adaptive background and restarts calibration.
    pub fn recalibrate(&mut self) {
        self.background.reset_calibration();
    }

    /// Runs one frame through the pipeline.
    ///
    /// During calibration, frames are folded into the background average
    /// and no detections or tracking occur. Once calibrated, every frame
    /// runs the full discriminate/adapt/segment/track sequence and may emit
    /// crossing events to `sink`.
    pub fn step(&mut self, wall_clock: SystemTime, frame: Frame, sink: &mut impl EventSink) -> Result<()> {
        self.frame_index += 1;

        if !frame.is_finite() {
            if !self.invalid_frame_burst {
                tracing::warn!(frame_index = self.frame_index, "dropping frame with non-finite cell");
                self.invalid_frame_burst = true;
            }
            return Err(Error::FrameInvalid("frame contains a non-finite cell"));
        }
        self.invalid_frame_burst = false;

        if !self.background.is_calibrated() {
            if self.background.feed_calibration(&frame) == CalibrationStatus::Ready {
                tracing::info!(frame_index = self.frame_index, "background calibration complete");
            }
            return Ok(());
        }

        let result = self.discriminator.discriminate(&frame, self.background.current());
        self.background.update_adaptive(&frame, &result.mask);
        let detections = self.extractor.extract(&result.mask, &result.delta);
        self.tracker.update(self.frame_index, wall_clock, detections, sink);
        Ok(())
    }

    /// Flushes every live track as a cooperative shutdown, emitting any
    /// crossing events their trajectories qualify for.
    pub fn stop(&mut self, wall_clock: SystemTime, sink: &mut impl EventSink) {
        self.tracker.flush(self.frame_index, wall_clock, sink);
    }

    /// Reports [`Error::SensorStalled`] if `elapsed` since the last frame
    /// exceeds the configured grace window.
    pub fn check_stalled(&self, elapsed: Duration) -> Result<()> {
        let period = Duration::from_secs_f32(1.0 / self.config.frame_hz);
        let grace = period.mul_f32(SENSOR_STALL_GRACE_MULTIPLIER);
        if elapsed > grace {
            tracing::warn!(?elapsed, ?grace, "sensor stalled");
            return Err(Error::SensorStalled(elapsed));
        }
        Ok(())
    }
}
