//! Shared test doubles for the pipeline integration tests.

use std::time::{Duration, SystemTime};

use doorway_core::{CrossingEvent, EventSink, frame::Frame};

/// A [`doorway_core::FrameSource`] that replays a fixed sequence of frames
/// at a constant synthetic frame period, starting at [`SystemTime::UNIX_EPOCH`].
pub struct ScriptedFrameSource {
    frames: std::vec::IntoIter<Frame>,
    period: Duration,
    next_time: SystemTime,
}

impl ScriptedFrameSource {
    /// Builds a source that replays `frames` one per call, `period` apart.
    #[must_use]
    pub fn new(frames: Vec<Frame>, period: Duration) -> Self {
        Self { frames: frames.into_iter(), period, next_time: SystemTime::UNIX_EPOCH }
    }
}

impl doorway_core::FrameSource for ScriptedFrameSource {
    fn next_frame(&mut self) -> Option<(SystemTime, Frame)> {
        let frame = self.frames.next()?;
        let time = self.next_time;
        self.next_time += self.period;
        Some((time, frame))
    }
}

/// An [`EventSink`] that records every event it receives, in order.
#[derive(Default)]
pub struct EventLog(pub Vec<CrossingEvent>);

impl EventSink for EventLog {
    fn on_event(&mut self, event: CrossingEvent) {
        self.0.push(event);
    }
}

/// Builds a flat frame at `value` degrees.
#[must_use]
pub fn flat(value: f32) -> Frame {
    Frame::filled(value)
}

/// Builds a flat frame with a rectangular hot patch of `delta` degrees above
/// `ambient`, spanning `rows` and a single column `col`.
#[must_use]
pub fn patch(ambient: f32, delta: f32, rows: std::ops::Range<usize>, col: usize) -> Frame {
    let mut frame = flat(ambient);
    for row in rows {
        frame.set(row, col, ambient + delta);
    }
    frame
}

/// Builds a flat frame with a rectangular hot patch spanning `rows` and
/// `cols`, both clipped to the grid.
#[must_use]
pub fn rect_patch(
    ambient: f32,
    delta: f32,
    rows: std::ops::Range<usize>,
    cols: std::ops::Range<usize>,
) -> Frame {
    let mut frame = flat(ambient);
    for row in rows {
        if row >= 8 {
            continue;
        }
        for col in cols.clone() {
            if col >= 8 {
                continue;
            }
            frame.set(row, col, ambient + delta);
        }
    }
    frame
}

/// Overlays a second hot patch onto an already-built frame, for scenarios
/// with two simultaneous bodies.
pub fn overlay_patch(
    frame: &mut Frame,
    ambient: f32,
    delta: f32,
    rows: std::ops::Range<usize>,
    cols: std::ops::Range<usize>,
) {
    for row in rows {
        if row >= 8 {
            continue;
        }
        for col in cols.clone() {
            if col >= 8 {
                continue;
            }
            frame.set(row, col, ambient + delta);
        }
    }
}

/// Drives `pipeline` through `calibration_frames` identical `ambient`
/// frames so it leaves the calibration phase.
pub fn calibrate(
    pipeline: &mut doorway_core::Pipeline,
    ambient: f32,
    calibration_frames: u32,
    sink: &mut impl EventSink,
) {
    for _ in 0..calibration_frames {
        pipeline.step(SystemTime::UNIX_EPOCH, flat(ambient), sink).unwrap();
    }
    assert!(pipeline.is_calibrated());
}
