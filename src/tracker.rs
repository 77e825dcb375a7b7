//! Multi-object tracking and direction-of-travel classification.
//!
//! See [the module-level documentation](self) for details: tracks move
//! through a small state machine (`provisional` → `confirmed` → `dying` →
//! dead), matched against each frame's detections by a greedy
//! nearest-cost assignment, and classified for an entrance/exit event only
//! once, at death.

use std::time::SystemTime;

use crate::{
    body::Detection,
    config::{Config, EntrancePolarity},
    consts::{GRID_COLS, GRID_ROWS},
    event::EventSink,
};

/// The lifecycle state of a [`Track`].
///
/// `Dead` is not represented here: dead tracks are removed from the tracker
/// immediately after their crossing event (if any) is emitted.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum TrackState {
    Provisional,
    Confirmed,
    Dying,
}

/// One sample of a track's trajectory.
#[derive(Clone, Copy, Debug)]
struct Sample {
    frame_index: u64,
    centroid: (f32, f32),
}

/// A persistent hypothesis about one person crossing the doorway.
#[derive(Clone, Debug)]
struct Track {
    id: u64,
    state: TrackState,
    /// Set once the trajectory has ever reached `min_confirm_samples`
    /// points, even if the track later re-enters `Dying`.
    ever_confirmed: bool,
    trajectory: Vec<Sample>,
    last_mean_temp: f32,
    miss_count: u32,
    counted: bool,
}

impl Track {
    fn last_centroid(&self) -> (f32, f32) {
        self.trajectory.last().expect("a track always has at least one sample").centroid
    }

    /// Last centroid plus the velocity estimated from the last two
    /// samples, or the last centroid unchanged if there is only one.
    fn predicted(&self) -> (f32, f32) {
        let n = self.trajectory.len();
        if n < 2 {
            return self.last_centroid();
        }
        let last = self.trajectory[n - 1].centroid;
        let prev = self.trajectory[n - 2].centroid;
        let velocity = (last.0 - prev.0, last.1 - prev.1);
        (last.0 + velocity.0, last.1 + velocity.1)
    }
}

/// The two possible labels of a crossing event, fixed by the deployment's
/// `entrance_polarity`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    /// The tracked person entered the doorway.
    Entrance,
    /// The tracked person exited the doorway.
    Exit,
}

/// A single directional crossing, emitted at most once per track.
#[derive(Clone, Copy, Debug)]
pub struct CrossingEvent {
    /// The track that produced this crossing.
    pub track_id: u64,
    /// Direction of travel.
    pub direction: Direction,
    /// Wall-clock time of the frame that caused the track to die.
    pub wall_clock_time: SystemTime,
    /// Frame index of the frame that caused the track to die.
    pub frame_index: u64,
}

/// Maintains the set of live tracks across frames and emits directional
/// crossing events at track death.
///
/// See [the module-level documentation](self) for details.
#[derive(Debug)]
pub struct Tracker {
    spatial_distance_threshold: f32,
    temperature_distance_threshold: f32,
    w_s: f32,
    w_t: f32,
    min_confirm_samples: usize,
    max_misses: u32,
    min_crossing_span: f32,
    entrance_polarity: EntrancePolarity,
    tracks: Vec<Track>,
    next_id: u64,
}

impl Tracker {
    /// Creates a tracker from the matching/classification tunables of
    /// `config`.
    #[must_use]
    pub fn new(config: &Config) -> Self {
        Self {
            spatial_distance_threshold: config.spatial_distance_threshold,
            temperature_distance_threshold: config.temperature_distance_threshold,
            w_s: config.w_s,
            w_t: config.w_t,
            min_confirm_samples: config.min_confirm_samples,
            max_misses: config.max_misses,
            min_crossing_span: config.min_crossing_span,
            entrance_polarity: config.entrance_polarity,
            tracks: Vec::new(),
            next_id: 1,
        }
    }

    /// Number of currently live tracks.
    #[must_use]
    pub fn live_count(&self) -> usize {
        self.tracks.len()
    }

    /// Runs one frame's worth of predict/match/extend/birth/death against
    /// `detections`, emitting crossing events to `sink` in ascending track
    /// id order.
    pub fn update(
        &mut self,
        frame_index: u64,
        wall_clock: SystemTime,
        detections: Vec<Detection>,
        sink: &mut impl EventSink,
    ) {
        let predictions: Vec<(f32, f32)> = self.tracks.iter().map(Track::predicted).collect();

        let mut candidates = Vec::new();
        for (track_idx, track) in self.tracks.iter().enumerate() {
            let pred = predictions[track_idx];
            for (det_idx, det) in detections.iter().enumerate() {
                let spatial = euclidean(pred, det.centroid);
                let temperature = (track.last_mean_temp - det.mean_temp).abs();
                if spatial > self.spatial_distance_threshold
                    || temperature > self.temperature_distance_threshold
                {
                    continue;
                }
                let cost = self.w_s * spatial + self.w_t * temperature;
                candidates.push((cost, track.id, track_idx, det_idx));
            }
        }
        candidates.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap().then(a.1.cmp(&b.1)));

        let mut track_matched = vec![false; self.tracks.len()];
        let mut det_matched = vec![false; detections.len()];
        let mut track_to_det = vec![None; self.tracks.len()];
        for (_, _, track_idx, det_idx) in candidates {
            if track_matched[track_idx] || det_matched[det_idx] {
                continue;
            }
            track_matched[track_idx] = true;
            det_matched[det_idx] = true;
            track_to_det[track_idx] = Some(det_idx);
        }

        let mut dead_ids: Vec<u64> = Vec::new();
        for (track_idx, track) in self.tracks.iter_mut().enumerate() {
            if let Some(det_idx) = track_to_det[track_idx] {
                let det = &detections[det_idx];
                track.trajectory.push(Sample { frame_index, centroid: det.centroid });
                track.last_mean_temp = det.mean_temp;
                track.miss_count = 0;
                if track.trajectory.len() >= self.min_confirm_samples {
                    track.ever_confirmed = true;
                }
                if track.ever_confirmed {
                    track.state = TrackState::Confirmed;
                }
            } else {
                let pred = predictions[track_idx];
                if out_of_bounds(pred) {
                    tracing::debug!(track_id = track.id, "track died: edge exit");
                    dead_ids.push(track.id);
                    continue;
                }
                track.miss_count += 1;
                if track.miss_count > self.max_misses {
                    tracing::debug!(track_id = track.id, "track died: max misses exceeded");
                    dead_ids.push(track.id);
                } else if track.state == TrackState::Confirmed {
                    track.state = TrackState::Dying;
                }
            }
        }

        for (det_idx, det) in detections.iter().enumerate() {
            if det_matched[det_idx] {
                continue;
            }
            let id = self.next_id;
            self.next_id += 1;
            tracing::debug!(track_id = id, "track born");
            self.tracks.push(Track {
                id,
                state: TrackState::Provisional,
                ever_confirmed: false,
                trajectory: vec![Sample { frame_index, centroid: det.centroid }],
                last_mean_temp: det.mean_temp,
                miss_count: 0,
                counted: false,
            });
        }

        dead_ids.sort_unstable();
        for id in dead_ids {
            self.kill(id, frame_index, wall_clock, sink);
        }
    }

    /// Removes `id` from the live set, running the direction classifier and
    /// emitting its event if it qualifies and hasn't already been counted.
    fn kill(&mut self, id: u64, frame_index: u64, wall_clock: SystemTime, sink: &mut impl EventSink) {
        let Some(pos) = self.tracks.iter().position(|t| t.id == id) else { return };
        if self.tracks[pos].counted {
            self.tracks.remove(pos);
            return;
        }
        if let Some(direction) = self.classify(&self.tracks[pos]) {
            self.tracks[pos].counted = true;
            sink.on_event(CrossingEvent { track_id: id, direction, wall_clock_time: wall_clock, frame_index });
        }
        self.tracks.remove(pos);
    }

    /// Flushes every remaining track as if it died on `frame_index`, for a
    /// cooperative `stop()`. Ascending track id order, same as normal death
    /// processing.
    pub fn flush(&mut self, frame_index: u64, wall_clock: SystemTime, sink: &mut impl EventSink) {
        let mut ids: Vec<u64> = self.tracks.iter().map(|t| t.id).collect();
        ids.sort_unstable();
        for id in ids {
            self.kill(id, frame_index, wall_clock, sink);
        }
    }

    /// A track qualifies for counting only if it was ever confirmed, its
    /// trajectory spans at least `min_crossing_span` cells on the traversal
    /// (column) axis, and its first and last samples lie on opposite
    /// halves of that axis.
    fn classify(&self, track: &Track) -> Option<Direction> {
        if !track.ever_confirmed {
            return None;
        }
        let axis: Vec<f32> = track.trajectory.iter().map(|s| s.centroid.1).collect();
        let min = axis.iter().copied().fold(f32::MAX, f32::min);
        let max = axis.iter().copied().fold(f32::MIN, f32::max);
        if max - min < self.min_crossing_span {
            return None;
        }
        let mid = (GRID_COLS - 1) as f32 / 2.0;
        let first = *axis.first()?;
        let last = *axis.last()?;
        if (first < mid) == (last < mid) {
            return None;
        }
        let increasing = last > first;
        Some(match (increasing, self.entrance_polarity) {
            (true, EntrancePolarity::PlusAxis) | (false, EntrancePolarity::MinusAxis) => {
                Direction::Entrance
            }
            (false, EntrancePolarity::PlusAxis) | (true, EntrancePolarity::MinusAxis) => {
                Direction::Exit
            }
        })
    }
}

fn euclidean(a: (f32, f32), b: (f32, f32)) -> f32 {
    let dr = a.0 - b.0;
    let dc = a.1 - b.1;
    (dr * dr + dc * dc).sqrt()
}

fn out_of_bounds(pos: (f32, f32)) -> bool {
    pos.0 < 0.0 || pos.0 > (GRID_ROWS - 1) as f32 || pos.1 < 0.0 || pos.1 > (GRID_COLS - 1) as f32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct RecordingSink(Vec<CrossingEvent>);

    impl EventSink for RecordingSink {
        fn on_event(&mut self, event: CrossingEvent) {
            self.0.push(event);
        }
    }

    fn detection_at(row: f32, col: f32) -> Detection {
        Detection {
            bounds: crate::body::Rect { row_min: 0, row_max: 0, col_min: 0, col_max: 0 },
            centroid: (row, col),
            mean_temp: 4.0,
            peak_temp: 4.0,
            cell_count: 2,
        }
    }

    fn sweep(tracker: &mut Tracker, sink: &mut RecordingSink, row: f32, cols: &[f32]) {
        for (i, &col) in cols.iter().enumerate() {
            tracker.update(i as u64 + 1, SystemTime::UNIX_EPOCH, vec![detection_at(row, col)], sink);
        }
    }

    #[test]
    fn single_walker_left_to_right_emits_one_entrance() {
        let config = Config::default();
        let mut tracker = Tracker::new(&config);
        let mut sink = RecordingSink::default();
        sweep(&mut tracker, &mut sink, 3.0, &[0.0, 1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0]);
        tracker.flush(9, SystemTime::UNIX_EPOCH, &mut sink);
        assert_eq!(sink.0.len(), 1);
        assert_eq!(sink.0[0].direction, Direction::Entrance);
        assert_eq!(sink.0[0].track_id, 1);
    }

    #[test]
    fn loitering_track_emits_nothing() {
        let config = Config::default();
        let mut tracker = Tracker::new(&config);
        let mut sink = RecordingSink::default();
        for i in 0..60u64 {
            tracker.update(i + 1, SystemTime::UNIX_EPOCH, vec![detection_at(3.0, 3.0)], &mut sink);
        }
        tracker.flush(61, SystemTime::UNIX_EPOCH, &mut sink);
        assert!(sink.0.is_empty());
    }

    #[test]
    fn track_never_confirmed_emits_nothing() {
        let config = Config { min_confirm_samples: 10, ..Config::default() };
        let mut tracker = Tracker::new(&config);
        let mut sink = RecordingSink::default();
        sweep(&mut tracker, &mut sink, 3.0, &[0.0, 1.0, 2.0]);
        tracker.flush(4, SystemTime::UNIX_EPOCH, &mut sink);
        assert!(sink.0.is_empty());
    }

    #[test]
    fn two_abreast_produce_two_entrances() {
        let config = Config::default();
        let mut tracker = Tracker::new(&config);
        let mut sink = RecordingSink::default();
        for (i, col) in (0..8).enumerate() {
            let dets = vec![detection_at(2.0, col as f32), detection_at(5.0, col as f32)];
            tracker.update(i as u64 + 1, SystemTime::UNIX_EPOCH, dets, &mut sink);
        }
        tracker.flush(9, SystemTime::UNIX_EPOCH, &mut sink);
        assert_eq!(sink.0.len(), 2);
        assert!(sink.0.iter().all(|e| e.direction == Direction::Entrance));
    }

    #[test]
    fn reversed_polarity_swaps_direction() {
        let config = Config { entrance_polarity: EntrancePolarity::MinusAxis, ..Config::default() };
        let mut tracker = Tracker::new(&config);
        let mut sink = RecordingSink::default();
        sweep(&mut tracker, &mut sink, 3.0, &[0.0, 1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0]);
        tracker.flush(9, SystemTime::UNIX_EPOCH, &mut sink);
        assert_eq!(sink.0.len(), 1);
        assert_eq!(sink.0[0].direction, Direction::Exit);
    }

    #[test]
    fn each_track_emits_at_most_once() {
        let config = Config::default();
        let mut tracker = Tracker::new(&config);
        let mut sink = RecordingSink::default();
        sweep(&mut tracker, &mut sink, 3.0, &[0.0, 1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0]);
        // Track already died via edge-exit once it walked past column 7; a
        // second flush must not double-emit.
        tracker.flush(20, SystemTime::UNIX_EPOCH, &mut sink);
        assert!(sink.0.len() <= 1);
    }

    #[test]
    fn trajectory_frame_indices_strictly_increase() {
        let config = Config::default();
        let mut tracker = Tracker::new(&config);
        let mut sink = RecordingSink::default();
        sweep(&mut tracker, &mut sink, 3.0, &[0.0, 1.0, 2.0, 3.0]);
        let track = &tracker.tracks[0];
        for window in track.trajectory.windows(2) {
            assert!(window[1].frame_index > window[0].frame_index);
        }
    }
}
