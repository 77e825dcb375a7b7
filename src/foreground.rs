//! The three-gate foreground discrimination cascade.
//!
//! Gate A (distribution test) rejects frames with no cell warm enough above
//! baseline to be a body. Gate B (Otsu-style split) separates "cool" and
//! "warm" cells on the delta matrix, rejecting degenerate or saturated
//! splits. Gate C (absolute excess) refines the tentative mask down to
//! cells that clear the tracking threshold, rejecting the frame if too few
//! remain. Failing any gate yields the empty mask, which the background
//! model reads as "no foreground" and adapts into every cell.

use crate::{
    consts::OTSU_NOISE_FLOOR,
    frame::{Background, Delta, Frame, Mask},
};

/// The outcome of running a frame through the foreground cascade.
#[derive(Clone, Copy, Debug)]
pub struct ForegroundResult {
    /// The refined foreground mask. All `false` if any gate rejected the
    /// frame.
    pub mask: Mask,
    /// `frame - background`, kept for the body extractor's centroid
    /// weighting regardless of whether any gate rejected the frame.
    pub delta: Delta,
}

/// The foreground discriminator's tunables, a projection of
/// [`crate::config::Config`].
#[derive(Clone, Copy, Debug)]
pub struct Discriminator {
    activity_threshold_c: f32,
    otsu_max_foreground_fraction: f32,
    tracking_temp_threshold_c: f32,
    min_body_cells: usize,
}

impl Discriminator {
    /// Creates a discriminator from its four tunables.
    #[must_use]
    pub fn new(
        activity_threshold_c: f32,
        otsu_max_foreground_fraction: f32,
        tracking_temp_threshold_c: f32,
        min_body_cells: usize,
    ) -> Self {
        Self {
            activity_threshold_c,
            otsu_max_foreground_fraction,
            tracking_temp_threshold_c,
            min_body_cells,
        }
    }

    /// Runs `frame` through the cascade against the current `background`.
    pub fn discriminate(&self, frame: &Frame, background: &Background) -> ForegroundResult {
        let delta = frame.sub(background);
        let empty = ForegroundResult { mask: Mask::filled(false), delta };

        // Gate A: distribution test.
        if delta.max() < self.activity_threshold_c {
            return empty;
        }

        // Gate B: Otsu-style split.
        let Some(otsu) = otsu_threshold(&delta) else {
            return empty;
        };
        if otsu.between_class_variance < OTSU_NOISE_FLOOR {
            return empty;
        }
        if otsu.warm_fraction > self.otsu_max_foreground_fraction {
            return empty;
        }
        let tentative = delta.map(|v| v >= otsu.threshold);

        // Gate C: absolute excess.
        let refined = Mask::from_fn(|cell| tentative[cell] && delta[cell] >= self.tracking_temp_threshold_c);
        let count = refined.iter_cells().filter(|(_, v)| *v).count();
        if count < self.min_body_cells {
            return empty;
        }

        ForegroundResult { mask: refined, delta }
    }
}

/// The result of the Otsu-style threshold search over a delta matrix.
struct OtsuSplit {
    threshold: f32,
    between_class_variance: f32,
    warm_fraction: f32,
}

/// Searches for the Δ threshold maximizing inter-class variance between a
/// "cool" and a "warm" class.
///
/// The search is continuous over the sorted, distinct Δ values actually
/// present in the frame (candidate thresholds are midpoints between
/// consecutive distinct values), not a fixed integer bin count: with only 64
/// samples an exhaustive search over the real data is cheap and exact, and
/// it avoids a second free parameter (bin count) with no corresponding
/// config knob. Ties keep the lowest threshold, the more permissive split.
fn otsu_threshold(delta: &Delta) -> Option<OtsuSplit> {
    let mut values: Vec<f32> = delta.iter_cells().map(|(_, v)| v).collect();
    values.sort_by(|a, b| a.partial_cmp(b).expect("grid values are finite"));

    let mut distinct = values.clone();
    distinct.dedup();
    if distinct.len() < 2 {
        return None;
    }

    let total = values.len() as f32;
    let mut best: Option<OtsuSplit> = None;
    for window in distinct.windows(2) {
        let threshold = (window[0] + window[1]) / 2.0;
        let (cool, warm): (Vec<f32>, Vec<f32>) = values.iter().partition(|&&v| v < threshold);
        if cool.is_empty() || warm.is_empty() {
            continue;
        }
        let cool_mean = cool.iter().sum::<f32>() / cool.len() as f32;
        let warm_mean = warm.iter().sum::<f32>() / warm.len() as f32;
        let w_cool = cool.len() as f32 / total;
        let w_warm = warm.len() as f32 / total;
        let variance = w_cool * w_warm * (cool_mean - warm_mean).powi(2);
        let improves = match &best {
            Some(current) => variance > current.between_class_variance,
            None => true,
        };
        if improves {
            best = Some(OtsuSplit { threshold, between_class_variance: variance, warm_fraction: w_warm });
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flat(value: f32) -> Frame {
        Frame::filled(value)
    }

    #[test]
    fn gate_a_rejects_weak_activity() {
        let disc = Discriminator::new(0.25, 0.60, 0.25, 2);
        let background = Background::filled(22.0);
        let frame = flat(22.1);
        let result = disc.discriminate(&frame, &background);
        assert!(result.mask.iter_cells().all(|(_, v)| !v));
    }

    #[test]
    fn gate_b_rejects_uniform_ambient_shift() {
        let disc = Discriminator::new(0.25, 0.60, 0.25, 2);
        let background = Background::filled(22.0);
        let frame = flat(23.0);
        let result = disc.discriminate(&frame, &background);
        assert!(result.mask.iter_cells().all(|(_, v)| !v), "uniform shift has no split, must be rejected");
    }

    #[test]
    fn small_hot_patch_survives_cascade() {
        let disc = Discriminator::new(0.25, 0.60, 0.25, 2);
        let background = Background::filled(22.0);
        let mut frame = flat(22.0);
        frame.set(3, 3, 26.0);
        frame.set(3, 4, 26.0);
        let result = disc.discriminate(&frame, &background);
        assert!(result.mask.get(3, 3));
        assert!(result.mask.get(3, 4));
        let count = result.mask.iter_cells().filter(|(_, v)| *v).count();
        assert_eq!(count, 2);
    }

    #[test]
    fn gate_c_rejects_too_few_cells() {
        let disc = Discriminator::new(0.25, 0.60, 0.25, 5);
        let background = Background::filled(22.0);
        let mut frame = flat(22.0);
        frame.set(3, 3, 26.0);
        let result = disc.discriminate(&frame, &background);
        assert!(result.mask.iter_cells().all(|(_, v)| !v));
    }

    #[test]
    fn gate_b_rejects_when_warm_class_too_large() {
        let disc = Discriminator::new(0.25, 0.10, 0.25, 2);
        let background = Background::filled(22.0);
        let mut frame = flat(22.0);
        for row in 0..8 {
            for col in 0..4 {
                frame.set(row, col, 26.0);
            }
        }
        let result = disc.discriminate(&frame, &background);
        assert!(
            result.mask.iter_cells().all(|(_, v)| !v),
            "a half-grid warm region exceeds a 10% cap and must be rejected"
        );
    }
}
