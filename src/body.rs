//! Per-frame body segmentation: connected components, size filtering, and
//! watershed-like splitting of merged/bi-modal blobs.

use crate::frame::{Cell, Delta, Mask};

/// An inclusive bounding rectangle within the 8x8 grid.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Rect {
    /// Smallest row index covered by the region.
    pub row_min: usize,
    /// Largest row index covered by the region.
    pub row_max: usize,
    /// Smallest column index covered by the region.
    pub col_min: usize,
    /// Largest column index covered by the region.
    pub col_max: usize,
}

/// One candidate body found in the current frame.
///
/// See [the module-level documentation](self) for details.
#[derive(Clone, Debug)]
pub struct Detection {
    /// Bounding rectangle of the region's cells.
    pub bounds: Rect,
    /// Temperature-weighted centroid, `(row, col)`, sub-cell precision.
    pub centroid: (f32, f32),
    /// Mean Δ over the region's cells.
    pub mean_temp: f32,
    /// Peak Δ over the region's cells.
    pub peak_temp: f32,
    /// Number of cells in the region.
    pub cell_count: usize,
}

/// Turns a foreground mask into a small list of [`Detection`]s.
///
/// See [the module-level documentation](self) for details.
#[derive(Clone, Copy, Debug)]
pub struct BodyExtractor {
    min_body_cells: usize,
    max_body_cells: usize,
    single_body_cells: usize,
    min_peak_separation: usize,
}

impl BodyExtractor {
    /// Creates an extractor from its four tunables.
    #[must_use]
    pub fn new(
        min_body_cells: usize,
        max_body_cells: usize,
        single_body_cells: usize,
        min_peak_separation: usize,
    ) -> Self {
        Self { min_body_cells, max_body_cells, single_body_cells, min_peak_separation }
    }

    /// Extracts detections from a mask/delta pair. Detections have
    /// pairwise-disjoint cell sets by construction.
    pub fn extract(&self, mask: &Mask, delta: &Delta) -> Vec<Detection> {
        let mut detections = Vec::new();
        for component in connected_components(mask) {
            if component.len() < self.min_body_cells || component.len() > self.max_body_cells {
                continue;
            }
            for region in self.maybe_split(&component, delta) {
                detections.push(build_detection(&region, delta));
            }
        }
        detections
    }

    /// Splits `component` into two regions around its two hottest,
    /// sufficiently-separated peaks if it is oversize or bi-modal; returns
    /// the component unsplit otherwise, or if splitting would produce a
    /// child smaller than `min_body_cells`.
    fn maybe_split(&self, component: &[Cell], delta: &Delta) -> Vec<Vec<Cell>> {
        let needs_split =
            component.len() > self.single_body_cells || self.is_bimodal(component, delta);
        if !needs_split {
            return vec![component.to_vec()];
        }
        let Some((peak_a, peak_b)) = self.find_peak_pair(component, delta) else {
            return vec![component.to_vec()];
        };
        let mut group_a = Vec::new();
        let mut group_b = Vec::new();
        for &cell in component {
            let da = squared_distance(cell, peak_a);
            let db = squared_distance(cell, peak_b);
            if da < db {
                group_a.push(cell);
            } else if db < da {
                group_b.push(cell);
            } else if delta[peak_a] >= delta[peak_b] {
                group_a.push(cell);
            } else {
                group_b.push(cell);
            }
        }
        if group_a.len() < self.min_body_cells || group_b.len() < self.min_body_cells {
            return vec![component.to_vec()];
        }
        vec![group_a, group_b]
    }

    /// Finds the two hottest cells in `component` that are at least
    /// `min_peak_separation` apart (Chebyshev distance), if any such pair
    /// exists.
    fn find_peak_pair(&self, component: &[Cell], delta: &Delta) -> Option<(Cell, Cell)> {
        let mut sorted: Vec<Cell> = component.to_vec();
        sorted.sort_by(|a, b| delta[*b].partial_cmp(&delta[*a]).expect("finite deltas"));
        let peak_a = *sorted.first()?;
        let peak_b = sorted
            .iter()
            .skip(1)
            .find(|&&c| c.chebyshev_distance(peak_a) >= self.min_peak_separation)?;
        Some((peak_a, *peak_b))
    }

    /// `true` if the component's Δ histogram shows two distinct local
    /// maxima at least `min_peak_separation` apart: cells whose Δ is
    /// strictly greater than every in-component 8-neighbor's Δ.
    fn is_bimodal(&self, component: &[Cell], delta: &Delta) -> bool {
        use std::collections::HashSet;
        let members: HashSet<Cell> = component.iter().copied().collect();
        let local_maxima: Vec<Cell> = component
            .iter()
            .copied()
            .filter(|&cell| {
                cell.neighbors_8()
                    .filter(|n| members.contains(n))
                    .all(|n| delta[n] < delta[cell])
            })
            .collect();
        local_maxima.iter().enumerate().any(|(i, &a)| {
            local_maxima[i + 1..]
                .iter()
                .any(|&b| a.chebyshev_distance(b) >= self.min_peak_separation)
        })
    }
}

fn squared_distance(a: Cell, b: Cell) -> f32 {
    let dr = a.row as f32 - b.row as f32;
    let dc = a.col as f32 - b.col as f32;
    dr * dr + dc * dc
}

fn build_detection(region: &[Cell], delta: &Delta) -> Detection {
    let row_min = region.iter().map(|c| c.row).min().unwrap();
    let row_max = region.iter().map(|c| c.row).max().unwrap();
    let col_min = region.iter().map(|c| c.col).min().unwrap();
    let col_max = region.iter().map(|c| c.col).max().unwrap();

    let weight_sum: f32 = region.iter().map(|&c| delta[c]).sum();
    let centroid = if weight_sum > 0.0 {
        let row = region.iter().map(|&c| delta[c] * c.row as f32).sum::<f32>() / weight_sum;
        let col = region.iter().map(|&c| delta[c] * c.col as f32).sum::<f32>() / weight_sum;
        (row, col)
    } else {
        let n = region.len() as f32;
        let row = region.iter().map(|c| c.row as f32).sum::<f32>() / n;
        let col = region.iter().map(|c| c.col as f32).sum::<f32>() / n;
        (row, col)
    };

    let mean_temp = region.iter().map(|&c| delta[c]).sum::<f32>() / region.len() as f32;
    let peak_temp = region.iter().map(|&c| delta[c]).fold(f32::MIN, |acc, v| acc.max(v));

    Detection {
        bounds: Rect { row_min, row_max, col_min, col_max },
        centroid,
        mean_temp,
        peak_temp,
        cell_count: region.len(),
    }
}

/// 8-connected components of the `true` cells of `mask`, via flood fill.
fn connected_components(mask: &Mask) -> Vec<Vec<Cell>> {
    use std::collections::HashSet;
    let mut visited: HashSet<Cell> = HashSet::new();
    let mut components = Vec::new();
    for (cell, is_set) in mask.iter_cells() {
        if !is_set || visited.contains(&cell) {
            continue;
        }
        let mut component = Vec::new();
        let mut stack = vec![cell];
        visited.insert(cell);
        while let Some(current) = stack.pop() {
            component.push(current);
            for neighbor in current.neighbors_8() {
                if mask[neighbor] && visited.insert(neighbor) {
                    stack.push(neighbor);
                }
            }
        }
        components.push(component);
    }
    components
}
