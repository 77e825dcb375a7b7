//! Project constants.

/// Number of rows in the sensor grid.
pub const GRID_ROWS: usize = 8;

/// Number of columns in the sensor grid. The column axis is the traversal
/// axis that crossing direction is classified against.
pub const GRID_COLS: usize = 8;

/// Total number of cells in the sensor grid.
pub const GRID_CELLS: usize = GRID_ROWS * GRID_COLS;

/// Below this between-class variance, an Otsu split is considered degenerate
/// (all cells effectively equal) rather than a real foreground/background
/// separation. Not a deployment knob: it only guards against exact ties and
/// floating-point noise on an all-equal frame, which is otherwise the only
/// way gate B's variance search can degenerate on a 64-cell grid.
pub const OTSU_NOISE_FLOOR: f32 = 1e-6;

/// Grace multiplier applied to the nominal frame period before a missing
/// frame is reported as [`crate::error::Error::SensorStalled`].
pub const SENSOR_STALL_GRACE_MULTIPLIER: f32 = 3.0;
