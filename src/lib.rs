//! A thermal-array doorway people-counting pipeline.
//!
//! An 8x8 far-infrared sensor feed is turned into directional crossing
//! events through a fixed sequence of stages: adaptive background
//! estimation, foreground discrimination, body segmentation, and
//! multi-object tracking. See [`pipeline::Pipeline`] for the entry point.
//!
//! # Guidelines
//!
//! The code should be formatted with Rustfmt using the project-level
//! `rustfmt.toml`. E.g. run from the command line: `cargo fmt`.
//!
//! The code should pass clippy lints in pedantic mode. E.g. run from the
//! command line: `cargo clippy`. It's fine to suppress some lint locally with
//! `#[allow(clippy::<lint>)]`.
//!
//! The code should be properly documented and should pass the
//! `#[warn(missing_docs)]` lint.

#![warn(missing_docs, unsafe_op_in_unsafe_fn)]
#![warn(clippy::pedantic)]
#![allow(clippy::doc_markdown, clippy::missing_errors_doc, clippy::missing_panics_doc)]

pub mod background;
pub mod body;
pub mod config;
pub mod consts;
pub mod error;
pub mod event;
pub mod foreground;
pub mod frame;
pub mod pipeline;
pub mod tracker;

pub use config::Config;
pub use error::{Error, Result};
pub use event::{EventSink, OccupancyCounter};
pub use pipeline::{FrameSource, Pipeline};
pub use tracker::{CrossingEvent, Direction};
