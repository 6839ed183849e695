//! Collapse engine for blobver.
//!
//! Over time a path template accumulates one direct object per publish, and
//! many consecutive publishes carry identical content. [`Collapser`] sorts a
//! template's direct objects into version order and deletes every object
//! that repeats its predecessor, keeping the first object of each run of
//! identical content. The latest object and the latest-number marker are
//! never touched.

pub mod collapser;
pub mod config;
pub mod error;
pub mod types;

pub use collapser::Collapser;
pub use config::CollapseConfig;
pub use error::{CollapseError, CollapseResult};
pub use types::{CollapseReport, CollapseRequest};
