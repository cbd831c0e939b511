//! Gaze interaction pipeline.
//!
//! Raw engine estimates flow through `filter`, `zone` and `hysteresis` into
//! the per-target dwell controllers in `dwell`. `head` watches the face
//! landmarks for drift, and `calibration` keeps the committed training
//! points. `session` ties the stages together.

pub mod calibration;
pub mod dwell;
pub mod engine;
pub mod filter;
pub mod geometry;
pub mod head;
pub mod hysteresis;
pub mod session;
pub mod zone;

pub use geometry::Point;
pub use session::{GazeSession, SessionEvent, TrackerStatus};
