//! Gazeboard tracking core: turns noisy gaze estimates from an external
//! engine into stable zone selections and dwell activations, with head-drift
//! compensation and silent recalibration.
//!
//! The binary entry point (`gazeboard-sim`) lives in `main.rs`.

pub mod clock;
pub mod config;
pub mod error;
pub mod gaze;
pub mod input_source;
pub mod scheduler;
