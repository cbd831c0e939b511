//! Gaze engine collaborator.
//!
//! The engine owns the camera, face-mesh model and the learned
//! screen-to-feature regression. The core only starts and stops it, feeds it
//! training positions, and reads face landmarks back.

use tracing::{debug, info, warn};

use super::geometry::Point;
use crate::error::EngineError;

/// Kind of training observation forwarded to the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrainingKind {
    Click,
}

impl TrainingKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Click => "click",
        }
    }
}

/// External gaze-estimation engine.
pub trait GazeEngine {
    /// Acquire the camera and load the model.
    fn begin(&mut self) -> Result<(), EngineError>;
    /// Release the camera.
    fn end(&mut self);
    fn pause(&mut self);
    fn resume(&mut self);
    /// Teach the regression that the user is looking at `(x, y)`.
    fn record_screen_position(&mut self, x: f64, y: f64, kind: TrainingKind);
    /// Latest face-mesh landmarks in camera pixels, if a face is visible.
    fn landmarks(&self) -> Option<&[Point]>;
    /// Keep the learned model across sessions.
    fn set_persistence(&mut self, persist: bool);
}

// ── Simulated engine ────────────────────────────────────────

/// Number of points in a synthetic face mesh (468 mesh + 10 iris).
pub const SIMULATED_LANDMARK_COUNT: usize = 478;

/// Half the distance between the synthetic inner eye corners, in pixels.
const EYE_HALF_SPAN: f64 = 15.0;

/// In-process engine for development and tests.
///
/// Landmarks are synthesized around a settable face center, with the two
/// inner eye corners placed symmetrically on either side.
#[derive(Debug)]
pub struct SimulatedEngine {
    running: bool,
    paused: bool,
    persist: bool,
    fail_with: Option<EngineError>,
    eye_pair: (usize, usize),
    landmarks: Option<Vec<Point>>,
    training: Vec<(Point, TrainingKind)>,
}

impl SimulatedEngine {
    pub fn new() -> Self {
        Self {
            running: false,
            paused: false,
            persist: false,
            fail_with: None,
            eye_pair: (133, 362),
            landmarks: None,
            training: Vec::new(),
        }
    }

    /// Make the next `begin` fail with `err`.
    pub fn fail_with(mut self, err: EngineError) -> Self {
        self.fail_with = Some(err);
        self
    }

    /// Use a different landmark index pair for the eye corners.
    pub fn with_eye_pair(mut self, left: usize, right: usize) -> Self {
        self.eye_pair = (left, right);
        self
    }

    /// Place the synthetic face so its eye-corner midpoint is `center`.
    pub fn set_face_center(&mut self, center: Point) {
        let (left, right) = self.eye_pair;
        let len = SIMULATED_LANDMARK_COUNT.max(left.max(right) + 1);
        let mut mesh = vec![center; len];
        mesh[left] = Point::new(center.x - EYE_HALF_SPAN, center.y);
        mesh[right] = Point::new(center.x + EYE_HALF_SPAN, center.y);
        self.landmarks = Some(mesh);
    }

    /// No face in view.
    pub fn clear_face(&mut self) {
        self.landmarks = None;
    }

    /// Every training observation received, in order.
    pub fn training(&self) -> &[(Point, TrainingKind)] {
        &self.training
    }

    pub fn clear_training(&mut self) {
        self.training.clear();
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn persistence(&self) -> bool {
        self.persist
    }
}

impl Default for SimulatedEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl GazeEngine for SimulatedEngine {
    fn begin(&mut self) -> Result<(), EngineError> {
        if let Some(err) = self.fail_with.take() {
            warn!("Simulated engine refusing to start: {}", err);
            return Err(err);
        }
        self.running = true;
        self.paused = false;
        info!("Simulated gaze engine started");
        Ok(())
    }

    fn end(&mut self) {
        if self.running {
            info!("Simulated gaze engine stopped");
        }
        self.running = false;
        self.paused = false;
    }

    fn pause(&mut self) {
        self.paused = true;
    }

    fn resume(&mut self) {
        self.paused = false;
    }

    fn record_screen_position(&mut self, x: f64, y: f64, kind: TrainingKind) {
        debug!("Training {} at ({:.0}, {:.0})", kind.as_str(), x, y);
        self.training.push((Point::new(x, y), kind));
    }

    fn landmarks(&self) -> Option<&[Point]> {
        if !self.running || self.paused {
            return None;
        }
        self.landmarks.as_deref()
    }

    fn set_persistence(&mut self, persist: bool) {
        self.persist = persist;
    }
}
