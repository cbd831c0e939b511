//! Calibration store and the guided calibration sequence.
//!
//! The store remembers every committed calibration point so the engine can
//! be re-trained without the user repeating the exercise (soft
//! recalibration), and keeps the head anchor captured at the end of
//! calibration.

use std::time::Instant;

use tracing::{debug, info};

use super::dwell::{DwellConfig, DwellController, DwellEvent, TargetClass};
use super::engine::{GazeEngine, TrainingKind};
use super::geometry::Point;
use super::zone::Zone;
use crate::error::ConfigError;

// ── Config ──────────────────────────────────────────────────

/// Configuration for calibration.
#[derive(Debug, Clone)]
pub struct CalibrationConfig {
    /// Training calls forwarded to the engine per committed point.
    pub clicks_per_point: u32,
    /// Point positions as percentages of the screen size.
    pub points_pct: Vec<Point>,
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        let mut points_pct = Vec::with_capacity(9);
        for y in [10.0, 50.0, 90.0] {
            for x in [10.0, 50.0, 90.0] {
                points_pct.push(Point::new(x, y));
            }
        }
        Self {
            clicks_per_point: 5,
            points_pct,
        }
    }
}

impl CalibrationConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.clicks_per_point == 0 {
            return Err(ConfigError::ZeroClicksPerPoint);
        }
        if self.points_pct.is_empty() {
            return Err(ConfigError::NoCalibrationPoints);
        }
        let in_range = |v: f64| (0.0..=100.0).contains(&v);
        if let Some(p) = self
            .points_pct
            .iter()
            .find(|p| !in_range(p.x) || !in_range(p.y))
        {
            return Err(ConfigError::CalibrationPointOutOfRange { x: p.x, y: p.y });
        }
        Ok(())
    }

    /// Point positions in screen pixels.
    pub fn screen_points(&self, screen_width: f64, screen_height: f64) -> Vec<Point> {
        self.points_pct
            .iter()
            .map(|p| Point::new(p.x / 100.0 * screen_width, p.y / 100.0 * screen_height))
            .collect()
    }
}

// ── Store ───────────────────────────────────────────────────

/// Ordered, append-only record of committed calibration points.
#[derive(Debug, Clone)]
pub struct CalibrationStore {
    clicks_per_point: u32,
    points: Vec<Point>,
    anchor: Option<Point>,
}

impl CalibrationStore {
    pub fn new(config: &CalibrationConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            clicks_per_point: config.clicks_per_point,
            points: Vec::new(),
            anchor: None,
        })
    }

    /// Append `point` and train the engine on it `clicks_per_point` times.
    pub fn record(&mut self, point: Point, engine: &mut dyn GazeEngine) {
        self.points.push(point);
        self.train(point, engine);
        debug!(
            "Calibration point {} recorded at {}",
            self.points.len(),
            point.to_sexp()
        );
    }

    /// Replay every stored point into the engine and re-anchor at `face`.
    ///
    /// Returns the number of points replayed. The anchor is left unchanged
    /// when no face is visible.
    pub fn reinject(&mut self, engine: &mut dyn GazeEngine, face: Option<Point>) -> usize {
        for point in &self.points {
            self.train(*point, engine);
        }
        if let Some(face) = face {
            self.anchor = Some(face);
        }
        info!(
            "Calibration reinjected: {} points, anchor {}",
            self.points.len(),
            self.anchor
                .map(|a| a.to_sexp())
                .unwrap_or_else(|| "nil".to_string())
        );
        self.points.len()
    }

    /// Discard all points and the anchor.
    pub fn clear(&mut self) {
        if !self.points.is_empty() {
            info!("Calibration cleared ({} points)", self.points.len());
        }
        self.points.clear();
        self.anchor = None;
    }

    /// Forget the anchor but keep the points.
    pub fn clear_anchor(&mut self) {
        self.anchor = None;
    }

    pub fn set_anchor(&mut self, anchor: Point) {
        self.anchor = Some(anchor);
    }

    pub fn anchor(&self) -> Option<Point> {
        self.anchor
    }

    pub fn points(&self) -> &[Point] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn clicks_per_point(&self) -> u32 {
        self.clicks_per_point
    }

    fn train(&self, point: Point, engine: &mut dyn GazeEngine) {
        for _ in 0..self.clicks_per_point {
            engine.record_screen_position(point.x, point.y, TrainingKind::Click);
        }
    }

    pub fn status_sexp(&self) -> String {
        format!(
            "(:points {} :clicks-per-point {} :anchor {})",
            self.points.len(),
            self.clicks_per_point,
            self.anchor
                .map(|a| a.to_sexp())
                .unwrap_or_else(|| "nil".to_string()),
        )
    }
}

// ── Sequence ────────────────────────────────────────────────

/// Outcome of advancing the calibration sequence.
#[derive(Debug, Clone, PartialEq)]
pub enum CalibrationStep {
    /// Dwell on the current point is progressing.
    Progress { index: usize, total_progress: f64 },
    /// A point was committed and the next one is shown.
    PointCommitted { index: usize, next: Point },
    /// The last point was committed.
    Complete { points: usize },
}

impl CalibrationStep {
    pub fn to_sexp(&self) -> String {
        match self {
            Self::Progress {
                index,
                total_progress,
            } => format!(
                "(:type :event :event :calibration-progress :point {} :progress {:.1})",
                index, total_progress
            ),
            Self::PointCommitted { index, next } => format!(
                "(:type :event :event :calibration-point :committed {} :next {})",
                index,
                next.to_sexp()
            ),
            Self::Complete { points } => format!(
                "(:type :event :event :calibration-complete :points {})",
                points
            ),
        }
    }
}

/// Walks the user through the calibration points.
///
/// Each point is committed after a dwell, or immediately via `confirm`.
#[derive(Debug, Clone)]
pub struct CalibrationSequence {
    points: Vec<Point>,
    current: usize,
    dwell: DwellController,
    finished: bool,
}

impl CalibrationSequence {
    pub fn new(
        config: &CalibrationConfig,
        dwell_config: &DwellConfig,
        screen_width: f64,
        screen_height: f64,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let points = config.screen_points(screen_width, screen_height);
        // One controller shared by every point, reset between them.
        let dwell = DwellController::new(
            Zone::Cell { row: 0, col: 0 },
            TargetClass::Calibration,
            dwell_config,
        )?;
        Ok(Self {
            points,
            current: 0,
            dwell,
            finished: false,
        })
    }

    /// Advance the dwell on the current point. `looking` is whether the
    /// user is attending to it (in practice: a face is visible).
    pub fn tick(
        &mut self,
        now: Instant,
        looking: bool,
        store: &mut CalibrationStore,
        engine: &mut dyn GazeEngine,
    ) -> Option<CalibrationStep> {
        if self.finished {
            return None;
        }
        match self.dwell.tick(now, looking)? {
            DwellEvent::Activated { .. } => Some(self.commit(store, engine)),
            DwellEvent::Progress { .. } | DwellEvent::Started { .. } => {
                Some(CalibrationStep::Progress {
                    index: self.current,
                    total_progress: self.total_progress(),
                })
            }
            DwellEvent::GraceEntered { .. } | DwellEvent::Cancelled { .. } => None,
        }
    }

    /// Commit the current point without waiting for the dwell.
    pub fn confirm(
        &mut self,
        store: &mut CalibrationStore,
        engine: &mut dyn GazeEngine,
    ) -> Option<CalibrationStep> {
        if self.finished {
            return None;
        }
        Some(self.commit(store, engine))
    }

    fn commit(
        &mut self,
        store: &mut CalibrationStore,
        engine: &mut dyn GazeEngine,
    ) -> CalibrationStep {
        let index = self.current;
        store.record(self.points[index], engine);

        if index + 1 >= self.points.len() {
            self.finished = true;
            self.dwell.reset();
            info!("Calibration sequence complete ({} points)", self.points.len());
            return CalibrationStep::Complete {
                points: self.points.len(),
            };
        }

        self.current = index + 1;
        self.dwell.reset();
        CalibrationStep::PointCommitted {
            index,
            next: self.points[self.current],
        }
    }

    /// Overall progress across all points, 0–100.
    pub fn total_progress(&self) -> f64 {
        if self.finished {
            return 100.0;
        }
        let n = self.points.len() as f64;
        (self.current as f64 * 100.0 + self.dwell.progress()) / n
    }

    pub fn current_point(&self) -> Option<Point> {
        if self.finished {
            None
        } else {
            self.points.get(self.current).copied()
        }
    }

    pub fn current_index(&self) -> usize {
        self.current
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn status_sexp(&self) -> String {
        format!(
            "(:point {} :of {} :progress {:.1} :finished {})",
            self.current + 1,
            self.points.len(),
            self.total_progress(),
            if self.finished { "t" } else { "nil" },
        )
    }
}

// ── Tests ───────────────────────────────────────────────────
