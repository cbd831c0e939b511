//! Gaze session: wires the pipeline stages to the engine, clock and frame
//! scheduler, and owns the tracker lifecycle.
//!
//! Per frame: head landmarks update the stability monitor, the raw gaze is
//! head-compensated, filtered, classified and passed through hysteresis.
//! Dwell progress advances on scheduler ticks so it keeps moving when the
//! engine drops frames.

use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info, warn};

use super::calibration::{CalibrationSequence, CalibrationStep, CalibrationStore};
use super::dwell::{DwellBoard, DwellEvent, TargetClass};
use super::engine::GazeEngine;
use super::filter::{GazeSample, SampleFilter};
use super::geometry::Point;
use super::head::{Alignment, HeadEvent, HeadMonitor};
use super::hysteresis::ZoneHysteresis;
use super::zone::{classify, zone_sexp, GridSpec, Zone};
use crate::clock::Clock;
use crate::config::TrackerConfig;
use crate::error::{ConfigError, EngineError};
use crate::scheduler::{FrameScheduler, ManualScheduler, TickHandle};

// ── Status ──────────────────────────────────────────────────

/// Tracker lifecycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrackerStatus {
    Idle,
    /// Engine starting (camera and model loading).
    Loading,
    /// Engine running, not yet tracking.
    Ready,
    Calibrating,
    Tracking,
    Paused,
    /// Engine could not start. No pipeline processing happens.
    Failed(EngineError),
}

impl TrackerStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Loading => "loading",
            Self::Ready => "ready",
            Self::Calibrating => "calibrating",
            Self::Tracking => "tracking",
            Self::Paused => "paused",
            Self::Failed(_) => "failed",
        }
    }

    /// Engine has been started and not stopped.
    pub fn engine_running(&self) -> bool {
        matches!(
            self,
            Self::Ready | Self::Calibrating | Self::Tracking | Self::Paused
        )
    }

    pub fn to_sexp(&self) -> String {
        match self {
            Self::Failed(err) => format!("(:status :failed :error :{})", err.as_str()),
            other => format!("(:status :{})", other.as_str()),
        }
    }
}

// ── Events ──────────────────────────────────────────────────

/// Everything the session reports to its UI.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    StatusChanged {
        from: TrackerStatus,
        to: TrackerStatus,
    },
    /// The stable zone changed.
    ZoneChanged {
        from: Option<Zone>,
        to: Option<Zone>,
    },
    Dwell(DwellEvent),
    Head(HeadEvent),
    Calibration(CalibrationStep),
    /// Soft recalibration finished; the anchor now sits at the face.
    Reanchored {
        points: usize,
        anchor: Option<Point>,
    },
}

impl SessionEvent {
    pub fn to_sexp(&self) -> String {
        match self {
            Self::StatusChanged { from, to } => format!(
                "(:type :event :event :status :from :{} :to {})",
                from.as_str(),
                to.to_sexp()
            ),
            Self::ZoneChanged { from, to } => format!(
                "(:type :event :event :zone-changed :from {} :to {})",
                zone_sexp(*from),
                zone_sexp(*to)
            ),
            Self::Dwell(evt) => evt.to_sexp(),
            Self::Head(evt) => evt.to_sexp(),
            Self::Calibration(step) => step.to_sexp(),
            Self::Reanchored { points, anchor } => format!(
                "(:type :event :event :reanchored :points {} :anchor {})",
                points,
                anchor
                    .map(|a| a.to_sexp())
                    .unwrap_or_else(|| "nil".to_string())
            ),
        }
    }

    /// The activated target, if this is an activation.
    pub fn activation(&self) -> Option<Zone> {
        match self {
            Self::Dwell(DwellEvent::Activated { target, .. }) => Some(*target),
            _ => None,
        }
    }
}

// ── Session ─────────────────────────────────────────────────

/// One tracking session over an engine and a frame scheduler.
pub struct GazeSession<E: GazeEngine, S: FrameScheduler> {
    config: TrackerConfig,
    engine: E,
    clock: Arc<dyn Clock>,
    scheduler: S,
    status: TrackerStatus,
    filter: SampleFilter,
    hysteresis: ZoneHysteresis,
    head: HeadMonitor,
    board: DwellBoard,
    store: CalibrationStore,
    /// Fresh sequence, cloned for each calibration run.
    calibration_plan: CalibrationSequence,
    sequence: Option<CalibrationSequence>,
    gaze: Option<Point>,
    raw_zone: Option<Zone>,
}

impl<E: GazeEngine, S: FrameScheduler> GazeSession<E, S> {
    pub fn new(
        config: TrackerConfig,
        engine: E,
        clock: Arc<dyn Clock>,
        scheduler: S,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            filter: SampleFilter::new(config.filter.clone())?,
            hysteresis: ZoneHysteresis::new(config.hysteresis.clone())?,
            head: HeadMonitor::new(config.head.clone())?,
            board: DwellBoard::new(config.dwell.clone())?,
            store: CalibrationStore::new(&config.calibration)?,
            calibration_plan: CalibrationSequence::new(
                &config.calibration,
                &config.dwell,
                config.screen_width,
                config.screen_height,
            )?,
            sequence: None,
            gaze: None,
            raw_zone: None,
            status: TrackerStatus::Idle,
            config,
            engine,
            clock,
            scheduler,
        })
    }

    // ── Lifecycle ───────────────────────────────────────────

    /// Start the engine. On failure the session enters `Failed` and the
    /// error is also returned.
    pub fn start(&mut self) -> Result<Vec<SessionEvent>, EngineError> {
        let mut events = Vec::new();
        if self.status.engine_running() {
            return Ok(events);
        }
        self.set_status(TrackerStatus::Loading, &mut events);
        self.engine.set_persistence(self.config.persist_model);
        match self.engine.begin() {
            Ok(()) => {
                self.set_status(TrackerStatus::Ready, &mut events);
                Ok(events)
            }
            Err(err) => {
                warn!("Gaze engine failed to start: {}", err);
                self.set_status(TrackerStatus::Failed(err.clone()), &mut events);
                Err(err)
            }
        }
    }

    /// Begin a full calibration. Previously stored points are discarded.
    pub fn begin_calibration(&mut self) -> Result<Vec<SessionEvent>, EngineError> {
        if !self.status.engine_running() {
            return Err(EngineError::NotRunning);
        }
        let mut events = Vec::new();
        if self.status == TrackerStatus::Paused {
            self.engine.resume();
        }
        self.board.cancel_ticks(&mut self.scheduler);
        self.reset_pipeline();
        self.store.clear();
        self.head.clear_anchor();
        self.sequence = Some(self.calibration_plan.clone());
        info!("Calibration started ({} points)", self.calibration_plan.len());
        self.set_status(TrackerStatus::Calibrating, &mut events);
        Ok(events)
    }

    /// Commit the current calibration point immediately.
    pub fn confirm_calibration_point(&mut self) -> Vec<SessionEvent> {
        let mut events = Vec::new();
        if self.status != TrackerStatus::Calibrating {
            return events;
        }
        let step = match self.sequence.as_mut() {
            Some(seq) => seq.confirm(&mut self.store, &mut self.engine),
            None => None,
        };
        if let Some(step) = step {
            self.on_calibration_step(step, &mut events);
        }
        events
    }

    /// Abandon calibration and return to `Ready`.
    pub fn cancel_calibration(&mut self) -> Vec<SessionEvent> {
        let mut events = Vec::new();
        if self.status == TrackerStatus::Calibrating {
            self.sequence = None;
            info!("Calibration cancelled");
            self.set_status(TrackerStatus::Ready, &mut events);
        }
        events
    }

    /// Start tracking without calibrating (e.g. with a persisted model).
    pub fn start_tracking(&mut self) -> Result<Vec<SessionEvent>, EngineError> {
        let mut events = Vec::new();
        match self.status {
            TrackerStatus::Ready => {
                self.enter_tracking(&mut events);
                Ok(events)
            }
            TrackerStatus::Tracking => Ok(events),
            _ => Err(EngineError::NotRunning),
        }
    }

    pub fn pause(&mut self) -> Vec<SessionEvent> {
        let mut events = Vec::new();
        if self.status == TrackerStatus::Tracking {
            self.engine.pause();
            self.board.cancel_ticks(&mut self.scheduler);
            self.board.reset();
            self.set_status(TrackerStatus::Paused, &mut events);
        }
        events
    }

    pub fn resume(&mut self) -> Vec<SessionEvent> {
        let mut events = Vec::new();
        if self.status == TrackerStatus::Paused {
            self.engine.resume();
            self.enter_tracking(&mut events);
        }
        events
    }

    /// Stop the engine and clear all per-session state. Mounted targets stay
    /// mounted with their tick loops cancelled; the calibration store and
    /// anchor survive for a later soft recalibration.
    pub fn stop(&mut self) -> Vec<SessionEvent> {
        let mut events = Vec::new();
        if self.status == TrackerStatus::Idle {
            return events;
        }
        self.engine.end();
        self.board.cancel_ticks(&mut self.scheduler);
        self.reset_pipeline();
        self.head.reset();
        self.sequence = None;
        self.set_status(TrackerStatus::Idle, &mut events);
        info!("Gaze session stopped");
        events
    }

    fn enter_tracking(&mut self, events: &mut Vec<SessionEvent>) {
        self.reset_pipeline();
        self.board.arm_ticks(&mut self.scheduler);
        self.set_status(TrackerStatus::Tracking, events);
    }

    fn set_status(&mut self, to: TrackerStatus, events: &mut Vec<SessionEvent>) {
        if self.status == to {
            return;
        }
        info!("Tracker status {} -> {}", self.status.as_str(), to.as_str());
        let from = std::mem::replace(&mut self.status, to.clone());
        events.push(SessionEvent::StatusChanged { from, to });
    }

    fn reset_pipeline(&mut self) {
        self.filter.reset();
        self.hysteresis.reset();
        self.board.reset();
        self.gaze = None;
        self.raw_zone = None;
    }

    // ── Frames ──────────────────────────────────────────────

    /// Process one engine frame. `gaze` is the raw estimate in screen
    /// pixels, `None` when the engine produced none.
    pub fn handle_frame(&mut self, gaze: Option<Point>) -> Vec<SessionEvent> {
        let mut events = Vec::new();
        let calibrating = match self.status {
            TrackerStatus::Tracking => false,
            TrackerStatus::Calibrating => true,
            _ => return events,
        };
        let now = self.clock.now();

        let landmarks = self.engine.landmarks();
        let face_visible = landmarks.is_some();
        let head_events = self.head.update(now, landmarks);

        if calibrating {
            self.advance_calibration(now, face_visible, &mut events);
            return events;
        }

        for evt in head_events {
            let request = matches!(evt, HeadEvent::RecalibrationRequested { .. });
            events.push(SessionEvent::Head(evt));
            if request {
                self.on_recalibration_request(&mut events);
            }
        }

        if let Some(raw) = gaze.filter(|p| p.is_finite()) {
            let compensated = self.head.compensate(raw);
            let smoothed = self.filter.push(GazeSample::at(compensated, now)).position();
            self.gaze = Some(smoothed);
            self.raw_zone = classify(
                smoothed,
                self.config.screen_width,
                self.config.screen_height,
                &self.config.grid,
            );
            let before = self.hysteresis.stable();
            let stable = self.hysteresis.update(self.raw_zone);
            if stable != before {
                debug!("Zone {} -> {}", zone_sexp(before), zone_sexp(stable));
                events.push(SessionEvent::ZoneChanged {
                    from: before,
                    to: stable,
                });
                events.extend(
                    self.board
                        .update(now, stable)
                        .into_iter()
                        .map(SessionEvent::Dwell),
                );
            }
        }
        events
    }

    /// Handle a scheduler tick.
    pub fn on_tick(&mut self, handle: TickHandle) -> Option<SessionEvent> {
        if self.status != TrackerStatus::Tracking {
            return None;
        }
        let now = self.clock.now();
        self.board
            .on_tick(handle, now, self.hysteresis.stable(), &mut self.scheduler)
            .map(SessionEvent::Dwell)
    }

    fn advance_calibration(
        &mut self,
        now: Instant,
        face_visible: bool,
        events: &mut Vec<SessionEvent>,
    ) {
        let step = match self.sequence.as_mut() {
            Some(seq) => seq.tick(now, face_visible, &mut self.store, &mut self.engine),
            None => None,
        };
        if let Some(step) = step {
            self.on_calibration_step(step, events);
        }
    }

    fn on_calibration_step(&mut self, step: CalibrationStep, events: &mut Vec<SessionEvent>) {
        let complete = matches!(step, CalibrationStep::Complete { .. });
        events.push(SessionEvent::Calibration(step));
        if !complete {
            return;
        }
        self.sequence = None;
        match self.head.capture_anchor() {
            Some(anchor) => self.store.set_anchor(anchor),
            None => {
                warn!("Calibration finished without a visible face; no head anchor");
                self.head.clear_anchor();
            }
        }
        self.enter_tracking(events);
    }

    // ── Recalibration ───────────────────────────────────────

    fn on_recalibration_request(&mut self, events: &mut Vec<SessionEvent>) {
        self.store.clear_anchor();
        self.hysteresis.reset();
        self.board.reset();
        if self.config.auto_reanchor {
            events.push(self.reanchor());
        }
    }

    /// Replay stored calibration into the engine and re-anchor the head at
    /// the current face position. The learned mapping is kept.
    pub fn soft_recalibrate(&mut self) -> Result<SessionEvent, EngineError> {
        if !self.status.engine_running() {
            return Err(EngineError::NotRunning);
        }
        self.hysteresis.reset();
        self.board.reset();
        Ok(self.reanchor())
    }

    fn reanchor(&mut self) -> SessionEvent {
        let face = self.head.face_position();
        let points = self.store.reinject(&mut self.engine, face);
        if let Some(anchor) = self.store.anchor() {
            self.head.set_anchor(anchor);
        }
        SessionEvent::Reanchored {
            points,
            anchor: self.store.anchor(),
        }
    }

    /// Discard calibration and the anchor, then start a new calibration.
    pub fn recalibrate(&mut self) -> Result<Vec<SessionEvent>, EngineError> {
        if !self.status.engine_running() {
            return Err(EngineError::NotRunning);
        }
        info!("Hard recalibration: discarding {} points", self.store.len());
        self.store.clear();
        self.head.clear_anchor();
        self.begin_calibration()
    }

    // ── Targets and layout ──────────────────────────────────

    /// Make `target` selectable. Its tick loop runs only while tracking.
    pub fn mount_target(&mut self, target: Zone, class: TargetClass) -> Result<(), ConfigError> {
        if !self.config.grid.contains_zone(&target) {
            return Err(ConfigError::TargetOutsideGrid(target.label()));
        }
        self.board.mount(target, class, &mut self.scheduler)?;
        if self.status != TrackerStatus::Tracking {
            self.board.cancel_ticks(&mut self.scheduler);
        }
        Ok(())
    }

    pub fn unmount_target(&mut self, target: &Zone) -> bool {
        self.board.unmount(target, &mut self.scheduler)
    }

    /// Switch zone layout. Targets that no longer fit are unmounted and
    /// returned.
    pub fn set_grid(&mut self, grid: GridSpec) -> Result<Vec<Zone>, ConfigError> {
        grid.validate()?;
        let dropped: Vec<Zone> = self
            .board
            .targets()
            .filter(|t| !grid.contains_zone(t))
            .collect();
        for target in &dropped {
            self.board.unmount(target, &mut self.scheduler);
        }
        info!("Grid changed to {}", grid.as_sexp());
        self.config.grid = grid;
        self.hysteresis.reset();
        self.board.reset();
        self.raw_zone = None;
        Ok(dropped)
    }

    // ── Accessors ───────────────────────────────────────────

    pub fn status(&self) -> &TrackerStatus {
        &self.status
    }

    /// Latest smoothed gaze position.
    pub fn gaze(&self) -> Option<Point> {
        self.gaze
    }

    pub fn raw_zone(&self) -> Option<Zone> {
        self.raw_zone
    }

    pub fn stable_zone(&self) -> Option<Zone> {
        self.hysteresis.stable()
    }

    pub fn dwell_progress(&self, target: &Zone) -> Option<f64> {
        self.board.progress(target)
    }

    pub fn head_offset(&self) -> Point {
        self.head.offset()
    }

    pub fn alignment(&self) -> Alignment {
        self.head.alignment()
    }

    pub fn calibration_progress(&self) -> Option<f64> {
        self.sequence.as_ref().map(|s| s.total_progress())
    }

    pub fn calibration_point(&self) -> Option<Point> {
        self.sequence.as_ref().and_then(|s| s.current_point())
    }

    pub fn store(&self) -> &CalibrationStore {
        &self.store
    }

    pub fn head(&self) -> &HeadMonitor {
        &self.head
    }

    pub fn board(&self) -> &DwellBoard {
        &self.board
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut E {
        &mut self.engine
    }

    pub fn scheduler(&self) -> &S {
        &self.scheduler
    }

    pub fn status_sexp(&self) -> String {
        format!(
            "(:status {} :gaze {} :zone {} :hysteresis {} :head {} :dwell {} :calibration {})",
            self.status.to_sexp(),
            self.gaze
                .map(|g| g.to_sexp())
                .unwrap_or_else(|| "nil".to_string()),
            zone_sexp(self.stable_zone()),
            self.hysteresis.status_sexp(),
            self.head.status_sexp(),
            self.board.status_sexp(),
            match &self.sequence {
                Some(seq) => seq.status_sexp(),
                None => self.store.status_sexp(),
            },
        )
    }
}

impl<E: GazeEngine> GazeSession<E, ManualScheduler> {
    /// Fire every pending tick once, in request order.
    pub fn run_due_ticks(&mut self) -> Vec<SessionEvent> {
        let due = self.scheduler.take_due();
        due.into_iter().filter_map(|h| self.on_tick(h)).collect()
    }
}

// ── Tests ───────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::gaze::dwell::DwellConfig;
    use crate::gaze::engine::SimulatedEngine;
    use crate::gaze::zone::{ContainerRect, Col, Row};

    type TestSession = GazeSession<SimulatedEngine, ManualScheduler>;

    fn session_with(config: TrackerConfig, engine: SimulatedEngine) -> (TestSession, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new());
        let session = GazeSession::new(config, engine, clock.clone(), ManualScheduler::new()).unwrap();
        (session, clock)
    }

    fn tracking_session() -> (TestSession, Arc<ManualClock>) {
        let config = TrackerConfig {
            screen_width: 900.0,
            screen_height: 900.0,
            dwell: DwellConfig::uniform(1000.0, 300.0),
            ..TrackerConfig::default()
        };
        let (mut s, clock) = session_with(config, SimulatedEngine::new());
        s.start().unwrap();
        s.start_tracking().unwrap();
        (s, clock)
    }

    const CENTER: Zone = Zone::Band {
        row: Row::Middle,
        col: Col::Center,
    };

    #[test]
    fn test_start_reaches_ready() {
        let (mut s, _) = session_with(TrackerConfig::default(), SimulatedEngine::new());
        let events = s.start().unwrap();
        assert_eq!(s.status(), &TrackerStatus::Ready);
        assert_eq!(events.len(), 2);
        assert!(s.engine().persistence());
    }

    #[test]
    fn test_permission_denied_fails_session() {
        let engine = SimulatedEngine::new().fail_with(EngineError::PermissionDenied);
        let (mut s, _) = session_with(TrackerConfig::default(), engine);
        assert_eq!(s.start().unwrap_err(), EngineError::PermissionDenied);
        assert_eq!(s.status(), &TrackerStatus::Failed(EngineError::PermissionDenied));
        assert!(s.handle_frame(Some(Point::new(10.0, 10.0))).is_empty());
        assert!(s.gaze().is_none());
        assert_eq!(
            s.status().to_sexp(),
            "(:status :failed :error :permission-denied)"
        );
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = TrackerConfig {
            grid: GridSpec::Cells {
                size: 20,
                bounds: ContainerRect::new(0.0, 0.0, 100.0, 100.0),
            },
            ..TrackerConfig::default()
        };
        let clock = Arc::new(ManualClock::new());
        let result = GazeSession::new(config, SimulatedEngine::new(), clock, ManualScheduler::new());
        assert!(matches!(result, Err(ConfigError::InvalidGridSize { size: 20, .. })));
    }

    #[test]
    fn test_frames_ignored_until_tracking() {
        let (mut s, _) = session_with(TrackerConfig::default(), SimulatedEngine::new());
        s.start().unwrap();
        assert!(s.handle_frame(Some(Point::new(1.0, 1.0))).is_empty());
        assert!(s.gaze().is_none());
    }

    #[test]
    fn test_stable_zone_after_threshold() {
        let (mut s, clock) = tracking_session();
        let mut changes = 0;
        for _ in 0..5 {
            clock.advance_ms(33);
            for e in s.handle_frame(Some(Point::new(450.0, 450.0))) {
                if let SessionEvent::ZoneChanged { to, .. } = e {
                    assert_eq!(to, Some(CENTER));
                    changes += 1;
                }
            }
        }
        assert_eq!(changes, 1);
        assert_eq!(s.stable_zone(), Some(CENTER));
    }

    #[test]
    fn test_missing_gaze_holds_zone() {
        let (mut s, clock) = tracking_session();
        for _ in 0..5 {
            clock.advance_ms(33);
            s.handle_frame(Some(Point::new(450.0, 450.0)));
        }
        for _ in 0..20 {
            clock.advance_ms(33);
            assert!(s.handle_frame(None).is_empty());
        }
        assert_eq!(s.stable_zone(), Some(CENTER));
    }

    #[test]
    fn test_dwell_activates_via_ticks() {
        let (mut s, clock) = tracking_session();
        s.mount_target(CENTER, TargetClass::Menu).unwrap();
        assert_eq!(s.scheduler().pending_count(), 1);

        let mut activations = 0;
        for _ in 0..60 {
            clock.advance_ms(33);
            let mut events = s.handle_frame(Some(Point::new(450.0, 450.0)));
            events.extend(s.run_due_ticks());
            activations += events.iter().filter(|e| e.activation().is_some()).count();
        }
        // 60 frames ≈ 2s at 1000ms dwell: one activation, then a fresh dwell
        assert!(activations >= 1);
        assert_eq!(s.scheduler().pending_count(), 1);
    }

    #[test]
    fn test_pause_cancels_ticks_and_resume_rearms() {
        let (mut s, _) = tracking_session();
        s.mount_target(CENTER, TargetClass::Menu).unwrap();
        s.pause();
        assert_eq!(s.status(), &TrackerStatus::Paused);
        assert_eq!(s.scheduler().pending_count(), 0);
        assert!(s.engine().is_paused());
        s.resume();
        assert_eq!(s.status(), &TrackerStatus::Tracking);
        assert_eq!(s.scheduler().pending_count(), 1);
    }

    #[test]
    fn test_mount_while_idle_does_not_tick() {
        let (mut s, _) = session_with(TrackerConfig::default(), SimulatedEngine::new());
        s.mount_target(CENTER, TargetClass::Keyboard).unwrap();
        assert_eq!(s.scheduler().pending_count(), 0);
        assert!(s.mount_target(CENTER, TargetClass::Keyboard).is_err());
    }

    #[test]
    fn test_mount_rejects_zone_outside_grid() {
        let (mut s, _) = tracking_session();
        let err = s
            .mount_target(Zone::Cell { row: 0, col: 0 }, TargetClass::Menu)
            .unwrap_err();
        assert_eq!(err, ConfigError::TargetOutsideGrid("A1".to_string()));
    }

    #[test]
    fn test_set_grid_drops_targets() {
        let (mut s, _) = tracking_session();
        s.mount_target(CENTER, TargetClass::Menu).unwrap();
        let grid = GridSpec::cells(3, ContainerRect::new(0.0, 0.0, 900.0, 900.0)).unwrap();
        let dropped = s.set_grid(grid).unwrap();
        assert_eq!(dropped, vec![CENTER]);
        assert!(s.board().is_empty());
        assert_eq!(s.scheduler().pending_count(), 0);
    }

    #[test]
    fn test_stop_resets_and_is_idempotent() {
        let (mut s, clock) = tracking_session();
        s.mount_target(CENTER, TargetClass::Menu).unwrap();
        for _ in 0..5 {
            clock.advance_ms(33);
            s.handle_frame(Some(Point::new(450.0, 450.0)));
        }
        s.stop();
        assert_eq!(s.status(), &TrackerStatus::Idle);
        assert!(s.stable_zone().is_none());
        assert!(s.gaze().is_none());
        assert_eq!(s.scheduler().pending_count(), 0);
        assert!(!s.engine().is_running());
        assert!(s.stop().is_empty());
    }

    #[test]
    fn test_calibration_requires_running_engine() {
        let (mut s, _) = session_with(TrackerConfig::default(), SimulatedEngine::new());
        assert_eq!(s.begin_calibration().unwrap_err(), EngineError::NotRunning);
        assert_eq!(s.soft_recalibrate().unwrap_err(), EngineError::NotRunning);
    }

    #[test]
    fn test_confirmed_calibration_sets_anchor() {
        let (mut s, clock) = session_with(TrackerConfig::default(), SimulatedEngine::new());
        s.start().unwrap();
        s.engine_mut().set_face_center(Point::new(320.0, 240.0));
        s.begin_calibration().unwrap();
        assert_eq!(s.status(), &TrackerStatus::Calibrating);

        // One frame so the head monitor sees the face
        clock.advance_ms(33);
        s.handle_frame(None);
        for _ in 0..9 {
            s.confirm_calibration_point();
        }
        assert_eq!(s.status(), &TrackerStatus::Tracking);
        assert_eq!(s.store().len(), 9);
        assert_eq!(s.store().anchor(), Some(Point::new(320.0, 240.0)));
        assert_eq!(s.head().anchor(), Some(Point::new(320.0, 240.0)));
        assert_eq!(s.engine().training().len(), 45);
    }

    #[test]
    fn test_cancelled_calibration_drops_head_anchor() {
        let (mut s, clock) = session_with(TrackerConfig::default(), SimulatedEngine::new());
        s.start().unwrap();
        s.engine_mut().set_face_center(Point::new(320.0, 240.0));
        s.begin_calibration().unwrap();
        clock.advance_ms(33);
        s.handle_frame(None);
        for _ in 0..9 {
            s.confirm_calibration_point();
        }
        assert!(s.head().anchor().is_some());

        s.begin_calibration().unwrap();
        assert_eq!(s.head().anchor(), None);
        assert_eq!(s.head().anchor(), s.store().anchor());

        s.engine_mut().set_face_center(Point::new(330.0, 240.0));
        clock.advance_ms(33);
        s.handle_frame(None);
        s.cancel_calibration();
        s.start_tracking().unwrap();

        clock.advance_ms(33);
        s.handle_frame(Some(Point::new(100.0, 100.0)));
        assert_eq!(s.head().anchor(), None);
        assert_eq!(s.head_offset(), Point::ZERO);
        assert_eq!(s.gaze(), Some(Point::new(100.0, 100.0)));
    }

    #[test]
    fn test_faceless_calibration_leaves_no_anchor() {
        let (mut s, clock) = session_with(TrackerConfig::default(), SimulatedEngine::new());
        s.start().unwrap();
        s.engine_mut().set_face_center(Point::new(320.0, 240.0));
        s.begin_calibration().unwrap();
        clock.advance_ms(33);
        s.handle_frame(None);
        for _ in 0..9 {
            s.confirm_calibration_point();
        }
        s.stop();

        s.start().unwrap();
        s.engine_mut().clear_face();
        s.begin_calibration().unwrap();
        clock.advance_ms(33);
        s.handle_frame(None);
        for _ in 0..9 {
            s.confirm_calibration_point();
        }
        assert_eq!(s.status(), &TrackerStatus::Tracking);
        assert_eq!(s.store().anchor(), None);
        assert_eq!(s.head().anchor(), None);

        s.engine_mut().set_face_center(Point::new(360.0, 240.0));
        clock.advance_ms(33);
        s.handle_frame(Some(Point::new(100.0, 100.0)));
        assert_eq!(s.gaze(), Some(Point::new(100.0, 100.0)));
    }

    #[test]
    fn test_status_sexp_shape() {
        let (s, _) = tracking_session();
        let sexp = s.status_sexp();
        assert!(sexp.starts_with("(:status (:status :tracking)"));
        assert!(sexp.contains(":zone nil"));
    }
}
