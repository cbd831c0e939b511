//! Dwell activation: converts "this target is the stable zone" over time
//! into a single activation event per completed dwell.
//!
//! Each selectable target owns a `DwellController`:
//!
//! ```text
//! Idle ──enter──▶ Accumulating ──progress 100──▶ (Activated) ──▶ Idle
//!                   │      ▲
//!              leave│      │re-enter before grace expires
//!                   ▼      │
//!                   Grace ─┘──grace expires──▶ Idle (progress 0)
//! ```
//!
//! Controllers are independent: every one observes the same stable-zone
//! stream and only reacts to its own target. `DwellBoard` holds the mounted
//! controllers and their self-rescheduling tick loops.

use std::time::Instant;

use tracing::{debug, info};

use super::zone::Zone;
use crate::clock::elapsed_ms;
use crate::error::ConfigError;
use crate::scheduler::{FrameScheduler, TickHandle, TickLoop};

// ── Target class ────────────────────────────────────────────

/// Category of selectable target; each class has its own dwell time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetClass {
    /// Primary menu items (slow, deliberate).
    Menu,
    /// Dense keyboard keys (faster).
    Keyboard,
    /// Calibration points.
    Calibration,
}

impl TargetClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Menu => "menu",
            Self::Keyboard => "keyboard",
            Self::Calibration => "calibration",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "menu" => Some(Self::Menu),
            "keyboard" => Some(Self::Keyboard),
            "calibration" => Some(Self::Calibration),
            _ => None,
        }
    }
}

/// How elapsed time is treated while a target is in grace.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GraceClock {
    /// Dwell time stops during grace; activation needs the full dwell time of
    /// actual looking.
    Frozen,
    /// Dwell time keeps running from the original start during grace.
    Running,
}

impl GraceClock {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Frozen => "frozen",
            Self::Running => "running",
        }
    }
}

// ── Config ──────────────────────────────────────────────────

/// Dwell timing configuration.
#[derive(Debug, Clone)]
pub struct DwellConfig {
    pub menu_dwell_ms: f64,
    pub keyboard_dwell_ms: f64,
    pub calibration_dwell_ms: f64,
    /// Tolerated interruption before progress is discarded.
    pub grace_ms: f64,
    pub grace_clock: GraceClock,
}

impl Default for DwellConfig {
    fn default() -> Self {
        Self {
            menu_dwell_ms: 3000.0,
            keyboard_dwell_ms: 2000.0,
            calibration_dwell_ms: 2000.0,
            grace_ms: 400.0,
            grace_clock: GraceClock::Frozen,
        }
    }
}

impl DwellConfig {
    /// Same dwell time for every class.
    pub fn uniform(dwell_ms: f64, grace_ms: f64) -> Self {
        Self {
            menu_dwell_ms: dwell_ms,
            keyboard_dwell_ms: dwell_ms,
            calibration_dwell_ms: dwell_ms,
            grace_ms,
            ..Self::default()
        }
    }

    pub fn dwell_ms_for(&self, class: TargetClass) -> f64 {
        match class {
            TargetClass::Menu => self.menu_dwell_ms,
            TargetClass::Keyboard => self.keyboard_dwell_ms,
            TargetClass::Calibration => self.calibration_dwell_ms,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for ms in [
            self.menu_dwell_ms,
            self.keyboard_dwell_ms,
            self.calibration_dwell_ms,
        ] {
            if !(ms > 0.0 && ms.is_finite()) {
                return Err(ConfigError::NonPositiveDwell(ms));
            }
        }
        if !(self.grace_ms >= 0.0) {
            return Err(ConfigError::NegativeGrace(self.grace_ms));
        }
        Ok(())
    }

    pub fn config_sexp(&self) -> String {
        format!(
            "(:menu-dwell-ms {:.0} :keyboard-dwell-ms {:.0} :calibration-dwell-ms {:.0} :grace-ms {:.0} :grace-clock :{})",
            self.menu_dwell_ms,
            self.keyboard_dwell_ms,
            self.calibration_dwell_ms,
            self.grace_ms,
            self.grace_clock.as_str(),
        )
    }
}

// ── State ───────────────────────────────────────────────────

/// Controller phase. Triggering is instantaneous and immediately returns
/// to `Idle`, so it has no variant of its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DwellPhase {
    Idle,
    Accumulating,
    Grace,
}

impl DwellPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Accumulating => "accumulating",
            Self::Grace => "grace",
        }
    }
}

/// Per-target dwell bookkeeping.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct DwellState {
    /// Percentage complete, 0..=100.
    pub progress: f64,
    pub start_time: Option<Instant>,
    pub last_active_time: Option<Instant>,
}

// ── Events ──────────────────────────────────────────────────

/// Events emitted by dwell controllers.
#[derive(Debug, Clone, PartialEq)]
pub enum DwellEvent {
    /// Target became the stable zone from idle.
    Started { target: Zone },
    /// Progress update for the indicator ring.
    Progress {
        target: Zone,
        progress: f64,
        remaining_s: u32,
    },
    /// Target lost the stable zone; progress is held during grace.
    GraceEntered { target: Zone },
    /// Grace expired without re-entry; progress discarded.
    Cancelled { target: Zone },
    /// Dwell completed. Fired exactly once per completed dwell.
    Activated { target: Zone, dwell_ms: f64 },
}

impl DwellEvent {
    pub fn target(&self) -> Zone {
        match self {
            Self::Started { target }
            | Self::Progress { target, .. }
            | Self::GraceEntered { target }
            | Self::Cancelled { target }
            | Self::Activated { target, .. } => *target,
        }
    }

    pub fn is_activation(&self) -> bool {
        matches!(self, Self::Activated { .. })
    }

    pub fn to_sexp(&self) -> String {
        match self {
            Self::Started { target } => format!(
                "(:type :event :event :dwell-started :target {})",
                target.to_sexp()
            ),
            Self::Progress {
                target,
                progress,
                remaining_s,
            } => format!(
                "(:type :event :event :dwell-progress :target {} :progress {:.1} :remaining-s {})",
                target.to_sexp(),
                progress,
                remaining_s,
            ),
            Self::GraceEntered { target } => format!(
                "(:type :event :event :dwell-grace :target {})",
                target.to_sexp()
            ),
            Self::Cancelled { target } => format!(
                "(:type :event :event :dwell-cancelled :target {})",
                target.to_sexp()
            ),
            Self::Activated { target, dwell_ms } => format!(
                "(:type :event :event :dwell-activated :target {} :dwell-ms {:.0})",
                target.to_sexp(),
                dwell_ms,
            ),
        }
    }
}

// ── Controller ──────────────────────────────────────────────

/// Dwell timing state machine for one target.
#[derive(Debug, Clone)]
pub struct DwellController {
    target: Zone,
    class: TargetClass,
    dwell_ms: f64,
    grace_ms: f64,
    grace_clock: GraceClock,
    phase: DwellPhase,
    state: DwellState,
}

impl DwellController {
    pub fn new(target: Zone, class: TargetClass, config: &DwellConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            target,
            class,
            dwell_ms: config.dwell_ms_for(class),
            grace_ms: config.grace_ms,
            grace_clock: config.grace_clock,
            phase: DwellPhase::Idle,
            state: DwellState::default(),
        })
    }

    /// Advance the state machine. `active` is whether this target is the
    /// stable zone at `now`.
    pub fn tick(&mut self, now: Instant, active: bool) -> Option<DwellEvent> {
        match (self.phase, active) {
            (DwellPhase::Idle, false) => None,
            (DwellPhase::Idle, true) => {
                self.phase = DwellPhase::Accumulating;
                self.state.start_time = Some(now);
                self.state.last_active_time = Some(now);
                self.state.progress = 0.0;
                debug!("Dwell started on {}", self.target.label());
                match self.advance(now) {
                    Some(activated @ DwellEvent::Activated { .. }) => Some(activated),
                    _ => Some(DwellEvent::Started {
                        target: self.target,
                    }),
                }
            }
            (DwellPhase::Accumulating, true) => {
                self.state.last_active_time = Some(now);
                self.advance(now)
            }
            (DwellPhase::Grace, true) => {
                if self.grace_clock == GraceClock::Frozen {
                    if let (Some(start), Some(last)) =
                        (self.state.start_time, self.state.last_active_time)
                    {
                        let gap = now.saturating_duration_since(last);
                        self.state.start_time = Some(start + gap);
                    }
                }
                self.phase = DwellPhase::Accumulating;
                self.state.last_active_time = Some(now);
                debug!("Dwell resumed on {}", self.target.label());
                self.advance(now)
            }
            (DwellPhase::Accumulating, false) => {
                self.phase = DwellPhase::Grace;
                if self.grace_expired(now) {
                    return self.cancel();
                }
                debug!("Dwell grace on {}", self.target.label());
                Some(DwellEvent::GraceEntered {
                    target: self.target,
                })
            }
            (DwellPhase::Grace, false) => {
                if self.grace_expired(now) {
                    self.cancel()
                } else {
                    None
                }
            }
        }
    }

    fn advance(&mut self, now: Instant) -> Option<DwellEvent> {
        let start = self.state.start_time?;
        let elapsed = elapsed_ms(now, start);
        let progress = (elapsed / self.dwell_ms * 100.0).min(100.0);
        // Monotonic until reset.
        self.state.progress = self.state.progress.max(progress);

        if self.state.progress >= 100.0 {
            info!(
                "Dwell activated: {} ({} target, {:.0}ms)",
                self.target.label(),
                self.class.as_str(),
                elapsed
            );
            self.reset();
            return Some(DwellEvent::Activated {
                target: self.target,
                dwell_ms: elapsed,
            });
        }

        Some(DwellEvent::Progress {
            target: self.target,
            progress: self.state.progress,
            remaining_s: self.remaining_secs(),
        })
    }

    fn grace_expired(&self, now: Instant) -> bool {
        match self.state.last_active_time {
            Some(last) => elapsed_ms(now, last) > self.grace_ms,
            None => true,
        }
    }

    fn cancel(&mut self) -> Option<DwellEvent> {
        debug!(
            "Dwell cancelled on {} at {:.0}%",
            self.target.label(),
            self.state.progress
        );
        self.reset();
        Some(DwellEvent::Cancelled {
            target: self.target,
        })
    }

    /// Whole seconds left until activation, rounded up.
    pub fn remaining_secs(&self) -> u32 {
        let remaining_ms = self.dwell_ms * (100.0 - self.state.progress) / 100.0;
        (remaining_ms / 1000.0).ceil().max(0.0) as u32
    }

    /// Return to the construction-time state.
    pub fn reset(&mut self) {
        self.phase = DwellPhase::Idle;
        self.state = DwellState::default();
    }

    pub fn target(&self) -> Zone {
        self.target
    }

    pub fn class(&self) -> TargetClass {
        self.class
    }

    pub fn dwell_ms(&self) -> f64 {
        self.dwell_ms
    }

    pub fn phase(&self) -> DwellPhase {
        self.phase
    }

    pub fn progress(&self) -> f64 {
        self.state.progress
    }

    pub fn state(&self) -> &DwellState {
        &self.state
    }

    pub fn status_sexp(&self) -> String {
        format!(
            "(:target {} :class :{} :phase :{} :progress {:.1} :remaining-s {})",
            self.target.to_sexp(),
            self.class.as_str(),
            self.phase.as_str(),
            self.state.progress,
            self.remaining_secs(),
        )
    }
}

// ── Board ───────────────────────────────────────────────────

struct MountedTarget {
    controller: DwellController,
    tick: TickLoop,
}

/// The set of currently selectable targets and their tick loops.
pub struct DwellBoard {
    config: DwellConfig,
    targets: Vec<MountedTarget>,
}

impl DwellBoard {
    pub fn new(config: DwellConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            config,
            targets: Vec::new(),
        })
    }

    /// Make `target` selectable and start its tick loop.
    pub fn mount(
        &mut self,
        target: Zone,
        class: TargetClass,
        scheduler: &mut dyn FrameScheduler,
    ) -> Result<(), ConfigError> {
        if self.find(&target).is_some() {
            return Err(ConfigError::DuplicateTarget(target.label()));
        }
        let controller = DwellController::new(target, class, &self.config)?;
        let mut tick = TickLoop::new();
        tick.arm(scheduler);
        self.targets.push(MountedTarget { controller, tick });
        debug!("Dwell target mounted: {} ({})", target.label(), class.as_str());
        Ok(())
    }

    /// Remove `target`, cancelling its tick loop. Returns whether it was mounted.
    pub fn unmount(&mut self, target: &Zone, scheduler: &mut dyn FrameScheduler) -> bool {
        match self.find(target) {
            Some(idx) => {
                let mut mounted = self.targets.remove(idx);
                mounted.tick.cancel(scheduler);
                debug!("Dwell target unmounted: {}", target.label());
                true
            }
            None => false,
        }
    }

    /// Remove every target.
    pub fn unmount_all(&mut self, scheduler: &mut dyn FrameScheduler) {
        for mounted in &mut self.targets {
            mounted.tick.cancel(scheduler);
        }
        self.targets.clear();
    }

    /// Fan a new stable zone out to every controller.
    pub fn update(&mut self, now: Instant, stable: Option<Zone>) -> Vec<DwellEvent> {
        self.targets
            .iter_mut()
            .filter_map(|m| {
                let active = stable == Some(m.controller.target());
                m.controller.tick(now, active)
            })
            .collect()
    }

    /// Handle a scheduled tick. The owning target advances and re-arms.
    pub fn on_tick(
        &mut self,
        handle: TickHandle,
        now: Instant,
        stable: Option<Zone>,
        scheduler: &mut dyn FrameScheduler,
    ) -> Option<DwellEvent> {
        let idx = self
            .targets
            .iter_mut()
            .position(|m| m.tick.take_fired(handle))?;
        let mounted = &mut self.targets[idx];
        let active = stable == Some(mounted.controller.target());
        let event = mounted.controller.tick(now, active);
        mounted.tick.arm(scheduler);
        event
    }

    /// Restart tick loops for every mounted target.
    pub fn arm_ticks(&mut self, scheduler: &mut dyn FrameScheduler) {
        for mounted in &mut self.targets {
            mounted.tick.arm(scheduler);
        }
    }

    /// Stop all tick loops; targets stay mounted.
    pub fn cancel_ticks(&mut self, scheduler: &mut dyn FrameScheduler) {
        for mounted in &mut self.targets {
            mounted.tick.cancel(scheduler);
        }
    }

    /// Clear progress on every target.
    pub fn reset(&mut self) {
        for mounted in &mut self.targets {
            mounted.controller.reset();
        }
    }

    pub fn controller(&self, target: &Zone) -> Option<&DwellController> {
        self.find(target).map(|idx| &self.targets[idx].controller)
    }

    pub fn progress(&self, target: &Zone) -> Option<f64> {
        self.controller(target).map(|c| c.progress())
    }

    pub fn is_ticking(&self, target: &Zone) -> bool {
        self.find(target)
            .map(|idx| self.targets[idx].tick.is_running())
            .unwrap_or(false)
    }

    pub fn targets(&self) -> impl Iterator<Item = Zone> + '_ {
        self.targets.iter().map(|m| m.controller.target())
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    pub fn config(&self) -> &DwellConfig {
        &self.config
    }

    fn find(&self, target: &Zone) -> Option<usize> {
        self.targets
            .iter()
            .position(|m| m.controller.target() == *target)
    }

    pub fn status_sexp(&self) -> String {
        let targets: Vec<String> = self
            .targets
            .iter()
            .map(|m| m.controller.status_sexp())
            .collect();
        format!("(:targets ({}))", targets.join(" "))
    }
}

// ── Tests ───────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::ManualScheduler;
    use std::time::Duration;

    const TARGET: Zone = Zone::Cell { row: 1, col: 1 };
    const OTHER: Zone = Zone::Cell { row: 0, col: 2 };

    fn controller(dwell_ms: f64, grace_ms: f64) -> DwellController {
        DwellController::new(TARGET, TargetClass::Menu, &DwellConfig::uniform(dwell_ms, grace_ms))
            .unwrap()
    }

    fn at(t0: Instant, ms: u64) -> Instant {
        t0 + Duration::from_millis(ms)
    }

    #[test]
    fn test_activation_window() {
        let tick_ms = 16;
        let mut c = controller(2000.0, 400.0);
        let t0 = Instant::now();
        let mut fired_at = None;
        let mut last_progress = 0.0;
        for i in 0..200u64 {
            let now = at(t0, i * tick_ms);
            match c.tick(now, true) {
                Some(DwellEvent::Activated { .. }) => {
                    fired_at = Some(i * tick_ms);
                    break;
                }
                _ => {
                    assert!(c.progress() >= last_progress, "progress went backwards");
                    last_progress = c.progress();
                }
            }
        }
        let fired_at = fired_at.expect("never activated");
        assert!(fired_at >= 2000 && fired_at <= 2000 + tick_ms, "fired at {}", fired_at);
        assert_eq!(c.phase(), DwellPhase::Idle);
        assert_eq!(c.progress(), 0.0);
    }

    #[test]
    fn test_activation_fires_once() {
        let mut c = controller(500.0, 400.0);
        let t0 = Instant::now();
        let mut activations = 0;
        // Continuous gaze for 1.2s: one dwell fires, the next restarts from zero
        for i in 0..=12u64 {
            if let Some(DwellEvent::Activated { .. }) = c.tick(at(t0, i * 100), true) {
                activations += 1;
            }
        }
        assert_eq!(activations, 2);
    }

    #[test]
    fn test_short_interruption_keeps_progress() {
        let mut c = controller(2000.0, 400.0);
        let t0 = Instant::now();
        for i in 0..=10u64 {
            c.tick(at(t0, i * 100), true);
        }
        let before = c.progress();
        assert!(before > 40.0);

        assert!(matches!(
            c.tick(at(t0, 1100), false),
            Some(DwellEvent::GraceEntered { .. })
        ));
        assert_eq!(c.tick(at(t0, 1300), false), None);
        assert_eq!(c.phase(), DwellPhase::Grace);
        assert_eq!(c.progress(), before);

        c.tick(at(t0, 1350), true);
        assert_eq!(c.phase(), DwellPhase::Accumulating);
        assert!(c.progress() >= before);
    }

    #[test]
    fn test_long_interruption_resets() {
        let mut c = controller(2000.0, 400.0);
        let t0 = Instant::now();
        for i in 0..=10u64 {
            c.tick(at(t0, i * 100), true);
        }
        c.tick(at(t0, 1100), false);
        let evt = c.tick(at(t0, 1600), false);
        assert!(matches!(evt, Some(DwellEvent::Cancelled { .. })));
        assert_eq!(c.progress(), 0.0);
        assert_eq!(c.phase(), DwellPhase::Idle);

        // Re-entry starts a fresh dwell
        assert!(matches!(
            c.tick(at(t0, 1700), true),
            Some(DwellEvent::Started { .. })
        ));
    }

    #[test]
    fn test_frozen_grace_counts_only_active_time() {
        // Active 1500ms, away 300ms, back: fires at 2000ms of looking
        let mut c = controller(2000.0, 400.0);
        let t0 = Instant::now();
        let mut fired_at = None;
        for i in 0..=60u64 {
            let t = i * 50;
            let active = !(1500 < t && t <= 1800);
            if let Some(DwellEvent::Activated { .. }) = c.tick(at(t0, t), active) {
                fired_at = Some(t);
                break;
            }
        }
        // Looking resumed at 1850 after last active tick at 1500
        assert_eq!(fired_at, Some(2350));
    }

    #[test]
    fn test_running_grace_keeps_original_start() {
        let mut config = DwellConfig::uniform(2000.0, 400.0);
        config.grace_clock = GraceClock::Running;
        let mut c = DwellController::new(TARGET, TargetClass::Menu, &config).unwrap();
        let t0 = Instant::now();
        let mut fired_at = None;
        for i in 0..=60u64 {
            let t = i * 50;
            let active = !(1500 < t && t <= 1800);
            if let Some(DwellEvent::Activated { .. }) = c.tick(at(t0, t), active) {
                fired_at = Some(t);
                break;
            }
        }
        assert_eq!(fired_at, Some(2000));
    }

    #[test]
    fn test_zero_grace_cancels_immediately() {
        let mut c = controller(1000.0, 0.0);
        let t0 = Instant::now();
        c.tick(t0, true);
        c.tick(at(t0, 100), true);
        let evt = c.tick(at(t0, 116), false);
        assert!(matches!(evt, Some(DwellEvent::Cancelled { .. })));
    }

    #[test]
    fn test_remaining_secs() {
        let mut c = controller(3000.0, 400.0);
        assert_eq!(c.remaining_secs(), 3);
        let t0 = Instant::now();
        c.tick(t0, true);
        c.tick(at(t0, 1500), true);
        // 50% of 3000ms = 1500ms left
        assert_eq!(c.remaining_secs(), 2);
        c.tick(at(t0, 2100), true);
        assert_eq!(c.remaining_secs(), 1);
    }

    #[test]
    fn test_reset_restores_idle() {
        let mut c = controller(1000.0, 400.0);
        let t0 = Instant::now();
        c.tick(t0, true);
        c.tick(at(t0, 600), true);
        c.tick(at(t0, 700), false);
        c.reset();
        c.reset();
        assert_eq!(c.phase(), DwellPhase::Idle);
        assert_eq!(*c.state(), DwellState::default());
    }

    #[test]
    fn test_invalid_dwell_rejected() {
        let err = DwellController::new(TARGET, TargetClass::Menu, &DwellConfig::uniform(0.0, 400.0))
            .unwrap_err();
        assert_eq!(err, ConfigError::NonPositiveDwell(0.0));

        let err = DwellBoard::new(DwellConfig::uniform(1000.0, -1.0)).err();
        assert_eq!(err, Some(ConfigError::NegativeGrace(-1.0)));
    }

    #[test]
    fn test_class_dwell_times() {
        let config = DwellConfig::default();
        assert_eq!(config.dwell_ms_for(TargetClass::Menu), 3000.0);
        assert_eq!(config.dwell_ms_for(TargetClass::Keyboard), 2000.0);
        let key = DwellController::new(OTHER, TargetClass::Keyboard, &config).unwrap();
        assert_eq!(key.dwell_ms(), 2000.0);
        assert_eq!(TargetClass::from_str("keyboard"), Some(TargetClass::Keyboard));
    }

    #[test]
    fn test_board_independent_controllers() {
        let mut sched = ManualScheduler::new();
        let mut board = DwellBoard::new(DwellConfig::uniform(1000.0, 400.0)).unwrap();
        board.mount(TARGET, TargetClass::Menu, &mut sched).unwrap();
        board.mount(OTHER, TargetClass::Menu, &mut sched).unwrap();

        let t0 = Instant::now();
        let mut activated = Vec::new();
        for i in 0..=12u64 {
            for evt in board.update(at(t0, i * 100), Some(TARGET)) {
                if evt.is_activation() {
                    activated.push(evt.target());
                }
            }
        }
        assert_eq!(activated, vec![TARGET]);
        assert_eq!(board.progress(&OTHER), Some(0.0));
    }

    #[test]
    fn test_board_tick_loop_advances_without_samples() {
        let mut sched = ManualScheduler::new();
        let mut board = DwellBoard::new(DwellConfig::uniform(400.0, 100.0)).unwrap();
        board.mount(TARGET, TargetClass::Menu, &mut sched).unwrap();
        assert_eq!(sched.pending_count(), 1);

        let t0 = Instant::now();
        board.update(t0, Some(TARGET));

        let mut activated = false;
        for i in 1..=10u64 {
            for handle in sched.take_due() {
                if let Some(evt) = board.on_tick(handle, at(t0, i * 50), Some(TARGET), &mut sched) {
                    activated |= evt.is_activation();
                }
            }
        }
        assert!(activated);
        // Loop re-armed after every tick
        assert_eq!(sched.pending_count(), 1);
    }

    #[test]
    fn test_board_grace_expires_on_tick() {
        let mut sched = ManualScheduler::new();
        let mut board = DwellBoard::new(DwellConfig::uniform(2000.0, 400.0)).unwrap();
        board.mount(TARGET, TargetClass::Menu, &mut sched).unwrap();
        let t0 = Instant::now();
        board.update(t0, Some(TARGET));
        board.update(at(t0, 500), Some(TARGET));
        board.update(at(t0, 550), None);

        let mut cancelled = false;
        for i in 12..=20u64 {
            for handle in sched.take_due() {
                if let Some(DwellEvent::Cancelled { .. }) =
                    board.on_tick(handle, at(t0, i * 50), None, &mut sched)
                {
                    cancelled = true;
                }
            }
        }
        assert!(cancelled);
        assert_eq!(board.progress(&TARGET), Some(0.0));
    }

    #[test]
    fn test_board_tick_routes_to_owner() {
        let mut sched = ManualScheduler::new();
        let mut board = DwellBoard::new(DwellConfig::uniform(1000.0, 100.0)).unwrap();
        board.mount(TARGET, TargetClass::Menu, &mut sched).unwrap();
        board.mount(OTHER, TargetClass::Menu, &mut sched).unwrap();
        let t0 = Instant::now();
        board.update(t0, Some(OTHER));

        for handle in sched.take_due() {
            board.on_tick(handle, at(t0, 500), Some(OTHER), &mut sched);
        }
        assert_eq!(board.progress(&TARGET), Some(0.0));
        assert!(board.progress(&OTHER).unwrap() > 0.0);
        assert_eq!(sched.pending_count(), 2);
    }

    #[test]
    fn test_board_stale_tick_ignored() {
        let mut sched = ManualScheduler::new();
        let mut board = DwellBoard::new(DwellConfig::default()).unwrap();
        board.mount(TARGET, TargetClass::Menu, &mut sched).unwrap();
        let stale = sched.take_due();
        board.cancel_ticks(&mut sched);

        let t0 = Instant::now();
        for handle in stale {
            assert!(board.on_tick(handle, t0, Some(TARGET), &mut sched).is_none());
        }
        assert_eq!(sched.pending_count(), 0);
        assert!(!board.is_ticking(&TARGET));
    }

    #[test]
    fn test_board_unmount_cancels_tick() {
        let mut sched = ManualScheduler::new();
        let mut board = DwellBoard::new(DwellConfig::default()).unwrap();
        board.mount(TARGET, TargetClass::Menu, &mut sched).unwrap();
        assert!(board.is_ticking(&TARGET));

        assert!(board.unmount(&TARGET, &mut sched));
        assert!(!board.unmount(&TARGET, &mut sched));
        assert_eq!(sched.pending_count(), 0);
        assert_eq!(sched.cancelled_count(), 1);
        assert!(board.is_empty());
    }

    #[test]
    fn test_board_duplicate_mount_rejected() {
        let mut sched = ManualScheduler::new();
        let mut board = DwellBoard::new(DwellConfig::default()).unwrap();
        board.mount(TARGET, TargetClass::Menu, &mut sched).unwrap();
        assert!(matches!(
            board.mount(TARGET, TargetClass::Keyboard, &mut sched),
            Err(ConfigError::DuplicateTarget(_))
        ));
    }

    #[test]
    fn test_board_cancel_and_rearm() {
        let mut sched = ManualScheduler::new();
        let mut board = DwellBoard::new(DwellConfig::default()).unwrap();
        board.mount(TARGET, TargetClass::Menu, &mut sched).unwrap();
        board.mount(OTHER, TargetClass::Keyboard, &mut sched).unwrap();

        board.cancel_ticks(&mut sched);
        board.cancel_ticks(&mut sched);
        assert_eq!(sched.pending_count(), 0);
        assert_eq!(board.len(), 2);

        board.arm_ticks(&mut sched);
        assert_eq!(sched.pending_count(), 2);
    }

    #[test]
    fn test_event_sexp() {
        let evt = DwellEvent::Activated {
            target: TARGET,
            dwell_ms: 2000.0,
        };
        let sexp = evt.to_sexp();
        assert!(sexp.contains(":dwell-activated"));
        assert!(sexp.contains(":target (:row 1 :col 1)"));
        assert!(sexp.contains(":dwell-ms 2000"));

        let evt = DwellEvent::Progress {
            target: TARGET,
            progress: 42.0,
            remaining_s: 2,
        };
        assert!(evt.to_sexp().contains(":progress 42.0 :remaining-s 2"));
    }
}
