//! Scripted frame feeds for the simulator and integration tests.
//!
//! A feed yields `FrameEvent`s: gaze estimates, face movement and waits.
//! `replay` drives a session from a feed against a manual clock so a whole
//! interaction can be described as data and checked deterministically.

use std::collections::VecDeque;
use std::time::Duration;

use crate::clock::ManualClock;
use crate::gaze::engine::SimulatedEngine;
use crate::gaze::{GazeSession, Point, SessionEvent};
use crate::scheduler::ManualScheduler;

/// One step of a scripted interaction.
#[derive(Debug, Clone, PartialEq)]
pub enum FrameEvent {
    /// Engine frame with a gaze estimate in screen pixels.
    Gaze { x: f64, y: f64 },
    /// Engine frame with no gaze estimate.
    NoGaze,
    /// Move the simulated face so its eye-corner midpoint is at `(x, y)`.
    Face { x: f64, y: f64 },
    /// Face leaves the camera view.
    NoFace,
    /// Advance the clock without a frame.
    Wait { duration: Duration },
}

/// Source of frame events.
pub trait FrameFeed {
    fn next_event(&mut self) -> Option<FrameEvent>;
    fn has_events(&self) -> bool;
}

/// Feed that delivers a pre-built script.
#[derive(Debug, Default)]
pub struct ScriptedFeed {
    events: VecDeque<FrameEvent>,
}

impl ScriptedFeed {
    pub fn new(events: Vec<FrameEvent>) -> Self {
        Self {
            events: VecDeque::from(events),
        }
    }

    /// Append `count` gaze frames at the same position.
    pub fn fixate(mut self, x: f64, y: f64, count: usize) -> Self {
        for _ in 0..count {
            self.events.push_back(FrameEvent::Gaze { x, y });
        }
        self
    }

    pub fn then(mut self, event: FrameEvent) -> Self {
        self.events.push_back(event);
        self
    }

    pub fn remaining(&self) -> usize {
        self.events.len()
    }
}

impl FrameFeed for ScriptedFeed {
    fn next_event(&mut self) -> Option<FrameEvent> {
        self.events.pop_front()
    }

    fn has_events(&self) -> bool {
        !self.events.is_empty()
    }
}

/// Wrapper that keeps a copy of every delivered event.
pub struct RecordingFeed<F: FrameFeed> {
    inner: F,
    recorded: Vec<FrameEvent>,
}

impl<F: FrameFeed> RecordingFeed<F> {
    pub fn new(inner: F) -> Self {
        Self {
            inner,
            recorded: Vec::new(),
        }
    }

    pub fn recorded(&self) -> &[FrameEvent] {
        &self.recorded
    }

    pub fn into_recorded(self) -> Vec<FrameEvent> {
        self.recorded
    }
}

impl<F: FrameFeed> FrameFeed for RecordingFeed<F> {
    fn next_event(&mut self) -> Option<FrameEvent> {
        let event = self.inner.next_event()?;
        self.recorded.push(event.clone());
        Some(event)
    }

    fn has_events(&self) -> bool {
        self.inner.has_events()
    }
}

/// Drive `session` from `feed`.
///
/// Every gaze frame advances `clock` by `frame_interval` before it is
/// processed, then fires the due scheduler ticks. Face moves apply to the
/// simulated engine and take effect on the next frame.
pub fn replay<F: FrameFeed>(
    feed: &mut F,
    session: &mut GazeSession<SimulatedEngine, ManualScheduler>,
    clock: &ManualClock,
    frame_interval: Duration,
) -> Vec<SessionEvent> {
    let mut events = Vec::new();
    while let Some(event) = feed.next_event() {
        match event {
            FrameEvent::Gaze { x, y } => {
                clock.advance(frame_interval);
                events.extend(session.handle_frame(Some(Point::new(x, y))));
                events.extend(session.run_due_ticks());
            }
            FrameEvent::NoGaze => {
                clock.advance(frame_interval);
                events.extend(session.handle_frame(None));
                events.extend(session.run_due_ticks());
            }
            FrameEvent::Face { x, y } => {
                session.engine_mut().set_face_center(Point::new(x, y));
            }
            FrameEvent::NoFace => session.engine_mut().clear_face(),
            FrameEvent::Wait { duration } => {
                clock.advance(duration);
                events.extend(session.run_due_ticks());
            }
        }
    }
    events
}
