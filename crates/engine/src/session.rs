// TDB - Time-travel Debugger
// Copyright (C) 2024 Zhuo Zhang and Wuqi Zhang
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Pause session state machine
//!
//! [`PauseSessionState`] is the single source of truth for "where the user
//! is" in the recording. It only changes through the named transitions below.
//!
//! ```text
//!  Idle --load--> Running --issue--> AwaitingPause --result--> Paused
//!                    ^                 |    ^                    |
//!                    +----resumed------+    +------issue---------+
//!                                      |
//!                                      +--failed--> PauseErrored
//! ```
//!
//! Every navigation start bumps the [`Generation`]. Completions carry the
//! generation they were issued under and are dropped unless it is still the
//! live one.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::debug;

use tdb_common::{ExecutionPoint, Frame, FrameId, PauseId};

use crate::{
    error::EngineError,
    transport::{Command, PauseResult},
};

/// Monotonic counter identifying one navigation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Generation(pub u64);

impl Generation {
    fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Display for Generation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Coarse status of a session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PauseStatus {
    /// No recording loaded
    #[default]
    Idle,
    /// Not paused, nothing in flight
    Running,
    /// A navigation was issued and has not completed yet
    AwaitingPause,
    /// Paused at a point with a live pause
    Paused,
    /// Paused at a point where no pause could be created
    PauseErrored,
}

impl PauseStatus {
    /// Whether the session sits at a point, with or without a usable pause
    pub fn is_paused(self) -> bool {
        matches!(self, Self::Paused | Self::PauseErrored)
    }
}

impl fmt::Display for PauseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Idle => "idle",
            Self::Running => "running",
            Self::AwaitingPause => "awaiting a pause",
            Self::Paused => "paused",
            Self::PauseErrored => "paused (unavailable)",
        };
        f.write_str(s)
    }
}

/// A user-initiated navigation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Navigation {
    /// A stepping or resume command
    Command(Command),
    /// A jump to an explicit point
    Seek(ExecutionPoint),
}

impl fmt::Display for Navigation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Command(command) => write!(f, "{command}"),
            Self::Seek(point) => write!(f, "seek to {point}"),
        }
    }
}

/// Outcome of applying an asynchronous completion.
#[must_use]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
    /// The completion belonged to the live navigation and was applied
    Accepted,
    /// A newer navigation has started; the completion was ignored
    Stale,
}

impl Applied {
    /// Whether the completion was applied
    pub fn is_accepted(self) -> bool {
        matches!(self, Self::Accepted)
    }
}

/// Receipt for a navigation that has started.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Issued {
    /// Generation the completion must carry
    pub generation: Generation,
    /// Pause that was current before the navigation, if any
    pub previous_pause: Option<PauseId>,
}

/// The mutable root of a debugging session.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PauseSessionState {
    status: PauseStatus,
    current_pause_id: Option<PauseId>,
    current_execution_point: Option<ExecutionPoint>,
    current_time: Option<f64>,
    has_frames: bool,
    selected_frame_id: Option<FrameId>,
    command_in_flight: Option<Navigation>,
    generation: Generation,
}

impl PauseSessionState {
    /// A fresh session with no recording loaded
    pub fn new() -> Self {
        Self::default()
    }

    /// Current status
    pub fn status(&self) -> PauseStatus {
        self.status
    }

    /// Whether the session sits at a point (including `PauseErrored`)
    pub fn is_paused(&self) -> bool {
        self.status.is_paused()
    }

    /// The live pause, if any
    pub fn current_pause_id(&self) -> Option<&PauseId> {
        self.current_pause_id.as_ref()
    }

    /// Last known position in the recording
    pub fn current_execution_point(&self) -> Option<&ExecutionPoint> {
        self.current_execution_point.as_ref()
    }

    /// Recording time of the current position, when known
    pub fn current_time(&self) -> Option<f64> {
        self.current_time
    }

    /// Whether the live pause has a call stack
    pub fn has_frames(&self) -> bool {
        self.has_frames
    }

    /// Selected frame of the live pause
    pub fn selected_frame_id(&self) -> Option<&FrameId> {
        self.selected_frame_id.as_ref()
    }

    /// Navigation that is currently in flight
    pub fn command_in_flight(&self) -> Option<&Navigation> {
        self.command_in_flight.as_ref()
    }

    /// Live generation
    pub fn generation(&self) -> Generation {
        self.generation
    }

    /// Whether a completion issued under `generation` is still current
    pub fn is_live(&self, generation: Generation) -> bool {
        self.generation == generation
    }

    /// Move from `Idle` to `Running` once a recording is available.
    pub fn load_recording(&mut self) -> Result<(), EngineError> {
        if self.status != PauseStatus::Idle {
            return Err(EngineError::invalid_state("load a recording", self.status));
        }
        self.status = PauseStatus::Running;
        Ok(())
    }

    /// Discard everything but keep generations increasing.
    ///
    /// Completions issued before the reset must never match a generation
    /// issued after it.
    pub fn reset(&mut self) {
        let generation = self.generation.next();
        *self = Self { generation, ..Self::default() };
    }

    /// Check whether `navigation` may start from the current status.
    ///
    /// Step commands need a point to step from. `Resume`, `Rewind` and seeks
    /// may start from any loaded status and supersede a navigation in flight.
    pub fn can_issue(&self, navigation: &Navigation) -> Result<(), EngineError> {
        let allowed = match (navigation, self.status) {
            (_, PauseStatus::Idle) => false,
            (Navigation::Command(command), status) if command.is_step() => status.is_paused(),
            _ => true,
        };

        if allowed {
            Ok(())
        } else {
            Err(EngineError::invalid_state(navigation, self.status))
        }
    }

    /// Start a navigation.
    ///
    /// The pause, its call stack and the frame selection are dropped; the
    /// execution point is kept so the timeline does not jump while waiting.
    pub fn issue(&mut self, navigation: Navigation) -> Result<Issued, EngineError> {
        self.can_issue(&navigation)?;

        self.generation = self.generation.next();
        let previous_pause = self.current_pause_id.take();
        self.selected_frame_id = None;
        self.has_frames = false;
        debug!(generation = %self.generation, %navigation, "Navigation issued");
        self.command_in_flight = Some(navigation);
        self.status = PauseStatus::AwaitingPause;

        Ok(Issued { generation: self.generation, previous_pause })
    }

    /// Apply a pause produced by the navigation issued under `generation`.
    pub fn on_pause_result(&mut self, generation: Generation, pause: &PauseResult) -> Applied {
        if !self.is_live(generation) {
            debug!(%generation, live = %self.generation, point = %pause.point, "Dropping stale pause");
            return Applied::Stale;
        }

        self.status = PauseStatus::Paused;
        self.current_pause_id = Some(pause.pause_id.clone());
        self.current_execution_point = Some(pause.point.clone());
        self.current_time = Some(pause.time);
        self.has_frames = pause.has_frames;
        // A preselected frame only counts if it belongs to this pause
        self.selected_frame_id = pause
            .frame
            .as_ref()
            .filter(|frame| frame.pause_id == pause.pause_id)
            .map(|frame| frame.id.clone());
        self.command_in_flight = None;
        Applied::Accepted
    }

    /// Record that no pause could be created at `point`.
    ///
    /// The point becomes the current position so the timeline reflects where
    /// the user tried to go.
    pub fn on_pause_creation_failed(
        &mut self,
        generation: Generation,
        point: ExecutionPoint,
    ) -> Applied {
        if !self.is_live(generation) {
            debug!(%generation, live = %self.generation, %point, "Dropping stale pause failure");
            return Applied::Stale;
        }

        self.current_execution_point = Some(point);
        self.current_time = None;
        self.mark_errored();
        Applied::Accepted
    }

    /// Record that the navigation issued under `generation` failed without a
    /// point to show. The last known point is kept.
    pub fn on_navigation_failed(&mut self, generation: Generation) -> Applied {
        if !self.is_live(generation) {
            debug!(%generation, live = %self.generation, "Dropping stale navigation failure");
            return Applied::Stale;
        }

        self.mark_errored();
        Applied::Accepted
    }

    fn mark_errored(&mut self) {
        self.status = PauseStatus::PauseErrored;
        self.current_pause_id = None;
        self.has_frames = false;
        self.selected_frame_id = None;
        self.command_in_flight = None;
    }

    /// Record that the navigation issued under `generation` left the session
    /// running (it reached the end or start of the recording).
    pub fn on_resumed(&mut self, generation: Generation) -> Applied {
        if !self.is_live(generation) {
            debug!(%generation, live = %self.generation, "Dropping stale resume completion");
            return Applied::Stale;
        }

        self.status = PauseStatus::Running;
        self.current_pause_id = None;
        self.has_frames = false;
        self.selected_frame_id = None;
        self.command_in_flight = None;
        Applied::Accepted
    }

    /// Select a frame of the live pause.
    ///
    /// The caller resolves the frame through the call-stack cache; this only
    /// checks that it belongs to the live pause.
    pub fn select_frame(&mut self, frame: &Frame) -> Result<(), EngineError> {
        if self.status != PauseStatus::Paused {
            return Err(EngineError::invalid_state("select a frame", self.status));
        }
        if self.current_pause_id.as_ref() != Some(&frame.pause_id) {
            return Err(EngineError::UnknownFrame(frame.id.clone()));
        }

        self.selected_frame_id = Some(frame.id.clone());
        Ok(())
    }

    /// Reconcile the selection with a freshly loaded call stack.
    ///
    /// A selection that is not part of `frames` is cleared. With
    /// `select_top` set, an empty selection falls back to the innermost frame.
    pub fn reconcile_selection(
        &mut self,
        generation: Generation,
        frames: &[Frame],
        select_top: bool,
    ) -> Applied {
        if !self.is_live(generation) || self.status != PauseStatus::Paused {
            return Applied::Stale;
        }

        if let Some(selected) = &self.selected_frame_id {
            if !frames.iter().any(|frame| &frame.id == selected) {
                debug!(frame = %selected, "Selected frame is gone, clearing selection");
                self.selected_frame_id = None;
            }
        }

        if self.selected_frame_id.is_none() && select_top {
            self.selected_frame_id =
                frames.iter().find(|frame| frame.is_innermost()).map(|frame| frame.id.clone());
        }

        Applied::Accepted
    }
}
