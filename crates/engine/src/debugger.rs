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

//! Command dispatcher
//!
//! [`Debugger`] is the entry point presentation code talks to. It owns the
//! session state, the pause history and the per-pause caches, and drives the
//! replay transport.
//!
//! # Suspension points
//!
//! A navigation may suspend while fetching the selected frame's call stack
//! and steps, and while waiting for the transport to pause. No lock is held
//! across any of them; every completion is applied through a generation
//! checked transition on [`PauseSessionState`].
//!
//! # Usage
//!
//! ```ignore
//! let debugger = Debugger::new(transport, EngineConfig::default());
//! debugger.load_recording(regions)?;
//!
//! debugger.run_command(Command::Resume).await?;
//! debugger.run_command(Command::StepOver).await?;
//! debugger.go_back().await?;
//! ```

use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tracing::{debug, info, warn};

use tdb_common::{ExecutionPoint, Frame, FrameId, LoadedRegions, PauseHistoryEntry, PauseId};

use crate::{
    config::EngineConfig,
    error::EngineError,
    frames::{CallStack, CallStackCache, FrameStepCache, FrameSteps},
    history::PauseHistory,
    resolver,
    session::{Generation, Navigation, PauseSessionState, PauseStatus},
    transport::{Command, CommandResult, PauseResult, ReplayTransport, TransportError},
};

/// Where a seek should go.
#[derive(Debug, Clone, PartialEq)]
pub struct SeekTarget {
    /// Point to pause at
    pub point: ExecutionPoint,
    /// Recording time of the point, when known
    pub time: Option<f64>,
    /// Pause already materialized at the point, if any
    pub pause_id: Option<PauseId>,
    /// Whether the pause has a call stack
    pub has_frames: bool,
}

impl SeekTarget {
    /// Seek to `point`, letting the replay server create the pause
    pub fn point(point: ExecutionPoint) -> Self {
        Self { point, time: None, pause_id: None, has_frames: true }
    }
}

impl From<&PauseHistoryEntry> for SeekTarget {
    fn from(entry: &PauseHistoryEntry) -> Self {
        Self {
            point: entry.execution_point.clone(),
            time: Some(entry.time),
            pause_id: Some(entry.pause_id.clone()),
            has_frames: entry.has_frames,
        }
    }
}

/// How a navigation ended.
#[derive(Debug, Clone, PartialEq)]
pub enum NavigationOutcome {
    /// The session paused
    Paused(PauseHistoryEntry),
    /// The recording ran to its end (or start) without pausing
    Running,
    /// No pause could be created at the point
    Unavailable(ExecutionPoint),
    /// A newer navigation started before this one completed
    Superseded,
}

/// What the resolver needs to know about the session.
struct ResolveContext {
    pause_id: Option<PauseId>,
    point: Option<ExecutionPoint>,
    frame_id: Option<FrameId>,
}

/// Navigation engine over a replay transport.
pub struct Debugger<T> {
    transport: Arc<T>,
    config: EngineConfig,
    session: Mutex<PauseSessionState>,
    history: Mutex<PauseHistory>,
    regions: RwLock<LoadedRegions>,
    call_stacks: CallStackCache,
    steps: FrameStepCache,
}

impl<T: ReplayTransport> Debugger<T> {
    /// Create an idle engine over `transport`
    pub fn new(transport: Arc<T>, config: EngineConfig) -> Self {
        Self {
            transport,
            config,
            session: Mutex::new(PauseSessionState::new()),
            history: Mutex::new(PauseHistory::new()),
            regions: RwLock::new(LoadedRegions::default()),
            call_stacks: CallStackCache::new(),
            steps: FrameStepCache::new(),
        }
    }

    /// The underlying transport
    pub fn transport(&self) -> &Arc<T> {
        &self.transport
    }

    /// Engine configuration
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /////////////////////////////////////////////
    // Session lifecycle
    /////////////////////////////////////////////

    /// Start a session over a recording whose loaded regions are `regions`
    pub fn load_recording(&self, regions: LoadedRegions) -> Result<(), EngineError> {
        self.session.lock().load_recording()?;
        *self.regions.write() = regions;
        info!("Recording loaded");
        Ok(())
    }

    /// Drop the session, its history and every cache
    pub fn reset(&self) {
        self.session.lock().reset();
        self.history.lock().clear();
        self.call_stacks.clear();
        self.steps.clear();
        *self.regions.write() = LoadedRegions::default();
        info!("Session reset");
    }

    /// Replace the loaded regions
    pub fn set_loaded_regions(&self, regions: LoadedRegions) {
        debug!(loaded = regions.loaded.len(), "Loaded regions updated");
        *self.regions.write() = regions;
    }

    /// Currently loaded regions
    pub fn loaded_regions(&self) -> LoadedRegions {
        self.regions.read().clone()
    }

    /////////////////////////////////////////////
    // Read accessors
    /////////////////////////////////////////////

    /// Copy of the session state
    pub fn snapshot(&self) -> PauseSessionState {
        self.session.lock().clone()
    }

    /// Copy of the pause history
    pub fn history(&self) -> PauseHistory {
        self.history.lock().clone()
    }

    /// Steps of the selected frame, if they have been loaded already
    pub fn selected_frame_steps(&self) -> Option<FrameSteps> {
        let session = self.session.lock();
        self.steps.peek(session.current_pause_id()?, session.selected_frame_id()?)
    }

    /// Call stack of the live pause.
    ///
    /// Empty when there is no live pause or the pause has no frames. Loading
    /// the stack reconciles the frame selection with it.
    pub async fn frames(&self) -> Result<CallStack, EngineError> {
        let (generation, pause_id) = {
            let session = self.session.lock();
            match session.current_pause_id() {
                Some(pause_id) if session.has_frames() => (session.generation(), pause_id.clone()),
                _ => return Ok(CallStack::default()),
            }
        };

        let frames = self.call_stacks.get_frames(&self.transport, &pause_id).await?;
        let _ = self.session.lock().reconcile_selection(
            generation,
            &frames,
            self.config.auto_select_top_frame,
        );
        Ok(frames)
    }

    /// The selected frame of the live pause
    pub async fn selected_frame(&self) -> Result<Option<Frame>, EngineError> {
        let frames = self.frames().await?;
        let session = self.session.lock();
        let (Some(pause_id), Some(frame_id)) =
            (session.current_pause_id(), session.selected_frame_id())
        else {
            return Ok(None);
        };

        Ok(frames
            .iter()
            .find(|frame| &frame.pause_id == pause_id && &frame.id == frame_id)
            .cloned())
    }

    /// Select a frame of the live pause
    pub async fn select_frame(&self, frame_id: &FrameId) -> Result<Frame, EngineError> {
        let status = self.session.lock().status();
        if status != PauseStatus::Paused {
            return Err(EngineError::invalid_state("select a frame", status));
        }

        let frames = self.frames().await?;
        let frame = frames
            .iter()
            .find(|frame| &frame.id == frame_id)
            .ok_or_else(|| EngineError::UnknownFrame(frame_id.clone()))?;

        self.session.lock().select_frame(frame)?;
        debug!(frame = %frame.id, index = frame.index, "Frame selected");
        Ok(frame.clone())
    }

    /// Load the steps of the selected frame
    pub async fn load_selected_frame_steps(&self) -> Result<Option<FrameSteps>, EngineError> {
        let Some(frame) = self.selected_frame().await? else { return Ok(None) };
        Ok(Some(self.steps.get_steps(&self.transport, &frame).await?))
    }

    /////////////////////////////////////////////
    // Navigation
    /////////////////////////////////////////////

    /// Run a stepping or resume command.
    pub async fn run_command(&self, command: Command) -> Result<NavigationOutcome, EngineError> {
        let (observed, context) = {
            let session = self.session.lock();
            session.can_issue(&Navigation::Command(command))?;
            let context = ResolveContext {
                pause_id: session.current_pause_id().cloned(),
                point: session.current_execution_point().cloned(),
                frame_id: session.selected_frame_id().cloned(),
            };
            (session.generation(), context)
        };

        let target = match self.resolve_target(command, &context, observed).await {
            Ok(target) => target,
            Err(err) => {
                if self.session.lock().is_live(observed) {
                    return Err(err);
                }
                debug!(%command, %err, "Dropping resolution failure of a superseded command");
                return Ok(NavigationOutcome::Superseded);
            }
        };

        let issued = {
            let mut session = self.session.lock();
            if !session.is_live(observed) {
                debug!(%command, "Superseded while resolving the target");
                return Ok(NavigationOutcome::Superseded);
            }
            session.issue(Navigation::Command(command))?
        };
        self.evict(issued.previous_pause.as_ref());

        let regions = self.loaded_regions();
        debug!(
            %command,
            generation = %issued.generation,
            target = target.as_ref().map(ExecutionPoint::as_str).unwrap_or("default"),
            "Sending command"
        );

        match self.transport.run_command(command, target.as_ref(), &regions).await {
            Ok(CommandResult::Paused(pause)) => {
                Ok(self.accept_pause(issued.generation, pause, true).await)
            }
            Ok(CommandResult::Finished) => {
                let applied = self.session.lock().on_resumed(issued.generation);
                if applied.is_accepted() {
                    info!(%command, "Reached the edge of the recording");
                    Ok(NavigationOutcome::Running)
                } else {
                    Ok(NavigationOutcome::Superseded)
                }
            }
            Err(err) => self.fail_navigation(issued.generation, err),
        }
    }

    /// Jump to an explicit point.
    ///
    /// This is the only way history navigation and jump-to actions re-enter
    /// the engine.
    pub async fn seek(&self, target: SeekTarget) -> Result<NavigationOutcome, EngineError> {
        self.seek_with(target, true).await
    }

    /// Move back in the pause history and seek there.
    ///
    /// Returns `None` at the oldest entry.
    pub async fn go_back(&self) -> Result<Option<NavigationOutcome>, EngineError> {
        let entry = self.history.lock().previous();
        match entry {
            Some(entry) => self.seek_with(SeekTarget::from(&entry), false).await.map(Some),
            None => Ok(None),
        }
    }

    /// Move forward in the pause history and seek there.
    ///
    /// Returns `None` at the newest entry.
    pub async fn go_forward(&self) -> Result<Option<NavigationOutcome>, EngineError> {
        let entry = self.history.lock().next();
        match entry {
            Some(entry) => self.seek_with(SeekTarget::from(&entry), false).await.map(Some),
            None => Ok(None),
        }
    }

    async fn seek_with(
        &self,
        target: SeekTarget,
        record: bool,
    ) -> Result<NavigationOutcome, EngineError> {
        let issued = self.session.lock().issue(Navigation::Seek(target.point.clone()))?;
        self.evict(issued.previous_pause.as_ref());

        let loaded = self.regions.read().is_loaded(&target.point);
        if !loaded {
            warn!(point = %target.point, "Point is outside the loaded regions");
            let applied =
                self.session.lock().on_pause_creation_failed(issued.generation, target.point.clone());
            return Ok(if applied.is_accepted() {
                NavigationOutcome::Unavailable(target.point)
            } else {
                NavigationOutcome::Superseded
            });
        }

        let pause = match target.pause_id {
            Some(pause_id) => PauseResult {
                point: target.point,
                time: target.time.unwrap_or_default(),
                pause_id,
                frame: None,
                why: None,
                has_frames: target.has_frames,
            },
            None => match self.transport.create_pause(&target.point).await {
                Ok(pause) => pause,
                Err(err) => return self.fail_navigation(issued.generation, err),
            },
        };

        Ok(self.accept_pause(issued.generation, pause, record).await)
    }

    async fn resolve_target(
        &self,
        command: Command,
        context: &ResolveContext,
        observed: Generation,
    ) -> Result<Option<ExecutionPoint>, EngineError> {
        let (Some(pause_id), Some(frame_id)) = (&context.pause_id, &context.frame_id) else {
            return Ok(None);
        };

        let frames = self.call_stacks.get_frames(&self.transport, pause_id).await?;
        let Some(frame) = frames.iter().find(|frame| &frame.id == frame_id) else {
            return Ok(None);
        };
        if !resolver::needs_frame_steps(command, Some(frame)) {
            return Ok(None);
        }
        // The pause may have been evicted while the stack was loading
        if !self.session.lock().is_live(observed) {
            return Ok(None);
        }

        let steps = self.steps.get_steps(&self.transport, frame).await?;
        Ok(resolver::resolve_target(command, context.point.as_ref(), Some(frame), Some(steps.as_slice())))
    }

    async fn accept_pause(
        &self,
        generation: Generation,
        pause: PauseResult,
        record: bool,
    ) -> NavigationOutcome {
        let entry = PauseHistoryEntry {
            execution_point: pause.point.clone(),
            time: pause.time,
            pause_id: pause.pause_id.clone(),
            has_frames: pause.has_frames,
        };

        {
            let mut session = self.session.lock();
            if !session.on_pause_result(generation, &pause).is_accepted() {
                return NavigationOutcome::Superseded;
            }
            if record {
                self.history.lock().record(entry.clone());
            }
        }

        info!(
            point = %pause.point,
            pause = %pause.pause_id,
            why = pause.why.as_deref().unwrap_or("-"),
            "Paused"
        );

        if self.config.prefetch_frames && pause.has_frames {
            if let Err(err) = self.frames().await {
                warn!(%err, "Failed to prefetch the call stack");
            }
        }

        NavigationOutcome::Paused(entry)
    }

    fn fail_navigation(
        &self,
        generation: Generation,
        err: TransportError,
    ) -> Result<NavigationOutcome, EngineError> {
        match err {
            TransportError::PauseCreationFailed { point, reason } => {
                warn!(%point, %reason, "No pause available");
                let applied = self.session.lock().on_pause_creation_failed(generation, point.clone());
                Ok(if applied.is_accepted() {
                    NavigationOutcome::Unavailable(point)
                } else {
                    NavigationOutcome::Superseded
                })
            }
            err => {
                let applied = self.session.lock().on_navigation_failed(generation);
                if applied.is_accepted() {
                    Err(err.into())
                } else {
                    debug!(%err, "Dropping failure of a superseded navigation");
                    Ok(NavigationOutcome::Superseded)
                }
            }
        }
    }

    fn evict(&self, pause_id: Option<&PauseId>) {
        if let Some(pause_id) = pause_id {
            debug!(pause = %pause_id, "Evicting caches of the previous pause");
            self.call_stacks.evict_pause(pause_id);
            self.steps.evict_pause(pause_id);
        }
    }
}
