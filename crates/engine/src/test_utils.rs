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

//! Test utilities for driving the engine without a replay server.
//!
//! [`MockTransport`] answers from scripted replies and records every call it
//! receives. Replies can be gated on a oneshot channel to control the order
//! in which concurrent navigations complete.

use std::collections::{HashMap, VecDeque};

use parking_lot::Mutex;
use tokio::sync::oneshot;
use tracing::debug;

use tdb_common::{
    ExecutionPoint, Frame, FrameId, FramePosition, LoadedRegions, Location, PauseId,
};

use crate::transport::{Command, CommandResult, PauseResult, ReplayTransport, TransportError};

/// Calls received by a [`MockTransport`], in arrival order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MockCalls {
    /// `(command, target)` of every `run_command`
    pub commands: Vec<(Command, Option<ExecutionPoint>)>,
    /// Points of every `create_pause`
    pub create_pause: Vec<ExecutionPoint>,
    /// Pauses of every `get_frames`
    pub get_frames: Vec<PauseId>,
    /// `(pause, frame)` of every `get_frame_steps`
    pub get_frame_steps: Vec<(PauseId, FrameId)>,
}

struct Reply<T> {
    result: Result<T, TransportError>,
    gate: Option<oneshot::Receiver<()>>,
}

#[derive(Default)]
struct MockState {
    command_replies: VecDeque<Reply<CommandResult>>,
    pauses: HashMap<ExecutionPoint, Result<PauseResult, TransportError>>,
    pause_gates: HashMap<ExecutionPoint, oneshot::Receiver<()>>,
    frames: HashMap<PauseId, Result<Vec<Frame>, TransportError>>,
    frame_gates: HashMap<PauseId, oneshot::Receiver<()>>,
    steps: HashMap<(PauseId, FrameId), Result<Vec<FramePosition>, TransportError>>,
    step_gates: HashMap<(PauseId, FrameId), oneshot::Receiver<()>>,
    calls: MockCalls,
}

/// Scripted [`ReplayTransport`].
#[derive(Default)]
pub struct MockTransport {
    state: Mutex<MockState>,
}

impl MockTransport {
    /// A transport with nothing scripted
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue the reply of the next `run_command`
    pub fn reply_to_command(&self, result: Result<CommandResult, TransportError>) {
        self.state.lock().command_replies.push_back(Reply { result, gate: None });
    }

    /// Queue the reply of the next `run_command`, held back until the returned
    /// sender fires (or is dropped)
    pub fn reply_to_command_gated(
        &self,
        result: Result<CommandResult, TransportError>,
    ) -> oneshot::Sender<()> {
        let (release, gate) = oneshot::channel();
        self.state.lock().command_replies.push_back(Reply { result, gate: Some(gate) });
        release
    }

    /// Let `create_pause` at `point` succeed with `pause`
    pub fn pause_at(&self, pause: PauseResult) {
        self.state.lock().pauses.insert(pause.point.clone(), Ok(pause));
    }

    /// Let `create_pause` at `point` fail with `err`
    pub fn fail_pause_at(&self, point: ExecutionPoint, err: TransportError) {
        self.state.lock().pauses.insert(point, Err(err));
    }

    /// Hold `create_pause` at `point` until the returned sender fires
    pub fn gate_pause_at(&self, point: ExecutionPoint) -> oneshot::Sender<()> {
        let (release, gate) = oneshot::channel();
        self.state.lock().pause_gates.insert(point, gate);
        release
    }

    /// Script the call stack of `pause_id`
    pub fn with_frames(&self, pause_id: PauseId, frames: Vec<Frame>) {
        self.state.lock().frames.insert(pause_id, Ok(frames));
    }

    /// Let `get_frames` for `pause_id` fail
    pub fn fail_frames(&self, pause_id: PauseId, err: TransportError) {
        self.state.lock().frames.insert(pause_id, Err(err));
    }

    /// Hold `get_frames` for `pause_id` until the returned sender fires
    pub fn gate_frames(&self, pause_id: PauseId) -> oneshot::Sender<()> {
        let (release, gate) = oneshot::channel();
        self.state.lock().frame_gates.insert(pause_id, gate);
        release
    }

    /// Script the steps of a frame
    pub fn with_steps(&self, pause_id: PauseId, frame_id: FrameId, steps: Vec<FramePosition>) {
        self.state.lock().steps.insert((pause_id, frame_id), Ok(steps));
    }

    /// Let `get_frame_steps` for a frame fail
    pub fn fail_steps(&self, pause_id: PauseId, frame_id: FrameId, err: TransportError) {
        self.state.lock().steps.insert((pause_id, frame_id), Err(err));
    }

    /// Hold `get_frame_steps` for a frame until the returned sender fires
    pub fn gate_steps(&self, pause_id: PauseId, frame_id: FrameId) -> oneshot::Sender<()> {
        let (release, gate) = oneshot::channel();
        self.state.lock().step_gates.insert((pause_id, frame_id), gate);
        release
    }

    /// Calls received so far
    pub fn calls(&self) -> MockCalls {
        self.state.lock().calls.clone()
    }
}

impl ReplayTransport for MockTransport {
    async fn run_command(
        &self,
        command: Command,
        target: Option<&ExecutionPoint>,
        _regions: &LoadedRegions,
    ) -> Result<CommandResult, TransportError> {
        let reply = {
            let mut state = self.state.lock();
            state.calls.commands.push((command, target.cloned()));
            state.command_replies.pop_front()
        };
        debug!(%command, "Mock transport received command");

        let Some(reply) = reply else {
            return Err(TransportError::Request(format!("no reply scripted for {command}")));
        };
        if let Some(gate) = reply.gate {
            let _ = gate.await;
        }
        reply.result
    }

    async fn create_pause(&self, point: &ExecutionPoint) -> Result<PauseResult, TransportError> {
        let (result, gate) = {
            let mut state = self.state.lock();
            state.calls.create_pause.push(point.clone());
            (state.pauses.get(point).cloned(), state.pause_gates.remove(point))
        };

        if let Some(gate) = gate {
            let _ = gate.await;
        }
        result.unwrap_or_else(|| {
            Err(TransportError::Request(format!("no pause scripted at {point}")))
        })
    }

    async fn get_frames(&self, pause_id: &PauseId) -> Result<Vec<Frame>, TransportError> {
        let (result, gate) = {
            let mut state = self.state.lock();
            state.calls.get_frames.push(pause_id.clone());
            (state.frames.get(pause_id).cloned(), state.frame_gates.remove(pause_id))
        };

        if let Some(gate) = gate {
            let _ = gate.await;
        }
        result.unwrap_or_else(|| Ok(Vec::new()))
    }

    async fn get_frame_steps(
        &self,
        pause_id: &PauseId,
        _async_index: usize,
        frame_id: &FrameId,
    ) -> Result<Vec<FramePosition>, TransportError> {
        let key = (pause_id.clone(), frame_id.clone());
        let (result, gate) = {
            let mut state = self.state.lock();
            state.calls.get_frame_steps.push(key.clone());
            (state.steps.get(&key).cloned(), state.step_gates.remove(&key))
        };

        if let Some(gate) = gate {
            let _ = gate.await;
        }
        result.unwrap_or_else(|| Ok(Vec::new()))
    }
}

/// Execution point from a digit string
pub fn point(digits: &str) -> ExecutionPoint {
    ExecutionPoint::new(digits)
}

/// Pause at `digits` with id `pause_id`, no frame preselected
pub fn pause(digits: &str, pause_id: &str) -> PauseResult {
    PauseResult {
        point: point(digits),
        time: 0.0,
        pause_id: PauseId::new(pause_id),
        frame: None,
        why: None,
        has_frames: true,
    }
}

/// `run_command` reply pausing at `digits`
pub fn paused(digits: &str, pause_id: &str) -> Result<CommandResult, TransportError> {
    Ok(CommandResult::Paused(pause(digits, pause_id)))
}

/// Frame `id` at stack position `index` of `pause_id`
pub fn frame(pause_id: &str, id: &str, index: usize) -> Frame {
    Frame {
        pause_id: PauseId::new(pause_id),
        id: FrameId::new(id),
        index,
        async_index: 0,
        function_name: Some(format!("fn_{id}")),
        location: Location::new("source", index as u32 + 1, 0),
        alternate_location: None,
    }
}

/// Frame positions at the given points
pub fn positions(points: &[&str]) -> Vec<FramePosition> {
    points
        .iter()
        .map(|digits| FramePosition::new(point(digits), 0.0, Location::new("source", 1, 0)))
        .collect()
}
