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

//! The boundary between the navigation engine and the replay server.
//!
//! The engine never talks to the wire itself. Everything it needs from the
//! replay server goes through [`ReplayTransport`], which the binary implements
//! over JSON-RPC and tests implement in memory.

use std::{fmt, future::Future};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use tdb_common::{ExecutionPoint, Frame, FrameId, FramePosition, LoadedRegions, PauseId};

/// A stepping or resume command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Command {
    /// Step into the next call
    StepIn,
    /// Step over the next statement
    StepOver,
    /// Step out of the current frame
    StepOut,
    /// Run forward to the next pause
    Resume,
    /// Run backward to the previous pause
    Rewind,
    /// Step backward over the previous statement
    ReverseStepOver,
}

impl Command {
    /// Whether the command steps relative to the current pause.
    ///
    /// Step commands require a pause; `Resume` and `Rewind` may also run from
    /// a non-paused session.
    pub fn is_step(self) -> bool {
        !matches!(self, Self::Resume | Self::Rewind)
    }

    /// Protocol name of the command
    pub fn name(self) -> &'static str {
        match self {
            Self::StepIn => "stepIn",
            Self::StepOver => "stepOver",
            Self::StepOut => "stepOut",
            Self::Resume => "resume",
            Self::Rewind => "rewind",
            Self::ReverseStepOver => "reverseStepOver",
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A pause materialized by the replay server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PauseResult {
    /// Where execution paused
    pub point: ExecutionPoint,
    /// Recording time of the pause, in milliseconds
    #[serde(default)]
    pub time: f64,
    /// The created pause
    pub pause_id: PauseId,
    /// Frame to select, if the server picked one
    #[serde(default)]
    pub frame: Option<Frame>,
    /// Why execution paused (breakpoint, step, ...)
    #[serde(default)]
    pub why: Option<String>,
    /// Whether the pause has a call stack at all
    #[serde(default = "default_has_frames")]
    pub has_frames: bool,
}

fn default_has_frames() -> bool {
    true
}

/// Completion of a stepping or resume command.
#[derive(Debug, Clone, PartialEq)]
pub enum CommandResult {
    /// Execution paused
    Paused(PauseResult),
    /// Execution ran to the end (or start) of the recording without pausing
    Finished,
}

/// Errors reported by a [`ReplayTransport`].
///
/// The type is `Clone` so that a single failed fetch can be handed to every
/// caller sharing it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// The frame spans too many points for its steps to be enumerated
    #[error("too many points to enumerate the frame's steps")]
    TooManyPoints,
    /// The server could not materialize a pause at the given point
    #[error("failed to create a pause at {point}: {reason}")]
    PauseCreationFailed {
        /// Point the pause was requested at
        point: ExecutionPoint,
        /// Server-provided reason
        reason: String,
    },
    /// The request failed for any other reason
    #[error("replay request failed: {0}")]
    Request(String),
    /// The connection to the replay server is gone
    #[error("replay server disconnected: {0}")]
    Disconnected(String),
}

/// Operations the engine invokes on the replay server.
///
/// Every method may complete in any order relative to the others; the engine
/// makes no assumption about ordering or cancellation.
pub trait ReplayTransport: Send + Sync + 'static {
    /// Run a stepping or resume command.
    ///
    /// `target` is the point the engine resolved for the command; `None` asks
    /// the server to apply its own default semantics.
    fn run_command(
        &self,
        command: Command,
        target: Option<&ExecutionPoint>,
        regions: &LoadedRegions,
    ) -> impl Future<Output = Result<CommandResult, TransportError>> + Send;

    /// Materialize a pause at `point`.
    fn create_pause(
        &self,
        point: &ExecutionPoint,
    ) -> impl Future<Output = Result<PauseResult, TransportError>> + Send;

    /// Fetch the call stack of a pause, innermost frame first.
    fn get_frames(
        &self,
        pause_id: &PauseId,
    ) -> impl Future<Output = Result<Vec<Frame>, TransportError>> + Send;

    /// Fetch the ordered steppable positions of one frame of a pause.
    fn get_frame_steps(
        &self,
        pause_id: &PauseId,
        async_index: usize,
        frame_id: &FrameId,
    ) -> impl Future<Output = Result<Vec<FramePosition>, TransportError>> + Send;
}
