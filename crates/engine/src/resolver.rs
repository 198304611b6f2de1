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

//! Resume-point resolution
//!
//! Turns a command into the point to navigate to when the user is stepping in
//! a frame other than the innermost one. `None` always means "let the replay
//! server apply its default semantics", never an error.

use tdb_common::{ExecutionPoint, Frame, FramePosition};

use crate::transport::Command;

/// Whether resolving `command` needs the steps of `frame` at all.
pub fn needs_frame_steps(command: Command, frame: Option<&Frame>) -> bool {
    let Some(frame) = frame else { return false };
    !frame.is_innermost() && !matches!(command, Command::StepOut)
}

/// Compute the target point of `command`.
///
/// `steps` are the ordered positions of `selected_frame`, or `None` if they
/// are not loaded yet.
pub fn resolve_target(
    command: Command,
    current_point: Option<&ExecutionPoint>,
    selected_frame: Option<&Frame>,
    steps: Option<&[FramePosition]>,
) -> Option<ExecutionPoint> {
    if !needs_frame_steps(command, selected_frame) {
        return None;
    }
    let current = current_point?;
    let steps = steps?;

    let position = match command {
        Command::ReverseStepOver | Command::Rewind => {
            steps.iter().rev().find(|position| position.point.is_before(current))
        }
        Command::StepOver | Command::StepIn | Command::Resume => {
            steps.iter().find(|position| position.point.is_after(current))
        }
        Command::StepOut => None,
    };

    position.map(|position| position.point.clone())
}
