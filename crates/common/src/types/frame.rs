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

//! Call-stack frames and the steppable positions inside them.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::{ExecutionPoint, PauseId};

/// Identifier of a frame, unique within the pause it belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FrameId(pub String);

impl FrameId {
    /// Create a new frame id
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The raw identifier
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FrameId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for FrameId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// A position in a source file.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Location {
    /// Source the location refers to
    pub source_id: String,
    /// 1-based line number
    pub line: u32,
    /// 0-based column
    pub column: u32,
}

impl Location {
    /// Create a new location
    pub fn new(source_id: impl Into<String>, line: u32, column: u32) -> Self {
        Self { source_id: source_id.into(), line, column }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.source_id, self.line, self.column)
    }
}

/// One entry of a pause's call stack.
///
/// Frames are read-only once fetched for a pause.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Frame {
    /// Pause owning this frame
    pub pause_id: PauseId,
    /// Frame identifier
    pub id: FrameId,
    /// Position in the stack, 0 being the innermost frame
    pub index: usize,
    /// 0 for the synchronous chain, >0 for each asynchronous ancestor
    pub async_index: usize,
    /// Name of the executing function, if known
    #[serde(default)]
    pub function_name: Option<String>,
    /// Generated-source location
    pub location: Location,
    /// Original-source location, when a source map applies
    #[serde(default)]
    pub alternate_location: Option<Location>,
}

impl Frame {
    /// Whether this is the innermost frame of its pause
    pub fn is_innermost(&self) -> bool {
        self.index == 0
    }

    /// Location to display, preferring the original source when asked to
    pub fn display_location(&self, prefer_original: bool) -> &Location {
        match (&self.alternate_location, prefer_original) {
            (Some(alternate), true) => alternate,
            _ => &self.location,
        }
    }
}

/// One steppable instruction inside a frame's lifetime.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FramePosition {
    /// Execution point of the instruction
    pub point: ExecutionPoint,
    /// Wall-clock time in the recording, in milliseconds
    pub time: f64,
    /// Source location of the instruction
    pub location: Location,
}

impl FramePosition {
    /// Create a new frame position
    pub fn new(point: ExecutionPoint, time: f64, location: Location) -> Self {
        Self { point, time, location }
    }
}
