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

//! Loaded regions of a recording.
//!
//! Regions are supplied by the replay server. The engine only reads them to
//! decide whether a point can be navigated to.

use serde::{Deserialize, Serialize};

use super::ExecutionPoint;

/// An inclusive range of execution points.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PointRange {
    /// First point of the range
    pub begin: ExecutionPoint,
    /// Last point of the range
    pub end: ExecutionPoint,
}

impl PointRange {
    /// Create a new range
    pub fn new(begin: ExecutionPoint, end: ExecutionPoint) -> Self {
        Self { begin, end }
    }

    /// Whether `point` lies within the range (both ends inclusive)
    pub fn contains(&self, point: &ExecutionPoint) -> bool {
        point.is_at_or_after(&self.begin) && point.is_at_or_before(&self.end)
    }
}

/// The set of currently loaded regions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadedRegions {
    /// Ranges that are fully loaded and can be paused in
    pub loaded: Vec<PointRange>,
    /// Ranges that are still being loaded
    #[serde(default)]
    pub loading: Vec<PointRange>,
}

impl LoadedRegions {
    /// Regions consisting of a single loaded range
    pub fn single(begin: ExecutionPoint, end: ExecutionPoint) -> Self {
        Self { loaded: vec![PointRange::new(begin, end)], loading: Vec::new() }
    }

    /// Whether `point` lies inside any loaded range
    pub fn is_loaded(&self, point: &ExecutionPoint) -> bool {
        self.loaded.iter().any(|range| range.contains(point))
    }
}
