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

//! Execution points and their ordering.
//!
//! An [`ExecutionPoint`] names one instant in a recorded execution. Points are
//! decimal digit strings of unbounded width, so they are never parsed into a
//! native integer: ordering is computed digit-wise by [`compare`].

use std::{cmp::Ordering, fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error returned when text cannot be interpreted as an execution point.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid execution point {0:?}: expected a non-empty string of decimal digits")]
pub struct InvalidExecutionPoint(pub String);

/// A totally ordered identifier of one instant in a recorded execution.
///
/// The stored representation is canonical (no leading zeros, `"0"` for zero),
/// which keeps `Eq`/`Hash` consistent with the numeric [`Ord`] implementation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ExecutionPoint(String);

impl ExecutionPoint {
    /// Create a point from a digit string.
    ///
    /// Passing anything other than decimal digits is a contract violation; it is
    /// caught by a debug assertion. Use [`str::parse`] for untrusted input.
    pub fn new(digits: impl Into<String>) -> Self {
        let digits = digits.into();
        debug_assert!(is_digit_string(&digits), "malformed execution point {digits:?}");
        Self(canonicalize(&digits))
    }

    /// The zero point, i.e. the start of the recording.
    pub fn zero() -> Self {
        Self("0".to_string())
    }

    /// The canonical digit string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether `self` lies strictly before `other`.
    pub fn is_before(&self, other: &Self) -> bool {
        compare(self, other) == Ordering::Less
    }

    /// Whether `self` lies at or before `other`.
    pub fn is_at_or_before(&self, other: &Self) -> bool {
        compare(self, other) != Ordering::Greater
    }

    /// Whether `self` lies strictly after `other`.
    pub fn is_after(&self, other: &Self) -> bool {
        compare(self, other) == Ordering::Greater
    }

    /// Whether `self` lies at or after `other`.
    pub fn is_at_or_after(&self, other: &Self) -> bool {
        compare(self, other) != Ordering::Less
    }
}

/// Compare two execution points by numeric value.
///
/// Both points are canonical, so a longer digit string is always the larger
/// number and equal-length strings compare lexically.
pub fn compare(a: &ExecutionPoint, b: &ExecutionPoint) -> Ordering {
    a.0.len().cmp(&b.0.len()).then_with(|| a.0.as_bytes().cmp(b.0.as_bytes()))
}

fn is_digit_string(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}

fn canonicalize(digits: &str) -> String {
    let trimmed = digits.trim_start_matches('0');
    if trimmed.is_empty() {
        "0".to_string()
    } else {
        trimmed.to_string()
    }
}

impl Ord for ExecutionPoint {
    fn cmp(&self, other: &Self) -> Ordering {
        compare(self, other)
    }
}

impl PartialOrd for ExecutionPoint {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl FromStr for ExecutionPoint {
    type Err = InvalidExecutionPoint;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if is_digit_string(s) {
            Ok(Self(canonicalize(s)))
        } else {
            Err(InvalidExecutionPoint(s.to_string()))
        }
    }
}

impl TryFrom<String> for ExecutionPoint {
    type Error = InvalidExecutionPoint;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ExecutionPoint> for String {
    fn from(point: ExecutionPoint) -> Self {
        point.0
    }
}

impl fmt::Display for ExecutionPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
