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

use thiserror::Error;

use tdb_common::FrameId;

use crate::{session::PauseStatus, transport::TransportError};

/// Errors surfaced to callers of the engine.
///
/// Stale results are never errors: they are dropped silently.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    /// The session is not in a state that allows the requested action
    #[error("cannot {action} while the session is {status}")]
    InvalidState {
        /// What was attempted
        action: String,
        /// Status of the session at the time
        status: PauseStatus,
    },
    /// The frame is not part of the current pause's call stack
    #[error("frame {0} does not belong to the current pause")]
    UnknownFrame(FrameId),
    /// A transport failure that the engine does not recover from
    #[error(transparent)]
    Transport(#[from] TransportError),
}

impl EngineError {
    pub(crate) fn invalid_state(action: impl ToString, status: PauseStatus) -> Self {
        Self::InvalidState { action: action.to_string(), status }
    }
}
