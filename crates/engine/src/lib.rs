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

//! Pause and execution-point navigation for time-travel debugging.
//!
//! The engine tracks where a replayed recording is paused, turns stepping
//! commands into concrete target points, and keeps a back/forward history of
//! prior pauses. Navigations may overlap; completions of superseded
//! navigations are dropped by generation.
//!
//! The replay server is abstracted behind [`ReplayTransport`].

pub mod cache;
pub mod config;
pub mod debugger;
pub mod error;
pub mod frames;
pub mod history;
pub mod resolver;
pub mod session;
pub mod test_utils;
pub mod transport;

pub use config::EngineConfig;
pub use debugger::{Debugger, NavigationOutcome, SeekTarget};
pub use error::EngineError;
pub use frames::{CallStack, FrameSteps};
pub use history::PauseHistory;
pub use session::{Generation, Navigation, PauseSessionState, PauseStatus};
pub use transport::{Command, CommandResult, PauseResult, ReplayTransport, TransportError};
