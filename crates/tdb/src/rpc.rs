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

//! JSON-RPC transport to the replay server
//!
//! Implements [`ReplayTransport`] over a jsonrpsee HTTP client. Parameters are
//! sent by name, in camelCase.

use std::time::Duration;

use eyre::Result;
use jsonrpsee::{
    core::{client::ClientT, params::ObjectParams, ClientError},
    http_client::{HttpClient, HttpClientBuilder},
};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, error};

use tdb_common::{ExecutionPoint, Frame, FrameId, FramePosition, LoadedRegions, PauseId};
use tdb_engine::{Command, CommandResult, PauseResult, ReplayTransport, TransportError};

/// Error code the server uses when a frame has too many steps to enumerate
pub const TOO_MANY_POINTS: i32 = -32011;

/// Error code the server uses when no pause can be created at a point
pub const PAUSE_CREATION_FAILED: i32 = -32012;

/// Extra data attached to a pause-creation failure
#[derive(Debug, Deserialize)]
struct FailureData {
    point: ExecutionPoint,
}

/// Replay server client
pub struct RpcTransport {
    client: HttpClient,
    server_url: String,
}

impl RpcTransport {
    /// Create a new client for `server_url`
    pub fn new(server_url: &str, request_timeout: Duration) -> Result<Self> {
        let client = HttpClientBuilder::default().request_timeout(request_timeout).build(server_url)?;

        debug!("Created RPC client for: {}", server_url);
        Ok(Self { client, server_url: server_url.to_string() })
    }

    /// Get server URL
    pub fn server_url(&self) -> &str {
        &self.server_url
    }

    /// Regions of the recording the server has loaded
    pub async fn loaded_regions(&self) -> Result<LoadedRegions, TransportError> {
        self.call("Recording.getLoadedRegions", ObjectParams::new(), None).await
    }

    async fn call<R: DeserializeOwned>(
        &self,
        method: &str,
        params: ObjectParams,
        point: Option<&ExecutionPoint>,
    ) -> Result<R, TransportError> {
        debug!("Making RPC request: {}", method);

        match self.client.request(method, params).await {
            Ok(result) => Ok(result),
            Err(e) => {
                error!("{} failed: {}", method, e);
                Err(classify(e, point))
            }
        }
    }
}

impl ReplayTransport for RpcTransport {
    async fn run_command(
        &self,
        command: Command,
        target: Option<&ExecutionPoint>,
        regions: &LoadedRegions,
    ) -> Result<CommandResult, TransportError> {
        let mut params = ObjectParams::new();
        insert(&mut params, "target", target)?;
        insert(&mut params, "loadedRegions", regions)?;

        let method = format!("Debugger.{}", command.name());
        let response: Value = self.call(&method, params, target).await?;
        parse_command_response(response)
    }

    async fn create_pause(&self, point: &ExecutionPoint) -> Result<PauseResult, TransportError> {
        let mut params = ObjectParams::new();
        insert(&mut params, "point", point)?;

        self.call("Debugger.createPause", params, Some(point)).await
    }

    async fn get_frames(&self, pause_id: &PauseId) -> Result<Vec<Frame>, TransportError> {
        let mut params = ObjectParams::new();
        insert(&mut params, "pauseId", pause_id)?;

        self.call("Pause.getAllFrames", params, None).await
    }

    async fn get_frame_steps(
        &self,
        pause_id: &PauseId,
        async_index: usize,
        frame_id: &FrameId,
    ) -> Result<Vec<FramePosition>, TransportError> {
        let mut params = ObjectParams::new();
        insert(&mut params, "pauseId", pause_id)?;
        insert(&mut params, "asyncIndex", async_index)?;
        insert(&mut params, "frameId", frame_id)?;

        self.call("Pause.getFrameSteps", params, None).await
    }
}

fn insert<P: Serialize>(params: &mut ObjectParams, name: &str, value: P) -> Result<(), TransportError> {
    params
        .insert(name, value)
        .map_err(|e| TransportError::Request(format!("failed to encode {name}: {e}")))
}

/// Decode the result of a stepping command.
///
/// The server answers `{ "finished": true }` when the run reached the edge of
/// the recording, and a pause otherwise.
fn parse_command_response(response: Value) -> Result<CommandResult, TransportError> {
    if response.get("finished").and_then(Value::as_bool) == Some(true) {
        return Ok(CommandResult::Finished);
    }

    serde_json::from_value(response)
        .map(CommandResult::Paused)
        .map_err(|e| TransportError::Request(format!("malformed pause: {e}")))
}

/// Map a client error onto the transport's error kinds.
///
/// `point` is the point the request was about, used when a pause-creation
/// failure does not name one itself.
fn classify(err: ClientError, point: Option<&ExecutionPoint>) -> TransportError {
    match err {
        ClientError::Call(call) => match call.code() {
            TOO_MANY_POINTS => TransportError::TooManyPoints,
            PAUSE_CREATION_FAILED => {
                let failed_at = call
                    .data()
                    .and_then(|data| serde_json::from_str::<FailureData>(data.get()).ok())
                    .map(|data| data.point)
                    .or_else(|| point.cloned());
                match failed_at {
                    Some(point) => TransportError::PauseCreationFailed {
                        point,
                        reason: call.message().to_string(),
                    },
                    None => TransportError::Request(call.to_string()),
                }
            }
            _ => TransportError::Request(call.to_string()),
        },
        ClientError::Transport(e) => TransportError::Disconnected(e.to_string()),
        e => TransportError::Request(e.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonrpsee::types::ErrorObject;
    use serde_json::json;

    fn call_error(code: i32, data: Option<Value>) -> ClientError {
        ClientError::Call(ErrorObject::owned(code, "failed", data))
    }

    #[test]
    fn test_classify_too_many_points() {
        let err = classify(call_error(TOO_MANY_POINTS, None), None);
        assert_eq!(err, TransportError::TooManyPoints);
    }

    #[test]
    fn test_classify_pause_creation_failure() {
        let requested = ExecutionPoint::new("100");

        let err = classify(call_error(PAUSE_CREATION_FAILED, None), Some(&requested));
        assert_eq!(
            err,
            TransportError::PauseCreationFailed { point: requested.clone(), reason: "failed".into() }
        );

        // A point named by the server wins over the requested one
        let err = classify(
            call_error(PAUSE_CREATION_FAILED, Some(json!({ "point": "250" }))),
            Some(&requested),
        );
        assert!(matches!(
            err,
            TransportError::PauseCreationFailed { point, .. } if point == ExecutionPoint::new("250")
        ));
    }

    #[test]
    fn test_classify_pause_creation_failure_without_point() {
        let err = classify(call_error(PAUSE_CREATION_FAILED, None), None);
        assert!(matches!(err, TransportError::Request(_)));
    }

    #[test]
    fn test_classify_other_codes() {
        let err = classify(call_error(-32601, None), None);
        assert!(matches!(err, TransportError::Request(_)));
    }

    #[test]
    fn test_parse_command_response() {
        let finished = parse_command_response(json!({ "finished": true })).unwrap();
        assert_eq!(finished, CommandResult::Finished);

        let paused =
            parse_command_response(json!({ "point": "42", "pauseId": "P1", "time": 1.5 })).unwrap();
        match paused {
            CommandResult::Paused(pause) => {
                assert_eq!(pause.point, ExecutionPoint::new("42"));
                assert_eq!(pause.pause_id, PauseId::new("P1"));
                assert!(pause.has_frames);
            }
            other => panic!("unexpected result {other:?}"),
        }

        assert!(parse_command_response(json!({ "why": "step" })).is_err());
    }
}
