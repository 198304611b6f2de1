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

//! Per-pause caches for call stacks and frame steps
//!
//! Both caches are keyed by pause, so data of one pause can never be served
//! for another. Entries live until the pause is evicted or the session is
//! reset.

use std::sync::Arc;

use tracing::{debug, warn};

use tdb_common::{Frame, FrameId, FramePosition, PauseId};

use crate::{
    cache::SingleFlightCache,
    transport::{ReplayTransport, TransportError},
};

/// Steppable positions of a frame, in ascending point order.
pub type FrameSteps = Arc<Vec<FramePosition>>;

/// Call stack of a pause, innermost frame first.
pub type CallStack = Arc<Vec<Frame>>;

/// Single-flight cache of frame steps keyed by `(pause, frame)`.
#[derive(Debug, Default)]
pub struct FrameStepCache {
    inner: SingleFlightCache<(PauseId, FrameId), FrameSteps>,
}

impl FrameStepCache {
    /// An empty cache
    pub fn new() -> Self {
        Self::default()
    }

    /// Steps of `frame`, fetched at most once.
    ///
    /// A frame spanning too many points to enumerate resolves to an empty
    /// list; callers then fall back to the server's default stepping.
    pub async fn get_steps<T: ReplayTransport>(
        &self,
        transport: &Arc<T>,
        frame: &Frame,
    ) -> Result<FrameSteps, TransportError> {
        let key = (frame.pause_id.clone(), frame.id.clone());
        let transport = Arc::clone(transport);
        let pause_id = frame.pause_id.clone();
        let frame_id = frame.id.clone();
        let async_index = frame.async_index;

        self.inner
            .get_or_fetch(key, move || async move {
                debug!(pause = %pause_id, frame = %frame_id, "Fetching frame steps");
                match transport.get_frame_steps(&pause_id, async_index, &frame_id).await {
                    Ok(mut steps) => {
                        // Resolution relies on ascending order
                        steps.sort_by(|a, b| a.point.cmp(&b.point));
                        Ok(Arc::new(steps))
                    }
                    Err(TransportError::TooManyPoints) => {
                        warn!(
                            pause = %pause_id,
                            frame = %frame_id,
                            "Frame spans too many points, stepping will use server defaults"
                        );
                        Ok(Arc::new(Vec::new()))
                    }
                    Err(err) => Err(err),
                }
            })
            .await
    }

    /// Steps of a frame if they have already been loaded
    pub fn peek(&self, pause_id: &PauseId, frame_id: &FrameId) -> Option<FrameSteps> {
        self.inner.peek(&(pause_id.clone(), frame_id.clone()))
    }

    /// Drop every entry belonging to `pause_id`
    pub fn evict_pause(&self, pause_id: &PauseId) {
        self.inner.retain(|(pause, _)| pause != pause_id);
    }

    /// Drop every entry
    pub fn clear(&self) {
        self.inner.clear();
    }
}

/// Single-flight cache of call stacks keyed by pause.
#[derive(Debug, Default)]
pub struct CallStackCache {
    inner: SingleFlightCache<PauseId, CallStack>,
}

impl CallStackCache {
    /// An empty cache
    pub fn new() -> Self {
        Self::default()
    }

    /// Call stack of `pause_id`, fetched at most once.
    pub async fn get_frames<T: ReplayTransport>(
        &self,
        transport: &Arc<T>,
        pause_id: &PauseId,
    ) -> Result<CallStack, TransportError> {
        let transport = Arc::clone(transport);
        let pause = pause_id.clone();

        self.inner
            .get_or_fetch(pause_id.clone(), move || async move {
                debug!(%pause, "Fetching call stack");
                let frames = transport.get_frames(&pause).await?;
                Ok(Arc::new(frames))
            })
            .await
    }

    /// Drop the entry of `pause_id`
    pub fn evict_pause(&self, pause_id: &PauseId) {
        self.inner.retain(|pause| pause != pause_id);
    }

    /// Drop every entry
    pub fn clear(&self) {
        self.inner.clear();
    }
}
