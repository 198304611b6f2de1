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

//! Back/forward list over prior pauses

use tdb_common::PauseHistoryEntry;

/// Linear history of successful pauses with a movable cursor.
///
/// Recording while the cursor is behind the newest entry drops the entries
/// after the cursor, like a browser history. There is no redo tree.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PauseHistory {
    entries: Vec<PauseHistoryEntry>,
    cursor: Option<usize>,
}

impl PauseHistory {
    /// An empty history
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `entry` after the cursor and move the cursor onto it.
    ///
    /// Duplicates are kept: re-pausing at the same point is a new entry.
    pub fn record(&mut self, entry: PauseHistoryEntry) {
        if let Some(cursor) = self.cursor {
            self.entries.truncate(cursor + 1);
        }
        self.entries.push(entry);
        self.cursor = Some(self.entries.len() - 1);
    }

    /// Step the cursor back and return the entry there.
    ///
    /// At the oldest entry this returns `None` and leaves the cursor alone.
    pub fn previous(&mut self) -> Option<PauseHistoryEntry> {
        let cursor = self.cursor?.checked_sub(1)?;
        self.cursor = Some(cursor);
        self.entries.get(cursor).cloned()
    }

    /// Step the cursor forward and return the entry there.
    ///
    /// At the newest entry this returns `None` and leaves the cursor alone.
    pub fn next(&mut self) -> Option<PauseHistoryEntry> {
        let cursor = self.cursor? + 1;
        let entry = self.entries.get(cursor)?.clone();
        self.cursor = Some(cursor);
        Some(entry)
    }

    /// Entry under the cursor
    pub fn current(&self) -> Option<&PauseHistoryEntry> {
        self.entries.get(self.cursor?)
    }

    /// All entries, oldest first
    pub fn entries(&self) -> &[PauseHistoryEntry] {
        &self.entries
    }

    /// Cursor position
    pub fn cursor(&self) -> Option<usize> {
        self.cursor
    }

    /// Whether [`Self::previous`] would move
    pub fn has_previous(&self) -> bool {
        self.cursor.is_some_and(|cursor| cursor > 0)
    }

    /// Whether [`Self::next`] would move
    pub fn has_next(&self) -> bool {
        self.cursor.is_some_and(|cursor| cursor + 1 < self.entries.len())
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing has been recorded
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Forget everything
    pub fn clear(&mut self) {
        self.entries.clear();
        self.cursor = None;
    }
}
