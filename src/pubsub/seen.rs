// Copyright (c) Anza Technology, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Time-windowed cache of already observed message IDs.
//!
//! Use cases:
//! - check whether a message was already processed (gates forwarding)
//! - in gossipsub, request only those announced messages that are missing
//!
//! Entry times of existing messages are never updated in place, and expired
//! entries are only swept when new messages are inserted. Both mimic the
//! behavior of the official golang pubsub implementation.

use std::collections::{HashSet, VecDeque};
use std::time::Duration;

use crate::pubsub::rpc::MsgId;

struct SeenEntry {
    msg_id: MsgId,
    /// Virtual time at which the entry was inserted.
    entry_time: Duration,
}

/// Set of message IDs observed within the last TTL window.
pub struct SeenCache {
    /// Message IDs currently marked as seen.
    seen_ids: HashSet<MsgId>,
    /// Entries in non-decreasing order of insertion time.
    entries: VecDeque<SeenEntry>,
    /// Duration for which entries are retained.
    ttl: Duration,
}

impl SeenCache {
    /// Creates a cache retaining entries no older than `ttl` relative to the
    /// current virtual time. Older entries are retired when new messages are
    /// added.
    pub fn new(ttl: Duration) -> Self {
        Self {
            seen_ids: HashSet::new(),
            entries: VecDeque::new(),
            ttl,
        }
    }

    /// Marks the message as seen at virtual time `now`.
    ///
    /// Returns true if the message was not already marked.
    pub fn mark_seen(&mut self, msg_id: MsgId, now: Duration) -> bool {
        if self.seen_ids.contains(&msg_id) {
            // no sweep here, matching the official golang implementation
            return false;
        }

        self.sweep(now);
        self.entries.push_back(SeenEntry {
            msg_id,
            entry_time: now,
        });
        self.seen_ids.insert(msg_id);
        true
    }

    /// Membership test only; performs no sweep.
    pub fn seen(&self, msg_id: &MsgId) -> bool {
        self.seen_ids.contains(msg_id)
    }

    fn sweep(&mut self, now: Duration) {
        // Entries are in non-decreasing insertion order, so we are done as
        // soon as the front entry is young enough.
        let Some(oldest_valid) = now.checked_sub(self.ttl) else {
            return;
        };
        while let Some(front) = self.entries.front() {
            if front.entry_time >= oldest_valid {
                break;
            }
            self.seen_ids.remove(&front.msg_id);
            self.entries.pop_front();
        }
    }
}
