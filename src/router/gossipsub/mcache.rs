// Copyright (c) Anza Technology, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Sliding-window message cache backing the gossip slow path.

use std::collections::{BTreeSet, HashMap, VecDeque};

use crate::pubsub::rpc::{Message, MsgId};

/// Message store plus a bounded ring of history windows.
///
/// Window `0` holds the message IDs inserted since the last heartbeat;
/// higher indices represent older heartbeat intervals. Messages evicted from
/// the oldest window are removed from the cache entirely.
pub struct MessageCache {
    msgs: HashMap<MsgId, Message>,
    history: VecDeque<Vec<MsgId>>,
}

impl MessageCache {
    /// Creates a cache remembering messages for `history_length` heartbeat
    /// intervals.
    pub fn new(history_length: usize) -> Self {
        let mut history = VecDeque::with_capacity(history_length);
        history.resize_with(history_length, Vec::new);
        Self {
            msgs: HashMap::new(),
            history,
        }
    }

    /// Inserts a message into the cache and the most recent history window.
    pub fn add(&mut self, msg: Message) {
        let msg_id = msg.id();
        self.msgs.insert(msg_id, msg);
        self.history[0].push(msg_id);
    }

    /// Looks up a cached message by its ID.
    pub fn get(&self, msg_id: &MsgId) -> Option<&Message> {
        self.msgs.get(msg_id)
    }

    /// Returns the union of message IDs in the `history_gossip` most recent
    /// windows.
    pub fn gossip_ids(&self, history_gossip: usize) -> BTreeSet<MsgId> {
        self.history
            .iter()
            .take(history_gossip)
            .flatten()
            .copied()
            .collect()
    }

    /// Shifts the history windows one interval older.
    ///
    /// Messages in the oldest window are dropped from the cache; a fresh
    /// empty window becomes the most recent one.
    pub fn shift(&mut self) {
        if let Some(oldest) = self.history.pop_back() {
            for msg_id in oldest {
                // not present in any younger window since a message is only
                // processed once (owing to the seen cache)
                self.msgs.remove(&msg_id);
            }
            self.history.push_front(Vec::new());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn msg(seqno: i64) -> Message {
        Message::new(1, seqno, 100)
    }

    #[test]
    fn add_and_get() {
        let mut mcache = MessageCache::new(5);
        let message = msg(7);
        mcache.add(message);
        assert_eq!(mcache.get(&message.id()), Some(&message));
        assert_eq!(mcache.get(&msg(8).id()), None);
    }

    #[test]
    fn gossip_ids_cover_recent_windows() {
        let mut mcache = MessageCache::new(5);
        mcache.add(msg(1));
        mcache.shift();
        mcache.add(msg(2));
        mcache.shift();
        mcache.add(msg(3));

        // windows: [3], [2], [1], [], []
        let ids = mcache.gossip_ids(2);
        assert!(ids.contains(&msg(3).id()));
        assert!(ids.contains(&msg(2).id()));
        assert!(!ids.contains(&msg(1).id()));
    }

    #[test]
    fn shift_evicts_oldest_window() {
        let mut mcache = MessageCache::new(2);
        mcache.add(msg(1));
        mcache.shift();
        assert!(mcache.get(&msg(1).id()).is_some());
        mcache.shift();
        assert!(mcache.get(&msg(1).id()).is_none());
        // window 0 is empty again after every shift
        assert!(mcache.gossip_ids(1).is_empty());
    }
}
