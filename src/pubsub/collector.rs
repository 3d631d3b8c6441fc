// Copyright (c) Anza Technology, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Per-message statistics collection on network send and receive.
//!
//! Every distinct message ID observed in a send is tracked until its age
//! exceeds the configured TTL; retirement folds its partial statistics into
//! the global accumulators. Replies in the RPC protocol are not treated
//! specially and headers are not included in the bytes transferred.

use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::time::Duration;

use crate::NodeId;
use crate::pubsub::rpc::{MsgId, Rpc};
use crate::stats::{MeanStat, Stats};

/// Per-packet overhead in bytes, charged on top of the payload.
pub const RPC_OVERHEAD: u64 = 64;

/// Maximum payload bytes per packet; larger RPCs are counted as fragmented.
/// Close to the real payload of an ethernet frame.
pub const MAX_PAYLOAD_SIZE: u64 = 1460;

struct ChronoMsg {
    msg_id: MsgId,
    origin_time: Duration,
}

/// Aggregates delay, reach and traffic statistics for every message observed
/// on the network.
pub struct StatCollector {
    /// Duration after which messages are retired.
    seen_ttl: Duration,

    /// Final stats are accumulated here as messages retire.
    cur_stats: Stats,

    /// Count of retired messages.
    msg_count: i64,

    /// Packets are counted during the send event.
    total_packet_count: i64,

    /// Bytes are counted during the send event.
    total_bytes_transferred: i64,

    /// Populated the first time a message is encountered. Used for retiring
    /// old messages and for calculating latency at the receiving end.
    //
    // Ordered maps keep the final fold deterministic for a fixed seed.
    origin_time_per_msg: BTreeMap<MsgId, Duration>,

    /// Mean delivery delay in milliseconds over the receiving nodes.
    delay_ms_per_msg: BTreeMap<MsgId, MeanStat>,

    /// Message ID -> set of nodes that have NOT yet received it.
    ///
    /// We expect messages to be delivered to everyone eventually, so storing
    /// the non-receivers is easier on memory.
    rem_nodes_per_msg: BTreeMap<MsgId, BTreeSet<NodeId>>,

    /// Live message IDs in non-decreasing order of their origin times.
    chrono_msgs: VecDeque<ChronoMsg>,

    /// All simulation participants, populated before the run starts.
    node_ids: BTreeSet<NodeId>,
}

impl StatCollector {
    /// Creates a collector that retires messages `seen_ttl` after their
    /// first send.
    pub fn new(seen_ttl: Duration) -> Self {
        Self {
            seen_ttl,
            cur_stats: Stats::default(),
            msg_count: 0,
            total_packet_count: 0,
            total_bytes_transferred: 0,
            origin_time_per_msg: BTreeMap::new(),
            delay_ms_per_msg: BTreeMap::new(),
            rem_nodes_per_msg: BTreeMap::new(),
            chrono_msgs: VecDeque::new(),
            node_ids: BTreeSet::new(),
        }
    }

    /// Records a node as a simulation participant.
    ///
    /// The participant count is the denominator of the reach statistic
    /// (minus one, excluding the originator).
    pub fn add_node(&mut self, node_id: NodeId) {
        self.node_ids.insert(node_id);
    }

    /// Collects statistics for a packet send at virtual time `now`.
    pub fn on_send(&mut self, src_id: NodeId, rpc: &Rpc, now: Duration) {
        let mut new_msg_already_found = false;

        for msg in rpc.messages() {
            let msg_id = msg.id();
            if self.origin_time_per_msg.contains_key(&msg_id) {
                continue;
            }
            if !new_msg_already_found {
                self.retire_old_msgs(now);
                new_msg_already_found = true;
            }

            self.origin_time_per_msg.insert(msg_id, now);
            self.chrono_msgs.push_back(ChronoMsg {
                msg_id,
                origin_time: now,
            });

            // delay is calculated on the receiving end
            self.delay_ms_per_msg.insert(msg_id, MeanStat::default());

            // all nodes except the source still have to receive the message;
            // the delivery percentage is calculated when the message retires
            let rem_nodes = self.exclude_source(src_id);
            self.rem_nodes_per_msg.insert(msg_id, rem_nodes);
        }

        let rpc_size = rpc.size();
        let packet_count = packet_count(rpc_size) as i64;
        self.total_packet_count += packet_count;
        self.total_bytes_transferred += packet_count * RPC_OVERHEAD as i64 + rpc_size as i64;
    }

    /// Collects statistics for a packet receive at virtual time `now`.
    pub fn on_recv(&mut self, dst_id: NodeId, rpc: &Rpc, now: Duration) {
        for msg in rpc.messages() {
            let msg_id = msg.id();

            // The message is either retired, never seen globally, or already
            // seen on this particular node.
            let Some(rem_nodes) = self.rem_nodes_per_msg.get_mut(&msg_id) else {
                continue;
            };
            if !rem_nodes.remove(&dst_id) {
                continue;
            }

            // the key sets of rem_nodes_per_msg and origin_time_per_msg are
            // identical, so the origin time must be present
            let origin_time = self.origin_time_per_msg[&msg_id];
            let delay_ms = (now - origin_time).as_millis() as f64;
            self.delay_ms_per_msg
                .get_mut(&msg_id)
                .expect("delay entry should exist for live message")
                .add_value(delay_ms);
        }
    }

    /// Returns the final stats after the run is complete, resetting the
    /// collector for reuse.
    ///
    /// All still-live messages are force-retired and counted in. Typically
    /// called only once, by the network, which guards against calling this
    /// while the scheduler is still running.
    pub fn final_stats(&mut self) -> Stats {
        // retire all remaining messages
        self.msg_count += self.origin_time_per_msg.len() as i64;

        if self.msg_count > 0 {
            self.cur_stats.packet_count_per_msg = MeanStat::from_parts(
                self.msg_count,
                self.total_packet_count as f64 / self.msg_count as f64,
            );
            self.cur_stats.traffic_per_msg = MeanStat::from_parts(
                self.msg_count,
                self.total_bytes_transferred as f64 / self.msg_count as f64,
            );
        }

        for delay in self.delay_ms_per_msg.values() {
            self.cur_stats.delay_ms_per_msg.add_mean(delay);
        }

        for rem_nodes in self.rem_nodes_per_msg.values() {
            let rem_ratio = rem_nodes.len() as f64 / (self.node_ids.len() - 1) as f64;
            self.cur_stats.delivered_part.add_value(100.0 * (1.0 - rem_ratio));
        }

        let stats = self.cur_stats;
        self.clear();
        stats
    }

    fn clear(&mut self) {
        self.cur_stats = Stats::default();
        self.msg_count = 0;
        self.total_packet_count = 0;
        self.total_bytes_transferred = 0;
        self.origin_time_per_msg.clear();
        self.delay_ms_per_msg.clear();
        self.rem_nodes_per_msg.clear();
        self.chrono_msgs.clear();
        self.node_ids.clear();
    }

    /// Retires all messages whose origin time is older than the TTL.
    fn retire_old_msgs(&mut self, now: Duration) {
        let Some(oldest_valid) = now.checked_sub(self.seen_ttl) else {
            return;
        };
        while let Some(chrono) = self.chrono_msgs.front() {
            if chrono.origin_time >= oldest_valid {
                break;
            }
            let msg_id = chrono.msg_id;
            self.chrono_msgs.pop_front();
            self.msg_count += 1;

            self.origin_time_per_msg.remove(&msg_id);

            let delay = self
                .delay_ms_per_msg
                .remove(&msg_id)
                .expect("delay entry should exist for live message");
            self.cur_stats.delay_ms_per_msg.add_mean(&delay);

            let rem_nodes = self
                .rem_nodes_per_msg
                .remove(&msg_id)
                .expect("remaining-nodes entry should exist for live message");
            let rem_ratio = rem_nodes.len() as f64 / (self.node_ids.len() - 1) as f64;
            self.cur_stats.delivered_part.add_value(100.0 * (1.0 - rem_ratio));
        }
    }

    /// Returns the set of all participants except `src_id`.
    fn exclude_source(&self, src_id: NodeId) -> BTreeSet<NodeId> {
        self.node_ids
            .iter()
            .copied()
            .filter(|&id| id != src_id)
            .collect()
    }
}

/// Number of packets needed for an RPC of the given size.
fn packet_count(rpc_size: u64) -> u64 {
    rpc_size.div_ceil(MAX_PAYLOAD_SIZE)
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::pubsub::rpc::Message;

    #[test]
    fn half_recv() {
        let mut collector = StatCollector::new(Duration::from_secs(3600));
        let node_ids = [16, 8, 24];
        for node_id in node_ids {
            collector.add_node(node_id);
        }

        let msg = Message::new(node_ids[0], 36, 0);
        let rpc = Rpc::data(msg);
        let send_time = Duration::ZERO;
        let recv_time = Duration::from_millis(100);

        // deliver the message to only one of the two other nodes
        collector.on_send(node_ids[0], &rpc, send_time);
        collector.on_recv(node_ids[1], &rpc, recv_time);
        let stats = collector.final_stats();

        assert!((stats.delivered_part.value() - 50.0).abs() < 1e-6);
        assert!((stats.delay_ms_per_msg.value() - 100.0).abs() < 1e-6);
    }

    // A -- 100ms --> B -- 200ms --> C, then the identical message is
    // retransmitted from A and B does not forward it a second time.
    #[test]
    fn forward_path() {
        let mut collector = StatCollector::new(Duration::from_secs(3600));
        let node_ids = [22, 11, 34];
        for node_id in node_ids {
            collector.add_node(node_id);
        }

        let rpc_size = 1000;
        let first_delay = Duration::from_millis(100);
        let second_delay = Duration::from_millis(200);

        for i in 0..2u32 {
            let msg = Message::new(node_ids[0], 36, rpc_size);
            let rpc = Rpc::data(msg);

            let send_time = (first_delay + second_delay) * i;
            let forward_time = send_time + first_delay;
            let recv_time = forward_time + second_delay;

            collector.on_send(node_ids[0], &rpc, send_time);
            collector.on_recv(node_ids[1], &rpc, forward_time);
            // B only forwards the message the first time around
            if i == 0 {
                collector.on_send(node_ids[1], &rpc, forward_time);
                collector.on_recv(node_ids[2], &rpc, recv_time);
            }
        }

        let stats = collector.final_stats();

        let packet_count = 3.0;
        let traffic = packet_count * (rpc_size + RPC_OVERHEAD) as f64;
        // delays of 100ms and 300ms average out to 200ms
        let avg_delay = 200.0;

        assert!((stats.packet_count_per_msg.value() - packet_count).abs() < 1e-6);
        assert!((stats.traffic_per_msg.value() - traffic).abs() < 1e-6);
        assert!((stats.delay_ms_per_msg.value() - avg_delay).abs() < 1e-6);
        assert!((stats.delivered_part.value() - 100.0).abs() < 1e-6);
    }

    // ensure at least some messages are retired before the final stats
    #[test]
    fn retirement() {
        let mut collector = StatCollector::new(Duration::from_secs(1));
        let node_ids = [13, 40];
        for node_id in node_ids {
            collector.add_node(node_id);
        }

        let rpc_size = 1000;
        let delay = Duration::from_millis(100);

        for i in 0..100u32 {
            let msg = Message::new(node_ids[0], 7 + 2 * i as i64, rpc_size);
            let rpc = Rpc::data(msg);
            let send_time = delay * i;
            collector.on_send(node_ids[0], &rpc, send_time);
            collector.on_recv(node_ids[1], &rpc, send_time + delay);
        }

        let stats = collector.final_stats();

        assert!((stats.packet_count_per_msg.value() - 1.0).abs() < 1e-6);
        let traffic = (rpc_size + RPC_OVERHEAD) as f64;
        assert!((stats.traffic_per_msg.value() - traffic).abs() < 1e-6);
        assert!((stats.delay_ms_per_msg.value() - 100.0).abs() < 1e-6);
        assert!((stats.delivered_part.value() - 100.0).abs() < 1e-6);
        assert_eq!(stats.packet_count_per_msg.count(), 100);
    }

    #[test]
    fn final_stats_resets() {
        let mut collector = StatCollector::new(Duration::from_secs(60));
        collector.add_node(1);
        collector.add_node(2);
        let rpc = Rpc::data(Message::new(1, 1, 500));
        collector.on_send(1, &rpc, Duration::ZERO);
        let stats = collector.final_stats();
        assert_eq!(stats.packet_count_per_msg.count(), 1);

        // no new activity: everything is zeroed
        collector.add_node(1);
        collector.add_node(2);
        let stats = collector.final_stats();
        assert_eq!(stats.packet_count_per_msg.count(), 0);
        assert!((stats.packet_count_per_msg.value()).abs() < 1e-6);
        assert!((stats.delay_ms_per_msg.value()).abs() < 1e-6);
        assert!((stats.delivered_part.value()).abs() < 1e-6);
    }
}
