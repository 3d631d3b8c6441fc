// Copyright (c) Anza Technology, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Virtual network with injected latency.
//!
//! Acts as the intermediary for all RPCs between nodes: every send is
//! recorded by the statistics collector and scheduled for arrival after a
//! latency drawn from the configured distribution. There are no per-link
//! queues; latency is drawn per RPC. Sends to unregistered destinations are
//! silently dropped, a property of the simulated idealised network.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::{Rc, Weak};
use std::time::Duration;

use log::debug;

use crate::dist::{Bernoulli, Dist, Latency};
use crate::pubsub::collector::StatCollector;
use crate::pubsub::rpc::Rpc;
use crate::sched::{Event, Scheduler};
use crate::stats::Stats;
use crate::{NodeId, SimRng};

/// Probability of a latency spike on any single packet.
pub const SPIKE_PROB: f64 = 0.1;
/// Latency floor in milliseconds, applied to every packet.
pub const BASE_LATENCY_MS: f64 = 100.0;
/// Additional latency in milliseconds on a spike.
pub const SPIKE_LATENCY_MS: f64 = 100.0;

/// Receiver of RPCs delivered by the network.
pub trait RpcHandler {
    fn handle_rpc(&self, src_id: NodeId, rpc: &Rpc);
}

/// Latency-injected RPC delivery between node IDs.
///
/// Owns the node table and the statistics collector.
pub struct Network {
    sched: Rc<Scheduler>,
    nodes: RefCell<HashMap<NodeId, Rc<dyn RpcHandler>>>,
    latency_dist: Latency<Bernoulli>,
    rng: SimRng,
    collector: RefCell<StatCollector>,
}

impl Network {
    /// Creates a new network without any nodes.
    pub fn new(sched: Rc<Scheduler>, seen_ttl: Duration, rng: SimRng) -> Self {
        let latency_dist = Latency {
            spike_dist: Bernoulli::new(SPIKE_PROB),
            base_ms: BASE_LATENCY_MS,
            spike_ms: SPIKE_LATENCY_MS,
        };
        Self {
            sched,
            nodes: RefCell::new(HashMap::new()),
            latency_dist,
            rng,
            collector: RefCell::new(StatCollector::new(seen_ttl)),
        }
    }

    /// Registers `handler` under `node_id` and returns a link bound to that
    /// ID for outbound sends.
    pub fn add_node(self: &Rc<Self>, node_id: NodeId, handler: Rc<dyn RpcHandler>) -> MuxLink {
        self.nodes.borrow_mut().insert(node_id, handler);
        self.collector.borrow_mut().add_node(node_id);
        MuxLink {
            net: Rc::downgrade(self),
            local_id: node_id,
        }
    }

    /// Sends an RPC from `src_id` to `dst_id`, scheduling its arrival after
    /// a freshly drawn latency.
    pub fn send_rpc(self: &Rc<Self>, src_id: NodeId, dst_id: NodeId, rpc: Rpc) {
        self.collector
            .borrow_mut()
            .on_send(src_id, &rpc, self.sched.now());
        let latency_ms = self.latency_dist.sample(&mut *self.rng.borrow_mut()).round();
        self.sched.schedule(
            Duration::from_millis(latency_ms as u64),
            RpcEvent {
                net: Rc::clone(self),
                src_id,
                dst_id,
                rpc,
            },
        );
    }

    /// Returns the final stats after the simulation run. Called only once.
    ///
    /// # Panics
    ///
    /// Panics if the scheduler is still running.
    pub fn final_stats(&self) -> Stats {
        assert!(
            self.sched.is_stopped(),
            "cannot retrieve the stats while the scheduler is running"
        );
        self.collector.borrow_mut().final_stats()
    }

    fn handle_rpc(&self, src_id: NodeId, dst_id: NodeId, rpc: &Rpc) {
        let Some(handler) = self.nodes.borrow().get(&dst_id).cloned() else {
            // unknown destination, silent drop
            return;
        };
        debug!(
            "received RPC at {:?} from {src_id} at {dst_id}",
            self.sched.now()
        );
        self.collector
            .borrow_mut()
            .on_recv(dst_id, rpc, self.sched.now());
        handler.handle_rpc(src_id, rpc);
    }
}

/// Link abstraction closing over the local node ID.
pub struct MuxLink {
    net: Weak<Network>,
    local_id: NodeId,
}

impl MuxLink {
    /// Sends an RPC from the local node to `remote_id`.
    pub fn send_rpc(&self, remote_id: NodeId, rpc: Rpc) {
        if let Some(net) = self.net.upgrade() {
            net.send_rpc(self.local_id, remote_id, rpc);
        }
    }
}

/// Arrival of an RPC at its destination.
struct RpcEvent {
    net: Rc<Network>,
    src_id: NodeId,
    dst_id: NodeId,
    rpc: Rpc,
}

impl Event for RpcEvent {
    fn trigger(&self) {
        self.net.handle_rpc(self.src_id, self.dst_id, &self.rpc);
    }
}
