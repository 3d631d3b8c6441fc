// Copyright (c) Anza Technology, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Mesh+gossip router.
//!
//! Message bodies are eagerly forwarded along a maintained mesh of peers,
//! while the remaining neighbors periodically receive lazy IHave summaries
//! of recently cached messages. Peers that missed a delivery pull it with an
//! IWant request. Mesh membership is adjusted with graft/prune control
//! messages: grafts are sent at join time and during heartbeat repair,
//! prunes only in response to grafts that would overfill a mesh.
//!
//! See <https://github.com/libp2p/specs/blob/master/pubsub/gossipsub/gossipsub-v1.0.md>
//! for more information on the protocol.

pub mod mcache;

use std::cell::RefCell;
use std::collections::BTreeSet;
use std::rc::{Rc, Weak};
use std::time::Duration;

use rand::seq::SliceRandom;
use serde::Deserialize;

use crate::pubsub::node::Node;
use crate::pubsub::rpc::{IHave, IWant, Message, MsgId, Rpc};
use crate::router::{Router, RouterError};
use crate::ticker::{TickHandler, Ticker};
use crate::{NodeId, SimRng};

pub use mcache::MessageCache;

/// Default interval between consecutive heartbeats.
pub const DEFAULT_HEARTBEAT_INTERVAL: Duration = Duration::from_secs(60);
/// Default desired degree of the mesh.
pub const DEFAULT_D: usize = 6;
/// Default ideal lower bound on the degree of the mesh.
pub const DEFAULT_D_LOW: usize = 4;
/// Default upper bound on the degree of the mesh.
pub const DEFAULT_D_HIGH: usize = 12;
/// Default number of peers the router gossips to.
pub const DEFAULT_D_LAZY: usize = 6;
/// Default number of heartbeat intervals for which messages stay cached.
pub const DEFAULT_HISTORY_LENGTH: usize = 5;
/// Default number of heartbeat intervals worth of messages to gossip about.
pub const DEFAULT_HISTORY_GOSSIP: usize = 3;

/// Configuration knobs of the mesh+gossip router.
#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct GossipsubConfig {
    /// Interval between consecutive heartbeats. Heartbeats are the triggers
    /// for periodic mesh maintenance and gossip.
    #[serde(with = "humantime_serde")]
    pub heartbeat_interval: Duration,

    /// Desired degree of the mesh. The network is static, so the mesh stays
    /// near this degree (no peer scoring from v1.1).
    #[serde(rename = "D")]
    pub d: usize,

    /// Ideal lower bound on the degree of the mesh.
    #[serde(rename = "Dlow")]
    pub d_low: usize,

    /// Upper bound on the degree of the mesh.
    #[serde(rename = "Dhigh")]
    pub d_high: usize,

    /// Number of peers the router gossips to.
    #[serde(rename = "Dlazy")]
    pub d_lazy: usize,

    /// Number of heartbeat intervals for which the message cache remembers
    /// seen messages.
    pub history_length: usize,

    /// Number of recent heartbeat intervals worth of messages that are
    /// gossipped about.
    pub history_gossip: usize,
}

impl Default for GossipsubConfig {
    fn default() -> Self {
        Self {
            heartbeat_interval: DEFAULT_HEARTBEAT_INTERVAL,
            d: DEFAULT_D,
            d_low: DEFAULT_D_LOW,
            d_high: DEFAULT_D_HIGH,
            d_lazy: DEFAULT_D_LAZY,
            history_length: DEFAULT_HISTORY_LENGTH,
            history_gossip: DEFAULT_HISTORY_GOSSIP,
        }
    }
}

/// Router maintaining a mesh of eager peers and gossipping lazily to the
/// rest of the neighborhood.
pub struct GossipsubRouter {
    cfg: GossipsubConfig,

    rng: SimRng,

    /// Assigned while starting the pubsub node.
    node: RefCell<Weak<Node>>,

    /// Peer IDs currently in the mesh.
    mesh: RefCell<BTreeSet<NodeId>>,

    /// Recently forwarded messages, for gossipping IHaves and answering
    /// IWants.
    mcache: RefCell<MessageCache>,
}

impl GossipsubRouter {
    pub fn new(cfg: GossipsubConfig, rng: SimRng) -> Self {
        let mcache = MessageCache::new(cfg.history_length);
        Self {
            cfg,
            rng,
            node: RefCell::new(Weak::new()),
            mesh: RefCell::new(BTreeSet::new()),
            mcache: RefCell::new(mcache),
        }
    }

    fn node(&self) -> Rc<Node> {
        self.node
            .borrow()
            .upgrade()
            .expect("router should be started before use")
    }

    /// Adds up to D random neighbors to the mesh, sending each a graft.
    ///
    /// NOTE: joining once at startup is enough since the network is static.
    fn join(&self) -> Result<(), RouterError> {
        let cfg = &self.cfg;
        if !(cfg.d_low <= cfg.d && cfg.d <= cfg.d_high) {
            return Err(RouterError::InvalidDegree);
        }

        let node = self.node();
        for neighbor_id in self.random_neighbors(cfg.d, |_| true) {
            node.send_rpc(neighbor_id, Rpc::control(Vec::new(), None, None, true, false));
            self.mesh.borrow_mut().insert(neighbor_id);
        }
        Ok(())
    }

    /// Collects the message IDs announced by `ihave` that are still missing
    /// locally, turning them into a pull request.
    fn handle_ihave(&self, ihave: Option<&IHave>) -> Option<IWant> {
        let ihave = ihave?;
        let node = self.node();
        let missing: BTreeSet<MsgId> = ihave
            .msg_ids
            .iter()
            .copied()
            .filter(|msg_id| !node.seen_msg(msg_id))
            .collect();
        if missing.is_empty() {
            return None;
        }
        Some(IWant { msg_ids: missing })
    }

    /// Fetches the requested messages that are present in the cache.
    fn handle_iwant(&self, iwant: Option<&IWant>) -> Vec<Message> {
        let Some(iwant) = iwant else {
            return Vec::new();
        };
        let mcache = self.mcache.borrow();
        iwant
            .msg_ids
            .iter()
            .filter_map(|msg_id| mcache.get(msg_id))
            .copied()
            .collect()
    }

    /// Accepts the graft unless the mesh is already full. Returns whether to
    /// reply with a prune.
    fn handle_graft(&self, remote_id: NodeId, graft: bool) -> bool {
        if !graft {
            return false;
        }
        let mut mesh = self.mesh.borrow_mut();
        // an already grafted peer is not pruned
        if mesh.contains(&remote_id) {
            return false;
        }
        // cannot accept any more peers
        if mesh.len() >= self.cfg.d_high {
            return true;
        }
        mesh.insert(remote_id);
        false
    }

    fn handle_prune(&self, remote_id: NodeId, prune: bool) {
        if prune {
            self.mesh.borrow_mut().remove(&remote_id);
            // the mesh may now be below Dlow; this is repaired periodically
            // during the heartbeat
        }
    }

    /// Grafts random non-mesh neighbors if the mesh has too few peers.
    /// Returns the set of freshly grafted peers.
    fn fix_mesh(&self) -> BTreeSet<NodeId> {
        let mut to_graft = BTreeSet::new();
        if self.mesh.borrow().len() < self.cfg.d_low {
            // bring the number of peers back up to the ideal value
            let deficit = self.cfg.d - self.mesh.borrow().len();
            for neighbor_id in self.random_neighbors(deficit, |id| !self.in_mesh(id)) {
                to_graft.insert(neighbor_id);
                self.mesh.borrow_mut().insert(neighbor_id);
            }
        }
        to_graft
    }

    /// Picks the lazy gossip targets and the message IDs to announce.
    ///
    /// Peers in the mesh receive no gossip because they already have our
    /// messages.
    fn emit_gossip(&self) -> (Vec<NodeId>, BTreeSet<MsgId>) {
        let lazy = self.random_neighbors(self.cfg.d_lazy, |id| !self.in_mesh(id));
        let gossip = self.mcache.borrow().gossip_ids(self.cfg.history_gossip);
        (lazy, gossip)
    }

    /// Sends the heartbeat control messages: one graft to each freshly
    /// grafted peer, one IHave to each lazy target.
    fn send_heartbeats(&self, to_graft: BTreeSet<NodeId>, lazy: Vec<NodeId>, gossip: BTreeSet<MsgId>) {
        let node = self.node();
        // sending ihaves to freshly grafted peers is not necessary
        for neighbor_id in to_graft {
            node.send_rpc(neighbor_id, Rpc::control(Vec::new(), None, None, true, false));
        }
        for neighbor_id in lazy {
            let ihave = IHave {
                msg_ids: gossip.clone(),
            };
            node.send_rpc(
                neighbor_id,
                Rpc::control(Vec::new(), Some(ihave), None, false, false),
            );
        }
    }

    fn in_mesh(&self, neighbor_id: NodeId) -> bool {
        self.mesh.borrow().contains(&neighbor_id)
    }

    /// Picks up to `count` distinct random neighbors passing `filter`.
    ///
    /// The candidate list is collected in ascending ID order before the
    /// shuffle, keeping the selection reproducible for a fixed seed.
    fn random_neighbors<F: Fn(NodeId) -> bool>(&self, count: usize, filter: F) -> Vec<NodeId> {
        let node = self.node();
        let mut neighbor_ids: Vec<NodeId> = node
            .neighbor_ids()
            .into_iter()
            .filter(|&id| filter(id))
            .collect();
        neighbor_ids.shuffle(&mut *self.rng.borrow_mut());
        neighbor_ids.truncate(count);
        neighbor_ids
    }
}

impl Router for GossipsubRouter {
    fn start(self: Rc<Self>, node: Rc<Node>) -> Result<(), RouterError> {
        if self.cfg.history_gossip > self.cfg.history_length {
            return Err(RouterError::InvalidHistory);
        }

        *self.node.borrow_mut() = Rc::downgrade(&node);

        // add neighbors to the mesh
        self.join()?;

        // start the heartbeat timer
        let interval = self.cfg.heartbeat_interval;
        Ticker::start(node.sched(), interval, self)?;

        Ok(())
    }

    fn publish(&self, src_id: NodeId, msg: Message) {
        self.mcache.borrow_mut().add(msg);

        // publish to all our peers in the mesh
        let targets: Vec<NodeId> = self
            .mesh
            .borrow()
            .iter()
            .copied()
            .filter(|&id| id != src_id && id != msg.from())
            .collect();
        let node = self.node();
        for neighbor_id in targets {
            node.send_rpc(neighbor_id, Rpc::data(msg));
        }
    }

    fn handle_rpc(&self, src_id: NodeId, rpc: &Rpc) {
        let Some(control) = rpc.control_fields() else {
            return;
        };

        let iwant = self.handle_ihave(control.ihave.as_ref());
        let msgs = self.handle_iwant(control.iwant.as_ref());
        let prune = self.handle_graft(src_id, control.graft);
        self.handle_prune(src_id, control.prune);

        if iwant.is_none() && msgs.is_empty() && !prune {
            return;
        }
        let reply = Rpc::control(msgs, None, iwant, false, prune);
        self.node().send_rpc(src_id, reply);
    }
}

impl TickHandler for GossipsubRouter {
    /// Heartbeat: repair the mesh, gossip about recently seen messages and
    /// age the message cache by one window.
    fn on_tick(&self) {
        // the mesh is potentially in a bad state because of too few peers
        let to_graft = self.fix_mesh();

        // NOTE: no need to check whether the peer count is too high, growth
        // beyond Dhigh is rejected on the graft side

        // slow path gossip of cached messages
        let (lazy, gossip) = self.emit_gossip();

        self.send_heartbeats(to_graft, lazy, gossip);

        self.mcache.borrow_mut().shift();
    }

    fn id(&self) -> NodeId {
        self.node().id()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::cell::RefCell;

    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn router(cfg: GossipsubConfig) -> GossipsubRouter {
        let rng = Rc::new(RefCell::new(StdRng::seed_from_u64(42)));
        GossipsubRouter::new(cfg, rng)
    }

    #[test]
    fn graft_respects_mesh_bound() {
        let cfg = GossipsubConfig {
            d_high: 2,
            ..GossipsubConfig::default()
        };
        let r = router(cfg);
        assert!(!r.handle_graft(1, true));
        assert!(!r.handle_graft(2, true));
        // mesh is full now, further grafts are pruned
        assert!(r.handle_graft(3, true));
        // grafting an existing mesh peer never prunes
        assert!(!r.handle_graft(1, true));
        assert_eq!(r.mesh.borrow().len(), 2);
    }

    #[test]
    fn prune_removes_mesh_peer() {
        let r = router(GossipsubConfig::default());
        assert!(!r.handle_graft(7, true));
        assert!(r.in_mesh(7));
        r.handle_prune(7, true);
        assert!(!r.in_mesh(7));
    }

    #[test]
    fn iwant_served_from_cache() {
        let r = router(GossipsubConfig::default());
        let msg = Message::new(1, 5, 100);
        r.mcache.borrow_mut().add(msg);

        let mut wanted = BTreeSet::new();
        wanted.insert(msg.id());
        wanted.insert(MsgId { from: 9, seqno: 9 });
        let served = r.handle_iwant(Some(&IWant { msg_ids: wanted }));
        // only the cached message is returned
        assert_eq!(served, vec![msg]);
    }
}
