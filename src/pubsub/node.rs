// Copyright (c) Anza Technology, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Per-node pubsub state and plumbing.
//!
//! A node gates every inbound message through its seen cache and hands newly
//! observed messages to its router strategy for forwarding. Apart from
//! handling messages, nodes also generate new blocks when triggered by the
//! block oracle.

use std::cell::{Cell, RefCell};
use std::collections::BTreeSet;
use std::rc::Rc;
use std::time::Duration;

use crate::oracle::{BlockOracle, BlockPublisher};
use crate::pubsub::network::{MuxLink, Network, RpcHandler};
use crate::pubsub::rpc::{Message, MsgId, Rpc};
use crate::pubsub::seen::SeenCache;
use crate::router::{Router, RouterError};
use crate::sched::Scheduler;
use crate::{NodeId, Seqno};

/// Size of a block message in bytes.
pub const BLOCK_SIZE: u64 = 48 * 1024;

/// A single pubsub participant.
///
/// Owns its seen cache, neighbor set and router strategy. Created once at
/// driver startup and never destroyed.
pub struct Node {
    sched: Rc<Scheduler>,
    router: Rc<dyn Router>,
    neighbor_ids: RefCell<BTreeSet<NodeId>>,
    seen_msgs: RefCell<SeenCache>,
    local_id: NodeId,
    link: RefCell<Option<MuxLink>>,
    next_seqno: Cell<Seqno>,
}

impl Node {
    /// Creates a node, registering it as a block publisher with the oracle
    /// and as an RPC handler with the network.
    pub fn spawn(
        sched: Rc<Scheduler>,
        net: &Rc<Network>,
        oracle: &BlockOracle,
        seen_ttl: Duration,
        router: Rc<dyn Router>,
        local_id: NodeId,
    ) -> Rc<Self> {
        let node = Rc::new(Self {
            sched,
            router,
            neighbor_ids: RefCell::new(BTreeSet::new()),
            seen_msgs: RefCell::new(SeenCache::new(seen_ttl)),
            local_id,
            link: RefCell::new(None),
            next_seqno: Cell::new(0),
        });

        // register ourselves as miner/block publisher
        oracle.add_publisher(Rc::clone(&node) as Rc<dyn BlockPublisher>);

        // add the local node to the network
        let link = net.add_node(local_id, Rc::clone(&node) as Rc<dyn RpcHandler>);
        *node.link.borrow_mut() = Some(link);

        node
    }

    /// Starts the node's router. Called once, after all neighbors are wired.
    pub fn start(self: &Rc<Self>) -> Result<(), RouterError> {
        Rc::clone(&self.router).start(Rc::clone(self))
    }

    /// Records `remote_id` as a neighbor.
    pub fn add_peer(&self, remote_id: NodeId) {
        self.neighbor_ids.borrow_mut().insert(remote_id);
    }

    /// ID of this node.
    pub fn id(&self) -> NodeId {
        self.local_id
    }

    /// Scheduler driving this node's simulation.
    pub fn sched(&self) -> &Rc<Scheduler> {
        &self.sched
    }

    /// Returns all neighbor IDs in ascending order.
    pub fn neighbor_ids(&self) -> Vec<NodeId> {
        self.neighbor_ids.borrow().iter().copied().collect()
    }

    /// Whether the given message was already observed by this node.
    pub fn seen_msg(&self, msg_id: &MsgId) -> bool {
        self.seen_msgs.borrow().seen(msg_id)
    }

    /// Sends an RPC to the given neighbor over the network link.
    pub fn send_rpc(&self, remote_id: NodeId, rpc: Rpc) {
        if let Some(link) = &*self.link.borrow() {
            link.send_rpc(remote_id, rpc);
        }
    }
}

impl RpcHandler for Node {
    /// Inbound path: gate every carried message through the seen cache and
    /// forward first observations through the router, then hand the RPC to
    /// the router for control-plane processing.
    fn handle_rpc(&self, src_id: NodeId, rpc: &Rpc) {
        for msg in rpc.messages() {
            let newly_seen = self
                .seen_msgs
                .borrow_mut()
                .mark_seen(msg.id(), self.sched.now());
            if newly_seen {
                self.router.publish(src_id, *msg);
            }
        }
        self.router.handle_rpc(src_id, rpc);
    }
}

impl BlockPublisher for Node {
    /// Publishes a block originated by this node.
    ///
    /// Since the message is generated locally, the source ID passed to the
    /// router has little meaning. The local node intentionally does not mark
    /// its own block as seen; only forwarders populate their seen caches.
    fn publish_new_block(&self) {
        let seqno = self.next_seqno.get() + 1;
        self.next_seqno.set(seqno);
        let block = Message::new(self.local_id, seqno, BLOCK_SIZE);
        self.router.publish(self.local_id, block);
    }

    fn id(&self) -> NodeId {
        self.local_id
    }
}
