// Copyright (c) Anza Technology, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Flooding baseline router.
//!
//! Every newly seen message is forwarded to all neighbors except the sender
//! and the originator. There is no control plane and no heartbeat.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use crate::NodeId;
use crate::pubsub::node::Node;
use crate::pubsub::rpc::{Message, Rpc};
use crate::router::{Router, RouterError};

/// Router that floods every message to the whole neighborhood.
pub struct FloodsubRouter {
    /// Assigned while starting the pubsub node.
    node: RefCell<Weak<Node>>,
}

impl FloodsubRouter {
    pub fn new() -> Self {
        Self {
            node: RefCell::new(Weak::new()),
        }
    }

    fn node(&self) -> Rc<Node> {
        self.node
            .borrow()
            .upgrade()
            .expect("router should be started before use")
    }
}

impl Default for FloodsubRouter {
    fn default() -> Self {
        Self::new()
    }
}

impl Router for FloodsubRouter {
    fn start(self: Rc<Self>, node: Rc<Node>) -> Result<(), RouterError> {
        *self.node.borrow_mut() = Rc::downgrade(&node);
        // no heartbeats registered in floodsub
        Ok(())
    }

    fn publish(&self, src_id: NodeId, msg: Message) {
        let node = self.node();
        for neighbor_id in node.neighbor_ids() {
            // do not send the message back or to its originator
            if neighbor_id != msg.from() && neighbor_id != src_id {
                node.send_rpc(neighbor_id, Rpc::data(msg));
            }
        }
    }

    fn handle_rpc(&self, _src_id: NodeId, _rpc: &Rpc) {}
}
