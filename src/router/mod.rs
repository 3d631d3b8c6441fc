// Copyright (c) Anza Technology, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Pubsub message-routing strategies.
//!
//! Two protocols are implemented:
//! - [`floodsub`]: forward every newly seen message to all neighbors
//! - [`gossipsub`]: eagerly forward along a maintained mesh, lazily gossip
//!   message summaries to the remaining neighbors
//!
//! All send paths are best-effort within a simulation step; the only failure
//! modes are configuration validation at [`Router::start`]. There are no
//! retries and no cancellations. The semantics are defined by the event
//! queue, not by I/O outcomes.

pub mod floodsub;
pub mod gossipsub;

use std::rc::Rc;

use thiserror::Error;

use crate::NodeId;
use crate::pubsub::node::Node;
use crate::pubsub::rpc::{Message, Rpc};
use crate::ticker::TickerError;

pub use floodsub::FloodsubRouter;
pub use gossipsub::{GossipsubConfig, GossipsubRouter};

/// Errors that may occur when starting a router.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
pub enum RouterError {
    #[error("configured degrees do not follow the required constraints")]
    InvalidDegree,
    #[error("configured the message cache incorrectly")]
    InvalidHistory,
    #[error(transparent)]
    Ticker(#[from] TickerError),
}

/// Abstraction of a message-routing protocol.
pub trait Router {
    /// Called once after the node is fully wired, to install tickers and
    /// finalize the initial routing state.
    ///
    /// # Errors
    ///
    /// Fails if the router configuration violates its constraints.
    fn start(self: Rc<Self>, node: Rc<Node>) -> Result<(), RouterError>;

    /// Forwards a message that the node has just accepted as newly seen.
    ///
    /// Implementations must exclude the message originator and `src_id` (the
    /// immediate sender) from the forwarding targets.
    fn publish(&self, src_id: NodeId, msg: Message);

    /// Delivers an inbound RPC for control-plane processing. Carried
    /// messages have already been filtered through the node's seen cache.
    fn handle_rpc(&self, src_id: NodeId, rpc: &Rpc);
}
