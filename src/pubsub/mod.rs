// Copyright (c) Anza Technology, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Pubsub node abstraction and the virtual network connecting nodes.
//!
//! All nodes participate in a single implicit topic. Peer identities are not
//! verified with signatures since this is a simulation.

pub mod collector;
pub mod network;
pub mod node;
pub mod rpc;
pub mod seen;

pub use collector::StatCollector;
pub use network::{MuxLink, Network, RpcHandler};
pub use node::Node;
pub use rpc::{Control, IHave, IWant, Message, MsgId, Rpc};
pub use seen::SeenCache;
