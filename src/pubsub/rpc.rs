// Copyright (c) Anza Technology, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Wire-level data model exchanged between simulated nodes.
//!
//! The closest parallel is the RPC protocol buffer described in libp2p
//! pubsub: a carrier of zero or more messages plus optional control fields.
//! Sizes are declared, not serialized; the statistics collector charges
//! packet and byte counts based on the declared size.

use std::collections::BTreeSet;

use crate::{NodeId, Seqno};

/// Byte-size charge per announced or requested message ID.
const MSG_ID_SIZE: u64 = 8;

/// Stable identity of a message across forwards.
///
/// The default message ID function: the combination of originator and
/// sequence number. The seqno corresponds to the originator of the message,
/// not the forwarder.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MsgId {
    pub from: NodeId,
    pub seqno: Seqno,
}

/// An application message, identified by `(from, seqno)` forever.
///
/// Forwarding never changes identity. Only the declared payload size is
/// carried; the simulation has no use for actual payload bytes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Message {
    from: NodeId,
    seqno: Seqno,
    size: u64,
}

impl Message {
    pub const fn new(from: NodeId, seqno: Seqno, size: u64) -> Self {
        Self { from, seqno, size }
    }

    /// Originator node of this message.
    pub fn from(&self) -> NodeId {
        self.from
    }

    /// Sequence number assigned by the originator.
    pub fn seqno(&self) -> Seqno {
        self.seqno
    }

    /// Declared payload size in bytes.
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Deduplication and statistics key of this message.
    pub fn id(&self) -> MsgId {
        MsgId {
            from: self.from,
            seqno: self.seqno,
        }
    }
}

/// Lazy announcement of message IDs available for pull.
#[derive(Clone, Debug, Default)]
pub struct IHave {
    pub msg_ids: BTreeSet<MsgId>,
}

/// Pull request for message IDs missed on the fast path.
#[derive(Clone, Debug, Default)]
pub struct IWant {
    pub msg_ids: BTreeSet<MsgId>,
}

/// Optional control fields of an RPC.
///
/// Graft and prune are mesh-membership markers and carry no payload of their
/// own; each is charged one byte.
#[derive(Clone, Debug, Default)]
pub struct Control {
    pub ihave: Option<IHave>,
    pub iwant: Option<IWant>,
    pub graft: bool,
    pub prune: bool,
}

/// A carrier exchanged between nodes: a list of messages, optional control
/// fields and a declared byte size.
#[derive(Clone, Debug)]
pub struct Rpc {
    size: u64,
    msgs: Vec<Message>,
    control: Option<Control>,
}

impl Rpc {
    /// Wraps a single message into a data RPC.
    pub fn data(msg: Message) -> Self {
        Self {
            size: msg.size(),
            msgs: vec![msg],
            control: None,
        }
    }

    /// Builds a control RPC, charging one byte per graft/prune marker and
    /// eight bytes per announced or requested message ID, on top of the
    /// payload sizes of any carried messages.
    pub fn control(
        msgs: Vec<Message>,
        ihave: Option<IHave>,
        iwant: Option<IWant>,
        graft: bool,
        prune: bool,
    ) -> Self {
        let mut size: u64 = msgs.iter().map(Message::size).sum();
        if let Some(ihave) = &ihave {
            size += ihave.msg_ids.len() as u64 * MSG_ID_SIZE;
        }
        if let Some(iwant) = &iwant {
            size += iwant.msg_ids.len() as u64 * MSG_ID_SIZE;
        }
        if graft {
            size += 1;
        }
        if prune {
            size += 1;
        }
        Self {
            size,
            msgs,
            control: Some(Control {
                ihave,
                iwant,
                graft,
                prune,
            }),
        }
    }

    /// Declared size of this RPC in bytes.
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Messages carried by this RPC.
    pub fn messages(&self) -> &[Message] {
        &self.msgs
    }

    /// Control fields carried by this RPC, if any.
    pub fn control_fields(&self) -> Option<&Control> {
        self.control.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_rpc_size() {
        let msg = Message::new(3, 7, 1000);
        let rpc = Rpc::data(msg);
        assert_eq!(rpc.size(), 1000);
        assert_eq!(rpc.messages(), &[msg]);
        assert!(rpc.control_fields().is_none());
    }

    #[test]
    fn control_rpc_size() {
        let ids: BTreeSet<MsgId> = [MsgId { from: 1, seqno: 2 }, MsgId { from: 3, seqno: 4 }]
            .into_iter()
            .collect();
        let rpc = Rpc::control(
            vec![Message::new(5, 6, 100)],
            Some(IHave {
                msg_ids: ids.clone(),
            }),
            Some(IWant { msg_ids: ids }),
            true,
            true,
        );
        // 100 payload + 2*8 ihave + 2*8 iwant + 1 graft + 1 prune
        assert_eq!(rpc.size(), 134);
    }
}
