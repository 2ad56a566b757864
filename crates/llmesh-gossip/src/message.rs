//! Gossip wire format: JSON datagrams over UDP.

use std::net::SocketAddr;

use serde::{Deserialize, Serialize};

use llmesh_core::{NodeStatus, ResourceInfo};

use crate::error::GossipResult;

/// Largest payload a single UDP datagram can carry.
pub const MAX_DATAGRAM: usize = 65_507;

/// Liveness state of a member as seen by the gossip layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemberState {
    Alive,
    Suspect,
    Dead,
    Left,
}

impl MemberState {
    /// Ordering used to settle conflicts at equal incarnation.
    pub fn severity(self) -> u8 {
        match self {
            MemberState::Alive => 0,
            MemberState::Suspect => 1,
            MemberState::Dead | MemberState::Left => 2,
        }
    }

    /// Whether the member still appears in the live view.
    pub fn is_live(self) -> bool {
        matches!(self, MemberState::Alive | MemberState::Suspect)
    }
}

/// Application metadata a member attaches to its record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct NodeMeta {
    pub resources: ResourceInfo,
    pub status: NodeStatus,
}

/// One member as carried in gossip messages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemberRecord {
    pub name: String,
    /// Gossip (UDP) address.
    pub addr: SocketAddr,
    pub rpc_port: u16,
    pub meta: NodeMeta,
    pub incarnation: u64,
    /// Advanced by the owner every gossip round.
    pub heartbeat: u64,
    pub state: MemberState,
}

/// A single datagram. Every variant carries the sender's own record.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GossipMessage {
    Ping { from: MemberRecord, seq: u64 },
    Ack { from: MemberRecord, seq: u64 },
    Join { from: MemberRecord },
    JoinAck { from: MemberRecord, members: Vec<MemberRecord> },
    Gossip { from: MemberRecord, members: Vec<MemberRecord> },
}

impl GossipMessage {
    pub fn sender(&self) -> &MemberRecord {
        match self {
            GossipMessage::Ping { from, .. }
            | GossipMessage::Ack { from, .. }
            | GossipMessage::Join { from }
            | GossipMessage::JoinAck { from, .. }
            | GossipMessage::Gossip { from, .. } => from,
        }
    }

    pub fn sender_mut(&mut self) -> &mut MemberRecord {
        match self {
            GossipMessage::Ping { from, .. }
            | GossipMessage::Ack { from, .. }
            | GossipMessage::Join { from }
            | GossipMessage::JoinAck { from, .. }
            | GossipMessage::Gossip { from, .. } => from,
        }
    }

    /// Short label for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            GossipMessage::Ping { .. } => "ping",
            GossipMessage::Ack { .. } => "ack",
            GossipMessage::Join { .. } => "join_request",
            GossipMessage::JoinAck { .. } => "join_ack",
            GossipMessage::Gossip { .. } => "gossip",
        }
    }

    pub fn encode(&self) -> GossipResult<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn decode(bytes: &[u8]) -> GossipResult<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }
}
