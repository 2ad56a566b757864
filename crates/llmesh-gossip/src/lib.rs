//! llmesh-gossip — decentralized cluster membership.
//!
//! Nodes exchange their member tables over UDP at a fixed interval
//! (anti-entropy) and detect failures from heartbeat silence, SWIM style:
//!
//! ```text
//!   Alive ──silence > suspect_timeout──▶ Suspect ──dead_timeout──▶ Dead ─┐
//!     ▲                                     │                            │
//!     └──── owner refutes (incarnation+1) ──┘            tombstone (ttl) ◀┘
//! ```
//!
//! Consumers program against the [`Membership`] trait; [`GossipMembership`]
//! is the UDP implementation.

pub mod config;
pub mod error;
pub mod membership;
pub mod message;
pub mod table;

pub use config::GossipConfig;
pub use error::{GossipError, GossipResult};
pub use membership::{GossipMembership, Member, Membership, MembershipState};
pub use message::{GossipMessage, MemberRecord, MemberState, NodeMeta};
pub use table::{MemberTable, MergeOutcome};
