//! Member table and merge rules.
//!
//! Pure state, no I/O: the UDP loop feeds records in and acts on the
//! returned [`MergeOutcome`]s. Time is passed in explicitly.
//!
//! Conflict resolution per member:
//! - higher incarnation wins;
//! - at equal incarnation the more severe state wins (Alive < Suspect < Dead/Left);
//! - at equal incarnation a higher heartbeat only refreshes liveness.
//!
//! Dead and Left members move to a tombstone set so stale gossip cannot
//! bring them back at an old incarnation.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::{Duration, Instant};

use rand::Rng;
use rand::seq::IteratorRandom;

use crate::message::{MemberRecord, MemberState, NodeMeta};

/// What a merge or tick did to the table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
    /// A previously unknown member entered the live view.
    Joined,
    /// A live member changed incarnation, metadata, or recovered from suspicion.
    Updated,
    /// A live member became suspect.
    Suspected,
    /// A member was declared dead or announced its departure.
    Left,
    /// Gossip claimed the local node was suspect/dead; local incarnation bumped.
    Refuted,
    /// Nothing visible changed.
    Unchanged,
}

#[derive(Debug, Clone)]
struct Entry {
    record: MemberRecord,
    last_heard: Instant,
    state_since: Instant,
}

#[derive(Debug)]
pub struct MemberTable {
    local: MemberRecord,
    peers: HashMap<String, Entry>,
    tombstones: HashMap<String, (MemberRecord, Instant)>,
}

impl MemberTable {
    pub fn new(local: MemberRecord) -> Self {
        Self {
            local,
            peers: HashMap::new(),
            tombstones: HashMap::new(),
        }
    }

    pub fn local(&self) -> &MemberRecord {
        &self.local
    }

    /// Record the address the gossip socket actually bound to.
    pub fn set_local_addr(&mut self, addr: SocketAddr) {
        self.local.addr = addr;
    }

    /// Advance the local heartbeat. Called once per gossip round.
    pub fn beat(&mut self) {
        self.local.heartbeat += 1;
    }

    /// Replace local metadata; bumps the incarnation so peers see an update.
    pub fn update_local_meta(&mut self, meta: NodeMeta) {
        self.local.meta = meta;
        self.local.incarnation += 1;
    }

    /// Mark the local node as leaving and return the record to announce.
    pub fn mark_local_left(&mut self) -> MemberRecord {
        if self.local.state != MemberState::Left {
            self.local.state = MemberState::Left;
            self.local.incarnation += 1;
        }
        self.local.clone()
    }

    /// Drop any tombstone for `name`. Used when the member contacts us
    /// directly with a join request after a restart.
    pub fn forget_tombstone(&mut self, name: &str) {
        self.tombstones.remove(name);
    }

    /// Merge one record learned from the network.
    pub fn merge(&mut self, incoming: MemberRecord, now: Instant) -> MergeOutcome {
        if incoming.name == self.local.name {
            return self.merge_self(&incoming);
        }

        if let Some((tomb, _)) = self.tombstones.get(&incoming.name) {
            if incoming.incarnation <= tomb.incarnation {
                return MergeOutcome::Unchanged;
            }
            if !incoming.state.is_live() {
                self.tombstones
                    .insert(incoming.name.clone(), (incoming, now));
                return MergeOutcome::Unchanged;
            }
            self.tombstones.remove(&incoming.name);
        }

        let Some(entry) = self.peers.get_mut(&incoming.name) else {
            if incoming.state.is_live() {
                self.peers.insert(
                    incoming.name.clone(),
                    Entry {
                        record: incoming,
                        last_heard: now,
                        state_since: now,
                    },
                );
                return MergeOutcome::Joined;
            }
            self.tombstones
                .insert(incoming.name.clone(), (incoming, now));
            return MergeOutcome::Unchanged;
        };

        let current_inc = entry.record.incarnation;
        let current_state = entry.record.state;
        let supersedes = incoming.incarnation > current_inc
            || (incoming.incarnation == current_inc
                && incoming.state.severity() > current_state.severity());

        if !supersedes {
            if incoming.incarnation == current_inc && incoming.heartbeat > entry.record.heartbeat {
                entry.record.heartbeat = incoming.heartbeat;
                entry.last_heard = now;
            }
            return MergeOutcome::Unchanged;
        }

        if !incoming.state.is_live() {
            self.peers.remove(&incoming.name);
            self.tombstones
                .insert(incoming.name.clone(), (incoming, now));
            return MergeOutcome::Left;
        }

        let outcome = if incoming.state == MemberState::Suspect && current_state == MemberState::Alive {
            MergeOutcome::Suspected
        } else {
            MergeOutcome::Updated
        };
        if incoming.state != current_state {
            entry.state_since = now;
        }
        if incoming.state == MemberState::Alive {
            entry.last_heard = now;
        }
        entry.record = incoming;
        outcome
    }

    fn merge_self(&mut self, incoming: &MemberRecord) -> MergeOutcome {
        if self.local.state == MemberState::Left {
            return MergeOutcome::Unchanged;
        }
        let disputed = incoming.incarnation > self.local.incarnation
            || (incoming.incarnation == self.local.incarnation
                && incoming.state != MemberState::Alive);
        if disputed {
            self.local.incarnation = incoming.incarnation + 1;
            return MergeOutcome::Refuted;
        }
        MergeOutcome::Unchanged
    }

    /// Run failure detection. Returns every member whose state changed.
    pub fn tick(
        &mut self,
        now: Instant,
        suspect_after: Duration,
        dead_after: Duration,
    ) -> Vec<(String, MergeOutcome)> {
        let mut changes = Vec::new();
        let mut dead = Vec::new();

        for (name, entry) in self.peers.iter_mut() {
            let silent = now.saturating_duration_since(entry.last_heard);
            match entry.record.state {
                MemberState::Alive if silent >= suspect_after => {
                    entry.record.state = MemberState::Suspect;
                    entry.state_since = now;
                    changes.push((name.clone(), MergeOutcome::Suspected));
                }
                MemberState::Suspect
                    if silent >= suspect_after
                        && now.saturating_duration_since(entry.state_since) >= dead_after =>
                {
                    dead.push(name.clone());
                }
                _ => {}
            }
        }

        for name in dead {
            if let Some(mut entry) = self.peers.remove(&name) {
                entry.record.state = MemberState::Dead;
                self.tombstones.insert(name.clone(), (entry.record, now));
                changes.push((name, MergeOutcome::Left));
            }
        }
        changes
    }

    /// Forget tombstones older than `ttl`. Returns how many were dropped.
    pub fn purge_tombstones(&mut self, now: Instant, ttl: Duration) -> usize {
        let before = self.tombstones.len();
        self.tombstones
            .retain(|_, (_, since)| now.saturating_duration_since(*since) < ttl);
        before - self.tombstones.len()
    }

    /// Live members, local node first, then peers ordered by name.
    pub fn live_records(&self) -> Vec<MemberRecord> {
        let mut peers: Vec<MemberRecord> = self.peers.values().map(|e| e.record.clone()).collect();
        peers.sort_by(|a, b| a.name.cmp(&b.name));

        let mut out = Vec::with_capacity(peers.len() + 1);
        if self.local.state.is_live() {
            out.push(self.local.clone());
        }
        out.extend(peers);
        out
    }

    /// When the member was last heard from, directly or through gossip.
    pub fn last_heard(&self, name: &str) -> Option<Instant> {
        self.peers.get(name).map(|e| e.last_heard)
    }

    /// Everything worth telling a peer: self, live peers, and tombstones.
    pub fn gossip_payload(&self) -> Vec<MemberRecord> {
        let mut out = Vec::with_capacity(1 + self.peers.len() + self.tombstones.len());
        out.push(self.local.clone());
        out.extend(self.peers.values().map(|e| e.record.clone()));
        out.extend(self.tombstones.values().map(|(r, _)| r.clone()));
        out
    }

    /// Gossip addresses of every live peer.
    pub fn peer_addrs(&self) -> Vec<SocketAddr> {
        self.peers.values().map(|e| e.record.addr).collect()
    }

    /// Up to `n` distinct live peers chosen at random.
    pub fn random_peers<R: Rng + ?Sized>(&self, n: usize, rng: &mut R) -> Vec<SocketAddr> {
        self.peers
            .values()
            .map(|e| e.record.addr)
            .choose_multiple(rng, n)
    }

    /// Live member count including the local node.
    pub fn live_count(&self) -> usize {
        self.peers.len() + usize::from(self.local.state.is_live())
    }

    pub fn tombstone_count(&self) -> usize {
        self.tombstones.len()
    }
}
