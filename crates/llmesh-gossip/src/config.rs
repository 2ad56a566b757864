//! Gossip tuning knobs.

use std::net::{IpAddr, Ipv4Addr};
use std::time::Duration;

use llmesh_core::{validate_node_id, validate_port_pair};

use crate::error::GossipResult;

/// Configuration for a [`GossipMembership`](crate::GossipMembership).
#[derive(Debug, Clone)]
pub struct GossipConfig {
    /// Unique member name.
    pub node_id: String,
    /// Port the node's RPC server listens on, advertised to peers.
    pub bind_port: u16,
    /// UDP port for gossip traffic.
    pub gossip_port: u16,
    /// Interface the gossip socket binds to.
    pub bind_addr: IpAddr,
    /// How often the table is pushed to random peers.
    pub gossip_interval: Duration,
    /// Number of peers each push goes to.
    pub fanout: usize,
    /// Silence after which an alive peer becomes suspect.
    pub suspect_timeout: Duration,
    /// Time a peer may stay suspect before it is declared dead.
    pub dead_timeout: Duration,
    /// How long dead/left records are remembered.
    pub tombstone_ttl: Duration,
    /// Deadline for a seed to answer a join request.
    pub join_timeout: Duration,
}

impl GossipConfig {
    /// Build a config with default timings after validating the identity
    /// and port pair.
    pub fn new(node_id: impl Into<String>, bind_port: u32, gossip_port: u32) -> GossipResult<Self> {
        let node_id = node_id.into();
        validate_node_id(&node_id)?;
        let (bind_port, gossip_port) = validate_port_pair(bind_port, gossip_port)?;
        Ok(Self {
            node_id,
            bind_port,
            gossip_port,
            bind_addr: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            gossip_interval: Duration::from_secs(1),
            fanout: 3,
            suspect_timeout: Duration::from_secs(5),
            dead_timeout: Duration::from_secs(10),
            tombstone_ttl: Duration::from_secs(30),
            join_timeout: Duration::from_secs(5),
        })
    }

    pub fn with_bind_addr(mut self, addr: IpAddr) -> Self {
        self.bind_addr = addr;
        self
    }

    pub fn with_gossip_interval(mut self, interval: Duration) -> Self {
        self.gossip_interval = interval;
        self
    }

    pub fn with_fanout(mut self, fanout: usize) -> Self {
        self.fanout = fanout.max(1);
        self
    }

    /// Set the suspect and dead timeouts together.
    pub fn with_failure_timeouts(mut self, suspect: Duration, dead: Duration) -> Self {
        self.suspect_timeout = suspect;
        self.dead_timeout = dead;
        self
    }

    pub fn with_tombstone_ttl(mut self, ttl: Duration) -> Self {
        self.tombstone_ttl = ttl;
        self
    }

    pub fn with_join_timeout(mut self, timeout: Duration) -> Self {
        self.join_timeout = timeout;
        self
    }

    /// Re-run the construction checks, for configs built by hand.
    pub fn validate(&self) -> GossipResult<()> {
        validate_node_id(&self.node_id)?;
        validate_port_pair(self.bind_port as u32, self.gossip_port as u32)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GossipError;

    #[test]
    fn defaults() {
        let config = GossipConfig::new("node-1", 8080, 7946).unwrap();
        assert_eq!(config.gossip_interval, Duration::from_secs(1));
        assert_eq!(config.fanout, 3);
        assert_eq!(config.suspect_timeout, Duration::from_secs(5));
        assert_eq!(config.dead_timeout, Duration::from_secs(10));
    }

    #[test]
    fn rejects_bad_identity() {
        for (id, bind, gossip) in [
            ("", 8080, 7946),
            ("a\nb", 8080, 7946),
            ("a\rb", 8080, 7946),
            ("a\tb", 8080, 7946),
            ("node", 0, 7946),
            ("node", 8080, 70000),
            ("node", 8080, 8080),
        ] {
            let err = GossipConfig::new(id, bind, gossip).unwrap_err();
            assert!(matches!(err, GossipError::Validation(_)), "{id:?} {bind} {gossip}");
        }
    }

    #[test]
    fn fanout_never_zero() {
        let config = GossipConfig::new("n", 1, 2).unwrap().with_fanout(0);
        assert_eq!(config.fanout, 1);
    }

    #[test]
    fn hand_built_config_is_revalidated() {
        let mut config = GossipConfig::new("n", 1, 2).unwrap();
        config.gossip_port = 1;
        assert!(config.validate().is_err());
    }
}
