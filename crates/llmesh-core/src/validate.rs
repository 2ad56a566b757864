//! Input validation shared by membership construction and RPC handlers.

use crate::error::{CoreError, CoreResult};

/// A node id must be non-empty and free of control characters
/// (newline, carriage return, tab, ...).
pub fn validate_node_id(node_id: &str) -> CoreResult<()> {
    if node_id.is_empty() {
        return Err(CoreError::Validation("node ID cannot be empty".to_string()));
    }
    if node_id.chars().any(char::is_control) {
        return Err(CoreError::Validation(
            "node ID cannot contain newlines, tabs, or other control characters".to_string(),
        ));
    }
    Ok(())
}

/// Ports must lie in `1..=65535`.
pub fn validate_port(label: &str, port: u32) -> CoreResult<u16> {
    if port == 0 || port > u16::MAX as u32 {
        return Err(CoreError::Validation(format!("invalid {label} port: {port}")));
    }
    Ok(port as u16)
}

/// Validate a bind/gossip port pair: both in range and distinct.
pub fn validate_port_pair(bind_port: u32, gossip_port: u32) -> CoreResult<(u16, u16)> {
    let bind = validate_port("bind", bind_port)?;
    let gossip = validate_port("gossip", gossip_port)?;
    if bind == gossip {
        return Err(CoreError::Validation(format!(
            "bind port and gossip port cannot be the same: {bind}"
        )));
    }
    Ok((bind, gossip))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn node_id_rules() {
        assert!(validate_node_id("node-1").is_ok());
        assert!(validate_node_id("node with spaces").is_ok());
        assert!(validate_node_id("").is_err());
        assert!(validate_node_id("bad\nid").is_err());
        assert!(validate_node_id("bad\rid").is_err());
        assert!(validate_node_id("bad\tid").is_err());
        assert!(validate_node_id("bad\u{7}id").is_err());
    }

    #[test]
    fn port_range() {
        assert_eq!(validate_port("bind", 1).unwrap(), 1);
        assert_eq!(validate_port("bind", 65535).unwrap(), 65535);
        assert!(validate_port("bind", 0).is_err());
        assert!(validate_port("bind", 65536).is_err());
    }

    #[test]
    fn port_pair_must_differ() {
        assert!(validate_port_pair(8080, 7946).is_ok());
        let err = validate_port_pair(8080, 8080).unwrap_err();
        assert!(err.to_string().contains("cannot be the same"));
    }
}
