//! Textual form of cluster states and bundles.
//!
//! The same representation is carried inside encoded bundles, so printing
//! must be canonical: default-valued items are omitted and node overrides
//! are written in ascending index order.

use super::types::*;
use crate::error::StateError;
use std::fmt;
use std::str::FromStr;

impl fmt::Display for ClusterState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "version:{}", self.version)?;
        if self.state != State::Up {
            write!(f, " cluster:{}", self.state.code())?;
        }
        if self.distribution_bits != DEFAULT_DISTRIBUTION_BITS {
            write!(f, " bits:{}", self.distribution_bits)?;
        }
        for node_type in [NodeType::Distributor, NodeType::Storage] {
            let nodes = self.nodes(node_type);
            if nodes.count() == 0 {
                continue;
            }
            write!(f, " {}:{}", node_type.as_str(), nodes.count())?;
            for (index, state) in nodes.overrides() {
                write!(f, " .{}.s:{}", index, state.code())?;
            }
        }
        Ok(())
    }
}

impl FromStr for ClusterState {
    type Err = StateError;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        let mut cluster = ClusterState::new(0, 0, 0);
        let mut current: Option<NodeType> = None;
        let mut seen_types: Vec<NodeType> = Vec::with_capacity(2);

        for token in text.split_whitespace() {
            if let Some(rest) = token.strip_prefix('.') {
                let node_type = current.ok_or_else(|| invalid(token, "node state before node count"))?;
                let (index, rest) = rest
                    .split_once('.')
                    .ok_or_else(|| invalid(token, "expected .<index>.<key>:<value>"))?;
                let index: u16 = index
                    .parse()
                    .map_err(|_| invalid(token, "node index is not a number"))?;
                let (key, value) = rest
                    .split_once(':')
                    .ok_or_else(|| invalid(token, "missing ':'"))?;
                if key != "s" {
                    return Err(invalid(token, "unknown node key"));
                }
                let state =
                    State::from_code(value).ok_or_else(|| invalid(token, "unknown state code"))?;
                cluster.set_node_state(node_type, index, state)?;
                continue;
            }

            let (key, value) = token
                .split_once(':')
                .ok_or_else(|| invalid(token, "missing ':'"))?;
            match key {
                "version" => {
                    cluster.version = value
                        .parse()
                        .map_err(|_| invalid(token, "version is not a number"))?;
                }
                "cluster" => {
                    let state =
                        State::from_code(value).ok_or_else(|| invalid(token, "unknown state code"))?;
                    cluster = cluster.with_cluster_state(state)?;
                }
                "bits" => {
                    let bits: u8 = value
                        .parse()
                        .map_err(|_| invalid(token, "bits is not a number"))?;
                    cluster = cluster.with_distribution_bits(bits)?;
                }
                "distributor" | "storage" => {
                    let node_type = if key == "distributor" {
                        NodeType::Distributor
                    } else {
                        NodeType::Storage
                    };
                    if seen_types.contains(&node_type) {
                        return Err(invalid(token, "node count declared twice"));
                    }
                    seen_types.push(node_type);
                    let count: u16 = value
                        .parse()
                        .map_err(|_| invalid(token, "node count is not a number"))?;
                    cluster.set_node_count(node_type, count);
                    current = Some(node_type);
                }
                _ => return Err(invalid(token, "unknown key")),
            }
        }

        Ok(cluster)
    }
}

fn invalid(token: &str, reason: &str) -> StateError {
    StateError::InvalidToken {
        token: token.to_string(),
        reason: reason.to_string(),
    }
}

impl fmt::Display for StateBundle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ClusterStateBundle('{}'", self.baseline())?;
        for (space, state) in self.spaced_states() {
            write!(f, ", {} '{}'", space, state)?;
        }
        if self.deferred_activation() {
            write!(f, " (deferred activation)")?;
        }
        if let Some(block) = self.feed_block()
            && block.blocked
        {
            write!(f, ", feed blocked: '{}'", block.description)?;
        }
        write!(f, ")")
    }
}
