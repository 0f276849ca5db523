use crate::error::StateError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Default number of bucket distribution bits announced by a cluster state.
pub const DEFAULT_DISTRIBUTION_BITS: u8 = 16;

/// Largest distribution bit count a cluster state can announce.
pub const MAX_DISTRIBUTION_BITS: u8 = 64;

/// Health of a single node, or of the cluster as a whole.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum State {
    Up,
    Down,
    Maintenance,
    Retired,
    Initializing,
    Stopping,
}

impl State {
    /// Single-letter code used in the textual form.
    pub fn code(self) -> char {
        match self {
            State::Up => 'u',
            State::Down => 'd',
            State::Maintenance => 'm',
            State::Retired => 'r',
            State::Initializing => 'i',
            State::Stopping => 's',
        }
    }

    pub fn from_code(code: &str) -> Option<State> {
        match code {
            "u" => Some(State::Up),
            "d" => Some(State::Down),
            "m" => Some(State::Maintenance),
            "r" => Some(State::Retired),
            "i" => Some(State::Initializing),
            "s" => Some(State::Stopping),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum NodeType {
    Distributor,
    Storage,
}

impl NodeType {
    pub fn as_str(self) -> &'static str {
        match self {
            NodeType::Distributor => "distributor",
            NodeType::Storage => "storage",
        }
    }
}

/// Node count for one node type plus the nodes that are not `Up`.
///
/// Nodes without an override are implicitly `Up`. An `Up` override is never
/// stored, so two descriptions of the same health compare equal.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NodeStates {
    count: u16,
    overrides: BTreeMap<u16, State>,
}

impl NodeStates {
    pub fn count(&self) -> u16 {
        self.count
    }

    pub fn get(&self, index: u16) -> Option<State> {
        if index >= self.count {
            return None;
        }
        Some(self.overrides.get(&index).copied().unwrap_or(State::Up))
    }

    /// Non-`Up` nodes in ascending index order.
    pub fn overrides(&self) -> impl Iterator<Item = (u16, State)> + '_ {
        self.overrides.iter().map(|(index, state)| (*index, *state))
    }

    fn set(&mut self, node_type: NodeType, index: u16, state: State) -> Result<(), StateError> {
        if index >= self.count {
            return Err(StateError::NodeIndexOutOfRange {
                node_type: node_type.as_str(),
                index,
                count: self.count,
            });
        }
        if state == State::Up {
            self.overrides.remove(&index);
        } else {
            self.overrides.insert(index, state);
        }
        Ok(())
    }
}

/// One versioned description of which nodes are up or down.
///
/// Printed and parsed in the textual form
/// `version:3 distributor:4 .1.s:d storage:4 .0.s:m`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterState {
    pub(super) version: u32,
    pub(super) state: State,
    pub(super) distribution_bits: u8,
    pub(super) distributors: NodeStates,
    pub(super) storage: NodeStates,
}

impl ClusterState {
    /// A cluster that is up with every node up.
    pub fn new(version: u32, distributors: u16, storage: u16) -> Self {
        Self {
            version,
            state: State::Up,
            distribution_bits: DEFAULT_DISTRIBUTION_BITS,
            distributors: NodeStates {
                count: distributors,
                overrides: BTreeMap::new(),
            },
            storage: NodeStates {
                count: storage,
                overrides: BTreeMap::new(),
            },
        }
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    pub fn cluster_state(&self) -> State {
        self.state
    }

    pub fn distribution_bits(&self) -> u8 {
        self.distribution_bits
    }

    pub fn nodes(&self, node_type: NodeType) -> &NodeStates {
        match node_type {
            NodeType::Distributor => &self.distributors,
            NodeType::Storage => &self.storage,
        }
    }

    pub fn node_state(&self, node_type: NodeType, index: u16) -> Option<State> {
        self.nodes(node_type).get(index)
    }

    pub fn with_version(mut self, version: u32) -> Self {
        self.version = version;
        self
    }

    pub fn with_distribution_bits(mut self, bits: u8) -> Result<Self, StateError> {
        if bits == 0 || bits > MAX_DISTRIBUTION_BITS {
            return Err(StateError::InvalidDistributionBits(bits));
        }
        self.distribution_bits = bits;
        Ok(self)
    }

    /// Only `Up` and `Down` are meaningful for the cluster as a whole.
    pub fn with_cluster_state(mut self, state: State) -> Result<Self, StateError> {
        match state {
            State::Up | State::Down => {
                self.state = state;
                Ok(self)
            }
            other => Err(StateError::InvalidClusterState(other.code())),
        }
    }

    pub fn with_node_state(
        mut self,
        node_type: NodeType,
        index: u16,
        state: State,
    ) -> Result<Self, StateError> {
        self.set_node_state(node_type, index, state)?;
        Ok(self)
    }

    pub fn set_node_state(
        &mut self,
        node_type: NodeType,
        index: u16,
        state: State,
    ) -> Result<(), StateError> {
        let nodes = match node_type {
            NodeType::Distributor => &mut self.distributors,
            NodeType::Storage => &mut self.storage,
        };
        nodes.set(node_type, index, state)
    }

    pub(super) fn set_node_count(&mut self, node_type: NodeType, count: u16) {
        let nodes = match node_type {
            NodeType::Distributor => &mut self.distributors,
            NodeType::Storage => &mut self.storage,
        };
        nodes.count = count;
        nodes.overrides.retain(|index, _| *index < count);
    }
}

/// Cluster-wide signal to refuse write traffic, with a human-readable reason.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FeedBlock {
    pub blocked: bool,
    pub description: String,
}

impl FeedBlock {
    pub fn blocked(description: impl Into<String>) -> Self {
        Self {
            blocked: true,
            description: description.into(),
        }
    }

    pub fn unblocked() -> Self {
        Self {
            blocked: false,
            description: String::new(),
        }
    }
}

/// Immutable, versioned snapshot of cluster health pushed to every content node.
///
/// The bundle version is the baseline version. Spaced states are stored with
/// that same version so every state in one bundle agrees on it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateBundle {
    baseline: ClusterState,
    spaced_states: BTreeMap<String, ClusterState>,
    deferred_activation: bool,
    feed_block: Option<FeedBlock>,
}

impl StateBundle {
    pub fn of_baseline_only(baseline: ClusterState) -> Self {
        Self::builder(baseline).build()
    }

    pub fn builder(baseline: ClusterState) -> StateBundleBuilder {
        StateBundleBuilder {
            bundle: StateBundle {
                baseline,
                spaced_states: BTreeMap::new(),
                deferred_activation: false,
                feed_block: None,
            },
        }
    }

    pub fn version(&self) -> u32 {
        self.baseline.version
    }

    pub fn baseline(&self) -> &ClusterState {
        &self.baseline
    }

    pub fn spaced_states(&self) -> &BTreeMap<String, ClusterState> {
        &self.spaced_states
    }

    /// State for `space`, falling back to the baseline when there is no override.
    pub fn derived_state(&self, space: &str) -> &ClusterState {
        self.spaced_states.get(space).unwrap_or(&self.baseline)
    }

    pub fn deferred_activation(&self) -> bool {
        self.deferred_activation
    }

    pub fn feed_block(&self) -> Option<&FeedBlock> {
        self.feed_block.as_ref()
    }

    /// Copy of this bundle with every contained state moved to `version`.
    pub fn cloned_with_version(&self, version: u32) -> Self {
        Self {
            baseline: self.baseline.clone().with_version(version),
            spaced_states: self
                .spaced_states
                .iter()
                .map(|(space, state)| (space.clone(), state.clone().with_version(version)))
                .collect(),
            deferred_activation: self.deferred_activation,
            feed_block: self.feed_block.clone(),
        }
    }
}

pub struct StateBundleBuilder {
    bundle: StateBundle,
}

impl StateBundleBuilder {
    pub fn spaced_state(mut self, space: impl Into<String>, state: ClusterState) -> Self {
        let state = state.with_version(self.bundle.baseline.version);
        self.bundle.spaced_states.insert(space.into(), state);
        self
    }

    pub fn deferred_activation(mut self, deferred: bool) -> Self {
        self.bundle.deferred_activation = deferred;
        self
    }

    pub fn feed_block(mut self, feed_block: FeedBlock) -> Self {
        self.bundle.feed_block = Some(feed_block);
        self
    }

    pub fn build(self) -> StateBundle {
        self.bundle
    }
}
