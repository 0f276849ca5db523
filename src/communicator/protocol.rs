//! RPC Protocol Definitions
//!
//! Method names and parameter layouts of the two cluster-wide verbs. Names
//! are fixed on the wire and must match between coordinator and node.

use crate::codec::EncodedBundle;
use crate::error::RpcError;
use serde::{Deserialize, Serialize};

pub const SET_DISTRIBUTION_STATES_METHOD: &str = "setdistributionstates";
pub const ACTIVATE_CLUSTER_STATE_VERSION_METHOD: &str = "activate_cluster_state_version";

/// Parameter signature of the publish verb: compression id, size, payload.
pub const SET_DISTRIBUTION_STATES_SIGNATURE: &str = "bix";
pub const ACTIVATE_CLUSTER_STATE_VERSION_SIGNATURE: &str = "i";

/// A single typed RPC parameter or return value.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum RpcValue {
    Int8(u8),
    Int32(i32),
    Data(Vec<u8>),
}

impl RpcValue {
    pub fn type_code(&self) -> char {
        match self {
            RpcValue::Int8(_) => 'b',
            RpcValue::Int32(_) => 'i',
            RpcValue::Data(_) => 'x',
        }
    }
}

fn signature_of(values: &[RpcValue]) -> String {
    values.iter().map(RpcValue::type_code).collect()
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RpcRequest {
    pub method: String,
    pub params: Vec<RpcValue>,
}

impl RpcRequest {
    pub fn set_distribution_states(encoded: &EncodedBundle) -> Self {
        Self {
            method: SET_DISTRIBUTION_STATES_METHOD.to_string(),
            params: vec![
                RpcValue::Int8(encoded.compression.id()),
                RpcValue::Int32(encoded.uncompressed_size),
                RpcValue::Data(encoded.payload.clone()),
            ],
        }
    }

    pub fn activate_cluster_state_version(version: i32) -> Self {
        Self {
            method: ACTIVATE_CLUSTER_STATE_VERSION_METHOD.to_string(),
            params: vec![RpcValue::Int32(version)],
        }
    }

    pub fn signature(&self) -> String {
        signature_of(&self.params)
    }

    /// Splits a publish request into compression id, uncompressed size and payload.
    pub fn publish_params(&self) -> Result<(u8, i32, &[u8]), RpcError> {
        match self.params.as_slice() {
            [RpcValue::Int8(compression), RpcValue::Int32(size), RpcValue::Data(payload)] => {
                Ok((*compression, *size, payload.as_slice()))
            }
            _ => Err(signature_mismatch(self, SET_DISTRIBUTION_STATES_SIGNATURE)),
        }
    }

    pub fn activate_params(&self) -> Result<i32, RpcError> {
        match self.params.as_slice() {
            [RpcValue::Int32(version)] => Ok(*version),
            _ => Err(signature_mismatch(self, ACTIVATE_CLUSTER_STATE_VERSION_SIGNATURE)),
        }
    }
}

fn signature_mismatch(request: &RpcRequest, expected: &str) -> RpcError {
    RpcError::Rejected(format!(
        "{} expects parameters '{}', got '{}'",
        request.method,
        expected,
        request.signature()
    ))
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct RpcResponse {
    pub returns: Vec<RpcValue>,
}

impl RpcResponse {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn int32(value: i32) -> Self {
        Self {
            returns: vec![RpcValue::Int32(value)],
        }
    }

    pub fn signature(&self) -> String {
        signature_of(&self.returns)
    }

    pub fn single_int32(&self) -> Result<i32, RpcError> {
        match self.returns.as_slice() {
            [RpcValue::Int32(value)] => Ok(*value),
            _ => Err(RpcError::Rejected(format!(
                "expected return values 'i', got '{}'",
                self.signature()
            ))),
        }
    }
}
