// File: protocol.rs
// Location: /src/protocol.rs
//
// Messages exchanged with the encoder worker. Responses carry the id of the
// request they answer; ordering between requests is not guaranteed.

use serde::{Deserialize, Serialize};

use crate::matrix::ModuleMatrix;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum WorkerRequest {
    Ping { id: u64 },
    Encode { id: u64, text: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum WorkerResponse {
    Pong { id: u64 },
    Encoded { id: u64, matrix: ModuleMatrix },
    EncodeError { id: u64, reason: String },
}

impl WorkerRequest {
    pub fn id(&self) -> u64 {
        match self {
            WorkerRequest::Ping { id } | WorkerRequest::Encode { id, .. } => *id,
        }
    }
}

impl WorkerResponse {
    pub fn id(&self) -> u64 {
        match self {
            WorkerResponse::Pong { id }
            | WorkerResponse::Encoded { id, .. }
            | WorkerResponse::EncodeError { id, .. } => *id,
        }
    }
}
