pub mod memory;
pub mod tcp;

use async_trait::async_trait;
use serde::{Serialize, Deserialize};

use crate::core::{
	data_store::Value,
	error::TransportResult,
	ring::Id
};

/// A request addressed to a peer on the ring.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Request {
	FindSuccessorForId { key: Id },
	GetSuccessorId,
	GetPredecessor,
	Notify { candidate: Id },
	Ping,
	GetSuccessorsList,
	GetStorageValue { key: String }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Response {
	NodeId { id: Id },
	Predecessor { id: Option<Id> },
	Ack,
	SuccessorsList { list: Vec<Id> },
	StorageValue { value: Value }
}

/// Addressed RPC delivery between ring members.
///
/// A transport resolves an id to a physical peer and delivers the request
/// at most once. It must answer within a bounded time, tolerate concurrent
/// calls from every node hosted in the process, and loop requests back to
/// the local node when the target is the sender itself.
#[async_trait]
pub trait Transport: Send + Sync {
	async fn send(&self, target: &Id, request: Request) -> TransportResult<Response>;
}
