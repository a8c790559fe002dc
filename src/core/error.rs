use serde::{Serialize, Deserialize};
use thiserror::Error;
use std::{
	result::Result,
	error,
	fmt
};
use super::ring::Id;

/// Fail to execute an RPC at the server side
#[derive(Serialize, Deserialize, Debug)]
pub struct RpcFailure {
	/// Error message
	message: String
}

impl RpcFailure {
	pub fn new(message: impl Into<String>) -> Self {
		Self {
			message: message.into()
		}
	}
}

impl fmt::Display for RpcFailure {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "RPC failed: {}", self.message)
	}
}

/// Convert TransportError to RpcFailure to serialize it for an RPC reply
impl From<TransportError> for RpcFailure {
	fn from(e: TransportError) -> Self {
		Self {
			message: e.to_string()
		}
	}
}

impl error::Error for RpcFailure {
}


/// Errors surfaced by a transport when delivering a request.
/// None of them is fatal to the overlay; callers demote the peer or fall
/// back to another route.
#[derive(Error, Debug)]
pub enum TransportError {
	#[error("peer {target} unreachable: {message}")]
	Unreachable {
		target: Id,
		message: String
	},
	#[error("request to peer {target} timed out")]
	Timeout {
		target: Id
	},
	/// Storage key miss, surfaced to the caller of GetStorageValue
	#[error("key not found: {key}")]
	NotFound {
		key: String
	},
	/// A reply of the wrong kind; indicates an implementation bug
	#[error("unexpected response from {target} to {request}")]
	UnexpectedResponse {
		target: Id,
		request: &'static str
	}
}

impl TransportError {
	pub fn unreachable(target: &Id, message: impl fmt::Display) -> Self {
		Self::Unreachable {
			target: target.clone(),
			message: message.to_string()
		}
	}
}

#[derive(Error, Debug)]
pub enum DhtError {
	#[error("failed to join via {bootstrap}: {message}")]
	JoinFailure {
		bootstrap: Id,
		message: String
	},
	#[error("transport error")]
	Transport(#[from] TransportError),
	#[error("task join error")]
	TaskJoin(#[from] tokio::task::JoinError),
	#[error("IO error")]
	Io(#[from] std::io::Error)
}

pub type DhtResult<T> = Result<T, DhtError>;
pub type TransportResult<T> = Result<T, TransportError>;
pub type RpcResult<T> = Result<T, RpcFailure>;
