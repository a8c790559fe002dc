use std::fmt;
use serde::{Serialize, Deserialize};

use crate::core::{
	data_store::Value,
	error::RpcResult,
	ring::Id
};

/// Peer identity as carried on the wire. The overlay core only deals in
/// ids; addresses ride along so peers learn how to reach the nodes that
/// routing answers mention.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeRef {
	pub id: Id,
	pub addr: String
}

impl fmt::Display for NodeRef {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "Node({}, {})", self.id, self.addr)
	}
}

#[tarpc::service]
pub trait NodeService {
	/// Identity of the answering node; lets a dialer learn the id
	/// behind a configured address.
	async fn node_info_rpc() -> NodeRef;

	async fn find_successor_rpc(key: Id) -> RpcResult<NodeRef>;
	async fn get_successor_rpc() -> RpcResult<NodeRef>;
	async fn get_predecessor_rpc() -> RpcResult<Option<NodeRef>>;
	async fn get_successor_list_rpc() -> RpcResult<Vec<NodeRef>>;
	async fn notify_rpc(candidate: NodeRef);
	async fn ping_rpc();

	// Local storage read; None when this node holds no such key
	async fn get_storage_value_rpc(key: String) -> RpcResult<Option<Value>>;
}
