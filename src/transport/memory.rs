use std::{
	collections::HashMap,
	sync::{Arc, RwLock, Weak}
};
use async_trait::async_trait;
use log::debug;

use crate::core::{
	error::{TransportError, TransportResult},
	node::Node,
	ring::Id
};
use super::{Request, Response, Transport};

/// In-process transport for rings hosted inside one process.
///
/// Requests are dispatched straight into the target node's handler, so a
/// whole overlay can be exercised without sockets. Dropping a node from
/// the registry makes it unreachable, which is how tests simulate a crash.
pub struct MemoryTransport {
	nodes: RwLock<HashMap<Id, Weak<Node>>>
}

impl MemoryTransport {
	pub fn new() -> Arc<Self> {
		Arc::new(MemoryTransport {
			nodes: RwLock::new(HashMap::new())
		})
	}

	pub fn register(&self, node: &Arc<Node>) {
		debug!("memory transport: registering {}", node);
		let mut nodes = self.nodes.write().unwrap();
		nodes.insert(node.id().clone(), Arc::downgrade(node));
	}

	/// Make a node unreachable, as if its process died.
	pub fn deregister(&self, id: &Id) {
		debug!("memory transport: deregistering {}", id);
		let mut nodes = self.nodes.write().unwrap();
		nodes.remove(id);
	}
}

#[async_trait]
impl Transport for MemoryTransport {
	async fn send(&self, target: &Id, request: Request) -> TransportResult<Response> {
		let node = {
			let nodes = self.nodes.read().unwrap();
			nodes.get(target).and_then(Weak::upgrade)
		};
		match node {
			Some(node) => node.handle_request(request).await,
			None => Err(TransportError::unreachable(target, "no such peer"))
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::core::{config::Config, node::Node};

	fn config() -> Config {
		Config {
			num_bits: 6,
			..Config::default()
		}
	}

	#[tokio::test]
	async fn test_loopback_dispatch() {
		let transport = MemoryTransport::new();
		let node = Node::new(Id::from_u64(10, 6), config(), transport.clone());
		transport.register(&node);

		let response = transport.send(node.id(), Request::GetSuccessorId).await.unwrap();
		match response {
			Response::NodeId { id } => assert_eq!(id, Id::from_u64(10, 6)),
			other => panic!("unexpected response: {:?}", other)
		};

		match transport.send(node.id(), Request::Ping).await.unwrap() {
			Response::Ack => (),
			other => panic!("unexpected response: {:?}", other)
		};
	}

	#[tokio::test]
	async fn test_deregistered_peer_is_unreachable() {
		let transport = MemoryTransport::new();
		let node = Node::new(Id::from_u64(10, 6), config(), transport.clone());
		transport.register(&node);
		transport.deregister(node.id());

		let result = transport.send(node.id(), Request::Ping).await;
		assert!(matches!(result, Err(TransportError::Unreachable { .. })));
	}

	#[tokio::test]
	async fn test_storage_value_miss() {
		let transport = MemoryTransport::new();
		let node = Node::new(Id::from_u64(10, 6), config(), transport.clone());
		transport.register(&node);

		let request = Request::GetStorageValue { key: "absent".to_string() };
		let result = transport.send(node.id(), request).await;
		assert!(matches!(result, Err(TransportError::NotFound { .. })));

		node.store_local("present".to_string(), vec![7]);
		let request = Request::GetStorageValue { key: "present".to_string() };
		match transport.send(node.id(), request).await.unwrap() {
			Response::StorageValue { value } => assert_eq!(value, vec![7]),
			other => panic!("unexpected response: {:?}", other)
		};
	}
}
