use std::{
	collections::HashMap,
	future::Future,
	io,
	sync::{Arc, RwLock},
	time::Duration
};
use async_trait::async_trait;
use log::debug;
use tarpc::context;

use crate::client::setup_client;
use crate::core::{
	config::Config,
	error::{DhtResult, TransportError, TransportResult},
	ring::Id
};
use crate::rpc::{NodeRef, NodeServiceClient};
use super::{Request, Response, Transport};

/// tarpc-over-TCP transport, the client half of the wire protocol.
///
/// The overlay core addresses peers by id only; this transport resolves
/// ids through an address book that grows as replies flow past (every
/// wire message carries `{id, addr}` pairs). Connections are cached per
/// peer and dropped again on the first failed call.
pub struct TcpTransport {
	local: NodeRef,
	rpc_timeout: Duration,
	peers: RwLock<HashMap<Id, String>>,
	// connection to remote nodes
	connections: RwLock<HashMap<Id, NodeServiceClient>>
}

impl TcpTransport {
	pub fn new(id: Id, addr: &str, config: &Config) -> Arc<Self> {
		Arc::new(TcpTransport {
			local: NodeRef {
				id,
				addr: addr.to_string()
			},
			rpc_timeout: Duration::from_millis(config.rpc_timeout),
			peers: RwLock::new(HashMap::new()),
			connections: RwLock::new(HashMap::new())
		})
	}

	pub fn local_ref(&self) -> NodeRef {
		self.local.clone()
	}

	pub fn lookup_addr(&self, id: &Id) -> Option<String> {
		if *id == self.local.id {
			return Some(self.local.addr.clone());
		}
		self.peers.read().unwrap().get(id).cloned()
	}

	/// Record how to reach a peer.
	pub fn absorb(&self, node: &NodeRef) {
		if node.id == self.local.id || node.addr.is_empty() {
			return;
		}
		let mut peers = self.peers.write().unwrap();
		peers.insert(node.id.clone(), node.addr.clone());
	}

	fn absorb_all(&self, nodes: &[NodeRef]) {
		for node in nodes {
			self.absorb(node);
		}
	}

	/// Dial a configured address and learn the id answering there.
	/// This is the bootstrap path: everything else resolves addresses
	/// from the book.
	pub async fn connect_peer(&self, addr: &str) -> DhtResult<Id> {
		let client = setup_client(addr).await?;
		let info = tokio::time::timeout(self.rpc_timeout, client.node_info_rpc(context::current()))
			.await
			.map_err(|_| io::Error::new(io::ErrorKind::TimedOut, format!("dial {}: timed out", addr)))?
			.map_err(|e| io::Error::new(io::ErrorKind::ConnectionAborted, e.to_string()))?;

		debug!("{}: bootstrap peer at {} is {}", self.local, addr, info.id);
		self.absorb(&info);
		let mut connections = self.connections.write().unwrap();
		connections.insert(info.id.clone(), client);
		Ok(info.id)
	}

	async fn connection(&self, target: &Id) -> TransportResult<NodeServiceClient> {
		// Use block to drop map immediately after use
		{
			let connections = self.connections.read().unwrap();
			if let Some(c) = connections.get(target) {
				// clients can be cloned at low cost
				return Ok(c.clone());
			}
		}

		let addr = self.lookup_addr(target)
			.ok_or_else(|| TransportError::unreachable(target, "no known address"))?;
		debug!("{}: connecting to {} at {}", self.local, target, addr);
		let client = setup_client(&addr).await
			.map_err(|e| TransportError::unreachable(target, e))?;
		let mut connections = self.connections.write().unwrap();
		connections.insert(target.clone(), client.clone());
		Ok(client)
	}

	fn evict(&self, target: &Id) {
		self.connections.write().unwrap().remove(target);
	}

	// Bound a call by the configured timeout; a peer that errors or
	// stalls loses its cached connection so the next call redials.
	async fn with_timeout<T>(
		&self,
		target: &Id,
		fut: impl Future<Output = Result<T, tarpc::client::RpcError>> + Send
	) -> TransportResult<T> {
		match tokio::time::timeout(self.rpc_timeout, fut).await {
			Ok(Ok(value)) => Ok(value),
			Ok(Err(e)) => {
				self.evict(target);
				Err(TransportError::unreachable(target, e))
			},
			Err(_) => {
				self.evict(target);
				Err(TransportError::Timeout { target: target.clone() })
			}
		}
	}
}

#[async_trait]
impl Transport for TcpTransport {
	async fn send(&self, target: &Id, request: Request) -> TransportResult<Response> {
		let client = self.connection(target).await?;
		let ctx = context::current();

		match request {
			Request::FindSuccessorForId { key } => {
				let reply = self.with_timeout(target, client.find_successor_rpc(ctx, key)).await?;
				let node = reply.map_err(|e| TransportError::unreachable(target, e))?;
				self.absorb(&node);
				Ok(Response::NodeId { id: node.id })
			},
			Request::GetSuccessorId => {
				let reply = self.with_timeout(target, client.get_successor_rpc(ctx)).await?;
				let node = reply.map_err(|e| TransportError::unreachable(target, e))?;
				self.absorb(&node);
				Ok(Response::NodeId { id: node.id })
			},
			Request::GetPredecessor => {
				let reply = self.with_timeout(target, client.get_predecessor_rpc(ctx)).await?;
				let pred = reply.map_err(|e| TransportError::unreachable(target, e))?;
				if let Some(node) = pred.as_ref() {
					self.absorb(node);
				}
				Ok(Response::Predecessor { id: pred.map(|n| n.id) })
			},
			Request::Notify { candidate } => {
				let node = if candidate == self.local.id {
					self.local_ref()
				}
				else {
					NodeRef {
						addr: self.lookup_addr(&candidate).unwrap_or_default(),
						id: candidate
					}
				};
				self.with_timeout(target, client.notify_rpc(ctx, node)).await?;
				Ok(Response::Ack)
			},
			Request::Ping => {
				self.with_timeout(target, client.ping_rpc(ctx)).await?;
				Ok(Response::Ack)
			},
			Request::GetSuccessorsList => {
				let reply = self.with_timeout(target, client.get_successor_list_rpc(ctx)).await?;
				let list = reply.map_err(|e| TransportError::unreachable(target, e))?;
				self.absorb_all(&list);
				Ok(Response::SuccessorsList {
					list: list.into_iter().map(|n| n.id).collect()
				})
			},
			Request::GetStorageValue { key } => {
				let reply = self.with_timeout(target, client.get_storage_value_rpc(ctx, key.clone())).await?;
				match reply.map_err(|e| TransportError::unreachable(target, e))? {
					Some(value) => Ok(Response::StorageValue { value }),
					None => Err(TransportError::NotFound { key })
				}
			}
		}
	}
}
