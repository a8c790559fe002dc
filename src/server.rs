use std::sync::Arc;
use futures::{future, prelude::*};
use log::{info, warn, debug};
use tarpc::{
	context,
	tokio_serde::formats::Bincode,
	server::Channel
};
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::core::{
	data_store::Value,
	error::{DhtResult, RpcFailure, RpcResult},
	node::Node,
	ring::Id
};
use crate::rpc::{NodeRef, NodeService};
use crate::transport::tcp::TcpTransport;

/// Server half of the wire protocol: adapts incoming tarpc calls onto
/// the node's handlers and stamps known addresses onto the ids in every
/// reply.
#[derive(Clone)]
pub struct NodeServer {
	node: Arc<Node>,
	transport: Arc<TcpTransport>
}

impl NodeServer {
	pub fn new(node: Arc<Node>, transport: Arc<TcpTransport>) -> Self {
		NodeServer {
			node,
			transport
		}
	}

	fn wire_ref(&self, id: &Id) -> RpcResult<NodeRef> {
		match self.transport.lookup_addr(id) {
			Some(addr) => Ok(NodeRef {
				id: id.clone(),
				addr
			}),
			None => Err(RpcFailure::new(format!("no known address for {}", id)))
		}
	}
}

#[tarpc::server]
impl NodeService for NodeServer {
	async fn node_info_rpc(self, _: context::Context) -> NodeRef {
		self.transport.local_ref()
	}

	async fn find_successor_rpc(self, _: context::Context, key: Id) -> RpcResult<NodeRef> {
		let id = self.node.find_successor(&key).await;
		self.wire_ref(&id)
	}

	async fn get_successor_rpc(self, _: context::Context) -> RpcResult<NodeRef> {
		self.wire_ref(&self.node.get_successor())
	}

	async fn get_predecessor_rpc(self, _: context::Context) -> RpcResult<Option<NodeRef>> {
		match self.node.get_predecessor() {
			Some(id) => Ok(Some(self.wire_ref(&id)?)),
			None => Ok(None)
		}
	}

	async fn get_successor_list_rpc(self, _: context::Context) -> RpcResult<Vec<NodeRef>> {
		self.node.get_successor_list()
			.iter()
			.map(|id| self.wire_ref(id))
			.collect()
	}

	async fn notify_rpc(self, _: context::Context, candidate: NodeRef) {
		self.transport.absorb(&candidate);
		self.node.notify(candidate.id);
	}

	async fn ping_rpc(self, _: context::Context) {
	}

	async fn get_storage_value_rpc(self, _: context::Context, key: String) -> RpcResult<Option<Value>> {
		Ok(self.node.get_local(&key))
	}
}

/// Handle over a serving listener
pub struct ServerManager {
	handle: JoinHandle<()>,
	tx: watch::Sender<bool>
}

impl ServerManager {
	pub async fn stop(self) -> DhtResult<()> {
		let _ = self.tx.send(true);
		self.handle.await?;
		Ok(())
	}

	pub async fn wait(self) -> DhtResult<()> {
		self.handle.await?;
		Ok(())
	}
}

/// Start answering RPCs at the transport's local address.
pub async fn serve(node: Arc<Node>, transport: Arc<TcpTransport>) -> DhtResult<ServerManager> {
	// channel used to shutdown (true means shutdown)
	let (tx, rx) = watch::channel(false);
	let local = transport.local_ref();
	let max_connections = node.config().max_connections as usize;

	// Listen locally first
	let mut listener = tarpc::serde_transport::tcp::listen(&local.addr, Bincode::default).await?;
	info!("{}: listening at {}", local.id, local.addr);

	let server = NodeServer::new(node, transport);
	let mut listener_rx = rx;
	let handle = tokio::spawn(async move {
		listener.config_mut().max_frame_length(usize::MAX);
		let listener_fut = listener
			.filter_map(|r| future::ready(r.ok()))
			.map(tarpc::server::BaseChannel::with_defaults)
			.map(|channel| {
				// Clone a new server to share the node in Arc
				let server = server.clone();
				async move {
					channel.execute(server.serve()).await;
				}
			})
			.buffer_unordered(max_connections)
			.for_each(|_| async {});

		debug!("{}: serving", local);
		tokio::select! {
			_ = listener_fut => {
				warn!("{}: listener terminated", local);
			},
			_ = listener_rx.changed() => {
				debug!("{}: listener stopped gracefully", local);
			}
		};
	});

	Ok(ServerManager {
		handle,
		tx
	})
}
