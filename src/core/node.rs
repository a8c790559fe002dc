use std::{
	fmt,
	sync::{Arc, RwLock},
	time::Duration
};
use futures::future;
use log::{info, warn, debug};
use tokio::sync::watch;
use tokio::task::JoinHandle;

use super::{
	ring::*,
	config::Config,
	data_store::{DataStore, Key, Value},
	error::{DhtError, DhtResult, TransportError, TransportResult},
	key_digest
};
use crate::transport::{Request, Response, Transport};

/// One routing shortcut: the best-known successor of `key`,
/// where `key = (id + 2^i) mod 2^m` for finger index i.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FingerEntry {
	pub key: Id,
	pub node_id: Id
}

/// A Chord node: the overlay state machine for one member of the ring.
///
/// All overlay state is private to the node and shared across its
/// maintenance tasks and request handlers through per-field locks. Lock
/// guards are never held across an await, so every non-suspending section
/// observes and mutates a consistent snapshot.
pub struct Node {
	id: Id,
	config: Config,
	store: DataStore,
	transport: Arc<dyn Transport>,
	// Never "empty": a node with no live peers is its own successor
	successor: Arc<RwLock<Id>>,
	predecessor: Arc<RwLock<Option<Id>>>,
	// Failover candidates ordered by forward distance from id
	successor_list: Arc<RwLock<Vec<Id>>>,
	finger_table: Arc<RwLock<Vec<FingerEntry>>>,
	// Round-robin cursor of fix_fingers
	next_finger: Arc<RwLock<usize>>,
	lifecycle: Arc<RwLock<Option<watch::Sender<bool>>>>
}

impl fmt::Display for Node {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "Node({})", self.id.short())
	}
}

impl Node {
	pub fn new(id: Id, config: Config, transport: Arc<dyn Transport>) -> Arc<Self> {
		assert!(config.num_bits > 0, "key-bit width must be positive");

		// init a ring with only one node
		// (see second part of n.join in Figure 6)
		let m = config.num_bits;
		let finger_table = (0..m)
			.map(|i| FingerEntry {
				key: finger_start(&id, i, m),
				node_id: id.clone()
			})
			.collect();

		Arc::new(Node {
			successor: Arc::new(RwLock::new(id.clone())),
			predecessor: Arc::new(RwLock::new(None)),
			successor_list: Arc::new(RwLock::new(Vec::new())),
			finger_table: Arc::new(RwLock::new(finger_table)),
			next_finger: Arc::new(RwLock::new(0)),
			lifecycle: Arc::new(RwLock::new(None)),
			store: DataStore::new(),
			id,
			config,
			transport
		})
	}

	pub fn id(&self) -> &Id {
		&self.id
	}

	pub fn config(&self) -> &Config {
		&self.config
	}

	pub fn get_successor(&self) -> Id {
		self.successor.read().unwrap().clone()
	}

	fn set_successor(&self, id: Id) {
		*self.successor.write().unwrap() = id;
	}

	pub fn get_predecessor(&self) -> Option<Id> {
		self.predecessor.read().unwrap().clone()
	}

	fn set_predecessor(&self, id: Option<Id>) {
		*self.predecessor.write().unwrap() = id;
	}

	pub fn get_successor_list(&self) -> Vec<Id> {
		self.successor_list.read().unwrap().clone()
	}

	pub fn fingers(&self) -> Vec<FingerEntry> {
		self.finger_table.read().unwrap().clone()
	}

	/// A node is dead when it knows no peer at all: it is its own
	/// successor and nobody claims to precede it.
	pub fn is_dead(&self) -> bool {
		self.get_successor() == self.id && self.get_predecessor().is_none()
	}

	/// One-line state summary with shortened ids, stable field order.
	pub fn describe(&self) -> String {
		let state = if self.is_dead() { "dead" } else { "alive" };
		let pre = match self.get_predecessor() {
			Some(p) => p.short(),
			None => "none".to_string()
		};
		let succ_list = self.get_successor_list()
			.iter()
			.map(|s| s.short())
			.collect::<Vec<_>>()
			.join(",");
		format!("{} pre:{} node:{} succ:{} succList:{}",
			state, pre, self.id.short(), self.get_successor().short(), succ_list)
	}

	// Figure 4: n.closest_preceding_finger
	pub fn closest_preceding_finger(&self, key: &Id) -> Id {
		let table = self.finger_table.read().unwrap();
		for entry in table.iter().rev() {
			if within(&entry.node_id, &self.id, key, false, false) {
				return entry.node_id.clone();
			}
		}
		self.id.clone()
	}

	/// Resolve the node responsible for `key`, forwarding through the
	/// best finger when the answer is not adjacent. Falls back to this
	/// node's own id when no better route answers; the caller may retry
	/// once stabilization has repaired the ring.
	pub async fn find_successor(&self, key: &Id) -> Id {
		let succ = self.get_successor();
		if within(key, &self.id, &succ, false, true) {
			return succ;
		}

		let next = self.closest_preceding_finger(key);
		if next == self.id {
			return self.id.clone();
		}

		match self.remote_find_successor(&next, key).await {
			Ok(id) => id,
			Err(e) => {
				warn!("{}: find_successor({}) via {} failed: {}", self, key, next, e);
				self.id.clone()
			}
		}
	}

	async fn remote_find_successor(&self, target: &Id, key: &Id) -> TransportResult<Id> {
		match self.transport.send(target, Request::FindSuccessorForId { key: key.clone() }).await? {
			Response::NodeId { id } => Ok(id),
			_ => Err(TransportError::UnexpectedResponse {
				target: target.clone(),
				request: "FindSuccessorForId"
			})
		}
	}

	async fn remote_predecessor(&self, target: &Id) -> TransportResult<Option<Id>> {
		match self.transport.send(target, Request::GetPredecessor).await? {
			Response::Predecessor { id } => Ok(id),
			_ => Err(TransportError::UnexpectedResponse {
				target: target.clone(),
				request: "GetPredecessor"
			})
		}
	}

	async fn remote_successor_list(&self, target: &Id) -> TransportResult<Vec<Id>> {
		match self.transport.send(target, Request::GetSuccessorsList).await? {
			Response::SuccessorsList { list } => Ok(list),
			_ => Err(TransportError::UnexpectedResponse {
				target: target.clone(),
				request: "GetSuccessorsList"
			})
		}
	}

	async fn remote_notify(&self, target: &Id) -> TransportResult<()> {
		self.transport.send(target, Request::Notify { candidate: self.id.clone() }).await?;
		Ok(())
	}

	async fn remote_ping(&self, target: &Id) -> TransportResult<()> {
		self.transport.send(target, Request::Ping).await?;
		Ok(())
	}

	async fn remote_storage_value(&self, target: &Id, key: &str) -> TransportResult<Value> {
		match self.transport.send(target, Request::GetStorageValue { key: key.to_string() }).await? {
			Response::StorageValue { value } => Ok(value),
			_ => Err(TransportError::UnexpectedResponse {
				target: target.clone(),
				request: "GetStorageValue"
			})
		}
	}

	/// Dispatch one incoming request against the local state.
	pub async fn handle_request(&self, request: Request) -> TransportResult<Response> {
		match request {
			Request::FindSuccessorForId { key } => Ok(Response::NodeId {
				id: self.find_successor(&key).await
			}),
			Request::GetSuccessorId => Ok(Response::NodeId {
				id: self.get_successor()
			}),
			Request::GetPredecessor => Ok(Response::Predecessor {
				id: self.get_predecessor()
			}),
			Request::Notify { candidate } => {
				self.notify(candidate);
				Ok(Response::Ack)
			},
			Request::Ping => Ok(Response::Ack),
			Request::GetSuccessorsList => Ok(Response::SuccessorsList {
				list: self.get_successor_list()
			}),
			Request::GetStorageValue { key } => match self.store.get(&key) {
				Some(value) => Ok(Response::StorageValue { value }),
				None => Err(TransportError::NotFound { key })
			}
		}
	}

	// Figure 7: n.join
	pub async fn join(&self, bootstrap: &Id) -> DhtResult<()> {
		debug!("{}: joining via {}", self, bootstrap);
		self.set_predecessor(None);
		let succ = self.remote_find_successor(bootstrap, &self.id).await
			.map_err(|e| DhtError::JoinFailure {
				bootstrap: bootstrap.clone(),
				message: e.to_string()
			})?;
		self.set_successor(succ);
		debug!("{}: joined via {}", self, bootstrap);
		Ok(())
	}

	// Figure 7: n.notify
	pub fn notify(&self, candidate: Id) {
		let mut pred = self.predecessor.write().unwrap();
		let adopt = match pred.as_ref() {
			Some(p) => within(&candidate, p, &self.id, false, false),
			None => true
		};
		if adopt {
			debug!("{}: new predecessor set in notify: {}", self, candidate);
			*pred = Some(candidate);
		}
	}

	// Figure 7: n.stabilize, extended with the successor list
	pub async fn stabilize(&self) {
		let mut succ = self.get_successor();

		if succ == self.id {
			// A node that only knows itself adopts whoever notified it;
			// with no predecessor either there is nothing to reconcile.
			match self.get_predecessor() {
				Some(p) if p != self.id => {
					self.set_successor(p.clone());
					succ = p;
				},
				_ => return
			}
		}

		let result: TransportResult<()> = async {
			if let Some(x) = self.remote_predecessor(&succ).await? {
				if within(&x, &self.id, &succ, false, false) {
					debug!("{}: adopting closer successor {}", self, x);
					self.set_successor(x.clone());
					succ = x;
				}
			}
			self.remote_notify(&succ).await?;

			let mut list = self.remote_successor_list(&succ).await?;
			list.push(succ.clone());
			self.merge_successor_list(list);
			Ok(())
		}.await;

		match result {
			Ok(()) => debug!("{}: {}", self, self.describe()),
			Err(e) => {
				warn!("{}: stabilize via {} failed: {}", self, succ, e);
				self.demote_successor(&succ);
			}
		}
	}

	// Figure 7: n.fix_fingers, walking a round-robin cursor so every
	// finger is eventually refreshed
	pub async fn fix_fingers(&self) {
		let m = self.config.num_bits;
		let index = {
			let mut next = self.next_finger.write().unwrap();
			let index = *next;
			*next = (index + 1) % m as usize;
			index
		};

		let key = finger_start(&self.id, index as u32, m);
		let node_id = self.find_successor(&key).await;
		let mut table = self.finger_table.write().unwrap();
		table[index].node_id = node_id;
	}

	pub async fn check_predecessor(&self) {
		let pred = match self.get_predecessor() {
			Some(p) => p,
			None => return
		};
		if let Err(e) = self.remote_ping(&pred).await {
			warn!("{}: predecessor {} unreachable: {}", self, pred, e);
			let mut guard = self.predecessor.write().unwrap();
			if guard.as_ref() == Some(&pred) {
				*guard = None;
			}
		}
	}

	/// Fold failover candidates into the successor list: drop this node's
	/// own id, order by forward distance from it, deduplicate and truncate
	/// to the configured capacity.
	fn merge_successor_list(&self, candidates: Vec<Id>) {
		let m = self.config.num_bits;
		let mut merged = candidates;
		merged.extend(self.get_successor_list());
		merged.retain(|x| *x != self.id);
		merged.sort_by_key(|x| ring_distance(&self.id, x, m));
		merged.dedup();
		merged.truncate(self.config.successor_cap());
		*self.successor_list.write().unwrap() = merged;
	}

	fn demote_successor(&self, failed: &Id) {
		{
			let mut list = self.successor_list.write().unwrap();
			list.retain(|x| x != failed);
		}
		let next = self.best_successor();
		info!("{}: demoting dead successor {}, falling back to {}", self, failed, next);
		self.set_successor(next);
	}

	/// First live failover candidate, or this node itself when the list
	/// is exhausted.
	pub fn best_successor(&self) -> Id {
		self.get_successor_list()
			.first()
			.cloned()
			.unwrap_or_else(|| self.id.clone())
	}

	pub fn store_local(&self, key: Key, value: Value) {
		self.store.set(key, value);
	}

	pub fn get_local(&self, key: &str) -> Option<Value> {
		self.store.get(key)
	}

	pub fn remove_local(&self, key: &str) -> Option<Value> {
		self.store.remove(key)
	}

	/// Fetch a key from whichever node is responsible for its digest.
	/// Entries are single-copy: a key written before a closer peer joined
	/// stays on its original owner and is reported as not found.
	pub async fn fetch(&self, key: &str) -> TransportResult<Value> {
		if let Some(value) = self.store.get(key) {
			return Ok(value);
		}

		let digest = key_digest(key.as_bytes(), self.config.num_bits);
		let target = self.find_successor(&digest).await;
		if target == self.id {
			return Err(TransportError::NotFound { key: key.to_string() });
		}
		self.remote_storage_value(&target, key).await
	}

	/// Spawn the periodic maintenance tasks (stabilize, fix-fingers,
	/// check-predecessor). Idempotent: while the lifecycle is running a
	/// second call changes nothing and returns None.
	pub fn start_lifecycle(self: &Arc<Self>) -> Option<MaintenanceHandle> {
		let mut lifecycle = self.lifecycle.write().unwrap();
		if lifecycle.is_some() {
			return None;
		}

		let (tx, rx) = watch::channel(false);
		let mut handles = Vec::new();

		// Periodically stabilize
		let stabilize_interval = self.config.stabilize_interval;
		if stabilize_interval > 0 {
			let node = self.clone();
			let mut stabilize_rx = rx.clone();
			handles.push(tokio::spawn(async move {
				let mut interval = tokio::time::interval(Duration::from_millis(stabilize_interval));
				loop {
					tokio::select! {
						_ = interval.tick() => node.stabilize().await,
						_ = stabilize_rx.changed() => {
							debug!("{}: stabilize task stopped gracefully", node);
							break;
						}
					}
				}
			}));
		}

		// Periodically refresh the finger table
		let fix_finger_interval = self.config.fix_finger_interval;
		if fix_finger_interval > 0 {
			let node = self.clone();
			let mut fix_finger_rx = rx.clone();
			handles.push(tokio::spawn(async move {
				let mut interval = tokio::time::interval(Duration::from_millis(fix_finger_interval));
				loop {
					tokio::select! {
						_ = interval.tick() => node.fix_fingers().await,
						_ = fix_finger_rx.changed() => {
							debug!("{}: fix_fingers task stopped gracefully", node);
							break;
						}
					}
				}
			}));
		}

		// Periodically probe the predecessor
		let check_predecessor_interval = self.config.check_predecessor_interval;
		if check_predecessor_interval > 0 {
			let node = self.clone();
			let mut check_predecessor_rx = rx.clone();
			handles.push(tokio::spawn(async move {
				let mut interval = tokio::time::interval(Duration::from_millis(check_predecessor_interval));
				loop {
					tokio::select! {
						_ = interval.tick() => node.check_predecessor().await,
						_ = check_predecessor_rx.changed() => {
							debug!("{}: check_predecessor task stopped gracefully", node);
							break;
						}
					}
				}
			}));
		}

		info!("{}: lifecycle started", self);
		*lifecycle = Some(tx);
		Some(MaintenanceHandle {
			handle: future::join_all(handles)
		})
	}

	/// Cancel the pending maintenance timers. Ticks already in flight run
	/// to completion; outstanding RPCs are bounded by the transport's own
	/// timeout.
	pub fn stop_lifecycle(&self) {
		let tx = self.lifecycle.write().unwrap().take();
		if let Some(tx) = tx {
			let _ = tx.send(true);
			info!("{}: lifecycle stopped", self);
		}
	}
}

/// An aggregated handle over the maintenance tasks of one node
pub struct MaintenanceHandle {
	handle: future::JoinAll<JoinHandle<()>>
}

impl MaintenanceHandle {
	/// Wait for all maintenance tasks to finish (they do so after
	/// [Node::stop_lifecycle]).
	pub async fn wait(self) -> DhtResult<()> {
		self.handle.await
			.into_iter()
			.collect::<Result<Vec<_>, _>>()?;
		Ok(())
	}
}
