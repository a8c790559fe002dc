#![allow(dead_code)]

use std::sync::Arc;
use chord_ring::{
	core::{
		config::Config,
		key_digest,
		node::Node,
		ring::{within, Id}
	},
	transport::memory::MemoryTransport
};
use rand::Rng;

// Disable the maintenance timers so tests drive every round by hand
pub fn manual_config(bits: u32) -> Config {
	Config {
		num_bits: bits,
		stabilize_interval: 0,
		fix_finger_interval: 0,
		check_predecessor_interval: 0,
		..Config::default()
	}
}

pub fn spawn_node(transport: &Arc<MemoryTransport>, id: u64, config: &Config) -> Arc<Node> {
	let node = Node::new(Id::from_u64(id, config.num_bits), config.clone(), transport.clone());
	transport.register(&node);
	node
}

pub async fn fix_all_fingers(node: &Node) {
	for _ in 0..node.config().num_bits {
		node.fix_fingers().await;
	}
}

// One stabilization round over every node
pub async fn stabilize_all(nodes: &[Arc<Node>]) {
	for node in nodes {
		node.stabilize().await;
	}
}

/// Build a ring where every node joins via the first id, then run enough
/// stabilization rounds for successor chains and lists to settle.
pub async fn build_ring(
	transport: &Arc<MemoryTransport>,
	ids: &[u64],
	config: &Config
) -> Vec<Arc<Node>> {
	let first = spawn_node(transport, ids[0], config);
	let mut nodes = vec![first.clone()];

	for &id in &ids[1..] {
		let node = spawn_node(transport, id, config);
		node.join(first.id()).await.unwrap();
		node.stabilize().await;
		stabilize_all(&nodes).await;
		nodes.push(node);
	}

	for _ in 0..ids.len() + 2 {
		stabilize_all(&nodes).await;
	}
	for node in nodes.iter() {
		fix_all_fingers(node).await;
	}
	nodes
}

// Generate a key whose digest is in range (start, end]
pub fn generate_key_in_range<T: Rng>(rng: &mut T, start: u64, end: u64, bits: u32) -> String {
	loop {
		let key = rng.gen::<u64>().to_string();
		let digest = key_digest(key.as_bytes(), bits);
		let start = Id::from_u64(start, bits);
		let end = Id::from_u64(end, bits);
		if within(&digest, &start, &end, false, true) {
			return key;
		}
	}
}
