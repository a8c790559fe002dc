use std::time::Duration;
use chord_ring::{
	core::{config::Config, ring::Id},
	transport::memory::MemoryTransport
};

mod common;
use common::*;

#[tokio::test]
async fn test_lifecycle_converges_and_stops() {
	let _ = env_logger::builder().is_test(true).try_init();
	let config = Config {
		num_bits: 6,
		stabilize_interval: 20,
		fix_finger_interval: 10,
		check_predecessor_interval: 25,
		..Config::default()
	};
	let transport = MemoryTransport::new();
	let a = spawn_node(&transport, 10, &config);
	let b = spawn_node(&transport, 40, &config);
	b.join(a.id()).await.unwrap();

	let a_handle = a.start_lifecycle().unwrap();
	let b_handle = b.start_lifecycle().unwrap();
	// starting twice changes nothing while the lifecycle is running
	assert!(a.start_lifecycle().is_none());

	tokio::time::sleep(Duration::from_millis(500)).await;
	assert_eq!(a.get_successor(), Id::from_u64(40, 6));
	assert_eq!(a.get_predecessor(), Some(Id::from_u64(40, 6)));
	assert_eq!(b.get_successor(), Id::from_u64(10, 6));
	assert_eq!(b.get_predecessor(), Some(Id::from_u64(10, 6)));

	a.stop_lifecycle();
	b.stop_lifecycle();
	a_handle.wait().await.unwrap();
	b_handle.wait().await.unwrap();

	// a stopped lifecycle can be started again
	let again = a.start_lifecycle().unwrap();
	a.stop_lifecycle();
	again.wait().await.unwrap();
}

#[tokio::test]
async fn test_lifecycle_detects_dead_peer() {
	let _ = env_logger::builder().is_test(true).try_init();
	let config = Config {
		num_bits: 6,
		stabilize_interval: 20,
		fix_finger_interval: 10,
		check_predecessor_interval: 25,
		..Config::default()
	};
	let transport = MemoryTransport::new();
	let nodes = build_ring(&transport, &[5, 20, 50], &config).await;

	let handles: Vec<_> = nodes.iter()
		.map(|n| n.start_lifecycle().unwrap())
		.collect();

	transport.deregister(nodes[1].id());
	nodes[1].stop_lifecycle();
	tokio::time::sleep(Duration::from_millis(500)).await;

	assert_eq!(nodes[0].get_successor(), Id::from_u64(50, 6));
	assert_eq!(nodes[2].get_predecessor(), Some(Id::from_u64(5, 6)));

	for node in nodes.iter() {
		node.stop_lifecycle();
	}
	for handle in handles {
		handle.wait().await.unwrap();
	}
}
