use std::default::Default;

#[derive(Clone)]
pub struct Config {
	/// Key-bit width m of the identifier space.
	/// Every member of a ring must agree on it.
	pub num_bits: u32,
	/// Successor list capacity (None: ceil(log2(num_bits)), at least 1)
	pub successor_list_cap: Option<usize>,
	/// Interval to periodically stabilize (in ms, 0 disables it)
	pub stabilize_interval: u64,
	/// Interval to periodically fix the finger table (in ms, 0 disables it)
	pub fix_finger_interval: u64,
	/// Interval to periodically probe the predecessor (in ms, 0 disables it)
	pub check_predecessor_interval: u64,
	/// Per-request timeout on the network transport (in ms)
	pub rpc_timeout: u64,
	/// Max number of concurrent connections in buffer
	pub max_connections: u64,
	/// Whether the node binary initializes logging
	pub logging: bool,
}

impl Default for Config {
	fn default() -> Self {
		Self {
			num_bits: 64,
			successor_list_cap: None,
			stabilize_interval: 500,
			fix_finger_interval: 500,
			check_predecessor_interval: 1000,
			rpc_timeout: 2000,
			max_connections: 16,
			logging: true
		}
	}
}

impl Config {
	/// Effective successor list capacity.
	pub fn successor_cap(&self) -> usize {
		match self.successor_list_cap {
			Some(cap) => cap.max(1),
			None => ((self.num_bits as f64).log2().ceil() as usize).max(1)
		}
	}
}
