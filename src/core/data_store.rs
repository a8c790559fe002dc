use std::{
	collections::HashMap,
	sync::{Arc, RwLock}
};

pub type Key = String;
pub type Value = Vec<u8>;

/// Thread-safe key-value store local to one node.
/// Holds the entries whose digest falls in (predecessor, id].
#[derive(Clone)]
pub struct DataStore {
	data: Arc<RwLock<HashMap<Key, Value>>>
}

impl DataStore {
	pub fn new() -> Self {
		DataStore {
			data: Arc::new(RwLock::new(HashMap::new()))
		}
	}

	pub fn get(&self, key: &str) -> Option<Value> {
		let data = self.data.read().unwrap();
		data.get(key).cloned()
	}

	pub fn set(&self, key: Key, value: Value) {
		let mut data = self.data.write().unwrap();
		data.insert(key, value);
	}

	pub fn remove(&self, key: &str) -> Option<Value> {
		let mut data = self.data.write().unwrap();
		data.remove(key)
	}
}

impl Default for DataStore {
	fn default() -> Self {
		Self::new()
	}
}
