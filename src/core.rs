pub mod node;
pub mod ring;
pub mod config;
pub mod data_store;
pub mod error;

pub use node::*;
pub use config::*;
pub use error::*;

use num_bigint::{BigUint, RandBigInt};
use sha1::{Digest, Sha1};

use ring::Id;

// Digest arbitrary bytes into an id on the 2^m ring
pub fn key_digest(data: &[u8], m: u32) -> Id {
	let digest = Sha1::digest(data);
	Id::new(BigUint::from_bytes_be(&digest), m)
}

// Uniformly random m-bit id
pub fn random_id(m: u32) -> Id {
	let mut rng = rand::thread_rng();
	Id::new(rng.gen_biguint(m as u64), m)
}

// Stable id for a transport address
pub fn id_for_addr(addr: &str, m: u32) -> Id {
	key_digest(addr.as_bytes(), m)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_key_digest_is_stable() {
		let a = key_digest(b"ring key", 6);
		let b = key_digest(b"ring key", 6);
		assert_eq!(a, b);
		assert!(a < Id::from_u64(64, 32));
	}

	#[test]
	fn test_random_id_fits_width() {
		for _ in 0..32 {
			assert!(random_id(6) < Id::from_u64(64, 32));
		}
	}

	#[test]
	fn test_id_for_addr_matches_digest() {
		assert_eq!(id_for_addr("localhost:9800", 32), key_digest(b"localhost:9800", 32));
	}
}
