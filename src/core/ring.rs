use std::fmt;

use num_bigint::BigUint;
use num_traits::One;
use serde::{Serialize, Deserialize};

/// Identifier on the ring, in [0, 2^m).
///
/// The key-bit width m is a runtime parameter shared by every member of a
/// ring, so ids carry arbitrary precision instead of a fixed-width integer.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Id(BigUint);

impl Id {
	/// Reduce an arbitrary-precision value onto the 2^m ring.
	pub fn new(value: BigUint, m: u32) -> Self {
		Id(value % ring_modulus(m))
	}

	pub fn from_u64(value: u64, m: u32) -> Self {
		Id::new(BigUint::from(value), m)
	}

	// First 5 chars of the decimal form, for compact log lines
	pub fn short(&self) -> String {
		self.0.to_string().chars().take(5).collect()
	}

	pub(crate) fn value(&self) -> &BigUint {
		&self.0
	}
}

impl fmt::Display for Id {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.0)
	}
}

fn ring_modulus(m: u32) -> BigUint {
	BigUint::one() << m
}

/// Cyclic interval membership: id in (start, end), with either endpoint
/// optionally included.
///
/// When start == end the open interval is the whole ring minus the
/// endpoint; including either endpoint closes it over the whole ring.
pub fn within(id: &Id, start: &Id, end: &Id, include_start: bool, include_end: bool) -> bool {
	if start == end {
		if id == start {
			return include_start || include_end;
		}
		return true;
	}

	let after_start = id > start || (include_start && id == start);
	let before_end = id < end || (include_end && id == end);
	if start < end {
		// (start, id, end)
		after_start && before_end
	}
	else {
		// wraps through 2^m - 1 -> 0
		after_start || before_end
	}
}

// Start of the k-th finger: (id + 2^k) mod 2^m (see Table 1)
// k in [0, m)
pub fn finger_start(id: &Id, k: u32, m: u32) -> Id {
	Id::new(id.value() + (BigUint::one() << k), m)
}

/// Forward (clockwise) distance from a to b: (b - a) mod 2^m.
pub fn ring_distance(a: &Id, b: &Id, m: u32) -> Id {
	if b.value() >= a.value() {
		Id(b.value() - a.value())
	}
	else {
		Id(ring_modulus(m) - a.value() + b.value())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn id(v: u64) -> Id {
		Id::from_u64(v, 6)
	}

	#[test]
	fn test_within_linear() {
		assert!(within(&id(25), &id(10), &id(40), false, false));
		assert!(!within(&id(10), &id(10), &id(40), false, false));
		assert!(within(&id(10), &id(10), &id(40), true, false));
		assert!(!within(&id(40), &id(10), &id(40), false, false));
		assert!(within(&id(40), &id(10), &id(40), false, true));
		assert!(!within(&id(50), &id(10), &id(40), false, true));
	}

	#[test]
	fn test_within_wrap() {
		// (60, 5) passes through 63 -> 0
		assert!(within(&id(62), &id(60), &id(5), false, false));
		assert!(within(&id(0), &id(60), &id(5), false, false));
		assert!(within(&id(3), &id(60), &id(5), false, false));
		assert!(!within(&id(10), &id(60), &id(5), false, false));
		assert!(!within(&id(60), &id(60), &id(5), false, false));
		assert!(within(&id(5), &id(60), &id(5), false, true));
	}

	#[test]
	fn test_within_degenerate() {
		// start == end: whole ring minus the endpoint when open
		assert!(within(&id(33), &id(10), &id(10), false, false));
		assert!(!within(&id(10), &id(10), &id(10), false, false));
		assert!(within(&id(10), &id(10), &id(10), false, true));
		assert!(within(&id(10), &id(10), &id(10), true, true));
	}

	#[test]
	fn test_within_one_bit_ring() {
		let zero = Id::from_u64(0, 1);
		let one = Id::from_u64(1, 1);
		assert!(within(&one, &zero, &zero, false, false));
		assert!(!within(&zero, &zero, &zero, false, false));
		assert!(within(&one, &zero, &one, false, true));
	}

	// For a != b, exactly one of (a, b] and (b, a] holds any x outside {a, b}
	#[test]
	fn test_within_complement() {
		let cases = [(10u64, 40u64), (60, 5), (0, 63)];
		for (a, b) in cases {
			for x in 0..64u64 {
				if x == a || x == b {
					continue;
				}
				let fwd = within(&id(x), &id(a), &id(b), false, true);
				let bwd = within(&id(x), &id(b), &id(a), false, true);
				assert!(fwd != bwd, "x={} a={} b={}", x, a, b);
			}
		}
	}

	#[test]
	fn test_finger_start() {
		assert_eq!(finger_start(&id(10), 0, 6), id(11));
		assert_eq!(finger_start(&id(10), 5, 6), id(42));
		// wraps modulo 2^6
		assert_eq!(finger_start(&id(60), 3, 6), id(4));
	}

	#[test]
	fn test_ring_distance() {
		assert_eq!(ring_distance(&id(10), &id(40), 6), id(30));
		assert_eq!(ring_distance(&id(40), &id(10), 6), id(34));
		assert_eq!(ring_distance(&id(7), &id(7), 6), id(0));
	}

	#[test]
	fn test_short() {
		let wide = Id::new(BigUint::one() << 159, 160);
		assert_eq!(wide.short().len(), 5);
		assert_eq!(id(7).short(), "7");
	}
}
