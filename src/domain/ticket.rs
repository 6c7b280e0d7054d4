//! Ticket token generation.
//!
//! A ticket id is a human-presentable uppercase alphanumeric token built
//! from a base-36 millisecond timestamp and a random suffix. The generator
//! does NOT guarantee uniqueness; the booking ledger's unique index is the
//! authority, and the finalizer regenerates on insertion-time collision.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Length of the random suffix appended to the timestamp part
const SUFFIX_LEN: usize = 6;

/// Uppercase alphanumerics, no lookalike exclusions: collisions are handled
/// at insert time, not by widening the alphabet.
const ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// A globally unique, human-presentable ticket token
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TicketId(pub String);

impl TicketId {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Mint a fresh candidate token: `TKT-` + base-36 unix millis + random
    /// suffix. Monotonic-ish by construction, unique only by ledger insert.
    pub fn generate() -> Self {
        let millis = chrono::Utc::now().timestamp_millis().max(0) as u64;
        let mut token = String::with_capacity(4 + 13 + SUFFIX_LEN);
        token.push_str("TKT-");
        token.push_str(&to_base36(millis));

        let mut rng = rand::thread_rng();
        for _ in 0..SUFFIX_LEN {
            let idx = rng.gen_range(0..ALPHABET.len());
            token.push(ALPHABET[idx] as char);
        }

        Self(token)
    }
}

impl fmt::Display for TicketId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

fn to_base36(mut n: u64) -> String {
    const DIGITS: &[u8] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ";
    if n == 0 {
        return "0".to_string();
    }
    let mut out = Vec::new();
    while n > 0 {
        out.push(DIGITS[(n % 36) as usize]);
        n /= 36;
    }
    out.reverse();
    String::from_utf8(out).expect("base36 digits are ASCII")
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn generated_tokens_are_uppercase_alphanumeric() {
        let ticket = TicketId::generate();
        let body = ticket.as_str().strip_prefix("TKT-").unwrap();
        assert!(!body.is_empty());
        assert!(body
            .bytes()
            .all(|b| b.is_ascii_uppercase() || b.is_ascii_digit()));
    }

    #[test]
    fn timestamp_part_sorts_roughly_monotonically() {
        let a = TicketId::generate();
        std::thread::sleep(std::time::Duration::from_millis(2));
        let b = TicketId::generate();
        // Same length within an era, so lexicographic order tracks time.
        assert!(a.as_str()[..a.as_str().len() - SUFFIX_LEN] <= b.as_str()[..b.as_str().len() - SUFFIX_LEN]);
    }

    #[test]
    fn base36_known_values() {
        assert_eq!(to_base36(0), "0");
        assert_eq!(to_base36(35), "Z");
        assert_eq!(to_base36(36), "10");
        assert_eq!(to_base36(36 * 36 + 1), "101");
    }

    proptest! {
        #[test]
        fn base36_round_trips(n in 0u64..u64::MAX) {
            let rendered = to_base36(n);
            let parsed = u64::from_str_radix(&rendered, 36).unwrap();
            prop_assert_eq!(parsed, n);
        }
    }
}
