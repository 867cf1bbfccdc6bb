//! Fresh GUID generation for transaction/trace ids (spec.md §4.1: "new
//! txn-id = trace-id = a fresh GUID"). The agent's random-number source is
//! explicitly an external collaborator (spec.md §1); here that's `rand`,
//! matching the crate the rest of the sampling code already leans on.

use rand::RngCore;

/// A 16-hex-character random id, the format the collector expects for
/// transaction/trace/span guids.
pub fn new_guid() -> String {
    let mut bytes = [0u8; 8];
    rand::thread_rng().fill_bytes(&mut bytes);
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

/// Initial DT priority (spec.md §4.1): uniform in `[0, 1)`, plus `1.0` if
/// the harvest sampler chose to sample this transaction.
pub fn initial_priority(sampled: bool) -> f64 {
    let base: f64 = rand::random::<f64>();
    if sampled {
        base + 1.0
    } else {
        base
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn guid_is_16_hex_chars() {
        let g = new_guid();
        assert_eq!(g.len(), 16);
        assert!(g.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn sampled_priority_is_at_least_one() {
        assert!(initial_priority(true) >= 1.0);
        assert!(initial_priority(false) < 1.0);
    }
}
