//! Deterministic conversation identity.
//!
//! A conversation between two participants is not a stored entity: its key is
//! derived from the two participant ids, sorted ascending and joined with `_`.
//! Participant ids are UUIDs and contain no `_`, so the key splits back into
//! its two halves unambiguously.

const SEPARATOR: char = '_';

/// Derive the conversation key for a pair of participants.
/// Order-independent: `derive_key(a, b) == derive_key(b, a)`.
pub fn derive_key(id_a: &str, id_b: &str) -> String {
    let (lo, hi) = if id_a <= id_b { (id_a, id_b) } else { (id_b, id_a) };
    format!("{}{}{}", lo, SEPARATOR, hi)
}

/// Split a conversation key back into its two participant ids.
/// Returns None if the key is malformed.
pub fn participants(key: &str) -> Option<(&str, &str)> {
    let (a, b) = key.split_once(SEPARATOR)?;
    if a.is_empty() || b.is_empty() || b.contains(SEPARATOR) {
        return None;
    }
    Some((a, b))
}

/// Given a conversation key and one participant, return the other participant.
/// Returns None if `me` is not part of the conversation.
pub fn counterpart<'a>(key: &'a str, me: &str) -> Option<&'a str> {
    let (a, b) = participants(key)?;
    if a == me {
        Some(b)
    } else if b == me {
        Some(a)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derive_key_is_order_independent() {
        let a = "0191c2aa-1111-7000-8000-000000000001";
        let b = "0191c2aa-2222-7000-8000-000000000002";
        assert_eq!(derive_key(a, b), derive_key(b, a));
    }

    #[test]
    fn derive_key_sorts_ascending() {
        assert_eq!(derive_key("bbb", "aaa"), "aaa_bbb");
        assert_eq!(derive_key("aaa", "bbb"), "aaa_bbb");
    }

    #[test]
    fn distinct_pairs_get_distinct_keys() {
        // UUIDs never contain the separator, so concatenation cannot collide
        let a = "0191c2aa-1111-7000-8000-000000000001";
        let b = "0191c2aa-2222-7000-8000-000000000002";
        let c = "0191c2aa-3333-7000-8000-000000000003";
        let keys = [derive_key(a, b), derive_key(a, c), derive_key(b, c)];
        assert_ne!(keys[0], keys[1]);
        assert_ne!(keys[0], keys[2]);
        assert_ne!(keys[1], keys[2]);
    }

    #[test]
    fn participants_round_trips() {
        let key = derive_key("alpha", "beta");
        assert_eq!(participants(&key), Some(("alpha", "beta")));
    }

    #[test]
    fn counterpart_resolves_the_other_side() {
        let key = derive_key("alpha", "beta");
        assert_eq!(counterpart(&key, "alpha"), Some("beta"));
        assert_eq!(counterpart(&key, "beta"), Some("alpha"));
        assert_eq!(counterpart(&key, "gamma"), None);
    }

    #[test]
    fn malformed_keys_are_rejected() {
        assert_eq!(participants("no-separator"), None);
        assert_eq!(participants("_leading"), None);
        assert_eq!(participants("trailing_"), None);
        assert_eq!(participants("a_b_c"), None);
    }
}
