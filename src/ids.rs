//! Identity generation for sessions and per-event request IDs.
//!
//! Session identities are a 12-character alphanumeric string followed by a
//! literal `=`, matching the shape the cloud service hands out. They are
//! collision-free within a process's uptime but are not cryptographically
//! strong; they identify a connection, not a secret.

use rand::distributions::Alphanumeric;
use rand::Rng;

const SESSION_ID_LEN: usize = 12;

/// Generate a session identity: 12 `[A-Za-z0-9]` characters plus `=`.
pub fn generate_connection_id() -> String {
    let mut id: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(SESSION_ID_LEN)
        .map(char::from)
        .collect();
    id.push('=');
    id
}

/// Generate a UUID-v4-shaped identifier for request/message correlation.
pub fn generate_request_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn connection_id_matches_expected_shape() {
        let id = generate_connection_id();
        assert_eq!(id.len(), SESSION_ID_LEN + 1);
        assert!(id.ends_with('='));
        let body = &id[..SESSION_ID_LEN];
        assert!(body.chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[test]
    fn connection_ids_are_practically_unique() {
        let mut seen = HashSet::new();
        for _ in 0..2000 {
            assert!(seen.insert(generate_connection_id()));
        }
    }

    #[test]
    fn request_id_parses_as_uuid() {
        let id = generate_request_id();
        assert!(uuid::Uuid::parse_str(&id).is_ok());
    }
}
