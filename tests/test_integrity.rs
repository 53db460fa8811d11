//! Property tests for the integrity hash.

use cert_oxide::{SignatureComputer, SignaturePayload};
use proptest::prelude::*;

fn computer() -> SignatureComputer {
    SignatureComputer::new(b"integration-secret").unwrap()
}

fn field() -> impl Strategy<Value = String> {
    "[ -~]{0,24}"
}

fn payload() -> impl Strategy<Value = SignaturePayload> {
    (field(), field(), field(), field(), prop::option::of(field()))
        .prop_map(|(id, holder, kind, date, issuer)| SignaturePayload::new(id, holder, kind, date, issuer))
}

#[test]
fn test_known_inputs_are_stable() {
    let payload = SignaturePayload::new("x", "y", "t", "2024-01-01", Some("Z".to_string()));
    let first = computer().compute(&payload);
    let second = computer().compute(&payload);
    assert_eq!(first, second);
    assert_eq!(first.len(), 64);
    assert!(first.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
}

#[test]
fn test_secret_changes_hash() {
    let payload = SignaturePayload::new("x", "y", "t", "2024-01-01", None);
    let other = SignatureComputer::new(b"another-secret").unwrap();
    assert_ne!(computer().compute(&payload), other.compute(&payload));
}

proptest! {
    /// Property: the hash is a pure function of the payload
    #[test]
    fn hash_is_deterministic(p in payload()) {
        prop_assert_eq!(computer().compute(&p), computer().compute(&p));
        prop_assert!(computer().verify(&p, &computer().compute(&p)));
    }

    /// Property: changing any single field changes the hash
    #[test]
    fn hash_is_sensitive_to_every_field(p in payload(), which in 0usize..5, suffix in "[a-z0-9]{1,4}") {
        let mut changed = p.clone();
        match which {
            0 => changed.id.push_str(&suffix),
            1 => changed.holder_id.push_str(&suffix),
            2 => changed.certification_type.push_str(&suffix),
            3 => changed.issue_date.push_str(&suffix),
            _ => changed.issuer = match p.issuer.clone() {
                Some(name) => Some(name + &suffix),
                None => Some(suffix.clone()),
            },
        }
        prop_assert_ne!(computer().compute(&p), computer().compute(&changed));
        prop_assert!(!computer().verify(&changed, &computer().compute(&p)));
    }

    /// Property: an absent issuer and an empty issuer hash differently
    #[test]
    fn missing_issuer_differs_from_empty(p in payload()) {
        let mut none = p.clone();
        none.issuer = None;
        let mut empty = p;
        empty.issuer = Some(String::new());
        prop_assert_ne!(computer().compute(&none), computer().compute(&empty));
    }
}
