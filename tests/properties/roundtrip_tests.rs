//! Property-based round-trip tests for the trust store snapshot format.

use chrono::{DateTime, TimeZone, Utc};
use proptest::prelude::*;

use skillgate::codec;
use skillgate::trust::{TrustStoreEntry, TrustStoreSnapshot};

fn arb_date() -> impl Strategy<Value = DateTime<Utc>> {
    (0i64..4_000_000_000).prop_map(|secs| Utc.timestamp_opt(secs, 0).unwrap())
}

fn arb_entry() -> impl Strategy<Value = TrustStoreEntry> {
    (
        "[a-z][a-z0-9-]{0,11}",
        proptest::option::of("[a-z][a-z0-9-]{0,15}"),
        arb_date(),
        "[A-Za-z0-9+/]{43}=",
    )
        .prop_map(|(key_id, scope_slug, added_at, fingerprint)| TrustStoreEntry {
            key_id,
            scope_slug,
            added_at,
            fingerprint,
        })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn snapshot_survives_encode_decode(
        entries in proptest::collection::vec(arb_entry(), 0..12),
        created_at in arb_date(),
    ) {
        let snapshot = TrustStoreSnapshot::with_created_at(entries, created_at);
        let bytes = codec::encode_snapshot(&snapshot).unwrap();
        let decoded = codec::decode_snapshot(&bytes).unwrap();
        prop_assert_eq!(decoded, snapshot);
    }

    #[test]
    fn snapshot_order_does_not_depend_on_input_order(
        mut entries in proptest::collection::vec(arb_entry(), 1..8),
        created_at in arb_date(),
    ) {
        let forward = TrustStoreSnapshot::with_created_at(entries.clone(), created_at);
        entries.reverse();
        let backward = TrustStoreSnapshot::with_created_at(entries, created_at);
        let keys = |s: &TrustStoreSnapshot| -> Vec<(String, Option<String>)> {
            s.entries.iter().map(|e| (e.key_id.clone(), e.scope_slug.clone())).collect()
        };
        prop_assert_eq!(keys(&forward), keys(&backward));
    }
}
