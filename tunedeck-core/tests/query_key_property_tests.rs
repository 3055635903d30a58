use proptest::prelude::*;
use serde_json::json;
use tunedeck_core::{keys, QueryKey};
use tunedeck_test_utils::generators::{arb_domain, arb_query_key, arb_record_id};

proptest! {
    #[test]
    fn every_key_starts_with_itself_and_its_root(key in arb_query_key()) {
        prop_assert!(key.starts_with(&key));
        prop_assert!(key.starts_with(&QueryKey::new()));
        let root = QueryKey::new().push(key.segments()[0].clone());
        prop_assert!(key.starts_with(&root));
    }

    #[test]
    fn truncated_keys_are_prefixes(key in arb_query_key(), cut in 0usize..4) {
        let keep = key.len().saturating_sub(cut);
        let prefix = key
            .segments()
            .iter()
            .take(keep)
            .fold(QueryKey::new(), |acc, segment| acc.push(segment.clone()));
        prop_assert!(key.starts_with(&prefix));
    }

    #[test]
    fn normalized_form_matches_equality(a in arb_query_key(), b in arb_query_key()) {
        prop_assert_eq!(a == b, a.normalized() == b.normalized());
    }

    #[test]
    fn detail_prefix_covers_nested_collections(id in arb_record_id()) {
        prop_assert!(keys::artist_albums(&id).starts_with(&keys::detail(keys::ARTISTS, &id)));
        prop_assert!(keys::playlist_tracks(&id).starts_with(&keys::detail(keys::PLAYLISTS, &id)));
        prop_assert!(!keys::playlist_tracks(&id).starts_with(&keys::lists(keys::PLAYLISTS)));
    }

    #[test]
    fn lists_never_cover_details(domain in arb_domain(), id in arb_record_id(), page in 1u32..9) {
        let list = keys::list(domain, Some(&json!({ "page": page })));
        prop_assert!(list.starts_with(&keys::lists(domain)));
        prop_assert!(!keys::detail(domain, &id).starts_with(&keys::lists(domain)));
    }
}
