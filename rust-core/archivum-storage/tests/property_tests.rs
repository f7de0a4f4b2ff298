// SPDX-License-Identifier: PMPL-1.0-or-later
//! Property-based tests for storage addressing

use std::sync::Arc;

use archivum_storage::{copy_tree, InMemoryBackend, StorageBackend, StoragePath};
use proptest::prelude::*;

/// Non-empty segments, including separator and escape characters.
fn arb_segment() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9 ,.%/_-]{1,12}"
}

fn arb_path() -> impl Strategy<Value = StoragePath> {
    prop::collection::vec(arb_segment(), 1..6)
        .prop_map(|segments| StoragePath::from_segments(segments).unwrap())
}

proptest! {
    #[test]
    fn test_parse_inverts_display(path in arb_path()) {
        let text = path.to_string();
        let parsed = StoragePath::parse(&text).unwrap();
        prop_assert_eq!(parsed, path);
    }

    #[test]
    fn test_display_inverts_parse(path in arb_path()) {
        let text = path.to_string();
        prop_assert_eq!(StoragePath::parse(&text).unwrap().to_string(), text);
    }

    #[test]
    fn test_child_extends_by_one_segment(path in arb_path(), segment in arb_segment()) {
        let child = path.child(segment.clone()).unwrap();
        prop_assert_eq!(child.len(), path.len() + 1);
        prop_assert_eq!(child.name(), segment.as_str());
        prop_assert_eq!(child.parent().unwrap(), path.clone());
        prop_assert!(child.starts_with(&path));
        prop_assert!(child.to_string().starts_with(&path.descendant_prefix()));
    }

    #[test]
    fn test_equality_follows_segments(a in arb_path(), b in arb_path()) {
        prop_assert_eq!(a == b, a.segments() == b.segments());
        prop_assert_eq!(a == b, a.to_string() == b.to_string());
    }
}

#[tokio::test]
async fn test_copy_tree_preserves_relative_layout() {
    let source = InMemoryBackend::new();
    let dest: Arc<dyn StorageBackend> = Arc::new(InMemoryBackend::new());
    let from = StoragePath::parse("corpora/aip-1").unwrap();
    let to = StoragePath::parse("aip/new-id").unwrap();

    source.put(&from.child("aip.json").unwrap(), b"{}").await.unwrap();
    source
        .put(&from.join(["representations", "r1", "data", "f.txt"]).unwrap(), b"hello")
        .await
        .unwrap();
    source
        .put(&StoragePath::parse("corpora/aip-2/aip.json").unwrap(), b"{}")
        .await
        .unwrap();

    let written = copy_tree(&source, &from, dest.as_ref(), &to).await.unwrap();
    assert_eq!(written.len(), 2);
    assert_eq!(
        dest.get(&StoragePath::parse("aip/new-id/representations/r1/data/f.txt").unwrap())
            .await
            .unwrap(),
        Some(b"hello".to_vec())
    );
    assert!(dest.list_under(&StoragePath::parse("aip").unwrap()).await.unwrap().len() == 2);
}
