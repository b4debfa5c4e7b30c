//! Property-based tests over the pure building blocks.

use std::collections::HashSet;

use proptest::prelude::*;

use repograph::indexer::chunker::TextChunker;
use repograph::indexer::hierarchy::{resolve, Span};
use repograph::indexer::identity::{fingerprint, stable_id, version_id, VersionKey};
use repograph::types::SymbolKind;

// ---------------------------------------------------------------------------
// Strategy helpers
// ---------------------------------------------------------------------------

fn arb_span() -> impl Strategy<Value = Span> {
    (1u32..200, 0u32..60).prop_map(|(start, len)| Span::new(start, start + len))
}

fn arb_symbol_kind() -> impl Strategy<Value = SymbolKind> {
    prop_oneof![
        Just(SymbolKind::Function),
        Just(SymbolKind::Method),
        Just(SymbolKind::Class),
        Just(SymbolKind::Struct),
        Just(SymbolKind::Trait),
    ]
}

/// Text made of short words and newlines, including multi-byte chars.
fn arb_document() -> impl Strategy<Value = String> {
    proptest::collection::vec(
        prop_oneof![
            "[a-z]{1,12}".prop_map(|w| w + " "),
            Just("\n".to_string()),
            Just("é ".to_string()),
            Just("日本 ".to_string()),
        ],
        1..400,
    )
    .prop_map(|parts| parts.concat())
}

// ---------------------------------------------------------------------------
// Hierarchy
// ---------------------------------------------------------------------------

proptest! {
    #[test]
    fn hierarchy_edges_are_strict_and_single_parent(
        spans in proptest::collection::vec(arb_span(), 0..40),
    ) {
        let h = resolve(&spans);

        let mut children = HashSet::new();
        for &(parent, child) in &h.edges {
            prop_assert_ne!(parent, child);
            prop_assert!(spans[parent].strictly_contains(&spans[child]));
            prop_assert!(children.insert(child), "child {} has two parents", child);
        }
        prop_assert!(h.edges.len() + h.violations <= spans.len());
    }

    #[test]
    fn hierarchy_of_disjoint_spans_is_flat(count in 1usize..30) {
        let spans: Vec<Span> = (0..count as u32)
            .map(|i| Span::new(i * 10 + 1, i * 10 + 5))
            .collect();
        let h = resolve(&spans);
        prop_assert!(h.edges.is_empty());
        prop_assert_eq!(h.violations, 0);
    }

    #[test]
    fn hierarchy_of_a_nest_is_a_chain(depth in 1usize..30) {
        // Reverse order of the adapter output must not matter.
        let spans: Vec<Span> = (0..depth as u32).rev().map(|i| Span::new(i + 1, 100 - i)).collect();
        let h = resolve(&spans);
        prop_assert_eq!(h.edges.len(), depth - 1);
        prop_assert_eq!(h.violations, 0);
    }
}

// ---------------------------------------------------------------------------
// Chunking
// ---------------------------------------------------------------------------

proptest! {
    #[test]
    fn chunks_without_overlap_reconstruct_the_document(doc in arb_document(), size in 1usize..300) {
        let chunks = TextChunker::new(size, 0).chunk(&doc);
        if doc.trim().is_empty() {
            prop_assert!(chunks.is_empty());
        } else {
            let joined: String = chunks.iter().map(|c| c.text.as_str()).collect();
            prop_assert_eq!(joined, doc);
        }
    }

    #[test]
    fn chunks_respect_window_and_cover_both_ends(
        doc in arb_document(),
        size in 2usize..300,
        overlap_pct in 0usize..90,
    ) {
        prop_assume!(!doc.trim().is_empty());
        let overlap = size * overlap_pct / 100;
        let chunks = TextChunker::new(size, overlap).chunk(&doc);

        prop_assert!(!chunks.is_empty());
        prop_assert!(doc.starts_with(chunks[0].text.as_str()));
        prop_assert!(doc.ends_with(chunks[chunks.len() - 1].text.as_str()));
        prop_assert_eq!(chunks[0].start_line, 0);
        prop_assert_eq!(
            chunks[chunks.len() - 1].end_line as usize,
            doc.matches('\n').count()
        );
        for (i, chunk) in chunks.iter().enumerate() {
            prop_assert_eq!(chunk.position as usize, i);
            prop_assert!(chunk.text.chars().count() <= size);
            prop_assert!(doc.contains(chunk.text.as_str()));
            prop_assert!(chunk.start_line <= chunk.end_line);
        }
        for pair in chunks.windows(2) {
            prop_assert!(pair[0].start_line <= pair[1].start_line);
        }
    }
}

// ---------------------------------------------------------------------------
// Identity
// ---------------------------------------------------------------------------

proptest! {
    #[test]
    fn version_id_is_hex_and_commit_sensitive(
        path in "[a-z]{1,8}/[a-z]{1,8}\\.py",
        name in "[a-z_]{1,16}",
        kind in arb_symbol_kind(),
        start in 1u32..1000,
        len in 0u32..100,
        commit_a in "[0-9a-f]{7}",
        commit_b in "[0-9a-f]{7}",
    ) {
        let key = |commit: &str| version_id(&VersionKey {
            commit_sha: commit,
            relative_path: &path,
            kind,
            name: &name,
            qualified_name: Some(&name),
            start_line: start,
            end_line: start + len,
        });
        let a = key(&commit_a);
        prop_assert_eq!(a.len(), 64);
        prop_assert!(a.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
        prop_assert_eq!(a.clone(), key(&commit_a));
        if commit_a != commit_b {
            prop_assert_ne!(a, key(&commit_b));
        }
    }

    #[test]
    fn fingerprint_separates_field_boundaries(
        a in proptest::collection::vec("[a-z_]{0,6}", 1..6),
        b in proptest::collection::vec("[a-z_]{0,6}", 1..6),
    ) {
        let fa = fingerprint(&a);
        let fb = fingerprint(&b);
        prop_assert!(fa.is_some());
        prop_assert_eq!(a == b, fa == fb);
    }

    #[test]
    fn stable_id_ignores_position_but_not_structure(
        repo in "[a-z]{1,8}",
        name in "[a-z_]{1,12}",
        kind in arb_symbol_kind(),
        types in proptest::collection::vec("[a-z_]{1,10}", 1..8),
    ) {
        let fp = fingerprint(&types);
        let id = stable_id(&repo, kind, Some(&name), fp.as_deref(), &name);
        prop_assert_eq!(id.clone(), stable_id(&repo, kind, Some(&name), fp.as_deref(), &name));

        let mut changed = types.clone();
        changed.push("extra_node".to_string());
        let other = fingerprint(&changed);
        prop_assert_ne!(id.clone(), stable_id(&repo, kind, Some(&name), other.as_deref(), &name));

        let other_repo = format!("{repo}-fork");
        prop_assert_ne!(id, stable_id(&other_repo, kind, Some(&name), fp.as_deref(), &name));
    }
}
