//! Path-free searches over [`RawNode`] trees
//!
//! All functions here are pure and total: an unexpected shape yields an empty
//! result, never a panic or an error.

use crate::node::RawNode;
use crate::types::Fields;

/// Find the first non-null value stored under `field` anywhere in the tree
///
/// Depth-first and pre-order: at a map its own keys are checked before any
/// value is descended, values are descended in insertion order, and list
/// elements by index. Returns `None` when nothing matches.
pub fn find_first<'a>(tree: &'a RawNode, field: &str) -> Option<&'a RawNode> {
    match tree {
        RawNode::Map(entries) => entries
            .iter()
            .find(|(key, value)| key == field && !value.is_null())
            .map(|(_, value)| value)
            .or_else(|| entries.iter().find_map(|(_, value)| find_first(value, field))),
        RawNode::List(items) => items.iter().find_map(|item| find_first(item, field)),
        RawNode::Scalar(_) => None,
    }
}

/// Collect every non-null value stored under `field`, in [`find_first`] order
///
/// Matches nested inside an earlier match are included after it.
pub fn find_all<'a>(tree: &'a RawNode, field: &str) -> Vec<&'a RawNode> {
    let mut found = Vec::new();
    collect_matches(tree, field, &mut found);
    found
}

fn collect_matches<'a>(tree: &'a RawNode, field: &str, found: &mut Vec<&'a RawNode>) {
    match tree {
        RawNode::Map(entries) => {
            found.extend(
                entries
                    .iter()
                    .filter(|(key, value)| key == field && !value.is_null())
                    .map(|(_, value)| value),
            );
            for (_, value) in entries {
                collect_matches(value, field, found);
            }
        }
        RawNode::List(items) => {
            for item in items {
                collect_matches(item, field, found);
            }
        }
        RawNode::Scalar(_) => {}
    }
}

/// Left-fold fragments of one logical record into a single field map
///
/// Maps contribute their entries (last write wins), nested lists are folded
/// in order, and leaves are ignored.
pub fn merge_fragments(fragments: &[RawNode]) -> Fields {
    let mut merged = Fields::new();
    for fragment in fragments {
        fold_into(&mut merged, fragment);
    }
    merged
}

/// [`merge_fragments`] for a single node that may itself be a map or a list
pub fn merge_node(node: &RawNode) -> Fields {
    let mut merged = Fields::new();
    fold_into(&mut merged, node);
    merged
}

fn fold_into(merged: &mut Fields, node: &RawNode) {
    match node {
        RawNode::Map(entries) => {
            for (key, value) in entries {
                merged.insert(key.clone(), value.clone());
            }
        }
        RawNode::List(items) => {
            for item in items {
                fold_into(merged, item);
            }
        }
        RawNode::Scalar(_) => {}
    }
}

/// Entries of a `{"0": .., "1": .., "count": N}` map, ordered by index
///
/// `count` and any other non-numeric key are ignored. A list is returned
/// element by element; leaves yield nothing.
pub fn indexed_collection(node: &RawNode) -> Vec<&RawNode> {
    match node {
        RawNode::Map(entries) => {
            let mut indexed: Vec<(usize, &RawNode)> = entries
                .iter()
                .filter_map(|(key, value)| key.parse::<usize>().ok().map(|idx| (idx, value)))
                .collect();
            indexed.sort_by_key(|(idx, _)| *idx);
            indexed.into_iter().map(|(_, value)| value).collect()
        }
        RawNode::List(items) => items.iter().collect(),
        RawNode::Scalar(_) => Vec::new(),
    }
}

/// Strip single-element wrapper lists (`[[{..}]]` -> `{..}`)
pub fn unwrap_singleton(mut node: &RawNode) -> &RawNode {
    while let RawNode::List(items) = node {
        match items.as_slice() {
            [only] => node = only,
            _ => break,
        }
    }
    node
}

/// View a node as a list: lists as-is, null as empty, anything else as one item
pub fn as_list(node: &RawNode) -> Vec<&RawNode> {
    match node {
        RawNode::List(items) => items.iter().collect(),
        other if other.is_null() => Vec::new(),
        other => vec![other],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn tree(value: serde_json::Value) -> RawNode {
        RawNode::from(value)
    }

    #[test]
    fn test_find_first_missing_field_is_none() {
        let t = tree(json!({"a": [1, {"b": {"c": null}}], "d": "x"}));
        assert!(find_first(&t, "nope").is_none());
        assert!(find_first(&RawNode::null(), "a").is_none());
        assert!(find_first(&tree(json!([])), "a").is_none());
    }

    #[test]
    fn test_find_first_prefers_own_keys_then_insertion_order() {
        let t = tree(json!({
            "wrapper": {"name": "deep"},
            "name": "shallow"
        }));
        assert_eq!(find_first(&t, "name").and_then(RawNode::as_text).as_deref(), Some("shallow"));

        let t = tree(json!([{"x": {"name": "first"}}, {"name": "second"}]));
        assert_eq!(find_first(&t, "name").and_then(RawNode::as_text).as_deref(), Some("first"));
    }

    #[test]
    fn test_find_first_skips_null_matches() {
        let t = tree(json!({"current_date": null, "league": [{"current_date": "2025-01-05"}]}));
        assert_eq!(
            find_first(&t, "current_date").and_then(RawNode::as_text).as_deref(),
            Some("2025-01-05")
        );
    }

    #[test]
    fn test_find_all_collects_siblings_and_nested() {
        let t = tree(json!({
            "stats": [
                {"stat": {"stat_id": "5", "value": "10"}},
                {"stat": {"stat_id": "6", "value": "3"}}
            ],
            "bonus": {"stat": {"stat_id": "9", "value": "1"}}
        }));
        let ids: Vec<String> = find_all(&t, "stat_id").into_iter().filter_map(RawNode::as_text).collect();
        assert_eq!(ids, vec!["5", "6", "9"]);
        assert_eq!(find_all(&t, "stat").len(), 3);
    }

    #[test]
    fn test_find_all_first_element_agrees_with_find_first() {
        let t = tree(json!([
            {"meta": {"team": {"team_key": "inner"}}},
            {"team": {"team_key": "outer"}}
        ]));
        let first = find_first(&t, "team_key");
        let all = find_all(&t, "team_key");
        assert_eq!(all.first().copied(), first);
        assert_eq!(all.len(), 2);
    }

    #[test]
    fn test_merge_fragments_is_order_insensitive_without_collisions() {
        let a = tree(json!({"a": 1}));
        let b = tree(json!({"b": 2}));
        let ab = merge_fragments(&[a.clone(), b.clone()]);
        let ba = merge_fragments(&[b, a]);
        assert_eq!(ab, ba);
        assert_eq!(ab.get("a").and_then(RawNode::as_text).as_deref(), Some("1"));
        assert_eq!(ab.get("b").and_then(RawNode::as_text).as_deref(), Some("2"));
    }

    #[test]
    fn test_merge_fragments_last_value_wins() {
        let merged = merge_fragments(&[
            tree(json!({"status": "DTD", "name": "A"})),
            tree(json!({"status": "INJ"})),
        ]);
        assert_eq!(merged.get("status").and_then(RawNode::as_text).as_deref(), Some("INJ"));
        assert_eq!(merged.len(), 2);
    }

    #[test]
    fn test_merge_node_flattens_nested_fragment_lists() {
        let player = tree(json!([
            [{"player_key": "466.p.4912"}, {"player_id": "4912"}, [], {"name": {"full": "A B"}}],
            {"player_stats": {"stats": []}}
        ]));
        let merged = merge_node(&player);
        assert!(merged.contains_key("player_key"));
        assert!(merged.contains_key("player_id"));
        assert!(merged.contains_key("name"));
        assert!(merged.contains_key("player_stats"));
    }

    #[test]
    fn test_indexed_collection_orders_numerically_and_ignores_count() {
        let t = tree(json!({"count": 11, "10": "k", "2": "c", "0": "a", "1": "b"}));
        let items: Vec<String> = indexed_collection(&t).into_iter().filter_map(RawNode::as_text).collect();
        assert_eq!(items, vec!["a", "b", "c", "k"]);

        assert!(indexed_collection(&RawNode::text("x")).is_empty());
        assert_eq!(indexed_collection(&tree(json!([1, 2]))).len(), 2);
    }

    #[test]
    fn test_unwrap_singleton_and_as_list() {
        let t = tree(json!([[{"a": 1}]]));
        assert!(unwrap_singleton(&t).is_map());

        let pair = tree(json!([{"a": 1}, {"b": 2}]));
        assert_eq!(unwrap_singleton(&pair), &pair);

        assert_eq!(as_list(&RawNode::null()).len(), 0);
        assert_eq!(as_list(&tree(json!({"a": 1}))).len(), 1);
        assert_eq!(as_list(&pair).len(), 2);
    }
}
