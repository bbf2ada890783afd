//! Property-based tests for hostbridge
//!
//! These tests verify:
//! - Enum string round-trips (to_string → parse)
//! - Item cache lookups agree with the snapshot they were built from
//! - Template expansion only changes the substituted fields
//! - Text helpers produce host-safe output

use std::collections::HashMap;

use proptest::prelude::*;
use serde_json::{Map, Value, json};
use strum::IntoEnumIterator;

use hostbridge::command_queue::HostError;
use hostbridge::expand::expand_actions;
use hostbridge::interpreter::ResourceCatalog;
use hostbridge::item_cache::{HostItem, ItemCache};
use hostbridge::script_template::text::slug;
use hostbridge::types::{CustomAction, ResourceKind, TransitionType};

// =============================================================================
// Enum Property Tests
// =============================================================================

fn transition_strategy() -> impl Strategy<Value = TransitionType> {
    proptest::sample::select(TransitionType::iter().collect::<Vec<_>>())
}

fn resource_kind_strategy() -> impl Strategy<Value = ResourceKind> {
    proptest::sample::select(ResourceKind::iter().collect::<Vec<_>>())
}

proptest! {
    #[test]
    fn transition_roundtrip(kind in transition_strategy()) {
        let s = kind.to_string();
        let parsed: TransitionType = s.parse().expect("Should parse");
        prop_assert_eq!(kind, parsed);
    }

    /// The strum and serde spellings agree
    #[test]
    fn transition_serde_matches_display(kind in transition_strategy()) {
        prop_assert_eq!(serde_json::to_value(kind).unwrap(), json!(kind.to_string()));
    }

    #[test]
    fn resource_kind_roundtrip(kind in resource_kind_strategy()) {
        let parsed: ResourceKind = kind.to_string().parse().expect("Should parse");
        prop_assert_eq!(kind, parsed);
    }
}

// =============================================================================
// Item Cache Property Tests
// =============================================================================

fn item_strategy() -> impl Strategy<Value = HostItem> {
    (any::<u64>(), "[a-z]{1,6}", "[a-z]{1,6}").prop_map(|(id, name, parent)| HostItem {
        id,
        name,
        kind: "CompItem".to_string(),
        parent_folder: parent,
    })
}

proptest! {
    #[test]
    fn cache_lookup_matches_snapshot(
        items in proptest::collection::vec(item_strategy(), 0..20),
        probe in "[a-z]{1,6}",
    ) {
        let mut cache = ItemCache::new();
        cache.replace_all(items.clone());

        let expected = items.iter().any(|item| item.name == probe);
        prop_assert_eq!(cache.contains(&probe), expected);
        prop_assert_eq!(cache.needs_creation(&probe), !expected);
        prop_assert_eq!(cache.find(&probe).is_some(), expected);
    }

    /// After removing a folder nothing named after it or inside it remains
    #[test]
    fn remove_named_clears_folder(
        items in proptest::collection::vec(item_strategy(), 0..20),
        folder in "[a-z]{1,6}",
    ) {
        let mut cache = ItemCache::new();
        cache.replace_all(items.clone());
        let removed = cache.remove_named(&folder);

        prop_assert!(!cache.contains(&folder));
        prop_assert!(cache.folder_items(&folder).is_empty());
        prop_assert_eq!(cache.len() + removed, items.len());
    }
}

// =============================================================================
// Template Expansion Property Tests
// =============================================================================

fn title_templates() -> HashMap<String, Vec<Value>> {
    let mut templates = HashMap::new();
    templates.insert(
        "title".to_string(),
        vec![
            json!({"change_type": "update_layer_property", "comp_name": "Card",
                   "layer_name": "Headline", "property_name": "Source Text",
                   "value": "{text}"}),
            json!({"change_type": "add_marker", "comp_name": "Card",
                   "layer_name": "Headline", "marker_name": "m-{text}",
                   "marker_time": "{at}"}),
        ],
    );
    templates
}

fn invoke(text: &str, at: f64) -> CustomAction {
    let mut values = Map::new();
    values.insert("text".to_string(), json!(text));
    values.insert("at".to_string(), json!(at));
    CustomAction::Template {
        template_name: "title".to_string(),
        template_values: values,
    }
}

proptest! {
    /// Expanding the same template with different arguments changes the
    /// substituted fields and nothing else.
    #[test]
    fn expansion_only_touches_placeholders(
        a in "[A-Za-z0-9 ]{1,12}",
        b in "[A-Za-z0-9 ]{1,12}",
        at in 0.0f64..600.0,
    ) {
        let templates = title_templates();
        let first = expand_actions(&[invoke(&a, at)], &templates).unwrap();
        let second = expand_actions(&[invoke(&b, at)], &templates).unwrap();
        prop_assert_eq!(first.len(), 2);
        prop_assert_eq!(second.len(), 2);

        match (&first[0], &second[0]) {
            (
                CustomAction::UpdateLayerProperty { value: va, layer_name: la, .. },
                CustomAction::UpdateLayerProperty { value: vb, layer_name: lb, .. },
            ) => {
                prop_assert_eq!(va, &json!(a));
                prop_assert_eq!(vb, &json!(b));
                prop_assert_eq!(la, lb);
            }
            other => prop_assert!(false, "unexpected actions {:?}", other),
        }
        match (&first[1], &second[1]) {
            (
                CustomAction::AddMarker { marker_name: ma, marker_time: ta, .. },
                CustomAction::AddMarker { marker_name: mb, marker_time: tb, .. },
            ) => {
                prop_assert_eq!(ma, &format!("m-{}", a));
                prop_assert_eq!(mb, &format!("m-{}", b));
                prop_assert_eq!(ta, tb);
                prop_assert_eq!(*ta, at);
            }
            other => prop_assert!(false, "unexpected actions {:?}", other),
        }
    }

    /// Concrete actions pass through expansion untouched
    #[test]
    fn concrete_actions_are_unchanged(time in 0.0f64..600.0, name in "[a-z]{1,8}") {
        let action = CustomAction::AddMarker {
            comp_name: "Card".to_string(),
            layer_name: "Headline".to_string(),
            marker_name: name,
            marker_time: time,
        };
        let expanded = expand_actions(std::slice::from_ref(&action), &HashMap::new()).unwrap();
        prop_assert_eq!(expanded, vec![action]);
    }
}

// =============================================================================
// Text and Parsing Property Tests
// =============================================================================

proptest! {
    #[test]
    fn slug_is_host_safe_and_idempotent(input in "\\PC{0,40}") {
        let s = slug(&input);
        prop_assert!(s.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-'));
        prop_assert!(!s.starts_with('-') && !s.ends_with('-'));
        prop_assert!(!s.contains("--"));
        prop_assert_eq!(slug(&s), s);
    }

    #[test]
    fn host_error_line_prefix(line in any::<u32>(), message in "[A-Za-z][A-Za-z :]{0,30}") {
        let error = HostError::parse(&format!("{} {}", line, message));
        prop_assert_eq!(error.line, Some(line));
        prop_assert_eq!(error.message, message.trim());
    }

    #[test]
    fn effective_duration_prefers_nonzero_request(
        cached in 0.0f64..1000.0,
        requested in proptest::option::of(0.0f64..1000.0),
    ) {
        let mut catalog = ResourceCatalog::new();
        catalog.insert("clip", cached);
        let effective = catalog.effective_duration("clip", requested);
        match requested {
            Some(d) if d != 0.0 => prop_assert_eq!(effective, d),
            _ => prop_assert_eq!(effective, cached),
        }
    }
}
