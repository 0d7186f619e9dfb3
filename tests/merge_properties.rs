//! Merge properties
//!
//! Behavior of `merge` across every flag combination on the public API.

use serde_json::json;
use unitbuild::config::merge_layers;
use unitbuild::{merge, ConfigNode, MergePolicy};

fn node(value: serde_json::Value) -> ConfigNode {
    ConfigNode::from_json(value).unwrap()
}

fn all_policies() -> [MergePolicy; 4] {
    [
        MergePolicy::new(false, false),
        MergePolicy::new(false, true),
        MergePolicy::new(true, false),
        MergePolicy::new(true, true),
    ]
}

#[test]
fn test_empty_src_is_identity() {
    let dist = node(json!({"flags": {"c": ["-O2"]}, "output": "app"}));
    for policy in all_policies() {
        assert_eq!(merge(dist.clone(), ConfigNode::new(), policy), dist, "{:?}", policy);
    }
}

#[test]
fn test_empty_dist_takes_src() {
    let src = node(json!({"flags": {"ld": ["-lm"]}, "sources": ["*.c"]}));
    for policy in all_policies() {
        assert_eq!(merge(ConfigNode::new(), src.clone(), policy), src, "{:?}", policy);
    }
}

#[test]
fn test_no_overwrite_keeps_every_existing_key() {
    let dist = node(json!({
        "flags": {"c": ["-O2"]},
        "output": "app"
    }));
    let src = node(json!({
        "flags": {"c": ["-O0"], "cpp": ["-g"]},
        "output": "other",
        "build_dir": "out"
    }));

    for mix in [false, true] {
        let merged = merge(dist.clone(), src.clone(), MergePolicy::new(false, mix));
        assert_eq!(merged.get("flags"), dist.get("flags"));
        assert_eq!(merged.get("output"), dist.get("output"));
        assert_eq!(merged.get("build_dir"), src.get("build_dir"));
    }
}

#[test]
fn test_replace_without_mix_swaps_whole_tables() {
    let dist = node(json!({"flags": {"c": ["-O2"], "ld": ["-lm"]}}));
    let src = node(json!({"flags": {"c": ["-O0"]}}));

    let merged = merge(dist, src, MergePolicy::REPLACE);
    assert_eq!(merged.to_json(), json!({"flags": {"c": ["-O0"]}}));
}

#[test]
fn test_overlay_recurses_into_tables() {
    let dist = node(json!({
        "flags": {"c": ["-O2"], "ld": ["-lm"]},
        "tools": {"c": "cc"}
    }));
    let src = node(json!({
        "flags": {"c": ["-O0"], "cpp": ["-g"]},
        "tools": "none"
    }));

    let merged = merge(dist, src, MergePolicy::OVERLAY);
    assert_eq!(
        merged.to_json(),
        json!({
            "flags": {"c": ["-O0"], "cpp": ["-g"], "ld": ["-lm"]},
            "tools": "none"
        })
    );
}

#[test]
fn test_lists_are_never_concatenated() {
    let dist = node(json!({"sources": ["a.c", "b.c"]}));
    let src = node(json!({"sources": ["c.c"]}));

    for policy in [MergePolicy::REPLACE, MergePolicy::OVERLAY] {
        let merged = merge(dist.clone(), src.clone(), policy);
        assert_eq!(merged.to_json(), json!({"sources": ["c.c"]}));
    }
}

#[test]
fn test_src_is_left_intact() {
    let src = node(json!({"flags": {"c": ["-O0"]}}));
    let before = src.clone();

    let mut merged = merge(ConfigNode::new(), src.clone(), MergePolicy::OVERLAY);
    merged.insert("output", "changed");

    assert_eq!(src, before);
}

#[test]
fn test_layers_later_wins() {
    let merged = merge_layers([
        node(json!({"build_dir": "build", "flags": {"c": ["-O2"]}})),
        node(json!({"flags": {"ld": ["-lm"]}})),
        node(json!({"build_dir": "out"})),
    ]);

    assert_eq!(
        merged.to_json(),
        json!({"build_dir": "out", "flags": {"c": ["-O2"], "ld": ["-lm"]}})
    );
}
