// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

fn rule(source: &str, dest: &str) -> PathMappingRule {
    PathMappingRule {
        source_path: source.to_string(),
        destination_path: dest.to_string(),
        source_path_format: PathFormat::Posix,
    }
}

#[test]
fn sorts_by_decreasing_component_count() {
    let mut rules = vec![rule("/a", "/x"), rule("/a/b/c", "/y"), rule("/a/b", "/z")];
    sort_path_mapping_rules(&mut rules);
    let counts: Vec<usize> = rules
        .iter()
        .map(|r| r.source_path.split('/').filter(|s| !s.is_empty()).count())
        .collect();
    assert_eq!(counts, vec![3, 2, 1]);
}

#[test]
fn stable_for_equal_component_counts() {
    let mut rules = vec![rule("/a/one", "/1"), rule("/b/two", "/2")];
    sort_path_mapping_rules(&mut rules);
    assert_eq!(rules[0].destination_path, "/1");
    assert_eq!(rules[1].destination_path, "/2");
}

#[test]
fn windows_format_counts_both_separators() {
    let mut rules = vec![
        rule("C:/a", "/x"),
        PathMappingRule {
            source_path: r"C:\a\b\c".to_string(),
            destination_path: "/y".to_string(),
            source_path_format: PathFormat::Windows,
        },
    ];
    sort_path_mapping_rules(&mut rules);
    assert_eq!(rules[0].destination_path, "/y");
}
