//! Integration test: parameter grid expansion

use house_rent::optimizer::{expand_grid, ParamGrid, ParameterValue};
use house_rent::RentError;

fn candidates(entries: Vec<(&str, Vec<ParameterValue>)>) -> Vec<(String, Vec<ParameterValue>)> {
    entries.into_iter().map(|(k, v)| (k.to_string(), v)).collect()
}

#[test]
fn test_two_keys_product() {
    let grid = candidates(vec![
        ("a", vec![1i64.into(), 2i64.into()]),
        ("b", vec![3i64.into()]),
    ]);

    let sets = expand_grid(&grid);
    assert_eq!(sets.len(), 2);
    assert_eq!(sets[0].get("a"), Some(&ParameterValue::Int(1)));
    assert_eq!(sets[0].get("b"), Some(&ParameterValue::Int(3)));
    assert_eq!(sets[1].get("a"), Some(&ParameterValue::Int(2)));
    assert_eq!(sets[1].get("b"), Some(&ParameterValue::Int(3)));
}

#[test]
fn test_empty_candidate_list_yields_nothing() {
    let grid = candidates(vec![
        ("a", vec![1i64.into(), 2i64.into()]),
        ("b", vec![]),
    ]);
    assert!(expand_grid(&grid).is_empty());
}

#[test]
fn test_last_key_varies_fastest() {
    let grid = candidates(vec![
        ("lr", vec![0.01.into(), 0.1.into()]),
        ("depth", vec![3i64.into(), 5i64.into()]),
    ]);

    let order: Vec<String> = expand_grid(&grid).iter().map(|s| s.to_string()).collect();
    assert_eq!(
        order,
        vec![
            "{lr: 0.01, depth: 3}",
            "{lr: 0.01, depth: 5}",
            "{lr: 0.1, depth: 3}",
            "{lr: 0.1, depth: 5}",
        ]
    );
}

#[test]
fn test_default_param_grid() {
    let grid = ParamGrid::default();
    let sets = grid.expand();

    assert_eq!(sets.len(), 1);
    let map = sets[0].to_string_map();
    assert_eq!(map.get("learning_rate").map(String::as_str), Some("0.01"));
    assert_eq!(map.get("max_depth").map(String::as_str), Some("3"));
    assert_eq!(map.get("max_features").map(String::as_str), Some("1.0"));
}

#[test]
fn test_param_grid_size_matches_expansion() {
    let grid = ParamGrid::new(vec![0.01, 0.05, 0.1], vec![2, 3], vec![0.5, 1.0]);
    assert_eq!(grid.size(), 12);
    assert_eq!(grid.expand().len(), 12);
    assert!(grid.validate().is_ok());
}

#[test]
fn test_param_grid_validation() {
    let empty = ParamGrid::new(vec![0.01], vec![], vec![1.0]);
    assert!(matches!(empty.validate(), Err(RentError::EmptyGrid(name)) if name == "max_depth"));

    let bad_fraction = ParamGrid::new(vec![0.01], vec![3], vec![1.5]);
    assert!(matches!(bad_fraction.validate(), Err(RentError::InvalidParameter { .. })));
}
