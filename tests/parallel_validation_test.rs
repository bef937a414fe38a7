mod common;

use rayon::prelude::*;
use validate_datatree::{DataTree, UnresolvedQueue, ValidationEngine, ValidationOptions, ValidationResults};

use common::InterfacesSchema;

#[test]
fn test_independent_trees_in_parallel() {
    let f = InterfacesSchema::new();
    let mut work: Vec<(DataTree, UnresolvedQueue)> = (1..=16)
        .map(|count| (f.config_tree(count).0, UnresolvedQueue::new()))
        .collect();

    let engine = ValidationEngine::new(&f.schema, ValidationOptions::CONFIG).unwrap();
    let results: Vec<ValidationResults> = work
        .par_iter_mut()
        .map(|(tree, queue)| engine.validate_tree(tree, queue))
        .collect();

    for (i, result) in results.iter().enumerate() {
        let count = i + 1;
        assert!(result.all_valid());
        assert_eq!(result.total_nodes, 1 + 4 * count);
    }
    assert!(work.iter().all(|(_, queue)| queue.is_empty()));
}

#[test]
fn test_parallel_results_match_sequential() {
    let f = InterfacesSchema::new();
    let build = || {
        (0..8)
            .map(|i| {
                let (mut tree, root) = f.config_tree(2);
                if i % 2 == 0 {
                    f.add_interface(&mut tree, root, "eth1");
                }
                tree
            })
            .collect::<Vec<_>>()
    };
    let engine = ValidationEngine::new(&f.schema, ValidationOptions::CONFIG).unwrap();

    let sequential: Vec<usize> = build()
        .iter_mut()
        .map(|tree| engine.validate_tree(tree, &mut UnresolvedQueue::new()).failed_nodes)
        .collect();
    let parallel: Vec<usize> = build()
        .par_iter_mut()
        .map(|tree| engine.validate_tree(tree, &mut UnresolvedQueue::new()).failed_nodes)
        .collect();

    assert_eq!(sequential, parallel);
    assert_eq!(sequential, [1, 0, 1, 0, 1, 0, 1, 0]);
}
