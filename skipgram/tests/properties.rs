//! Property tests for the tree, the sampling table, and the update rule.

use ndarray::Array1;
use proptest::prelude::*;
use rand::rngs::StdRng;
use rand::SeedableRng;

use skipgram::{
    EmbeddingStore, Error, HuffmanTree, LearningRateSchedule, NegativeSamplingTable, Table,
    Vocabulary,
};

/// Minimum total weight of internal nodes over every possible merge order.
/// Exponential; only for tiny inputs.
fn brute_force_wpl(weights: &[u64]) -> u64 {
    if weights.len() <= 1 {
        return 0;
    }
    let mut best = u64::MAX;
    for i in 0..weights.len() {
        for j in (i + 1)..weights.len() {
            let merged = weights[i] + weights[j];
            let mut rest: Vec<u64> = weights
                .iter()
                .enumerate()
                .filter(|&(k, _)| k != i && k != j)
                .map(|(_, &w)| w)
                .collect();
            rest.push(merged);
            best = best.min(merged + brute_force_wpl(&rest));
        }
    }
    best
}

#[test]
fn known_small_tree_is_optimal() {
    let counts = [1, 1, 2, 3];
    let tree = HuffmanTree::from_counts(&counts).unwrap();
    assert_eq!(tree.weighted_path_length(), 13);
    assert_eq!(brute_force_wpl(&counts), 13);
}

proptest! {
    #[test]
    fn tree_shape(counts in prop::collection::vec(0u64..1000, 2..60)) {
        let tree = HuffmanTree::from_counts(&counts).unwrap();
        let v = counts.len();
        prop_assert_eq!(tree.num_leaves(), v);
        prop_assert_eq!(tree.num_internal(), v - 1);
        prop_assert_eq!(tree.num_nodes(), 2 * v - 1);
        prop_assert!(tree.node(tree.root()).parent.is_none());
        prop_assert_eq!(tree.node(tree.root()).frequency, counts.iter().sum::<u64>());

        for node in tree.nodes() {
            let depth = tree.depth(node.id);
            prop_assert_eq!(node.code.len(), depth);
            prop_assert_eq!(node.path.len(), depth);
            prop_assert_eq!(node.left.is_some(), node.right.is_some());
            prop_assert_eq!(node.is_leaf(), node.id < v);
            if let (Some(l), Some(r)) = (node.left, node.right) {
                prop_assert!(tree.node(l).is_left_child);
                prop_assert!(!tree.node(r).is_left_child);
                prop_assert_eq!(
                    node.frequency,
                    tree.node(l).frequency + tree.node(r).frequency
                );
            }
            if let Some(&last) = node.path.last() {
                prop_assert_eq!(Some(last), node.parent);
            }
            for &p in &node.path {
                prop_assert!(p >= v);
            }
        }

        // Leaf codes form a prefix-free set.
        for a in 0..v {
            for b in 0..v {
                if a != b {
                    prop_assert!(!tree.code(b).starts_with(tree.code(a)));
                }
            }
        }
    }

    #[test]
    fn tree_is_deterministic(counts in prop::collection::vec(1u64..5, 2..40)) {
        let a = HuffmanTree::from_counts(&counts).unwrap();
        let b = HuffmanTree::from_counts(&counts).unwrap();
        prop_assert_eq!(a, b);
    }

    #[test]
    fn tree_is_optimal(counts in prop::collection::vec(1u64..20, 2..7)) {
        let tree = HuffmanTree::from_counts(&counts).unwrap();
        prop_assert_eq!(tree.weighted_path_length(), brute_force_wpl(&counts));
    }

    #[test]
    fn frequent_tokens_never_get_longer_codes(counts in prop::collection::vec(1u64..100, 2..30)) {
        let tree = HuffmanTree::from_counts(&counts).unwrap();
        for a in 0..counts.len() {
            for b in 0..counts.len() {
                if counts[a] > counts[b] {
                    prop_assert!(tree.code(a).len() <= tree.code(b).len());
                }
            }
        }
    }

    #[test]
    fn draws_skip_the_excluded_target(
        counts in prop::collection::vec(1u64..50, 2..20),
        seed in any::<u64>(),
    ) {
        let table = NegativeSamplingTable::from_counts(&counts, 0.75, 10_000).unwrap();
        let mut rng = StdRng::seed_from_u64(seed);
        let target = (seed as usize) % counts.len();
        for _ in 0..50 {
            match table.draw(&mut rng, &[target]) {
                Ok(id) => prop_assert_ne!(id, target),
                Err(err) => prop_assert!(
                    matches!(err, Error::SamplingExhausted { .. }),
                    "unexpected error {}", err
                ),
            }
        }
    }

    #[test]
    fn apply_gradient_is_additive(
        d1 in prop::collection::vec(-10.0f32..10.0, 6),
        d2 in prop::collection::vec(-10.0f32..10.0, 6),
        lr in 0.0001f32..1.0,
    ) {
        let mut rng = StdRng::seed_from_u64(0);
        let mut a = EmbeddingStore::new(4, 6, &mut rng);
        let mut b = a.clone();
        let d1 = Array1::from(d1);
        let d2 = Array1::from(d2);
        a.apply_gradient(Table::Output, 2, d1.view(), lr);
        a.apply_gradient(Table::Output, 2, d2.view(), lr);
        b.apply_gradient(Table::Output, 2, (&d1 + &d2).view(), lr);
        for (x, y) in a.get_output(2).iter().zip(b.get_output(2)) {
            prop_assert!((x - y).abs() <= 1e-4 * (1.0 + y.abs()), "{} vs {}", x, y);
        }
    }

    #[test]
    fn learning_rate_never_below_floor(
        initial in 0.001f32..1.0,
        interval in 1u64..1000,
        total in 1u64..100_000,
        min_fraction in 0.001f32..1.0,
        processed in 0u64..10_000_000,
    ) {
        let schedule = LearningRateSchedule::new(initial, interval, total, min_fraction);
        let rate = schedule.rate_at(processed);
        prop_assert!(rate >= schedule.floor());
        prop_assert!(rate <= initial);
    }
}

#[test]
fn smoothing_lowers_the_dominant_share() {
    let vocab = Vocabulary::from_counts(vec![
        ("rare".to_string(), 1),
        ("odd".to_string(), 1),
        ("common".to_string(), 98),
    ])
    .unwrap();
    let table = NegativeSamplingTable::build(&vocab, 0.75, 1_000_000).unwrap();
    let raw_share = 98.0 / 100.0;
    assert!(table.share(2) < raw_share);
    assert!(table.share(0) > 1.0 / 100.0);
}
