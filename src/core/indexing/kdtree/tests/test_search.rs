// src/core/indexing/kdtree/tests/test_search.rs

#[cfg(test)]
mod search_tests {
    use approx::assert_relative_eq;
    use std::sync::Arc;

    use crate::core::common::KdTreeError;
    use crate::core::indexing::kdtree::tests::common::{
        brute_force_knn, random_rows, sequential_ids, tree_with,
    };
    use crate::core::indexing::kdtree::{DecompositionMode, KdTree, PivotMode};

    // Points: (2,3), (5,4), (9,6), (4,7), (8,1), (7,2)
    fn six_point_tree(max_leaf_size: usize) -> KdTree {
        let mut tree = tree_with(2, DecompositionMode::Orthogonal, PivotMode::Median, max_leaf_size);
        let rows = [2.0, 3.0, 5.0, 4.0, 9.0, 6.0, 4.0, 7.0, 8.0, 1.0, 7.0, 2.0];
        tree.load(&rows, &sequential_ids(6)).unwrap();
        tree
    }

    #[test]
    fn test_find_knn_before_build() {
        let tree = KdTree::with_dimension(2).unwrap();
        assert!(matches!(tree.search_knn(&[1.0, 1.0], 1), Err(KdTreeError::NotBuilt)));
    }

    #[test]
    fn test_find_knn_empty_tree() {
        let mut tree = KdTree::with_dimension(2).unwrap();
        tree.build().unwrap();
        let result = tree.search_knn(&[1.0, 1.0], 1).unwrap();
        assert!(result.is_empty());
    }

    #[test]
    fn test_find_knn_single_point_tree() {
        let mut tree = KdTree::with_dimension(2).unwrap();
        tree.load(&[1.0, 2.0], &[0]).unwrap();

        let results = tree.search_knn(&[1.0, 2.0], 1).unwrap();
        assert_eq!(results, vec![(0, 0.0)]);
    }

    #[test]
    fn test_find_knn_k_greater_than_points() {
        let mut tree = KdTree::with_dimension(2).unwrap();
        tree.load(&[1.0, 2.0, 5.0, 5.0], &[0, 1]).unwrap();

        let results = tree.search_knn(&[0.0, 0.0], 5).unwrap();
        assert_eq!(results.len(), 2); // Should return all points
        assert_eq!(results[0].0, 0);
        assert_relative_eq!(results[0].1, 5.0f32.sqrt());
        assert_eq!(results[1].0, 1);
        assert_relative_eq!(results[1].1, 50.0f32.sqrt());
    }

    #[test]
    fn test_find_knn_simple_2d() {
        for max_leaf_size in [1, 2, 16] {
            let tree = six_point_tree(max_leaf_size);

            // (5,4) and (7,2) are both sqrt(2) away; the earlier insert wins the tie
            let results = tree.search_knn(&[6.0, 3.0], 3).unwrap();
            let ids: Vec<_> = results.iter().map(|(id, _)| *id).collect();
            assert_eq!(ids, vec![1, 5, 4]);
            assert_relative_eq!(results[0].1, 2.0f32.sqrt());
            assert_relative_eq!(results[1].1, 2.0f32.sqrt());
            assert_relative_eq!(results[2].1, 8.0f32.sqrt());
        }
    }

    #[test]
    fn test_results_sorted_by_distance() {
        let tree = six_point_tree(1);
        let results = tree.search_knn(&[0.0, 0.0], 6).unwrap();
        assert_eq!(results.len(), 6);
        assert!(results.windows(2).all(|w| w[0].1 <= w[1].1));
    }

    #[test]
    fn test_search_argument_errors() {
        let tree = six_point_tree(2);

        assert!(matches!(tree.search_knn(&[0.0, 0.0], 0), Err(KdTreeError::InvalidArgument(_))));
        assert!(matches!(
            tree.search_knn(&[0.0, 0.0, 0.0], 1),
            Err(KdTreeError::DimensionMismatch { expected: 2, actual: 3 })
        ));
        assert!(matches!(
            tree.search_knn(&[0.0], 1),
            Err(KdTreeError::DimensionMismatch { expected: 2, actual: 1 })
        ));
        assert!(matches!(tree.search_knn(&[f32::NAN, 0.0], 1), Err(KdTreeError::InvalidArgument(_))));
        assert!(matches!(
            tree.search_knn_within(&[0.0, 0.0], 1, -1.0),
            Err(KdTreeError::InvalidArgument(_))
        ));
        assert!(matches!(
            tree.search_knn_within(&[0.0, 0.0], 1, f32::NAN),
            Err(KdTreeError::InvalidArgument(_))
        ));
        assert!(matches!(
            tree.search_knn_strided(&[0.0, 0.0], 0, 1),
            Err(KdTreeError::InvalidArgument(_))
        ));
        assert!(matches!(
            tree.search_knn_strided(&[0.0, 0.0, 0.0], 3, 1),
            Err(KdTreeError::DimensionMismatch { expected: 4, actual: 3 })
        ));
    }

    #[test]
    fn test_search_within_radius() {
        let tree = six_point_tree(1);

        let results = tree.search_knn_within(&[6.0, 3.0], 6, 2.0).unwrap();
        let ids: Vec<_> = results.iter().map(|(id, _)| *id).collect();
        assert_eq!(ids, vec![1, 5]);

        let results = tree.search_knn_within(&[6.0, 3.0], 6, 2.9).unwrap();
        assert_eq!(results.len(), 3);

        // the radius is inclusive
        let results = tree.search_knn_within(&[2.0, 3.0], 6, 0.0).unwrap();
        assert_eq!(results, vec![(0, 0.0)]);

        assert!(tree.search_knn_within(&[100.0, 100.0], 3, 1.0).unwrap().is_empty());

        // an infinite radius is the same as no radius
        assert_eq!(
            tree.search_knn_within(&[1.0, 1.0], 4, f32::INFINITY).unwrap(),
            tree.search_knn(&[1.0, 1.0], 4).unwrap()
        );
    }

    #[test]
    fn test_strided_query_matches_contiguous() {
        let mut tree = tree_with(3, DecompositionMode::Pca, PivotMode::Median, 4);
        tree.load(&random_rows(21, 80, 3), &sequential_ids(80)).unwrap();

        let query = [1.5f32, -2.0, 4.25];
        // the query interleaved with two unrelated channels
        let interleaved = [1.5f32, 99.0, -99.0, -2.0, 99.0, -99.0, 4.25];
        assert_eq!(
            tree.search_knn_strided(&interleaved, 3, 5).unwrap(),
            tree.search_knn(&query, 5).unwrap()
        );
        assert_eq!(tree.search_knn_strided(&query, 1, 5).unwrap(), tree.search_knn(&query, 5).unwrap());
    }

    #[test]
    fn test_weighted_search_changes_ranking() {
        let mut tree = KdTree::with_dimension(2).unwrap();
        tree.load(&[0.0, 0.0, 3.0, 0.0, 0.0, 2.0], &[0, 1, 2]).unwrap();

        let results = tree.search_knn(&[0.0, 0.0], 3).unwrap();
        assert_eq!(results.iter().map(|r| r.0).collect::<Vec<_>>(), vec![0, 2, 1]);

        // weights (1, 4): (0,2) is now 4 away and (3,0) only 3
        tree.set_sigma(&[1.0, 0.5]).unwrap();
        let results = tree.search_knn(&[0.0, 0.0], 3).unwrap();
        assert_eq!(results.iter().map(|r| r.0).collect::<Vec<_>>(), vec![0, 1, 2]);
        assert_relative_eq!(results[1].1, 3.0);
        assert_relative_eq!(results[2].1, 4.0);

        tree.clear_sigma().unwrap();
        assert_eq!(tree.search_knn(&[0.0, 0.0], 3).unwrap()[1].0, 2);
    }

    #[test]
    fn test_zero_weight_dimension_is_ignored() {
        let mut tree = tree_with(2, DecompositionMode::Hyperplane, PivotMode::Median, 2);
        let rows: Vec<f32> = (0..20).flat_map(|i| [i as f32, (i * 37 % 11) as f32]).collect();
        tree.set_data(&rows, &sequential_ids(20)).unwrap();
        tree.set_sigma(&[1.0, 0.0]).unwrap();
        tree.build().unwrap();

        let results = tree.search_knn(&[7.0, 1.0e6], 1).unwrap();
        assert_eq!(results, vec![(7, 0.0)]);

        // non-finite values on the ignored dimension do not disturb the search
        let results = tree.search_knn(&[12.0, f32::INFINITY], 2).unwrap();
        assert_eq!(results[0], (12, 0.0));
        assert_eq!(results[1].1, 1.0);
    }

    #[test]
    fn test_search_matches_brute_force_on_grid() {
        let mut tree = tree_with(2, DecompositionMode::Orthogonal, PivotMode::Middle, 3);
        let rows: Vec<f32> = (0..10).flat_map(|x| (0..10).flat_map(move |y| [x as f32, y as f32])).collect();
        tree.load(&rows, &sequential_ids(100)).unwrap();

        for query in [[4.5, 4.5], [0.0, 0.0], [9.2, -3.0], [3.3, 7.7]] {
            for k in [1, 4, 9, 100] {
                assert_eq!(tree.search_knn(&query, k).unwrap(), brute_force_knn(&tree, &query, k));
            }
        }
    }

    #[test]
    fn test_search_profile_counters() {
        let tree = six_point_tree(1);
        tree.clear_profile();

        tree.search_knn(&[6.0, 3.0], 2).unwrap();
        tree.search_knn(&[0.0, 0.0], 1).unwrap();

        let profile = tree.profile();
        assert_eq!(profile.searches, 2);
        assert_eq!(profile.neighbours, 3);
        assert!(profile.v2v >= 3);
        assert!(profile.v2n > 0);
        assert!(profile.leaves_scanned > 0);
        assert!(profile.nodes_visited >= profile.leaves_scanned);
        assert!(profile.max_stack >= 1);
        assert_eq!(profile.builds, 0);
    }

    #[test]
    fn test_concurrent_searches() {
        let mut tree = tree_with(4, DecompositionMode::Orthogonal, PivotMode::Median, 8);
        tree.load(&random_rows(13, 500, 4), &sequential_ids(500)).unwrap();
        let tree = Arc::new(tree);

        let queries = random_rows(14, 8, 4);
        let expected: Vec<_> = queries.chunks(4).map(|q| tree.search_knn(q, 5).unwrap()).collect();

        std::thread::scope(|scope| {
            for (query, expected) in queries.chunks(4).zip(&expected) {
                let tree = Arc::clone(&tree);
                scope.spawn(move || {
                    assert_eq!(&tree.search_knn(query, 5).unwrap(), expected);
                });
            }
        });
        assert_eq!(tree.profile().searches, 16);
    }
}
