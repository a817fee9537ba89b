use approx::assert_relative_eq;
use cosym::constants::MillerIndex;
use cosym::{CosymParams, ReflectionBatch, SpaceGroup, Target, UnitCell, Weights};

mod common;
use common::columns_from_datasets;

/// Three datasets with staggered index overlaps and dataset-specific
/// intensity profiles, analysed with the derived orthorhombic twin laws.
fn build_target(nproc: usize) -> Target {
    let pool: Vec<MillerIndex> = vec![
        [1, 0, 0],
        [0, 1, 0],
        [0, 0, 1],
        [1, 1, 0],
        [1, 0, 1],
        [0, 1, 1],
        [1, 2, 3],
        [2, 1, 1],
        [3, 1, 2],
        [1, 1, 1],
    ];
    let dataset_a: Vec<MillerIndex> = pool[0..8].to_vec();
    let dataset_b: Vec<MillerIndex> = pool[2..10].to_vec();
    let dataset_c: Vec<MillerIndex> = pool[1..9].to_vec();
    let profile = |rows: &[MillerIndex], scale: f64, offset: f64| -> Vec<f64> {
        rows.iter()
            .enumerate()
            .map(|(i, hkl)| scale * (i as f64 + 1.0) + offset * hkl[0] as f64)
            .collect()
    };
    let intensities_a = profile(&dataset_a, 1.0, 0.3);
    let intensities_b = profile(&dataset_b, 1.4, -0.2);
    let intensities_c = profile(&dataset_c, 0.8, 0.5);

    let columns = columns_from_datasets(&[
        (&dataset_a, &intensities_a),
        (&dataset_b, &intensities_b),
        (&dataset_c, &intensities_c),
    ]);
    let batch =
        ReflectionBatch::new(&columns.indices, &columns.intensities, &columns.lattice_ids)
            .unwrap();
    let cell = UnitCell::new(3.0, 4.0, 5.0, 90.0, 90.0, 90.0).unwrap();
    let params = CosymParams::builder()
        .weights(Weights::Count)
        .nproc(nproc)
        .build()
        .unwrap();
    Target::new(&batch, &cell, &SpaceGroup::p1(), params).unwrap()
}

#[test]
fn worker_count_does_not_change_the_result() {
    let sequential = build_target(1);
    let parallel = build_target(4);

    // disjoint row-block supports merge to bitwise-identical matrices
    assert_eq!(sequential.rij_matrix(), parallel.rij_matrix());
    assert_eq!(
        sequential.wij_matrix().unwrap(),
        parallel.wij_matrix().unwrap()
    );
}

#[test]
fn matrices_are_symmetric_with_zero_diagonal() {
    let target = build_target(1);
    let rij = target.rij_matrix();
    let wij = target.wij_matrix().unwrap();
    let nn = target.n_pairs();
    assert_eq!(rij.nrows(), nn);

    for row in 0..nn {
        assert_eq!(rij[(row, row)], 0.0);
        assert_eq!(wij[(row, row)], 0.0);
        for col in 0..nn {
            assert_relative_eq!(rij[(row, col)], rij[(col, row)], epsilon = 1e-12);
            // pair counts are exact integers
            assert_eq!(wij[(row, col)], wij[(col, row)]);
        }
    }

    // the engine found real overlaps: identity blocks are populated
    assert!(rij[(0, 1)] != 0.0);
    assert!(wij[(0, 1)] >= 3.0);
}
