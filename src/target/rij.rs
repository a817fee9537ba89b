//! # Pairwise correlation engine
//!
//! Computes the rij (correlation) and wij (weight) matrices over the full
//! grid of (dataset, operation) pairs.
//!
//! ## Overview
//! -----------------
//! Rij is a symmetric matrix of size `(n·m, n·m)` where `n` is the number
//! of datasets and `m` the number of candidate operations; the `(k, kk)`
//! block of size `(n, n)` holds the correlation coefficients between
//! operation `k` applied to every dataset and operation `kk` applied to
//! every dataset. Entry `(i, k)` lives at row/column `i + n·k`.
//!
//! Before the pair loop, every operation's reindexed, asymmetric-unit-mapped
//! index column and its epsilon factors under the Patterson group are
//! computed once. Matched reflection pairs with an epsilon factor other
//! than 1 on either side are excluded from the correlation statistics.
//!
//! Within one dataset row block the correlation between dataset `i` under
//! `k` and dataset `j` under `kk` is algebraically identical to the
//! correlation between dataset `i` untransformed and dataset `j` under
//! `k⁻¹·kk`, so results are cached per `(i, j, canonical form of k⁻¹·kk)`
//! and the inner `m × m` loop collapses to the number of distinct composed
//! operations. The cache lives for one row block and is discarded after it.
//!
//! ## Sparsity
//! -----------------
//! Fewer than `min_pairs` common reflections, or an undefined (NaN)
//! correlation, leave the entry absent from both matrices. Absence means
//! "no information"; a stored zero would mean "measured zero correlation".
//!
//! ## Parallelism
//! -----------------
//! Row blocks fan out over a fixed-size worker pool; each worker fills its
//! own triplet buffers against read-only snapshots, and the parent merges
//! by summation over disjoint supports, so merge order cannot change the
//! result. A panicking worker aborts the whole computation; no partial
//! matrices are ever returned.

use std::collections::{HashMap, HashSet};

use ahash::RandomState;
use log::debug;
use nalgebra::DMatrix;
use rayon::prelude::*;
use rayon::ThreadPoolBuilder;

use crate::constants::MillerIndex;
use crate::cosym_errors::CosymError;
use crate::reflections::ReflectionTable;
use crate::symmetry::space_group::SpaceGroup;
use crate::symmetry::SymOp;
use crate::target::Weights;

type FastMap<K, V> = HashMap<K, V, RandomState>;
type FastSet<T> = HashSet<T, RandomState>;

/// Partial sparse matrix in coordinate form, one per row block.
#[derive(Debug, Default)]
struct Triplets {
    rows: Vec<usize>,
    cols: Vec<usize>,
    values: Vec<f64>,
}

impl Triplets {
    fn push(&mut self, row: usize, col: usize, value: f64) {
        self.rows.push(row);
        self.cols.push(col);
        self.values.push(value);
    }

    fn add_into(&self, matrix: &mut DMatrix<f64>) {
        for ((&row, &col), &value) in self.rows.iter().zip(&self.cols).zip(&self.values) {
            matrix[(row, col)] += value;
        }
    }
}

/// Per-operation reindexed index columns and epsilon factors, computed once
/// up front and shared read-only by every worker.
struct ReindexedTables {
    indices: Vec<Vec<MillerIndex>>,
    epsilons: Vec<Vec<i32>>,
}

impl ReindexedTables {
    fn build(
        table: &ReflectionTable,
        sym_ops: &[SymOp],
        space_group: &SpaceGroup,
        patterson_group: &SpaceGroup,
    ) -> Self {
        let mut indices = Vec::with_capacity(sym_ops.len());
        let mut epsilons = Vec::with_capacity(sym_ops.len());
        for op in sym_ops {
            let reindexed: Vec<MillerIndex> = table
                .indices()
                .iter()
                .map(|hkl| space_group.map_to_asu(&op.apply(hkl)))
                .collect();
            let eps: Vec<i32> = reindexed
                .iter()
                .map(|hkl| patterson_group.epsilon(hkl))
                .collect();
            indices.push(reindexed);
            epsilons.push(eps);
        }
        ReindexedTables { indices, epsilons }
    }
}

/// Compute the rij and (optionally) wij matrices.
///
/// Arguments
/// -----------------
/// * `table`: the reduced, lattice-sorted reflection table.
/// * `sym_ops`: candidate operations, identity first.
/// * `space_group`: the data's space group (asymmetric-unit mapping).
/// * `patterson_group`: group under which epsilon factors are computed.
/// * `min_pairs`: omission threshold; `None` disables it.
/// * `weights`: weighting mode for wij, or `None` for no wij at all.
/// * `nproc`: worker count; 1 computes sequentially on the caller thread.
pub(crate) fn compute_rij_wij(
    table: &ReflectionTable,
    sym_ops: &[SymOp],
    space_group: &SpaceGroup,
    patterson_group: &SpaceGroup,
    min_pairs: Option<usize>,
    weights: Option<Weights>,
    nproc: usize,
) -> Result<(DMatrix<f64>, Option<DMatrix<f64>>), CosymError> {
    let tables = ReindexedTables::build(table, sym_ops, space_group, patterson_group);
    let inverses: Vec<SymOp> = sym_ops
        .iter()
        .map(SymOp::inverse)
        .collect::<Result<_, _>>()?;

    let n_lattices = table.n_lattices();
    let row_block = |i: usize| {
        compute_row_block(
            i,
            table,
            &tables,
            sym_ops,
            &inverses,
            min_pairs,
            weights.is_some(),
        )
    };
    let blocks: Vec<(Triplets, Option<Triplets>)> = if nproc <= 1 {
        (0..n_lattices).map(row_block).collect()
    } else {
        let pool = ThreadPoolBuilder::new()
            .num_threads(nproc)
            .build()
            .map_err(|e| CosymError::WorkerPool(e.to_string()))?;
        pool.install(|| (0..n_lattices).into_par_iter().map(row_block).collect())
    };

    let nn = n_lattices * sym_ops.len();
    let mut rij = DMatrix::zeros(nn, nn);
    let mut wij = weights.map(|_| DMatrix::zeros(nn, nn));
    for (rij_block, wij_block) in &blocks {
        rij_block.add_into(&mut rij);
        if let (Some(block), Some(matrix)) = (wij_block, wij.as_mut()) {
            block.add_into(matrix);
        }
    }
    debug!(
        "rij computed: {} populated entries of {}",
        rij.iter().filter(|v| **v != 0.0).count(),
        nn * nn
    );

    if weights == Some(Weights::StandardError) {
        // wij currently holds raw pair counts; convert where n > 2
        let counts = wij.take().unwrap_or_else(|| DMatrix::zeros(nn, nn));
        let mut converted = DMatrix::zeros(nn, nn);
        for row in 0..nn {
            for col in 0..nn {
                let n = counts[(row, col)];
                if n > 2.0 {
                    let r = rij[(row, col)];
                    let se = ((1.0 - r * r) / (n - 2.0)).sqrt();
                    converted[(row, col)] = 1.0 / se;
                }
            }
        }
        wij = Some(converted);
    }

    Ok((rij, wij))
}

fn compute_row_block(
    i: usize,
    table: &ReflectionTable,
    tables: &ReindexedTables,
    sym_ops: &[SymOp],
    inverses: &[SymOp],
    min_pairs: Option<usize>,
    want_weights: bool,
) -> (Triplets, Option<Triplets>) {
    let n_lattices = table.n_lattices();
    let intensities = table.intensities();
    let range_i = table.lattice_range(i);

    let mut rij = Triplets::default();
    let mut wij = want_weights.then(Triplets::default);
    let mut cache: FastMap<(usize, usize, String), Option<(f64, usize)>> = FastMap::default();

    for j in 0..n_lattices {
        let range_j = table.lattice_range(j);
        for k in 0..sym_ops.len() {
            let indices_i = &tables.indices[k][range_i.clone()];
            let epsilons_i = &tables.epsilons[k][range_i.clone()];
            for (kk, op_kk) in sym_ops.iter().enumerate() {
                if i == j && k == kk {
                    // don't correlate a pair with itself
                    continue;
                }
                let ik = i + n_lattices * k;
                let jk = j + n_lattices * kk;

                let key = (i, j, inverses[k].compose(op_kk).as_xyz());
                let cached = match cache.get(&key) {
                    Some(value) => *value,
                    None => {
                        let indices_j = &tables.indices[kk][range_j.clone()];
                        let epsilons_j = &tables.epsilons[kk][range_j.clone()];
                        let value = correlate(
                            indices_i,
                            &intensities[range_i.clone()],
                            epsilons_i,
                            indices_j,
                            &intensities[range_j.clone()],
                            epsilons_j,
                            min_pairs,
                        );
                        cache.insert(key, value);
                        value
                    }
                };

                if let Some((cc, n)) = cached {
                    rij.push(ik, jk, cc);
                    if let Some(wij) = wij.as_mut() {
                        wij.push(ik, jk, n as f64);
                    }
                }
            }
        }
    }

    (rij, wij)
}

/// Correlation between two reindexed reflection slices, or `None` when the
/// data is insufficient (too few common reflections, undefined Pearson).
fn correlate(
    indices_i: &[MillerIndex],
    intensities_i: &[f64],
    epsilons_i: &[i32],
    indices_j: &[MillerIndex],
    intensities_j: &[f64],
    epsilons_j: &[i32],
    min_pairs: Option<usize>,
) -> Option<(f64, usize)> {
    let matched = match_miller_indices(indices_i, indices_j);
    let surviving: Vec<(usize, usize)> = matched
        .into_iter()
        .filter(|&(pi, pj)| epsilons_i[pi] == 1 && epsilons_j[pj] == 1)
        .collect();

    let n = surviving.len();
    if let Some(threshold) = min_pairs {
        if n < threshold {
            return None;
        }
    }
    let a: Vec<f64> = surviving.iter().map(|&(pi, _)| intensities_i[pi]).collect();
    let b: Vec<f64> = surviving.iter().map(|&(_, pj)| intensities_j[pj]).collect();
    let cc = pearson(&a, &b);
    if cc.is_nan() {
        return None;
    }
    Some((cc, n))
}

/// Match two index columns by exact equality: one pair per distinct common
/// index, first occurrence on each side, ordered by index value so that
/// both orientations of a comparison accumulate in the same order.
fn match_miller_indices(
    indices_i: &[MillerIndex],
    indices_j: &[MillerIndex],
) -> Vec<(usize, usize)> {
    let mut first_j: FastMap<MillerIndex, usize> = FastMap::default();
    for (pos, hkl) in indices_j.iter().enumerate() {
        first_j.entry(*hkl).or_insert(pos);
    }
    let mut seen_i: FastSet<MillerIndex> = FastSet::default();
    let mut pairs = Vec::new();
    for (pos, hkl) in indices_i.iter().enumerate() {
        if !seen_i.insert(*hkl) {
            continue;
        }
        if let Some(&pj) = first_j.get(hkl) {
            pairs.push((*hkl, pos, pj));
        }
    }
    pairs.sort_unstable_by_key(|&(hkl, _, _)| hkl);
    pairs.into_iter().map(|(_, pi, pj)| (pi, pj)).collect()
}

/// Pearson correlation coefficient; NaN when either side has zero variance
/// or fewer than two points.
fn pearson(a: &[f64], b: &[f64]) -> f64 {
    let n = a.len() as f64;
    let mean_a = a.iter().sum::<f64>() / n;
    let mean_b = b.iter().sum::<f64>() / n;
    let mut cov = 0.0;
    let mut var_a = 0.0;
    let mut var_b = 0.0;
    for (&x, &y) in a.iter().zip(b) {
        let (dx, dy) = (x - mean_a, y - mean_b);
        cov += dx * dy;
        var_a += dx * dx;
        var_b += dy * dy;
    }
    cov / (var_a * var_b).sqrt()
}
