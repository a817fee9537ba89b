//! # The cosym target: pairwise correlations and the embedding objective
//!
//! This module defines the [`Target`] struct, the central object that wires
//! together:
//!
//! 1. **Reduction** — the input batch becomes an asymmetric-unit-reduced,
//!    lattice-sorted [`ReflectionTable`](crate::reflections::ReflectionTable).
//! 2. **Operation enumeration** — candidate symmetry operations (identity
//!    plus twin laws) from the left-coset decomposition of the lattice group
//!    by the acentric subgroup of the intensity symmetry.
//! 3. **Pairwise correlations** — the rij/wij matrices over every
//!    (dataset, operation) pair, computed eagerly at construction
//!    ([`rij`](crate::target::rij)).
//! 4. **Objective evaluation** — value, analytic gradient and curvature of
//!    the embedding misfit, with finite-difference oracles
//!    ([`objective`](crate::target::objective)).
//!
//! ## Typical usage
//!
//! ```rust,no_run
//! use cosym::reflections::ReflectionBatch;
//! use cosym::symmetry::space_group::SpaceGroup;
//! use cosym::target::{CosymParams, Target, Weights};
//! use cosym::unit_cell::UnitCell;
//!
//! # fn demo(indices: Vec<[i32; 3]>, intensities: Vec<f64>, ids: Vec<i32>)
//! # -> Result<(), cosym::cosym_errors::CosymError> {
//! let batch = ReflectionBatch::new(&indices, &intensities, &ids)?;
//! let cell = UnitCell::new(42.3, 42.3, 39.7, 90.0, 90.0, 90.0)?;
//! let params = CosymParams::builder()
//!     .weights(Weights::Count)
//!     .min_pairs(3)
//!     .nproc(4)
//!     .build()?;
//! let target = Target::new(&batch, &cell, &SpaceGroup::p1(), params)?;
//!
//! // hand value/gradient/curvature to an external optimizer
//! let x = vec![0.1; target.dim() * target.n_pairs()];
//! let f = target.compute_functional(&x)?;
//! let grad = target.compute_gradients(&x)?;
//! # let _ = (f, grad);
//! # Ok(())
//! # }
//! ```
//!
//! ## Lifecycle
//!
//! The reflection table, operation list and rij/wij matrices are computed
//! once at construction and are immutable afterwards; objective evaluation
//! is a pure function of `(x, rij, wij)` and is safe to call concurrently.

pub mod objective;
pub mod rij;

use std::fmt;
use std::str::FromStr;

use log::debug;
use nalgebra::{DMatrix, Vector3};
use smallvec::smallvec;

use crate::constants::{SymOps, DEFAULT_MAX_DELTA, DEFAULT_MIN_PAIRS, FD_EPS};
use crate::cosym_errors::CosymError;
use crate::reflections::{ReflectionBatch, ReflectionTable};
use crate::symmetry::lattice_symmetry::lattice_symmetry_group;
use crate::symmetry::space_group::SpaceGroup;
use crate::symmetry::SymOp;
use crate::unit_cell::UnitCell;

/// Reliability weighting applied to the rij entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Weights {
    /// Weight each correlation by its raw pair count.
    Count,
    /// Weight by the inverse standard error `1/sqrt((1-r²)/(n-2))`,
    /// zero where `n ≤ 2`.
    StandardError,
}

impl FromStr for Weights {
    type Err = CosymError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "count" => Ok(Weights::Count),
            "standard_error" => Ok(Weights::StandardError),
            other => Err(CosymError::InvalidWeights(other.to_string())),
        }
    }
}

impl fmt::Display for Weights {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Weights::Count => write!(f, "count"),
            Weights::StandardError => write!(f, "standard_error"),
        }
    }
}

/// Configuration parameters controlling [`Target::new`].
///
/// Overview
/// -----------------
/// * `weights` – optional reliability weighting of the rij entries.
/// * `min_pairs` – threshold below which a correlation is omitted entirely;
///   `None` disables the threshold (entries then survive on any defined
///   correlation, however few pairs back it).
/// * `lattice_group` – externally supplied lattice group; when absent the
///   lattice group is derived from the Niggli-reduced mean cell.
/// * `dimensions` – override for the embedding dimension; the default is
///   `max(2, n_sym_ops)`.
/// * `nproc` – worker count for the correlation engine; 1 is sequential.
/// * `max_delta` – angular tolerance (degrees) of the lattice symmetry
///   search.
#[derive(Debug, Clone)]
pub struct CosymParams {
    pub weights: Option<Weights>,
    pub min_pairs: Option<usize>,
    pub lattice_group: Option<SpaceGroup>,
    pub dimensions: Option<usize>,
    pub nproc: usize,
    pub max_delta: f64,
}

impl Default for CosymParams {
    fn default() -> Self {
        CosymParams {
            weights: None,
            min_pairs: Some(DEFAULT_MIN_PAIRS),
            lattice_group: None,
            dimensions: None,
            nproc: 1,
            max_delta: DEFAULT_MAX_DELTA,
        }
    }
}

impl CosymParams {
    pub fn builder() -> CosymParamsBuilder {
        CosymParamsBuilder::default()
    }
}

/// Fluent builder for [`CosymParams`].
#[derive(Debug, Clone)]
pub struct CosymParamsBuilder {
    params: CosymParams,
}

impl Default for CosymParamsBuilder {
    fn default() -> Self {
        CosymParamsBuilder {
            params: CosymParams::default(),
        }
    }
}

impl CosymParamsBuilder {
    pub fn weights(mut self, weights: Weights) -> Self {
        self.params.weights = Some(weights);
        self
    }

    pub fn min_pairs(mut self, min_pairs: usize) -> Self {
        self.params.min_pairs = Some(min_pairs);
        self
    }

    /// Disable the minimum-pairs threshold entirely.
    pub fn no_min_pairs(mut self) -> Self {
        self.params.min_pairs = None;
        self
    }

    pub fn lattice_group(mut self, lattice_group: SpaceGroup) -> Self {
        self.params.lattice_group = Some(lattice_group);
        self
    }

    pub fn dimensions(mut self, dimensions: usize) -> Self {
        self.params.dimensions = Some(dimensions);
        self
    }

    pub fn nproc(mut self, nproc: usize) -> Self {
        self.params.nproc = nproc;
        self
    }

    pub fn max_delta(mut self, max_delta: f64) -> Self {
        self.params.max_delta = max_delta;
        self
    }

    /// Validate and build.
    ///
    /// Return
    /// ----------
    /// * The parameter set, or an error for `dimensions < 2` or
    ///   `nproc == 0`.
    pub fn build(self) -> Result<CosymParams, CosymError> {
        if let Some(dim) = self.params.dimensions {
            if dim < 2 {
                return Err(CosymError::InvalidDimension(dim));
            }
        }
        if self.params.nproc == 0 {
            return Err(CosymError::InvalidWorkerCount);
        }
        Ok(self.params)
    }
}

/// Target function for cosym analysis.
///
/// Construction performs reduction, operation enumeration and the full
/// pairwise correlation computation; evaluation methods are pure and cheap
/// by comparison.
#[derive(Debug, Clone)]
pub struct Target {
    table: ReflectionTable,
    sym_ops: SymOps,
    lattice_group: SpaceGroup,
    patterson_group: SpaceGroup,
    dim: usize,
    rij: DMatrix<f64>,
    wij: Option<DMatrix<f64>>,
}

impl Target {
    /// Build a target from a reflection batch.
    ///
    /// Arguments
    /// -----------------
    /// * `batch`: validated reflection columns.
    /// * `cell`: mean unit cell of the datasets (used by the lattice
    ///   symmetry search when no lattice group is supplied).
    /// * `space_group`: the data's space group, primitive setting.
    /// * `params`: see [`CosymParams`].
    ///
    /// Return
    /// ----------
    /// * The constructed target with rij/wij already computed, or the first
    ///   input-shape or symmetry error encountered.
    pub fn new(
        batch: &ReflectionBatch<'_>,
        cell: &UnitCell,
        space_group: &SpaceGroup,
        params: CosymParams,
    ) -> Result<Self, CosymError> {
        let table = ReflectionTable::from_batch(batch, space_group);

        let mut sym_ops: SymOps = smallvec![SymOp::identity()];
        let twin_ops = generate_twin_operators(
            space_group,
            cell,
            params.lattice_group.as_ref(),
            params.max_delta,
        )?;
        for op in twin_ops {
            if !sym_ops.contains(&op) {
                sym_ops.push(op);
            }
        }

        let dim = params.dimensions.unwrap_or_else(|| sym_ops.len().max(2));

        let lattice_group = space_group.expanded_by(&sym_ops)?;
        let patterson_group = lattice_group.build_derived_patterson_group()?;
        debug!("Lattice group: {} symops", lattice_group.order());
        debug!("Patterson group: {} symops", patterson_group.order());

        let (rij, wij) = rij::compute_rij_wij(
            &table,
            &sym_ops,
            space_group,
            &patterson_group,
            params.min_pairs,
            params.weights,
            params.nproc,
        )?;

        Ok(Target {
            table,
            sym_ops,
            lattice_group,
            patterson_group,
            dim,
            rij,
            wij,
        })
    }

    /// The number of embedding dimensions used in the analysis.
    pub fn dim(&self) -> usize {
        self.dim
    }

    /// Override the number of embedding dimensions.
    pub fn set_dimensions(&mut self, dimensions: usize) -> Result<(), CosymError> {
        if dimensions < 2 {
            return Err(CosymError::InvalidDimension(dimensions));
        }
        self.dim = dimensions;
        Ok(())
    }

    /// The ordered candidate operations, identity first.
    pub fn sym_ops(&self) -> &[SymOp] {
        &self.sym_ops
    }

    /// The list of symmetry operations used in the analysis.
    #[deprecated(note = "use sym_ops() instead")]
    pub fn get_sym_ops(&self) -> &[SymOp] {
        &self.sym_ops
    }

    pub fn n_lattices(&self) -> usize {
        self.table.n_lattices()
    }

    /// Number of (dataset, operation) pairs, i.e. the side of rij/wij and
    /// the column count of the embedding.
    pub fn n_pairs(&self) -> usize {
        self.table.n_lattices() * self.sym_ops.len()
    }

    /// The data's space group expanded by every candidate operation.
    pub fn lattice_group(&self) -> &SpaceGroup {
        &self.lattice_group
    }

    /// Patterson group of the expanded lattice group.
    pub fn patterson_group(&self) -> &SpaceGroup {
        &self.patterson_group
    }

    pub fn rij_matrix(&self) -> &DMatrix<f64> {
        &self.rij
    }

    pub fn wij_matrix(&self) -> Option<&DMatrix<f64>> {
        self.wij.as_ref()
    }

    /// Value of the target function at coordinates `x`.
    ///
    /// `x` is the flattened `dim × n_pairs` coordinate matrix, first
    /// dimension stored first.
    pub fn compute_functional(&self, x: &[f64]) -> Result<f64, CosymError> {
        objective::functional(&self.rij, self.wij.as_ref(), self.dim, x)
    }

    /// Analytic gradient of the target function at `x`.
    pub fn compute_gradients(&self, x: &[f64]) -> Result<Vec<f64>, CosymError> {
        objective::gradients(&self.rij, self.wij.as_ref(), self.dim, x)
    }

    /// Diagonal curvature approximation at `x`.
    pub fn curvatures(&self, x: &[f64]) -> Result<Vec<f64>, CosymError> {
        objective::curvatures(&self.rij, self.wij.as_ref(), self.dim, x)
    }

    /// Finite-difference gradient oracle (central differences, step
    /// [`FD_EPS`]). Testing aid for [`Target::compute_gradients`].
    pub fn compute_gradients_fd(&self, x: &[f64]) -> Result<Vec<f64>, CosymError> {
        objective::gradients_fd(&self.rij, self.wij.as_ref(), self.dim, x, FD_EPS)
    }

    /// Finite-difference curvature oracle. Testing aid for
    /// [`Target::curvatures`].
    pub fn curvatures_fd(&self, x: &[f64]) -> Result<Vec<f64>, CosymError> {
        objective::curvatures_fd(&self.rij, self.wij.as_ref(), self.dim, x, FD_EPS)
    }
}

/// Candidate twin operators: proper coset representatives of the lattice
/// group over the acentric subgroup of the intensity symmetry.
///
/// With no supplied lattice group the search runs in the Niggli-reduced
/// basis and representatives are conjugated back to the input basis.
fn generate_twin_operators(
    space_group: &SpaceGroup,
    cell: &UnitCell,
    lattice_group: Option<&SpaceGroup>,
    max_delta: f64,
) -> Result<Vec<SymOp>, CosymError> {
    let (lattice_group, intensity_symmetry, back_transform) = match lattice_group {
        Some(group) => (
            group.clone(),
            space_group.build_derived_patterson_group()?,
            None,
        ),
        None => {
            let (reduced_cell, p) = cell.niggli_reduced()?;
            let p_inv = *SymOp::new(p, Vector3::zeros()).inverse()?.rot();
            // Miller indices change basis with h' = Pᵀ·h
            let t = p.transpose();
            let t_inv = p_inv.transpose();
            let reduced_sg = space_group.change_basis(&t, &t_inv);
            (
                lattice_symmetry_group(&reduced_cell, max_delta)?,
                reduced_sg.build_derived_patterson_group()?,
                Some((t_inv, t)),
            )
        }
    };

    let acentric = intensity_symmetry.build_derived_acentric_group();
    let mut operators = Vec::new();
    for partition in lattice_group.left_cosets(&acentric).iter().skip(1) {
        let representative = &partition[0];
        if representative.det() > 0 {
            let op = match &back_transform {
                Some((m, m_inv)) => representative.conjugated(m, m_inv),
                None => representative.clone(),
            };
            operators.push(op);
        }
    }
    Ok(operators)
}
