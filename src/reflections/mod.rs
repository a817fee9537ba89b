//! # Reflection batches and the reduced reflection table
//!
//! Input reflections arrive as parallel columns ([`ReflectionBatch`]); the
//! engine works on a [`ReflectionTable`]: the same columns with every Miller
//! index mapped to its canonical asymmetric-unit representative (Friedel
//! mates merged), stably sorted by lattice id, with a contiguous row range
//! per dataset. The table is built once and never mutated.

use std::ops::Range;

use crate::constants::{LatticeId, MillerIndex};
use crate::cosym_errors::CosymError;
use crate::symmetry::space_group::SpaceGroup;

/// Borrowed, validated input columns.
///
/// # Fields
///
/// * `indices` - Miller index of each reflection
/// * `intensities` - measured intensity of each reflection
/// * `variances` - optional intensity variances
/// * `lattice_ids` - dataset identifier of each reflection (any integers)
#[derive(Debug, Clone, Copy)]
pub struct ReflectionBatch<'a> {
    pub indices: &'a [MillerIndex],
    pub intensities: &'a [f64],
    pub variances: Option<&'a [f64]>,
    pub lattice_ids: &'a [LatticeId],
}

impl<'a> ReflectionBatch<'a> {
    /// Validate column lengths and build a batch.
    ///
    /// Arguments
    /// ---------
    /// * `indices`: one Miller index per reflection
    /// * `intensities`: one intensity per reflection
    /// * `lattice_ids`: one dataset id per reflection
    ///
    /// Return
    /// ------
    /// * a batch, or a [`CosymError`] naming the first mismatched column
    pub fn new(
        indices: &'a [MillerIndex],
        intensities: &'a [f64],
        lattice_ids: &'a [LatticeId],
    ) -> Result<Self, CosymError> {
        if indices.is_empty() {
            return Err(CosymError::EmptyReflectionBatch);
        }
        if intensities.len() != indices.len() {
            return Err(CosymError::MismatchedArrayLength {
                field: "intensities",
                expected: indices.len(),
                actual: intensities.len(),
            });
        }
        if lattice_ids.len() != indices.len() {
            return Err(CosymError::MismatchedArrayLength {
                field: "lattice_ids",
                expected: indices.len(),
                actual: lattice_ids.len(),
            });
        }
        Ok(ReflectionBatch {
            indices,
            intensities,
            variances: None,
            lattice_ids,
        })
    }

    /// Attach per-reflection variances.
    pub fn with_variances(mut self, variances: &'a [f64]) -> Result<Self, CosymError> {
        if variances.len() != self.indices.len() {
            return Err(CosymError::MismatchedArrayLength {
                field: "variances",
                expected: self.indices.len(),
                actual: variances.len(),
            });
        }
        self.variances = Some(variances);
        Ok(self)
    }

    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }
}

/// The canonical reflection table: asymmetric-unit indices, sorted by
/// lattice id, contiguous per-dataset row ranges.
#[derive(Debug, Clone)]
pub struct ReflectionTable {
    indices: Vec<MillerIndex>,
    intensities: Vec<f64>,
    variances: Option<Vec<f64>>,
    lattice_ids: Vec<LatticeId>,
    lattice_starts: Vec<usize>,
}

impl ReflectionTable {
    /// Reduce and sort a batch.
    ///
    /// Every index is replaced by its asymmetric-unit representative under
    /// `space_group` (non-anomalous: Friedel mates merge), then rows are
    /// stably sorted by lattice id. Dataset `i` is the rank of its id in
    /// ascending order.
    pub fn from_batch(batch: &ReflectionBatch<'_>, space_group: &SpaceGroup) -> Self {
        let mut order: Vec<usize> = (0..batch.len()).collect();
        order.sort_by_key(|&row| batch.lattice_ids[row]);

        let indices: Vec<MillerIndex> = order
            .iter()
            .map(|&row| space_group.map_to_asu(&batch.indices[row]))
            .collect();
        let intensities: Vec<f64> = order.iter().map(|&row| batch.intensities[row]).collect();
        let variances = batch
            .variances
            .map(|v| order.iter().map(|&row| v[row]).collect());
        let lattice_ids: Vec<LatticeId> = order.iter().map(|&row| batch.lattice_ids[row]).collect();

        let mut lattice_starts = vec![0];
        for row in 1..lattice_ids.len() {
            if lattice_ids[row] != lattice_ids[row - 1] {
                lattice_starts.push(row);
            }
        }

        ReflectionTable {
            indices,
            intensities,
            variances,
            lattice_ids,
            lattice_starts,
        }
    }

    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    pub fn n_lattices(&self) -> usize {
        self.lattice_starts.len()
    }

    /// Half-open row range of dataset `lattice`.
    pub fn lattice_range(&self, lattice: usize) -> Range<usize> {
        let lower = self.lattice_starts[lattice];
        let upper = self
            .lattice_starts
            .get(lattice + 1)
            .copied()
            .unwrap_or(self.indices.len());
        lower..upper
    }

    pub fn indices(&self) -> &[MillerIndex] {
        &self.indices
    }

    pub fn intensities(&self) -> &[f64] {
        &self.intensities
    }

    pub fn variances(&self) -> Option<&[f64]> {
        self.variances.as_deref()
    }

    pub fn lattice_ids(&self) -> &[LatticeId] {
        &self.lattice_ids
    }
}
