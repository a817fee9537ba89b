use cosym::constants::{LatticeId, MillerIndex};

/// Owned reflection columns assembled from per-dataset slices.
pub struct Columns {
    pub indices: Vec<MillerIndex>,
    pub intensities: Vec<f64>,
    pub lattice_ids: Vec<LatticeId>,
}

/// Concatenate per-dataset (indices, intensities) pairs into one batch's
/// columns, assigning lattice ids 0, 1, … in order.
pub fn columns_from_datasets(datasets: &[(&[MillerIndex], &[f64])]) -> Columns {
    let mut columns = Columns {
        indices: Vec::new(),
        intensities: Vec::new(),
        lattice_ids: Vec::new(),
    };
    for (id, (indices, intensities)) in datasets.iter().enumerate() {
        assert_eq!(indices.len(), intensities.len());
        columns.indices.extend_from_slice(indices);
        columns.intensities.extend_from_slice(intensities);
        columns
            .lattice_ids
            .extend(std::iter::repeat(id as LatticeId).take(indices.len()));
    }
    columns
}
