//! # Lattice symmetry search
//!
//! Derives the point group of a (reduced) lattice by the Le Page method:
//! enumerate candidate two-fold axes as pairs of integer direct and
//! reciprocal lattice vectors, score each by the angle between their
//! Cartesian images, and close the accepted set, together with the
//! inversion, into a group.
//!
//! The search runs on a Niggli-reduced cell; operations found here live in
//! the reduced basis and are conjugated back by the caller using the
//! reduction transform.

use itertools::iproduct;
use nalgebra::{Matrix3, Vector3};

use crate::constants::MAX_LATTICE_GROUP_ORDER;
use crate::cosym_errors::CosymError;
use crate::symmetry::space_group::SpaceGroup;
use crate::symmetry::SymOp;
use crate::unit_cell::UnitCell;

/// Largest absolute axis component considered by the search. Two-fold axes
/// of a reduced cell have coordinates in this range.
const MAX_AXIS_COMPONENT: i32 = 2;

/// Point group of the lattice described by `cell`, as index-space
/// operations in the basis of `cell`.
///
/// Arguments
/// -----------------
/// * `cell`: the (reduced) unit cell to analyse.
/// * `max_delta`: maximum angular deviation in degrees between the direct
///   and reciprocal images of a candidate two-fold axis.
///
/// Return
/// ----------
/// * The lattice point group (always containing the inversion), or an error
///   if the accepted axes close into a group larger than the cubic
///   holohedry — which indicates an inconsistent acceptance at very large
///   `max_delta`.
pub fn lattice_symmetry_group(
    cell: &UnitCell,
    max_delta: f64,
) -> Result<SpaceGroup, CosymError> {
    let basis = cell.orthogonalization_matrix();
    let recip = basis
        .transpose()
        .try_inverse()
        .ok_or_else(|| CosymError::InvalidUnitCell("singular basis".to_string()))?;

    let axes = candidate_axes();
    let mut generators: Vec<SymOp> = vec![SymOp::inversion()];
    for (u, h) in iproduct!(axes.iter(), axes.iter()) {
        let dot = u.dot(h);
        if dot == 0 || dot.abs() > 2 {
            continue;
        }
        // two-fold axes are sign-free: realign antiparallel pairs
        let (h, dot) = if dot < 0 { (-h, -dot) } else { (*h, dot) };

        let direct = basis * u.map(|v| v as f64);
        let reciprocal = recip * h.map(|v| v as f64);
        let cosine = direct.dot(&reciprocal) / (direct.norm() * reciprocal.norm());
        let delta = cosine.abs().clamp(-1.0, 1.0).acos().to_degrees();
        if delta > max_delta {
            continue;
        }

        // index-space two-fold: g ↦ 2·h·(u·g)/(u·h) − g, integral for u·h ∈ {1,2}
        let mut rot = Matrix3::<i32>::zeros();
        for (i, j) in iproduct!(0..3, 0..3) {
            rot[(i, j)] = 2 * h[i] * u[j] / dot - i32::from(i == j);
        }
        let op = SymOp::new(rot, Vector3::zeros());
        if !generators.contains(&op) {
            generators.push(op);
        }
    }

    SpaceGroup::from_generators(&generators, MAX_LATTICE_GROUP_ORDER)
}

/// Canonical coprime integer axes with components in
/// `-MAX_AXIS_COMPONENT..=MAX_AXIS_COMPONENT`, one representative per ±pair.
fn candidate_axes() -> Vec<Vector3<i32>> {
    let range = -MAX_AXIS_COMPONENT..=MAX_AXIS_COMPONENT;
    iproduct!(range.clone(), range.clone(), range)
        .map(|(x, y, z)| Vector3::new(x, y, z))
        .filter(|v| {
            let first_non_zero = v.iter().find(|&&c| c != 0);
            match first_non_zero {
                None => false,
                Some(&leading) => leading > 0 && gcd3(v[0], v[1], v[2]) == 1,
            }
        })
        .collect()
}

fn gcd3(a: i32, b: i32, c: i32) -> i32 {
    fn gcd(a: i32, b: i32) -> i32 {
        let (mut a, mut b) = (a.abs(), b.abs());
        while b != 0 {
            let t = a % b;
            a = b;
            b = t;
        }
        a
    }
    gcd(gcd(a, b), c)
}
