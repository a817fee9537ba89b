//! # Unit cell geometry and Niggli reduction
//!
//! This module defines [`UnitCell`] (lengths in Å, angles in degrees) and
//! the Krivý–Gruber reduction used to bring a cell into its Niggli form
//! before the lattice symmetry search.
//!
//! ## Overview
//! -----------------
//! The reduction operates on the six scalars `A = a²`, `B = b²`, `C = c²`,
//! `ξ = 2b·c`, `η = 2a·c`, `ζ = 2a·b` and applies the published steps
//! A1–A8 until none fires, accumulating the unimodular change-of-basis
//! matrix alongside. The reduced cell is unique; the transform carries
//! symmetry operations found in the reduced basis back to the input basis.
//!
//! See Krivý & Gruber, Acta Cryst. (1976) A32, 297.

use nalgebra::{Matrix3, Vector3};

use crate::cosym_errors::CosymError;

/// Iteration cap for the reduction loop. The published algorithm terminates;
/// the cap turns a numerically pathological cell into an error.
const MAX_REDUCTION_STEPS: usize = 100;

/// A crystallographic unit cell. Lengths in Å, angles in degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UnitCell {
    pub a: f64,
    pub b: f64,
    pub c: f64,
    pub alpha: f64,
    pub beta: f64,
    pub gamma: f64,
}

impl UnitCell {
    /// Validate and build a unit cell.
    ///
    /// Arguments
    /// -----------------
    /// * `a`, `b`, `c`: axis lengths in Å, strictly positive.
    /// * `alpha`, `beta`, `gamma`: inter-axial angles in degrees, each in
    ///   (0, 180), jointly describing a non-degenerate cell.
    pub fn new(a: f64, b: f64, c: f64, alpha: f64, beta: f64, gamma: f64) -> Result<Self, CosymError> {
        for (value, name) in [(a, "a"), (b, "b"), (c, "c")] {
            if !(value > 0.0) {
                return Err(CosymError::InvalidUnitCell(format!(
                    "length {name} must be positive, got {value}"
                )));
            }
        }
        for (value, name) in [(alpha, "alpha"), (beta, "beta"), (gamma, "gamma")] {
            if !(value > 0.0 && value < 180.0) {
                return Err(CosymError::InvalidUnitCell(format!(
                    "angle {name} must lie in (0, 180) degrees, got {value}"
                )));
            }
        }
        let cell = UnitCell {
            a,
            b,
            c,
            alpha,
            beta,
            gamma,
        };
        if !(cell.volume_factor() > 0.0) {
            return Err(CosymError::InvalidUnitCell(
                "angles describe a degenerate (flat) cell".to_string(),
            ));
        }
        Ok(cell)
    }

    fn cosines(&self) -> (f64, f64, f64) {
        (
            self.alpha.to_radians().cos(),
            self.beta.to_radians().cos(),
            self.gamma.to_radians().cos(),
        )
    }

    /// `1 - cos²α - cos²β - cos²γ + 2·cosα·cosβ·cosγ`; positive for any
    /// realizable cell, and `(volume / abc)²`.
    fn volume_factor(&self) -> f64 {
        let (ca, cb, cg) = self.cosines();
        1.0 - ca * ca - cb * cb - cg * cg + 2.0 * ca * cb * cg
    }

    /// Cell volume in ų.
    pub fn volume(&self) -> f64 {
        self.a * self.b * self.c * self.volume_factor().sqrt()
    }

    /// Direct-space metric tensor `G = AᵀA` of the basis.
    pub fn metric_tensor(&self) -> Matrix3<f64> {
        let (ca, cb, cg) = self.cosines();
        let (a, b, c) = (self.a, self.b, self.c);
        Matrix3::new(
            a * a,
            a * b * cg,
            a * c * cb,
            a * b * cg,
            b * b,
            b * c * ca,
            a * c * cb,
            b * c * ca,
            c * c,
        )
    }

    /// Orthogonalization matrix: columns are the basis vectors a, b, c in a
    /// Cartesian frame (a along x, b in the x-y plane).
    pub fn orthogonalization_matrix(&self) -> Matrix3<f64> {
        let (ca, cb, cg) = self.cosines();
        let sg = self.gamma.to_radians().sin();
        let v = self.volume_factor().sqrt();
        Matrix3::new(
            self.a,
            self.b * cg,
            self.c * cb,
            0.0,
            self.b * sg,
            self.c * (ca - cb * cg) / sg,
            0.0,
            0.0,
            self.c * v / sg,
        )
    }

    /// Niggli reduction.
    ///
    /// Return
    /// ----------
    /// * The reduced cell and the unimodular matrix `P` expressing the
    ///   reduced basis in the input basis (`A_reduced = A_input · P`), or
    ///   [`CosymError::ReductionNotConverged`] past the iteration cap.
    pub fn niggli_reduced(&self) -> Result<(UnitCell, Matrix3<i32>), CosymError> {
        let g = self.metric_tensor();
        let mut a2 = g[(0, 0)];
        let mut b2 = g[(1, 1)];
        let mut c2 = g[(2, 2)];
        let mut xi = 2.0 * g[(1, 2)];
        let mut eta = 2.0 * g[(0, 2)];
        let mut zeta = 2.0 * g[(0, 1)];
        let mut p = Matrix3::<i32>::identity();
        let eps = 1e-5 * self.volume().powf(2.0 / 3.0);

        let mut steps = 0;
        loop {
            steps += 1;
            if steps > MAX_REDUCTION_STEPS {
                return Err(CosymError::ReductionNotConverged(MAX_REDUCTION_STEPS));
            }

            // A1: order a ≤ b
            if a2 > b2 + eps || ((a2 - b2).abs() <= eps && xi.abs() > eta.abs() + eps) {
                std::mem::swap(&mut a2, &mut b2);
                std::mem::swap(&mut xi, &mut eta);
                p *= Matrix3::new(0, -1, 0, -1, 0, 0, 0, 0, -1);
            }
            // A2: order b ≤ c
            if b2 > c2 + eps || ((b2 - c2).abs() <= eps && eta.abs() > zeta.abs() + eps) {
                std::mem::swap(&mut b2, &mut c2);
                std::mem::swap(&mut eta, &mut zeta);
                p *= Matrix3::new(-1, 0, 0, 0, 0, -1, 0, -1, 0);
                continue;
            }
            // A3/A4: fix the signs of ξ, η, ζ
            if xi * eta * zeta > 0.0 {
                let (i, j, k) = (sign_of(xi), sign_of(eta), sign_of(zeta));
                xi *= (j * k) as f64;
                eta *= (i * k) as f64;
                zeta *= (i * j) as f64;
                p *= Matrix3::from_diagonal(&Vector3::new(i, j, k));
            } else {
                let mut i = 1;
                let mut j = 1;
                let mut k = 1;
                let mut zero_slot = None;
                if xi > eps {
                    i = -1;
                } else if xi >= -eps {
                    zero_slot = Some(0);
                }
                if eta > eps {
                    j = -1;
                } else if eta >= -eps {
                    zero_slot = Some(1);
                }
                if zeta > eps {
                    k = -1;
                } else if zeta >= -eps {
                    zero_slot = Some(2);
                }
                if i * j * k < 0 {
                    match zero_slot {
                        Some(0) => i = -1,
                        Some(1) => j = -1,
                        Some(2) => k = -1,
                        _ => return Err(CosymError::ReductionNotConverged(steps)),
                    }
                }
                if (i, j, k) != (1, 1, 1) {
                    xi *= (j * k) as f64;
                    eta *= (i * k) as f64;
                    zeta *= (i * j) as f64;
                    p *= Matrix3::from_diagonal(&Vector3::new(i, j, k));
                }
            }
            // A5
            if xi.abs() > b2 + eps
                || ((xi - b2).abs() <= eps && 2.0 * eta < zeta - eps)
                || ((xi + b2).abs() <= eps && zeta < -eps)
            {
                let s = sign_of(xi);
                c2 = b2 + c2 - xi * s as f64;
                eta -= zeta * s as f64;
                xi -= 2.0 * b2 * s as f64;
                p *= Matrix3::new(1, 0, 0, 0, 1, -s, 0, 0, 1);
                continue;
            }
            // A6
            if eta.abs() > a2 + eps
                || ((eta - a2).abs() <= eps && 2.0 * xi < zeta - eps)
                || ((eta + a2).abs() <= eps && zeta < -eps)
            {
                let s = sign_of(eta);
                c2 = a2 + c2 - eta * s as f64;
                xi -= zeta * s as f64;
                eta -= 2.0 * a2 * s as f64;
                p *= Matrix3::new(1, 0, -s, 0, 1, 0, 0, 0, 1);
                continue;
            }
            // A7
            if zeta.abs() > a2 + eps
                || ((zeta - a2).abs() <= eps && 2.0 * xi < eta - eps)
                || ((zeta + a2).abs() <= eps && eta < -eps)
            {
                let s = sign_of(zeta);
                b2 = a2 + b2 - zeta * s as f64;
                xi -= eta * s as f64;
                zeta -= 2.0 * a2 * s as f64;
                p *= Matrix3::new(1, -s, 0, 0, 1, 0, 0, 0, 1);
                continue;
            }
            // A8
            let total = xi + eta + zeta + a2 + b2;
            if total < -eps || (total.abs() <= eps && 2.0 * (a2 + eta) + zeta > eps) {
                let (old_a2, old_b2) = (a2, b2);
                c2 = a2 + b2 + c2 + xi + eta + zeta;
                xi += 2.0 * old_b2 + zeta;
                eta += 2.0 * old_a2 + zeta;
                p *= Matrix3::new(1, 0, 1, 0, 1, 1, 0, 0, 1);
                continue;
            }
            break;
        }

        let (a, b, c) = (a2.sqrt(), b2.sqrt(), c2.sqrt());
        let reduced = UnitCell::new(
            a,
            b,
            c,
            (xi / (2.0 * b * c)).clamp(-1.0, 1.0).acos().to_degrees(),
            (eta / (2.0 * a * c)).clamp(-1.0, 1.0).acos().to_degrees(),
            (zeta / (2.0 * a * b)).clamp(-1.0, 1.0).acos().to_degrees(),
        )?;
        Ok((reduced, p))
    }
}

fn sign_of(value: f64) -> i32 {
    if value > 0.0 {
        1
    } else {
        -1
    }
}

#[cfg(test)]
mod test_unit_cell {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn rejects_degenerate_cells() {
        assert!(UnitCell::new(0.0, 4.0, 5.0, 90.0, 90.0, 90.0).is_err());
        assert!(UnitCell::new(3.0, 4.0, 5.0, 190.0, 90.0, 90.0).is_err());
        // α + β + γ constraint violated: flat cell
        assert!(UnitCell::new(3.0, 4.0, 5.0, 30.0, 30.0, 60.0).is_err());
    }

    #[test]
    fn orthorhombic_volume_and_metric() {
        let cell = UnitCell::new(3.0, 4.0, 5.0, 90.0, 90.0, 90.0).unwrap();
        assert_relative_eq!(cell.volume(), 60.0, epsilon = 1e-10);
        let g = cell.metric_tensor();
        assert_relative_eq!(g[(0, 0)], 9.0, epsilon = 1e-10);
        assert_relative_eq!(g[(1, 2)], 0.0, epsilon = 1e-9);
    }

    #[test]
    fn reduction_of_reduced_cell_is_identity() {
        let cell = UnitCell::new(3.0, 4.0, 5.0, 90.0, 90.0, 90.0).unwrap();
        let (reduced, p) = cell.niggli_reduced().unwrap();
        assert_eq!(p, Matrix3::identity());
        assert_relative_eq!(reduced.a, 3.0, epsilon = 1e-9);
        assert_relative_eq!(reduced.b, 4.0, epsilon = 1e-9);
        assert_relative_eq!(reduced.c, 5.0, epsilon = 1e-9);
        assert_relative_eq!(reduced.gamma, 90.0, epsilon = 1e-9);
    }

    #[test]
    fn sheared_basis_reduces_back() {
        // start from (3,4,5,90,90,90) and shear: c' = a + c
        let a = Vector3::new(3.0, 0.0, 0.0);
        let b = Vector3::new(0.0, 4.0, 0.0);
        let c = Vector3::new(3.0, 0.0, 5.0);
        let len = |v: &Vector3<f64>| v.norm();
        let angle = |u: &Vector3<f64>, v: &Vector3<f64>| (u.dot(v) / (u.norm() * v.norm())).acos().to_degrees();
        let sheared = UnitCell::new(
            len(&a),
            len(&b),
            len(&c),
            angle(&b, &c),
            angle(&a, &c),
            angle(&a, &b),
        )
        .unwrap();
        let (reduced, p) = sheared.niggli_reduced().unwrap();
        assert_relative_eq!(reduced.a, 3.0, epsilon = 1e-6);
        assert_relative_eq!(reduced.b, 4.0, epsilon = 1e-6);
        assert_relative_eq!(reduced.c, 5.0, epsilon = 1e-6);
        assert_relative_eq!(reduced.alpha, 90.0, epsilon = 1e-6);
        assert_relative_eq!(reduced.beta, 90.0, epsilon = 1e-6);
        assert_relative_eq!(reduced.gamma, 90.0, epsilon = 1e-6);
        // the transform is unimodular
        let det = p.map(|v| v as f64).determinant();
        assert_relative_eq!(det.abs(), 1.0, epsilon = 1e-12);
        // volume is preserved
        assert_relative_eq!(reduced.volume(), sheared.volume(), epsilon = 1e-6);
    }
}
