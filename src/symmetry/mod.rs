//! # Symmetry operations on the reflection index space
//!
//! This module defines [`SymOp`], the invertible affine transform used
//! everywhere a candidate symmetry or twin law appears: reindexing
//! reflections, expanding space groups, keying the correlation cache.
//!
//! ## Overview
//! -----------------
//! A [`SymOp`] is an integer 3×3 rotation part together with a translation
//! part stored in twelfths (every crystallographic translation component is
//! a multiple of 1/12). The operation set is closed under:
//!
//! * `compose` – operation product,
//! * `inverse` – exact integer inversion (determinant ±1),
//! * `apply` – action on a Miller index,
//! * `as_xyz` / `from_xyz` – the canonical triplet form (`"x,y,z"`,
//!   `"-y,x-y,z+1/3"`, …) used as the key for caches and ordered sets.
//!
//! Miller indices transform as column vectors (`h' = R·h`). Under this
//! convention the correlation between dataset `a` reindexed by `k` and
//! dataset `b` reindexed by `kk` equals the correlation between `a`
//! untransformed and `b` reindexed by `k⁻¹·kk`, which is the identity the
//! correlation cache relies on.

pub mod lattice_symmetry;
pub mod space_group;

use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

use nalgebra::{Matrix3, Vector3};

use crate::constants::{MillerIndex, TRANSLATION_DENOMINATOR};
use crate::cosym_errors::CosymError;

/// An invertible affine transform of the reflection index space.
///
/// The rotation part acts on Miller indices as a column vector; the
/// translation part only matters through the phase shift `h·t`, which
/// decides systematic absences.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymOp {
    rot: Matrix3<i32>,
    /// Translation components in units of 1/12, reduced to `0..12`.
    trans: Vector3<i32>,
}

impl Hash for SymOp {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.rot.as_slice().hash(state);
        self.trans.as_slice().hash(state);
    }
}

impl SymOp {
    /// Build an operation from a rotation matrix and a translation in
    /// twelfths. Translations are reduced modulo one lattice period.
    pub fn new(rot: Matrix3<i32>, trans: Vector3<i32>) -> Self {
        SymOp {
            rot,
            trans: trans.map(|t| t.rem_euclid(TRANSLATION_DENOMINATOR)),
        }
    }

    /// The identity operation `x,y,z`.
    pub fn identity() -> Self {
        SymOp::new(Matrix3::identity(), Vector3::zeros())
    }

    /// The inversion `-x,-y,-z`.
    pub fn inversion() -> Self {
        SymOp::new(-Matrix3::<i32>::identity(), Vector3::zeros())
    }

    pub fn rot(&self) -> &Matrix3<i32> {
        &self.rot
    }

    /// Determinant of the rotation part. Proper operations have +1.
    pub fn det(&self) -> i32 {
        let r = &self.rot;
        r[(0, 0)] * (r[(1, 1)] * r[(2, 2)] - r[(1, 2)] * r[(2, 1)])
            - r[(0, 1)] * (r[(1, 0)] * r[(2, 2)] - r[(1, 2)] * r[(2, 0)])
            + r[(0, 2)] * (r[(1, 0)] * r[(2, 1)] - r[(1, 1)] * r[(2, 0)])
    }

    pub fn is_identity(&self) -> bool {
        self.rot == Matrix3::identity() && self.trans == Vector3::zeros()
    }

    /// Strip the translation part.
    pub fn rotation_only(&self) -> SymOp {
        SymOp::new(self.rot, Vector3::zeros())
    }

    /// Operation product `self ∘ rhs` (apply `rhs` first).
    pub fn compose(&self, rhs: &SymOp) -> SymOp {
        SymOp::new(self.rot * rhs.rot, self.rot * rhs.trans + self.trans)
    }

    /// Exact inverse.
    ///
    /// Return
    /// ----------
    /// * The inverse operation, or [`CosymError::NonInvertibleOperation`] if
    ///   the rotation determinant is not ±1.
    pub fn inverse(&self) -> Result<SymOp, CosymError> {
        let det = self.det();
        if det != 1 && det != -1 {
            return Err(CosymError::NonInvertibleOperation(self.as_xyz()));
        }
        // det² == 1, so adj(R)·det == adj(R)/det == R⁻¹
        let inv = adjugate(&self.rot) * det;
        Ok(SymOp::new(inv, -(inv * self.trans)))
    }

    /// Apply the rotation part to a Miller index (column action).
    pub fn apply(&self, hkl: &MillerIndex) -> MillerIndex {
        let h = self.rot * Vector3::new(hkl[0], hkl[1], hkl[2]);
        [h[0], h[1], h[2]]
    }

    /// Phase shift `h·t` in twelfths, reduced modulo one period. A fixed
    /// index with a non-zero phase shift is systematically absent.
    pub fn phase_shift(&self, hkl: &MillerIndex) -> i32 {
        (hkl[0] * self.trans[0] + hkl[1] * self.trans[1] + hkl[2] * self.trans[2])
            .rem_euclid(TRANSLATION_DENOMINATOR)
    }

    /// Conjugate by a unimodular index-basis change `h' = T·h`: the rotation
    /// becomes `T·R·T⁻¹` and the translation `T⁻ᵀ·t`, which keeps the phase
    /// shift `h·t` invariant across the change of basis.
    ///
    /// `t_inv` must be the exact integer inverse of `t`; both come from the
    /// cell reduction, whose transforms have determinant ±1.
    pub fn conjugated(&self, t: &Matrix3<i32>, t_inv: &Matrix3<i32>) -> SymOp {
        SymOp::new(t * self.rot * t_inv, t_inv.transpose() * self.trans)
    }

    /// Canonical triplet form, e.g. `"-y,x-y,z+1/3"`. This string is the
    /// cache and set key for operations.
    pub fn as_xyz(&self) -> String {
        let rows: Vec<String> = (0..3)
            .map(|i| {
                fmt_component(
                    &[self.rot[(i, 0)], self.rot[(i, 1)], self.rot[(i, 2)]],
                    self.trans[i],
                )
            })
            .collect();
        rows.join(",")
    }

    /// Parse the triplet form produced by [`SymOp::as_xyz`].
    ///
    /// Arguments
    /// -----------------
    /// * `triplet`: three comma-separated components, each a signed sum of
    ///   `x`/`y`/`z` terms (with optional integer coefficient) and integer
    ///   or fractional translations, e.g. `"x+1/2,-y,z"`.
    pub fn from_xyz(triplet: &str) -> Result<SymOp, CosymError> {
        let parts: Vec<&str> = triplet.split(',').collect();
        if parts.len() != 3 {
            return Err(CosymError::InvalidTriplet(triplet.to_string()));
        }
        let mut rot = Matrix3::zeros();
        let mut trans = Vector3::zeros();
        for (i, part) in parts.iter().enumerate() {
            let (coeffs, t) = parse_component(part)
                .ok_or_else(|| CosymError::InvalidTriplet(triplet.to_string()))?;
            rot[(i, 0)] = coeffs[0];
            rot[(i, 1)] = coeffs[1];
            rot[(i, 2)] = coeffs[2];
            trans[i] = t;
        }
        Ok(SymOp::new(rot, trans))
    }
}

impl fmt::Display for SymOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_xyz())
    }
}

impl FromStr for SymOp {
    type Err = CosymError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SymOp::from_xyz(s)
    }
}

fn adjugate(r: &Matrix3<i32>) -> Matrix3<i32> {
    Matrix3::new(
        r[(1, 1)] * r[(2, 2)] - r[(1, 2)] * r[(2, 1)],
        r[(0, 2)] * r[(2, 1)] - r[(0, 1)] * r[(2, 2)],
        r[(0, 1)] * r[(1, 2)] - r[(0, 2)] * r[(1, 1)],
        r[(1, 2)] * r[(2, 0)] - r[(1, 0)] * r[(2, 2)],
        r[(0, 0)] * r[(2, 2)] - r[(0, 2)] * r[(2, 0)],
        r[(0, 2)] * r[(1, 0)] - r[(0, 0)] * r[(1, 2)],
        r[(1, 0)] * r[(2, 1)] - r[(1, 1)] * r[(2, 0)],
        r[(0, 1)] * r[(2, 0)] - r[(0, 0)] * r[(2, 1)],
        r[(0, 0)] * r[(1, 1)] - r[(0, 1)] * r[(1, 0)],
    )
}

fn gcd(a: i32, b: i32) -> i32 {
    let (mut a, mut b) = (a.abs(), b.abs());
    while b != 0 {
        let t = a % b;
        a = b;
        b = t;
    }
    a
}

fn fmt_component(coeffs: &[i32; 3], t: i32) -> String {
    let mut s = String::new();
    for (&coeff, var) in coeffs.iter().zip(['x', 'y', 'z']) {
        if coeff == 0 {
            continue;
        }
        if coeff > 0 && !s.is_empty() {
            s.push('+');
        }
        if coeff == -1 {
            s.push('-');
        } else if coeff != 1 {
            s.push_str(&coeff.to_string());
        }
        s.push(var);
    }
    if t != 0 {
        // t is reduced to 0..12, so it always prints as a positive fraction
        let g = gcd(t, TRANSLATION_DENOMINATOR);
        let (num, den) = (t / g, TRANSLATION_DENOMINATOR / g);
        if !s.is_empty() {
            s.push('+');
        }
        s.push_str(&num.to_string());
        if den != 1 {
            s.push('/');
            s.push_str(&den.to_string());
        }
    }
    if s.is_empty() {
        s.push('0');
    }
    s
}

/// Parse one component of a triplet. Returns the x/y/z coefficients and the
/// translation in twelfths, or `None` on malformed input.
fn parse_component(part: &str) -> Option<([i32; 3], i32)> {
    let chars: Vec<char> = part.chars().filter(|c| !c.is_whitespace()).collect();
    if chars.is_empty() {
        return None;
    }
    let mut coeffs = [0i32; 3];
    let mut trans = 0i32;
    let mut i = 0;
    while i < chars.len() {
        let mut sign = 1i32;
        while i < chars.len() && (chars[i] == '+' || chars[i] == '-') {
            if chars[i] == '-' {
                sign = -sign;
            }
            i += 1;
        }
        if i >= chars.len() {
            return None;
        }
        let mut num: Option<i32> = None;
        let digit_start = i;
        while i < chars.len() && chars[i].is_ascii_digit() {
            i += 1;
        }
        if i > digit_start {
            num = Some(chars[digit_start..i].iter().collect::<String>().parse().ok()?);
        }
        if i < chars.len() && chars[i] == '/' {
            // fractional translation num/den
            i += 1;
            let den_start = i;
            while i < chars.len() && chars[i].is_ascii_digit() {
                i += 1;
            }
            if i == den_start {
                return None;
            }
            let den: i32 = chars[den_start..i].iter().collect::<String>().parse().ok()?;
            if den == 0 || TRANSLATION_DENOMINATOR % den != 0 {
                return None;
            }
            trans += sign * num? * (TRANSLATION_DENOMINATOR / den);
        } else if i < chars.len() && matches!(chars[i], 'x' | 'y' | 'z' | 'X' | 'Y' | 'Z') {
            let axis = match chars[i].to_ascii_lowercase() {
                'x' => 0,
                'y' => 1,
                _ => 2,
            };
            coeffs[axis] += sign * num.unwrap_or(1);
            i += 1;
        } else if let Some(n) = num {
            trans += sign * n * TRANSLATION_DENOMINATOR;
        } else {
            return None;
        }
    }
    Some((coeffs, trans))
}
