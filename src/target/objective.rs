//! # Embedding objective
//!
//! Value, analytic gradient and diagonal curvature of the misfit
//!
//! ```text
//! f(x) = ½ · Σ wij ∘ (rij − xᵀx)²
//! ```
//!
//! where `x` is the `dim × N` coordinate matrix (one column per
//! (dataset, operation) pair) and `∘` is the elementwise product, with the
//! all-ones matrix standing in for an absent wij.
//!
//! The finite-difference variants exist purely as correctness oracles for
//! the analytic forms; production use calls the analytic forms only. All
//! functions are pure in `(x, rij, wij)`.

use nalgebra::DMatrix;

use crate::cosym_errors::CosymError;

/// Reshape the flattened coordinates into `dim × N`, row-major: the
/// coordinates of the first dimension are stored first, then the second,
/// and so on.
fn coordinates(
    rij: &DMatrix<f64>,
    dim: usize,
    x: &[f64],
) -> Result<DMatrix<f64>, CosymError> {
    let nn = rij.nrows();
    if x.len() != dim * nn {
        return Err(CosymError::CoordinateLength {
            actual: x.len(),
            expected: dim * nn,
        });
    }
    Ok(DMatrix::from_row_slice(dim, nn, x))
}

/// Value of the target function at `x`.
pub(crate) fn functional(
    rij: &DMatrix<f64>,
    wij: Option<&DMatrix<f64>>,
    dim: usize,
    x: &[f64],
) -> Result<f64, CosymError> {
    let coords = coordinates(rij, dim, x)?;
    let gram = coords.transpose() * &coords;
    let mut elements = (rij - gram).map(|e| e * e);
    if let Some(wij) = wij {
        elements.component_mul_assign(wij);
    }
    Ok(0.5 * elements.sum())
}

/// Analytic gradient `−2·x·(W∘rij − W∘(xᵀx))`, flattened row-major.
pub(crate) fn gradients(
    rij: &DMatrix<f64>,
    wij: Option<&DMatrix<f64>>,
    dim: usize,
    x: &[f64],
) -> Result<Vec<f64>, CosymError> {
    let coords = coordinates(rij, dim, x)?;
    let gram = coords.transpose() * &coords;
    let grad = match wij {
        Some(wij) => &coords * (wij.component_mul(rij) - wij.component_mul(&gram)) * -2.0,
        None => &coords * (rij - gram) * -2.0,
    };
    Ok(flatten_row_major(&grad))
}

/// Diagonal curvature approximation `2·x²·W`, flattened row-major. Cross
/// terms are ignored; this is the preconditioner form, not the Hessian.
pub(crate) fn curvatures(
    rij: &DMatrix<f64>,
    wij: Option<&DMatrix<f64>>,
    dim: usize,
    x: &[f64],
) -> Result<Vec<f64>, CosymError> {
    let coords = coordinates(rij, dim, x)?;
    let squared = coords.component_mul(&coords);
    let curv = match wij {
        Some(wij) => squared * wij * 2.0,
        None => squared * DMatrix::from_element(rij.nrows(), rij.ncols(), 1.0) * 2.0,
    };
    Ok(flatten_row_major(&curv))
}

/// Central finite-difference gradient, step `eps`.
pub(crate) fn gradients_fd(
    rij: &DMatrix<f64>,
    wij: Option<&DMatrix<f64>>,
    dim: usize,
    x: &[f64],
    eps: f64,
) -> Result<Vec<f64>, CosymError> {
    let mut perturbed = x.to_vec();
    let mut grad = vec![0.0; x.len()];
    for i in 0..x.len() {
        perturbed[i] += eps;
        let fp = functional(rij, wij, dim, &perturbed)?;
        perturbed[i] -= 2.0 * eps;
        let fm = functional(rij, wij, dim, &perturbed)?;
        perturbed[i] += eps;
        grad[i] = (fp - fm) / (2.0 * eps);
    }
    Ok(grad)
}

/// Central finite-difference curvature diagonal, step `eps`.
pub(crate) fn curvatures_fd(
    rij: &DMatrix<f64>,
    wij: Option<&DMatrix<f64>>,
    dim: usize,
    x: &[f64],
    eps: f64,
) -> Result<Vec<f64>, CosymError> {
    let f = functional(rij, wij, dim, x)?;
    let mut perturbed = x.to_vec();
    let mut curv = vec![0.0; x.len()];
    for i in 0..x.len() {
        perturbed[i] += eps;
        let fp = functional(rij, wij, dim, &perturbed)?;
        perturbed[i] -= 2.0 * eps;
        let fm = functional(rij, wij, dim, &perturbed)?;
        perturbed[i] += eps;
        curv[i] = (fm - 2.0 * f + fp) / (eps * eps);
    }
    Ok(curv)
}

fn flatten_row_major(matrix: &DMatrix<f64>) -> Vec<f64> {
    let (rows, cols) = matrix.shape();
    let mut out = Vec::with_capacity(rows * cols);
    for row in 0..rows {
        for col in 0..cols {
            out.push(matrix[(row, col)]);
        }
    }
    out
}

#[cfg(test)]
mod test_objective {
    use super::*;
    use approx::assert_relative_eq;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn random_symmetric(n: usize, rng: &mut StdRng) -> DMatrix<f64> {
        let m = DMatrix::from_fn(n, n, |_, _| rng.random_range(-1.0..1.0));
        let mut sym: DMatrix<f64> = 0.5 * (&m + m.transpose());
        sym.fill_diagonal(0.0);
        sym
    }

    fn random_weights(n: usize, rng: &mut StdRng) -> DMatrix<f64> {
        let m = DMatrix::from_fn(n, n, |_, _| rng.random_range(0.0..5.0));
        let mut sym: DMatrix<f64> = 0.5 * (&m + m.transpose());
        // real wij matrices never populate the diagonal
        sym.fill_diagonal(0.0);
        sym
    }

    #[test]
    fn rejects_wrong_coordinate_length() {
        let rij = DMatrix::zeros(4, 4);
        let err = functional(&rij, None, 2, &[0.0; 7]).unwrap_err();
        assert_eq!(
            err,
            CosymError::CoordinateLength {
                actual: 7,
                expected: 8
            }
        );
    }

    #[test]
    fn zero_residual_gives_zero_functional_and_gradient() {
        let mut rng = StdRng::seed_from_u64(7);
        let dim = 2;
        let nn = 5;
        let x: Vec<f64> = (0..dim * nn).map(|_| rng.random_range(-1.0..1.0)).collect();
        let coords = DMatrix::from_row_slice(dim, nn, &x);
        // rij == xᵀx exactly: residual vanishes everywhere
        let rij = coords.transpose() * &coords;
        let wij = random_weights(nn, &mut rng);

        assert_relative_eq!(functional(&rij, None, dim, &x).unwrap(), 0.0);
        assert_relative_eq!(functional(&rij, Some(&wij), dim, &x).unwrap(), 0.0);

        // the gradient at the optimum is zero independent of the weighting
        let doubled = &wij * 2.0;
        for weights in [None, Some(&wij), Some(&doubled)] {
            let grad = gradients(&rij, weights, dim, &x).unwrap();
            for g in grad {
                assert_relative_eq!(g, 0.0, epsilon = 1e-12);
            }
        }
    }

    #[test]
    fn analytic_gradient_matches_finite_differences() {
        let mut rng = StdRng::seed_from_u64(42);
        let dim = 3;
        let nn = 6;
        let rij = random_symmetric(nn, &mut rng);
        let wij = random_weights(nn, &mut rng);
        let x: Vec<f64> = (0..dim * nn).map(|_| rng.random_range(-1.0..1.0)).collect();

        for weights in [None, Some(&wij)] {
            let analytic = gradients(&rij, weights, dim, &x).unwrap();
            let numeric = gradients_fd(&rij, weights, dim, &x, 1e-6).unwrap();
            for (a, n) in analytic.iter().zip(&numeric) {
                assert_relative_eq!(*a, *n, epsilon = 1e-6, max_relative = 1e-4);
            }
        }
    }

    #[test]
    fn curvature_diagonal_matches_finite_differences() {
        // with a zero-diagonal wij the diagonal approximation coincides with
        // the true per-coordinate second derivative
        let mut rng = StdRng::seed_from_u64(3);
        let dim = 2;
        let nn = 4;
        let rij = random_symmetric(nn, &mut rng);
        let wij = random_weights(nn, &mut rng);
        let x: Vec<f64> = (0..dim * nn).map(|_| rng.random_range(-1.0..1.0)).collect();

        let analytic = curvatures(&rij, Some(&wij), dim, &x).unwrap();
        let numeric = curvatures_fd(&rij, Some(&wij), dim, &x, 1e-4).unwrap();
        for (a, n) in analytic.iter().zip(&numeric) {
            assert_relative_eq!(*a, *n, epsilon = 1e-2, max_relative = 1e-3);
        }
    }

    #[test]
    fn functional_is_half_weighted_square_sum() {
        // 1 lattice × 2 ops, dim 2: hand-checkable numbers
        let rij = DMatrix::from_row_slice(2, 2, &[0.0, 0.8, 0.8, 0.0]);
        let x = [1.0, 0.0, 0.0, 1.0]; // columns e₁, e₂ → xᵀx = I
        let f = functional(&rij, None, 2, &x).unwrap();
        // residuals: diagonal 1−0 twice, off-diagonal 0.8 twice
        let expected = 0.5 * (2.0 * 1.0 + 2.0 * 0.8 * 0.8);
        assert_relative_eq!(f, expected, epsilon = 1e-12);
    }
}
