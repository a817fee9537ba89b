//! # Constants and type definitions for cosym
//!
//! This module centralizes the **numeric defaults** and **common type
//! definitions** used throughout the `cosym` library.
//!
//! ## Overview
//!
//! - Default tuning values for the correlation engine and the lattice
//!   symmetry search
//! - Core type aliases used across the crate
//! - Container types for storing symmetry operations
//!
//! These definitions are used by all main modules, including the reflection
//! table, the symmetry machinery, and the target function.

use smallvec::SmallVec;

use crate::symmetry::SymOp;

// -------------------------------------------------------------------------------------------------
// Numeric defaults
// -------------------------------------------------------------------------------------------------

/// Minimum number of common reflections required before a correlation
/// coefficient between two (dataset, operation) pairs is kept.
pub const DEFAULT_MIN_PAIRS: usize = 3;

/// Maximum angular deviation (degrees) accepted by the lattice symmetry
/// search when deriving the lattice group from the reduced unit cell.
pub const DEFAULT_MAX_DELTA: f64 = 5.0;

/// Denominator of symmetry operation translations. Every crystallographic
/// translation component is a multiple of 1/12.
pub const TRANSLATION_DENOMINATOR: i32 = 12;

/// Hard cap on the order of a space group produced by closure. Expanding a
/// group past this bound indicates an inconsistent operation set.
pub const MAX_GROUP_ORDER: usize = 192;

/// Hard cap on the order of a lattice point group (cubic holohedry).
pub const MAX_LATTICE_GROUP_ORDER: usize = 48;

/// Step used by the finite-difference gradient and curvature oracles.
pub const FD_EPS: f64 = 1e-6;

// -------------------------------------------------------------------------------------------------
// Type aliases
// -------------------------------------------------------------------------------------------------

/// A Miller index (h, k, l).
pub type MillerIndex = [i32; 3];

/// Identifier tying a reflection to the lattice (dataset) it was measured on.
pub type LatticeId = i32;

/// Ordered list of candidate symmetry operations. Small by construction:
/// most lattice symmetries admit only a handful of twin laws.
pub type SymOps = SmallVec<[SymOp; 4]>;
