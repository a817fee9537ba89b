pub mod constants;
pub mod cosym_errors;
pub mod reflections;
pub mod symmetry;
pub mod target;
pub mod unit_cell;

pub use crate::reflections::{ReflectionBatch, ReflectionTable};
pub use crate::symmetry::space_group::SpaceGroup;
pub use crate::symmetry::SymOp;
pub use crate::target::{CosymParams, CosymParamsBuilder, Target, Weights};
pub use crate::unit_cell::UnitCell;
