//! # Space groups over [`SymOp`]
//!
//! A [`SpaceGroup`] is an insertion-ordered, duplicate-free list of
//! operations closed under composition, identity first. It provides the
//! derived groups and per-index services the correlation engine needs:
//! Patterson and acentric derivations, epsilon (multiplicity) factors,
//! systematic-absence tests, asymmetric-unit mapping, and left-coset
//! decomposition for twin-law enumeration.
//!
//! The asymmetric-unit representative is a deterministic canonical choice
//! (lexicographic maximum over the orbit, Friedel mates included); any
//! consistent choice yields identical matching downstream.

use std::collections::HashSet;

use ahash::RandomState;
use nalgebra::Matrix3;

use crate::constants::{MillerIndex, MAX_GROUP_ORDER};
use crate::cosym_errors::CosymError;
use crate::symmetry::SymOp;

type OpSet = HashSet<SymOp, RandomState>;

/// A finite group of symmetry operations, insertion-ordered with the
/// identity first.
#[derive(Debug, Clone, PartialEq)]
pub struct SpaceGroup {
    ops: Vec<SymOp>,
}

impl SpaceGroup {
    /// The trivial group P1.
    pub fn p1() -> Self {
        SpaceGroup {
            ops: vec![SymOp::identity()],
        }
    }

    /// Close a generator set under composition.
    ///
    /// Arguments
    /// -----------------
    /// * `generators`: any operation list; the identity is prepended if
    ///   absent and duplicates are dropped.
    /// * `max_order`: hard cap on the closure size; exceeding it returns
    ///   [`CosymError::GroupOrderOverflow`] instead of looping on an
    ///   inconsistent set.
    pub fn from_generators(generators: &[SymOp], max_order: usize) -> Result<Self, CosymError> {
        let mut ops: Vec<SymOp> = vec![SymOp::identity()];
        let mut seen: OpSet = OpSet::default();
        seen.insert(SymOp::identity());
        for op in generators {
            if seen.insert(op.clone()) {
                ops.push(op.clone());
            }
        }
        // fixed-point closure; finite crystallographic groups converge in a
        // few rounds, anything else trips the cap
        loop {
            let mut added = Vec::new();
            for a in &ops {
                for b in &ops {
                    let product = a.compose(b);
                    if seen.insert(product.clone()) {
                        added.push(product);
                    }
                }
            }
            if added.is_empty() {
                break;
            }
            ops.extend(added);
            if ops.len() > max_order {
                return Err(CosymError::GroupOrderOverflow { limit: max_order });
            }
        }
        Ok(SpaceGroup { ops })
    }

    /// Parse a group from triplet strings, e.g. `["x,y,z", "-x,y,-z"]`.
    pub fn from_triplets<'a, I>(triplets: I) -> Result<Self, CosymError>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let generators: Vec<SymOp> = triplets
            .into_iter()
            .map(SymOp::from_xyz)
            .collect::<Result<_, _>>()?;
        SpaceGroup::from_generators(&generators, MAX_GROUP_ORDER)
    }

    /// The group extended by extra generators, re-closed.
    pub fn expanded_by(&self, extra: &[SymOp]) -> Result<SpaceGroup, CosymError> {
        let mut generators = self.ops.clone();
        generators.extend_from_slice(extra);
        SpaceGroup::from_generators(&generators, MAX_GROUP_ORDER)
    }

    pub fn order(&self) -> usize {
        self.ops.len()
    }

    pub fn ops(&self) -> &[SymOp] {
        &self.ops
    }

    pub fn contains(&self, op: &SymOp) -> bool {
        self.ops.iter().any(|o| o == op)
    }

    /// Conjugate every operation by a unimodular basis change.
    pub fn change_basis(&self, m: &Matrix3<i32>, m_inv: &Matrix3<i32>) -> SpaceGroup {
        SpaceGroup {
            ops: self.ops.iter().map(|op| op.conjugated(m, m_inv)).collect(),
        }
    }

    /// Derived Patterson group: rotation parts only, extended by the
    /// inversion and re-closed. This is the group under which epsilon
    /// factors are computed.
    pub fn build_derived_patterson_group(&self) -> Result<SpaceGroup, CosymError> {
        let mut generators: Vec<SymOp> = self.ops.iter().map(SymOp::rotation_only).collect();
        generators.push(SymOp::inversion());
        SpaceGroup::from_generators(&generators, MAX_GROUP_ORDER)
    }

    /// Derived acentric group: the proper (determinant +1) operations.
    /// Products of proper operations are proper, so the subset is already
    /// closed and keeps its insertion order.
    pub fn build_derived_acentric_group(&self) -> SpaceGroup {
        SpaceGroup {
            ops: self.ops.iter().filter(|op| op.det() > 0).cloned().collect(),
        }
    }

    /// Epsilon (multiplicity) factor of an index: the number of distinct
    /// rotation parts that leave the index fixed. General-position indices
    /// have epsilon 1.
    pub fn epsilon(&self, hkl: &MillerIndex) -> i32 {
        let mut fixing: HashSet<[i32; 9], RandomState> = HashSet::default();
        for op in &self.ops {
            if op.apply(hkl) == *hkl {
                let r = op.rot();
                let mut key = [0i32; 9];
                key.copy_from_slice(r.as_slice());
                fixing.insert(key);
            }
        }
        fixing.len() as i32
    }

    /// Whether an index is systematically absent: some operation fixes it
    /// with a non-zero phase shift.
    pub fn is_systematically_absent(&self, hkl: &MillerIndex) -> bool {
        self.ops
            .iter()
            .any(|op| op.apply(hkl) == *hkl && op.phase_shift(hkl) != 0)
    }

    /// Canonical asymmetric-unit representative of an index, Friedel mates
    /// merged (non-anomalous): the lexicographic maximum over the orbit.
    pub fn map_to_asu(&self, hkl: &MillerIndex) -> MillerIndex {
        let mut best = *hkl;
        for op in &self.ops {
            let equivalent = op.apply(hkl);
            let friedel = [-equivalent[0], -equivalent[1], -equivalent[2]];
            if equivalent > best {
                best = equivalent;
            }
            if friedel > best {
                best = friedel;
            }
        }
        best
    }

    /// Left-coset decomposition of `self` by `subgroup`.
    ///
    /// Return
    /// ----------
    /// * Partitions in insertion order of `self`; the first partition is the
    ///   coset of the identity. Each partition leads with its representative.
    pub fn left_cosets(&self, subgroup: &SpaceGroup) -> Vec<Vec<SymOp>> {
        let mut partitions: Vec<Vec<SymOp>> = Vec::new();
        let mut seen: OpSet = OpSet::default();
        for op in &self.ops {
            if seen.contains(op) {
                continue;
            }
            let mut coset = Vec::with_capacity(subgroup.order());
            for h in subgroup.ops() {
                let member = op.compose(h);
                if seen.insert(member.clone()) {
                    coset.push(member);
                }
            }
            partitions.push(coset);
        }
        partitions
    }
}

#[cfg(test)]
mod test_space_group {
    use super::*;

    fn p21() -> SpaceGroup {
        SpaceGroup::from_triplets(["x,y,z", "-x,y+1/2,-z"]).unwrap()
    }

    #[test]
    fn closure_orders() {
        assert_eq!(SpaceGroup::p1().order(), 1);
        assert_eq!(p21().order(), 2);

        let p222 = SpaceGroup::from_triplets(["-x,-y,z", "x,-y,-z"]).unwrap();
        assert_eq!(p222.order(), 4);
    }

    #[test]
    fn identity_is_first() {
        let g = SpaceGroup::from_triplets(["-x,y,-z", "x,y,z"]).unwrap();
        assert!(g.ops()[0].is_identity());
    }

    #[test]
    fn patterson_group_of_p21() {
        // 2₁/b → derived Patterson 2/m: ±identity, ±twofold
        let patterson = p21().build_derived_patterson_group().unwrap();
        assert_eq!(patterson.order(), 4);
        assert!(patterson.contains(&SymOp::inversion()));
        assert!(patterson
            .ops()
            .iter()
            .all(|op| op.phase_shift(&[1, 1, 1]) == 0));
    }

    #[test]
    fn acentric_group_is_proper_half() {
        let patterson = p21().build_derived_patterson_group().unwrap();
        let acentric = patterson.build_derived_acentric_group();
        assert_eq!(acentric.order(), 2);
        assert!(acentric.ops().iter().all(|op| op.det() > 0));
    }

    #[test]
    fn epsilon_on_twofold_axis() {
        let patterson = p21().build_derived_patterson_group().unwrap();
        // (0,k,0) lies on the twofold axis
        assert_eq!(patterson.epsilon(&[0, 2, 0]), 2);
        // general position
        assert_eq!(patterson.epsilon(&[1, 2, 3]), 1);
    }

    #[test]
    fn screw_axis_absences() {
        let g = p21();
        assert!(g.is_systematically_absent(&[0, 1, 0]));
        assert!(!g.is_systematically_absent(&[0, 2, 0]));
        assert!(!g.is_systematically_absent(&[1, 2, 3]));
    }

    #[test]
    fn asu_mapping_is_orbit_invariant() {
        let g = SpaceGroup::from_triplets(["-x,y,-z"]).unwrap();
        let h = [1, -2, 3];
        let asu = g.map_to_asu(&h);
        for op in g.ops() {
            let equivalent = op.apply(&h);
            assert_eq!(g.map_to_asu(&equivalent), asu);
            let friedel = [-equivalent[0], -equivalent[1], -equivalent[2]];
            assert_eq!(g.map_to_asu(&friedel), asu);
        }
    }

    #[test]
    fn coset_partition_covers_group() {
        let p222 = SpaceGroup::from_triplets(["-x,-y,z", "x,-y,-z"]).unwrap();
        let subgroup = SpaceGroup::from_triplets(["-x,-y,z"]).unwrap();
        let partitions = p222.left_cosets(&subgroup);
        assert_eq!(partitions.len(), 2);
        assert!(partitions[0].iter().any(|op| op.is_identity()));
        let total: usize = partitions.iter().map(Vec::len).sum();
        assert_eq!(total, p222.order());
    }
}
