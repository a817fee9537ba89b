use cosym::{CosymParams, ReflectionBatch, SpaceGroup, Target, UnitCell};

mod common;
use common::columns_from_datasets;

const INDICES: [[i32; 3]; 6] = [
    [1, 0, 0],
    [0, 1, 0],
    [0, 0, 1],
    [1, 1, 0],
    [1, 2, 3],
    [2, 1, 1],
];
const INTENSITIES: [f64; 6] = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0];

fn build_target(cell: UnitCell, params: CosymParams) -> Target {
    let columns = columns_from_datasets(&[(&INDICES, &INTENSITIES), (&INDICES, &INTENSITIES)]);
    let batch =
        ReflectionBatch::new(&columns.indices, &columns.intensities, &columns.lattice_ids)
            .unwrap();
    Target::new(&batch, &cell, &SpaceGroup::p1(), params).unwrap()
}

#[test]
fn orthorhombic_lattice_yields_three_twin_laws() {
    let cell = UnitCell::new(3.0, 4.0, 5.0, 90.0, 90.0, 90.0).unwrap();
    let target = build_target(cell, CosymParams::default());

    // identity + the three two-fold twin laws of mmm over P1 data
    assert_eq!(target.sym_ops().len(), 4);
    assert!(target.sym_ops()[0].is_identity());
    assert!(target.sym_ops().iter().all(|op| op.det() > 0));
    assert_eq!(target.dim(), 4);

    // expanded groups follow: P1 + three proper two-folds close into 222
    assert_eq!(target.lattice_group().order(), 4);
    assert_eq!(target.patterson_group().order(), 8);
}

#[test]
fn cubic_lattice_yields_the_full_proper_rotation_set() {
    let cell = UnitCell::new(4.0, 4.0, 4.0, 90.0, 90.0, 90.0).unwrap();
    let target = build_target(cell, CosymParams::default());
    assert_eq!(target.sym_ops().len(), 24);
    assert_eq!(target.dim(), 24);
}

#[test]
fn triclinic_lattice_yields_identity_only() {
    let cell = UnitCell::new(6.1, 7.3, 8.9, 83.0, 97.0, 101.0).unwrap();
    let target = build_target(cell, CosymParams::default());
    assert_eq!(target.sym_ops().len(), 1);
    // dimensionality never drops below 2
    assert_eq!(target.dim(), 2);
}

#[test]
fn supplied_lattice_group_bypasses_the_cell_search() {
    // cubic cell, but the caller narrows the analysis to P2
    let cell = UnitCell::new(4.0, 4.0, 4.0, 90.0, 90.0, 90.0).unwrap();
    let p2 = SpaceGroup::from_triplets(["-x,y,-z"]).unwrap();
    let params = CosymParams::builder().lattice_group(p2).build().unwrap();
    let target = build_target(cell, params);

    assert_eq!(target.sym_ops().len(), 2);
    assert!(target.sym_ops()[0].is_identity());
    assert_eq!(target.sym_ops()[1].as_xyz(), "-x,y,-z");
}

#[test]
fn dimensions_override_wins() {
    let cell = UnitCell::new(3.0, 4.0, 5.0, 90.0, 90.0, 90.0).unwrap();
    let params = CosymParams::builder().dimensions(2).build().unwrap();
    let target = build_target(cell, params);
    assert_eq!(target.sym_ops().len(), 4);
    assert_eq!(target.dim(), 2);
}

#[test]
fn set_dimensions_validates() {
    let cell = UnitCell::new(3.0, 4.0, 5.0, 90.0, 90.0, 90.0).unwrap();
    let mut target = build_target(cell, CosymParams::default());
    assert!(target.set_dimensions(1).is_err());
    target.set_dimensions(3).unwrap();
    assert_eq!(target.dim(), 3);
}

#[test]
#[allow(deprecated)]
fn deprecated_accessor_still_answers() {
    let cell = UnitCell::new(3.0, 4.0, 5.0, 90.0, 90.0, 90.0).unwrap();
    let target = build_target(cell, CosymParams::default());
    assert_eq!(target.get_sym_ops(), target.sym_ops());
}
