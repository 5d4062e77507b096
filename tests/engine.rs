//! End-to-end checks of the engine's public surface: build molecules through
//! the graph API (or the molfile adapter), then drive ring perception,
//! component management, substructure search, layout, and rendering the way
//! an interactive tool would.

use mol2d::coords::{assign_coords, CoordOptions};
use mol2d::loader::parse_molfile_str;
use mol2d::matcher::{find_in, Fragment, MatchOptions};
use mol2d::molecule::{Atom, AtomIx, Bond, BondOrder, Element, Molecule};
use mol2d::render::{render, RenderOptions};

fn benzene() -> (Molecule, Vec<AtomIx>) {
    let mut mol = Molecule::new();
    let atoms: Vec<AtomIx> = (0..6)
        .map(|_| mol.add_atom(Atom::new(Element::Carbon)))
        .collect();
    for i in 0..6 {
        let order = if i % 2 == 0 {
            BondOrder::Double
        } else {
            BondOrder::Single
        };
        mol.add_bond(atoms[i], atoms[(i + 1) % 6], Bond::of_order(order))
            .unwrap();
    }
    (mol, atoms)
}

#[test]
fn benzene_end_to_end() {
    let (mut mol, _) = benzene();

    // One aromatic six-ring; Euler count holds.
    assert_eq!(mol.ring_count(), 1);
    let ring = &mol.rings()[0];
    assert_eq!(ring.len(), 6);
    assert!(ring.is_aromatic());
    assert_eq!(
        mol.ring_count(),
        mol.bond_count() - mol.atom_count() + mol.connected_components().len()
    );

    mol.perceive_aromaticity();
    assert!(mol.bonds().all(|e| mol.bond(e).unwrap().aromatic));

    // Layout then render; the result must be reproducible.
    assign_coords(&mut mol, &CoordOptions::default());
    let ops = render(&mol, &RenderOptions::default());
    assert!(!ops.is_empty());
    assert_eq!(ops, render(&mol, &RenderOptions::default()));
}

#[test]
fn euler_identity_over_assorted_molecules() {
    let mut shapes: Vec<Molecule> = vec![benzene().0];

    // A disconnected molecule: a triangle plus a chain.
    let mut mixed = Molecule::new();
    let t: Vec<AtomIx> = (0..3)
        .map(|_| mixed.add_atom(Atom::new(Element::Carbon)))
        .collect();
    for i in 0..3 {
        mixed
            .add_bond(t[i], t[(i + 1) % 3], Bond::default())
            .unwrap();
    }
    let c1 = mixed.add_atom(Atom::new(Element::Oxygen));
    let c2 = mixed.add_atom(Atom::new(Element::Oxygen));
    mixed.add_bond(c1, c2, Bond::default()).unwrap();
    shapes.push(mixed);

    for mol in &shapes {
        let rank = mol.bond_count() as i64 - mol.atom_count() as i64
            + mol.connected_components().len() as i64;
        assert_eq!(mol.ring_count() as i64, rank);
    }
}

#[test]
fn biphenyl_bridge_cut_and_restore() {
    let mut mol = Molecule::new();
    let mut first = Vec::new();
    let mut second = Vec::new();
    for ring in [&mut first, &mut second] {
        let atoms: Vec<AtomIx> = (0..6)
            .map(|_| mol.add_atom(Atom::new(Element::Carbon)))
            .collect();
        for i in 0..6 {
            mol.add_bond(atoms[i], atoms[(i + 1) % 6], Bond::default())
                .unwrap();
        }
        *ring = atoms;
    }
    let bridge = mol.add_bond(first[0], second[0], Bond::default()).unwrap();

    assert_eq!(mol.connected_components().len(), 1);
    mol.temporarily_disconnect(bridge).unwrap();
    assert_eq!(mol.connected_components().len(), 2);

    // Each side materializes as an independent six-ring.
    let parts = mol.get_disconnected_subgraphs();
    assert_eq!(parts.len(), 2);
    for part in &parts {
        assert_eq!(part.ring_count(), 1);
        assert_eq!(part.formula().to_string(), "C6");
    }

    mol.reconnect_all_temporarily_disconnected();
    assert_eq!(mol.connected_components().len(), 1);
    assert_eq!(mol.bond_count(), 13);
}

#[test]
fn wildcard_fragment_search_is_sound() {
    let (target, _) = benzene();
    let mut query = Fragment::new();
    let a = query.add_free_site();
    let b = query.add_free_site();
    query.add_free_bond(a, b).unwrap();

    let matches: Vec<_> = find_in(&query, &target, MatchOptions::default()).collect();
    // Each of the six ring bonds in both orientations.
    assert_eq!(matches.len(), 12);
    for m in &matches {
        assert!(m.verify_against(&query, &target));
    }
}

#[test]
fn valency_overflow_is_reported_not_thrown() {
    let mut mol = Molecule::new();
    let c = mol.add_atom(Atom::new(Element::Carbon));
    for _ in 0..4 {
        let h = mol.add_atom(Atom::new(Element::Hydrogen));
        mol.add_bond(c, h, Bond::default()).unwrap();
    }
    assert_eq!(mol.free_valency(c).unwrap(), 0);

    let fifth = mol.add_atom(Atom::new(Element::Hydrogen));
    mol.add_bond(c, fifth, Bond::default()).unwrap();
    assert_eq!(mol.free_valency(c).unwrap(), -1);
}

#[test]
fn molfile_roundtrip_through_the_engine() {
    // Cyclohexene ring from a codec, with one double bond.
    let block = "
  engine

  6  6  0  0  0  0  0  0  0  0999 V2000
    0.0000    0.0000    0.0000 C   0  0  0  0  0  0  0  0  0  0  0  0
    0.8660    0.5000    0.0000 C   0  0  0  0  0  0  0  0  0  0  0  0
    1.7320    0.0000    0.0000 C   0  0  0  0  0  0  0  0  0  0  0  0
    1.7320   -1.0000    0.0000 C   0  0  0  0  0  0  0  0  0  0  0  0
    0.8660   -1.5000    0.0000 C   0  0  0  0  0  0  0  0  0  0  0  0
    0.0000   -1.0000    0.0000 C   0  0  0  0  0  0  0  0  0  0  0  0
  1  2  2  0
  2  3  1  0
  3  4  1  0
  4  5  1  0
  5  6  1  0
  6  1  1  0
M  END
";
    let mol = parse_molfile_str(block).unwrap();
    assert_eq!(mol.ring_count(), 1);
    assert!(!mol.rings()[0].is_aromatic());

    // The double bond sits on a ring, so its second line must be decidable
    // (no symmetric fallback): the bond contributes exactly two line ops.
    let ops = render(&mol, &RenderOptions::default());
    let line_count = ops
        .iter()
        .filter(|op| matches!(op, mol2d::render::DrawOp::Line { .. }))
        .count();
    // 5 single bonds + centerline and inner line for the double bond.
    assert_eq!(line_count, 7);
}
