//! Turn a positioned molecule into backend-agnostic drawing operations.
//!
//! `render` is a pure function: it never mutates the molecule and always
//! produces the same op sequence for the same molecule state. Rendering
//! backends (SVG, Cairo, an interactive canvas) consume the ops; none of
//! them is this crate's concern.
//!
//! The delicate part is double-bond side selection. The second line goes on
//! the side holding more "mass": ring atoms first (keeping the inner line
//! inside the ring), then non-ring neighbors, and on an exact tie the bond
//! degrades to a symmetric pair of half-offset lines. All side arithmetic
//! runs on the bond oriented from its lower-index endpoint, so the stored
//! endpoint order never influences the outcome.

use crate::geometry::{find_parallel, shorten, side_of_line, Point};
use crate::molecule::{AtomIx, BondIx, BondOrder, BondSide, BondStereo, Element, Molecule};

/// Tolerance below which a signed side sum counts as a tie.
const SIDE_EPS: f64 = 1e-9;

/// A single renderer-agnostic drawing operation. Coordinates are in the
/// molecule's own units (bond lengths).
#[derive(Debug, Clone, PartialEq)]
pub enum DrawOp {
    Line {
        from: Point,
        to: Point,
        width: f64,
    },
    DashedLine {
        from: Point,
        to: Point,
        width: f64,
    },
    Polygon {
        points: Vec<Point>,
        filled: bool,
    },
    Circle {
        center: Point,
        radius: f64,
        filled: bool,
    },
    /// Background rectangle behind an atom label.
    Rect {
        min: Point,
        max: Point,
    },
    Text {
        at: Point,
        text: String,
    },
}

/// Rendering parameters, in bond-length units.
#[derive(Debug, Clone)]
pub struct RenderOptions {
    pub line_width: f64,
    /// Perpendicular distance between the lines of a multiple bond.
    pub bond_spacing: f64,
    /// How much the secondary line of a double bond is pulled in at each
    /// end.
    pub shortening: f64,
    /// Full width of the wide end of a wedge or hatch bond.
    pub wedge_width: f64,
    /// Target distance between hatch stripes and wavy-bond half waves; the
    /// actual count scales with bond length so density is zoom independent.
    pub hatch_spacing: f64,
    pub wave_amplitude: f64,
    pub font_size: f64,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            line_width: 0.04,
            bond_spacing: 0.12,
            shortening: 0.12,
            wedge_width: 0.17,
            hatch_spacing: 0.12,
            wave_amplitude: 0.08,
            font_size: 0.4,
        }
    }
}

/// Render a molecule into drawing operations: bonds in ascending bond-index
/// order, then atom labels in ascending atom-index order.
pub fn render(mol: &Molecule, options: &RenderOptions) -> Vec<DrawOp> {
    let mut ops = Vec::new();
    for e in mol.bonds() {
        render_bond(mol, e, options, &mut ops);
    }
    for a in mol.atoms() {
        render_atom(mol, a, options, &mut ops);
    }
    ops
}

fn pos_or_origin(mol: &Molecule, a: AtomIx) -> Point {
    match mol.atom(a).ok().and_then(|at| at.position) {
        Some(p) => p.xy(),
        None => {
            log::warn!("atom {} has no coordinates; rendering at origin", a.index());
            Point::default()
        }
    }
}

fn render_bond(mol: &Molecule, e: BondIx, options: &RenderOptions, ops: &mut Vec<DrawOp>) {
    let Ok((a, b)) = mol.endpoints(e) else {
        return;
    };
    let Ok(bond) = mol.bond(e) else {
        return;
    };
    let width = options.line_width * bond.hints.line_width;

    // Stereo bonds are direction-sensitive: the thin end sits at the first
    // stored endpoint (the stereocenter). Everything else is drawn on the
    // canonical low-to-high orientation.
    let (pa, pb) = (pos_or_origin(mol, a), pos_or_origin(mol, b));
    if bond.order == BondOrder::Single {
        match bond.stereo {
            BondStereo::Wedge => {
                let (_, wide1) = find_parallel(pa, pb, options.wedge_width / 2.0);
                let (_, wide2) = find_parallel(pa, pb, -options.wedge_width / 2.0);
                ops.push(DrawOp::Polygon {
                    points: vec![pa, wide1, wide2],
                    filled: true,
                });
                return;
            }
            BondStereo::Hatch => {
                render_hatch(pa, pb, width, options, ops);
                return;
            }
            BondStereo::Wavy => {
                render_wavy(pa, pb, width, options, ops);
                return;
            }
            BondStereo::Plain => {}
        }
    }

    let (ca, cb) = if a <= b { (pa, pb) } else { (pb, pa) };
    match bond.order {
        BondOrder::Single => ops.push(DrawOp::Line {
            from: ca,
            to: cb,
            width,
        }),
        BondOrder::Coordination => ops.push(DrawOp::DashedLine {
            from: ca,
            to: cb,
            width,
        }),
        BondOrder::Double => {
            match chosen_side(mol, e, a, b, ca, cb, bond.hints.side) {
                Some(sign) => {
                    ops.push(DrawOp::Line {
                        from: ca,
                        to: cb,
                        width,
                    });
                    let (oa, ob) = find_parallel(ca, cb, sign * options.bond_spacing);
                    let (sa, sb) = shorten(oa, ob, options.shortening);
                    ops.push(DrawOp::Line {
                        from: sa,
                        to: sb,
                        width,
                    });
                }
                None => {
                    // Undecidable side: symmetric pair at half offset.
                    for sign in [1.0, -1.0] {
                        let (oa, ob) =
                            find_parallel(ca, cb, sign * options.bond_spacing / 2.0);
                        ops.push(DrawOp::Line {
                            from: oa,
                            to: ob,
                            width,
                        });
                    }
                }
            }
        }
        BondOrder::Triple => {
            ops.push(DrawOp::Line {
                from: ca,
                to: cb,
                width,
            });
            for sign in [1.0, -1.0] {
                let (oa, ob) = find_parallel(ca, cb, sign * options.bond_spacing);
                let (sa, sb) = shorten(oa, ob, options.shortening);
                ops.push(DrawOp::Line {
                    from: sa,
                    to: sb,
                    width,
                });
            }
        }
        BondOrder::Aromatic => {
            ops.push(DrawOp::Line {
                from: ca,
                to: cb,
                width,
            });
            // Inner delocalization line, dashed, on the ring side when one
            // is decidable.
            if let Some(sign) = chosen_side(mol, e, a, b, ca, cb, bond.hints.side) {
                let (oa, ob) = find_parallel(ca, cb, sign * options.bond_spacing);
                let (sa, sb) = shorten(oa, ob, options.shortening);
                ops.push(DrawOp::DashedLine {
                    from: sa,
                    to: sb,
                    width,
                });
            }
        }
    }
}

/// Which side of the canonical bond line the secondary line goes on:
/// `Some(+1)` is left of the low-to-high direction, `Some(-1)` right, `None`
/// an exact tie. Priority: explicit hint, ring mass, neighbor mass.
fn chosen_side(
    mol: &Molecule,
    e: BondIx,
    a: AtomIx,
    b: AtomIx,
    ca: Point,
    cb: Point,
    hint: Option<BondSide>,
) -> Option<f64> {
    if let Some(side) = hint {
        return Some(match side {
            BondSide::Left => 1.0,
            BondSide::Right => -1.0,
        });
    }

    // Ring mass first: every other atom of the smallest ring through this
    // bond votes with its signed side.
    if let Some(ring) = mol.smallest_ring_with_bond(e) {
        let total: f64 = ring
            .atoms()
            .iter()
            .filter(|v| **v != a && **v != b)
            .map(|v| side_of_line(ca, cb, pos_or_origin(mol, *v)))
            .sum();
        if total.abs() > SIDE_EPS {
            return Some(total.signum());
        }
    }

    // Then plain neighbors of both endpoints.
    let total: f64 = [a, b]
        .iter()
        .flat_map(|end| mol.neighbors(*end))
        .map(|(n, _)| n)
        .filter(|n| *n != a && *n != b)
        .map(|n| side_of_line(ca, cb, pos_or_origin(mol, n)))
        .sum();
    if total.abs() > SIDE_EPS {
        return Some(total.signum());
    }
    None
}

/// Hatch stereo bond: perpendicular stripes tapering from the thin end at
/// `from` to the full wedge width at `to`, spaced so stripe density does
/// not depend on zoom.
fn render_hatch(from: Point, to: Point, width: f64, options: &RenderOptions, ops: &mut Vec<DrawOp>) {
    let len = from.distance(to);
    let count = ((len / options.hatch_spacing).floor() as usize).max(2);
    for i in 1..=count {
        let t = i as f64 / count as f64;
        let half = options.wedge_width / 2.0 * t;
        let center = from.lerp(to, t);
        let (s1, _) = find_parallel(center, to, half);
        let (s2, _) = find_parallel(center, to, -half);
        ops.push(DrawOp::Line {
            from: s1,
            to: s2,
            width,
        });
    }
}

/// Wavy (undefined stereo) bond: short alternating segments.
fn render_wavy(from: Point, to: Point, width: f64, options: &RenderOptions, ops: &mut Vec<DrawOp>) {
    let len = from.distance(to);
    let count = ((len / options.hatch_spacing).floor() as usize).max(2);
    let mut prev = from;
    for i in 1..=count {
        let t = i as f64 / count as f64;
        let on_line = from.lerp(to, t);
        let next = if i == count {
            on_line
        } else {
            let sign = if i % 2 == 0 { 1.0 } else { -1.0 };
            let (p, _) = find_parallel(on_line, to, sign * options.wave_amplitude);
            p
        };
        ops.push(DrawOp::Line {
            from: prev,
            to: next,
            width,
        });
        prev = next;
    }
}

/// Atom decoration: hetero-atoms, charged atoms, radicals, and isolated
/// atoms get a text label over a background rectangle; radical electrons
/// are dots above the label.
fn render_atom(mol: &Molecule, a: AtomIx, options: &RenderOptions, ops: &mut Vec<DrawOp>) {
    let Ok(atom) = mol.atom(a) else {
        return;
    };
    let labeled = atom.element != Element::Carbon
        || atom.charge != 0
        || atom.multiplicity > 1
        || mol.degree(a) == 0;
    if !labeled {
        return;
    }

    let at = pos_or_origin(mol, a);
    let text = label_text(atom.element, atom.charge);
    let half_w = options.font_size * 0.35 * text.chars().count() as f64;
    let half_h = options.font_size / 2.0;
    ops.push(DrawOp::Rect {
        min: Point::new(at.x - half_w, at.y - half_h),
        max: Point::new(at.x + half_w, at.y + half_h),
    });
    ops.push(DrawOp::Text { at, text });

    // Radical dots above the label, one per unpaired electron.
    let unpaired = atom.unpaired_electrons();
    let radius = options.line_width * 1.5;
    for i in 0..unpaired {
        let x = at.x + (i as f64 - (unpaired as f64 - 1.0) / 2.0) * 4.0 * radius;
        ops.push(DrawOp::Circle {
            center: Point::new(x, at.y + half_h + 2.0 * radius),
            radius,
            filled: true,
        });
    }
}

fn label_text(element: Element, charge: i8) -> String {
    let suffix = match charge {
        0 => String::new(),
        1 => "+".to_string(),
        -1 => "-".to_string(),
        c if c > 1 => format!("{c}+"),
        c => format!("{}-", -(c as i32)),
    };
    format!("{element}{suffix}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coords::{assign_coords, CoordOptions};
    use crate::molecule::{Atom, Bond, Element};

    fn positioned_pair(order: BondOrder) -> Molecule {
        let mut mol = Molecule::new();
        let a = mol.add_atom(Atom::at(Element::Carbon, 0.0, 0.0));
        let b = mol.add_atom(Atom::at(Element::Carbon, 1.0, 0.0));
        mol.add_bond(a, b, Bond::of_order(order)).unwrap();
        mol
    }

    fn lines(ops: &[DrawOp]) -> Vec<&DrawOp> {
        ops.iter()
            .filter(|op| matches!(op, DrawOp::Line { .. }))
            .collect()
    }

    #[test]
    fn single_bond_is_one_line() {
        let mol = positioned_pair(BondOrder::Single);
        let ops = render(&mol, &RenderOptions::default());
        assert_eq!(lines(&ops).len(), 1);
    }

    #[test]
    fn lone_double_bond_degrades_to_symmetric_pair() {
        let mol = positioned_pair(BondOrder::Double);
        let ops = render(&mol, &RenderOptions::default());
        let ls = lines(&ops);
        assert_eq!(ls.len(), 2);
        // Mirrored around the centerline.
        if let (DrawOp::Line { from: f1, .. }, DrawOp::Line { from: f2, .. }) = (ls[0], ls[1]) {
            assert!((f1.y + f2.y).abs() < 1e-9);
            assert!(f1.y.abs() > 1e-12);
        }
    }

    #[test]
    fn triple_bond_is_three_lines() {
        let mol = positioned_pair(BondOrder::Triple);
        let ops = render(&mol, &RenderOptions::default());
        assert_eq!(lines(&ops).len(), 3);
    }

    #[test]
    fn double_bond_neighbor_decides_side() {
        // A branch above the bond pulls the second line up.
        let mut mol = Molecule::new();
        let a = mol.add_atom(Atom::at(Element::Carbon, 0.0, 0.0));
        let b = mol.add_atom(Atom::at(Element::Carbon, 1.0, 0.0));
        let up = mol.add_atom(Atom::at(Element::Carbon, 1.5, 1.0));
        mol.add_bond(a, b, Bond::of_order(BondOrder::Double)).unwrap();
        mol.add_bond(b, up, Bond::default()).unwrap();

        let ops = render(&mol, &RenderOptions::default());
        let second = ops
            .iter()
            .filter_map(|op| match op {
                DrawOp::Line { from, to, .. } => Some((from, to)),
                _ => None,
            })
            .find(|(from, to)| from.y.abs() > 1e-9 && to.y.abs() > 1e-9 && from.y == to.y);
        let (from, _) = second.expect("double bond should have an offset line");
        assert!(from.y > 0.0);
    }

    #[test]
    fn side_choice_ignores_stored_endpoint_order() {
        let build = |flip: bool| {
            let mut mol = Molecule::new();
            let a = mol.add_atom(Atom::at(Element::Carbon, 0.0, 0.0));
            let b = mol.add_atom(Atom::at(Element::Carbon, 1.0, 0.0));
            let up = mol.add_atom(Atom::at(Element::Carbon, 1.5, 1.0));
            if flip {
                mol.add_bond(b, a, Bond::of_order(BondOrder::Double)).unwrap();
            } else {
                mol.add_bond(a, b, Bond::of_order(BondOrder::Double)).unwrap();
            }
            mol.add_bond(b, up, Bond::default()).unwrap();
            render(&mol, &RenderOptions::default())
        };
        assert_eq!(build(false), build(true));
    }

    #[test]
    fn ring_double_bond_points_inward() {
        let mut mol = Molecule::new();
        let atoms: Vec<_> = (0..6)
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
        assign_coords(&mut mol, &CoordOptions::default());

        // Ring centroid.
        let centroid = {
            let mut c = Point::default();
            for a in &atoms {
                let p = mol.atom(*a).unwrap().position.unwrap();
                c.x += p.x / 6.0;
                c.y += p.y / 6.0;
            }
            c
        };

        // Every double bond contributes a full centerline plus a shortened
        // inner line whose midpoint is nearer the centroid than the
        // centerline's midpoint.
        let ops = render(&mol, &RenderOptions::default());
        let all_lines: Vec<(Point, Point)> = ops
            .iter()
            .filter_map(|op| match op {
                DrawOp::Line { from, to, .. } => Some((*from, *to)),
                _ => None,
            })
            .collect();
        // 3 single + 3 double * 2 lines.
        assert_eq!(all_lines.len(), 9);

        let mid = |p: (Point, Point)| p.0.lerp(p.1, 0.5);
        let shortened: Vec<_> = all_lines
            .iter()
            .filter(|(f, t)| (f.distance(*t) - 1.0).abs() > 1e-6)
            .collect();
        assert_eq!(shortened.len(), 3);
        for seg in shortened {
            assert!(mid(*seg).distance(centroid) < 0.9);
        }
    }

    #[test]
    fn wedge_is_a_filled_triangle_from_the_stereocenter() {
        let mut mol = Molecule::new();
        let a = mol.add_atom(Atom::at(Element::Carbon, 0.0, 0.0));
        let b = mol.add_atom(Atom::at(Element::Carbon, 1.0, 0.0));
        mol.add_bond(a, b, Bond::stereo(crate::molecule::BondStereo::Wedge))
            .unwrap();
        let ops = render(&mol, &RenderOptions::default());
        match &ops[0] {
            DrawOp::Polygon { points, filled } => {
                assert!(*filled);
                assert_eq!(points.len(), 3);
                assert_eq!(points[0], Point::new(0.0, 0.0));
            }
            other => panic!("expected a polygon, got {other:?}"),
        }
    }

    #[test]
    fn hatch_stripe_count_follows_length() {
        let mut mol = Molecule::new();
        let a = mol.add_atom(Atom::at(Element::Carbon, 0.0, 0.0));
        let b = mol.add_atom(Atom::at(Element::Carbon, 1.25, 0.0));
        mol.add_bond(a, b, Bond::stereo(crate::molecule::BondStereo::Hatch))
            .unwrap();
        let ops = render(&mol, &RenderOptions::default());
        // floor(1.25 / 0.12 spacing) = 10 stripes.
        assert_eq!(lines(&ops).len(), 10);
    }

    #[test]
    fn hetero_atom_gets_label_rect_and_radical_dot() {
        let mut mol = Molecule::new();
        mol.add_atom(Atom {
            charge: -1,
            multiplicity: 2,
            ..Atom::at(Element::Oxygen, 0.0, 0.0)
        });
        let ops = render(&mol, &RenderOptions::default());
        assert!(ops.iter().any(|op| matches!(op, DrawOp::Rect { .. })));
        assert!(ops
            .iter()
            .any(|op| matches!(op, DrawOp::Text { text, .. } if text == "O-")));
        assert!(ops
            .iter()
            .any(|op| matches!(op, DrawOp::Circle { filled: true, .. })));
    }

    #[test]
    fn carbon_in_a_chain_has_no_label() {
        let mol = positioned_pair(BondOrder::Single);
        let ops = render(&mol, &RenderOptions::default());
        assert!(!ops.iter().any(|op| matches!(op, DrawOp::Text { .. })));
    }

    #[test]
    fn rendering_is_deterministic() {
        let mut mol = Molecule::new();
        let atoms: Vec<_> = (0..6)
            .map(|_| mol.add_atom(Atom::new(Element::Carbon)))
            .collect();
        for i in 0..6 {
            mol.add_bond(atoms[i], atoms[(i + 1) % 6], Bond::default())
                .unwrap();
        }
        assign_coords(&mut mol, &CoordOptions::default());
        assert_eq!(
            render(&mol, &RenderOptions::default()),
            render(&mol, &RenderOptions::default())
        );
    }
}
