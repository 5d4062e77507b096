//! 2D coordinate generation for molecules built without positions.
//!
//! Atoms are placed by a deterministic BFS from a deterministically chosen
//! root, each at a fixed bond length from its already-placed anchor. The
//! bond angle comes from, in order: the ring the bond lies on (turning by
//! the ring's interior angle so rings close onto themselves), the largest
//! unused angular gap at the anchor, or a zig-zag default. Coincident atoms
//! on heavily fused or bridged systems are a known limitation, not an
//! error.

use std::collections::{HashMap, HashSet, VecDeque};
use std::f64::consts::PI;

use crate::geometry::{angle, normalize_angle, Point, Point3};
use crate::molecule::{AtomIx, Molecule};
use crate::rings::Ring;
use crate::utils::sorted_neighbors;

/// Layout options.
#[derive(Debug, Copy, Clone)]
pub struct CoordOptions {
    /// Distance between bonded atoms.
    pub bond_length: f64,
}

impl Default for CoordOptions {
    fn default() -> Self {
        Self { bond_length: 1.0 }
    }
}

/// Assign positions to every atom that lacks one. Atoms that already have a
/// position keep it and anchor the layout of their component.
pub fn assign_coords(mol: &mut Molecule, options: &CoordOptions) {
    let rings: Vec<Ring> = mol.rings().to_vec();
    let components: Vec<Vec<AtomIx>> = mol
        .connected_components()
        .iter()
        .map(|c| c.iter().copied().collect())
        .collect();

    let mut placed: HashSet<AtomIx> = mol
        .atoms()
        .filter(|a| mol.atom(*a).map(|at| at.position.is_some()).unwrap_or(false))
        .collect();

    // Successive components are laid out left to right.
    let mut offset_x = 0.0f64;

    for comp in components {
        let root = pick_root(mol, &comp, &placed);
        if !placed.contains(&root) {
            set_position(mol, root, Point::new(offset_x, 0.0));
            placed.insert(root);
        }

        let mut depth: HashMap<AtomIx, usize> = HashMap::from([(root, 0)]);
        let mut queue = VecDeque::from([root]);
        while let Some(p) = queue.pop_front() {
            for (q, _) in sorted_neighbors(mol, p) {
                if depth.contains_key(&q) {
                    continue;
                }
                depth.insert(q, depth[&p] + 1);
                if !placed.contains(&q) {
                    let at = place_atom(mol, &rings, p, q, depth[&p], options);
                    set_position(mol, q, at);
                    placed.insert(q);
                }
                queue.push_back(q);
            }
        }

        // Advance the cursor past this component.
        let max_x = comp
            .iter()
            .filter_map(|a| mol.atom(*a).ok().and_then(|at| at.position))
            .map(|p| p.x)
            .fold(offset_x, f64::max);
        offset_x = max_x + 2.0 * options.bond_length;
    }
}

/// Root choice: the lowest already-placed atom, else the lowest atom of
/// degree one, else the lowest atom.
fn pick_root(mol: &Molecule, comp: &[AtomIx], placed: &HashSet<AtomIx>) -> AtomIx {
    if let Some(a) = comp.iter().find(|a| placed.contains(*a)) {
        return *a;
    }
    comp.iter()
        .copied()
        .find(|a| mol.degree(*a) == 1)
        .unwrap_or(comp[0])
}

fn set_position(mol: &mut Molecule, a: AtomIx, at: Point) {
    if let Ok(atom) = mol.atom_mut(a) {
        atom.position = Some(Point3 {
            x: at.x,
            y: at.y,
            z: 0.0,
        });
    }
}

fn position_of(mol: &Molecule, a: AtomIx) -> Option<Point> {
    mol.atom(a).ok().and_then(|at| at.position).map(|p| p.xy())
}

/// Choose where `q` goes, anchored at its placed neighbor `p`.
fn place_atom(
    mol: &Molecule,
    rings: &[Ring],
    p: AtomIx,
    q: AtomIx,
    anchor_depth: usize,
    options: &CoordOptions,
) -> Point {
    let Some(anchor) = position_of(mol, p) else {
        return Point::new(0.0, 0.0);
    };

    if let Some(turn) = ring_turn(mol, rings, p, q) {
        return anchor.polar(turn, options.bond_length);
    }

    let occupied: Vec<f64> = sorted_neighbors(mol, p)
        .into_iter()
        .filter(|(n, _)| *n != q)
        .filter_map(|(n, _)| position_of(mol, n))
        .map(|at| angle(anchor, at))
        .collect();

    let direction = match occupied.len() {
        // Fresh root: start the chain 30 degrees above horizontal.
        0 => PI / 6.0,
        // Chain continuation: zig-zag, alternating the 60-degree turn with
        // the anchor's depth.
        1 => {
            let incoming = occupied[0] + PI;
            let sign = if anchor_depth % 2 == 0 { 1.0 } else { -1.0 };
            incoming + sign * PI / 3.0
        }
        // Branch: bisect the widest unused angular gap.
        _ => widest_gap_bisector(&occupied),
    };
    anchor.polar(direction, options.bond_length)
}

/// If the bond `p-q` lies on a perceived ring and `p`'s other walk neighbor
/// in that ring is already placed, the new bond turns by the ring's interior
/// angle from that neighbor, closing the ring as the walk proceeds. The sign
/// follows the ring's canonical walk orientation so both BFS directions
/// around the ring trace the same polygon.
fn ring_turn(mol: &Molecule, rings: &[Ring], p: AtomIx, q: AtomIx) -> Option<f64> {
    let e = mol.bond_between(p, q)?;
    // Rings are sorted smallest-first by perception.
    let ring = rings.iter().find(|r| r.contains_bond(e))?;
    let walk = ring.atoms();
    let n = walk.len();
    let pos = walk.iter().position(|a| *a == p)?;
    let next = walk[(pos + 1) % n];
    let prev = walk[(pos + n - 1) % n];
    let interior = PI - 2.0 * PI / n as f64;

    let anchor = position_of(mol, p)?;
    if q == next {
        let u_at = position_of(mol, prev)?;
        Some(angle(anchor, u_at) + interior)
    } else if q == prev {
        let u_at = position_of(mol, next)?;
        Some(angle(anchor, u_at) - interior)
    } else {
        None
    }
}

/// Bisector of the widest gap between occupied directions at an anchor.
fn widest_gap_bisector(occupied: &[f64]) -> f64 {
    let mut sorted: Vec<f64> = occupied.iter().map(|a| normalize_angle(*a)).collect();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

    let mut best_start = sorted[sorted.len() - 1];
    let mut best_gap = sorted[0] + std::f64::consts::TAU - best_start;
    for w in sorted.windows(2) {
        let gap = w[1] - w[0];
        if gap > best_gap {
            best_gap = gap;
            best_start = w[0];
        }
    }
    normalize_angle(best_start + best_gap / 2.0)
}
