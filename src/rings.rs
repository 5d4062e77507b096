//! Ring perception: smallest set of smallest rings and aromaticity.
//!
//! For each connected component, a BFS spanning tree turns every non-tree
//! bond into one fundamental cycle; the resulting basis is then reduced
//! toward the SSSR by replacing cycles with shorter symmetric differences.
//! The reduction is bounded: on heavily fused polycyclic systems it stops
//! after a fixed number of passes and returns the best basis found so far
//! rather than hang. The ring *count* always equals the cycle rank
//! |E| - |V| + components; only minimality is approximate.

use std::collections::{HashMap, VecDeque};

use bit_set::BitSet;

use crate::molecule::{AtomIx, BondIx, BondOrder, Molecule};
use crate::utils::{component_partition, sorted_neighbors};

/// Pass budget for the SSSR reduction. Hitting it is logged and recovers
/// with the best-effort ring set; it is never an error.
const MAX_REDUCTION_PASSES: usize = 32;

/// A simple cycle of a molecule: an ordered closed walk of atoms with no
/// repeats, plus the set of bonds joining consecutive atoms.
///
/// The walk is canonicalized to start at the lowest-index member atom and
/// proceed toward its lower-index ring neighbor, so equal rings compare
/// equal structurally.
#[derive(Debug, Clone, PartialEq)]
pub struct Ring {
    atoms: Vec<AtomIx>,
    edges: BitSet,
    aromatic: bool,
}

impl Ring {
    /// Number of atoms (equivalently bonds) in the ring.
    pub fn len(&self) -> usize {
        self.atoms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.atoms.is_empty()
    }

    /// The atoms of the ring as a closed walk (the bond from the last atom
    /// back to the first is implied).
    pub fn atoms(&self) -> &[AtomIx] {
        &self.atoms
    }

    /// The bonds of the ring, ascending.
    pub fn bonds(&self) -> impl Iterator<Item = BondIx> + '_ {
        self.edges.iter().map(BondIx::new)
    }

    pub fn contains_atom(&self, a: AtomIx) -> bool {
        self.atoms.contains(&a)
    }

    pub fn contains_bond(&self, e: BondIx) -> bool {
        self.edges.contains(e.index())
    }

    /// Whether every bond of the ring is explicitly aromatic or the ring
    /// alternates single/double all the way around.
    pub fn is_aromatic(&self) -> bool {
        self.aromatic
    }
}

impl Molecule {
    /// The perceived ring set (approximate SSSR), sorted by ring size, then
    /// sum of atom indices, then atom list. Memoized until the next
    /// mutation.
    pub fn rings(&self) -> &[Ring] {
        self.ring_cache.get_or_init(|| perceive(self))
    }

    /// Number of perceived rings. Always equals
    /// `bond_count - atom_count + number of components`.
    pub fn ring_count(&self) -> usize {
        self.rings().len()
    }

    /// Whether `e` lies on any perceived ring.
    pub fn is_ring_bond(&self, e: BondIx) -> bool {
        self.rings().iter().any(|r| r.contains_bond(e))
    }

    /// The smallest perceived ring containing `e`, if any.
    pub fn smallest_ring_with_bond(&self, e: BondIx) -> Option<&Ring> {
        // Rings are sorted smallest-first.
        self.rings().iter().find(|r| r.contains_bond(e))
    }

    /// Run ring perception and write the aromatic flag onto every bond of
    /// every aromatic ring.
    pub fn perceive_aromaticity(&mut self) {
        let flagged: Vec<BondIx> = self
            .rings()
            .iter()
            .filter(|r| r.is_aromatic())
            .flat_map(|r| r.bonds().collect::<Vec<_>>())
            .collect();
        for e in flagged {
            if let Some(bond) = self.bond_mut_untracked(e) {
                bond.aromatic = true;
            }
        }
    }
}

/// Full ring perception over all components.
fn perceive(mol: &Molecule) -> Vec<Ring> {
    log::debug!(
        "perceiving rings over {} atoms / {} bonds",
        mol.atom_count(),
        mol.bond_count()
    );
    let mut basis: Vec<BitSet> = Vec::new();
    for comp in component_partition(mol) {
        fundamental_cycles(mol, &comp, &mut basis);
    }
    reduce_basis(mol, &mut basis);

    let mut rings: Vec<Ring> = basis
        .iter()
        .filter_map(|edges| walk_cycle(mol, edges))
        .map(|atoms| {
            let aromatic = alternation_aromatic(mol, &atoms);
            let edges = edges_of_walk(mol, &atoms);
            Ring {
                atoms,
                edges,
                aromatic,
            }
        })
        .collect();

    rings.sort_by(|a, b| {
        let key = |r: &Ring| {
            (
                r.atoms.len(),
                r.atoms.iter().map(|a| a.index() as u64).sum::<u64>(),
                r.atoms.clone(),
            )
        };
        key(a).cmp(&key(b))
    });
    rings
}

/// BFS spanning tree of one component; every non-tree bond closes exactly
/// one fundamental cycle, appended to `basis` as an edge set.
fn fundamental_cycles(mol: &Molecule, comp: &std::collections::BTreeSet<AtomIx>, basis: &mut Vec<BitSet>) {
    let Some(root) = comp.iter().next().copied() else {
        return;
    };
    let mut depth: HashMap<AtomIx, usize> = HashMap::from([(root, 0)]);
    let mut parent: HashMap<AtomIx, (AtomIx, BondIx)> = HashMap::new();
    let mut tree = BitSet::new();
    let mut chords: Vec<BondIx> = Vec::new();
    let mut queue = VecDeque::from([root]);

    while let Some(a) = queue.pop_front() {
        for (n, e) in sorted_neighbors(mol, a) {
            if !depth.contains_key(&n) {
                let d = depth[&a] + 1;
                depth.insert(n, d);
                parent.insert(n, (a, e));
                tree.insert(e.index());
                queue.push_back(n);
            } else if !tree.contains(e.index()) {
                chords.push(e);
            }
        }
    }

    chords.sort();
    chords.dedup();
    for chord in chords {
        let Ok((mut u, mut v)) = mol.endpoints(chord) else {
            continue;
        };
        let mut edges = BitSet::new();
        edges.insert(chord.index());
        // Climb the deeper endpoint to the common ancestor, collecting tree
        // bonds along both paths.
        while depth[&u] != depth[&v] {
            if depth[&u] > depth[&v] {
                let (p, e) = parent[&u];
                edges.insert(e.index());
                u = p;
            } else {
                let (p, e) = parent[&v];
                edges.insert(e.index());
                v = p;
            }
        }
        while u != v {
            let (pu, eu) = parent[&u];
            let (pv, ev) = parent[&v];
            edges.insert(eu.index());
            edges.insert(ev.index());
            u = pu;
            v = pv;
        }
        basis.push(edges);
    }
}

/// Bounded SSSR reduction: repeatedly replace a basis cycle with the
/// symmetric difference of itself and another basis cycle when that
/// difference is a strictly shorter single cycle. Each replacement is an
/// elementary basis operation, so the cycle rank is preserved.
fn reduce_basis(mol: &Molecule, basis: &mut Vec<BitSet>) {
    for pass in 0..MAX_REDUCTION_PASSES {
        let mut improved = false;
        for i in 0..basis.len() {
            for j in 0..basis.len() {
                if i == j {
                    continue;
                }
                let mut xor = basis[i].clone();
                xor.symmetric_difference_with(&basis[j]);
                if xor.len() >= 3
                    && xor.len() < basis[i].len()
                    && is_single_cycle(mol, &xor)
                {
                    basis[i] = xor;
                    improved = true;
                }
            }
        }
        if !improved {
            return;
        }
        if pass + 1 == MAX_REDUCTION_PASSES {
            log::debug!(
                "ring reduction hit its pass budget ({MAX_REDUCTION_PASSES}); \
                 keeping best-effort ring set"
            );
        }
    }
}

/// Whether `edges` forms exactly one simple cycle: every touched atom has
/// degree two within the set and the set is connected.
fn is_single_cycle(mol: &Molecule, edges: &BitSet) -> bool {
    let mut deg: HashMap<AtomIx, usize> = HashMap::new();
    for e in edges.iter() {
        let Ok((a, b)) = mol.endpoints(BondIx::new(e)) else {
            return false;
        };
        *deg.entry(a).or_insert(0) += 1;
        *deg.entry(b).or_insert(0) += 1;
    }
    if deg.values().any(|d| *d != 2) || deg.len() != edges.len() {
        return false;
    }

    // Connectivity over the edge set.
    let Some(start) = deg.keys().min().copied() else {
        return false;
    };
    let mut visited = std::collections::BTreeSet::from([start]);
    let mut queue = VecDeque::from([start]);
    while let Some(a) = queue.pop_front() {
        for (n, e) in mol.neighbors(a) {
            if edges.contains(e.index()) && visited.insert(n) {
                queue.push_back(n);
            }
        }
    }
    visited.len() == deg.len()
}

/// Order an edge-set cycle into its canonical atom walk: start at the
/// lowest-index atom and step toward its lower-index neighbor in the ring.
fn walk_cycle(mol: &Molecule, edges: &BitSet) -> Option<Vec<AtomIx>> {
    let mut adjacency: HashMap<AtomIx, Vec<AtomIx>> = HashMap::new();
    for e in edges.iter() {
        let (a, b) = mol.endpoints(BondIx::new(e)).ok()?;
        adjacency.entry(a).or_default().push(b);
        adjacency.entry(b).or_default().push(a);
    }
    let start = adjacency.keys().min().copied()?;
    let mut first_two = adjacency.get(&start)?.clone();
    first_two.sort();

    let mut walk = vec![start, *first_two.first()?];
    while walk.len() < adjacency.len() {
        let here = *walk.last()?;
        let prev = walk[walk.len() - 2];
        let next = adjacency
            .get(&here)?
            .iter()
            .copied()
            .find(|n| *n != prev)?;
        walk.push(next);
    }
    Some(walk)
}

/// Edge set of consecutive bonds along a closed atom walk.
fn edges_of_walk(mol: &Molecule, walk: &[AtomIx]) -> BitSet {
    let mut edges = BitSet::new();
    for i in 0..walk.len() {
        let j = (i + 1) % walk.len();
        if let Some(e) = mol.bond_between(walk[i], walk[j]) {
            edges.insert(e.index());
        }
    }
    edges
}

/// Hueckel-style alternation test over a closed walk: aromatic when every
/// bond is explicitly aromatic, or when orders around the ring are drawn
/// from {single, double} and strictly alternate (which forces even length).
fn alternation_aromatic(mol: &Molecule, walk: &[AtomIx]) -> bool {
    let mut orders = Vec::with_capacity(walk.len());
    for i in 0..walk.len() {
        let j = (i + 1) % walk.len();
        let Some(e) = mol.bond_between(walk[i], walk[j]) else {
            return false;
        };
        let Ok(bond) = mol.bond(e) else {
            return false;
        };
        orders.push(bond.order);
    }
    if orders.iter().all(|o| *o == BondOrder::Aromatic) {
        return true;
    }
    orders
        .iter()
        .all(|o| matches!(o, BondOrder::Single | BondOrder::Double))
        && (0..orders.len()).all(|i| orders[i] != orders[(i + 1) % orders.len()])
}
