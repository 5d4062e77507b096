use std::collections::{BTreeSet, VecDeque};

use crate::molecule::{AtomIx, Molecule};

/// All atoms reachable from `start` over visible bonds, including `start`.
pub(crate) fn reachable_from(mol: &Molecule, start: AtomIx) -> BTreeSet<AtomIx> {
    let mut visited = BTreeSet::from([start]);
    let mut queue = VecDeque::from([start]);
    while let Some(a) = queue.pop_front() {
        for (n, _) in mol.neighbors(a) {
            if visited.insert(n) {
                queue.push_back(n);
            }
        }
    }
    visited
}

/// Partition of all atoms into connected components over visible bonds,
/// ordered by each component's smallest atom index.
pub(crate) fn component_partition(mol: &Molecule) -> Vec<BTreeSet<AtomIx>> {
    let mut seen = BTreeSet::new();
    let mut parts = Vec::new();
    for a in mol.atoms() {
        if seen.contains(&a) {
            continue;
        }
        let comp = reachable_from(mol, a);
        seen.extend(comp.iter().copied());
        parts.push(comp);
    }
    parts
}

/// Neighbors of `a` sorted by ascending atom index, for deterministic
/// traversal order.
pub(crate) fn sorted_neighbors(mol: &Molecule, a: AtomIx) -> Vec<(AtomIx, crate::molecule::BondIx)> {
    let mut ns: Vec<_> = mol.neighbors(a).collect();
    ns.sort_by_key(|(n, _)| *n);
    ns
}
