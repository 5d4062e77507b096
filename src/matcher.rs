//! Substructure search: find embeddings of a query fragment in a molecule.
//!
//! The search is a backtracking subgraph-isomorphism walk over an explicit
//! stack of partial assignments, exposed as a pull iterator. Matches are
//! produced lazily; dropping the iterator abandons the search with no
//! residue, and a fresh call starts over from the beginning. Candidate
//! ordering is fixed (ascending atom index) so results are reproducible.

use std::collections::{HashMap, HashSet};

use petgraph::{stable_graph::StableGraph, visit::EdgeRef, Undirected};

use crate::molecule::{
    AtomIx, BondIx, BondOrder, Element, Index, Molecule, StructureError,
};

/// A query atom. `element: None` is a free site: it matches any target atom.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct QueryAtom {
    pub element: Option<Element>,
}

/// A query bond. `order: None` is a free bond: it matches any target bond.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct QueryBond {
    pub order: Option<BondOrder>,
}

type QGraph = StableGraph<QueryAtom, QueryBond, Undirected, Index>;

/// A small molecule-shaped query pattern, independent of any target.
///
/// Atoms and bonds may be marked as free sites, which match any target atom
/// or bond while still counting toward injectivity.
#[derive(Debug, Clone, Default)]
pub struct Fragment {
    graph: QGraph,
}

impl Fragment {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a concrete query atom.
    pub fn add_atom(&mut self, element: Element) -> AtomIx {
        self.graph.add_node(QueryAtom {
            element: Some(element),
        })
    }

    /// Add a free-site atom matching any element.
    pub fn add_free_site(&mut self) -> AtomIx {
        self.graph.add_node(QueryAtom { element: None })
    }

    /// Add a concrete query bond.
    pub fn add_bond(
        &mut self,
        a: AtomIx,
        b: AtomIx,
        order: BondOrder,
    ) -> Result<BondIx, StructureError> {
        self.add_query_bond(a, b, QueryBond { order: Some(order) })
    }

    /// Add a free bond matching any order.
    pub fn add_free_bond(&mut self, a: AtomIx, b: AtomIx) -> Result<BondIx, StructureError> {
        self.add_query_bond(a, b, QueryBond { order: None })
    }

    fn add_query_bond(
        &mut self,
        a: AtomIx,
        b: AtomIx,
        bond: QueryBond,
    ) -> Result<BondIx, StructureError> {
        if a == b || !self.graph.contains_node(a) || !self.graph.contains_node(b) {
            return Err(StructureError::InvalidReference);
        }
        if self.graph.find_edge(a, b).is_some() {
            return Err(StructureError::DuplicateBond);
        }
        Ok(self.graph.add_edge(a, b, bond))
    }

    /// Build a literal pattern from a molecule: every atom and bond becomes
    /// a concrete query element. Returns the fragment and the atom mapping
    /// from the source molecule into it.
    pub fn from_molecule(mol: &Molecule) -> (Self, HashMap<AtomIx, AtomIx>) {
        let mut fragment = Self::new();
        let mut map = HashMap::new();
        for a in mol.atoms() {
            if let Ok(atom) = mol.atom(a) {
                map.insert(a, fragment.add_atom(atom.element));
            }
        }
        for e in mol.bonds() {
            if let (Ok((a, b)), Ok(bond)) = (mol.endpoints(e), mol.bond(e)) {
                if let (Some(fa), Some(fb)) = (map.get(&a), map.get(&b)) {
                    let _ = fragment.add_bond(*fa, *fb, bond.order);
                }
            }
        }
        (fragment, map)
    }

    pub fn atom_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn bond_count(&self) -> usize {
        self.graph.edge_count()
    }

    fn atoms(&self) -> impl Iterator<Item = AtomIx> + '_ {
        self.graph.node_indices()
    }

    fn atom(&self, a: AtomIx) -> &QueryAtom {
        &self.graph[a]
    }

    fn neighbors(&self, a: AtomIx) -> impl Iterator<Item = (AtomIx, BondIx)> + '_ {
        self.graph.edges(a).map(move |e| {
            let other = if e.source() == a { e.target() } else { e.source() };
            (other, e.id())
        })
    }
}

/// Search options.
#[derive(Debug, Copy, Clone)]
pub struct MatchOptions {
    /// Honor free-site marks. When disabled, free-site atoms and free bonds
    /// are dropped from the pattern entirely and only the concrete part of
    /// the fragment is matched.
    pub use_free_sites: bool,
}

impl Default for MatchOptions {
    fn default() -> Self {
        Self {
            use_free_sites: true,
        }
    }
}

/// One embedding of a [`Fragment`] in a target molecule: injective maps from
/// fragment atoms to target atoms and fragment bonds to target bonds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Match {
    pub atoms: HashMap<AtomIx, AtomIx>,
    pub bonds: HashMap<BondIx, BondIx>,
}

impl Match {
    /// Re-check this match against the fragment and target: every mapped
    /// bond must still exist with a compatible order, and the atom map must
    /// be injective. Useful as a soundness assertion.
    pub fn verify_against(&self, fragment: &Fragment, target: &Molecule) -> bool {
        let mut seen = HashSet::new();
        if !self.atoms.values().all(|t| seen.insert(*t)) {
            return false;
        }
        for (fa, ta) in &self.atoms {
            let q = fragment.atom(*fa);
            let Ok(atom) = target.atom(*ta) else {
                return false;
            };
            if q.element.is_some_and(|el| el != atom.element) {
                return false;
            }
        }
        for (fe, te) in &self.bonds {
            let Some((fa, fb)) = fragment.graph.edge_endpoints(*fe) else {
                return false;
            };
            let (Some(ta), Some(tb)) = (self.atoms.get(&fa), self.atoms.get(&fb)) else {
                return false;
            };
            if target.bond_between(*ta, *tb) != Some(*te) {
                return false;
            }
            let order = fragment.graph[*fe].order;
            let Ok(bond) = target.bond(*te) else {
                return false;
            };
            if order.is_some_and(|o| o != bond.order) {
                return false;
            }
        }
        true
    }
}

/// Search for embeddings of `fragment` in `target`, lazily.
pub fn find_in<'a>(
    fragment: &'a Fragment,
    target: &'a Molecule,
    options: MatchOptions,
) -> MatchIter<'a> {
    MatchIter::new(fragment, target, options)
}

/// Convenience: the first match, if any.
pub fn find_first(fragment: &Fragment, target: &Molecule) -> Option<Match> {
    find_in(fragment, target, MatchOptions::default()).next()
}

struct Frame {
    candidates: Vec<AtomIx>,
    next: usize,
    chosen: Option<AtomIx>,
}

/// Lazy sequence of matches. The backtracking state is an explicit stack of
/// candidate cursors; `next()` resumes where the previous call left off.
pub struct MatchIter<'a> {
    fragment: &'a Fragment,
    target: &'a Molecule,
    options: MatchOptions,
    /// Fragment atoms in assignment order, most constrained first.
    order: Vec<AtomIx>,
    stack: Vec<Frame>,
    map: HashMap<AtomIx, AtomIx>,
    used: HashSet<AtomIx>,
    started: bool,
}

impl<'a> MatchIter<'a> {
    fn new(fragment: &'a Fragment, target: &'a Molecule, options: MatchOptions) -> Self {
        let mut order: Vec<AtomIx> = fragment
            .atoms()
            .filter(|a| options.use_free_sites || fragment.atom(*a).element.is_some())
            .collect();
        // Most-constrained-first: highest pattern degree, then lowest index.
        let degree_of = |a: AtomIx| {
            fragment
                .neighbors(a)
                .filter(|(_, e)| pattern_bond(fragment, *e, options))
                .count()
        };
        order.sort_by_key(|a| (std::cmp::Reverse(degree_of(*a)), *a));

        Self {
            fragment,
            target,
            options,
            order,
            stack: Vec::new(),
            map: HashMap::new(),
            used: HashSet::new(),
            started: false,
        }
    }

    /// Pattern degree of a fragment atom, counting only bonds that are part
    /// of the effective pattern.
    fn pattern_degree(&self, a: AtomIx) -> usize {
        self.fragment
            .neighbors(a)
            .filter(|(_, e)| pattern_bond(self.fragment, *e, self.options))
            .count()
    }

    fn atom_compatible(&self, fa: AtomIx, ta: AtomIx) -> bool {
        let Ok(atom) = self.target.atom(ta) else {
            return false;
        };
        match self.fragment.atom(fa).element {
            None => true,
            Some(el) => el == atom.element,
        }
    }

    /// All assigned pattern neighbors of `fa` must already be adjacent to
    /// `ta` in the target through a compatible bond.
    fn adjacency_consistent(&self, fa: AtomIx, ta: AtomIx) -> bool {
        for (fn_, fe) in self.fragment.neighbors(fa) {
            if !pattern_bond(self.fragment, fe, self.options) {
                continue;
            }
            if let Some(tn) = self.map.get(&fn_) {
                let Some(te) = self.target.bond_between(ta, *tn) else {
                    return false;
                };
                if !self.bond_compatible(fe, te) {
                    return false;
                }
            }
        }
        true
    }

    fn bond_compatible(&self, fe: BondIx, te: BondIx) -> bool {
        let Ok(bond) = self.target.bond(te) else {
            return false;
        };
        match self.fragment.graph[fe].order {
            None => true,
            Some(order) => order == bond.order,
        }
    }

    fn candidates_for(&self, fa: AtomIx) -> Vec<AtomIx> {
        let wanted = self.pattern_degree(fa);
        self.target
            .atoms()
            .filter(|ta| {
                !self.used.contains(ta)
                    && self.target.degree(*ta) >= wanted
                    && self.atom_compatible(fa, *ta)
                    && self.adjacency_consistent(fa, *ta)
            })
            .collect()
    }

    fn choose(&mut self, depth: usize, ta: AtomIx) {
        self.map.insert(self.order[depth], ta);
        self.used.insert(ta);
        self.stack[depth].chosen = Some(ta);
    }

    fn unchoose(&mut self, depth: usize) {
        if let Some(ta) = self.stack[depth].chosen.take() {
            self.map.remove(&self.order[depth]);
            self.used.remove(&ta);
        }
    }

    /// Full-assignment verification: map every pattern bond onto a real
    /// target bond of compatible order, then emit the match.
    fn complete(&self) -> Option<Match> {
        let mut bonds = HashMap::new();
        for fe in self.fragment.graph.edge_indices() {
            if !pattern_bond(self.fragment, fe, self.options) {
                continue;
            }
            let (fa, fb) = self.fragment.graph.edge_endpoints(fe)?;
            let (ta, tb) = (self.map.get(&fa)?, self.map.get(&fb)?);
            let te = self.target.bond_between(*ta, *tb)?;
            if !self.bond_compatible(fe, te) {
                return None;
            }
            bonds.insert(fe, te);
        }
        Some(Match {
            atoms: self.map.clone(),
            bonds,
        })
    }
}

/// Whether a fragment bond participates in the effective pattern under the
/// given options.
fn pattern_bond(fragment: &Fragment, e: BondIx, options: MatchOptions) -> bool {
    if options.use_free_sites {
        return true;
    }
    let Some((a, b)) = fragment.graph.edge_endpoints(e) else {
        return false;
    };
    fragment.graph[e].order.is_some()
        && fragment.atom(a).element.is_some()
        && fragment.atom(b).element.is_some()
}

impl Iterator for MatchIter<'_> {
    type Item = Match;

    fn next(&mut self) -> Option<Match> {
        if !self.started {
            self.started = true;
            if self.order.is_empty() {
                return None;
            }
            let candidates = self.candidates_for(self.order[0]);
            self.stack.push(Frame {
                candidates,
                next: 0,
                chosen: None,
            });
        }

        while !self.stack.is_empty() {
            let depth = self.stack.len() - 1;
            // Drop the previous choice at this depth (if any) before trying
            // the next candidate; this is also how a yielded assignment is
            // released when the consumer pulls again.
            self.unchoose(depth);

            let frame = &mut self.stack[depth];
            if frame.next >= frame.candidates.len() {
                self.stack.pop();
                continue;
            }
            let candidate = frame.candidates[frame.next];
            frame.next += 1;
            self.choose(depth, candidate);

            if depth + 1 == self.order.len() {
                if let Some(found) = self.complete() {
                    return Some(found);
                }
                // Failed verification: loop continues, unchoosing this
                // candidate at the top of the next iteration.
            } else {
                let candidates = self.candidates_for(self.order[depth + 1]);
                self.stack.push(Frame {
                    candidates,
                    next: 0,
                    chosen: None,
                });
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::molecule::{Atom, Bond};

    fn chain(elements: &[Element]) -> (Molecule, Vec<AtomIx>) {
        let mut mol = Molecule::new();
        let atoms: Vec<AtomIx> = elements
            .iter()
            .map(|e| mol.add_atom(Atom::new(*e)))
            .collect();
        for w in atoms.windows(2) {
            mol.add_bond(w[0], w[1], Bond::default()).unwrap();
        }
        (mol, atoms)
    }

    #[test]
    fn wildcard_pair_matches_ethane_both_ways() {
        let (ethane, _) = chain(&[Element::Carbon, Element::Carbon]);
        let mut fragment = Fragment::new();
        let a = fragment.add_free_site();
        let b = fragment.add_free_site();
        fragment.add_free_bond(a, b).unwrap();

        let matches: Vec<Match> =
            find_in(&fragment, &ethane, MatchOptions::default()).collect();
        // Two symmetric assignments, both valid, both yielded.
        assert_eq!(matches.len(), 2);
        for m in &matches {
            assert!(m.verify_against(&fragment, &ethane));
        }
        assert_ne!(matches[0], matches[1]);
    }

    #[test]
    fn element_constraint_prunes() {
        let (ethanol, _) = chain(&[Element::Carbon, Element::Carbon, Element::Oxygen]);
        let mut fragment = Fragment::new();
        let c = fragment.add_atom(Element::Carbon);
        let o = fragment.add_atom(Element::Oxygen);
        fragment.add_bond(c, o, BondOrder::Single).unwrap();

        let matches: Vec<Match> =
            find_in(&fragment, &ethanol, MatchOptions::default()).collect();
        assert_eq!(matches.len(), 1);
        assert!(matches[0].verify_against(&fragment, &ethanol));
    }

    #[test]
    fn bond_order_must_agree() {
        let (ethane, _) = chain(&[Element::Carbon, Element::Carbon]);
        let mut fragment = Fragment::new();
        let a = fragment.add_atom(Element::Carbon);
        let b = fragment.add_atom(Element::Carbon);
        fragment.add_bond(a, b, BondOrder::Double).unwrap();

        assert!(find_first(&fragment, &ethane).is_none());
    }

    #[test]
    fn free_bond_matches_any_order() {
        let mut ethene = Molecule::new();
        let a = ethene.add_atom(Atom::new(Element::Carbon));
        let b = ethene.add_atom(Atom::new(Element::Carbon));
        ethene
            .add_bond(a, b, Bond::of_order(BondOrder::Double))
            .unwrap();

        let mut fragment = Fragment::new();
        let fa = fragment.add_atom(Element::Carbon);
        let fb = fragment.add_atom(Element::Carbon);
        fragment.add_free_bond(fa, fb).unwrap();

        assert!(find_first(&fragment, &ethene).is_some());
    }

    #[test]
    fn injectivity_forbids_reusing_target_atoms() {
        let mut single = Molecule::new();
        single.add_atom(Atom::new(Element::Carbon));

        let mut fragment = Fragment::new();
        let a = fragment.add_free_site();
        let b = fragment.add_free_site();
        fragment.add_free_bond(a, b).unwrap();

        assert!(find_first(&fragment, &single).is_none());
    }

    #[test]
    fn degree_filter_excludes_terminal_atoms() {
        let (propane, atoms) = chain(&[Element::Carbon, Element::Carbon, Element::Carbon]);
        let mut fragment = Fragment::new();
        let mid = fragment.add_atom(Element::Carbon);
        let l = fragment.add_free_site();
        let r = fragment.add_free_site();
        fragment.add_free_bond(mid, l).unwrap();
        fragment.add_free_bond(mid, r).unwrap();

        for m in find_in(&fragment, &propane, MatchOptions::default()) {
            // Only the middle atom has degree two.
            assert_eq!(m.atoms[&mid], atoms[1]);
        }
    }

    #[test]
    fn disabling_free_sites_matches_concrete_part_only() {
        let (methane_ish, _) = chain(&[Element::Carbon]);
        let mut fragment = Fragment::new();
        let c = fragment.add_atom(Element::Carbon);
        let site = fragment.add_free_site();
        fragment.add_free_bond(c, site).unwrap();

        // Literally, the pattern needs a neighbor; with free sites stripped
        // it is just a lone carbon.
        assert!(find_first(&fragment, &methane_ish).is_none());
        let stripped: Vec<Match> = find_in(
            &fragment,
            &methane_ish,
            MatchOptions {
                use_free_sites: false,
            },
        )
        .collect();
        assert_eq!(stripped.len(), 1);
    }

    #[test]
    fn early_termination_and_restart() {
        let (hexane, _) = chain(&[Element::Carbon; 6]);
        let (fragment, _) = {
            let (cc, _) = chain(&[Element::Carbon, Element::Carbon]);
            Fragment::from_molecule(&cc)
        };

        let first = find_in(&fragment, &hexane, MatchOptions::default()).next();
        assert!(first.is_some());

        // A fresh search enumerates everything: five bonds, two directions.
        let all: Vec<Match> = find_in(&fragment, &hexane, MatchOptions::default()).collect();
        assert_eq!(all.len(), 10);
        assert_eq!(all.first(), first.as_ref());
    }

    #[test]
    fn search_respects_temporary_disconnect() {
        let (mut ethane, _) = chain(&[Element::Carbon, Element::Carbon]);
        let (fragment, _) = Fragment::from_molecule(&ethane);
        let bond = ethane.bonds().next().unwrap();

        ethane.temporarily_disconnect(bond).unwrap();
        assert!(find_first(&fragment, &ethane).is_none());
        ethane.reconnect_all_temporarily_disconnected();
        assert!(find_first(&fragment, &ethane).is_some());
    }

    #[test]
    fn result_set_is_stable_under_relabeling() {
        // The same star graph built in two different atom orders yields the
        // same number of matches for the same pattern.
        let build = |reversed: bool| {
            let mut mol = Molecule::new();
            let mut atoms: Vec<AtomIx> = (0..4)
                .map(|_| mol.add_atom(Atom::new(Element::Carbon)))
                .collect();
            if reversed {
                atoms.reverse();
            }
            for leaf in &atoms[1..] {
                mol.add_bond(atoms[0], *leaf, Bond::default()).unwrap();
            }
            mol
        };
        let mut fragment = Fragment::new();
        let hub = fragment.add_atom(Element::Carbon);
        let leaf = fragment.add_atom(Element::Carbon);
        fragment.add_bond(hub, leaf, BondOrder::Single).unwrap();

        let count_a = find_in(&fragment, &build(false), MatchOptions::default()).count();
        let count_b = find_in(&fragment, &build(true), MatchOptions::default()).count();
        assert_eq!(count_a, count_b);
    }
}
