//! Graph-theoretic representation of a molecule.
//!
//! A [`Molecule`] is a mutable, attributed, undirected graph: atoms carry an
//! element, formal charge, multiplicity, and optional coordinates; bonds
//! carry an order and a stereo type. Structural queries (ring perception,
//! connected components) are memoized until the next mutation.

use std::{
    collections::{BTreeMap, BTreeSet},
    fmt::Display,
    str::FromStr,
};

use bit_set::BitSet;
use once_cell::unsync::OnceCell;
use petgraph::{
    graph::{EdgeIndex, NodeIndex},
    stable_graph::StableGraph,
    visit::EdgeRef,
    Undirected,
};
use thiserror::Error;

use crate::geometry::Point3;
use crate::rings::Ring;

pub(crate) type Index = u32;
pub(crate) type MGraph = StableGraph<Atom, Bond, Undirected, Index>;

/// Handle to an atom of a [`Molecule`]. Stable for the atom's lifetime.
pub type AtomIx = NodeIndex<Index>;
/// Handle to a bond of a [`Molecule`]. Stable for the bond's lifetime.
pub type BondIx = EdgeIndex<Index>;

/// Thrown by [`Element::from_str`] if the string does not represent a valid
/// chemical element.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct ParseElementError;

macro_rules! periodic_table {
    ( $(($element:ident, $name:literal, $valence:literal),)* ) => {
        /// Represents a chemical element.
        #[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub enum Element {
            $( $element, )*
        }

        impl Element {
            /// Standard (lowest common) valence of the neutral element.
            pub fn standard_valence(&self) -> u8 {
                match &self {
                    $( Element::$element => $valence, )*
                }
            }
        }

        impl Display for Element {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                match &self {
                    $( Element::$element => write!(f, "{}", $name), )*
                }
            }
        }

        impl FromStr for Element {
            type Err = ParseElementError;
            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $( $name => Ok(Element::$element), )*
                    _ => Err(ParseElementError),
                }
            }
        }
    };
}

periodic_table!(
    (Hydrogen, "H", 1),
    (Helium, "He", 0),
    (Lithium, "Li", 1),
    (Beryllium, "Be", 2),
    (Boron, "B", 3),
    (Carbon, "C", 4),
    (Nitrogen, "N", 3),
    (Oxygen, "O", 2),
    (Fluorine, "F", 1),
    (Neon, "Ne", 0),
    (Sodium, "Na", 1),
    (Magnesium, "Mg", 2),
    (Aluminum, "Al", 3),
    (Silicon, "Si", 4),
    (Phosphorus, "P", 3),
    (Sulfur, "S", 2),
    (Chlorine, "Cl", 1),
    (Argon, "Ar", 0),
    (Potassium, "K", 1),
    (Calcium, "Ca", 2),
    (Scandium, "Sc", 3),
    (Titanium, "Ti", 4),
    (Vanadium, "V", 5),
    (Chromium, "Cr", 3),
    (Manganese, "Mn", 2),
    (Iron, "Fe", 2),
    (Cobalt, "Co", 2),
    (Nickel, "Ni", 2),
    (Copper, "Cu", 2),
    (Zinc, "Zn", 2),
    (Gallium, "Ga", 3),
    (Germanium, "Ge", 4),
    (Arsenic, "As", 3),
    (Selenium, "Se", 2),
    (Bromine, "Br", 1),
    (Krypton, "Kr", 0),
    (Rubidium, "Rb", 1),
    (Strontium, "Sr", 2),
    (Yttrium, "Y", 3),
    (Zirconium, "Zr", 4),
    (Niobium, "Nb", 5),
    (Molybdenum, "Mo", 6),
    (Technetium, "Tc", 7),
    (Ruthenium, "Ru", 3),
    (Rhodium, "Rh", 3),
    (Palladium, "Pd", 2),
    (Silver, "Ag", 1),
    (Cadmium, "Cd", 2),
    (Indium, "In", 3),
    (Tin, "Sn", 4),
    (Antimony, "Sb", 3),
    (Tellurium, "Te", 2),
    (Iodine, "I", 1),
    (Xenon, "Xe", 0),
    (Cesium, "Cs", 1),
    (Barium, "Ba", 2),
    (Lanthanum, "La", 3),
    (Cerium, "Ce", 3),
    (Praseodymium, "Pr", 3),
    (Neodymium, "Nd", 3),
    (Promethium, "Pm", 3),
    (Samarium, "Sm", 3),
    (Europium, "Eu", 3),
    (Gadolinium, "Gd", 3),
    (Terbium, "Tb", 3),
    (Dysprosium, "Dy", 3),
    (Holmium, "Ho", 3),
    (Erbium, "Er", 3),
    (Thulium, "Tm", 3),
    (Ytterbium, "Yb", 3),
    (Lutetium, "Lu", 3),
    (Hafnium, "Hf", 4),
    (Tantalum, "Ta", 5),
    (Wolfram, "W", 6),
    (Rhenium, "Re", 7),
    (Osmium, "Os", 4),
    (Iridium, "Ir", 3),
    (Platinum, "Pt", 2),
    (Gold, "Au", 1),
    (Mercury, "Hg", 2),
    (Thallium, "Tl", 3),
    (Lead, "Pb", 4),
    (Bismuth, "Bi", 3),
    (Polonium, "Po", 2),
    (Astatine, "At", 1),
    (Radon, "Rn", 0),
    (Francium, "Fr", 1),
    (Radium, "Ra", 2),
    (Actinium, "Ac", 3),
    (Thorium, "Th", 4),
    (Protactinium, "Pa", 5),
    (Uranium, "U", 6),
    (Neptunium, "Np", 6),
    (Plutonium, "Pu", 6),
    (Americium, "Am", 3),
    (Curium, "Cm", 3),
    (Berkelium, "Bk", 3),
    (Californium, "Cf", 3),
    (Einsteinium, "Es", 3),
    (Fermium, "Fm", 3),
    (Mendelevium, "Md", 3),
    (Nobelium, "No", 3),
    (Lawrencium, "Lr", 3),
    (Rutherfordium, "Rf", 4),
    (Dubnium, "Db", 5),
    (Seaborgium, "Sg", 6),
    (Bohrium, "Bh", 7),
    (Hassium, "Hs", 8),
    (Meitnerium, "Mt", 0),
    (Darmstadtium, "Ds", 0),
    (Roentgenium, "Rg", 0),
    (Copernicium, "Cn", 0),
    (Nihonium, "Nh", 0),
    (Flerovium, "Fl", 0),
    (Moscovium, "Mc", 0),
    (Livermorium, "Lv", 0),
    (Tennessine, "Ts", 0),
    (Oganesson, "Og", 0),
);

impl Element {
    /// Whether a positive formal charge raises rather than lowers the
    /// element's bonding capacity (pnictogens, chalcogens, halogens, noble
    /// gases).
    pub fn is_electronegative(&self) -> bool {
        use Element::*;
        matches!(
            self,
            Nitrogen
                | Phosphorus
                | Arsenic
                | Antimony
                | Bismuth
                | Oxygen
                | Sulfur
                | Selenium
                | Tellurium
                | Polonium
                | Fluorine
                | Chlorine
                | Bromine
                | Iodine
                | Astatine
                | Helium
                | Neon
                | Argon
                | Krypton
                | Xenon
                | Radon
        )
    }
}

/// The nodes of a [`Molecule`] graph.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Atom {
    /// Chemical element.
    pub element: Element,
    /// Formal charge in elementary charge units.
    pub charge: i8,
    /// Spin multiplicity; 1 is a singlet (no unpaired electrons), 2 a
    /// radical, 3 a biradical.
    pub multiplicity: u8,
    /// Position on the drawing plane, if assigned. The z coordinate is only
    /// used for pseudo-3D rotation and is zero for freshly laid-out atoms.
    pub position: Option<Point3>,
}

impl Atom {
    /// Construct a neutral, singlet [`Atom`] of type `element` with no
    /// position.
    pub fn new(element: Element) -> Self {
        Self {
            element,
            charge: 0,
            multiplicity: 1,
            position: None,
        }
    }

    /// Construct an [`Atom`] positioned at `(x, y)`.
    pub fn at(element: Element, x: f64, y: f64) -> Self {
        Self {
            position: Some(Point3 { x, y, z: 0.0 }),
            ..Self::new(element)
        }
    }

    /// Number of unpaired electrons implied by the multiplicity.
    pub fn unpaired_electrons(&self) -> u8 {
        self.multiplicity.saturating_sub(1)
    }
}

/// Bond order carried by an edge.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum BondOrder {
    #[default]
    Single,
    Double,
    Triple,
    /// Delocalized ring bond; drawn with an inner dashed line.
    Aromatic,
    /// Dative bond; contributes nothing to the acceptor's valence.
    Coordination,
}

impl BondOrder {
    /// Contribution of one bond of this order to an atom's occupied valence.
    pub fn occupancy(&self) -> u8 {
        match self {
            BondOrder::Single => 1,
            BondOrder::Double => 2,
            BondOrder::Triple => 3,
            BondOrder::Aromatic => 1,
            BondOrder::Coordination => 0,
        }
    }
}

/// Thrown by [`BondOrder::try_from`] when given anything other than a
/// molfile bond-type code (1, 2, 3, 4, or 8).
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct ParseBondError;

impl TryFrom<usize> for BondOrder {
    type Error = ParseBondError;
    fn try_from(value: usize) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(BondOrder::Single),
            2 => Ok(BondOrder::Double),
            3 => Ok(BondOrder::Triple),
            4 => Ok(BondOrder::Aromatic),
            8 => Ok(BondOrder::Coordination),
            _ => Err(ParseBondError),
        }
    }
}

/// 2D stereo rendering of a bond.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default)]
pub enum BondStereo {
    #[default]
    Plain,
    /// Filled triangle, thin end at the first endpoint.
    Wedge,
    /// Cross-hatched triangle, thin end at the first endpoint.
    Hatch,
    /// Undefined stereochemistry, drawn as a zig-zag.
    Wavy,
}

/// Which side of a bond's centerline the second line of a double bond is
/// drawn on. Sides are taken with the bond oriented from its lower-index
/// endpoint to its higher-index endpoint.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum BondSide {
    Left,
    Right,
}

/// Renderer hints attached to a bond. A fixed schema, not a property bag:
/// every hint the drawing layer understands is a named field here.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct RenderHints {
    /// Multiplier on the standard line width.
    pub line_width: f64,
    /// Overrides double-bond side selection when set.
    pub side: Option<BondSide>,
}

impl Default for RenderHints {
    fn default() -> Self {
        Self {
            line_width: 1.0,
            side: None,
        }
    }
}

/// The edges of a [`Molecule`] graph.
#[derive(Debug, Copy, Clone, PartialEq, Default)]
pub struct Bond {
    pub order: BondOrder,
    pub stereo: BondStereo,
    /// Set by ring perception when the bond lies on an aromatic ring.
    pub aromatic: bool,
    pub hints: RenderHints,
}

impl Bond {
    /// A plain bond of the given order.
    pub fn of_order(order: BondOrder) -> Self {
        Self {
            order,
            ..Self::default()
        }
    }

    /// A single bond with the given stereo rendering.
    pub fn stereo(stereo: BondStereo) -> Self {
        Self {
            stereo,
            ..Self::default()
        }
    }
}

/// Structural-integrity errors. These are programming errors on the caller's
/// side and always abort the specific operation; they never corrupt the
/// molecule.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Error)]
pub enum StructureError {
    /// An atom or bond handle does not refer to a member of this molecule,
    /// or both endpoints of a would-be bond are the same atom.
    #[error("atom or bond reference is not a member of this molecule")]
    InvalidReference,
    /// The two atoms are already bonded. Raise the existing bond's order
    /// instead of adding a parallel edge.
    #[error("atoms are already bonded; raise the bond order instead")]
    DuplicateBond,
}

/// Element multiset of a molecule, printable in Hill order.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Formula {
    counts: BTreeMap<Element, usize>,
}

impl Formula {
    /// Number of atoms of `element`.
    pub fn count(&self, element: Element) -> usize {
        self.counts.get(&element).copied().unwrap_or(0)
    }

    /// Total atom count.
    pub fn atom_count(&self) -> usize {
        self.counts.values().sum()
    }

    pub(crate) fn add(&mut self, element: Element) {
        *self.counts.entry(element).or_insert(0) += 1;
    }
}

impl Display for Formula {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Hill order: carbon, then hydrogen, then everything else by symbol.
        let mut rest: Vec<(String, usize)> = self
            .counts
            .iter()
            .filter(|(e, _)| !matches!(e, Element::Carbon | Element::Hydrogen))
            .map(|(e, n)| (e.to_string(), *n))
            .collect();
        rest.sort();

        let mut write_part = |sym: &str, n: usize| -> std::fmt::Result {
            match n {
                0 => Ok(()),
                1 => write!(f, "{sym}"),
                _ => write!(f, "{sym}{n}"),
            }
        };
        write_part("C", self.count(Element::Carbon))?;
        write_part("H", self.count(Element::Hydrogen))?;
        for (sym, n) in rest {
            write_part(&sym, n)?;
        }
        Ok(())
    }
}

/// A mutable molecular graph: a set of [`Atom`]s joined by [`Bond`]s, at most
/// one bond per atom pair and no self-loops.
///
/// A `Molecule` may be disconnected; that is a valid transient state during
/// interactive editing, not an error. Atom and bond handles remain valid
/// until the atom or bond they name is removed.
#[derive(Debug, Clone, Default)]
pub struct Molecule {
    graph: MGraph,
    /// Temporarily disconnected bonds, in disconnect order. These stay in the
    /// graph but are hidden from every adjacency-driven query until
    /// reconnected. See the component manager API in `components`.
    pub(crate) hidden: Vec<BondIx>,
    pub(crate) hidden_set: BitSet,
    pub(crate) ring_cache: OnceCell<Vec<Ring>>,
    pub(crate) component_cache: OnceCell<Vec<BTreeSet<AtomIx>>>,
}

impl Molecule {
    /// Construct an empty molecule.
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop memoized structural results. Called by every mutation.
    pub(crate) fn invalidate_caches(&mut self) {
        self.ring_cache = OnceCell::new();
        self.component_cache = OnceCell::new();
    }

    /// Add an atom and return its handle.
    pub fn add_atom(&mut self, atom: Atom) -> AtomIx {
        self.invalidate_caches();
        self.graph.add_node(atom)
    }

    /// Add a bond between `a` and `b`.
    ///
    /// Fails with [`StructureError::InvalidReference`] if either endpoint is
    /// not a member of this molecule or if `a == b`, and with
    /// [`StructureError::DuplicateBond`] if the pair is already bonded
    /// (including a temporarily disconnected bond).
    pub fn add_bond(&mut self, a: AtomIx, b: AtomIx, bond: Bond) -> Result<BondIx, StructureError> {
        if a == b || !self.graph.contains_node(a) || !self.graph.contains_node(b) {
            return Err(StructureError::InvalidReference);
        }
        if self.graph.find_edge(a, b).is_some() {
            return Err(StructureError::DuplicateBond);
        }
        self.invalidate_caches();
        Ok(self.graph.add_edge(a, b, bond))
    }

    /// Remove an atom, cascading to all of its bonds (including any that are
    /// temporarily disconnected). Returns the removed atom.
    pub fn remove_atom(&mut self, a: AtomIx) -> Result<Atom, StructureError> {
        if !self.graph.contains_node(a) {
            return Err(StructureError::InvalidReference);
        }
        let incident: Vec<BondIx> = self.graph.edges(a).map(|e| e.id()).collect();
        for e in incident {
            self.forget_hidden(e);
        }
        self.invalidate_caches();
        self.graph
            .remove_node(a)
            .ok_or(StructureError::InvalidReference)
    }

    /// Remove a bond. Returns the removed bond.
    pub fn remove_bond(&mut self, e: BondIx) -> Result<Bond, StructureError> {
        if self.graph.edge_weight(e).is_none() {
            return Err(StructureError::InvalidReference);
        }
        self.forget_hidden(e);
        self.invalidate_caches();
        self.graph
            .remove_edge(e)
            .ok_or(StructureError::InvalidReference)
    }

    /// Drop a bond from the disconnect stack if it is on it. Used when the
    /// bond is permanently removed while hidden.
    fn forget_hidden(&mut self, e: BondIx) {
        if self.hidden_set.remove(e.index()) {
            self.hidden.retain(|h| *h != e);
        }
    }

    /// Whether `e` is currently hidden by a temporary disconnect.
    pub(crate) fn is_hidden(&self, e: BondIx) -> bool {
        self.hidden_set.contains(e.index())
    }

    /// Access an atom.
    pub fn atom(&self, a: AtomIx) -> Result<&Atom, StructureError> {
        self.graph
            .node_weight(a)
            .ok_or(StructureError::InvalidReference)
    }

    /// Mutable access to an atom. Invalidates structural caches.
    pub fn atom_mut(&mut self, a: AtomIx) -> Result<&mut Atom, StructureError> {
        if !self.graph.contains_node(a) {
            return Err(StructureError::InvalidReference);
        }
        self.invalidate_caches();
        self.graph
            .node_weight_mut(a)
            .ok_or(StructureError::InvalidReference)
    }

    /// Access a bond.
    pub fn bond(&self, e: BondIx) -> Result<&Bond, StructureError> {
        self.graph
            .edge_weight(e)
            .ok_or(StructureError::InvalidReference)
    }

    /// Mutable access to a bond. Invalidates structural caches.
    pub fn bond_mut(&mut self, e: BondIx) -> Result<&mut Bond, StructureError> {
        if self.graph.edge_weight(e).is_none() {
            return Err(StructureError::InvalidReference);
        }
        self.invalidate_caches();
        self.graph
            .edge_weight_mut(e)
            .ok_or(StructureError::InvalidReference)
    }

    /// Mutable bond access that leaves structure caches alone. Only for
    /// attributes that cannot change topology (aromatic flag, hints).
    pub(crate) fn bond_mut_untracked(&mut self, e: BondIx) -> Option<&mut Bond> {
        self.graph.edge_weight_mut(e)
    }

    /// Endpoints of a bond, in storage order.
    pub fn endpoints(&self, e: BondIx) -> Result<(AtomIx, AtomIx), StructureError> {
        self.graph
            .edge_endpoints(e)
            .ok_or(StructureError::InvalidReference)
    }

    /// Iterate over all atom handles, in ascending index order.
    pub fn atoms(&self) -> impl Iterator<Item = AtomIx> + '_ {
        self.graph.node_indices()
    }

    /// Iterate over all visible bond handles (temporarily disconnected bonds
    /// are skipped), in ascending index order.
    pub fn bonds(&self) -> impl Iterator<Item = BondIx> + '_ {
        self.graph.edge_indices().filter(|e| !self.is_hidden(*e))
    }

    /// Number of atoms.
    pub fn atom_count(&self) -> usize {
        self.graph.node_count()
    }

    /// Number of visible bonds.
    pub fn bond_count(&self) -> usize {
        self.graph.edge_count() - self.hidden.len()
    }

    /// Visible neighbors of `a` with the connecting bond.
    pub fn neighbors(&self, a: AtomIx) -> impl Iterator<Item = (AtomIx, BondIx)> + '_ {
        self.graph
            .edges(a)
            .filter(|e| !self.hidden_set.contains(e.id().index()))
            .map(move |e| {
                let other = if e.source() == a { e.target() } else { e.source() };
                (other, e.id())
            })
    }

    /// Visible degree of `a`.
    pub fn degree(&self, a: AtomIx) -> usize {
        self.neighbors(a).count()
    }

    /// The visible bond between `a` and `b`, if any.
    pub fn bond_between(&self, a: AtomIx, b: AtomIx) -> Option<BondIx> {
        self.graph.find_edge(a, b).filter(|e| !self.is_hidden(*e))
    }

    /// Remaining unused bonding capacity of an atom: its element's standard
    /// valence adjusted for formal charge, minus occupied valence and
    /// unpaired electrons.
    ///
    /// A negative result means the atom's valence is exceeded. That is a
    /// queryable signal for the caller (chemistry checks, UI warnings), not
    /// an error: transiently invalid chemistry is allowed while editing.
    pub fn free_valency(&self, a: AtomIx) -> Result<i32, StructureError> {
        let atom = self.atom(a)?;
        let base = atom.element.standard_valence() as i32;
        let charge = atom.charge as i32;
        // Electronegative elements gain capacity with positive charge (N+
        // binds four); electropositive ones lose capacity either way (both
        // C+ and C- bind three).
        let effective = if atom.element.is_electronegative() {
            base + charge
        } else {
            base - charge.abs()
        };

        let mut occupied = 0i32;
        let mut aromatic_bonds = 0;
        for (_, e) in self.neighbors(a) {
            let bond = &self.graph[e];
            occupied += bond.order.occupancy() as i32;
            if bond.order == BondOrder::Aromatic || bond.aromatic {
                aromatic_bonds += 1;
            }
        }
        // One delocalized double bond per aromatic system member.
        if aromatic_bonds >= 2 {
            occupied += 1;
        }

        Ok(effective - occupied - atom.unpaired_electrons() as i32)
    }

    /// Element multiset over all atoms.
    pub fn formula(&self) -> Formula {
        let mut formula = Formula::default();
        for a in self.atoms() {
            formula.add(self.graph[a].element);
        }
        formula
    }
}
