//! Connected components and reversible bond disconnection.
//!
//! `temporarily_disconnect` hides a bond from every adjacency-driven query
//! without removing it, so callers can ask "what falls apart if I cut these
//! bonds" and then restore the molecule exactly. Restoration is stack
//! disciplined; [`DisconnectScope`] guarantees it on every exit path.

use std::collections::BTreeSet;
use std::ops::{Deref, DerefMut};

use crate::molecule::{AtomIx, Bond, BondIx, Molecule, StructureError};
use crate::utils::component_partition;

impl Molecule {
    /// Partition of all atoms into connected components over visible bonds,
    /// ordered by each component's smallest atom index. Memoized until the
    /// next mutation.
    pub fn connected_components(&self) -> &[BTreeSet<AtomIx>] {
        self.component_cache
            .get_or_init(|| component_partition(self))
    }

    /// Whether the molecule has at most one component. The empty molecule
    /// is connected.
    pub fn is_connected(&self) -> bool {
        self.connected_components().len() <= 1
    }

    /// Hide `e` from all adjacency-driven queries while keeping it (and its
    /// identity) retrievable. Fails with `InvalidReference` if `e` is not a
    /// visible member bond.
    pub fn temporarily_disconnect(&mut self, e: BondIx) -> Result<(), StructureError> {
        if self.bond(e).is_err() || self.is_hidden(e) {
            return Err(StructureError::InvalidReference);
        }
        self.invalidate_caches();
        self.hidden.push(e);
        self.hidden_set.insert(e.index());
        Ok(())
    }

    /// Restore every temporarily disconnected bond, most recent first.
    /// Returns how many bonds were restored.
    pub fn reconnect_all_temporarily_disconnected(&mut self) -> usize {
        self.reconnect_to(0)
    }

    /// Pop the disconnect stack down to `mark`.
    pub(crate) fn reconnect_to(&mut self, mark: usize) -> usize {
        let mut restored = 0;
        while self.hidden.len() > mark {
            if let Some(e) = self.hidden.pop() {
                self.hidden_set.remove(e.index());
                restored += 1;
            }
        }
        if restored > 0 {
            self.invalidate_caches();
        }
        restored
    }

    /// Depth of the disconnect stack.
    pub fn disconnected_count(&self) -> usize {
        self.hidden.len()
    }

    /// Materialize each connected component as an independent molecule: a
    /// structural copy sharing no atom or bond ownership with the original.
    /// Atoms are copied in ascending index order, so handles within each
    /// copy are deterministic. Hidden bonds are not copied.
    pub fn get_disconnected_subgraphs(&self) -> Vec<Molecule> {
        self.connected_components()
            .iter()
            .map(|comp| {
                let mut sub = Molecule::new();
                let mut map = std::collections::HashMap::new();
                for a in comp {
                    if let Ok(atom) = self.atom(*a) {
                        map.insert(*a, sub.add_atom(*atom));
                    }
                }
                for e in self.bonds() {
                    let Ok((a, b)) = self.endpoints(e) else {
                        continue;
                    };
                    if let (Some(ca), Some(cb)) = (map.get(&a), map.get(&b)) {
                        let bond: Bond = match self.bond(e) {
                            Ok(b) => *b,
                            Err(_) => continue,
                        };
                        // The source has no duplicate bonds, so neither do we.
                        let _ = sub.add_bond(*ca, *cb, bond);
                    }
                }
                sub
            })
            .collect()
    }

    /// Open a disconnect scope: cuts made through it are undone when the
    /// scope drops.
    pub fn disconnect_scope(&mut self) -> DisconnectScope<'_> {
        let mark = self.hidden.len();
        DisconnectScope { mol: self, mark }
    }
}

/// RAII guard over a set of temporary disconnects. Dropping the scope
/// reconnects every bond cut through it (and any cut directly on the
/// molecule while the scope was open), in reverse order.
pub struct DisconnectScope<'a> {
    mol: &'a mut Molecule,
    mark: usize,
}

impl DisconnectScope<'_> {
    /// Temporarily disconnect `e` within this scope.
    pub fn cut(&mut self, e: BondIx) -> Result<(), StructureError> {
        self.mol.temporarily_disconnect(e)
    }
}

impl Deref for DisconnectScope<'_> {
    type Target = Molecule;
    fn deref(&self) -> &Molecule {
        self.mol
    }
}

impl DerefMut for DisconnectScope<'_> {
    fn deref_mut(&mut self) -> &mut Molecule {
        self.mol
    }
}

impl Drop for DisconnectScope<'_> {
    fn drop(&mut self) {
        self.mol.reconnect_to(self.mark);
    }
}
