//! Inbound adapter for V2000 molfile connection-table blocks.
//!
//! This is deliberately a thin codec: it turns an already-read text block
//! into `add_atom`/`add_bond` calls and nothing else. Unlike the stripped
//! tables some tools emit, the full atom block is honored: coordinates,
//! element symbols, charges (`M  CHG`), hydrogens included.

use std::str::FromStr;

use thiserror::Error;

use crate::molecule::{
    Atom, AtomIx, Bond, BondOrder, BondStereo, Element, Molecule, StructureError,
};

/// Parse failures, with enough column context to point at the broken line.
/// A failed parse aborts cleanly; it never leaves a half-built molecule in
/// the caller's hands.
#[derive(Debug, Error)]
pub enum LoaderError {
    #[error("molfile block is truncated")]
    Truncated,
    #[error("malformed counts line: {0:?}")]
    BadCounts(String),
    #[error("malformed atom line: {0:?}")]
    BadAtom(String),
    #[error("unknown element symbol {0:?}")]
    UnknownElement(String),
    #[error("malformed bond line: {0:?}")]
    BadBond(String),
    #[error("atom number {0} out of range")]
    AtomOutOfRange(usize),
    #[error("inconsistent connection table: {0}")]
    Structure(#[from] StructureError),
}

/// Parse one molfile connection-table block (everything up to `M  END`)
/// into a [`Molecule`].
pub fn parse_molfile_str(contents: &str) -> Result<Molecule, LoaderError> {
    let lines: Vec<&str> = contents
        .lines()
        .take_while(|line| !matches!(line.trim_end(), "M  END" | "$$$$"))
        .collect();
    if lines.len() < 4 {
        return Err(LoaderError::Truncated);
    }

    let (num_atoms, num_bonds) = parse_counts_line(lines[3])?;
    let atom_start = 4;
    let bond_start = atom_start + num_atoms;
    if lines.len() < bond_start + num_bonds {
        return Err(LoaderError::Truncated);
    }

    let mut mol = Molecule::new();
    let mut handles: Vec<AtomIx> = Vec::with_capacity(num_atoms);
    for line in &lines[atom_start..bond_start] {
        handles.push(mol.add_atom(parse_atom_line(line)?));
    }

    for line in &lines[bond_start..bond_start + num_bonds] {
        let (one, two, bond) = parse_bond_line(line)?;
        let a = *handles
            .get(one.checked_sub(1).ok_or(LoaderError::AtomOutOfRange(one))?)
            .ok_or(LoaderError::AtomOutOfRange(one))?;
        let b = *handles
            .get(two.checked_sub(1).ok_or(LoaderError::AtomOutOfRange(two))?)
            .ok_or(LoaderError::AtomOutOfRange(two))?;
        mol.add_bond(a, b, bond)?;
    }

    // Property block: only charges are meaningful to this engine.
    for line in &lines[bond_start + num_bonds..] {
        if let Some(rest) = line.strip_prefix("M  CHG") {
            apply_charges(&mut mol, &handles, rest)?;
        }
    }

    Ok(mol)
}

fn parse_counts_line(line: &str) -> Result<(usize, usize), LoaderError> {
    let field = |range: std::ops::Range<usize>| -> Result<usize, LoaderError> {
        line.get(range)
            .and_then(|s| s.trim().parse().ok())
            .ok_or_else(|| LoaderError::BadCounts(line.to_string()))
    };
    Ok((field(0..3)?, field(3..6)?))
}

fn parse_atom_line(line: &str) -> Result<Atom, LoaderError> {
    let coord = |range: std::ops::Range<usize>| -> Result<f64, LoaderError> {
        line.get(range)
            .and_then(|s| s.trim().parse().ok())
            .ok_or_else(|| LoaderError::BadAtom(line.to_string()))
    };
    let x = coord(0..10)?;
    let y = coord(10..20)?;
    let z = coord(20..30)?;
    let symbol = line
        .get(31..34)
        .map(str::trim)
        .ok_or_else(|| LoaderError::BadAtom(line.to_string()))?;
    let element = Element::from_str(symbol)
        .map_err(|_| LoaderError::UnknownElement(symbol.to_string()))?;

    let mut atom = Atom::at(element, x, y);
    if let Some(position) = atom.position.as_mut() {
        position.z = z;
    }
    Ok(atom)
}

fn parse_bond_line(line: &str) -> Result<(usize, usize, Bond), LoaderError> {
    let field = |range: std::ops::Range<usize>| -> Result<usize, LoaderError> {
        line.get(range)
            .and_then(|s| s.trim().parse().ok())
            .ok_or_else(|| LoaderError::BadBond(line.to_string()))
    };
    let one = field(0..3)?;
    let two = field(3..6)?;
    let order = BondOrder::try_from(field(6..9)?)
        .map_err(|_| LoaderError::BadBond(line.to_string()))?;
    // The stereo column is optional and often absent.
    let stereo = match line.get(9..12).map(str::trim) {
        Some("1") => BondStereo::Wedge,
        Some("6") => BondStereo::Hatch,
        Some("4") => BondStereo::Wavy,
        _ => BondStereo::Plain,
    };
    Ok((
        one,
        two,
        Bond {
            order,
            stereo,
            ..Bond::default()
        },
    ))
}

/// `M  CHG  n aaa vvv aaa vvv ...` pairs of atom number and charge.
fn apply_charges(
    mol: &mut Molecule,
    handles: &[AtomIx],
    rest: &str,
) -> Result<(), LoaderError> {
    let fields: Vec<i32> = rest
        .split_whitespace()
        .filter_map(|f| f.parse().ok())
        .collect();
    for pair in fields.get(1..).unwrap_or(&[]).chunks_exact(2) {
        let number = pair[0] as usize;
        let handle = *handles
            .get(number.checked_sub(1).ok_or(LoaderError::AtomOutOfRange(number))?)
            .ok_or(LoaderError::AtomOutOfRange(number))?;
        mol.atom_mut(handle)?.charge = pair[1] as i8;
    }
    Ok(())
}
