use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};

use mol2d::coords::{assign_coords, CoordOptions};
use mol2d::loader;
use mol2d::render::{render, RenderOptions};

#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, ValueEnum, Debug)]
enum Report {
    /// Element counts in Hill order.
    Formula,
    /// Perceived rings with sizes and aromaticity.
    Rings,
    /// Connected components.
    Components,
    /// Free valency of every atom.
    Valency,
    /// Drawing operations after laying out any unplaced atoms.
    Render,
}

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Molfile to inspect.
    path: PathBuf,

    #[arg(short, long, default_value = "formula")]
    report: Report,
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    let contents = fs::read_to_string(&cli.path)
        .with_context(|| format!("reading {}", cli.path.display()))?;
    let mut molecule = loader::parse_molfile_str(&contents)
        .with_context(|| format!("parsing {}", cli.path.display()))?;

    match cli.report {
        Report::Formula => println!("{}", molecule.formula()),
        Report::Rings => {
            for ring in molecule.rings() {
                let aromatic = if ring.is_aromatic() { " aromatic" } else { "" };
                let members: Vec<String> =
                    ring.atoms().iter().map(|a| a.index().to_string()).collect();
                println!("ring[{}{}]: {}", ring.len(), aromatic, members.join("-"));
            }
        }
        Report::Components => {
            for (i, comp) in molecule.connected_components().iter().enumerate() {
                let members: Vec<String> = comp.iter().map(|a| a.index().to_string()).collect();
                println!("component {i}: {}", members.join(" "));
            }
        }
        Report::Valency => {
            for a in molecule.atoms().collect::<Vec<_>>() {
                let atom = molecule.atom(a)?;
                let free = molecule.free_valency(a)?;
                let flag = if free < 0 { "  (exceeded)" } else { "" };
                println!("{:>4} {:<2} free valency {free}{flag}", a.index(), atom.element);
            }
        }
        Report::Render => {
            assign_coords(&mut molecule, &CoordOptions::default());
            for op in render(&molecule, &RenderOptions::default()) {
                println!("{op:?}");
            }
        }
    }
    Ok(())
}
