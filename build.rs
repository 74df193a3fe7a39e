//! Renders `atlas-lifecycle.1` from the clap definitions in `src/cli`.
//!
//! The page documents every lifecycle subcommand and lands in `OUT_DIR`,
//! where release tooling picks it up alongside the binary.

use std::env;
use std::fs::File;
use std::io::Write;
use std::path::PathBuf;

use clap::CommandFactory;
use clap_mangen::Man;

#[path = "src/cli/mod.rs"]
mod cli;

use cli::Cli;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut stdout = std::io::stdout();
    writeln!(stdout, "cargo:rerun-if-changed=build.rs")?;
    writeln!(stdout, "cargo:rerun-if-changed=src/cli/mod.rs")?;

    let out_dir =
        PathBuf::from(env::var_os("OUT_DIR").ok_or_else(|| {
            std::io::Error::new(std::io::ErrorKind::NotFound, "OUT_DIR was not set")
        })?);

    let command = Cli::command();
    let page = out_dir.join(format!("{}.1", command.get_name()));
    let mut buffer = Vec::new();
    Man::new(command).render(&mut buffer)?;
    File::create(page)?.write_all(&buffer)?;

    Ok(())
}
