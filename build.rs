//! Build script rendering the `helperchain` manual page from the CLI
//! definition.

use std::{fs, path::PathBuf};

use clap::CommandFactory;
use clap_mangen::Man;

#[path = "src/cli.rs"]
mod cli;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("cargo:rerun-if-changed=src/cli.rs");
    println!("cargo:rerun-if-changed=build.rs");

    let cmd = cli::Cli::command();
    let page = PathBuf::from("target/generated-man").join(format!("{}.1", cmd.get_name()));
    if let Some(dir) = page.parent() {
        fs::create_dir_all(dir)?;
    }

    let mut rendered = Vec::new();
    Man::new(cmd).render(&mut rendered)?;
    fs::write(page, rendered)?;
    Ok(())
}
