use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use clap::{Command, CommandFactory};
use clap_complete::{Generator, Shell};
use clap_mangen::Man;

include!("src/cli/app.rs");

const BIN: &str = "rowf";

/// Render one man page per command: `rowf.1`, then `rowf-<sub>.1`.
fn write_man_pages(cmd: &Command, dir: &Path) -> io::Result<()> {
    fs::create_dir_all(dir)?;
    let pages = std::iter::once((BIN.to_string(), cmd.clone())).chain(
        cmd.get_subcommands()
            .map(|sub| (format!("{}-{}", BIN, sub.get_name()), sub.clone())),
    );
    for (stem, page) in pages {
        let mut buf = Vec::new();
        Man::new(page).render(&mut buf)?;
        fs::write(dir.join(format!("{}.1", stem)), buf)?;
    }
    Ok(())
}

fn write_completions(dir: &Path) -> io::Result<()> {
    fs::create_dir_all(dir)?;
    for shell in [Shell::Bash, Shell::Zsh, Shell::Fish, Shell::PowerShell] {
        let mut cmd = Cli::command();
        let mut buf = Vec::new();
        clap_complete::generate(shell, &mut cmd, BIN, &mut buf);
        fs::write(dir.join(shell.file_name(BIN)), buf)?;
    }
    Ok(())
}

fn main() -> io::Result<()> {
    println!("cargo:rerun-if-changed=src/cli/app.rs");
    println!("cargo:rerun-if-changed=build.rs");

    let out_dir = std::env::var_os("OUT_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("target/man"));
    write_man_pages(&Cli::command(), &out_dir.join("man"))?;
    write_completions(&out_dir.join("completions"))
}
