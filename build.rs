// build.rs

use clap::{Arg, ArgAction, Command};
use clap_mangen::Man;
use std::env;
use std::fs;
use std::path::PathBuf;

fn build_cli() -> Command {
    Command::new("bindery")
        .version(env!("CARGO_PKG_VERSION"))
        .author("Bindery Contributors")
        .about("Package manager that overlays package trees onto a shared root")
        .subcommand_required(false)
        .arg(
            Arg::new("base_dir")
                .long("base-dir")
                .value_name("PATH")
                .env("BINDERY_BASE_DIR")
                .default_value("/var/lib/bindery")
                .global(true)
                .help("Base directory for the database and package storage"),
        )
        .arg(
            Arg::new("root")
                .long("root")
                .value_name("PATH")
                .env("BINDERY_ROOT")
                .global(true)
                .help("Directory the unified root is built in (default: <base-dir>/root)"),
        )
        .subcommand(Command::new("init").about("Initialize the Bindery database and storage directories"))
        .subcommand(
            Command::new("install")
                .about("Install or upgrade packages from archives (.txz, .tgz, .tar.zst, .tar)")
                .arg(
                    Arg::new("archives")
                        .required(true)
                        .num_args(1..)
                        .help("Package archives, installed as one transaction"),
                ),
        )
        .subcommand(
            Command::new("remove")
                .about("Remove installed packages")
                .arg(
                    Arg::new("names")
                        .required(true)
                        .num_args(1..)
                        .help("Package names, removed as one transaction"),
                ),
        )
        .subcommand(
            Command::new("query")
                .about("Query installed packages")
                .arg(Arg::new("pattern").help("Package name pattern (optional)")),
        )
        .subcommand(
            Command::new("bindings")
                .about("Show the bindings that make up the unified root")
                .arg(
                    Arg::new("package")
                        .short('p')
                        .long("package")
                        .help("Only show bindings owned by this package"),
                ),
        )
        .subcommand(Command::new("history").about("Show changeset history"))
        .subcommand(Command::new("check").about("Check for an interrupted transaction"))
        .subcommand(
            Command::new("recover")
                .about("Finish or discard an interrupted transaction")
                .arg(
                    Arg::new("discard")
                        .long("discard")
                        .action(ArgAction::SetTrue)
                        .help("Restore the state before the interrupted transaction instead of completing it"),
                ),
        )
        .subcommand(
            Command::new("completions")
                .about("Generate shell completions")
                .arg(Arg::new("shell").required(true).help("bash, zsh, fish, elvish or powershell")),
        )
}

fn main() {
    println!("cargo:rerun-if-changed=build.rs");

    // Create man directory
    let out_dir = PathBuf::from(env::var("CARGO_MANIFEST_DIR").unwrap());
    let man_dir = out_dir.join("man");
    fs::create_dir_all(&man_dir).expect("Failed to create man directory");

    // Generate main man page
    let cmd = build_cli();
    let man = Man::new(cmd);
    let mut buffer = Vec::new();
    man.render(&mut buffer)
        .expect("Failed to render man page");

    let man_path = man_dir.join("bindery.1");
    fs::write(&man_path, buffer).expect("Failed to write man page");

    println!("cargo:warning=Man page generated at {}", man_path.display());
}
