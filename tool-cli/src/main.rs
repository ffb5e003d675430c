use std::env;
use std::fs;

use anyhow::{Context, Result};
use clap::Arg;

const EMBEDDED_OPTIONS: &str = include_str!("options.yaml");
const APP_NAME: &str = "tool-cli";

fn main() {
    if let Err(err) = real_main() {
        eprintln!("Error: {:#}", err);
        std::process::exit(1);
    }
}

fn real_main() -> Result<()> {
    // Pre-scan for an external option mapping
    let args: Vec<String> = env::args().collect();
    let options_file = aclib::cli::pre_scan_value(&args, "--options-file");

    let options_yaml = if let Some(path) = options_file.as_deref() {
        fs::read_to_string(path)
            .with_context(|| format!("Failed to read options file: {}", path))?
    } else {
        EMBEDDED_OPTIONS.to_string()
    };
    let set = aclib::parse_option_root(&options_yaml).context("Option mapping parsing failed")?;

    // Answer shell completion requests before clap ever runs.
    if let aclib::CompletionOutcome::Completed { .. } = aclib::autocomplete_from_env(&set)? {
        std::process::exit(0);
    }

    // Print the registration script and stop when asked.
    if let Some(shell) = aclib::cli::pre_scan_value(&args, "--register") {
        let shell: aclib::Shell = shell.parse()?;
        print!("{}", aclib::registration_script(shell, APP_NAME));
        return Ok(());
    }

    // Build the CLI from the mapping and parse normally.
    let cmd = aclib::cli::build_command(APP_NAME, &set)
        .about("Demo tool driven by a declarative option mapping")
        .version(env!("CARGO_PKG_VERSION"))
        .arg(
            Arg::new("options-file")
                .long("options-file")
                .help("Path to option mapping YAML file")
                .num_args(1),
        )
        .arg(
            Arg::new("register")
                .long("register")
                .help("Print the completion registration script (bash or zsh)")
                .num_args(1),
        );
    let matches = cmd.get_matches();

    let values = aclib::cli::collect_values(&set, &matches)?;
    println!(
        "{}",
        serde_json::to_string_pretty(&aclib::cli::values_to_tree(&values))?
    );
    Ok(())
}
