//! Command-line probe for the outline engine.
//!
//! # Responsibility
//! - Report `outliner_core` linkage when run without arguments.
//! - Load one document, print its shape and optionally re-save it as OO3 XML.

use clap::Parser;
use log::info;
use outliner_core::{default_log_level, init_logging, OutlineDocument, SaveOptions};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(about = "Inspect an outline document and optionally re-save it as OO3 XML.")]
struct Cli {
    /// Document to load (OO3 XML, gzip-wrapped OO3 or OO2 plist).
    path: Option<PathBuf>,

    /// Write the loaded document back out as OO3 XML.
    #[arg(long, value_name = "OUT")]
    resave: Option<PathBuf>,

    /// Directory for rolling log files.
    #[arg(long, value_name = "DIR")]
    log_dir: Option<PathBuf>,
}

fn run(cli: Cli) -> Result<(), String> {
    if let Some(dir) = &cli.log_dir {
        let dir = dir.to_string_lossy();
        init_logging(default_log_level(), &dir).map_err(|err| err.to_string())?;
    }

    let Some(path) = cli.path else {
        println!("outliner_core ping={}", outliner_core::ping());
        println!("outliner_core version={}", outliner_core::core_version());
        return Ok(());
    };

    let document = OutlineDocument::load_from_path(&path).map_err(|err| err.to_string())?;
    println!("rows={}", document.row_count());
    println!("columns={}", document.columns().len());
    println!("padded_rows={}", document.load_report().padded_rows.len());

    if let Some(out) = cli.resave {
        document
            .save_to_path(&out, SaveOptions::default())
            .map_err(|err| err.to_string())?;
        info!(
            "event=cli_resave module=cli status=ok source={} target={}",
            path.display(),
            out.display()
        );
        println!("saved={}", out.display());
    }
    Ok(())
}

fn main() -> ExitCode {
    match run(Cli::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(message) => {
            eprintln!("error: {message}");
            ExitCode::FAILURE
        }
    }
}
