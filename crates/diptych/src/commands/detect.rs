//! Detect command - Print the kinds a file may contain

use std::fs;
use std::path::PathBuf;

use clap::Args;
use diptych_atelier::detect_categories_in_text;

use super::EnvArg;

#[derive(Args)]
pub struct DetectArgs {
    /// File to inspect
    pub path: PathBuf,

    /// Target environment
    #[arg(long, value_enum)]
    pub env: EnvArg,
}

pub fn run(args: DetectArgs) -> bool {
    let code = match fs::read_to_string(&args.path) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Failed to read {}: {}", args.path.display(), e);
            return false;
        }
    };

    let detected = detect_categories_in_text(&code, args.env.into());
    if detected.is_empty() {
        println!("(none)");
    }
    for kind in detected.kinds() {
        println!("{kind}");
    }
    true
}
