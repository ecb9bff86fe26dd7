//! Seamlessly clone one masked source region into a target image.
//!
//! Usage:
//! ```sh
//! cargo run --example blend_case -- source.png target.png mask.png result.png [importing|mixing]
//! ```

use std::env;
use std::path::Path;
use std::process;

use poisson_blend::{BlendPolicy, PoissonEditor};

fn main() {
    let args: Vec<String> = env::args().collect();
    if args.len() < 5 {
        eprintln!(
            "Usage: {} <source> <target> <mask> <output> [importing|mixing]",
            args[0]
        );
        process::exit(1);
    }

    let policy = match args.get(5).map(|s| s.parse::<BlendPolicy>()) {
        None => BlendPolicy::default(),
        Some(Ok(p)) => p,
        Some(Err(e)) => {
            eprintln!("Error: {e}");
            process::exit(1);
        }
    };

    let editor = PoissonEditor::new();
    match editor.edit_files(
        Path::new(&args[1]),
        Path::new(&args[2]),
        Path::new(&args[3]),
        Path::new(&args[4]),
        policy,
    ) {
        Ok(n) => println!("Done: {n} pixels blended with {policy}"),
        Err(e) => {
            eprintln!("Error: {e}");
            process::exit(1);
        }
    }
}
