use std::path::{Path, PathBuf};
use std::process;

use clap::Parser;

use poisson_blend::{BlendPolicy, PoissonEditor, ProcessOptions, ProcessResult, SolverOptions};

#[derive(Parser)]
#[command(
    name = "poisson-edit",
    about = "Seamlessly clone masked image regions via Poisson editing",
    version,
    after_help = "Batch usage: poisson-edit SRC -o RES\n\
                  Each case directory under SRC holds *source.<ext>, *target.<ext> and *mask.<ext>;\n\
                  its name (ImportingGradients / MixingGradients) selects the policy unless --policy is set.\n\n\
                  Single case: poisson-edit --source s.png --target t.png --mask m.png -o out.png"
)]
struct Cli {
    /// Input directory of cases (default: SRC)
    input: Option<String>,

    /// Output directory (batch, default: RES) or output file (single case)
    #[arg(short, long)]
    output: Option<String>,

    /// Source image for a single case
    #[arg(long, requires_all = ["target", "mask"], conflicts_with = "input")]
    source: Option<String>,

    /// Target image for a single case
    #[arg(long)]
    target: Option<String>,

    /// Mask image for a single case
    #[arg(long)]
    mask: Option<String>,

    /// Blending policy: importing or mixing (default: from case directory name)
    #[arg(short, long)]
    policy: Option<String>,

    /// Relative residual tolerance of the conjugate gradient solve
    #[arg(long, default_value = "1e-10")]
    tolerance: f64,

    /// Iteration cap per channel (default: 10 x unknowns, at least 100)
    #[arg(long)]
    max_iterations: Option<usize>,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Suppress all non-error output
    #[arg(short, long)]
    quiet: bool,
}

fn init_logging(opts: &ProcessOptions) {
    let level = if opts.quiet {
        "error"
    } else if opts.verbose {
        "debug"
    } else {
        "warn"
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp(None)
        .init();
}

fn main() {
    let cli = Cli::parse();

    if !(cli.tolerance > 0.0 && cli.tolerance < 1.0) {
        eprintln!("Error: Tolerance must be between 0.0 and 1.0 (exclusive)");
        process::exit(1);
    }

    let policy = match cli.policy.as_deref().map(str::parse::<BlendPolicy>) {
        None => None,
        Some(Ok(p)) => Some(p),
        Some(Err(e)) => {
            eprintln!("Error: {e} (expected importing or mixing)");
            process::exit(1);
        }
    };

    let opts = ProcessOptions {
        policy,
        solver: SolverOptions {
            tolerance: cli.tolerance,
            max_iterations: cli.max_iterations,
        },
        verbose: cli.verbose,
        quiet: cli.quiet,
    };
    init_logging(&opts);

    let editor = PoissonEditor::with_solver(opts.solver);

    let results = if let Some(source) = &cli.source {
        let (Some(target), Some(mask)) = (&cli.target, &cli.mask) else {
            eprintln!("Error: --source requires --target and --mask");
            process::exit(1);
        };
        let Some(output) = &cli.output else {
            eprintln!("Error: Output file is required for a single case");
            eprintln!("Usage: poisson-edit --source S --target T --mask M -o <output>");
            process::exit(1);
        };
        vec![run_single(
            &editor,
            [Path::new(source), Path::new(target), Path::new(mask)],
            Path::new(output),
            policy.unwrap_or_default(),
        )]
    } else {
        let input = cli.input.as_deref().unwrap_or("SRC");
        let input_path = Path::new(input);
        if !input_path.is_dir() {
            eprintln!("Error: Input directory does not exist: {input}");
            process::exit(1);
        }
        let output_dir = PathBuf::from(cli.output.as_deref().unwrap_or("RES"));
        editor.process_directory(input_path, &output_dir, &opts)
    };

    if results.is_empty() && !opts.quiet {
        eprintln!("No cases found (expected *source.<ext>, *target.<ext>, *mask.<ext>)");
    }

    let mut success_count = 0u32;
    let mut skip_count = 0u32;
    let mut fail_count = 0u32;

    for r in &results {
        print_result(r, &opts);
        if r.skipped {
            skip_count += 1;
        } else if r.success {
            success_count += 1;
        } else {
            fail_count += 1;
        }
    }

    if results.len() > 1 && !opts.quiet {
        eprintln!();
        eprint!("[Summary] Processed: {success_count}");
        if skip_count > 0 {
            eprint!(", Skipped: {skip_count}");
        }
        if fail_count > 0 {
            eprint!(", Failed: {fail_count}");
        }
        eprintln!(" (Total: {})", results.len());
    }

    if fail_count > 0 {
        process::exit(1);
    }
}

fn run_single(
    editor: &PoissonEditor,
    [source, target, mask]: [&Path; 3],
    output: &Path,
    policy: BlendPolicy,
) -> ProcessResult {
    let outcome = editor.edit_files(source, target, mask, output, policy);
    let (success, unknowns, message) = match outcome {
        Ok(n) => (true, n, format!("{n} equations solved per channel")),
        Err(e) => (false, 0, format!("Failed: {e}")),
    };
    ProcessResult {
        path: output.to_path_buf(),
        success,
        skipped: success && unknowns == 0,
        policy: Some(policy),
        unknowns,
        message,
    }
}

fn print_result(result: &ProcessResult, opts: &ProcessOptions) {
    if opts.quiet && result.success {
        return;
    }

    let name = result.path.display();
    let policy = result
        .policy
        .map_or_else(String::new, |p| format!(" [{p}]"));

    if result.skipped {
        if !opts.quiet {
            eprintln!("[SKIP] {name}{policy}: {}", result.message);
        }
    } else if result.success {
        if !opts.quiet {
            eprintln!("[OK] {name}{policy} ({} unknowns)", result.unknowns);
        }
    } else {
        eprintln!("[FAIL] {name}: {}", result.message);
    }

    if opts.verbose && !result.message.is_empty() {
        eprintln!("  -> {}", result.message);
    }
}
