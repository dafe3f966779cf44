use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use aiec::ir::Module;
use aiec::lower::{CoreToStandardOptions, TileSelector};
use aiec::pass::{PassId, ALL_PASSES};
use aiec::pipeline::{run_pipeline, PipelineOptions};

#[derive(Debug, Clone, clap::ValueEnum)]
enum EmitFormat {
    /// Printed IR text
    Ir,
    /// Module JSON, readable by aiec
    Json,
}

#[derive(Parser, Debug)]
#[command(
    name = "aiec",
    version,
    about = "aiec — lowers AIE hardware-dialect modules to standard functions and intrinsic calls"
)]
struct Cli {
    /// Input module (JSON)
    input: PathBuf,

    /// Output file path (stdout if omitted)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Only outline cores in this column (-1 for all)
    #[arg(long, default_value_t = -1, allow_negative_numbers = true)]
    tile_col: i32,

    /// Only outline cores in this row (-1 for all)
    #[arg(long, default_value_t = -1, allow_negative_numbers = true)]
    tile_row: i32,

    /// Pass to run, in order (repeatable; default: aie-standard-lowering)
    #[arg(long = "pass", value_parser = parse_pass)]
    passes: Vec<PassId>,

    /// Output format
    #[arg(long, value_enum, default_value_t = EmitFormat::Ir)]
    emit: EmitFormat,

    /// Print per-pass timing and rewrite logs
    #[arg(long)]
    verbose: bool,
}

fn parse_pass(name: &str) -> Result<PassId, String> {
    PassId::from_name(name).ok_or_else(|| {
        let known: Vec<&str> = ALL_PASSES.iter().map(|p| p.name()).collect();
        format!("unknown pass `{}` (expected one of: {})", name, known.join(", "))
    })
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    // ── Read module ──
    let text = match std::fs::read_to_string(&cli.input) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("aiec: error: {}: {}", cli.input.display(), e);
            std::process::exit(2);
        }
    };
    let mut module = match Module::from_json(&text) {
        Ok(m) => m,
        Err(e) => {
            eprintln!("aiec: error: {}: {}", cli.input.display(), e);
            std::process::exit(2);
        }
    };

    // ── Run passes ──
    let passes = if cli.passes.is_empty() {
        vec![PassId::CoreToStandard]
    } else {
        cli.passes.clone()
    };
    let options = PipelineOptions {
        lower: CoreToStandardOptions {
            tile: TileSelector::new(cli.tile_col, cli.tile_row),
            ..CoreToStandardOptions::default()
        },
        verbose: cli.verbose,
    };
    let result = run_pipeline(&mut module, &passes, &options, |_, diags| {
        for diag in diags {
            eprintln!("aiec: {}", diag);
        }
    });
    if let Err(e) = result {
        eprintln!("aiec: {}", e);
        std::process::exit(1);
    }

    // ── Emit ──
    let rendered = match cli.emit {
        EmitFormat::Ir => module.to_string(),
        EmitFormat::Json => match module.to_json() {
            Ok(s) => s,
            Err(e) => {
                eprintln!("aiec: error: {}", e);
                std::process::exit(2);
            }
        },
    };
    match &cli.output {
        Some(path) => {
            if let Err(e) = std::fs::write(path, rendered) {
                eprintln!("aiec: error: {}: {}", path.display(), e);
                std::process::exit(2);
            }
        }
        None => print!("{}", rendered),
    }
}
