//! Signature Schema CLI
//!
//! Command-line interface for compiling function signatures into JSON Schema.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use sigschema::{
    compile, discover, CompileOptions, Compilation, Diagnostic, PatternFilter, DEFAULT_IMPORT_DEPTH,
};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "sigschema")]
#[command(about = "Compile annotated function signatures into JSON Schema")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile every function of a module file or package directory
    Compile {
        /// Syntax tree file (.json) or package directory
        path: PathBuf,

        #[command(flatten)]
        scan: ScanArgs,

        /// Output file (stdout if not specified)
        #[arg(long)]
        output: Option<PathBuf>,

        /// Pretty-print JSON output
        #[arg(long)]
        pretty: bool,
    },

    /// Report functions that cannot be compiled
    Check {
        /// Syntax tree file (.json) or package directory
        path: PathBuf,

        #[command(flatten)]
        scan: ScanArgs,

        /// Output format: text (default) or json
        #[arg(long, default_value = "text")]
        format: String,
    },
}

#[derive(clap::Args)]
struct ScanArgs {
    /// Only compile modules and functions matching this pattern (repeatable)
    #[arg(long)]
    include: Vec<String>,

    /// Skip modules and functions matching this pattern (repeatable)
    #[arg(long)]
    exclude: Vec<String>,

    /// Maximum number of relative imports followed when looking up a type
    #[arg(long, default_value_t = DEFAULT_IMPORT_DEPTH)]
    import_depth: usize,
}

fn main() -> ExitCode {
    // Logs go to stderr only when SIGSCHEMA_LOG is set, e.g. SIGSCHEMA_LOG=sigschema=debug
    if let Ok(filter) = EnvFilter::try_from_env("SIGSCHEMA_LOG") {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .with_writer(std::io::stderr)
            .init();
        tracing::debug!("tracing initialized");
    }

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Compile {
            path,
            scan,
            output,
            pretty,
        } => run_compile(&path, &scan, output, pretty),
        Commands::Check { path, scan, format } => run_check(&path, &scan, &format),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(code) => ExitCode::from(code),
    }
}

fn run_scan(path: &Path, scan: &ScanArgs) -> Result<Compilation, u8> {
    let filter = PatternFilter::new(&scan.include, &scan.exclude).map_err(|e| {
        eprintln!("Error: {}", e);
        e.exit_code() as u8
    })?;

    let target = discover(path).map_err(|e| {
        eprintln!("Error: {}", e);
        e.exit_code() as u8
    })?;

    let options = CompileOptions::new().import_depth(scan.import_depth);
    Ok(compile(&target, &filter, &options))
}

fn run_compile(path: &Path, scan: &ScanArgs, output: Option<PathBuf>, pretty: bool) -> Result<(), u8> {
    let compilation = run_scan(path, scan)?;

    for diag in &compilation.diagnostics {
        eprintln!(
            "Warning: skipped {}{}: {}",
            diag.function,
            location(diag),
            diag.message
        );
    }

    let value = compilation.to_value();
    let json_output = if pretty {
        serde_json::to_string_pretty(&value)
    } else {
        serde_json::to_string(&value)
    }
    .map_err(|e| {
        eprintln!("Error serializing output: {}", e);
        2u8
    })?;

    match output {
        Some(path) => {
            std::fs::write(&path, &json_output).map_err(|e| {
                eprintln!("Error writing to {}: {}", path.display(), e);
                3u8
            })?;
        }
        None => {
            println!("{}", json_output);
        }
    }

    Ok(())
}

fn run_check(path: &Path, scan: &ScanArgs, format: &str) -> Result<(), u8> {
    let compilation = run_scan(path, scan)?;
    let rejected = compilation.diagnostics.len();

    if format == "json" {
        let output = serde_json::json!({
            "compiled": compilation.schemas.len(),
            "rejected": rejected,
            "diagnostics": compilation.diagnostics,
        });
        let rendered = serde_json::to_string_pretty(&output).map_err(|e| {
            eprintln!("Error serializing output: {}", e);
            2u8
        })?;
        println!("{}", rendered);
    } else {
        for name in compilation.schemas.keys() {
            println!("  \x1b[32m✓\x1b[0m {}", name);
        }
        for diag in &compilation.diagnostics {
            println!(
                "  \x1b[31m✗\x1b[0m {}{} \x1b[31m[{}]\x1b[0m: {}",
                diag.function,
                location(diag),
                diag.code,
                diag.message
            );
        }

        println!();
        if rejected == 0 {
            println!(
                "\x1b[32m✓ {} functions checked, all compiled\x1b[0m",
                compilation.schemas.len()
            );
        } else {
            println!(
                "\x1b[31m✗ {} functions checked: {} compiled, {} rejected\x1b[0m",
                compilation.schemas.len() + rejected,
                compilation.schemas.len(),
                rejected
            );
        }
    }

    if rejected == 0 {
        Ok(())
    } else {
        Err(1)
    }
}

/// ` (module:line:column)` when the definition position is known.
fn location(diag: &Diagnostic) -> String {
    match diag.line {
        Some(line) => format!(
            " ({}:{}:{})",
            diag.module,
            line,
            diag.column.unwrap_or(0)
        ),
        None => String::new(),
    }
}
