//! reqmd - link Markdown-declared requirements to source coverage tags
//!
//! Scans one or more repository roots for Markdown specification files and
//! annotated source files, then rewrites the Markdown in place so that every
//! requirement carries its coverage status and a footnote listing the
//! covering sources, alongside a per-folder `reqmd.json` sidecar manifest.

use std::path::PathBuf;

use eyre::{Result, bail};
use facet_args as args;
use owo_colors::OwoColorize;
use reqmd_core::applier::ApplyMode;
use reqmd_core::scanner::ScanOptions;
use reqmd_core::vcs::GitAdapter;
use regex::Regex;

/// CLI arguments.
#[derive(Debug, facet::Facet)]
struct Args {
    /// Subcommand to run.
    #[facet(args::subcommand)]
    command: Option<Command>,

    /// Print debug-level logs in addition to info-level.
    #[facet(args::named, args::short = 'v', default)]
    verbose: bool,
}

/// Subcommands.
#[derive(Debug, facet::Facet)]
#[repr(u8)]
enum Command {
    /// Link requirements declared in Markdown to their coverage tags.
    Trace {
        /// Repository roots to scan.
        #[facet(args::positional)]
        paths: Vec<PathBuf>,

        /// Override the default set of source file extensions (comma-separated).
        #[facet(args::named, args::short = 'e', default)]
        extensions: Option<String>,

        /// Compute the diff but do not write anything to disk.
        #[facet(args::named, args::short = 'n', default)]
        dry_run: bool,

        /// A regex; lines matching it are skipped during parsing. Repeatable.
        #[facet(args::named, default)]
        ignore_lines: Vec<String>,
    },
}

fn main() -> Result<()> {
    let args: Args = match facet_args::from_std_args() {
        Ok(args) => args,
        Err(e) => {
            if e.is_help_request() {
                if let Some(help) = e.help_text() {
                    println!("{help}");
                }
                return Ok(());
            }
            eprintln!("{e}");
            std::process::exit(1);
        }
    };

    let log_level = if args.verbose { "debug" } else { "warn" };
    let env_filter = format!("reqmd={log_level},reqmd_core={log_level}");
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(env_filter))
        .with_writer(std::io::stderr)
        .init();

    match args.command {
        Some(Command::Trace { paths, extensions, dry_run, ignore_lines }) => {
            run_trace(paths, extensions, dry_run, ignore_lines)
        }
        None => bail!("no subcommand given; try `reqmd trace <path>...`"),
    }
}

fn run_trace(paths: Vec<PathBuf>, extensions: Option<String>, dry_run: bool, ignore_lines: Vec<String>) -> Result<()> {
    if paths.is_empty() {
        bail!("no paths given; usage: reqmd trace <path>...");
    }

    let mut options = ScanOptions::default();
    if let Some(csv) = extensions {
        options.source_extensions = csv.split(',').map(|s| s.trim().to_string()).filter(|s| !s.is_empty()).collect();
    }
    for pattern in &ignore_lines {
        let re = Regex::new(pattern).map_err(|e| eyre::eyre!("invalid --ignore-lines pattern {pattern:?}: {e}"))?;
        options.ignore_line_patterns.push(re);
    }

    let mode = if dry_run { ApplyMode::DryRun } else { ApplyMode::Write };

    let first_root = paths[0].canonicalize().unwrap_or_else(|_| paths[0].clone());
    let vcs = build_vcs_adapter(&first_root)?;

    match reqmd_core::tracer::trace(&paths, &options, mode, vcs.as_ref()) {
        Ok(()) => {
            if dry_run {
                eprintln!("{} dry run complete, no files written", "info:".cyan());
            }
            Ok(())
        }
        Err(e) => {
            if let Some(trace_errors) = e.downcast_ref::<reqmd_core::tracer::TraceErrors>() {
                eprint!("{trace_errors}");
                std::process::exit(1);
            }
            if let Some(walk_errors) = e.downcast_ref::<reqmd_core::tracer::WalkErrors>() {
                eprint!("{walk_errors}");
                std::process::exit(1);
            }
            Err(e)
        }
    }
}

/// Build the production VCS adapter: requires `root` to be inside a git
/// checkout with an `origin` remote, whose URL becomes the permalink prefix
/// together with the current branch.
fn build_vcs_adapter(root: &std::path::Path) -> Result<Box<dyn reqmd_core::vcs::VcsAdapter>> {
    let remote_out = std::process::Command::new("git")
        .args(["remote", "get-url", "origin"])
        .current_dir(root)
        .output()?;
    if !remote_out.status.success() {
        bail!("no git remote 'origin' configured for {}", root.display());
    }
    let remote_url = String::from_utf8_lossy(&remote_out.stdout).trim().trim_end_matches(".git").to_string();

    let head_out = std::process::Command::new("git")
        .args(["rev-parse", "--abbrev-ref", "HEAD"])
        .current_dir(root)
        .output()?;
    let head = if head_out.status.success() {
        String::from_utf8_lossy(&head_out.stdout).trim().to_string()
    } else {
        "main".to_string()
    };

    let adapter = GitAdapter::discover(root, &remote_url, &head)?;
    Ok(Box::new(adapter))
}
