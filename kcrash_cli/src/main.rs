mod output;

use anyhow::{Context, Result};
use clap::Parser;
use clap::error::ErrorKind;
use kcrash_core::config::ReporterConfig;
use kcrash_core::target::{self, Target};
use kcrash_core::{Report, Reporter, parse_all};
use std::collections::HashSet;
use std::ffi::OsString;
use std::io::Write;
use std::path::PathBuf;
use tracing::debug;

/// Flags that may be spelled with a single dash, `-os linux`.
const SHORT_LONG_FLAGS: &[&str] = &["os", "arch", "config", "json", "all", "unique"];

#[derive(Parser, Debug)]
#[clap(
    name = "kcrash",
    author,
    version,
    about = "Extract and classify crash reports from kernel console logs",
    long_about = None
)]
struct Cli {
    /// Target OS of the log
    #[clap(long, default_value = target::LINUX)]
    os: String,
    /// Target architecture of the log [default: host architecture]
    #[clap(long)]
    arch: Option<String>,
    /// Optional reporter config to reuse parsing settings
    #[clap(long, value_parser)]
    config: Option<PathBuf>,
    /// Emit parsed crashes as JSON
    #[clap(long)]
    json: bool,
    /// Parse all crash reports (default: only the first)
    #[clap(long)]
    all: bool,
    /// Print only the first of several reports with the same signature
    #[clap(long)]
    unique: bool,
    /// Kernel console log to parse
    #[clap(value_parser)]
    log_file: PathBuf,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = match Cli::try_parse_from(normalize_args(std::env::args_os())) {
        Ok(cli) => cli,
        Err(e) if matches!(e.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => {
            e.exit()
        }
        Err(e) => {
            let _ = e.print();
            std::process::exit(1);
        }
    };

    if let Err(e) = run(&cli) {
        eprintln!("kcrash: {e:#}");
        std::process::exit(1);
    }
}

fn run(cli: &Cli) -> Result<()> {
    let config = match &cli.config {
        Some(path) => ReporterConfig::load_from_file(path).context("failed to load config")?,
        None => ReporterConfig::default(),
    };
    let target = resolve_target(cli, &config).context("failed to create reporter")?;
    let reporter = Reporter::with_config(&target, &config).context("failed to create reporter")?;
    debug!(kernel = %reporter.target(), "reporter ready");

    let log = std::fs::read(&cli.log_file)
        .with_context(|| format!("failed to read log file {:?}", cli.log_file))?;

    let mut reports = if cli.all {
        parse_all(&reporter, &log)
    } else {
        reporter.parse(&log).into_iter().collect()
    };
    if cli.unique {
        reports = unique_by_signature(reports);
    }

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    if reports.is_empty() {
        let suppressed = !cli.json && kcrash_core::is_suppressed(&reporter, &log);
        output::write_empty(&mut out, cli.json, suppressed)?;
    } else if cli.json {
        output::write_json(&mut out, &reports)?;
    } else {
        output::write_human(&mut out, &reports)?;
    }
    out.flush()?;
    Ok(())
}

/// Flags name the kernel; a `target` in the config file wins.
fn resolve_target(cli: &Cli, config: &ReporterConfig) -> Result<Target> {
    if let Some(raw) = &config.target {
        return Ok(Target::parse(raw)?);
    }
    let arch = cli.arch.as_deref().unwrap_or(target::host_arch());
    Ok(Target::get(&cli.os, arch)?)
}

fn unique_by_signature(reports: Vec<Report<'_>>) -> Vec<Report<'_>> {
    let mut seen = HashSet::new();
    reports
        .into_iter()
        .filter(|r| seen.insert(r.signature()))
        .collect()
}

/// Rewrites single-dash long flags (`-os linux`, `-arch=arm64`) into the `--`
/// form clap expects. Everything after a bare `--` is left alone.
fn normalize_args<I>(args: I) -> Vec<OsString>
where
    I: IntoIterator<Item = OsString>,
{
    let mut passthrough = false;
    args.into_iter()
        .enumerate()
        .map(|(idx, arg)| {
            if idx == 0 || passthrough {
                return arg;
            }
            let Some(text) = arg.to_str() else {
                return arg;
            };
            if text == "--" {
                passthrough = true;
                return arg;
            }
            match text.strip_prefix('-') {
                Some(rest) if !rest.starts_with('-') => {
                    let name = rest.split('=').next().unwrap_or(rest);
                    if SHORT_LONG_FLAGS.contains(&name) {
                        OsString::from(format!("-{text}"))
                    } else {
                        arg
                    }
                }
                _ => arg,
            }
        })
        .collect()
}
