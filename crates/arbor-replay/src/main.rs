//! arbor replay - run fuzz inputs through the interpreter outside the fuzzer
//!
//! Usage: arbor-replay [--check] [--no-budget] [--json] FILE...

use anyhow::{Context, Result, bail};
use arbor_vm::{VmConfig, run};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let mut config = VmConfig::default();
    let mut json = false;
    let mut files = Vec::new();
    for arg in std::env::args().skip(1) {
        match arg.as_str() {
            "--check" => config.check_consistency = true,
            "--no-budget" => config.use_budget = false,
            "--json" => json = true,
            flag if flag.starts_with("--") => bail!("unknown flag {flag}"),
            _ => files.push(arg),
        }
    }
    if files.is_empty() {
        bail!("usage: arbor-replay [--check] [--no-budget] [--json] FILE...");
    }

    let mut failed = 0;
    for path in &files {
        let data = std::fs::read(path).with_context(|| format!("reading {path}"))?;
        match run(&data, &config) {
            Ok(report) => {
                info!(
                    "{}: {} steps, {} trees freed, {} allocation failures",
                    path, report.steps, report.trees_freed, report.alloc_failures
                );
                if json {
                    println!("{}", report.to_json());
                }
            }
            Err(e) => {
                error!("{}: {}", path, e);
                failed += 1;
            }
        }
    }

    if failed > 0 {
        bail!("{failed} of {} inputs failed", files.len());
    }
    Ok(())
}
