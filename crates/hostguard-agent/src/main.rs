//! HostGuard - OS hardening for Linux hosts
//!
//! Runs the hardening categories against the local host:
//! - Probes file attributes, managed file contents and package state
//! - Converges anything that drifted from policy
//! - Reports per-category outcomes as text or JSON
//!
//! Exit status: 0 when everything is compliant or remediated, 1 when some
//! audit failed, 2 when a category was aborted or the run could not start.

use anyhow::{bail, Context, Result};
use clap::Parser;
use hostguard_audit::{Aborted, Apt, Dnf, DriftReport, PackageManager};
use hostguard_checks::{CategoryAbort, CategoryRun, Hardener};
use hostguard_common::{init_logging, Config, LogConfig, RetryPolicy};
use hostguard_core::ComplianceReport;
use hostguard_policy::{TemplateRenderer, YamlPolicy};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

const DEFAULT_CONFIG: &str = "/etc/hostguard/hostguard.toml";

const EXIT_PARTIAL: i32 = 1;
const EXIT_ABORTED: i32 = 2;

/// HostGuard OS hardening
#[derive(Parser, Debug)]
#[command(name = "hostguard")]
#[command(version)]
#[command(about = "Audit and harden operating system settings", long_about = None)]
struct Args {
    /// Configuration file path
    #[arg(short, long)]
    config: Option<String>,

    /// Policy overrides file (YAML)
    #[arg(short, long)]
    policy: Option<String>,

    /// Directory with template overrides
    #[arg(long)]
    templates: Option<String>,

    /// Category to run; repeat for several (default: all)
    #[arg(long = "category")]
    categories: Vec<String>,

    /// Report drift without changing anything
    #[arg(long)]
    check: bool,

    /// List categories and exit
    #[arg(long)]
    list: bool,

    /// Output format (text, json)
    #[arg(long, default_value = "text")]
    format: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long)]
    log_level: Option<String>,

    /// Log format (pretty, json, compact)
    #[arg(long)]
    log_format: Option<String>,
}

fn main() {
    let args = Args::parse();
    match run(&args) {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("Error: {:#}", e);
            std::process::exit(EXIT_ABORTED);
        }
    }
}

/// Load everything, run or check, and return the exit status
fn run(args: &Args) -> Result<i32> {
    let config = load_config(args)?;

    init_logging(&LogConfig::from(&config.logging));

    info!("HostGuard v{}", env!("CARGO_PKG_VERSION"));

    let policy = YamlPolicy::load(config.policy.overrides_path.as_deref().map(Path::new))
        .context("failed to load hardening policy")?;

    let renderer = match &config.templates.dir {
        Some(dir) => {
            info!("Template overrides from: {}", dir);
            TemplateRenderer::with_dir(dir)
        }
        None => TemplateRenderer::new(),
    };

    let packages = package_manager(&config)?;

    let hardener = Hardener::new(Arc::new(policy), Arc::new(renderer), packages)
        .with_categories(config.runner.categories.clone());

    if args.list {
        for name in hardener.categories()? {
            println!("{}", name);
        }
        return Ok(0);
    }

    if args.check {
        let drift = hardener.check_all()?;
        print_drift(&drift, &args.format)?;
        return Ok(if drift.is_aborted() {
            EXIT_ABORTED
        } else if drift.reports.iter().all(DriftReport::is_compliant) {
            0
        } else {
            EXIT_PARTIAL
        });
    }

    match hardener.run_all() {
        Ok(run) => {
            print_reports(&run.reports, &run.aborted, &args.format)?;
            let code = exit_code(&run);
            if code != 0 {
                warn!("Some audits failed or categories were aborted");
            }
            Ok(code)
        }
        Err(aborted) => {
            error!(code = aborted.error.code(), "{}", aborted);
            print_reports(&aborted.reports, &[], &args.format)?;
            print_abort(&aborted, &args.format)?;
            Ok(EXIT_ABORTED)
        }
    }
}

/// Config file, then environment, then command-line flags
fn load_config(args: &Args) -> Result<Config> {
    let config = match &args.config {
        Some(path) => Config::from_file(path)
            .with_context(|| format!("failed to load config from {}", path))?,
        None if Path::new(DEFAULT_CONFIG).exists() => Config::from_file(DEFAULT_CONFIG)
            .with_context(|| format!("failed to load config from {}", DEFAULT_CONFIG))?,
        None => Config::default(),
    };
    let mut config = config.merge_env();

    if let Some(policy) = &args.policy {
        config.policy.overrides_path = Some(policy.clone());
    }
    if let Some(dir) = &args.templates {
        config.templates.dir = Some(dir.clone());
    }
    if !args.categories.is_empty() {
        config.runner.categories = args.categories.clone();
    }
    if let Some(level) = &args.log_level {
        config.logging.level = level.clone();
    }
    if let Some(format) = &args.log_format {
        config.logging.format = format.clone();
    }

    Ok(config)
}

/// Pick the host package manager. With `None` the apt category is aborted
/// at collection time and the other categories still run.
fn package_manager(config: &Config) -> Result<Option<Arc<dyn PackageManager>>> {
    let packages = &config.packages;
    let apt = || -> Arc<dyn PackageManager> {
        let retry = RetryPolicy::fixed(
            packages.lock_retries.max(1),
            Duration::from_millis(packages.lock_backoff_ms),
        );
        Arc::new(Apt::new(&packages.apt_conf_file).with_retry(retry))
    };
    let dnf = || -> Arc<dyn PackageManager> { Arc::new(Dnf::new(&packages.dnf_conf_file)) };

    let manager = match packages.manager.to_ascii_lowercase().as_str() {
        "apt" => Some(apt()),
        "dnf" => Some(dnf()),
        "auto" => {
            if which::which("apt-get").is_ok() {
                Some(apt())
            } else if which::which("dnf").is_ok() {
                Some(dnf())
            } else {
                warn!("No supported package manager found; package audits will abort");
                None
            }
        }
        other => bail!("unknown package manager '{}' (expected auto, apt or dnf)", other),
    };

    if let Some(manager) = &manager {
        debug!("Using package manager: {:?}", manager.kind());
    }
    Ok(manager)
}

fn exit_code(run: &CategoryRun<ComplianceReport>) -> i32 {
    if run.is_aborted() {
        EXIT_ABORTED
    } else if run.reports.iter().all(ComplianceReport::is_success) {
        0
    } else {
        EXIT_PARTIAL
    }
}

fn abort_json(aborted: &[CategoryAbort]) -> serde_json::Value {
    aborted
        .iter()
        .map(|a| {
            serde_json::json!({
                "category": a.category,
                "code": a.error.code(),
                "message": a.error.to_string(),
            })
        })
        .collect()
}

fn print_category_aborts(aborted: &[CategoryAbort]) {
    for abort in aborted {
        println!(
            "\n=== {} ===\n\nAborted ({}): {}",
            abort.category,
            abort.error.code(),
            abort.error
        );
    }
}

fn print_reports(
    reports: &[ComplianceReport],
    aborted: &[CategoryAbort],
    format: &str,
) -> Result<()> {
    match format {
        "json" if aborted.is_empty() => println!("{}", serde_json::to_string_pretty(reports)?),
        "json" => {
            let output = serde_json::json!({
                "reports": reports,
                "aborted_categories": abort_json(aborted),
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        _ => {
            reports.iter().for_each(print_report_text);
            print_category_aborts(aborted);
        }
    }
    Ok(())
}

fn print_report_text(report: &ComplianceReport) {
    println!("\n=== {} ===\n", report.category);

    for entry in &report.entries {
        let status = entry.outcome.as_str().to_uppercase();
        println!("[{}] {}", status, entry.identity);
        if let hostguard_core::Outcome::Failed(reason) = &entry.outcome {
            println!("    Reason: {}", reason);
        }
    }

    let summary = report.summary();
    println!();
    println!("Summary:");
    println!("  Compliant:  {}", summary.compliant);
    println!("  Remediated: {}", summary.remediated);
    println!("  Failed:     {}", summary.failed);
}

fn print_abort(aborted: &Aborted, format: &str) -> Result<()> {
    match format {
        "json" => {
            let output = serde_json::json!({
                "aborted": {
                    "code": aborted.error.code(),
                    "message": aborted.error.to_string(),
                }
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        _ => println!("\nAborted ({}): {}", aborted.error.code(), aborted.error),
    }
    Ok(())
}

fn print_drift(drift: &CategoryRun<DriftReport>, format: &str) -> Result<()> {
    if format == "json" {
        let output = serde_json::json!({
            "reports": drift.reports,
            "aborted_categories": abort_json(&drift.aborted),
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    for report in &drift.reports {
        println!("\n=== {} ===\n", report.category);
        for entry in &report.entries {
            let status = if entry.compliant { "OK" } else { "DRIFT" };
            println!("[{}] {}", status, entry.identity);
            for detail in &entry.details {
                println!("    {}", detail);
            }
            if let Some(error) = &entry.error {
                println!("    Error: {}", error);
            }
        }
    }
    print_category_aborts(&drift.aborted);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use hostguard_core::{AuditIdentity, AuditKind, Outcome};

    fn args(extra: &[&str]) -> Args {
        let mut argv = vec!["hostguard", "--config", "/nonexistent/hostguard.toml"];
        argv.extend_from_slice(extra);
        Args::parse_from(argv)
    }

    #[test]
    fn test_cli_overrides_config() {
        let tmp_dir = tempfile::TempDir::new().unwrap();
        let path = tmp_dir.path().join("hostguard.toml");
        std::fs::write(
            &path,
            "[runner]\ncategories = [\"sysctl\"]\n\n[logging]\nlevel = \"warn\"\n",
        )
        .unwrap();

        let parsed = Args::parse_from([
            "hostguard",
            "--config",
            path.to_str().unwrap(),
            "--category",
            "login",
            "--category",
            "pam",
            "--log-level",
            "debug",
        ]);
        let config = load_config(&parsed).unwrap();
        assert_eq!(config.runner.categories, vec!["login", "pam"]);
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_missing_explicit_config_is_an_error() {
        assert!(load_config(&args(&[])).is_err());
    }

    #[test]
    fn test_explicit_package_manager() {
        let mut config = Config::default();
        config.packages.manager = "dnf".into();
        let manager = package_manager(&config).unwrap().unwrap();
        assert_eq!(manager.kind(), hostguard_audit::PackageManagerKind::Dnf);

        config.packages.manager = "zypper".into();
        assert!(package_manager(&config).is_err());
    }

    #[test]
    fn test_exit_code() {
        let mut ok = ComplianceReport::new("login");
        ok.record(
            AuditIdentity::new(AuditKind::Content, "/etc/login.defs"),
            Outcome::Remediated,
        );
        let mut run = CategoryRun::default();
        run.reports.push(ok);
        assert_eq!(exit_code(&run), 0);

        let mut failed = ComplianceReport::new("sysctl");
        failed.record(
            AuditIdentity::new(
                AuditKind::Content,
                "/etc/sysctl.d/99-hostguard-hardening.conf",
            ),
            Outcome::Failed("permission denied".into()),
        );
        run.reports.push(failed);
        assert_eq!(exit_code(&run), EXIT_PARTIAL);

        run.aborted.push(CategoryAbort::new(
            "apt",
            hostguard_core::Error::Fatal("no supported package manager found".into()),
        ));
        assert_eq!(exit_code(&run), EXIT_ABORTED);
    }
}
