use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::str::FromStr;
use std::time::Duration;
use threatscan::{
    config::Config,
    output::{format_result_to_string, print_result, OutputFormat},
    scanner::{ScanOptions, ScanOrchestrator},
    threats::{load_threats, LoadedThreats},
};
use tracing::warn;
use tracing_subscriber::EnvFilter;

/// Exit codes for CI integration
mod exit_codes {
    pub const SUCCESS: u8 = 0;
    pub const ERROR: u8 = 1;
    pub const THREAT_DETECTED: u8 = 2;
}

#[derive(Parser)]
#[command(name = "threatscan")]
#[command(
    author,
    version,
    about = "Detect known supply-chain threats in JavaScript project trees"
)]
struct Cli {
    /// Debug logging; also consults global package caches
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scan project directories against threat definitions
    Scan {
        /// Directories to scan
        #[arg(default_value = ".")]
        paths: Vec<PathBuf>,

        /// Threat definitions directory or single definition file
        #[arg(long)]
        threats: Option<PathBuf>,

        /// Only check these threat ids (repeatable)
        #[arg(long = "threat")]
        threat_ids: Vec<String>,

        /// Also search global npm, yarn and pnpm caches
        #[arg(long)]
        check_global_cache: bool,

        /// Output format (table, json)
        #[arg(short, long)]
        format: Option<String>,

        /// Write JSON output to file
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Check threats one after another
        #[arg(long)]
        no_parallel: bool,
    },

    /// List loadable threat definitions
    ListThreats {
        /// Threat definitions directory or single definition file
        #[arg(long)]
        threats: Option<PathBuf>,
    },

    /// Show or create config file
    Config {
        /// Generate default config file
        #[arg(long)]
        init: bool,

        /// Show config file path
        #[arg(long)]
        path: bool,
    },
}

struct ScanArgs {
    paths: Vec<PathBuf>,
    threats: Option<PathBuf>,
    threat_ids: Vec<String>,
    check_global_cache: bool,
    verbose: bool,
    format: String,
    output: Option<PathBuf>,
    parallel: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::from(exit_codes::ERROR)
        }
    }
}

async fn run() -> Result<u8> {
    let cli = Cli::parse();
    let (config, config_error) = match Config::load() {
        Ok(config) => (config, None),
        Err(e) => (Config::default(), Some(e)),
    };
    init_tracing(cli.verbose, &config);
    if let Some(e) = config_error {
        warn!(error = %format!("{:#}", e), "using default configuration");
    }

    match cli.command {
        Commands::Scan {
            paths,
            threats,
            threat_ids,
            check_global_cache,
            format,
            output,
            no_parallel,
        } => {
            let args = ScanArgs {
                paths,
                threats,
                threat_ids,
                check_global_cache,
                verbose: cli.verbose,
                format: format.unwrap_or_else(|| config.default_format.clone()),
                output,
                parallel: !no_parallel,
            };
            run_scan(args, &config).await
        }
        Commands::ListThreats { threats } => {
            list_threats(&config.threats_path(threats.as_deref()))?;
            Ok(exit_codes::SUCCESS)
        }
        Commands::Config { init, path } => {
            handle_config(init, path)?;
            Ok(exit_codes::SUCCESS)
        }
    }
}

/// `RUST_LOG` wins, then `--verbose`, then the configured level.
fn init_tracing(verbose: bool, config: &Config) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(if verbose { "debug" } else { config.log_level.as_str() })
    });
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

async fn run_scan(args: ScanArgs, config: &Config) -> Result<u8> {
    let format = OutputFormat::from_str(&args.format).map_err(|e| anyhow::anyhow!(e))?;
    let is_interactive = format == OutputFormat::Table && args.output.is_none();

    for path in &args.paths {
        if !path.is_dir() {
            bail!("scan path is not a directory: {}", path.display());
        }
    }

    let threats_path = config.threats_path(args.threats.as_deref());
    let mut loaded = load_threats(&threats_path)?;
    loaded.retain_ids(&args.threat_ids);
    loaded
        .threats
        .retain(|threat| !config.ignore.should_ignore_threat(&threat.id));

    if !args.threat_ids.is_empty() && loaded.threats.is_empty() {
        bail!("no threat definition matches: {}", args.threat_ids.join(", "));
    }
    if loaded.threats.is_empty() {
        warn!(path = %threats_path.display(), "no threat definitions loaded");
    }

    let options = ScanOptions {
        check_global_cache: args.check_global_cache || config.check_global_cache,
        verbose: args.verbose,
        parallel: args.parallel,
        command_timeout: config.command_timeout(),
        ignore_packages: config.ignore.packages.clone(),
    };
    let orchestrator = ScanOrchestrator::new(options);

    let progress = if is_interactive {
        Some(spinner(format!(
            "Checking {} threat(s) in {} path(s)...",
            loaded.threats.len(),
            args.paths.len()
        ))?)
    } else {
        None
    };

    let errors = loaded.errors.iter().map(ToString::to_string).collect();
    let report = orchestrator
        .scan(&loaded.threats, &args.paths)
        .await
        .with_errors(errors);

    if let Some(pb) = progress {
        pb.finish_with_message(format!(
            "Checked {} threat(s), {} detected",
            report.outcomes.len(),
            report.triggered().count()
        ));
    }

    if let Some(path) = &args.output {
        let content = format_result_to_string(&report, format)?;
        std::fs::write(path, content)?;
        if format == OutputFormat::Table {
            println!("Results written to: {}", path.display());
        }
    } else {
        print_result(&report, format)?;
    }

    if report.triggered().next().is_some() {
        Ok(exit_codes::THREAT_DETECTED)
    } else {
        Ok(exit_codes::SUCCESS)
    }
}

fn spinner(message: String) -> Result<ProgressBar> {
    let pb = ProgressBar::new_spinner();
    pb.set_style(ProgressStyle::default_spinner().template("{spinner:.green} {msg}")?);
    pb.enable_steady_tick(Duration::from_millis(100));
    pb.set_message(message);
    Ok(pb)
}

fn list_threats(path: &Path) -> Result<()> {
    let LoadedThreats { threats, errors } = load_threats(path)?;

    println!("Threat definitions in {}:", path.display());
    println!();

    if threats.is_empty() {
        println!("  (none)");
    }
    for threat in &threats {
        println!("  {:<28} {}", threat.id, threat.display_name());
        let mut details = vec![
            format!("{} package rule(s)", threat.package_rules.len()),
            format!("{} tool rule(s)", threat.tool_rules.len()),
        ];
        if let Some(cve) = &threat.cve {
            details.push(cve.clone());
        }
        if threat.check_global_cache {
            details.push("global cache".to_string());
        }
        println!("  {:<28} {}", "", details.join(", "));
    }

    if !errors.is_empty() {
        println!();
        println!("Skipped ({}):", errors.len());
        for error in &errors {
            println!("  - {}", error);
        }
    }

    Ok(())
}

fn handle_config(init: bool, show_path: bool) -> Result<()> {
    let config_path = Config::config_path();

    if show_path {
        println!("{}", config_path.display());
        return Ok(());
    }

    if init {
        if config_path.exists() {
            println!("Config file already exists at: {}", config_path.display());
            return Ok(());
        }

        let config = Config::default();
        config.save()?;
        println!("Created config file at: {}", config_path.display());
        println!();
        println!("Default configuration:");
        println!("{}", Config::generate_default_config());
        return Ok(());
    }

    if config_path.exists() {
        let content = std::fs::read_to_string(&config_path)?;
        println!("Config file: {}", config_path.display());
        println!();
        println!("{}", content);
    } else {
        println!("No config file found.");
        println!("Run 'threatscan config --init' to create one.");
        println!();
        println!("Config path: {}", config_path.display());
    }

    Ok(())
}
