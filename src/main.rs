use anyhow::{bail, Context, Result};
use procscope::config::{validate_config, ConfigLoader};
use procscope::InfoRequest;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

const USAGE: &str = "usage: procscope [PID] [--modules] [--fast-groups] [--config PATH]";

/// Parsed command line
#[derive(Debug, Default)]
struct Args {
    pid: Option<u32>,
    modules: bool,
    fast_groups: bool,
    config: Option<PathBuf>,
}

fn parse_args(mut args: impl Iterator<Item = String>) -> Result<Args> {
    let mut parsed = Args::default();
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--modules" => parsed.modules = true,
            "--fast-groups" => parsed.fast_groups = true,
            "--config" => {
                let path = args.next().context("--config needs a path")?;
                parsed.config = Some(PathBuf::from(path));
            }
            "-h" | "--help" => bail!(USAGE),
            other => {
                if parsed.pid.is_some() {
                    bail!("unexpected argument '{}'\n{}", other, USAGE);
                }
                let pid = other
                    .parse()
                    .with_context(|| format!("'{}' is not a process id\n{}", other, USAGE))?;
                parsed.pid = Some(pid);
            }
        }
    }
    Ok(parsed)
}

fn main() -> Result<()> {
    let args = parse_args(std::env::args().skip(1))?;

    let loader = ConfigLoader::new(
        args.config
            .clone()
            .unwrap_or_else(|| PathBuf::from("procscope.toml")),
    );
    let config = if args.config.is_some() {
        loader
            .load()
            .with_context(|| format!("loading {}", loader.path().display()))?
    } else {
        loader.load_or_default()
    };
    validate_config(&config)?;

    // Initialize logging; RUST_LOG wins over the configured level
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    info!("procscope v{}", env!("CARGO_PKG_VERSION"));

    let mut request = config
        .inspector
        .apply(InfoRequest::default())
        .with_modules(args.modules);
    if args.fast_groups {
        request = request.with_group_names(false);
    }

    run(&args, &config, &request)
}

#[cfg(windows)]
fn run(args: &Args, config: &procscope::config::Config, request: &InfoRequest) -> Result<()> {
    use procscope::{Aggregator, WindowsProbe};

    let aggregator = Aggregator::with_options(
        WindowsProbe::new(config.snapshot.limits()),
        config.inspector.aggregator_options(),
    );

    let json = match args.pid {
        Some(pid) => serde_json::to_string_pretty(&aggregator.get_process(pid, request))?,
        None => {
            let processes = aggregator.get_all_processes(request)?;
            info!("collected {} processes", processes.len());
            serde_json::to_string_pretty(&processes)?
        }
    };
    println!("{}", json);
    Ok(())
}

#[cfg(not(windows))]
fn run(_args: &Args, _config: &procscope::config::Config, _request: &InfoRequest) -> Result<()> {
    bail!("procscope only supports the Windows platform");
}
