use clap::{Arg, ArgAction, Command};
use gateway_emulator::config;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info};

fn validate_port_value(value: &str) -> Result<u16, String> {
    value.parse::<u16>().map_err(|_| "Invalid port number".to_owned())
}

#[tokio::main]
async fn main() -> ExitCode {
    let matches = Command::new("gateway-emulator")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Local emulator of a managed cloud WebSocket gateway")
        .arg(
            Arg::new("config")
                .help("Path to the YAML config file")
                .short('c')
                .long("config")
                .default_value("./config.yaml"),
        )
        .arg(
            Arg::new("port")
                .help("Override the port set in the config file")
                .short('p')
                .long("port")
                .value_parser(validate_port_value),
        )
        .arg(
            Arg::new("verbose")
                .help("Enable verbose (debug-level) logging; overrides the config file's setting")
                .short('v')
                .long("verbose")
                .action(ArgAction::SetTrue),
        )
        .get_matches();

    let config_path = PathBuf::from(matches.get_one::<String>("config").expect("config is required"));

    let mut config = match config::load_config_from_path(&config_path) {
        Ok(config) => config,
        Err(e) => {
            init_logging(false);
            error!(error = %e, "failed to load config");
            return ExitCode::FAILURE;
        }
    };

    if let Some(port) = matches.get_one::<u16>("port") {
        config.port = *port;
    }
    if matches.get_flag("verbose") {
        config.verbose = true;
    }

    init_logging(config.verbose);
    info!(version = env!("CARGO_PKG_VERSION"), "gateway emulator starting");

    if let Err(e) = gateway_emulator::run(config).await {
        error!(error = %e, "gateway emulator exited with error");
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .init();
}
