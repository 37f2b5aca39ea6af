//! gatekeep: run the visitor gates from a terminal.
//!
//! `check` evaluates the automation and country gates against the live
//! lookup providers for a described browser; `providers` lists the lookup
//! chains.

mod commands;
mod config;

use clap::{Args, Parser, Subcommand, ValueEnum};
use gatekeep_client::GateSelection;
use tracing::error;

/// Exit status when at least one gate blocked the visitor.
const EXIT_BLOCKED: i32 = 2;

/// gatekeep: visitor screening gates
#[derive(Parser)]
#[command(name = "gatekeep", version, about = "Visitor screening gates: automation and country checks")]
struct Cli {
    /// Config file path
    #[arg(long = "config", global = true, default_value = config::DEFAULT_CONFIG_PATH)]
    config: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Evaluate the gates and print their reports as JSON
    Check(CheckArgs),

    /// List the lookup provider chains
    Providers {
        /// ipinfo token (defaults to the config file's)
        #[arg(long)]
        token: Option<String>,
    },
}

#[derive(Args)]
struct CheckArgs {
    /// Which gates to run
    #[arg(long, value_enum, default_value_t = GateArg::Both)]
    gate: GateArg,

    /// Visitor user agent (empty string = none sent)
    #[arg(long)]
    user_agent: Option<String>,

    /// Visitor has cookies disabled
    #[arg(long)]
    no_cookies: bool,

    /// Visitor has no localStorage
    #[arg(long)]
    no_local_storage: bool,

    /// Visitor has no sessionStorage
    #[arg(long)]
    no_session_storage: bool,

    /// Visitor cannot render to a canvas
    #[arg(long)]
    no_canvas: bool,

    /// Per-lookup timeout in seconds
    #[arg(long)]
    timeout_secs: Option<u64>,
}

#[derive(Clone, Copy, ValueEnum)]
enum GateArg {
    Automation,
    Country,
    Both,
}

impl From<GateArg> for GateSelection {
    fn from(arg: GateArg) -> Self {
        match arg {
            GateArg::Automation => GateSelection::Automation,
            GateArg::Country => GateSelection::Country,
            GateArg::Both => GateSelection::Both,
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Initialize tracing on stderr; stdout is reserved for reports.
    use tracing_subscriber::EnvFilter;
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let result = run(cli).await;

    match result {
        Ok(0) => {}
        Ok(code) => std::process::exit(code),
        Err(e) => {
            error!("{:#}", e);
            eprintln!("gatekeep: {e:#}");
            std::process::exit(1);
        }
    }
}

/// Dispatch a subcommand. Returns the process exit status.
async fn run(cli: Cli) -> anyhow::Result<i32> {
    let cfg = config::Config::load(&cli.config)?;

    match cli.command {
        Command::Check(args) => {
            let mut http = cfg.http;
            if let Some(secs) = args.timeout_secs {
                http.timeout_secs = secs;
            }
            let user_agent = args
                .user_agent
                .unwrap_or_else(|| commands::check::DEFAULT_USER_AGENT.to_string());
            let disabled = commands::check::Disabled {
                cookies: args.no_cookies,
                local_storage: args.no_local_storage,
                session_storage: args.no_session_storage,
                canvas: args.no_canvas,
            };
            let env = commands::check::environment(&user_agent, &disabled);
            let allowed = commands::check::run(cfg.gate, &http, args.gate.into(), env).await?;
            Ok(if allowed { 0 } else { EXIT_BLOCKED })
        }
        Command::Providers { token } => {
            let token = token.unwrap_or(cfg.gate.ipinfo_token);
            commands::providers::run(&token)?;
            Ok(0)
        }
    }
}
