mod debug_report;

use clap::{Args, Parser, Subcommand, ValueEnum};
use mimic::config::{BotConfig, CONFIG_ENV, ConfigSource};
use mimic::{Endpoint, Engine, SeededRandom};
use std::io::{self, IsTerminal};
use std::net::{Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Rule-driven mock of OpenAI-style chat and responses APIs.
///
/// Exit codes: 0 success, 1 internal error, 2 invalid arguments or configuration.
#[derive(Debug, Parser)]
#[command(name = "mimic", version, about)]
struct Cli {
    /// YAML configuration; falls back to ./bot.yaml, then the built-in default.
    #[arg(long, short, global = true, env = CONFIG_ENV)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Serve the HTTP API (default).
    Serve {
        /// Overrides `server.port`.
        #[arg(long, short)]
        port: Option<u16>,
    },
    /// Print the loaded rule table.
    Check(ColorArgs),
    /// Resolve one message without serving it.
    Explain(ExplainArgs),
}

#[derive(Debug, Args)]
struct ColorArgs {
    /// Force ANSI color output.
    #[arg(long, conflicts_with = "no_color")]
    color: bool,
    /// Disable ANSI color output.
    #[arg(long)]
    no_color: bool,
}

impl ColorArgs {
    fn enabled(&self) -> bool {
        if self.color {
            return true;
        }
        !self.no_color && io::stdout().is_terminal()
    }
}

#[derive(Debug, Args)]
struct ExplainArgs {
    #[arg(long, value_enum, default_value_t = Surface::Chat)]
    endpoint: Surface,
    #[arg(long, default_value = "gpt-4o")]
    model: String,
    /// Seed the random source for reproducible choices and gates.
    #[arg(long)]
    seed: Option<u64>,
    #[command(flatten)]
    color: ColorArgs,
    /// Message text.
    #[arg(required = true, trailing_var_arg = true)]
    text: Vec<String>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Surface {
    Chat,
    Responses,
}

impl From<Surface> for Endpoint {
    fn from(surface: Surface) -> Self {
        match surface {
            Surface::Chat => Endpoint::Chat,
            Surface::Responses => Endpoint::Responses,
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            let _ = err.print();
            return if err.use_stderr() { ExitCode::from(2) } else { ExitCode::SUCCESS };
        }
    };

    init_tracing();

    let (config, source) = match BotConfig::load_or_builtin(cli.config.as_deref()) {
        Ok(loaded) => loaded,
        Err(err) => {
            eprintln!("error: {err}");
            return ExitCode::from(2);
        }
    };
    match &source {
        ConfigSource::File(path) => tracing::info!(path = %path.display(), rules = config.rules.len(), "loaded config"),
        ConfigSource::Builtin => tracing::info!("no config file found, using built-in default"),
    }

    match cli.command.unwrap_or(Command::Serve { port: None }) {
        Command::Serve { port } => {
            let addr = SocketAddr::from((Ipv4Addr::UNSPECIFIED, port.unwrap_or_else(|| config.port())));
            match mimic::server::serve(Engine::new(config), addr).await {
                Ok(()) => ExitCode::SUCCESS,
                Err(err) => {
                    tracing::error!(error = %err, "server stopped");
                    ExitCode::from(1)
                }
            }
        }
        Command::Check(color) => {
            debug_report::print_rules(&Engine::new(config), &source, color.enabled());
            ExitCode::SUCCESS
        }
        Command::Explain(args) => {
            let engine = match args.seed {
                Some(seed) => Engine::with_random(config, Arc::new(SeededRandom::new(seed))),
                None => Engine::new(config),
            };
            let explanation = engine.explain(args.endpoint.into(), &args.model, &args.text.join(" "));
            debug_report::print_explanation(&explanation, args.color.enabled());
            ExitCode::SUCCESS
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("mimic=info"));
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(io::stderr).init();
}
