//! Command-line interface parsing and handling
//!
//! The binary is the reference rendering/input collaborator for the core: a
//! TUI-less one-shot send that prints fragments as they arrive, plus a model
//! listing command.

pub mod model_list;
pub mod say;

use std::error::Error;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use crate::cli::model_list::list_models;
use crate::cli::say::run_say;
use crate::core::config::Config;

#[derive(Parser)]
#[command(name = "quorum")]
#[command(about = "A chat client that routes prompts across hosted AI models")]
#[command(
    long_about = "Quorum sends prompts to hosted AI models through a single gateway and \
streams the responses. Besides picking a model directly, three routing modes \
are available:\n\
  auto      Pick the model heuristically from the prompt text\n\
  compare   Fan the prompt out across the flagship roster, one answer each\n\
  council   Fan out, then have a judge model synthesize a single answer\n\n\
Environment Variables:\n\
  QUORUM_API_KEY    Gateway API key (optional; overrides the config file)"
)]
#[command(arg_required_else_help = true)]
pub struct Args {
    #[command(subcommand)]
    pub command: Commands,

    /// Model id or routing mode (auto, compare, council)
    #[arg(short = 'm', long, global = true, value_name = "MODEL")]
    pub model: Option<String>,

    /// Skip the live model-listing refresh and use built-in models only
    #[arg(long, global = true)]
    pub offline: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Send one prompt and stream the response
    Say {
        /// The prompt to send
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        prompt: Vec<String>,
    },
    /// List the models the gateway currently offers
    Models,
}

pub fn main() -> Result<(), Box<dyn Error>> {
    tokio::runtime::Runtime::new()?.block_on(async_main())
}

async fn async_main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let config = Config::load()?;

    match args.command {
        Commands::Say { prompt } => run_say(prompt, args.model, args.offline, &config).await,
        Commands::Models => list_models(&config, args.offline).await,
    }
}
