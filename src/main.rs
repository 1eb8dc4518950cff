//! devbridge CLI - runs Lua scripts against simulated SAUL devices and the
//! host UDP stack.
//!
//! This is the main binary entry point. See the `devbridge` library for the
//! core functionality.

use std::io;
use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use devbridge::lua::repl;
use devbridge::saul::class;
use devbridge::{Config, LuaRuntime};
use mimalloc::MiMalloc;

/// Global allocator configured per M-MIMALLOC-APPS guideline.
#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

// CLI
#[derive(Parser)]
#[command(name = "devbridge")]
#[command(version)]
#[command(about = "Lua scripting for SAUL devices and UDP sockets")]
struct Cli {
    /// Config file (default: $DEVBRIDGE_CONFIG_DIR/config.json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Propagate script errors instead of logging them
    #[arg(long, global = true)]
    strict: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a Lua script file
    Run {
        /// Path to the script (relative paths also search script_dir)
        script: PathBuf,
    },
    /// Execute a Lua chunk given on the command line
    Exec {
        /// Lua source
        chunk: String,
    },
    /// Interactive Lua shell
    Repl,
    /// List every known device class name
    Types,
    /// Print the effective configuration
    Config,
}

fn load_config(cli: &Cli) -> Result<Config> {
    let mut config = match &cli.config {
        Some(path) => {
            let mut config = Config::load_from_path(path)?;
            config.apply_env_overrides();
            config
        }
        None => Config::load()?,
    };
    if cli.strict {
        config.strict = true;
    }
    Ok(config)
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_secs()
        .init();

    let cli = Cli::parse();
    let config = load_config(&cli)?;

    match cli.command {
        Commands::Run { script } => {
            let runtime = LuaRuntime::from_config(&config)?;
            runtime.load_file(&script)?;
        }
        Commands::Exec { chunk } => {
            let runtime = LuaRuntime::from_config(&config)?;
            runtime.load_string("=exec", &chunk)?;
        }
        Commands::Repl => {
            let runtime = LuaRuntime::from_config(&config)?;
            repl::run(&runtime, io::stdin().lock(), io::stdout())?;
        }
        Commands::Types => {
            for name in class::names() {
                println!("{name}");
            }
        }
        Commands::Config => {
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
    }

    Ok(())
}
