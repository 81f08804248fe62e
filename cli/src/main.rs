//! chainclient CLI: query nodes, invoke and deploy contracts.
//!
//! # Commands
//! ```text
//! chainclient call         --method eth_blockNumber [--params '[...]']
//! chainclient gas-price
//! chainclient balance      --address <addr> [--block latest]
//! chainclient block        [--number <n>] [--full]
//! chainclient invoke       --abi <path.abi> --address <addr> --method <name> [--args 'a^[b,c]']
//! chainclient deploy       --source <a.sol,b.sol> [--args 'a^b'] [--local] [--abi-dir <dir>]
//! chainclient batch-invoke --abi <path.abi> --address <addr> --method <name> --count <n>
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use chainclient::{ClientConfig, EthClient};

mod cmd_contract;
mod cmd_query;
mod logging;

#[derive(Parser)]
#[command(
    name = "chainclient",
    about = "Pooled Ethereum JSON-RPC client: ChainClient CLI",
    long_about = "
ChainClient CLI: query nodes, invoke and deploy contracts over a pool of
interchangeable JSON-RPC endpoints with automatic failover.

Settings come from the TOML file given with --config; --endpoint and
--private-key override it.

ENVIRONMENT VARIABLES:
  RUST_LOG    tracing filter, overrides --log-level
",
    version
)]
struct Cli {
    /// TOML configuration file
    #[arg(short, long, global = true)]
    config: Option<String>,

    /// Endpoint URL (repeatable, replaces the configured list)
    #[arg(long = "endpoint", global = true)]
    endpoints: Vec<String>,

    /// Hex private key of the sending account
    #[arg(long, global = true, env = "CHAINCLIENT_PRIVATE_KEY", hide_env_values = true)]
    private_key: Option<String>,

    /// Log level: trace | debug | info | warn | error
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,

    /// Emit JSON logs
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Send a raw JSON-RPC call
    Call {
        #[arg(long)]
        method: String,
        /// JSON array of parameters
        #[arg(long, default_value = "[]")]
        params: String,
    },

    /// Print the current gas price in wei
    #[command(name = "gas-price")]
    GasPrice,

    /// Print the balance of an account in wei
    Balance {
        #[arg(long)]
        address: String,
        /// latest | pending | earliest | <number>
        #[arg(long, default_value = "latest")]
        block: String,
    },

    /// Print a block (latest when no number is given)
    Block {
        #[arg(long)]
        number: Option<u64>,
        /// Include full transaction objects
        #[arg(long)]
        full: bool,
    },

    /// Call a contract method; read-only methods print their outputs,
    /// others print the transaction hash
    Invoke {
        /// Path to the ABI JSON file
        #[arg(long)]
        abi: String,
        #[arg(long)]
        address: String,
        #[arg(long)]
        method: String,
        /// Arguments separated by '^', lists as [a,b,c]
        #[arg(long, default_value = "")]
        args: String,
        /// Wait for the receipt of a transaction
        #[arg(long)]
        wait: bool,
    },

    /// Compile and deploy every contract of the given sources
    Deploy {
        /// Comma-separated source files, or source text with --remote
        #[arg(long)]
        source: String,
        /// Constructor arguments separated by '^'
        #[arg(long, default_value = "")]
        args: String,
        /// Compile with the node's compiler instead of a local solc
        #[arg(long)]
        remote: bool,
        /// Write <Name>.abi files into this directory
        #[arg(long)]
        abi_dir: Option<String>,
    },

    /// Send the same state-changing call many times concurrently
    #[command(name = "batch-invoke")]
    BatchInvoke {
        #[arg(long)]
        abi: String,
        #[arg(long)]
        address: String,
        #[arg(long)]
        method: String,
        #[arg(long, default_value = "")]
        args: String,
        #[arg(long, default_value_t = 10)]
        count: usize,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init_tracing(&logging::LogConfig {
        level: cli.log_level.clone(),
        json: cli.json_logs,
        ..Default::default()
    });

    let config = load_config(&cli)?;
    let client = EthClient::connect(&config)
        .await
        .context("failed to set up the client")?;

    let result = match cli.command {
        Commands::Call { method, params } => cmd_query::call(&client, &method, &params).await,
        Commands::GasPrice => cmd_query::gas_price(&client).await,
        Commands::Balance { address, block } => cmd_query::balance(&client, &address, &block).await,
        Commands::Block { number, full } => cmd_query::block(&client, number, full).await,
        Commands::Invoke {
            abi,
            address,
            method,
            args,
            wait,
        } => cmd_contract::invoke(&client, &abi, &address, &method, &args, wait).await,
        Commands::Deploy {
            source,
            args,
            remote,
            abi_dir,
        } => cmd_contract::deploy(&client, &source, &args, !remote, abi_dir.as_deref()).await,
        Commands::BatchInvoke {
            abi,
            address,
            method,
            args,
            count,
        } => cmd_contract::batch_invoke(&client, &abi, &address, &method, &args, count).await,
    };

    client.close().await;
    result
}

fn load_config(cli: &Cli) -> Result<ClientConfig> {
    let mut config = match &cli.config {
        Some(path) => ClientConfig::from_file(path).with_context(|| format!("loading {path}"))?,
        None => ClientConfig::default(),
    };
    if !cli.endpoints.is_empty() {
        config = config.with_endpoints(cli.endpoints.iter().cloned());
    }
    if let Some(key) = &cli.private_key {
        config = config.with_private_key(key.clone());
    }
    Ok(config)
}
