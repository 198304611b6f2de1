// TDB - Time-travel Debugger
// Copyright (C) 2024 Zhuo Zhang and Wuqi Zhang
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! TDB - Time-travel Debugger
//!
//! A command console for navigating the pauses of a recorded execution.

use std::{path::PathBuf, sync::Arc};

use clap::Parser;
use eyre::{Context, Result};
use tracing::info;

use tdb::{Config, Console, RpcTransport};
use tdb_common::logging;
use tdb_engine::Debugger;

/// Command-line interface for TDB
#[derive(Debug, Parser)]
#[command(name = "tdb")]
#[command(about = "Time-travel Debugger - navigate the pauses of a recorded execution")]
#[command(version)]
pub struct Cli {
    /// Replay server endpoint (overrides the config file)
    #[arg(long, env = "TDB_RPC_URL")]
    pub rpc_url: Option<String>,

    /// Config file path (uses ~/.tdb.toml if not specified)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Request timeout in seconds (overrides the config file)
    #[arg(long)]
    pub timeout: Option<u64>,

    /// Only log to the terminal
    #[arg(long)]
    pub no_file_log: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables
    dotenv::dotenv().ok();

    // Parse CLI arguments
    let cli = Cli::parse();

    let _guard = logging::init_logging("tdb", !cli.no_file_log)?;

    let mut config = match &cli.config {
        Some(path) => Config::load_from_path(path)?,
        None => Config::load()?,
    };
    if let Some(rpc_url) = cli.rpc_url {
        config.rpc_url = rpc_url;
    }
    if let Some(timeout) = cli.timeout {
        config.request_timeout_secs = timeout;
    }

    info!("Using replay server: {}", config.rpc_url);
    let transport = Arc::new(RpcTransport::new(&config.rpc_url, config.request_timeout())?);

    let regions = transport
        .loaded_regions()
        .await
        .wrap_err_with(|| format!("Failed to reach replay server at {}", config.rpc_url))?;

    let debugger = Debugger::new(transport, config.engine.clone());
    debugger.load_recording(regions)?;

    println!("Connected to {}. Type 'help' for commands.", config.rpc_url);
    Console::new(debugger).run(tokio::io::stdin()).await?;

    info!("Shutting down TDB...");
    Ok(())
}
