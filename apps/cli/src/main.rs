//! pokefetch CLI - bulk fetch, enrich and cache records from a remote API.
//!
//! `fetch` pulls an ID range into the record store, `refresh` enriches the
//! stored records into the cache, `list` prints what the cache holds.

mod commands;

use clap::Parser;
use color_eyre::eyre::Result;

use commands::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    commands::init_tracing(&cli);
    commands::run(cli).await
}
