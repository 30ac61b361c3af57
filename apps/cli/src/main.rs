//! Blogsmith CLI: turn a website URL into a researched, SEO-edited blog post.
//!
//! Runs the ten-stage pipeline from the terminal or behind a small HTTP API.

mod commands;
mod server;

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
