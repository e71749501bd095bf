mod app;
mod cli;
mod config;
mod danmaku;
mod db;
mod http;
mod logging;
mod paths;
mod schema;
mod vod;

use anyhow::Result;
use clap::Parser;

fn main() -> Result<()> {
    let cli = cli::Cli::parse();
    app::run(cli)
}
