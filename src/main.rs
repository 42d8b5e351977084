#![cfg(not(tarpaulin_include))]

use databoard::app;
use databoard::config::Config;
use databoard::store::MemoryCanvasStore;
use std::env;

/// Development backend for the canvas editor
///
/// Serves the canvas REST API from memory, so the editor can be run without a database.
/// Canvases are lost when the process exits.
///
/// # Arguments
/// * `--seed <owner>` - Optionally creates an empty "Untitled canvas" for `owner` at startup
///
/// # Environment
/// * `DATABOARD_BIND` - Listen address (default `127.0.0.1:3001`)
/// * `RUST_LOG` - Log filter for env_logger
///
/// # Returns
/// * `Result<(), Box<dyn std::error::Error>>` - Success or error object
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = Config::from_env();
    let store = MemoryCanvasStore::new();

    let args: Vec<String> = env::args().collect();
    if args.len() >= 3 && args[1] == "--seed" {
        let canvas = store.create(&args[2], "Untitled canvas");
        println!("Seeded canvas {} for {}", canvas.id, canvas.owner);
    }

    app::run(&config, store).await
}
