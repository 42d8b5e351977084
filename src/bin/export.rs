#![cfg(not(tarpaulin_include))]

use chrono::Utc;
use databoard::codec;
use databoard::config::Config;
use databoard::export::{self, ExportFormat};
use databoard::store::{CanvasStore, HttpCanvasStore};
use std::env;
use std::path::PathBuf;

/// Command-line canvas exporter
///
/// Writes a canvas as PNG, PDF or JSON without opening the editor.
///
/// # Usage
/// * `databoard-export <file.json> <png|pdf|json> [out_dir]` - Export a saved document file
/// * `databoard-export <owner>/<id> <png|pdf|json> [out_dir]` - Fetch the canvas from the
///   backend at `DATABOARD_API_URL` first
///
/// # Returns
/// * `Result<(), Box<dyn std::error::Error>>` - Success or error object
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let args: Vec<String> = env::args().collect();
    if args.len() < 3 {
        eprintln!("Usage: {} <file.json|owner/id> <png|pdf|json> [out_dir]", args[0]);
        return Ok(());
    }

    let Some(format) = ExportFormat::from_extension(&args[2]) else {
        eprintln!("Error: unknown format {:?}, expected png, pdf or json", args[2]);
        return Ok(());
    };
    let out_dir = args.get(3).map(PathBuf::from).unwrap_or_else(|| PathBuf::from("."));

    let source = PathBuf::from(&args[1]);
    let (name, document) = if source.exists() {
        let name = source
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "canvas".to_string());
        (name, codec::load_document(&source)?)
    } else if let Some((owner, id)) = args[1].split_once('/') {
        let config = Config::from_env();
        let store = HttpCanvasStore::new(&config.api_url);
        let record = store.load(owner, id).await?;
        (record.name, codec::decode(&record.script)?)
    } else {
        eprintln!("Error: {} is neither a file nor <owner>/<id>", args[1]);
        return Ok(());
    };

    let mut camera = document.viewport.unwrap_or_default();
    let file = export::export(&document, &mut camera, format, &name, Utc::now())?;
    let path = out_dir.join(&file.file_name);
    std::fs::write(&path, &file.bytes)?;
    println!("Wrote {} ({} bytes)", path.display(), file.bytes.len());

    Ok(())
}
