use std::{env, path::PathBuf, time::Duration};

use indicatif::{ProgressBar, ProgressStyle};
use ragdb_cli::{init_tracing, load_config, read_sources};
use ragdb_embed::encoder_from_config;
use ragdb_hybrid::IndexManager;
use tracing::info;

fn usage() -> ! {
    eprintln!("Usage: ragdb-indexer [data_dir] [--config <file>] [--out <snapshot>]");
    eprintln!("data_dir defaults to ingest.source_dir from the configuration");
    std::process::exit(1);
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let args: Vec<String> = env::args().skip(1).collect();
    let (mut data_dir, mut config_file, mut out) = (None, None, None);
    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--config" | "-c" => {
                config_file = Some(PathBuf::from(args.get(i + 1).unwrap_or_else(|| usage())));
                i += 1;
            }
            "--out" | "-o" => {
                out = Some(PathBuf::from(args.get(i + 1).unwrap_or_else(|| usage())));
                i += 1;
            }
            a if !a.starts_with('-') => data_dir = Some(PathBuf::from(a)),
            _ => usage(),
        }
        i += 1;
    }
    let cli = load_config(config_file.as_deref())?;
    let data_dir = data_dir.or(cli.source_dir).unwrap_or_else(|| usage());
    let config = cli.engine;
    let out = out.unwrap_or_else(|| config.index.snapshot_path());

    println!("ragdb indexer\n=============");
    println!("Data directory: {}", data_dir.display());
    println!("Snapshot: {}", out.display());

    let docs = read_sources(&data_dir)?;
    if docs.is_empty() {
        println!("No .txt files found under {}.", data_dir.display());
        return Ok(());
    }
    println!("Read {} source files", docs.len());

    let encoder = encoder_from_config(&config.embedding)?;
    info!(encoder = encoder.id(), dim = encoder.dim(), "encoder ready");
    let manager = IndexManager::new(config, encoder)?;

    let pb = ProgressBar::new_spinner();
    pb.set_style(ProgressStyle::default_spinner().template("{spinner:.green} [{elapsed_precise}] {msg}")?);
    pb.enable_steady_tick(Duration::from_millis(120));
    pb.set_message(format!("chunking and embedding {} sources", docs.len()));
    let report = manager.build_and_persist(docs, &out).await;
    pb.finish_and_clear();
    let report = report?;
    info!(path = %out.display(), chunks = report.chunks, "snapshot saved");

    println!("\nIndexing completed");
    println!("  sources:    {} ({} duplicates skipped)", report.sources, report.duplicates_skipped);
    println!("  chunks:     {}", report.chunks);
    println!("  elapsed:    {:.1}s", report.elapsed.as_secs_f32());
    if let Some(stats) = manager.stats() {
        println!("  vocabulary: {}", stats.vocabulary);
        println!("  encoder:    {} (dim {}, {})", stats.encoder_id, stats.dim, stats.metric);
    }
    println!("\nTo search, use: cargo run --bin ragdb-search '<question>'");
    Ok(())
}
