use std::{env, path::PathBuf, sync::Arc};

use ragdb_cli::{init_tracing, load_config};
use ragdb_embed::encoder_from_config;
use ragdb_hybrid::{IndexManager, PipelineOptions, RagPipeline};
use tracing::info;

fn usage() -> ! {
    eprintln!("Usage: ragdb-search <question> [-k <n>] [--keyword] [--config <file>] [--snapshot <file>]");
    eprintln!("Example: ragdb-search 'What is dynamic typing?' -k 3");
    std::process::exit(1);
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let args: Vec<String> = env::args().skip(1).collect();
    let (mut question, mut k, mut keyword_only) = (None, None, false);
    let (mut config_file, mut snapshot) = (None, None);
    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "-k" => {
                let n = args.get(i + 1).and_then(|s| s.parse::<usize>().ok()).unwrap_or_else(|| usage());
                k = Some(n);
                i += 1;
            }
            "--keyword" => keyword_only = true,
            "--config" | "-c" => {
                config_file = Some(PathBuf::from(args.get(i + 1).unwrap_or_else(|| usage())));
                i += 1;
            }
            "--snapshot" => {
                snapshot = Some(PathBuf::from(args.get(i + 1).unwrap_or_else(|| usage())));
                i += 1;
            }
            a if !a.starts_with('-') => question = Some(a.to_string()),
            _ => usage(),
        }
        i += 1;
    }
    let question = question.unwrap_or_else(|| usage());
    let config = load_config(config_file.as_deref())?.engine;
    let snapshot = snapshot.unwrap_or_else(|| config.index.snapshot_path());
    let k = k.unwrap_or(config.search.top_k);
    let options = PipelineOptions::from(&config.search);

    let encoder = encoder_from_config(&config.embedding)?;
    let manager = IndexManager::new(config, encoder)?;
    if !manager.load_if_present(&snapshot)? {
        anyhow::bail!("no snapshot at {}; run ragdb-indexer first", snapshot.display());
    }
    if let Some(stats) = manager.stats() {
        info!(chunks = stats.chunks, sources = stats.sources, encoder = %stats.encoder_id, "snapshot ready");
    }
    let pipeline = RagPipeline::new(Arc::new(manager), options);

    let evidence = if keyword_only {
        pipeline.answer_query_keyword(&question, k).await?
    } else {
        pipeline.answer_query(&question, k).await?
    };

    info!(passages = evidence.passages.len(), keyword_only, "query answered");
    println!("Question: {}", evidence.question);
    println!("Found {} passages\n", evidence.passages.len());
    for (i, p) in evidence.passages.iter().enumerate() {
        let fmt = |s: Option<f32>| s.map_or_else(|| "-".to_string(), |v| format!("{v:.4}"));
        println!(
            "  {}. score={:.4}  vector={}  keyword={}  id={}",
            i + 1,
            p.score,
            fmt(p.vector_score),
            fmt(p.keyword_score),
            p.chunk.id
        );
    }
    println!("\n{}", evidence.context());
    Ok(())
}
