//! Hybrid query front end. Wires the LanceDB chunk store into both
//! retrieval paths (it backs the keyword index's corpus scan and the
//! vector search) and prints the fused ranking.

use std::collections::BTreeSet;
use std::env;
use std::sync::Arc;

use anyhow::Result;

use grantdb_core::config::{expand_path, Config, RetrievalConfig};
use grantdb_core::types::DocumentFilters;
use grantdb_embed::{HashEmbedder, DEFAULT_HASH_DIM};
use grantdb_hybrid::RetrievalEngine;
use grantdb_text::KeywordIndex;
use grantdb_vector::{LanceChunkStore, VectorSearchClient, DEFAULT_TABLE_NAME};

fn usage(prog: &str) -> ! {
    eprintln!("Usage: {prog} \"<query>\" [options]");
    eprintln!("Options:");
    eprintln!("  --limit N          number of results (default 10)");
    eprintln!("  --doc-type T       restrict to a document type (repeatable)");
    eprintln!("  --year Y           restrict to a year (repeatable)");
    eprintln!("  --from Y --to Y    restrict to an inclusive year range");
    eprintln!("  --program P        restrict to a program (repeatable)");
    eprintln!("  --outcome O        restrict to an outcome (repeatable)");
    eprintln!("  --exclude-doc ID   drop a document id (repeatable)");
    eprintln!("  --recency W        recency weight in [0, 1] for this query");
    std::process::exit(1);
}

struct QueryArgs {
    query: String,
    limit: usize,
    filters: DocumentFilters,
    recency: Option<f32>,
}

fn parse_args() -> QueryArgs {
    let args: Vec<String> = env::args().collect();
    let prog = args[0].clone();
    if args.len() < 2 || args[1].starts_with('-') {
        usage(&prog);
    }
    let query = args[1].clone();
    let mut limit = 10usize;
    let mut recency = None;
    let mut doc_types = BTreeSet::new();
    let mut years = BTreeSet::new();
    let mut programs = BTreeSet::new();
    let mut outcomes = BTreeSet::new();
    let mut exclude_docs = BTreeSet::new();
    let mut from = None;
    let mut to = None;

    let mut i = 2;
    while i < args.len() {
        let value = args.get(i + 1).cloned();
        match args[i].as_str() {
            "--limit" => match value.and_then(|v| v.parse().ok()) {
                Some(n) => limit = n,
                None => usage(&prog),
            },
            "--recency" => match value.and_then(|v| v.parse().ok()) {
                Some(w) => recency = Some(w),
                None => usage(&prog),
            },
            "--doc-type" => match value {
                Some(v) => {
                    doc_types.insert(v);
                }
                None => usage(&prog),
            },
            "--year" => match value.and_then(|v| v.parse().ok()) {
                Some(y) => {
                    years.insert(y);
                }
                None => usage(&prog),
            },
            "--from" => match value.and_then(|v| v.parse().ok()) {
                Some(y) => from = Some(y),
                None => usage(&prog),
            },
            "--to" => match value.and_then(|v| v.parse().ok()) {
                Some(y) => to = Some(y),
                None => usage(&prog),
            },
            "--program" => match value {
                Some(v) => {
                    programs.insert(v);
                }
                None => usage(&prog),
            },
            "--outcome" => match value {
                Some(v) => {
                    outcomes.insert(v);
                }
                None => usage(&prog),
            },
            "--exclude-doc" => match value {
                Some(v) => {
                    exclude_docs.insert(v);
                }
                None => usage(&prog),
            },
            _ => usage(&prog),
        }
        i += 2;
    }

    let date_range = match (from, to) {
        (Some(s), Some(e)) => Some((s, e)),
        (None, None) => None,
        _ => {
            eprintln!("Error: --from and --to must be given together");
            std::process::exit(1);
        }
    };
    let none_if_empty = |set: BTreeSet<String>| if set.is_empty() { None } else { Some(set) };
    let filters = DocumentFilters {
        doc_types: none_if_empty(doc_types),
        years: if years.is_empty() { None } else { Some(years) },
        date_range,
        programs: none_if_empty(programs),
        outcomes: none_if_empty(outcomes),
        exclude_docs: none_if_empty(exclude_docs),
    };
    QueryArgs {
        query,
        limit,
        filters,
        recency,
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();
    let config = Config::load()?;
    let args = parse_args();

    let db_dir: String = config
        .get("data.lancedb_dir")
        .unwrap_or_else(|_| "./dev_data/lancedb".to_string());
    let db_dir = expand_path(db_dir);

    let store = Arc::new(
        LanceChunkStore::open(&db_dir.to_string_lossy(), DEFAULT_TABLE_NAME, DEFAULT_HASH_DIM)
            .await?,
    );
    let embedder = Arc::new(HashEmbedder::new(DEFAULT_HASH_DIM));
    let keyword = Arc::new(KeywordIndex::new(store.clone()));
    let vector = VectorSearchClient::new(embedder, store);
    let engine = RetrievalEngine::new(RetrievalConfig::from_config(&config), keyword, vector)?;

    let results = engine
        .retrieve(&args.query, args.limit, &args.filters, args.recency)
        .await?;

    println!("🔍 Found {} results for: \"{}\"", results.len(), args.query);
    for (rank, result) in results.iter().enumerate() {
        let year = result
            .metadata
            .year
            .map_or_else(|| "----".to_string(), |y| y.to_string());
        let doc_type = result.metadata.doc_type.as_deref().unwrap_or("unknown");
        println!(
            "\n  {}. score={:.4}  doc={}  chunk={}  year={}  type={}",
            rank + 1,
            result.score,
            result.doc_id,
            result.chunk_id,
            year,
            doc_type
        );
        let preview: String = result.text.chars().take(200).collect();
        if preview.len() < result.text.len() {
            println!("     📝 {preview}…");
        } else {
            println!("     📝 {preview}");
        }
    }
    Ok(())
}
