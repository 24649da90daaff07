//! Walks a directory of grant documents (.txt/.md), chunks them by
//! paragraph, reads the optional `<name>.meta.json` sidecar for document
//! metadata, embeds every chunk and upserts the batch into LanceDB.
//! A `.jsonl` file of pre-chunked records is ingested as-is.

use std::collections::BTreeSet;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use serde::Deserialize;

use grantdb_core::config::{expand_path, Config};
use grantdb_core::traits::EmbeddingProvider;
use grantdb_core::types::{Chunk, ChunkMetadata};
use grantdb_embed::{HashEmbedder, DEFAULT_HASH_DIM};
use grantdb_vector::{LanceChunkStore, DEFAULT_TABLE_NAME};

const MAX_CHUNK_WORDS: usize = 300;
const OVERLAP_PERCENT: f32 = 0.2;

/// Optional per-document sidecar, `annual_report_2022.meta.json` next to
/// `annual_report_2022.txt`. Every field may be absent.
#[derive(Debug, Default, Deserialize)]
struct SidecarMetadata {
    doc_type: Option<String>,
    year: Option<i32>,
    #[serde(default)]
    programs: BTreeSet<String>,
    outcome: Option<String>,
}

fn usage(prog: &str) -> ! {
    eprintln!("Usage: {prog} [data_dir|chunks.jsonl] [--limit N]");
    eprintln!("Example: {prog} ./dev_data/docs --limit 100");
    std::process::exit(1);
}

/// One chunk per line, already split and carrying its metadata.
fn read_jsonl_chunks(path: &Path) -> Result<Vec<Chunk>> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    let mut chunks = Vec::new();
    for (line_no, line) in raw.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let chunk: Chunk = serde_json::from_str(line)
            .with_context(|| format!("{}:{}: invalid chunk record", path.display(), line_no + 1))?;
        chunks.push(chunk);
    }
    Ok(chunks)
}

fn read_sidecar(doc_path: &Path) -> Result<SidecarMetadata> {
    let sidecar = doc_path.with_extension("meta.json");
    if !sidecar.exists() {
        return Ok(SidecarMetadata::default());
    }
    let raw = fs::read_to_string(&sidecar)
        .with_context(|| format!("reading sidecar {}", sidecar.display()))?;
    serde_json::from_str(&raw)
        .with_context(|| format!("parsing sidecar {}", sidecar.display()))
}

fn list_document_files(root: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = walkdir::WalkDir::new(root)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| e.path().to_path_buf())
        .filter(|p| {
            matches!(
                p.extension().and_then(|s| s.to_str()),
                Some("txt") | Some("md")
            )
        })
        .collect();
    files.sort();
    files
}

fn doc_id_for(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| path.to_string_lossy().to_string())
}

/// Splits one oversized paragraph into word windows with overlap so no
/// sentence boundary is lost at a hard cut.
fn split_with_overlap(paragraph: &str) -> Vec<String> {
    let words: Vec<&str> = paragraph.split_whitespace().collect();
    let overlap = (MAX_CHUNK_WORDS as f32 * OVERLAP_PERCENT) as usize;
    let mut pieces = Vec::new();
    let mut start = 0;
    while start < words.len() {
        let end = (start + MAX_CHUNK_WORDS).min(words.len());
        pieces.push(words[start..end].join(" "));
        if end >= words.len() {
            break;
        }
        start = end - overlap;
    }
    pieces
}

fn chunk_document(path: &Path) -> Result<Vec<Chunk>> {
    let content = fs::read_to_string(path)
        .or_else(|_| fs::read(path).map(|b| String::from_utf8_lossy(&b).to_string()))
        .with_context(|| format!("reading {}", path.display()))?;
    let doc_id = doc_id_for(path);
    let sidecar = read_sidecar(path)?;
    let filename = path
        .file_name()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();
    let metadata = ChunkMetadata {
        doc_type: sidecar.doc_type,
        year: sidecar.year,
        programs: sidecar.programs,
        outcome: sidecar.outcome,
        filename: Some(filename),
    };

    let mut chunks = Vec::new();
    let mut chunk_index = 0;
    for paragraph in content.split("\n\n") {
        let paragraph = paragraph.trim();
        if paragraph.is_empty() {
            continue;
        }
        let pieces = if paragraph.split_whitespace().count() <= MAX_CHUNK_WORDS {
            vec![paragraph.to_string()]
        } else {
            split_with_overlap(paragraph)
        };
        for text in pieces {
            chunks.push(Chunk {
                chunk_id: format!("{doc_id}:{chunk_index}"),
                text,
                doc_id: doc_id.clone(),
                chunk_index,
                metadata: metadata.clone(),
            });
            chunk_index += 1;
        }
    }
    Ok(chunks)
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();
    let config = Config::load()?;

    let args: Vec<String> = env::args().collect();
    let prog = args[0].clone();
    let mut data_dir = None;
    let mut limit = None;
    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--limit" => {
                let value = args.get(i + 1).and_then(|v| v.parse::<usize>().ok());
                match value {
                    Some(n) => {
                        limit = Some(n);
                        i += 1;
                    }
                    None => usage(&prog),
                }
            }
            a if !a.starts_with('-') => data_dir = Some(PathBuf::from(a)),
            _ => usage(&prog),
        }
        i += 1;
    }
    let data_dir = data_dir.unwrap_or_else(|| {
        let dir: String = config
            .get("data.docs_dir")
            .unwrap_or_else(|_| "./dev_data/docs".to_string());
        expand_path(dir)
    });
    let db_dir: String = config
        .get("data.lancedb_dir")
        .unwrap_or_else(|_| "./dev_data/lancedb".to_string());
    let db_dir = expand_path(db_dir);

    println!("grantdb-ingest");
    println!("==============");
    println!("Data directory: {}", data_dir.display());
    println!("Database: {}", db_dir.display());

    let chunks = if data_dir.extension().and_then(|s| s.to_str()) == Some("jsonl") {
        let chunks = read_jsonl_chunks(&data_dir)?;
        println!("Read {} pre-chunked records", chunks.len());
        chunks
    } else {
        let mut files = list_document_files(&data_dir);
        if files.is_empty() {
            println!("No .txt or .md files found under {}.", data_dir.display());
            return Ok(());
        }
        if let Some(limit) = limit {
            if files.len() > limit {
                files.truncate(limit);
                println!("Limited to first {limit} files");
            }
        }

        let mut chunks = Vec::new();
        for (file_index, path) in files.iter().enumerate() {
            println!(
                "Processing file {}/{}: {}",
                file_index + 1,
                files.len(),
                path.display()
            );
            chunks.extend(chunk_document(path)?);
        }
        println!("Processed {} files into {} chunks", files.len(), chunks.len());
        chunks
    };
    if chunks.is_empty() {
        return Ok(());
    }

    fs::create_dir_all(&db_dir)?;
    let store =
        LanceChunkStore::open(&db_dir.to_string_lossy(), DEFAULT_TABLE_NAME, DEFAULT_HASH_DIM)
            .await?;
    let embedder = HashEmbedder::new(DEFAULT_HASH_DIM);

    let bar = ProgressBar::new(chunks.len() as u64);
    bar.set_style(
        ProgressStyle::with_template("{bar:40} {pos}/{len} chunks {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar()),
    );
    let mut embeddings = Vec::with_capacity(chunks.len());
    for chunk in &chunks {
        embeddings.push(embedder.embed(&chunk.text).await?);
        bar.inc(1);
    }
    // Replace, not merge: a document that shrank since its last ingest must
    // not keep its stale higher-index chunks.
    store.replace_documents(&chunks, &embeddings).await?;
    bar.finish_with_message("done");

    println!("\n✅ Ingest complete ({} chunks)", chunks.len());
    println!("💡 To search, use: cargo run --bin grantdb-query '<query>'");
    Ok(())
}
