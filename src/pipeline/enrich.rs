//! Enrichment stage: raw content to chunked, metadata-tagged documents
//!
//! Pure transformation, no network. Chunk boundaries are deterministic and
//! the fetch timestamp is carried over from the raw record, so re-running
//! enrichment over the same raw document produces a byte-identical file —
//! a crashed run can safely repeat partially emitted work.

use crate::chunk::chunk_text;
use crate::ledger::{Ledger, Stage};
use crate::pipeline::{write_atomic, Document, JobContext, RawDocument};
use crate::Result;
use std::collections::BTreeMap;
use std::sync::Arc;

pub async fn run(ctx: Arc<JobContext>) -> Result<()> {
    let pending = {
        let ledger = ctx.ledger.lock().unwrap();
        ledger.pending_keys(Stage::Enrichment)?
    };

    if pending.is_empty() {
        tracing::info!("Enrichment: nothing pending");
        return Ok(());
    }

    tracing::info!("Enrichment: {} document(s) pending", pending.len());

    // CPU-light and local; runs serially
    for url in pending {
        if ctx.is_cancelled() {
            return Ok(());
        }

        let claimed = {
            let mut ledger = ctx.ledger.lock().unwrap();
            ledger.claim(Stage::Enrichment, &url)?
        };
        if !claimed {
            continue;
        }

        match enrich_one(&ctx, &url) {
            Ok(chunk_count) => {
                let mut ledger = ctx.ledger.lock().unwrap();
                if ctx.is_cancelled() {
                    ledger.release(Stage::Enrichment, &url)?;
                    return Ok(());
                }
                ledger.mark_done(Stage::Enrichment, &url)?;
                tracing::debug!("Enriched {} into {} chunk(s)", url, chunk_count);
            }
            Err(e) => {
                // No network here: failures are malformed inputs, which
                // retrying cannot fix
                tracing::warn!("Enrichment failed for {}: {}", url, e);
                let mut ledger = ctx.ledger.lock().unwrap();
                ledger.mark_failed(Stage::Enrichment, &url, &e.to_string())?;
            }
        }
    }

    Ok(())
}

/// Builds and writes the enriched document for one raw record
fn enrich_one(ctx: &JobContext, url: &str) -> Result<usize> {
    let domain = crate::url::domain_of(url).unwrap_or_else(|| "unknown".to_string());

    let raw_path = ctx.paths.raw_file(&domain, url);
    let raw: RawDocument = serde_json::from_str(&std::fs::read_to_string(&raw_path)?)?;

    let chunks = chunk_text(
        &raw.markdown,
        ctx.config.chunking.chunk_size,
        ctx.config.chunking.chunk_overlap,
    );
    let chunk_count = chunks.len();

    let mut metadata = BTreeMap::new();
    metadata.insert("source_url".to_string(), raw.source_url.clone());
    metadata.insert("domain".to_string(), raw.domain.clone());
    metadata.insert("fetched_at".to_string(), raw.fetched_at.clone());
    metadata.insert("chunk_count".to_string(), chunk_count.to_string());
    if let Some(title) = &raw.title {
        metadata.insert("title".to_string(), title.clone());
    }

    let document = Document {
        source_url: raw.source_url,
        domain: raw.domain,
        chunks,
        metadata,
    };

    // Overwrite-in-place keeps re-enrichment idempotent
    let doc_path = ctx.paths.doc_file(&domain, url);
    write_atomic(&doc_path, &serde_json::to_vec_pretty(&document)?)?;

    Ok(chunk_count)
}
