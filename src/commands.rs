//! CLI command implementations for `cite`.
//!
//! Each `run_*` function backs one subcommand: it does the work through the
//! library API and prints a human-readable report to stdout.

use anyhow::{Context, Result};
use std::path::Path;
use std::sync::Arc;

use crate::config::Config;
use crate::fetch::{DocumentFetcher, FetchResult};
use crate::handle::ObjectStore;
use crate::models::CitationLookup;
use crate::parser::{parse_answer, Segment};
use crate::preview::PreviewDriver;
use crate::resolver::PathResolver;
use crate::transport::HttpTransport;

/// Reads a lookup table from a JSON object file (`{ "label": "url", ... }`).
pub fn load_lookup(path: Option<&Path>) -> Result<CitationLookup> {
    let Some(path) = path else {
        return Ok(CitationLookup::new());
    };
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read lookup file: {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("Lookup file is not a JSON object of strings: {}", path.display()))
}

/// `cite parse`: segment an answer and list its citations.
pub fn run_parse(
    config: &Config,
    answer_path: &Path,
    streaming: bool,
    known_citations: &[String],
    lookup: &CitationLookup,
    html: bool,
) -> Result<()> {
    let answer = std::fs::read_to_string(answer_path)
        .with_context(|| format!("Failed to read answer file: {}", answer_path.display()))?;

    let resolver = PathResolver::from_config(config);
    let parsed = parse_answer(&answer, streaming, known_citations, lookup, &resolver);

    if html {
        println!("{}", parsed.to_html());
        return Ok(());
    }

    let markers = parsed
        .segments
        .iter()
        .filter(|s| matches!(s, Segment::Marker { .. }))
        .count();
    println!(
        "{} segments, {} markers, {} distinct citations",
        parsed.segments.len(),
        markers,
        parsed.citations.len()
    );
    for marker in &parsed.citations {
        println!("[{}] {}", marker.ordinal, marker.raw);
        println!("    path: {}", marker.location);
    }
    Ok(())
}

/// `cite resolve`: show where a label points.
pub fn run_resolve(config: &Config, label: &str, lookup: &CitationLookup) -> Result<()> {
    let location = PathResolver::from_config(config).resolve(label, lookup);
    println!("{}", serde_json::to_string_pretty(&location)?);
    println!("path: {}", location);
    Ok(())
}

/// `cite fetch`: download a citation through the backend.
pub async fn run_fetch(
    config: &Config,
    label: &str,
    lookup: &CitationLookup,
    token: Option<&str>,
    output: Option<&Path>,
) -> Result<()> {
    let location = PathResolver::from_config(config).resolve(label, lookup);
    let fetcher = DocumentFetcher::new(Arc::new(HttpTransport::from_config(config)?));
    let store = ObjectStore::new();

    let handle = match fetcher.fetch(&location, label, token, &store).await {
        FetchResult::Success { handle, .. } => handle,
        FetchResult::Failure(e) => {
            eprintln!("Error ({}): {}", e.code(), e);
            std::process::exit(1);
        }
    };

    let address = handle.address();
    let object = store
        .get(&address)
        .context("fetched document disappeared from the object store")?;

    println!("path:         {}", location);
    println!("handle:       {}", address);
    println!(
        "content_type: {}",
        object.content_type.as_deref().unwrap_or("(unknown)")
    );
    println!("bytes:        {}", object.bytes.len());

    if let Some(output) = output {
        std::fs::write(output, &object.bytes)
            .with_context(|| format!("Failed to write {}", output.display()))?;
        println!("written to:   {}", output.display());
    }

    store.revoke(handle);
    Ok(())
}

/// `cite preview`: run the metadata step for a SharePoint document and
/// report the resulting preview state.
pub async fn run_preview(config: &Config, source_url: &str, token: Option<&str>) -> Result<()> {
    let driver = PreviewDriver::from_config(Arc::new(HttpTransport::from_config(config)?), config);
    let session = driver.start(source_url, token).await;

    println!("{}", serde_json::to_string_pretty(&session)?);
    if let Some(failure) = session.failure() {
        println!("{}", failure);
    }
    Ok(())
}
