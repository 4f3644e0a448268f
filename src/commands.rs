//! One-shot CLI commands.
//!
//! Each command builds a fresh fetcher and cache, reads the source once,
//! and prints to stdout. An upstream failure with no data to show is an
//! error; a failure with data is printed as a warning on stderr.

use anyhow::{bail, Result};
use std::sync::Arc;

use sable_live_core::alias::ResolvedFields;
use sable_live_core::query::ResultRow;
use sable_live_core::PilotRecord;

use crate::cache::{CachePolicy, CacheRead, ResultCache};
use crate::config::Config;
use crate::source::SourceFetcher;

async fn load(config: &Config) -> Result<CacheRead> {
    let fetcher = Arc::new(SourceFetcher::new(&config.source)?);
    let cache = ResultCache::new(fetcher, CachePolicy::from(&config.cache));
    let read = cache.get(true).await;

    match &read.error {
        Some(err) if read.snapshot.is_empty() => bail!("{}", err),
        Some(err) => eprintln!("warning: {}", err),
        None => {}
    }
    Ok(read)
}

pub async fn run_meta(config: &Config) -> Result<()> {
    let read = load(config).await?;
    let snap = &read.snapshot;

    println!("source:     {}", snap.source);
    if let Some(title) = &snap.title {
        println!("title:      {}", title);
    }
    if let Some(kind) = snap.kind {
        println!("kind:       {}", kind);
    }
    if let Some(at) = snap.fetched_at {
        println!("fetched_at: {}", at.format("%Y-%m-%d %H:%M:%S UTC"));
    }
    println!("status:     {}", read.status);
    println!("records:    {}", snap.len());
    println!("live:       {}", if read.live_active() { "yes" } else { "no" });
    Ok(())
}

pub async fn run_pilots(config: &Config) -> Result<()> {
    let read = load(config).await?;
    let records = read.query().all();
    if records.is_empty() {
        println!("No results.");
        return Ok(());
    }

    print_header();
    for record in records {
        let f = ResolvedFields::of(record);
        print_line(
            f.position.unwrap_or_default(),
            f.number.unwrap_or_default(),
            f.name.unwrap_or_default(),
            f.time.unwrap_or_default(),
            f.gap.unwrap_or_default(),
        );
    }
    println!();
    println!("{} pilots", records.len());
    Ok(())
}

pub async fn run_pilot(config: &Config, id: &str) -> Result<()> {
    let read = load(config).await?;
    let Some(record) = read.query().by_identifier(id.trim()) else {
        eprintln!("Error: no pilot with number '{}'", id.trim());
        std::process::exit(1);
    };
    print_record(record);
    Ok(())
}

pub async fn run_search(config: &Config, query: &str, text: bool) -> Result<()> {
    let read = load(config).await?;
    let engine = read.query();

    if text {
        let lines = engine.search_text(query);
        if lines.is_empty() {
            println!("No results.");
        }
        for line in lines {
            println!("{}", line);
        }
        return Ok(());
    }

    let rows = engine.search(query);
    if rows.is_empty() {
        println!("No results.");
        return Ok(());
    }
    print_header();
    for row in &rows {
        print_row(row);
    }
    Ok(())
}

fn print_header() {
    print_line("POS", "NUM", "NAME", "TIME", "GAP");
}

fn print_row(row: &ResultRow) {
    print_line(&row.position, &row.number, &row.name, &row.time, &row.gap);
}

fn print_line(position: &str, number: &str, name: &str, time: &str, gap: &str) {
    println!(
        "{:<5} {:<6} {:<28} {:<12} {}",
        position, number, name, time, gap
    );
}

fn print_record(record: &PilotRecord) {
    let width = record.fields().map(|(k, _)| k.chars().count()).max().unwrap_or(0);
    for (name, value) in record.fields() {
        println!("{:<width$}  {}", name, value, width = width);
    }
    if !record.extra().is_empty() {
        println!("{:<width$}  {}", "extra", record.extra().join(" | "), width = width);
    }
}
