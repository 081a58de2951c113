//! CLI command implementations.
//!
//! Each `run_*` function backs one `qa-harness` subcommand: it opens what
//! it needs from the config, does the work through the library, and prints
//! a short summary to stdout.

use anyhow::{bail, Context, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

use crate::config::Config;
use crate::error::RagError;
use crate::generate::{Generation, ScriptGenerator, TestPlanGenerator};
use crate::ingest::{ingest_files, IngestStatus};
use crate::llm::select_chat_model;
use crate::session::SessionId;
use crate::store::VectorStore;
use crate::sweep::sweep_stale_sessions;
use crate::uploads;

/// `qa-harness session new`
pub fn run_session_new() -> Result<()> {
    println!("{}", SessionId::generate());
    Ok(())
}

/// `qa-harness session delete <id>`
pub async fn run_session_delete(config: &Config, id: &str) -> Result<()> {
    let session = SessionId::parse(id)?;
    let store = VectorStore::open(config).await?;

    let collection_deleted = store.delete_collection(&session.collection_name()).await?;
    let directory_deleted = uploads::remove_session_dir(&config.storage.upload_dir, &session).await?;

    println!("Session {}", session);
    println!("  collection deleted: {}", collection_deleted);
    println!("  uploads deleted:    {}", directory_deleted);
    Ok(())
}

/// `qa-harness ingest --session <id> <files…>`
///
/// Copies each file into the session's upload directory (so a later
/// `script` run can find an HTML target) and ingests the copies.
pub async fn run_ingest(config: &Config, id: &str, files: &[PathBuf]) -> Result<()> {
    let session = SessionId::parse(id)?;
    let store = VectorStore::open(config).await?;

    let mut saved = Vec::with_capacity(files.len());
    for file in files {
        let bytes = tokio::fs::read(file)
            .await
            .with_context(|| format!("reading {}", file.display()))?;
        let name = file
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        saved.push(uploads::save_upload(&config.storage.upload_dir, &session, &name, &bytes).await?);
    }

    let outcome = ingest_files(&store, config, &session, saved).await;
    for skipped in &outcome.skipped {
        println!("  skipped: {}", skipped);
    }

    match outcome.status {
        IngestStatus::Success => {
            println!(
                "{} ({} chunks in session_{})",
                outcome.message,
                outcome.chunks.unwrap_or(0),
                session
            );
            Ok(())
        }
        IngestStatus::Error => bail!("ingest failed: {}", outcome.message),
    }
}

/// `qa-harness tests --session <id> <query>`
pub async fn run_tests(config: &Config, id: &str, query: &str) -> Result<()> {
    let session = SessionId::parse(id)?;
    let store = Arc::new(VectorStore::open(config).await?);
    let chat = select_chat_model(&config.llm)?;

    let generator = TestPlanGenerator::new(store, chat, config.retrieval.test_plan_k);
    let text = expect_generated(generator.generate(&session, query).await)?;
    println!("{}", text);
    Ok(())
}

/// `qa-harness script --session <id> [--html <file>] <test case>`
pub async fn run_script(
    config: &Config,
    id: &str,
    html: Option<&Path>,
    test_case: &str,
) -> Result<()> {
    let session = SessionId::parse(id)?;

    let html_path = match html {
        Some(path) => path.to_path_buf(),
        None => uploads::find_html(&config.storage.upload_dir, &session)?.ok_or_else(|| {
            RagError::NotFound(format!(
                "no HTML file uploaded for session {}; pass --html <file>",
                session
            ))
        })?,
    };
    let html = tokio::fs::read_to_string(&html_path)
        .await
        .with_context(|| format!("reading {}", html_path.display()))?;

    let store = Arc::new(VectorStore::open(config).await?);
    let chat = select_chat_model(&config.llm)?;

    let generator = ScriptGenerator::new(store, chat, config.retrieval.script_k);
    let code = expect_generated(generator.generate(&session, test_case, &html).await)?;
    println!("{}", code);
    Ok(())
}

/// `qa-harness sweep`
pub async fn run_sweep(config: &Config) -> Result<()> {
    let store = VectorStore::open(config).await?;
    let report = sweep_stale_sessions(
        &config.storage.upload_dir,
        config.session.timeout(),
        SystemTime::now(),
        &store,
    )
    .await?;

    println!(
        "Sweep: {} removed, {} kept, {} failed",
        report.removed.len(),
        report.kept.len(),
        report.failed.len()
    );
    for name in &report.removed {
        println!("  removed {}", name);
    }
    for name in &report.failed {
        println!("  failed  {}", name);
    }
    Ok(())
}

fn expect_generated(generation: Generation) -> Result<String> {
    match generation {
        Generation::Generated(text) => Ok(text),
        Generation::Failed { reason } => Err(RagError::Generation(reason).into()),
    }
}
