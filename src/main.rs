//! `sctrust`: reproducible scenario diffs, signed exports, and edit guarding.
use anyhow::{Context, Result};
use clap::Parser;
use serde::Serialize;
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

mod canonical;
mod catalog;
mod cli;
mod config;
mod diff;
mod envelope;
mod error;
mod export;
mod guard;
mod ranking;

use crate::canonical::CanonicalEncoder;
use crate::catalog::load_catalog;
use crate::cli::{
    AggregateArgs, CanonArgs, Command, DeltasArgs, DiffArgs, ExportArgs, GuardArgs, HashArgs,
    RootArgs, SearchArgs, VerifyArgs, LOG_ENV,
};
use crate::config::{config_stub, default_config, load_config, TrustConfig};
use crate::diff::{aggregate_by_category, compute_diff, list_activity_deltas, ScenarioDiff};
use crate::envelope::{
    build_signed_diff, default_key_id, hash_manifest, load_manifest, load_verifying_key,
    verify_export_text, verify_signed_diff, EnvelopeInputs, ScenarioManifest,
};
use crate::export::write_signed_export;
use crate::guard::{guard_intent, CandidateEdit, GuardContext};

fn main() -> Result<()> {
    let args = RootArgs::parse();
    init_tracing(args.verbose);
    let config = match &args.config {
        Some(path) => load_config(path)?,
        None => default_config(),
    };

    match args.command {
        Command::Diff(args) => cmd_diff(args, &config),
        Command::Aggregate(args) => cmd_aggregate(args, &config),
        Command::Deltas(args) => cmd_deltas(args, &config),
        Command::Export(args) => cmd_export(args, &config),
        Command::Verify(args) => cmd_verify(args, &config),
        Command::Guard(args) => cmd_guard(args, &config),
        Command::Search(args) => cmd_search(args, &config),
        Command::Hash(args) => cmd_hash(args, &config),
        Command::Canon(args) => cmd_canon(args, &config),
        Command::Config => {
            println!("{}", config_stub()?);
            Ok(())
        }
    }
}

fn init_tracing(verbose: bool) {
    let fallback = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(fallback));
    // A subscriber may already be installed when running under a harness.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

fn cmd_diff(args: DiffArgs, config: &TrustConfig) -> Result<()> {
    let (_, _, diff) = load_pair(&args.base, &args.compare)?;
    if diff.is_empty() {
        tracing::info!("scenarios are identical");
    }
    emit(&config.encoder(), &diff);
    Ok(())
}

fn cmd_aggregate(args: AggregateArgs, config: &TrustConfig) -> Result<()> {
    let (_, _, diff) = load_pair(&args.base, &args.compare)?;
    let catalog = load_catalog(&args.catalog)?;
    let encoder = config.encoder();
    let groups = aggregate_by_category(&diff, args.group_by, &catalog, &encoder);
    tracing::debug!(group_by = %args.group_by, groups = groups.len(), "aggregated diff");
    emit(&encoder, &groups);
    Ok(())
}

fn cmd_deltas(args: DeltasArgs, config: &TrustConfig) -> Result<()> {
    let (_, _, diff) = load_pair(&args.base, &args.compare)?;
    let catalog = load_catalog(&args.catalog)?;
    let encoder = config.encoder();
    emit(&encoder, &list_activity_deltas(&diff, &catalog, &encoder));
    Ok(())
}

fn cmd_export(args: ExportArgs, config: &TrustConfig) -> Result<()> {
    let (base, compare, diff) = load_pair(&args.base, &args.compare)?;
    let key_bytes = args
        .key
        .as_deref()
        .map(|path| fs::read(path).with_context(|| format!("read key {}", path.display())))
        .transpose()?;
    let key_id = args.key_id.as_deref().or(config.default_key_id.as_deref());
    let encoder = config.encoder();
    let inputs = EnvelopeInputs {
        base_manifest: &base,
        compare_manifest: &compare,
        signing_key: key_bytes.as_deref(),
        key_id,
        encoder,
    };
    let envelope = build_signed_diff(&diff, &inputs)?;
    if let Some(bytes) = key_bytes.as_deref() {
        verify_signed_diff(&envelope, &load_verifying_key(bytes)?, &encoder)?;
    }

    let export_dir = match args.export_dir {
        Some(dir) => dir,
        None => config.export_dir_in(&current_dir()?),
    };
    let path = write_signed_export(&export_dir, &args.out, &envelope, &encoder)?;
    println!("{}", path.display());
    Ok(())
}

fn cmd_verify(args: VerifyArgs, config: &TrustConfig) -> Result<()> {
    let text = fs::read_to_string(&args.export)
        .with_context(|| format!("read export {}", args.export.display()))?;
    let key_bytes = fs::read(&args.public_key)
        .with_context(|| format!("read public key {}", args.public_key.display()))?;
    let key = load_verifying_key(&key_bytes)?;
    let encoder = config.encoder();

    if let Err(err) = verify_export_text(&text, &key, &encoder) {
        tracing::warn!(path = %args.export.display(), error = %err, "export failed verification");
        return Err(err.into());
    }
    tracing::info!(path = %args.export.display(), "export verified");
    emit(
        &encoder,
        &serde_json::json!({ "verified": true, "key_id": default_key_id(&key) }),
    );
    Ok(())
}

fn cmd_guard(args: GuardArgs, config: &TrustConfig) -> Result<()> {
    let catalog = load_catalog(&args.catalog)?;
    let raw = fs::read(&args.candidate)
        .with_context(|| format!("read candidate {}", args.candidate.display()))?;
    let value: Value = serde_json::from_slice(&raw).context("parse candidate JSON")?;
    let candidate = CandidateEdit::from_value(&value);
    let ctx = GuardContext {
        catalog: &catalog,
        committed_profile_id: args.committed_profile.as_deref(),
        intent_text: &args.intent,
        suggestion_limit: config.suggestion_limit,
    };

    let verdict = guard_intent(&candidate, &ctx);
    emit(&config.encoder(), &verdict);
    verdict.ensure_allowed()?;
    Ok(())
}

fn cmd_search(args: SearchArgs, config: &TrustConfig) -> Result<()> {
    let catalog = load_catalog(&args.catalog)?;
    let limit = args.limit.unwrap_or(config.suggestion_limit);
    emit(&config.encoder(), &catalog.search_activities(&args.query, limit));
    Ok(())
}

fn cmd_hash(args: HashArgs, config: &TrustConfig) -> Result<()> {
    let manifest = load_manifest(&args.manifest)?;
    emit(
        &config.encoder(),
        &serde_json::json!({
            "hash": manifest.resolved_hash(),
            "content_hash": hash_manifest(&manifest),
        }),
    );
    Ok(())
}

fn cmd_canon(args: CanonArgs, config: &TrustConfig) -> Result<()> {
    let raw = fs::read(&args.input).with_context(|| format!("read {}", args.input.display()))?;
    let value: Value = serde_json::from_slice(&raw).context("parse JSON input")?;
    let encoder = config.encoder();
    tracing::debug!(precision = encoder.precision(), "canonicalizing document");
    print!("{}", encoder.encode_value(&value));
    Ok(())
}

fn load_pair(
    base: &Path,
    compare: &Path,
) -> Result<(ScenarioManifest, ScenarioManifest, ScenarioDiff)> {
    let base = load_manifest(base)?;
    let compare = load_manifest(compare)?;
    let diff = compute_diff(&base.overrides, &compare.overrides);
    Ok((base, compare, diff))
}

fn emit<T: Serialize + ?Sized>(encoder: &CanonicalEncoder, value: &T) {
    print!("{}", encoder.encode(value));
}

fn current_dir() -> Result<PathBuf> {
    std::env::current_dir().context("resolve current directory")
}
