//! CLI argument parsing for the scenario trust pipeline.
//!
//! The CLI stays thin: each command loads its inputs, calls one pipeline
//! operation, and prints canonical JSON.
use crate::diff::GroupBy;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Environment variable holding the tracing filter directive.
pub const LOG_ENV: &str = "SCTRUST_LOG";

#[derive(Parser, Debug)]
#[command(
    name = "sctrust",
    version,
    about = "Reproducible scenario diffs, signed exports, and edit guarding",
    after_help = "Examples:\n  sctrust diff --base base.json --compare compare.json\n  sctrust aggregate --base base.json --compare compare.json --catalog catalog.json --group-by layer\n  sctrust export --base base.json --compare compare.json --out diff.json --key signing.key\n  sctrust verify --export exports/diff.json --public-key signing.pub\n  sctrust guard --catalog catalog.json --candidate edit.json --committed-profile PROFILE.CA.2025 --intent \"use cleaner grid data\"",
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct RootArgs {
    /// Optional config file (precision, export dir, suggestion limit)
    #[arg(long, value_name = "PATH", global = true)]
    pub config: Option<PathBuf>,

    /// Log debug output to stderr (overridden by SCTRUST_LOG)
    #[arg(long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    Diff(DiffArgs),
    Aggregate(AggregateArgs),
    Deltas(DeltasArgs),
    Export(ExportArgs),
    Verify(VerifyArgs),
    Guard(GuardArgs),
    Search(SearchArgs),
    Hash(HashArgs),
    Canon(CanonArgs),
    /// Print a default config file
    Config,
}

#[derive(Parser, Debug)]
#[command(about = "Compute the per-activity diff between two scenario manifests")]
pub struct DiffArgs {
    /// Base scenario manifest JSON
    #[arg(long, value_name = "PATH")]
    pub base: PathBuf,

    /// Compare scenario manifest JSON
    #[arg(long, value_name = "PATH")]
    pub compare: PathBuf,
}

#[derive(Parser, Debug)]
#[command(about = "Aggregate a scenario diff by category or layer")]
pub struct AggregateArgs {
    #[arg(long, value_name = "PATH")]
    pub base: PathBuf,

    #[arg(long, value_name = "PATH")]
    pub compare: PathBuf,

    /// Activity/profile catalog JSON
    #[arg(long, value_name = "PATH")]
    pub catalog: PathBuf,

    #[arg(long, value_enum, default_value_t = GroupBy::Category)]
    pub group_by: GroupBy,
}

#[derive(Parser, Debug)]
#[command(about = "List labelled activity deltas, largest swings first")]
pub struct DeltasArgs {
    #[arg(long, value_name = "PATH")]
    pub base: PathBuf,

    #[arg(long, value_name = "PATH")]
    pub compare: PathBuf,

    #[arg(long, value_name = "PATH")]
    pub catalog: PathBuf,
}

#[derive(Parser, Debug)]
#[command(about = "Build an export envelope, optionally signed, and write it")]
pub struct ExportArgs {
    #[arg(long, value_name = "PATH")]
    pub base: PathBuf,

    #[arg(long, value_name = "PATH")]
    pub compare: PathBuf,

    /// Export filename (must match ^[a-z0-9._-]+$)
    #[arg(long, value_name = "NAME")]
    pub out: String,

    /// Export directory (defaults to the configured export_dir)
    #[arg(long, value_name = "DIR")]
    pub export_dir: Option<PathBuf>,

    /// Raw 64-byte Ed25519 secret key (seed || public key)
    #[arg(long, value_name = "PATH")]
    pub key: Option<PathBuf>,

    /// Key id recorded in the signer block
    #[arg(long, value_name = "ID", requires = "key")]
    pub key_id: Option<String>,
}

#[derive(Parser, Debug)]
#[command(about = "Verify a signed export against a public key")]
pub struct VerifyArgs {
    /// Export file written by `sctrust export`
    #[arg(long, value_name = "PATH")]
    pub export: PathBuf,

    /// Raw 32-byte public key, or the 64-byte secret key
    #[arg(long, value_name = "PATH")]
    pub public_key: PathBuf,
}

#[derive(Parser, Debug)]
#[command(about = "Check a proposed edit against the catalog before applying it")]
pub struct GuardArgs {
    #[arg(long, value_name = "PATH")]
    pub catalog: PathBuf,

    /// Candidate edit JSON ({"profile": {...}, "activity": {...}})
    #[arg(long, value_name = "PATH")]
    pub candidate: PathBuf,

    /// Profile id currently committed to scenario state
    #[arg(long, value_name = "ID")]
    pub committed_profile: Option<String>,

    /// Raw user request text that prompted the edit
    #[arg(long, value_name = "TEXT", default_value = "")]
    pub intent: String,
}

#[derive(Parser, Debug)]
#[command(about = "Rank catalog activities by similarity to a query")]
pub struct SearchArgs {
    #[arg(long, value_name = "PATH")]
    pub catalog: PathBuf,

    #[arg(long, value_name = "TEXT")]
    pub query: String,

    /// Maximum results (defaults to the configured suggestion_limit)
    #[arg(long, value_name = "N")]
    pub limit: Option<usize>,
}

#[derive(Parser, Debug)]
#[command(about = "Print the content fingerprint of a scenario manifest")]
pub struct HashArgs {
    #[arg(long, value_name = "PATH")]
    pub manifest: PathBuf,
}

#[derive(Parser, Debug)]
#[command(about = "Print a JSON document in canonical form")]
pub struct CanonArgs {
    #[arg(long, value_name = "PATH")]
    pub input: PathBuf,
}
