//! Shared test infrastructure for integration tests.
#![allow(dead_code)]

use ed25519_dalek::SigningKey;
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use tempfile::TempDir;

/// Scratch directory with helpers for invoking `sctrust` inside it.
pub struct Workspace {
    pub dir: TempDir,
}

impl Workspace {
    pub fn new() -> Self {
        Self {
            dir: tempfile::tempdir().expect("create temp dir"),
        }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn write_json(&self, name: &str, value: &Value) -> PathBuf {
        let path = self.path().join(name);
        let text = serde_json::to_string_pretty(value).expect("serialize fixture");
        std::fs::write(&path, text).expect("write fixture");
        path
    }

    pub fn write_bytes(&self, name: &str, bytes: &[u8]) -> PathBuf {
        let path = self.path().join(name);
        std::fs::write(&path, bytes).expect("write fixture bytes");
        path
    }

    /// Run `sctrust` with the workspace as the working directory.
    pub fn run<I, S>(&self, args: I) -> Output
    where
        I: IntoIterator<Item = S>,
        S: AsRef<std::ffi::OsStr>,
    {
        Command::new(env!("CARGO_BIN_EXE_sctrust"))
            .args(args)
            .current_dir(self.path())
            .env_remove("SCTRUST_LOG")
            .output()
            .expect("run sctrust")
    }

    /// Base/compare manifests from the add/remove example.
    pub fn write_manifests(&self) -> (PathBuf, PathBuf) {
        let base = self.write_json(
            "base.json",
            &json!({
                "profile_id": "PROFILE.CA.2025",
                "overrides": {"ACT.ONE": 5, "ACT.TWO": 2},
                "sources": ["factors-2025", "survey"]
            }),
        );
        let compare = self.write_json(
            "compare.json",
            &json!({
                "profile_id": "PROFILE.CA.2025",
                "overrides": {"ACT.ONE": 5, "ACT.THREE": 2},
                "sources": ["survey", "transport-2025"]
            }),
        );
        (base, compare)
    }

    pub fn write_catalog(&self) -> PathBuf {
        self.write_json(
            "catalog.json",
            &json!({
                "activities": [
                    {"activity_id": "ACT.ONE", "label": "Grid electricity", "category": "home_energy", "layer_id": "energy_use"},
                    {"activity_id": "ACT.TWO", "label": "Natural gas heating", "category": "home_energy", "layer_id": "energy_use"},
                    {"activity_id": "ACT.THREE", "label": "Petrol car travel", "category": "transport", "layer_id": "mobility"}
                ],
                "profiles": [
                    {"profile_id": "PROFILE.CA.2024", "label": "Canada 2024", "region": "CA"},
                    {"profile_id": "PROFILE.CA.2025", "label": "Canada 2025", "region": "CA"},
                    {"profile_id": "PROFILE.US.2025", "label": "United States 2025", "region": "US"}
                ]
            }),
        )
    }

    /// Write a deterministic keypair; returns (secret, public) paths.
    pub fn write_keys(&self, seed: u8) -> (PathBuf, PathBuf) {
        let key = SigningKey::from_bytes(&[seed; 32]);
        let secret = self.write_bytes("signing.key", &key.to_keypair_bytes());
        let public = self.write_bytes("signing.pub", key.verifying_key().as_bytes());
        (secret, public)
    }
}

/// Path as a CLI argument; temp paths are always UTF-8 in these tests.
pub fn arg(path: &Path) -> &str {
    path.to_str().expect("utf-8 temp path")
}

pub fn stdout_json(output: &Output) -> Value {
    serde_json::from_slice(&output.stdout).unwrap_or_else(|err| {
        panic!(
            "stdout is not JSON ({err}): {}",
            String::from_utf8_lossy(&output.stdout)
        )
    })
}

pub fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).to_string()
}
