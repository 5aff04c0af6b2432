//! Export envelope assembly, signing, and verification.
//!
//! The envelope binds a scenario diff to both manifests. When a key is
//! supplied, the canonical encoding of the envelope minus `signer` and
//! `signature` is signed with Ed25519; verification repeats that encoding and
//! treats any mismatch as tampering.
use crate::canonical::CanonicalEncoder;
use crate::diff::ScenarioDiff;
use crate::error::TrustError;
use anyhow::{Context, Result};
use base64::prelude::{Engine as _, BASE64_STANDARD};
use chrono::{DateTime, SecondsFormat, Utc};
use ed25519_dalek::{Signature, Signer as _, SigningKey, VerifyingKey};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::Path;

/// Envelope format version.
pub const ENVELOPE_SPEC_VERSION: &str = "1.0";
/// The only supported signature algorithm.
pub const SIGNATURE_ALGO: &str = "ed25519";
/// Secret key length: 32-byte seed followed by the 32-byte public key.
pub const SECRET_KEY_LEN: usize = 64;

const FNV_OFFSET_BASIS: u32 = 0x811c_9dc5;
const FNV_PRIME: u32 = 0x0100_0193;
const MAX_EXACT_INTEGER: f64 = 9_007_199_254_740_992.0;

/// One side of a comparison, as committed by the user or the guard.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScenarioManifest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dataset_version: Option<String>,
    #[serde(default)]
    pub overrides: BTreeMap<String, f64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sources: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scenario_hash: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hash: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub manifest_hash: Option<String>,
    /// Fields this crate does not interpret; kept so they still fingerprint.
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl ScenarioManifest {
    /// Authoritative scenario hash, or a content fingerprint when absent.
    pub fn resolved_hash(&self) -> String {
        non_empty(&self.scenario_hash)
            .or_else(|| non_empty(&self.hash))
            .map(str::to_string)
            .unwrap_or_else(|| hash_manifest(self))
    }

    fn resolved_manifest_hash(&self, fallback: &str) -> String {
        non_empty(&self.manifest_hash)
            .unwrap_or(fallback)
            .to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManifestHashes {
    pub base: String,
    pub compare: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signer {
    pub algo: String,
    pub key_id: String,
}

/// Versioned export envelope around a scenario diff.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignedDiff {
    pub spec_version: String,
    pub created_at: String,
    pub base_hash: String,
    pub compare_hash: String,
    pub scenario_diff: ScenarioDiff,
    pub sources_union: Vec<String>,
    pub manifest_hashes: ManifestHashes,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signer: Option<Signer>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
}

/// Everything besides the diff needed to assemble an envelope.
#[derive(Clone, Copy)]
pub struct EnvelopeInputs<'a> {
    pub base_manifest: &'a ScenarioManifest,
    pub compare_manifest: &'a ScenarioManifest,
    /// Raw 64-byte Ed25519 secret key (seed || public key).
    pub signing_key: Option<&'a [u8]>,
    pub key_id: Option<&'a str>,
    pub encoder: CanonicalEncoder,
}

/// Build an envelope stamped with the current UTC instant.
pub fn build_signed_diff(
    diff: &ScenarioDiff,
    inputs: &EnvelopeInputs<'_>,
) -> Result<SignedDiff, TrustError> {
    build_signed_diff_at(diff, inputs, Utc::now())
}

/// Build an envelope with an explicit creation instant.
pub fn build_signed_diff_at(
    diff: &ScenarioDiff,
    inputs: &EnvelopeInputs<'_>,
    created_at: DateTime<Utc>,
) -> Result<SignedDiff, TrustError> {
    let signing_key = inputs.signing_key.map(parse_signing_key).transpose()?;

    let base_hash = inputs.base_manifest.resolved_hash();
    let compare_hash = inputs.compare_manifest.resolved_hash();
    let manifest_hashes = ManifestHashes {
        base: inputs.base_manifest.resolved_manifest_hash(&base_hash),
        compare: inputs.compare_manifest.resolved_manifest_hash(&compare_hash),
    };
    let mut envelope = SignedDiff {
        spec_version: ENVELOPE_SPEC_VERSION.to_string(),
        created_at: created_at.to_rfc3339_opts(SecondsFormat::Millis, true),
        base_hash,
        compare_hash,
        scenario_diff: diff.clone(),
        sources_union: merge_sources(
            &inputs.base_manifest.sources,
            &inputs.compare_manifest.sources,
        ),
        manifest_hashes,
        signer: None,
        signature: None,
    };

    if let Some(key) = signing_key {
        let key_id = inputs
            .key_id
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| default_key_id(&key.verifying_key()));
        let payload = signing_payload(&envelope, &inputs.encoder)?;
        let signature = key.sign(payload.as_bytes());
        envelope.signer = Some(Signer {
            algo: SIGNATURE_ALGO.to_string(),
            key_id,
        });
        envelope.signature = Some(BASE64_STANDARD.encode(signature.to_bytes()));
    }

    tracing::info!(
        base_hash = %envelope.base_hash,
        compare_hash = %envelope.compare_hash,
        rows = envelope.scenario_diff.len(),
        signed = envelope.signature.is_some(),
        "export envelope built"
    );
    Ok(envelope)
}

/// Canonical text covered by the signature: the envelope minus
/// `signer`/`signature`.
pub fn signing_payload(
    envelope: &SignedDiff,
    encoder: &CanonicalEncoder,
) -> Result<String, TrustError> {
    let document = serde_json::to_value(envelope)
        .map_err(|err| TrustError::tampered(format!("envelope not serializable: {err}")))?;
    Ok(unsigned_payload(&document, encoder))
}

fn unsigned_payload(document: &Value, encoder: &CanonicalEncoder) -> String {
    let mut document = document.clone();
    if let Some(object) = document.as_object_mut() {
        object.remove("signer");
        object.remove("signature");
    }
    encoder.encode_value(&document)
}

/// Verify an in-memory envelope against a public key.
pub fn verify_signed_diff(
    envelope: &SignedDiff,
    key: &VerifyingKey,
    encoder: &CanonicalEncoder,
) -> Result<(), TrustError> {
    let document = serde_json::to_value(envelope)
        .map_err(|err| TrustError::tampered(format!("envelope not serializable: {err}")))?;
    verify_export_document(&document, key, encoder)
}

/// Verify exported text; it must also be in canonical form.
pub fn verify_export_text(
    text: &str,
    key: &VerifyingKey,
    encoder: &CanonicalEncoder,
) -> Result<(), TrustError> {
    let document: Value = serde_json::from_str(text)
        .map_err(|err| TrustError::tampered(format!("export is not valid JSON: {err}")))?;
    if encoder.encode_value(&document) != text {
        return Err(TrustError::tampered("export is not in canonical form"));
    }
    verify_export_document(&document, key, encoder)
}

/// Verify a parsed export document.
pub fn verify_export_document(
    document: &Value,
    key: &VerifyingKey,
    encoder: &CanonicalEncoder,
) -> Result<(), TrustError> {
    let object = document
        .as_object()
        .ok_or_else(|| TrustError::tampered("export is not a JSON object"))?;
    let signer = object
        .get("signer")
        .ok_or_else(|| TrustError::tampered("export is unsigned"))?;
    let algo = signer.get("algo").and_then(Value::as_str);
    if algo != Some(SIGNATURE_ALGO) {
        return Err(TrustError::tampered(format!(
            "unsupported signature algorithm {algo:?}"
        )));
    }
    let signature = object
        .get("signature")
        .and_then(Value::as_str)
        .ok_or_else(|| TrustError::tampered("signer present without signature"))?;
    let payload = unsigned_payload(document, encoder);
    verify_detached(payload.as_bytes(), signature, key)
}

/// Verify a base64 detached signature over `payload`.
pub fn verify_detached(
    payload: &[u8],
    signature_b64: &str,
    key: &VerifyingKey,
) -> Result<(), TrustError> {
    let bytes = BASE64_STANDARD
        .decode(signature_b64)
        .map_err(|_| TrustError::tampered("signature is not valid base64"))?;
    let signature = Signature::from_slice(&bytes)
        .map_err(|_| TrustError::tampered("signature must be 64 bytes"))?;
    key.verify_strict(payload, &signature)
        .map_err(|_| TrustError::tampered("signature does not match export contents"))
}

/// Parse raw 64-byte Ed25519 secret key material.
pub fn parse_signing_key(bytes: &[u8]) -> Result<SigningKey, TrustError> {
    let keypair: &[u8; SECRET_KEY_LEN] = bytes
        .try_into()
        .map_err(|_| TrustError::InvalidKey { len: bytes.len() })?;
    SigningKey::from_keypair_bytes(keypair).map_err(|_| TrustError::KeyMismatch)
}

/// Accept a raw 32-byte public key or a 64-byte secret key.
pub fn load_verifying_key(bytes: &[u8]) -> Result<VerifyingKey, TrustError> {
    if bytes.len() == SECRET_KEY_LEN {
        return Ok(parse_signing_key(bytes)?.verifying_key());
    }
    let public: &[u8; 32] = bytes
        .try_into()
        .map_err(|_| TrustError::InvalidPublicKey { len: bytes.len() })?;
    VerifyingKey::from_bytes(public).map_err(|_| TrustError::InvalidPublicKey { len: 32 })
}

/// Short key id: first 16 hex characters of SHA-256 over the public key.
pub fn default_key_id(key: &VerifyingKey) -> String {
    let mut hasher = Sha256::new();
    hasher.update(key.as_bytes());
    let digest = format!("{:x}", hasher.finalize());
    digest[..16].to_string()
}

/// 32-bit FNV-1a fingerprint of the compact JSON form, as 8 hex digits.
///
/// Keys are sorted and integral floats print without a fraction, so a loaded
/// manifest hashes the same as its compact source text. Not a cryptographic
/// hash; only the envelope signature proves integrity.
pub fn hash_manifest<T: Serialize + ?Sized>(payload: &T) -> String {
    let text = serde_json::to_value(payload)
        .map(integral_floats_as_integers)
        .and_then(|value| serde_json::to_string(&value))
        .unwrap_or_else(|_| "null".to_string());
    let mut hash = FNV_OFFSET_BASIS;
    for byte in text.as_bytes() {
        hash ^= u32::from(*byte);
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    format!("{hash:08x}")
}

fn integral_floats_as_integers(value: Value) -> Value {
    match value {
        Value::Number(number) if !number.is_i64() && !number.is_u64() => {
            match number.as_f64() {
                Some(float) if float.fract() == 0.0 && float.abs() < MAX_EXACT_INTEGER => {
                    Value::from(float as i64)
                }
                _ => Value::Number(number),
            }
        }
        Value::Array(items) => {
            Value::Array(items.into_iter().map(integral_floats_as_integers).collect())
        }
        Value::Object(map) => Value::Object(
            map.into_iter()
                .map(|(key, value)| (key, integral_floats_as_integers(value)))
                .collect(),
        ),
        other => other,
    }
}

/// Base sources first, then compare; first occurrence wins.
pub fn merge_sources(base: &[String], compare: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    base.iter()
        .chain(compare.iter())
        .filter(|source| seen.insert(source.as_str()))
        .cloned()
        .collect()
}

/// Load a scenario manifest JSON file.
pub fn load_manifest(path: &Path) -> Result<ScenarioManifest> {
    let bytes = fs::read(path).with_context(|| format!("read manifest {}", path.display()))?;
    let manifest: ScenarioManifest =
        serde_json::from_slice(&bytes).context("parse scenario manifest JSON")?;
    Ok(manifest)
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|value| !value.is_empty())
}

#[cfg(test)]
#[path = "envelope_tests.rs"]
mod tests;
