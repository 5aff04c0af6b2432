//! Intent guard for proposer-emitted scenario edits.
//!
//! Candidate edits come from an untrusted proposer (an LM tool-call loop). The
//! guard checks each one against the catalog and the committed profile before
//! it may reach scenario state. Checks run in order and stop at the first
//! rejection; the verdict is advisory data and nothing here mutates inputs.
use crate::catalog::{Catalog, Profile, ProfileTokens};
use crate::error::TrustError;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::sync::OnceLock;

/// Default number of ranked activity suggestions on rejection.
pub const DEFAULT_SUGGESTION_LIMIT: usize = 5;

/// A proposed profile switch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileEdit {
    pub profile_id: String,
    #[serde(default)]
    pub region: Option<String>,
}

/// A proposed activity addition; the proposer may send only a label.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityEdit {
    #[serde(default)]
    pub activity_id: Option<String>,
    #[serde(default)]
    pub label: Option<String>,
}

/// Candidate edit lowered from loosely-typed proposer JSON.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CandidateEdit {
    Profile(ProfileEdit),
    Activity(ActivityEdit),
    ProfileAndActivity(ProfileEdit, ActivityEdit),
    Unknown,
}

impl CandidateEdit {
    /// Lower `{profile?: {...}, activity?: {...}}` into a tagged edit.
    ///
    /// Shapes that do not deserialize, or carry no identifying field, are
    /// ignored; a candidate with nothing recognizable is `Unknown`.
    pub fn from_value(value: &Value) -> Self {
        let profile = value
            .get("profile")
            .and_then(|raw| serde_json::from_value::<ProfileEdit>(raw.clone()).ok())
            .filter(|edit| !edit.profile_id.trim().is_empty());
        let activity = value
            .get("activity")
            .and_then(|raw| serde_json::from_value::<ActivityEdit>(raw.clone()).ok())
            .filter(|edit| {
                non_blank(edit.activity_id.as_deref()).is_some()
                    || non_blank(edit.label.as_deref()).is_some()
            });
        match (profile, activity) {
            (Some(profile), Some(activity)) => CandidateEdit::ProfileAndActivity(profile, activity),
            (Some(profile), None) => CandidateEdit::Profile(profile),
            (None, Some(activity)) => CandidateEdit::Activity(activity),
            (None, None) => CandidateEdit::Unknown,
        }
    }
}

/// Why a candidate edit was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectionCode {
    UnresolvedProfile,
    RegionDrift,
    VintageDrift,
    UnresolvedActivity,
    UnrecognizedEdit,
}

impl RejectionCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            RejectionCode::UnresolvedProfile => "unresolved_profile",
            RejectionCode::RegionDrift => "region_drift",
            RejectionCode::VintageDrift => "vintage_drift",
            RejectionCode::UnresolvedActivity => "unresolved_activity",
            RejectionCode::UnrecognizedEdit => "unrecognized_edit",
        }
    }
}

impl fmt::Display for RejectionCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Partial patch the caller can offer as a one-click fix.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Corrections {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile_id: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub suggestions: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuardVerdict {
    pub allowed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<RejectionCode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub corrections: Option<Corrections>,
}

impl GuardVerdict {
    pub fn allow() -> Self {
        Self {
            allowed: true,
            code: None,
            message: None,
            corrections: None,
        }
    }

    fn reject(code: RejectionCode, message: String, corrections: Option<Corrections>) -> Self {
        Self {
            allowed: false,
            code: Some(code),
            message: Some(message),
            corrections,
        }
    }

    /// Treat a rejection as a hard stop.
    pub fn ensure_allowed(&self) -> Result<(), TrustError> {
        if self.allowed {
            return Ok(());
        }
        Err(TrustError::Rejected {
            code: self.code.unwrap_or(RejectionCode::UnrecognizedEdit),
            message: self.message.clone().unwrap_or_default(),
        })
    }
}

/// Inputs the guard checks a candidate against.
#[derive(Debug, Clone, Copy)]
pub struct GuardContext<'a> {
    pub catalog: &'a Catalog,
    /// Profile currently committed to scenario state, if any.
    pub committed_profile_id: Option<&'a str>,
    /// Raw user request that prompted the proposer.
    pub intent_text: &'a str,
    pub suggestion_limit: usize,
}

/// Validate one candidate edit.
pub fn guard_intent(candidate: &CandidateEdit, ctx: &GuardContext<'_>) -> GuardVerdict {
    let rejection = match candidate {
        CandidateEdit::Profile(profile) => check_profile(profile, ctx),
        CandidateEdit::Activity(activity) => check_activity(activity, ctx),
        CandidateEdit::ProfileAndActivity(profile, activity) => {
            check_profile(profile, ctx).or_else(|| check_activity(activity, ctx))
        }
        CandidateEdit::Unknown => Some(GuardVerdict::reject(
            RejectionCode::UnrecognizedEdit,
            "Unrecognized edit: expected a profile or activity change".to_string(),
            None,
        )),
    };
    match rejection {
        Some(verdict) => {
            tracing::info!(
                code = %verdict.code.unwrap_or(RejectionCode::UnrecognizedEdit),
                reason = verdict.message.as_deref().unwrap_or_default(),
                "candidate edit rejected"
            );
            verdict
        }
        None => GuardVerdict::allow(),
    }
}

/// Region and year of a profile id, falling back to the catalog's region.
struct ProfileLocation {
    region: String,
    year: Option<u16>,
}

fn locate(profile_id: &str, catalog_entry: Option<&Profile>) -> Option<ProfileLocation> {
    match ProfileTokens::parse(profile_id) {
        Some(tokens) => Some(ProfileLocation {
            region: tokens.region,
            year: tokens.year,
        }),
        None => catalog_entry.map(|profile| ProfileLocation {
            region: profile.region.clone(),
            year: None,
        }),
    }
}

fn check_profile(edit: &ProfileEdit, ctx: &GuardContext<'_>) -> Option<GuardVerdict> {
    let profile_id = edit.profile_id.trim();
    let Some(profile) = ctx.catalog.profile(profile_id) else {
        return Some(GuardVerdict::reject(
            RejectionCode::UnresolvedProfile,
            format!("Unknown profile {profile_id}: not present in the catalog"),
            None,
        ));
    };

    let committed_id = non_blank(ctx.committed_profile_id)?;
    let Some(current) = locate(committed_id, ctx.catalog.profile(committed_id)) else {
        return Some(GuardVerdict::reject(
            RejectionCode::UnresolvedProfile,
            format!("Committed profile {committed_id} cannot be located, so drift cannot be checked"),
            None,
        ));
    };
    let candidate = locate(profile_id, Some(profile))?;

    if !candidate.region.eq_ignore_ascii_case(&current.region)
        && !requests_region_change(ctx.intent_text, &candidate.region, profile)
    {
        return Some(GuardVerdict::reject(
            RejectionCode::RegionDrift,
            format!(
                "Profile {profile_id} changes region from {} to {} but the request did not ask for a region change",
                current.region, candidate.region
            ),
            Some(Corrections {
                region: Some(current.region),
                ..Corrections::default()
            }),
        ));
    }

    if let (Some(current_year), Some(candidate_year)) = (current.year, candidate.year) {
        if current_year != candidate_year
            && !requests_year_change(ctx.intent_text, candidate_year)
        {
            return Some(GuardVerdict::reject(
                RejectionCode::VintageDrift,
                format!(
                    "Profile {profile_id} changes data year from {current_year} to {candidate_year} but the request did not ask for a different year"
                ),
                Some(Corrections {
                    profile_id: nearest_vintage(ctx.catalog, &current.region, current_year),
                    ..Corrections::default()
                }),
            ));
        }
    }
    None
}

fn check_activity(edit: &ActivityEdit, ctx: &GuardContext<'_>) -> Option<GuardVerdict> {
    let activity_id = non_blank(edit.activity_id.as_deref());
    if activity_id.is_some_and(|id| ctx.catalog.activity(id).is_some()) {
        return None;
    }
    let query = non_blank(edit.label.as_deref())
        .or(activity_id)
        .unwrap_or_default();
    let suggestions = ctx
        .catalog
        .search_activities(query, ctx.suggestion_limit)
        .into_iter()
        .map(|matched| matched.id)
        .collect();
    Some(GuardVerdict::reject(
        RejectionCode::UnresolvedActivity,
        "Unknown activity".to_string(),
        Some(Corrections {
            suggestions,
            ..Corrections::default()
        }),
    ))
}

/// Catalog profile in `region` whose year is closest to `year`; ties by id.
fn nearest_vintage(catalog: &Catalog, region: &str, year: u16) -> Option<String> {
    catalog
        .profiles
        .iter()
        .filter_map(|profile| {
            let location = locate(&profile.profile_id, Some(profile))?;
            let profile_year = location.year?;
            location
                .region
                .eq_ignore_ascii_case(region)
                .then_some((profile_year.abs_diff(year), &profile.profile_id))
        })
        .min()
        .map(|(_, profile_id)| profile_id.clone())
}

fn region_phrase() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(
            r"(?i)\b(change|switch|move|different|another|new|other)\s+(the\s+|my\s+)?region\b|\bregion\s+to\b",
        )
        .expect("valid region phrase regex")
    })
}

fn year_phrase() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(
            r"(?i)\b(change|switch|update|newer|older|latest|different|another)\s+(the\s+|my\s+)?(year|vintage|dataset)\b|\b(year|vintage)\s+to\b",
        )
        .expect("valid year phrase regex")
    })
}

fn requests_region_change(intent: &str, region: &str, profile: &Profile) -> bool {
    if region_phrase().is_match(intent) {
        return true;
    }
    // Short region codes only count in upper case so "us" in prose is ignored.
    if contains_word(intent, &region.to_uppercase(), false) {
        return true;
    }
    let name = region_name(&profile.label);
    name.chars().count() > 3 && contains_word(intent, &name, true)
}

fn requests_year_change(intent: &str, year: u16) -> bool {
    year_phrase().is_match(intent) || contains_word(intent, &year.to_string(), false)
}

/// Profile label minus numeric tokens, e.g. "United States 2025" -> "United States".
fn region_name(label: &str) -> String {
    label
        .split_whitespace()
        .filter(|word| !word.chars().all(|ch| ch.is_ascii_digit()))
        .collect::<Vec<_>>()
        .join(" ")
}

fn contains_word(haystack: &str, word: &str, case_insensitive: bool) -> bool {
    if word.is_empty() {
        return false;
    }
    let flags = if case_insensitive { "(?i)" } else { "" };
    Regex::new(&format!(r"{flags}\b{}\b", regex::escape(word)))
        .map(|pattern| pattern.is_match(haystack))
        .unwrap_or(false)
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|value| !value.is_empty())
}

#[cfg(test)]
#[path = "guard_tests.rs"]
mod tests;
