//! Read-only activity and profile catalog.
//!
//! The catalog is ground truth for the diff labels and the intent guard. It is
//! loaded once by the caller and never mutated here.
use crate::ranking::{rank_candidates, RankedMatch};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Leading token of structured profile ids.
const PROFILE_PREFIX: &str = "PROFILE";

/// A known emitting activity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Activity {
    pub activity_id: String,
    pub label: String,
    pub category: String,
    pub layer_id: String,
}

/// A known emission-factor profile, keyed by region and vintage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub profile_id: String,
    pub label: String,
    pub region: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Catalog {
    #[serde(default)]
    pub activities: Vec<Activity>,
    #[serde(default)]
    pub profiles: Vec<Profile>,
}

impl Catalog {
    pub fn activity(&self, activity_id: &str) -> Option<&Activity> {
        self.activities
            .iter()
            .find(|activity| activity.activity_id == activity_id)
    }

    pub fn profile(&self, profile_id: &str) -> Option<&Profile> {
        self.profiles
            .iter()
            .find(|profile| profile.profile_id == profile_id)
    }

    /// Rank catalog activities by similarity to a free-text query.
    pub fn search_activities(&self, query: &str, limit: usize) -> Vec<RankedMatch> {
        rank_candidates(
            query,
            self.activities
                .iter()
                .map(|activity| (activity.activity_id.as_str(), activity.label.as_str())),
            limit,
        )
    }
}

/// Region and vintage tokens parsed from a `PROFILE.<REGION>.<YEAR>` id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileTokens {
    pub region: String,
    pub year: Option<u16>,
}

impl ProfileTokens {
    pub fn parse(profile_id: &str) -> Option<Self> {
        let tokens: Vec<&str> = profile_id.trim().split('.').collect();
        if tokens.len() < 2 || !tokens[0].eq_ignore_ascii_case(PROFILE_PREFIX) {
            return None;
        }
        let region = tokens[1].trim();
        if region.is_empty() {
            return None;
        }
        let year = tokens
            .last()
            .filter(|_| tokens.len() >= 3)
            .filter(|last| last.len() == 4 && last.chars().all(|ch| ch.is_ascii_digit()))
            .and_then(|last| last.parse().ok());
        Some(Self {
            region: region.to_string(),
            year,
        })
    }
}

/// Load the catalog JSON (`{"activities": [...], "profiles": [...]}`).
pub fn load_catalog(path: &Path) -> Result<Catalog> {
    let bytes = fs::read(path).with_context(|| format!("read catalog {}", path.display()))?;
    let catalog: Catalog = serde_json::from_slice(&bytes).context("parse catalog JSON")?;
    tracing::debug!(
        activities = catalog.activities.len(),
        profiles = catalog.profiles.len(),
        "catalog loaded"
    );
    Ok(catalog)
}

#[cfg(test)]
pub(crate) fn sample_catalog() -> Catalog {
    let activity = |id: &str, label: &str, category: &str, layer: &str| Activity {
        activity_id: id.to_string(),
        label: label.to_string(),
        category: category.to_string(),
        layer_id: layer.to_string(),
    };
    let profile = |id: &str, label: &str, region: &str| Profile {
        profile_id: id.to_string(),
        label: label.to_string(),
        region: region.to_string(),
    };
    Catalog {
        activities: vec![
            activity("ACT.ONE", "Grid electricity", "home_energy", "energy_use"),
            activity("ACT.TWO", "Natural gas heating", "home_energy", "energy_use"),
            activity("ACT.THREE", "Petrol car travel", "transport", "mobility"),
            activity("ACT.FOUR", "Short-haul flight", "transport", "mobility"),
            activity("ACT.FIVE", "Beef consumption", "food_and_diet", "consumption"),
        ],
        profiles: vec![
            profile("PROFILE.CA.2024", "Canada 2024", "CA"),
            profile("PROFILE.CA.2025", "Canada 2025", "CA"),
            profile("PROFILE.US.2025", "United States 2025", "US"),
            profile("PROFILE.UK.2023", "United Kingdom 2023", "UK"),
        ],
    }
}
