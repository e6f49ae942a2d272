use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value as JSValue;

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct ElectionCandidate {
    pub name: String,
    pub withdrawn: Option<bool>,
}

/// One slot of a ranking: a single name, or several names sharing the same rank.
#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RankingEntry {
    Single(String),
    Shared(Vec<String>),
}

impl RankingEntry {
    pub fn names(&self) -> Vec<String> {
        match self {
            RankingEntry::Single(name) if name.is_empty() => Vec::new(),
            RankingEntry::Single(name) => vec![name.clone()],
            RankingEntry::Shared(names) => names.clone(),
        }
    }
}

#[derive(PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct ElectionBallot {
    /// Defaults to 1.
    pub count: Option<u64>,
    pub ranking: Option<Vec<RankingEntry>>,
    /// Explicit rank values, lower is preferred. Numbers or strings.
    pub ranks: Option<BTreeMap<String, JSValue>>,
}

#[derive(PartialEq, Debug, Clone, Default, Serialize, Deserialize)]
pub struct ElectionRules {
    pub algorithm: Option<String>,
    pub seats: Option<u32>,
    pub elimination: Option<String>,
    pub tiebreak: Option<Vec<String>>,
    #[serde(rename = "tiebreakSeries")]
    pub tiebreak_series: Option<bool>,
    #[serde(rename = "randomSeed")]
    pub random_seed: Option<JSValue>,
    pub precision: Option<u32>,
    pub omega: Option<String>,
}

#[derive(PartialEq, Debug, Clone, Default, Serialize, Deserialize)]
pub struct ElectionConfig {
    #[serde(default)]
    pub candidates: Vec<ElectionCandidate>,
    #[serde(default)]
    pub ballots: Vec<ElectionBallot>,
    #[serde(default)]
    pub rules: ElectionRules,
}

/// The description of the tabulation, echoed at the top of the summary.
#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    pub algorithm: String,
    pub seats: u32,
    pub elimination: String,
    pub threshold: Option<String>,
}
