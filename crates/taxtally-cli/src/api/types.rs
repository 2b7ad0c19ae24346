//! API response types
//!
//! Only the fields taxtally reads are modelled; everything else in the
//! iNaturalist payloads is ignored. All fields are optional because the
//! API omits or nulls them freely.

use serde::{Deserialize, Serialize};
use taxtally_common::Rank;

/// Standard `/v1` response envelope
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResultsPage<T> {
    #[serde(default)]
    pub total_results: Option<u64>,
    #[serde(default = "Vec::new")]
    pub results: Vec<T>,
}

impl<T> ResultsPage<T> {
    /// The first result, which is the only one for id lookups.
    pub fn into_first(self) -> Option<T> {
        self.results.into_iter().next()
    }
}

/// An observation record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Observation {
    #[serde(default)]
    pub taxon: Option<TaxonRecord>,
    #[serde(default)]
    pub user: Option<UserRecord>,
}

/// A taxon, either embedded in an observation or from `/v1/taxa/{id}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaxonRecord {
    #[serde(default)]
    pub id: Option<u64>,
    #[serde(default)]
    pub rank: Option<Rank>,
    #[serde(default)]
    pub name: Option<String>,
    /// Slash-delimited ancestor ids, root first, e.g. `"48460/47170/47169"`
    #[serde(default)]
    pub ancestry: Option<String>,
}

impl TaxonRecord {
    /// Ancestor ids in the order the API lists them. Empty segments are
    /// dropped, so `""` and `None` both yield an empty chain.
    pub fn ancestor_ids(&self) -> Vec<&str> {
        self.ancestry
            .as_deref()
            .map(|chain| {
                chain
                    .split('/')
                    .map(str::trim)
                    .filter(|id| !id.is_empty())
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// The observer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserRecord {
    #[serde(default)]
    pub login: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}
