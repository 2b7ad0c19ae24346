//! Domain primitives shared across taxtally

use crate::error::TaxtallyError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Identifier of an iNaturalist observation.
///
/// Opaque to taxtally: it is only ever interpolated into request paths and
/// echoed back in output, so the only validation is that it is usable as a
/// single path segment.
///
/// # Examples
///
/// ```
/// use taxtally_common::ObservationId;
///
/// let id: ObservationId = " 12345 ".parse().unwrap();
/// assert_eq!(id.as_str(), "12345");
/// assert!("".parse::<ObservationId>().is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ObservationId(String);

impl ObservationId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for ObservationId {
    type Err = TaxtallyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() || trimmed.contains(|c: char| c.is_whitespace() || c == '/') {
            return Err(TaxtallyError::InvalidObservationId(s.to_string()));
        }
        Ok(Self(trimmed.to_string()))
    }
}

impl TryFrom<String> for ObservationId {
    type Error = TaxtallyError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ObservationId> for String {
    fn from(id: ObservationId) -> Self {
        id.0
    }
}

impl From<u64> for ObservationId {
    fn from(id: u64) -> Self {
        Self(id.to_string())
    }
}

impl fmt::Display for ObservationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Taxonomic rank as reported by the remote service.
///
/// Only `order` and `family` drive resolution; the remaining well-known
/// ranks exist for display, and anything else is kept verbatim in
/// [`Rank::Other`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Rank {
    Kingdom,
    Phylum,
    Class,
    Order,
    Family,
    Genus,
    Species,
    Other(String),
}

impl Rank {
    pub fn as_str(&self) -> &str {
        match self {
            Rank::Kingdom => "kingdom",
            Rank::Phylum => "phylum",
            Rank::Class => "class",
            Rank::Order => "order",
            Rank::Family => "family",
            Rank::Genus => "genus",
            Rank::Species => "species",
            Rank::Other(raw) => raw,
        }
    }

    /// Rank with its first letter upper-cased, e.g. `Species`.
    pub fn display_name(&self) -> String {
        let raw = self.as_str();
        let mut chars = raw.chars();
        match chars.next() {
            Some(first) => first.to_uppercase().chain(chars).collect(),
            None => String::new(),
        }
    }
}

impl From<&str> for Rank {
    fn from(raw: &str) -> Self {
        match raw {
            "kingdom" => Rank::Kingdom,
            "phylum" => Rank::Phylum,
            "class" => Rank::Class,
            "order" => Rank::Order,
            "family" => Rank::Family,
            "genus" => Rank::Genus,
            "species" => Rank::Species,
            other => Rank::Other(other.to_string()),
        }
    }
}

impl From<String> for Rank {
    fn from(raw: String) -> Self {
        Rank::from(raw.as_str())
    }
}

impl From<Rank> for String {
    fn from(rank: Rank) -> Self {
        rank.as_str().to_string()
    }
}

impl fmt::Display for Rank {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
