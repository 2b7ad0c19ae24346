//! Observation lookups: taxonomic order/family and observer identity
//!
//! Resolving an observation below order rank costs one extra request per
//! ancestor visited, so the ancestry walk stops as soon as every rank that
//! was asked for has been found.

use crate::api::{InatClient, TaxonRecord};
use crate::error::ResolveError;
use taxtally_common::{ObservationId, Rank};
use tracing::{debug, instrument, warn};

/// Outcome of resolving one observation's taxonomy.
///
/// On the order dimension exactly one of `order_name` and `error` is set.
/// `family_name` is independent: it can be known even when the order is
/// not.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolutionResult {
    pub order_name: Option<String>,
    pub family_name: Option<String>,
    pub error: Option<ResolveError>,
    /// Rank of the observation's own taxon, kept for diagnostics
    pub observed_rank: Option<Rank>,
    /// Name of the observation's own taxon, kept for diagnostics
    pub observed_rank_name: Option<String>,
}

impl ResolutionResult {
    /// A failure before any taxon was seen.
    pub fn failed(error: ResolveError) -> Self {
        Self {
            order_name: None,
            family_name: None,
            error: Some(error),
            observed_rank: None,
            observed_rank_name: None,
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Outcome of looking up an observation's observer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserResult {
    pub login: String,
    pub name: Option<String>,
}

impl UserResult {
    /// Name shown in summaries; falls back to the login.
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.login)
    }
}

/// Which ranks have been found so far during one resolution
struct Search {
    want_family: bool,
    order_name: Option<String>,
    family_name: Option<String>,
}

impl Search {
    /// Take the name of `taxon` if it sits at a rank still being looked for.
    fn consider(&mut self, taxon: &TaxonRecord) {
        match taxon.rank {
            Some(Rank::Order) if self.order_name.is_none() => {
                self.order_name = taxon.name.clone();
            },
            Some(Rank::Family) if self.want_family && self.family_name.is_none() => {
                self.family_name = taxon.name.clone();
            },
            _ => {},
        }
    }

    fn satisfied(&self) -> bool {
        self.order_name.is_some() && (!self.want_family || self.family_name.is_some())
    }
}

/// Resolves observations against the API through a borrowed client
pub struct TaxonomyResolver<'a> {
    client: &'a mut InatClient,
}

impl<'a> TaxonomyResolver<'a> {
    pub fn new(client: &'a mut InatClient) -> Self {
        Self { client }
    }

    /// Resolve the order (and family, when `want_family`) of an observation.
    ///
    /// Never fails outright: problems are reported through
    /// [`ResolutionResult::error`].
    #[instrument(level = "debug", skip_all, fields(observation_id = %observation_id, want_family = want_family))]
    pub async fn resolve(
        &mut self,
        observation_id: &ObservationId,
        want_family: bool,
    ) -> ResolutionResult {
        let observation = match self.client.get_observation(observation_id).await {
            Ok(Some(observation)) => observation,
            Ok(None) => return ResolutionResult::failed(ResolveError::NoResults),
            Err(e) => return ResolutionResult::failed(e.into()),
        };

        let Some(taxon) = observation.taxon else {
            return ResolutionResult::failed(ResolveError::NoTaxonInfo);
        };

        let mut search = Search {
            want_family,
            order_name: None,
            family_name: None,
        };
        search.consider(&taxon);

        let ancestors = taxon.ancestor_ids();
        if !search.satisfied() {
            self.walk_ancestry(&ancestors, &mut search).await;
        }

        let error = match search.order_name {
            Some(_) => None,
            None if ancestors.is_empty() => Some(ResolveError::NoAncestryInfo),
            None => Some(ResolveError::OrderNotFound),
        };
        finish(search, &taxon, error)
    }

    /// Visit ancestors root-first until the search is satisfied. A failed
    /// ancestor lookup is logged and skipped.
    async fn walk_ancestry(&mut self, ancestors: &[&str], search: &mut Search) {
        for ancestor_id in ancestors {
            match self.client.get_taxon(ancestor_id).await {
                Ok(Some(ancestor)) => search.consider(&ancestor),
                Ok(None) => debug!(ancestor_id, "Ancestor taxon not found, skipping"),
                Err(e) => warn!(ancestor_id, error = %e, "Failed to get ancestor info, skipping"),
            }

            if search.satisfied() {
                break;
            }
        }
    }

    /// Look up who made an observation.
    #[instrument(level = "debug", skip_all, fields(observation_id = %observation_id))]
    pub async fn resolve_user(
        &mut self,
        observation_id: &ObservationId,
    ) -> Result<UserResult, ResolveError> {
        let observation = self
            .client
            .get_observation(observation_id)
            .await?
            .ok_or(ResolveError::NoResults)?;

        let user = observation.user.ok_or(ResolveError::NoUserInfo)?;
        let name = user.name.filter(|n| !n.trim().is_empty());
        let login = user.login.filter(|l| !l.trim().is_empty());

        match (login, name) {
            (Some(login), name) => Ok(UserResult { login, name }),
            (None, Some(name)) => Ok(UserResult {
                login: name.clone(),
                name: Some(name),
            }),
            (None, None) => Err(ResolveError::UserIncomplete),
        }
    }
}

fn finish(search: Search, taxon: &TaxonRecord, error: Option<ResolveError>) -> ResolutionResult {
    ResolutionResult {
        order_name: search.order_name,
        family_name: search.family_name,
        error,
        observed_rank: taxon.rank.clone(),
        observed_rank_name: taxon.name.clone(),
    }
}
