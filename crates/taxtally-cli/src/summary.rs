//! Result tallies and their text rendering

use crate::resolver::{ResolutionResult, UserResult};
use std::collections::BTreeMap;
use std::fmt::Write as _;

/// How one taxonomy result was counted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tally {
    KnownOrder,
    UnknownOrder,
}

/// Order and family counters for a taxonomy run.
///
/// Every recorded observation lands in exactly one order bucket (a named
/// order or unknown), so [`SummaryCounters::total`] equals the number of
/// observations recorded.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SummaryCounters {
    pub orders: BTreeMap<String, u64>,
    pub families: BTreeMap<String, BTreeMap<String, u64>>,
    pub unknown_order: u64,
    pub unknown_family_by_order: BTreeMap<String, u64>,
    pub unknown_family_unknown_order: u64,
    include_family: bool,
}

impl SummaryCounters {
    pub fn new(include_family: bool) -> Self {
        Self {
            include_family,
            ..Self::default()
        }
    }

    /// Fold one resolution into the counters.
    pub fn record(&mut self, result: &ResolutionResult) -> Tally {
        let order = match (&result.error, &result.order_name) {
            (None, Some(order)) => order,
            _ => {
                self.record_unknown();
                return Tally::UnknownOrder;
            },
        };

        *self.orders.entry(order.clone()).or_default() += 1;

        if self.include_family {
            match &result.family_name {
                Some(family) => {
                    *self
                        .families
                        .entry(order.clone())
                        .or_default()
                        .entry(family.clone())
                        .or_default() += 1;
                },
                None => *self.unknown_family_by_order.entry(order.clone()).or_default() += 1,
            }
        }

        Tally::KnownOrder
    }

    /// Count an observation whose order could not be determined.
    pub fn record_unknown(&mut self) {
        self.unknown_order += 1;
        if self.include_family {
            self.unknown_family_unknown_order += 1;
        }
    }

    /// Observations counted, known and unknown.
    pub fn total(&self) -> u64 {
        self.orders.values().sum::<u64>() + self.unknown_order
    }

    /// Render the "Summary by Order" block, plus family breakdowns when
    /// family tracking is on.
    pub fn render(&self) -> String {
        let mut out = String::from("Summary by Order:\n");

        for (order, count) in by_count_desc(&self.orders) {
            let _ = writeln!(out, "{:6}  {}", count, order);
        }
        if self.unknown_order > 0 {
            let _ = writeln!(out, "{:6}  Unknown order", self.unknown_order);
        }

        if !self.include_family {
            return out;
        }

        let empty = BTreeMap::new();
        for order in self.orders.keys() {
            let _ = writeln!(out, "\nFamilies within {}:", order);
            for (family, count) in by_count_desc(self.families.get(order).unwrap_or(&empty)) {
                let _ = writeln!(out, "{:6}  {}", count, family);
            }
            if let Some(&unknown) = self.unknown_family_by_order.get(order) {
                if unknown > 0 {
                    let _ = writeln!(out, "{:6}  Unknown family", unknown);
                }
            }
        }

        if self.unknown_family_unknown_order > 0 {
            let _ = writeln!(
                out,
                "\nUnknown families within unknown orders: {}",
                self.unknown_family_unknown_order
            );
        }

        out
    }
}

/// Observer counters for a user-lookup run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserSummary {
    /// login -> (display name, count)
    pub users: BTreeMap<String, (String, u64)>,
    pub errors: u64,
}

impl UserSummary {
    pub fn record(&mut self, user: &UserResult) {
        let entry = self
            .users
            .entry(user.login.clone())
            .or_insert_with(|| (user.display_name().to_string(), 0));
        entry.1 += 1;
    }

    pub fn record_error(&mut self) {
        self.errors += 1;
    }

    pub fn total(&self) -> u64 {
        self.users.values().map(|(_, count)| count).sum::<u64>() + self.errors
    }

    pub fn render(&self) -> String {
        let mut out = String::from("Summary by User:\n");
        let counts: BTreeMap<String, u64> = self
            .users
            .iter()
            .map(|(login, (_, count))| (login.clone(), *count))
            .collect();

        for (login, count) in by_count_desc(&counts) {
            let name = self.users.get(login).map(|(name, _)| name.as_str()).unwrap_or("Unknown");
            let _ = writeln!(out, "{:6}  {} ({})", count, name, login);
        }
        out
    }
}

/// Entries sorted by count, highest first; ties by key.
fn by_count_desc(counts: &BTreeMap<String, u64>) -> Vec<(&String, u64)> {
    let mut entries: Vec<_> = counts.iter().map(|(k, v)| (k, *v)).collect();
    entries.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
    entries
}

/// Final report for a run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Summary {
    Taxonomy(SummaryCounters),
    Users(UserSummary),
}

impl Summary {
    pub fn total(&self) -> u64 {
        match self {
            Summary::Taxonomy(counters) => counters.total(),
            Summary::Users(users) => users.total(),
        }
    }

    pub fn render(&self) -> String {
        match self {
            Summary::Taxonomy(counters) => counters.render(),
            Summary::Users(users) => users.render(),
        }
    }
}
