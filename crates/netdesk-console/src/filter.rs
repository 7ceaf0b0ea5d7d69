//! Client-side filter predicates
//!
//! A [`FilterState`] is built from an explicit [`FilterInput`] (the values
//! of the filter form) and ANDs three predicates: free-text search, exact
//! status and an inclusive date range.

use chrono::NaiveDate;
use netdesk_core::{Error, Filterable, Result};
use serde::{Deserialize, Serialize};

/// Raw filter form values
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterInput {
    /// Free-text search; empty matches everything
    #[serde(default)]
    pub search: String,
    /// Status value; empty or `all` disables the predicate
    #[serde(default)]
    pub status: String,
    /// Start date, `YYYY-MM-DD`
    #[serde(default)]
    pub from: Option<String>,
    /// End date, `YYYY-MM-DD`
    #[serde(default)]
    pub to: Option<String>,
}

impl FilterInput {
    /// Input matching every record
    #[must_use]
    pub fn all() -> Self {
        Self::default()
    }

    /// Set the status
    #[must_use]
    pub fn with_status(mut self, status: impl Into<String>) -> Self {
        self.status = status.into();
        self
    }

    /// Set the search text
    #[must_use]
    pub fn with_search(mut self, search: impl Into<String>) -> Self {
        self.search = search.into();
        self
    }

    /// Set the date range
    #[must_use]
    pub fn with_range(mut self, from: Option<&str>, to: Option<&str>) -> Self {
        self.from = from.map(ToString::to_string);
        self.to = to.map(ToString::to_string);
        self
    }
}

/// Status predicate
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum StatusFilter {
    /// No status restriction
    #[default]
    All,
    /// Only records whose status equals this value
    Only(String),
}

impl StatusFilter {
    /// Parse a form value; `""` and `all` disable the predicate
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        if raw.is_empty() || raw.eq_ignore_ascii_case("all") {
            Self::All
        } else {
            Self::Only(raw.to_string())
        }
    }

    /// Whether a record status passes
    #[must_use]
    pub fn matches(&self, status: Option<&str>) -> bool {
        match self {
            Self::All => true,
            Self::Only(wanted) => status == Some(wanted.as_str()),
        }
    }
}

/// Inclusive date range; an open bound is unbounded
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DateRange {
    /// First day included
    pub from: Option<NaiveDate>,
    /// Last day included
    pub to: Option<NaiveDate>,
}

impl DateRange {
    /// Whether no bound is set
    #[must_use]
    pub const fn is_unbounded(&self) -> bool {
        self.from.is_none() && self.to.is_none()
    }

    /// Whether `date` lies in the range
    ///
    /// Records without a date only pass an unbounded range.
    #[must_use]
    pub fn contains(&self, date: Option<NaiveDate>) -> bool {
        if self.is_unbounded() {
            return true;
        }
        let Some(date) = date else {
            return false;
        };
        self.from.is_none_or(|from| date >= from) && self.to.is_none_or(|to| date <= to)
    }
}

/// Compiled filter predicates
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterState {
    search: String,
    status: StatusFilter,
    range: DateRange,
}

impl FilterState {
    /// Filter matching every record
    #[must_use]
    pub fn identity() -> Self {
        Self::default()
    }

    /// Build from form values
    ///
    /// # Errors
    ///
    /// Returns a validation error for unparseable dates or a range whose
    /// start is after its end.
    pub fn from_input(input: &FilterInput) -> Result<Self> {
        let from = parse_bound("from", input.from.as_deref())?;
        let to = parse_bound("to", input.to.as_deref())?;
        if let (Some(from), Some(to)) = (from, to)
            && from > to
        {
            return Err(Error::validation("to", "End date is before start date"));
        }

        Ok(Self {
            search: input.search.trim().to_lowercase(),
            status: StatusFilter::parse(&input.status),
            range: DateRange { from, to },
        })
    }

    /// Status predicate
    #[must_use]
    pub const fn status(&self) -> &StatusFilter {
        &self.status
    }

    /// Whether the filter lets everything through
    #[must_use]
    pub fn is_identity(&self) -> bool {
        self.search.is_empty() && self.status == StatusFilter::All && self.range.is_unbounded()
    }

    /// Whether a record passes every predicate
    #[must_use]
    pub fn matches<T: Filterable>(&self, item: &T) -> bool {
        let text = self.search.is_empty()
            || item
                .search_fields()
                .iter()
                .any(|field| field.to_lowercase().contains(&self.search));

        text && self.status.matches(item.status()) && self.range.contains(item.date())
    }

    /// Positions of the matching records, in collection order
    #[must_use]
    pub fn apply<T: Filterable>(&self, items: &[T]) -> Vec<usize> {
        items
            .iter()
            .enumerate()
            .filter(|(_, item)| self.matches(*item))
            .map(|(index, _)| index)
            .collect()
    }
}

fn parse_bound(field: &str, raw: Option<&str>) -> Result<Option<NaiveDate>> {
    match raw.map(str::trim) {
        None | Some("") => Ok(None),
        Some(raw) => NaiveDate::parse_from_str(raw, "%Y-%m-%d")
            .map(Some)
            .map_err(|_| Error::validation(field, format!("Invalid date: {raw}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use netdesk_core::types::Ticket;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;
    use serde_json::json;

    fn ticket(id: i64, subject: &str, status: &str, created: &str) -> Ticket {
        serde_json::from_value(json!({
            "id": id,
            "subject": subject,
            "status": status,
            "priority": "medium",
            "createdAt": created,
            "customer": {"name": "Dewi"}
        }))
        .unwrap()
    }

    fn tickets() -> Vec<Ticket> {
        vec![
            ticket(1, "Router reboot loop", "open", "2024-05-01T08:00:00Z"),
            ticket(2, "Slow speed at night", "closed", "2024-05-03"),
            ticket(3, "ONT LOS red light", "open", "2024-05-09"),
        ]
    }

    #[test]
    fn test_search_is_case_insensitive() {
        let filter = FilterState::from_input(&FilterInput::all().with_search("router")).unwrap();
        assert_eq!(filter.apply(&tickets()), vec![0]);

        let filter = FilterState::from_input(&FilterInput::all().with_search("DEWI")).unwrap();
        assert_eq!(filter.apply(&tickets()), vec![0, 1, 2]);
    }

    #[test]
    fn test_status_is_exact_and_all_disables() {
        let open = FilterState::from_input(&FilterInput::all().with_status("open")).unwrap();
        assert_eq!(open.apply(&tickets()), vec![0, 2]);

        let partial = FilterState::from_input(&FilterInput::all().with_status("ope")).unwrap();
        assert!(partial.apply(&tickets()).is_empty());

        let all = FilterState::from_input(&FilterInput::all().with_status("all")).unwrap();
        assert!(all.is_identity());
    }

    #[test]
    fn test_date_range_is_inclusive() {
        let input = FilterInput::all().with_range(Some("2024-05-01"), Some("2024-05-03"));
        let filter = FilterState::from_input(&input).unwrap();

        assert_eq!(filter.apply(&tickets()), vec![0, 1]);
    }

    #[test]
    fn test_predicates_are_anded() {
        let input = FilterInput::all()
            .with_status("open")
            .with_search("light")
            .with_range(Some("2024-05-02"), None);
        let filter = FilterState::from_input(&input).unwrap();

        assert_eq!(filter.apply(&tickets()), vec![2]);
    }

    #[test]
    fn test_invalid_ranges_are_rejected() {
        let bad_date = FilterInput::all().with_range(Some("05/01/2024"), None);
        assert!(FilterState::from_input(&bad_date).unwrap_err().is_validation());

        let reversed = FilterInput::all().with_range(Some("2024-06-01"), Some("2024-05-01"));
        assert!(FilterState::from_input(&reversed).unwrap_err().is_validation());
    }

    #[test]
    fn test_records_without_date_only_pass_unbounded_range() {
        let range = DateRange {
            from: NaiveDate::from_ymd_opt(2024, 1, 1),
            to: None,
        };
        assert!(!range.contains(None));
        assert!(DateRange::default().contains(None));
    }

    proptest! {
        #[test]
        fn filter_returns_ordered_subsequence(
            statuses in prop::collection::vec(prop::sample::select(vec!["open", "closed", "pending"]), 0..40),
            wanted in prop::sample::select(vec!["all", "open", "closed", "pending"]),
            search in "[a-z]{0,2}",
        ) {
            let items: Vec<Ticket> = statuses
                .iter()
                .enumerate()
                .map(|(i, s)| ticket(i64::try_from(i).unwrap(), &format!("case {i} {s}"), s, "2024-01-01"))
                .collect();
            let filter = FilterState::from_input(&FilterInput::all().with_status(wanted).with_search(search)).unwrap();

            let picked = filter.apply(&items);
            prop_assert!(picked.len() <= items.len());
            prop_assert!(picked.windows(2).all(|w| w[0] < w[1]));
            for index in picked {
                prop_assert!(filter.matches(&items[index]));
            }
        }

        #[test]
        fn identity_keeps_everything_in_order(n in 0usize..50) {
            let items: Vec<Ticket> = (0..n)
                .map(|i| ticket(i64::try_from(i).unwrap(), "x", "open", "2024-01-01"))
                .collect();

            prop_assert_eq!(FilterState::identity().apply(&items), (0..n).collect::<Vec<_>>());
        }
    }
}
