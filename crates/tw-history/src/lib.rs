//! Per-tab navigation history with a cursor and forward truncation.

use chrono::DateTime;
use chrono::Utc;
use core::fmt;
use tw_core::Location;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryEntry {
    pub location: Location,
    pub visited_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryError {
    NoPreviousEntry,
    NoNextEntry,
    Empty,
    OutOfRange { index: usize, len: usize },
}

impl fmt::Display for HistoryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoPreviousEntry => f.write_str("no previous page in history"),
            Self::NoNextEntry => f.write_str("no next page in history"),
            Self::Empty => f.write_str("history is empty"),
            Self::OutOfRange { index, len } => {
                write!(f, "history index {index} is out of range ({len} entries)")
            }
        }
    }
}

impl std::error::Error for HistoryError {}

/// Ordered visits plus a cursor. `cursor` is `None` exactly when there are
/// no entries; otherwise it indexes a valid entry. `back`, `forward` and
/// `go_to` only move the cursor.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NavigationHistory {
    entries: Vec<HistoryEntry>,
    cursor: Option<usize>,
}

impl NavigationHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drops everything ahead of the cursor, appends, and moves onto the new entry.
    pub fn visit(&mut self, location: Location) {
        self.visit_at(location, Utc::now());
    }

    pub fn visit_at(&mut self, location: Location, visited_at: DateTime<Utc>) {
        if let Some(cursor) = self.cursor {
            self.entries.truncate(cursor.saturating_add(1));
        }
        self.entries.push(HistoryEntry {
            location,
            visited_at,
        });
        self.cursor = Some(self.entries.len() - 1);
    }

    pub fn back(&mut self) -> Result<&Location, HistoryError> {
        match self.cursor {
            Some(cursor) if cursor > 0 => self.move_to(cursor - 1),
            _ => Err(HistoryError::NoPreviousEntry),
        }
    }

    pub fn forward(&mut self) -> Result<&Location, HistoryError> {
        match self.cursor {
            Some(cursor) if cursor + 1 < self.entries.len() => self.move_to(cursor + 1),
            _ => Err(HistoryError::NoNextEntry),
        }
    }

    pub fn go_to(&mut self, index: usize) -> Result<&Location, HistoryError> {
        if self.entries.is_empty() {
            return Err(HistoryError::Empty);
        }
        if index >= self.entries.len() {
            return Err(HistoryError::OutOfRange {
                index,
                len: self.entries.len(),
            });
        }
        self.move_to(index)
    }

    pub fn current(&self) -> Result<&Location, HistoryError> {
        self.current_entry().map(|entry| &entry.location)
    }

    pub fn current_entry(&self) -> Result<&HistoryEntry, HistoryError> {
        self.cursor
            .and_then(|cursor| self.entries.get(cursor))
            .ok_or(HistoryError::Empty)
    }

    pub fn entries(&self) -> &[HistoryEntry] {
        &self.entries
    }

    pub fn cursor(&self) -> Option<usize> {
        self.cursor
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn can_go_back(&self) -> bool {
        matches!(self.cursor, Some(cursor) if cursor > 0)
    }

    pub fn can_go_forward(&self) -> bool {
        matches!(self.cursor, Some(cursor) if cursor + 1 < self.entries.len())
    }

    fn move_to(&mut self, index: usize) -> Result<&Location, HistoryError> {
        let len = self.entries.len();
        let entry = self
            .entries
            .get(index)
            .ok_or(HistoryError::OutOfRange { index, len })?;
        self.cursor = Some(index);
        Ok(&entry.location)
    }
}

#[cfg(test)]
mod tests {
    use super::HistoryError;
    use super::NavigationHistory;
    use proptest::prelude::*;
    use tw_core::Location;

    fn location(raw: &str) -> Location {
        let parsed = Location::parse(raw);
        assert!(parsed.is_ok());
        match parsed {
            Ok(value) => value,
            Err(error) => panic!("{error}"),
        }
    }

    fn history_of(raws: &[&str]) -> NavigationHistory {
        let mut history = NavigationHistory::new();
        for raw in raws {
            history.visit(location(raw));
        }
        history
    }

    #[test]
    fn empty_history_reports_named_failures() {
        let mut history = NavigationHistory::new();
        assert_eq!(history.cursor(), None);
        assert_eq!(history.current(), Err(HistoryError::Empty));
        assert_eq!(history.back(), Err(HistoryError::NoPreviousEntry));
        assert_eq!(history.forward(), Err(HistoryError::NoNextEntry));
        assert_eq!(history.go_to(0), Err(HistoryError::Empty));
    }

    #[test]
    fn visits_advance_the_cursor() {
        let history = history_of(&["http://a.com/", "http://b.com/"]);
        assert_eq!(history.len(), 2);
        assert_eq!(history.cursor(), Some(1));
        assert_eq!(history.current().map(Location::as_str), Ok("http://b.com/"));
        assert!(history.can_go_back());
        assert!(!history.can_go_forward());
    }

    #[test]
    fn visit_after_back_truncates_forward_entries() {
        let mut history = history_of(&["http://a.com/", "http://b.com/", "http://c.com/"]);
        assert_eq!(history.cursor(), Some(2));

        assert_eq!(history.back().map(Location::as_str), Ok("http://b.com/"));
        assert_eq!(history.cursor(), Some(1));

        history.visit(location("http://d.com/"));
        assert_eq!(history.len(), 3);
        assert_eq!(history.cursor(), Some(2));
        assert_eq!(history.entries()[2].location.as_str(), "http://d.com/");
        assert_eq!(history.forward(), Err(HistoryError::NoNextEntry));
    }

    #[test]
    fn back_and_forward_leave_entries_alone() {
        let mut history = history_of(&["http://a.com/", "http://b.com/"]);
        assert!(history.back().is_ok());
        assert_eq!(history.back(), Err(HistoryError::NoPreviousEntry));
        assert_eq!(history.cursor(), Some(0));
        assert_eq!(history.forward().map(Location::as_str), Ok("http://b.com/"));
        assert_eq!(history.len(), 2);
    }

    #[test]
    fn go_to_checks_bounds() {
        let mut history = history_of(&["http://a.com/", "http://b.com/", "http://c.com/"]);
        assert_eq!(history.go_to(0).map(Location::as_str), Ok("http://a.com/"));
        assert_eq!(
            history.go_to(3),
            Err(HistoryError::OutOfRange { index: 3, len: 3 })
        );
        assert_eq!(history.cursor(), Some(0));
    }

    #[test]
    fn repeated_locations_are_kept() {
        let history = history_of(&["http://a.com/", "http://a.com/"]);
        assert_eq!(history.len(), 2);
    }

    #[derive(Debug, Clone)]
    enum Step {
        Visit(u8),
        Back,
        Forward,
        GoTo(usize),
    }

    fn step() -> impl Strategy<Value = Step> {
        prop_oneof![
            (0_u8..5).prop_map(Step::Visit),
            Just(Step::Back),
            Just(Step::Forward),
            (0_usize..8).prop_map(Step::GoTo),
        ]
    }

    proptest! {
        #[test]
        fn cursor_stays_in_bounds(steps in prop::collection::vec(step(), 0..40)) {
            let mut history = NavigationHistory::new();
            for step in steps {
                let before = history.clone();
                match step {
                    Step::Visit(n) => {
                        history.visit(location(&format!("http://site{n}.com/")));
                        let old_cursor = before.cursor().map_or(0, |cursor| cursor + 1);
                        prop_assert_eq!(history.len(), old_cursor + 1);
                        prop_assert!(!history.can_go_forward());
                    }
                    Step::Back => {
                        let _ = history.back();
                        prop_assert_eq!(history.entries(), before.entries());
                    }
                    Step::Forward => {
                        let _ = history.forward();
                        prop_assert_eq!(history.entries(), before.entries());
                    }
                    Step::GoTo(index) => {
                        let _ = history.go_to(index);
                        prop_assert_eq!(history.entries(), before.entries());
                    }
                }

                match history.cursor() {
                    None => prop_assert!(history.is_empty()),
                    Some(cursor) => prop_assert!(cursor < history.len()),
                }
            }
        }
    }
}
