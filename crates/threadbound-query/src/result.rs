// SPDX-FileCopyrightText: 2026 Threadbound Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Materialized results and the cursor over them.

use threadbound_core::{QueryError, Record, RecordSet, Value};

/// Position of a cursor that is before the first record.
const BEFORE_FIRST: isize = -1;

/// Outcome of the last published execution plus a cursor.
///
/// The cursor is `-1` before the first record and `len` after the last one;
/// it only addresses a record while inside `[0, len)`. Every movement on an
/// empty result fails.
#[derive(Debug, Clone, PartialEq)]
pub struct ResultState {
    records: Vec<Record>,
    cursor: isize,
    last_insert_id: Option<Value>,
    rows_affected: u64,
    last_error: Option<QueryError>,
}

impl Default for ResultState {
    fn default() -> Self {
        Self {
            records: Vec::new(),
            cursor: BEFORE_FIRST,
            last_insert_id: None,
            rows_affected: 0,
            last_error: None,
        }
    }
}

impl ResultState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace everything with a successful execution's records.
    pub fn publish(&mut self, set: RecordSet) {
        *self = Self {
            records: set.records,
            last_insert_id: set.last_insert_id,
            rows_affected: set.rows_affected,
            ..Self::default()
        };
    }

    /// Replace everything with a failure.
    pub fn fail(&mut self, error: QueryError) {
        *self = Self {
            last_error: Some(error),
            ..Self::default()
        };
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }

    pub fn size(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Current cursor index, when it addresses a record.
    pub fn at(&self) -> Option<usize> {
        self.is_valid().then_some(self.cursor as usize)
    }

    pub fn is_valid(&self) -> bool {
        self.cursor >= 0 && (self.cursor as usize) < self.records.len()
    }

    pub fn next(&mut self) -> bool {
        if self.records.is_empty() {
            return false;
        }
        let next = self.cursor + 1;
        self.settle(next)
    }

    pub fn previous(&mut self) -> bool {
        if self.records.is_empty() {
            return false;
        }
        let previous = self.cursor - 1;
        self.settle(previous)
    }

    pub fn first(&mut self) -> bool {
        self.seek(0)
    }

    pub fn last(&mut self) -> bool {
        match self.records.len() {
            0 => false,
            len => self.seek(len as isize - 1),
        }
    }

    /// Move to absolute `index`. Fails (and parks the cursor before the
    /// first or after the last record) when `index` is out of range.
    pub fn seek(&mut self, index: isize) -> bool {
        if self.records.is_empty() {
            return false;
        }
        self.settle(index)
    }

    /// Move by `offset` from the current position.
    pub fn seek_relative(&mut self, offset: isize) -> bool {
        let target = self.cursor.saturating_add(offset);
        self.seek(target)
    }

    pub fn record(&self) -> Option<&Record> {
        self.at().and_then(|i| self.records.get(i))
    }

    pub fn value(&self, index: usize) -> Option<&Value> {
        self.record().and_then(|r| r.value(index))
    }

    pub fn value_by_name(&self, name: &str) -> Option<&Value> {
        self.record().and_then(|r| r.value_by_name(name))
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn last_insert_id(&self) -> Option<&Value> {
        self.last_insert_id.as_ref()
    }

    pub fn rows_affected(&self) -> u64 {
        self.rows_affected
    }

    pub fn last_error(&self) -> Option<&QueryError> {
        self.last_error.as_ref()
    }

    fn settle(&mut self, target: isize) -> bool {
        let len = self.records.len() as isize;
        if (0..len).contains(&target) {
            self.cursor = target;
            true
        } else {
            self.cursor = if target < 0 { BEFORE_FIRST } else { len };
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn filled(count: usize) -> ResultState {
        let mut state = ResultState::new();
        state.publish(RecordSet {
            records: (0..count)
                .map(|i| Record::from_pairs([("n", Value::Integer(i as i64))]))
                .collect(),
            last_insert_id: None,
            rows_affected: 0,
        });
        state
    }

    #[test]
    fn cursor_starts_before_first() {
        let state = filled(3);
        assert_eq!(state.at(), None);
        assert!(state.record().is_none());
        assert!(state.last_error().is_none());
    }

    #[test]
    fn next_walks_and_stops_after_last() {
        let mut state = filled(2);
        assert!(state.next());
        assert_eq!(state.value(0), Some(&Value::Integer(0)));
        assert!(state.next());
        assert_eq!(state.value_by_name("n"), Some(&Value::Integer(1)));
        assert!(!state.next());
        assert_eq!(state.at(), None);
        // From after-last, previous comes back to the last record.
        assert!(state.previous());
        assert_eq!(state.at(), Some(1));
    }

    #[test]
    fn empty_result_never_moves() {
        let mut state = filled(0);
        assert!(!state.next());
        assert!(!state.previous());
        assert!(!state.first());
        assert!(!state.last());
        assert!(!state.seek(0));
        assert!(!state.seek_relative(1));
        assert_eq!(state.at(), None);
    }

    #[test]
    fn seek_out_of_range_fails() {
        let mut state = filled(3);
        assert!(state.seek(2));
        assert!(!state.seek(3));
        assert!(state.record().is_none());
        assert!(!state.seek(-5));
        assert!(state.seek_relative(1));
        assert_eq!(state.at(), Some(0));
        assert!(state.last());
        assert_eq!(state.at(), Some(2));
        assert!(state.first());
        assert_eq!(state.at(), Some(0));
    }

    #[test]
    fn fail_clears_records() {
        let mut state = filled(2);
        state.fail(QueryError::ExecutionFailed {
            message: "no such table".into(),
            code: Some(1),
        });
        assert_eq!(state.size(), 0);
        assert!(state.last_error().is_some());
        state.clear();
        assert!(state.last_error().is_none());
    }

    #[test]
    fn publish_keeps_metadata() {
        let mut state = ResultState::new();
        state.publish(RecordSet {
            records: vec![],
            last_insert_id: Some(Value::Integer(7)),
            rows_affected: 1,
        });
        assert_eq!(state.last_insert_id(), Some(&Value::Integer(7)));
        assert_eq!(state.rows_affected(), 1);
    }

    #[derive(Debug, Clone)]
    enum Move {
        Next,
        Previous,
        First,
        Last,
        Seek(isize),
        Relative(isize),
    }

    fn moves() -> impl Strategy<Value = Move> {
        prop_oneof![
            Just(Move::Next),
            Just(Move::Previous),
            Just(Move::First),
            Just(Move::Last),
            (-4isize..12).prop_map(Move::Seek),
            (-6isize..6).prop_map(Move::Relative),
        ]
    }

    proptest! {
        #[test]
        fn cursor_never_addresses_outside_records(
            count in 0usize..8,
            script in proptest::collection::vec(moves(), 0..40),
        ) {
            let mut state = filled(count);
            for step in script {
                let moved = match step {
                    Move::Next => state.next(),
                    Move::Previous => state.previous(),
                    Move::First => state.first(),
                    Move::Last => state.last(),
                    Move::Seek(i) => state.seek(i),
                    Move::Relative(o) => state.seek_relative(o),
                };
                if count == 0 {
                    prop_assert!(!moved);
                }
                prop_assert_eq!(moved, state.at().is_some());
                if let Some(i) = state.at() {
                    prop_assert!(i < count);
                    prop_assert!(state.record().is_some());
                } else {
                    prop_assert!(state.record().is_none());
                }
            }
        }
    }
}
