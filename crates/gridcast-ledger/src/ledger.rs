//! Append-mostly insight ledger with whole-file atomic rewrites

use crate::error::PersistenceError;
use crate::insight::{Insight, InsightKind, NewInsight};
use crate::io::{atomic_write, encode_jsonl, read_jsonl};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

/// Filter over insights. Unset fields match everything.
#[derive(Debug, Clone, Default)]
pub struct InsightQuery {
    pub kind: Option<InsightKind>,
    pub for_date: Option<String>,
    /// Inclusive lower bound on the creation timestamp
    pub created_from: Option<DateTime<Utc>>,
    /// Exclusive upper bound on the creation timestamp
    pub created_until: Option<DateTime<Utc>>,
}

impl InsightQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn kind(mut self, kind: InsightKind) -> Self {
        self.kind = Some(kind);
        self
    }

    pub fn for_date(mut self, for_date: impl Into<String>) -> Self {
        self.for_date = Some(for_date.into());
        self
    }

    pub fn created_between(mut self, from: DateTime<Utc>, until: DateTime<Utc>) -> Self {
        self.created_from = Some(from);
        self.created_until = Some(until);
        self
    }

    pub fn matches(&self, insight: &Insight) -> bool {
        if let Some(kind) = self.kind {
            if insight.kind != kind {
                return false;
            }
        }
        if let Some(ref for_date) = self.for_date {
            if insight.for_date() != Some(for_date.as_str()) {
                return false;
            }
        }
        if let Some(from) = self.created_from {
            if insight.date < from {
                return false;
            }
        }
        if let Some(until) = self.created_until {
            if insight.date >= until {
                return false;
            }
        }
        true
    }
}

/// A decision made while holding the ledger lock
#[derive(Debug)]
pub enum Transaction<K, W> {
    /// Leave the ledger as it is
    Keep(K),
    /// Remove the listed ids and append one record, as one rewrite
    Write {
        remove: Vec<u64>,
        append: NewInsight,
        value: W,
    },
}

/// What [`InsightLedger::transact`] did
#[derive(Debug)]
pub enum Committed<K, W> {
    Kept(K),
    Written {
        insight: Insight,
        removed: usize,
        value: W,
    },
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Sequence {
    next_id: u64,
}

#[derive(Debug, Clone)]
struct State {
    insights: Vec<Insight>,
    /// Never decreases, even when the newest records are purged
    next_id: u64,
}

/// The insight ledger.
///
/// All access goes through one mutex. Every mutation builds the next
/// collection, writes it in full to disk, and only then replaces the
/// in-memory copy, so a failed write leaves both untouched.
///
/// The id high-water mark lives in a `<file>.seq` sidecar, written before
/// the records, so an id is never handed out twice.
#[derive(Debug)]
pub struct InsightLedger {
    path: Option<PathBuf>,
    state: Mutex<State>,
}

impl InsightLedger {
    /// Open (or lazily create) a JSONL-backed ledger
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, PersistenceError> {
        let path = path.into();
        let insights: Vec<Insight> = read_jsonl(&path)?;
        let stored = Self::read_sequence(&sequence_path(&path))?;
        let next_id = stored.max(next_after(&insights));
        tracing::debug!(path = %path.display(), count = insights.len(), next_id, "opened insight ledger");
        Ok(Self {
            path: Some(path),
            state: Mutex::new(State { insights, next_id }),
        })
    }

    /// A ledger with no durable backing
    pub fn in_memory() -> Self {
        Self {
            path: None,
            state: Mutex::new(State {
                insights: Vec::new(),
                next_id: 1,
            }),
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn len(&self) -> usize {
        self.lock().insights.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().insights.is_empty()
    }

    /// Append a record, assigning its id and (if absent) its creation date
    pub fn append(&self, new: NewInsight) -> Result<Insight, PersistenceError> {
        let mut guard = self.lock();
        let (next, insight) = Self::stage(&guard, &[], new);
        self.commit(&mut guard, next)?;

        tracing::debug!(id = insight.id, kind = %insight.kind, for_date = ?insight.for_date(), "appended insight");
        Ok(insight)
    }

    /// All insights matching `predicate`, in insertion order
    pub fn query<F>(&self, predicate: F) -> Vec<Insight>
    where
        F: Fn(&Insight) -> bool,
    {
        self.lock()
            .insights
            .iter()
            .filter(|i| predicate(i))
            .cloned()
            .collect()
    }

    pub fn find(&self, query: &InsightQuery) -> Vec<Insight> {
        self.query(|i| query.matches(i))
    }

    /// Most recently appended insight of `kind` about `for_date`
    pub fn latest(&self, kind: InsightKind, for_date: &str) -> Option<Insight> {
        latest_in(&self.lock().insights, kind, for_date).cloned()
    }

    /// Remove every insight whose `details.forDate` equals `for_date`.
    ///
    /// Matches on the string form only; records without `forDate` never
    /// match and the creation `date` is not consulted.
    pub fn remove_by_for_date(&self, for_date: &str) -> Result<usize, PersistenceError> {
        let mut guard = self.lock();
        let insights: Vec<Insight> = guard
            .insights
            .iter()
            .filter(|i| i.for_date() != Some(for_date))
            .cloned()
            .collect();
        let removed = guard.insights.len() - insights.len();
        if removed == 0 {
            return Ok(0);
        }

        let next = State {
            insights,
            next_id: guard.next_id,
        };
        self.commit(&mut guard, next)?;
        tracing::info!(for_date, removed, "purged insights");
        Ok(removed)
    }

    /// Remove every insight matching `predicate` and append `new`, as one rewrite
    pub fn supersede<F>(
        &self,
        predicate: F,
        new: NewInsight,
    ) -> Result<(Insight, usize), PersistenceError>
    where
        F: Fn(&Insight) -> bool,
    {
        let mut guard = self.lock();
        let remove: Vec<u64> = guard
            .insights
            .iter()
            .filter(|i| predicate(i))
            .map(|i| i.id)
            .collect();
        let (next, insight) = Self::stage(&guard, &remove, new);
        self.commit(&mut guard, next)?;

        tracing::debug!(id = insight.id, kind = %insight.kind, removed = remove.len(), "superseded insights");
        Ok((insight, remove.len()))
    }

    /// Read, decide and write under one lock.
    ///
    /// `decide` sees the current records; no other mutation can run between
    /// what it reads and what it writes.
    pub fn transact<K, W, E, F>(&self, decide: F) -> Result<Committed<K, W>, E>
    where
        F: FnOnce(&[Insight]) -> Result<Transaction<K, W>, E>,
        E: From<PersistenceError>,
    {
        let mut guard = self.lock();
        match decide(&guard.insights)? {
            Transaction::Keep(value) => Ok(Committed::Kept(value)),
            Transaction::Write {
                remove,
                append,
                value,
            } => {
                let before = guard.insights.len();
                let (next, insight) = Self::stage(&guard, &remove, append);
                let removed = before + 1 - next.insights.len();
                self.commit(&mut guard, next)?;
                tracing::debug!(id = insight.id, kind = %insight.kind, removed, "transaction committed");
                Ok(Committed::Written {
                    insight,
                    removed,
                    value,
                })
            }
        }
    }

    /// Next state with `remove` dropped and `new` appended under a fresh id
    fn stage(current: &State, remove: &[u64], new: NewInsight) -> (State, Insight) {
        let insight = Insight {
            id: current.next_id,
            kind: new.kind,
            date: new.date.unwrap_or_else(Utc::now),
            details: new.details,
        };
        let mut insights: Vec<Insight> = current
            .insights
            .iter()
            .filter(|i| !remove.contains(&i.id))
            .cloned()
            .collect();
        insights.push(insight.clone());
        let next = State {
            insights,
            next_id: current.next_id + 1,
        };
        (next, insight)
    }

    fn commit(&self, guard: &mut MutexGuard<'_, State>, next: State) -> Result<(), PersistenceError> {
        if let Some(ref path) = self.path {
            if next.next_id != guard.next_id {
                let seq = serde_json::to_vec(&Sequence {
                    next_id: next.next_id,
                })?;
                atomic_write(&sequence_path(path), &seq)?;
            }
            atomic_write(path, &encode_jsonl(&next.insights)?)?;
        }
        **guard = next;
        Ok(())
    }

    fn read_sequence(path: &Path) -> Result<u64, PersistenceError> {
        if !path.exists() {
            return Ok(1);
        }
        let contents =
            std::fs::read_to_string(path).map_err(|e| PersistenceError::io("read", path, e))?;
        let seq: Sequence =
            serde_json::from_str(&contents).map_err(|source| PersistenceError::Corrupt {
                path: path.to_path_buf(),
                line: source.line(),
                source,
            })?;
        Ok(seq.next_id.max(1))
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        // The state is only ever replaced wholesale, so a poisoned guard
        // still holds a consistent collection.
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Most recent insight of `kind` about `for_date` within `insights`
pub fn latest_in<'a>(insights: &'a [Insight], kind: InsightKind, for_date: &str) -> Option<&'a Insight> {
    insights
        .iter()
        .rev()
        .find(|i| i.kind == kind && i.for_date() == Some(for_date))
}

fn next_after(insights: &[Insight]) -> u64 {
    insights.iter().map(|i| i.id).max().unwrap_or(0) + 1
}

fn sequence_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".seq");
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn note(for_date: &str) -> NewInsight {
        NewInsight::note(Some(for_date), "x")
    }

    #[test]
    fn test_append_assigns_monotonic_ids() {
        let ledger = InsightLedger::in_memory();
        let a = ledger.append(note("2025-01-01")).unwrap();
        let b = ledger.append(note("2025-01-02")).unwrap();
        assert_eq!(a.id, 1);
        assert_eq!(b.id, 2);
        assert_eq!(ledger.len(), 2);
    }

    #[test]
    fn test_append_keeps_explicit_date() {
        let ledger = InsightLedger::in_memory();
        let when = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();
        let inserted = ledger.append(note("2025-01-01").at(when)).unwrap();
        assert_eq!(inserted.date, when);
    }

    #[test]
    fn test_query_preserves_insertion_order() {
        let ledger = InsightLedger::in_memory();
        for d in ["2025-01-03", "2025-01-01", "2025-01-02"] {
            ledger.append(note(d)).unwrap();
        }
        let dates: Vec<String> = ledger
            .query(|_| true)
            .iter()
            .map(|i| i.for_date().unwrap().to_string())
            .collect();
        assert_eq!(dates, vec!["2025-01-03", "2025-01-01", "2025-01-02"]);
    }

    #[test]
    fn test_find_by_kind_and_created_range() {
        let ledger = InsightLedger::in_memory();
        let early = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        let late = Utc.with_ymd_and_hms(2025, 3, 1, 0, 0, 0).unwrap();
        ledger.append(note("2025-01-01").at(early)).unwrap();
        ledger.append(note("2025-01-01").at(late)).unwrap();

        let q = InsightQuery::new()
            .kind(InsightKind::Note)
            .created_between(early, Utc.with_ymd_and_hms(2025, 2, 1, 0, 0, 0).unwrap());
        let found = ledger.find(&q);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].date, early);

        assert!(ledger
            .find(&InsightQuery::new().kind(InsightKind::Prediction))
            .is_empty());
    }

    #[test]
    fn test_remove_by_for_date_ignores_creation_date() {
        let ledger = InsightLedger::in_memory();
        // Created on the purge date but about another day.
        let created = Utc.with_ymd_and_hms(2025, 1, 15, 8, 0, 0).unwrap();
        ledger.append(note("2025-01-14").at(created)).unwrap();
        ledger.append(note("2025-01-15")).unwrap();
        ledger.append(NewInsight::note(None, "undated")).unwrap();

        assert_eq!(ledger.remove_by_for_date("2025-01-15").unwrap(), 1);
        assert_eq!(ledger.remove_by_for_date("2025-01-15").unwrap(), 0);

        let rest = ledger.query(|_| true);
        assert_eq!(rest.len(), 2);
        assert_eq!(rest[0].for_date(), Some("2025-01-14"));
        assert_eq!(rest[1].for_date(), None);
    }

    #[test]
    fn test_latest() {
        let ledger = InsightLedger::in_memory();
        ledger.append(note("2025-01-01")).unwrap();
        let second = ledger.append(note("2025-01-01")).unwrap();
        assert_eq!(
            ledger.latest(InsightKind::Note, "2025-01-01").map(|i| i.id),
            Some(second.id)
        );
        assert!(ledger.latest(InsightKind::Prediction, "2025-01-01").is_none());
    }

    #[test]
    fn test_supersede_replaces_in_one_step() {
        let ledger = InsightLedger::in_memory();
        ledger.append(note("2025-01-01")).unwrap();
        ledger.append(note("2025-01-02")).unwrap();

        let (inserted, removed) = ledger
            .supersede(|i| i.for_date() == Some("2025-01-01"), note("2025-01-01"))
            .unwrap();
        assert_eq!(removed, 1);
        assert_eq!(inserted.id, 3);
        assert_eq!(ledger.len(), 2);
    }

    #[test]
    fn test_persisted_roundtrip() {
        let temp = tempfile::TempDir::new().unwrap();
        let path = temp.path().join("insights.jsonl");
        {
            let ledger = InsightLedger::open(&path).unwrap();
            ledger.append(note("2025-01-01")).unwrap();
            ledger.append(note("2025-01-02")).unwrap();
        }
        let reopened = InsightLedger::open(&path).unwrap();
        let all = reopened.query(|_| true);
        assert_eq!(all.len(), 2);
        assert_eq!(all[1].for_date(), Some("2025-01-02"));
        // Ids continue after reopen.
        assert_eq!(reopened.append(note("2025-01-03")).unwrap().id, 3);
    }

    #[test]
    fn test_failed_write_leaves_state_intact() {
        let temp = tempfile::TempDir::new().unwrap();
        let path = temp.path().join("insights.jsonl");
        let ledger = InsightLedger::open(&path).unwrap();
        ledger.append(note("2025-01-01")).unwrap();
        let before = std::fs::read(&path).unwrap();

        // A directory where the temp file should go makes the write fail.
        std::fs::create_dir(temp.path().join("insights.jsonl.tmp")).unwrap();

        assert!(ledger.append(note("2025-01-02")).is_err());
        assert!(ledger.remove_by_for_date("2025-01-01").is_err());
        assert_eq!(ledger.len(), 1);
        assert_eq!(std::fs::read(&path).unwrap(), before);
    }

    #[test]
    fn test_purged_newest_id_is_not_reissued() {
        let ledger = InsightLedger::in_memory();
        ledger.append(note("2025-01-01")).unwrap();
        let newest = ledger.append(note("2025-01-02")).unwrap();
        assert_eq!(newest.id, 2);

        ledger.remove_by_for_date("2025-01-02").unwrap();
        assert_eq!(ledger.append(note("2025-01-03")).unwrap().id, 3);
    }

    #[test]
    fn test_high_water_mark_survives_reopen() {
        let temp = tempfile::TempDir::new().unwrap();
        let path = temp.path().join("insights.jsonl");
        {
            let ledger = InsightLedger::open(&path).unwrap();
            ledger.append(note("2025-01-01")).unwrap();
            ledger.append(note("2025-01-02")).unwrap();
            ledger.remove_by_for_date("2025-01-02").unwrap();
        }
        assert!(temp.path().join("insights.jsonl.seq").exists());

        let reopened = InsightLedger::open(&path).unwrap();
        assert_eq!(reopened.len(), 1);
        assert_eq!(reopened.append(note("2025-01-03")).unwrap().id, 3);
    }

    #[test]
    fn test_missing_sequence_falls_back_to_max_id() {
        let temp = tempfile::TempDir::new().unwrap();
        let path = temp.path().join("insights.jsonl");
        {
            let ledger = InsightLedger::open(&path).unwrap();
            ledger.append(note("2025-01-01")).unwrap();
            ledger.append(note("2025-01-02")).unwrap();
        }
        std::fs::remove_file(temp.path().join("insights.jsonl.seq")).unwrap();

        let reopened = InsightLedger::open(&path).unwrap();
        assert_eq!(reopened.append(note("2025-01-03")).unwrap().id, 3);
    }

    #[test]
    fn test_corrupt_sequence_is_reported() {
        let temp = tempfile::TempDir::new().unwrap();
        let path = temp.path().join("insights.jsonl");
        std::fs::write(temp.path().join("insights.jsonl.seq"), "not json").unwrap();
        assert!(matches!(
            InsightLedger::open(&path),
            Err(PersistenceError::Corrupt { .. })
        ));
    }

    #[test]
    fn test_transact_keep_writes_nothing() {
        let ledger = InsightLedger::in_memory();
        ledger.append(note("2025-01-01")).unwrap();

        let result: Result<Committed<usize, ()>, PersistenceError> =
            ledger.transact(|insights| Ok(Transaction::Keep(insights.len())));
        assert!(matches!(result, Ok(Committed::Kept(1))));
        assert_eq!(ledger.len(), 1);
    }

    #[test]
    fn test_transact_write_replaces_under_one_lock() {
        let ledger = InsightLedger::in_memory();
        let old = ledger.append(note("2025-01-01")).unwrap();
        ledger.append(note("2025-01-02")).unwrap();

        let result: Result<Committed<(), &str>, PersistenceError> = ledger.transact(|insights| {
            let found = latest_in(insights, InsightKind::Note, "2025-01-01").map(|i| i.id);
            Ok(Transaction::Write {
                remove: found.into_iter().collect(),
                append: note("2025-01-01"),
                value: "replaced",
            })
        });
        match result.unwrap() {
            Committed::Written {
                insight,
                removed,
                value,
            } => {
                assert_eq!(insight.id, 3);
                assert_eq!(removed, 1);
                assert_eq!(value, "replaced");
            }
            other => panic!("expected a write, got {other:?}"),
        }
        assert_eq!(ledger.len(), 2);
        assert!(ledger.query(|i| i.id == old.id).is_empty());
    }

    #[test]
    fn test_transact_error_aborts() {
        let ledger = InsightLedger::in_memory();
        let result: Result<Committed<(), ()>, PersistenceError> = ledger.transact(|_| {
            Err(PersistenceError::io(
                "decide",
                Path::new("x"),
                std::io::Error::other("refused"),
            ))
        });
        assert!(result.is_err());
        assert!(ledger.is_empty());
    }
}
