//! Learning store: one example per reviewed page, one confusion matrix per rule.
//!
//! The store is an explicitly constructed instance. Open it at startup with
//! [`open`](LearningStore::open) (ephemeral) or
//! [`open_persistent`](LearningStore::open_persistent) (JSON snapshot on disk),
//! share it behind an `Arc`, and [`close`](LearningStore::close) it at shutdown
//! to flush the snapshot.
//!
//! All state sits behind one mutex, so a feedback event's read-modify-write over
//! the per-rule counters is serialized against every other event.

use std::collections::{BTreeMap, HashMap};
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use copyguard_core::Decision;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

use crate::StoreError;

// ── Feedback types ──

/// Review state of a recorded example.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Feedback {
    Pending,
    Correct,
    Incorrect,
    NeedsReview,
}

impl Feedback {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Correct => "correct",
            Self::Incorrect => "incorrect",
            Self::NeedsReview => "needs_review",
        }
    }
}

impl std::fmt::Display for Feedback {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A human verdict on an example. Unlike [`Feedback`] it can never be `pending`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Correct,
    Incorrect,
    NeedsReview,
}

impl Verdict {
    pub fn as_str(&self) -> &'static str {
        self.as_feedback().as_str()
    }

    pub fn as_feedback(&self) -> Feedback {
        match self {
            Self::Correct => Feedback::Correct,
            Self::Incorrect => Feedback::Incorrect,
            Self::NeedsReview => Feedback::NeedsReview,
        }
    }

    /// Parse `correct`, `incorrect`, or `needs_review` (case-insensitive, `-` accepted).
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "correct" => Some(Self::Correct),
            "incorrect" => Some(Self::Incorrect),
            "needs_review" => Some(Self::NeedsReview),
            _ => None,
        }
    }

    /// Map a chat button action id onto a verdict.
    ///
    /// `feedback_correct*` → correct, `feedback_incorrect*` → incorrect,
    /// anything else → needs review.
    pub fn from_action_id(action_id: &str) -> Self {
        if action_id.starts_with("feedback_correct") {
            Self::Correct
        } else if action_id.starts_with("feedback_incorrect") {
            Self::Incorrect
        } else {
            Self::NeedsReview
        }
    }
}

impl std::fmt::Display for Verdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── Confusion matrix ──

/// The single counter a feedback event moves for each rule on the example.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CounterUpdate {
    TruePositive,
    FalsePositive,
    FalseNegative,
}

impl CounterUpdate {
    /// Counter moved by `verdict` on an example the reviewer called `decision`.
    ///
    /// | decision  | correct | incorrect | needs_review |
    /// |-----------|---------|-----------|--------------|
    /// | violation | TP      | FP        | –            |
    /// | clean     | –       | FN        | –            |
    ///
    /// `needs_review` decisions never move a counter.
    pub fn for_event(decision: Decision, verdict: Verdict) -> Option<Self> {
        match (decision, verdict) {
            (Decision::Violation, Verdict::Correct) => Some(Self::TruePositive),
            (Decision::Violation, Verdict::Incorrect) => Some(Self::FalsePositive),
            (Decision::Clean, Verdict::Incorrect) => Some(Self::FalseNegative),
            _ => None,
        }
    }
}

/// Per-rule detection quality.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyPerformance {
    pub rule_id: String,
    pub true_positives: u64,
    pub false_positives: u64,
    pub false_negatives: u64,
    pub precision: f64,
    pub recall: f64,
    pub f1_score: f64,
    pub last_updated: DateTime<Utc>,
}

impl PolicyPerformance {
    pub fn new(rule_id: impl Into<String>) -> Self {
        Self {
            rule_id: rule_id.into(),
            true_positives: 0,
            false_positives: 0,
            false_negatives: 0,
            precision: 0.0,
            recall: 0.0,
            f1_score: 0.0,
            last_updated: Utc::now(),
        }
    }

    /// Build from raw counters with derived metrics filled in.
    pub fn from_counts(rule_id: impl Into<String>, tp: u64, fp: u64, fn_: u64) -> Self {
        let mut perf = Self::new(rule_id);
        perf.true_positives = tp;
        perf.false_positives = fp;
        perf.false_negatives = fn_;
        perf.recompute();
        perf
    }

    pub fn apply(&mut self, update: CounterUpdate) {
        match update {
            CounterUpdate::TruePositive => self.true_positives += 1,
            CounterUpdate::FalsePositive => self.false_positives += 1,
            CounterUpdate::FalseNegative => self.false_negatives += 1,
        }
    }

    /// Recompute precision, recall, and F1. Zero denominators yield `0`.
    pub fn recompute(&mut self) {
        self.precision = ratio(self.true_positives, self.true_positives + self.false_positives);
        self.recall = ratio(self.true_positives, self.true_positives + self.false_negatives);
        let denom = self.precision + self.recall;
        self.f1_score = if denom > 0.0 {
            2.0 * self.precision * self.recall / denom
        } else {
            0.0
        };
    }

    pub fn total_events(&self) -> u64 {
        self.true_positives + self.false_positives + self.false_negatives
    }
}

fn ratio(num: u64, den: u64) -> f64 {
    if den == 0 { 0.0 } else { num as f64 / den as f64 }
}

// ── Examples ──

/// One recorded detection event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LearningExample {
    pub id: String,
    pub source_ref: String,
    pub text_snippet: String,
    pub ai_decision: Decision,
    pub ai_confidence: f64,
    pub violations_found: Vec<String>,
    pub human_feedback: Feedback,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reviewer_notes: Option<String>,
}

/// What a feedback event changed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeedbackOutcome {
    pub example_id: String,
    pub verdict: Verdict,
    /// Counter moved for every rule in `rules`, if any.
    pub counter: Option<CounterUpdate>,
    pub rules: Vec<String>,
    /// The same verdict had already been applied; nothing was counted.
    pub repeated: bool,
    /// Notes sent with a repeated verdict were discarded.
    pub notes_ignored: bool,
}

// ── Store ──

#[derive(Default, Serialize, Deserialize)]
struct Snapshot {
    examples: Vec<LearningExample>,
    performance: Vec<PolicyPerformance>,
}

#[derive(Default)]
struct State {
    examples: BTreeMap<String, LearningExample>,
    performance: HashMap<String, PolicyPerformance>,
    dirty: bool,
}

impl State {
    fn from_snapshot(snapshot: Snapshot) -> Self {
        Self {
            examples: snapshot
                .examples
                .into_iter()
                .map(|e| (e.id.clone(), e))
                .collect(),
            performance: snapshot
                .performance
                .into_iter()
                .map(|p| (p.rule_id.clone(), p))
                .collect(),
            dirty: false,
        }
    }

    fn to_snapshot(&self) -> Snapshot {
        Snapshot {
            examples: self.examples.values().cloned().collect(),
            performance: sorted_performance(self.performance.values().cloned().collect()),
        }
    }
}

pub struct LearningStore {
    state: Mutex<State>,
    path: Option<PathBuf>,
}

impl LearningStore {
    /// Open an in-memory store. Nothing survives the process.
    pub fn open() -> Self {
        Self {
            state: Mutex::new(State::default()),
            path: None,
        }
    }

    /// Open a store backed by a JSON snapshot at `path`.
    ///
    /// An existing snapshot is loaded; a missing file starts an empty store
    /// that is created on the first [`flush`](Self::flush).
    pub fn open_persistent(path: &Path) -> Result<Self, StoreError> {
        let state = if path.exists() {
            let json = std::fs::read_to_string(path)?;
            let snapshot: Snapshot = serde_json::from_str(&json)?;
            State::from_snapshot(snapshot)
        } else {
            State::default()
        };
        info!(
            path = %path.display(),
            examples = state.examples.len(),
            rules = state.performance.len(),
            "opened learning store"
        );
        Ok(Self {
            state: Mutex::new(state),
            path: Some(path.to_path_buf()),
        })
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Record a reviewed page as a pending example. Returns its fresh id.
    pub fn record_example(
        &self,
        source_ref: &str,
        text_snippet: &str,
        ai_decision: Decision,
        ai_confidence: f64,
        rule_ids: &[String],
    ) -> String {
        let example = LearningExample {
            id: Uuid::now_v7().to_string(),
            source_ref: source_ref.to_string(),
            text_snippet: text_snippet.to_string(),
            ai_decision,
            ai_confidence,
            violations_found: rule_ids.to_vec(),
            human_feedback: Feedback::Pending,
            timestamp: Utc::now(),
            reviewer_notes: None,
        };
        let id = example.id.clone();
        info!(
            example_id = %id,
            source_ref,
            decision = %ai_decision,
            rules = rule_ids.len(),
            "recorded learning example"
        );
        self.insert_example(example);
        id
    }

    pub(crate) fn insert_example(&self, example: LearningExample) {
        let mut state = self.state.lock();
        state.examples.insert(example.id.clone(), example);
        state.dirty = true;
    }

    /// Apply a human verdict to a recorded example and update every cited
    /// rule's confusion matrix.
    ///
    /// Each example resolves once. Re-applying the same verdict is a no-op
    /// reported with `repeated = true`; a different verdict is rejected with
    /// [`StoreError::AlreadyResolved`]. The notes from the first verdict
    /// stand: notes sent with a repeat are not stored, and the outcome sets
    /// `notes_ignored`.
    pub fn update_example_feedback(
        &self,
        example_id: &str,
        verdict: Verdict,
        notes: Option<&str>,
    ) -> Result<FeedbackOutcome, StoreError> {
        let mut guard = self.state.lock();
        let State {
            examples,
            performance,
            dirty,
        } = &mut *guard;

        let example = examples
            .get_mut(example_id)
            .ok_or_else(|| StoreError::NotFound(example_id.to_string()))?;

        let rules = distinct(&example.violations_found);

        match example.human_feedback {
            Feedback::Pending => {}
            current if current == verdict.as_feedback() => {
                let notes_ignored = notes.is_some();
                debug!(example_id, %verdict, notes_ignored, "feedback already applied");
                return Ok(FeedbackOutcome {
                    example_id: example_id.to_string(),
                    verdict,
                    counter: None,
                    rules,
                    repeated: true,
                    notes_ignored,
                });
            }
            current => {
                return Err(StoreError::AlreadyResolved {
                    id: example_id.to_string(),
                    feedback: current,
                });
            }
        }

        example.human_feedback = verdict.as_feedback();
        example.reviewer_notes = notes.map(str::to_string);

        let counter = CounterUpdate::for_event(example.ai_decision, verdict);
        let now = Utc::now();
        for rule_id in &rules {
            let perf = performance
                .entry(rule_id.clone())
                .or_insert_with(|| PolicyPerformance::new(rule_id.as_str()));
            if let Some(update) = counter {
                perf.apply(update);
            }
            perf.recompute();
            perf.last_updated = now;
        }
        *dirty = true;

        info!(
            example_id,
            %verdict,
            decision = %example.ai_decision,
            counter = ?counter,
            rules = rules.len(),
            "applied feedback"
        );

        Ok(FeedbackOutcome {
            example_id: example_id.to_string(),
            verdict,
            counter,
            rules,
            repeated: false,
            notes_ignored: false,
        })
    }

    /// Per-rule performance, highest F1 first (ties broken by rule id).
    pub fn policy_performance(&self) -> Vec<PolicyPerformance> {
        let state = self.state.lock();
        sorted_performance(state.performance.values().cloned().collect())
    }

    /// Up to `limit` pending examples, most recent first.
    pub fn pending_examples(&self, limit: usize) -> Vec<LearningExample> {
        let state = self.state.lock();
        let mut pending: Vec<LearningExample> = state
            .examples
            .values()
            .filter(|e| e.human_feedback == Feedback::Pending)
            .cloned()
            .collect();
        sort_recent_first(&mut pending);
        pending.truncate(limit);
        pending
    }

    pub fn pending_count(&self) -> usize {
        self.state
            .lock()
            .examples
            .values()
            .filter(|e| e.human_feedback == Feedback::Pending)
            .count()
    }

    pub fn example(&self, id: &str) -> Option<LearningExample> {
        self.state.lock().examples.get(id).cloned()
    }

    /// Every example, most recent first.
    pub fn examples(&self) -> Vec<LearningExample> {
        let mut all: Vec<LearningExample> =
            self.state.lock().examples.values().cloned().collect();
        sort_recent_first(&mut all);
        all
    }

    pub fn example_count(&self) -> usize {
        self.state.lock().examples.len()
    }

    /// Write the snapshot if anything changed since the last flush.
    ///
    /// The file is replaced atomically through a temp file in the same
    /// directory. Ephemeral stores flush to nowhere.
    pub fn flush(&self) -> Result<(), StoreError> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let mut state = self.state.lock();
        if !state.dirty && path.exists() {
            return Ok(());
        }

        let json = serde_json::to_vec_pretty(&state.to_snapshot())?;
        let dir = match path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        tmp.write_all(&json)?;
        tmp.as_file().sync_all()?;
        tmp.persist(path).map_err(|e| StoreError::Io(e.error))?;

        state.dirty = false;
        info!(
            path = %path.display(),
            examples = state.examples.len(),
            rules = state.performance.len(),
            "flushed learning store"
        );
        Ok(())
    }

    /// Flush and release the store.
    pub fn close(self) -> Result<(), StoreError> {
        self.flush()
    }
}

fn distinct(ids: &[String]) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(ids.len());
    for id in ids {
        if !out.contains(id) {
            out.push(id.clone());
        }
    }
    out
}

fn sorted_performance(mut rows: Vec<PolicyPerformance>) -> Vec<PolicyPerformance> {
    rows.sort_by(|a, b| {
        b.f1_score
            .total_cmp(&a.f1_score)
            .then_with(|| a.rule_id.cmp(&b.rule_id))
    });
    rows
}

fn sort_recent_first(examples: &mut [LearningExample]) {
    examples.sort_by(|a, b| b.timestamp.cmp(&a.timestamp).then_with(|| b.id.cmp(&a.id)));
}
