//! Append-only record of provider attempts for a run.

use std::collections::BTreeMap;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// How a single attempt ended.
///
/// The local fallback counts as an attempt of its own. A call whose three
/// provider attempts all fail logs `retried, retried, failure, fallback`,
/// and the `fallback` record carries attempt number 4.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CallOutcome {
    /// The attempt returned text.
    Success,
    /// The attempt failed and another attempt follows.
    Retried,
    /// The local provider answered in place of the configured one.
    /// Always the last record of its call; tokens are not billable.
    Fallback,
    /// The attempt failed and no further attempt was made.
    Failure,
}

impl CallOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            CallOutcome::Success => "success",
            CallOutcome::Retried => "retried",
            CallOutcome::Fallback => "fallback",
            CallOutcome::Failure => "failure",
        }
    }
}

/// One attempt, against the configured provider or the local fallback.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageRecord {
    pub provider: String,
    pub model: String,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub outcome: CallOutcome,
    /// 1-based attempt number within the call.
    pub attempt: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl UsageRecord {
    pub fn new(
        provider: impl Into<String>,
        model: impl Into<String>,
        outcome: CallOutcome,
        attempt: u32,
    ) -> Self {
        Self {
            provider: provider.into(),
            model: model.into(),
            input_tokens: 0,
            output_tokens: 0,
            outcome,
            attempt,
            error: None,
            timestamp: Utc::now(),
        }
    }

    pub fn with_tokens(mut self, input_tokens: u64, output_tokens: u64) -> Self {
        self.input_tokens = input_tokens;
        self.output_tokens = output_tokens;
        self
    }

    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }

    pub fn total_tokens(&self) -> u64 {
        self.input_tokens + self.output_tokens
    }
}

/// Shared usage log. Records are only ever appended.
#[derive(Debug, Default)]
pub struct UsageLog {
    records: Mutex<Vec<UsageRecord>>,
}

impl UsageLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&self, record: UsageRecord) {
        tracing::debug!(
            provider = %record.provider,
            outcome = record.outcome.as_str(),
            attempt = record.attempt,
            input_tokens = record.input_tokens,
            output_tokens = record.output_tokens,
            "usage recorded"
        );
        self.lock().push(record);
    }

    /// Copy of every record so far, in append order.
    pub fn snapshot(&self) -> Vec<UsageRecord> {
        self.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Tokens spent against the run budget. Fallback answers are free.
    pub fn billable_tokens(&self) -> u64 {
        self.lock()
            .iter()
            .filter(|r| r.outcome != CallOutcome::Fallback)
            .map(UsageRecord::total_tokens)
            .sum()
    }

    pub fn count(&self, outcome: CallOutcome) -> usize {
        self.lock().iter().filter(|r| r.outcome == outcome).count()
    }

    pub fn totals(&self) -> UsageTotals {
        UsageTotals::from_records(&self.lock())
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<UsageRecord>> {
        match self.records.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                tracing::warn!("usage log lock was poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }
}

/// Aggregates over a set of usage records.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageTotals {
    pub calls: usize,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub fallback_count: usize,
    pub by_outcome: BTreeMap<CallOutcome, usize>,
}

impl UsageTotals {
    pub fn from_records(records: &[UsageRecord]) -> Self {
        let mut totals = UsageTotals {
            calls: records.len(),
            ..Default::default()
        };
        for record in records {
            totals.input_tokens += record.input_tokens;
            totals.output_tokens += record.output_tokens;
            *totals.by_outcome.entry(record.outcome).or_insert(0) += 1;
        }
        totals.fallback_count = totals
            .by_outcome
            .get(&CallOutcome::Fallback)
            .copied()
            .unwrap_or(0);
        totals
    }
}

/// `usage.json`: every record plus totals.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageDocument {
    pub provider: String,
    pub model: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_budget: Option<u64>,
    pub totals: UsageTotals,
    pub records: Vec<UsageRecord>,
}

impl UsageDocument {
    pub fn build(
        provider: impl Into<String>,
        model: impl Into<String>,
        token_budget: Option<u64>,
        log: &UsageLog,
    ) -> Self {
        let records = log.snapshot();
        Self {
            provider: provider.into(),
            model: model.into(),
            token_budget,
            totals: UsageTotals::from_records(&records),
            records,
        }
    }
}
