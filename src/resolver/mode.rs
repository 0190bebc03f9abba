//! Transaction and locking mode tokens.
//!
//! Tokens arrive as text from the management model. Matching ignores case
//! and accepts `-` in place of `_`, so `non-xa`, `Non_Xa` and `NON_XA` all
//! name the same mode.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ResolveError;

/// Maximum Damerau-Levenshtein distance for a "did you mean" suggestion.
const MAX_SUGGESTION_DISTANCE: usize = 3;

/// How a cache participates in transactions.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionMode {
    /// Non-transactional, purely local cache.
    #[default]
    None,
    /// Batching through the built-in embedded transaction manager.
    Batch,
    /// Enlisted through a synchronization rather than as an XA resource.
    NonXa,
    /// Full XA enlistment with recovery.
    FullXa,
}

impl TransactionMode {
    /// Every mode, in declaration order.
    pub const ALL: [Self; 4] = [Self::None, Self::Batch, Self::NonXa, Self::FullXa];

    /// Canonical token for this mode.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::None => "NONE",
            Self::Batch => "BATCH",
            Self::NonXa => "NON_XA",
            Self::FullXa => "FULL_XA",
        }
    }
}

impl fmt::Display for TransactionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransactionMode {
    type Err = ResolveError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_token(s, "mode", &Self::ALL, |m| m.as_str())
    }
}

/// Lock acquisition policy for transactional access.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LockingMode {
    /// Locks are acquired at prepare time.
    Optimistic,
    /// Locks are acquired on first write.
    #[default]
    Pessimistic,
}

impl LockingMode {
    /// Every locking mode, in declaration order.
    pub const ALL: [Self; 2] = [Self::Optimistic, Self::Pessimistic];

    /// Canonical token for this locking mode.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Optimistic => "OPTIMISTIC",
            Self::Pessimistic => "PESSIMISTIC",
        }
    }
}

impl fmt::Display for LockingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LockingMode {
    type Err = ResolveError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_token(s, "locking", &Self::ALL, |m| m.as_str())
    }
}

/// Normalizes a raw token: trimmed, upper-cased, `-` mapped to `_`.
fn normalize(raw: &str) -> String {
    raw.trim().to_ascii_uppercase().replace('-', "_")
}

fn parse_token<T: Copy>(
    raw: &str,
    field: &str,
    candidates: &[T],
    token: impl Fn(T) -> &'static str,
) -> Result<T, ResolveError> {
    let wanted = normalize(raw);
    if let Some(found) = candidates.iter().copied().find(|c| token(*c) == wanted) {
        return Ok(found);
    }

    let names: Vec<&'static str> = candidates.iter().map(|c| token(*c)).collect();
    let mut expected = format!("one of {}", names.join(", "));
    if let Some(suggestion) = suggest(&wanted, &names) {
        expected.push_str(&format!(" (did you mean '{suggestion}'?)"));
    }
    Err(ResolveError::invalid(field, raw, expected))
}

/// Closest candidate within [`MAX_SUGGESTION_DISTANCE`] edits, if any.
#[must_use]
pub fn suggest<'a>(input: &str, candidates: &[&'a str]) -> Option<&'a str> {
    candidates
        .iter()
        .map(|c| (*c, strsim::damerau_levenshtein(input, c)))
        .filter(|(_, dist)| *dist <= MAX_SUGGESTION_DISTANCE)
        .min_by_key(|(_, dist)| *dist)
        .map(|(name, _)| name)
}
