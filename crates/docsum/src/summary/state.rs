//! Summary lifecycle states and the edges allowed between them.
//!
//! ```text
//!            re-trigger
//!   ┌───────────────────────────┐
//!   ▼                           │
//! pending ──► processing ──► completed
//!   ▲              │
//!   │              ▼
//!   └─────────── failed
//!    re-trigger
//! ```
//!
//! Transitions are applied through [`crate::store::MetadataStore::transition`],
//! which only writes when the stored status is one of the expected sources. That
//! compare-and-set is what keeps a document to one active job at a time.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SummaryStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Unknown summary status '{0}'")]
pub struct ParseStatusError(pub String);

impl SummaryStatus {
    /// Every legal `(from, to)` edge.
    pub const EDGES: [(SummaryStatus, SummaryStatus); 5] = [
        (Self::Pending, Self::Processing),
        (Self::Processing, Self::Completed),
        (Self::Processing, Self::Failed),
        (Self::Completed, Self::Pending),
        (Self::Failed, Self::Pending),
    ];

    /// States a re-trigger may reset to `Pending`.
    pub const RETRIGGERABLE: [SummaryStatus; 2] = [Self::Completed, Self::Failed];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    pub fn can_transition_to(&self, next: SummaryStatus) -> bool {
        Self::EDGES.contains(&(*self, next))
    }

    /// `Completed` and `Failed` end a job; only a re-trigger leaves them.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// A job is queued or running for the document.
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Pending | Self::Processing)
    }
}

impl fmt::Display for SummaryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SummaryStatus {
    type Err = ParseStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "processing" => Ok(Self::Processing),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            other => Err(ParseStatusError(other.to_string())),
        }
    }
}
