//! Registry domain model.
//!
//! These are immutable per-cycle snapshots of upstream state. Nothing here is
//! retained by the exporter between collection cycles.

use chrono::{DateTime, Utc};
use std::collections::HashMap;

/// One page of a cursor-based listing.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    /// Page payload.
    pub items: T,

    /// Opaque continuation token. `None` means this was the last page.
    pub next_token: Option<String>,
}

impl<T> Page<T> {
    /// Creates a terminal page.
    pub const fn last(items: T) -> Self {
        Self {
            items,
            next_token: None,
        }
    }

    /// Creates a page followed by another one.
    pub fn with_next(items: T, next_token: impl Into<String>) -> Self {
        Self {
            items,
            next_token: Some(next_token.into()),
        }
    }
}

/// A repository in the registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Repository {
    /// Repository name.
    pub name: String,

    /// Registry (account) id owning the repository.
    pub registry_id: String,

    /// Repository URI used for `docker pull`.
    pub uri: String,

    /// Whether images are scanned when pushed.
    pub scan_on_push: bool,

    /// Tag mutability policy (`MUTABLE` / `IMMUTABLE`).
    pub tag_mutability: String,
}

/// Identifier of an image as returned by the image listing.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct ImageId {
    /// Content digest.
    pub digest: Option<String>,

    /// Tag, if the listed entry is tagged.
    pub tag: Option<String>,
}

impl ImageId {
    /// Creates an identifier from a digest and tag.
    pub fn new(digest: impl Into<String>, tag: impl Into<String>) -> Self {
        Self {
            digest: Some(digest.into()),
            tag: Some(tag.into()),
        }
    }
}

/// Full description of an image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageDescriptor {
    /// Content digest (stable across re-tagging).
    pub digest: String,

    /// Tags currently pointing at the digest.
    pub tags: Vec<String>,

    /// Compressed image size in bytes.
    pub size_bytes: i64,

    /// When the image was pushed.
    pub pushed_at: Option<DateTime<Utc>>,
}

/// Vulnerability severity levels reported by image scans.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Severity {
    /// Critical findings.
    Critical,
    /// High findings.
    High,
    /// Medium findings.
    Medium,
    /// Low findings.
    Low,
    /// Informational findings.
    Informational,
}

impl Severity {
    /// Every severity, in reporting order.
    pub const ALL: [Self; 5] = [
        Self::Critical,
        Self::High,
        Self::Medium,
        Self::Low,
        Self::Informational,
    ];

    /// Lowercase label value.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Critical => "critical",
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
            Self::Informational => "informational",
        }
    }

    /// Parses the upstream (uppercase) severity name.
    ///
    /// Returns `None` for levels outside the fixed enumeration, e.g. `UNDEFINED`.
    #[must_use]
    pub fn from_upstream(name: &str) -> Option<Self> {
        match name {
            "CRITICAL" => Some(Self::Critical),
            "HIGH" => Some(Self::High),
            "MEDIUM" => Some(Self::Medium),
            "LOW" => Some(Self::Low),
            "INFORMATIONAL" => Some(Self::Informational),
            _ => None,
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Result summary of a completed image scan.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ScanFindings {
    /// When the scan completed.
    pub completed_at: Option<DateTime<Utc>>,

    /// Number of findings per severity. Missing severities count as zero.
    pub severity_counts: HashMap<Severity, i64>,
}

impl ScanFindings {
    /// Returns the finding count for a severity, defaulting to zero.
    #[must_use]
    pub fn count(&self, severity: Severity) -> i64 {
        self.severity_counts.get(&severity).copied().unwrap_or(0)
    }
}

/// Converts a timestamp to Unix seconds as used by the exported gauges.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn unix_seconds(at: DateTime<Utc>) -> f64 {
    at.timestamp() as f64 + f64::from(at.timestamp_subsec_nanos()) / 1e9
}
