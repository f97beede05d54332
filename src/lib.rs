//! # Caselaw Access Layer
//!
//! ## Overview
//! This library implements the public-facing access layer of a caselaw
//! database: it resolves legal citations to case documents, enforces a daily
//! access quota for logged-out readers of restricted jurisdictions, and
//! serves full-text phrase search over stored case records.
//!
//! ## Architecture
//! The system is composed of several key modules:
//! - `citations`: Citation normalization, slugs, and display cites
//! - `search`: Phrase-search compiler producing conjunctive search expressions
//! - `quota`: Per-visitor access quota gate with locked session updates
//! - `resolver`: Citation-to-case resolution with redirects and disambiguation
//! - `filters`: Case filter query builder with validated predicates
//! - `storage`: Persistent catalog, session, and account stores
//! - `api`: REST API endpoints
//! - `config`: Configuration management and settings
//! - `errors`: Centralized error handling and types
//!
//! ## Input/Output Specification
//! - **Input**: Citation paths, filter parameters, search queries (text)
//! - **Output**: Resolved cases with an access tier, disambiguation lists,
//!   redirect targets, and filtered case listings
//! - **Access control**: Whitelisted jurisdictions and authenticated users
//!   read freely; other visitors spend a daily per-session allowance
//!
//! ## Usage
//! ```rust,no_run
//! use caselaw_access::citations::normalize_cite;
//! use caselaw_access::search::compile;
//!
//! let key = normalize_cite("123 F.3d 456");
//! assert_eq!(key, "123f3d456");
//! let expr = compile(r#"Miranda "due process" rights"#);
//! assert_eq!(expr.terms().len(), 3);
//! ```

// Core modules
pub mod api;
pub mod citations;
pub mod config;
pub mod errors;
pub mod filters;
pub mod quota;
pub mod resolver;
pub mod search;
pub mod storage;

// Re-exports for convenience
pub use config::Config;
pub use errors::{AccessError, Result};
pub use resolver::{CitationResolver, Resolution};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

/// Unique identifier for cases, citations, and other catalog records
pub type CaseId = Uuid;

/// A stored case record. Only `in_scope` cases are eligible for public
/// citation resolution; `duplicative` cases are superseded by a canonical
/// counterpart and excluded from matching.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaseRecord {
    /// Unique case identifier
    pub id: CaseId,
    /// Full case name
    pub name: String,
    /// Abbreviated case name used in listings
    pub name_abbreviation: String,
    /// Docket number, if recorded
    pub docket_number: Option<String>,
    /// Decision date
    pub decision_date: NaiveDate,
    /// Jurisdiction reference
    pub jurisdiction_id: Uuid,
    /// Denormalized jurisdiction slug for filtering
    pub jurisdiction_slug: String,
    /// Court reference
    pub court_id: Uuid,
    /// Denormalized court slug for filtering
    pub court_slug: String,
    /// Reporter series this case was published in
    pub reporter_id: Uuid,
    /// Volume number within the reporter series
    pub volume_number: String,
    /// First page of the case within the volume
    pub first_page: String,
    /// Whether the case may appear in public resolution paths
    pub in_scope: bool,
    /// Whether search engines are asked not to index this case
    pub no_index: bool,
    /// Whether this record is superseded by a canonical case
    pub duplicative: bool,
}

impl CaseRecord {
    /// Frontend path of the canonical citation view for this case.
    pub fn frontend_path(&self, reporter_slug: &str) -> String {
        format!(
            "/{}/{}/{}/{}",
            reporter_slug, self.volume_number, self.first_page, self.id
        )
    }
}

/// A citation attached to exactly one case. The normalized key is derived
/// deterministically from the raw cite and is idempotent under
/// re-normalization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CitationRecord {
    pub id: Uuid,
    /// Case this citation belongs to
    pub case_id: CaseId,
    /// Raw citation string as printed, e.g. `"123 F.3d 456"`
    pub cite: String,
    /// Normalized lookup key, e.g. `"123f3d456"`
    pub normalized_cite: String,
    /// Citation kind, e.g. `"official"` or `"parallel"`
    pub citation_type: String,
    /// Whether this citation is superseded by a canonical one
    pub duplicative: bool,
}

/// A jurisdiction. `whitelisted` jurisdictions serve case text freely,
/// without consuming any visitor quota.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JurisdictionRecord {
    pub id: Uuid,
    pub slug: String,
    pub name: String,
    pub name_long: String,
    pub whitelisted: bool,
}

/// A court within a jurisdiction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CourtRecord {
    pub id: Uuid,
    pub slug: String,
    pub name: String,
    pub name_abbreviation: String,
    pub jurisdiction_id: Uuid,
}

/// A reporter series, addressed in citation URLs by its short-name slug.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReporterRecord {
    pub id: Uuid,
    /// Canonical slug of the short name, e.g. `"f-3d"`
    pub slug: String,
    pub full_name: String,
    pub short_name: String,
    pub start_year: Option<i32>,
    pub end_year: Option<i32>,
}

/// Full text body of a case. Zero or one per case; cases without a body are
/// excluded from full-text search results.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaseBody {
    pub case_id: CaseId,
    pub text: String,
}

/// Concrete resolver type wired up by the server binary.
pub type AppResolver = resolver::CitationResolver<
    Arc<storage::CatalogStore>,
    Arc<storage::SledSessionStore>,
    Arc<storage::SledAccountStore>,
>;

/// Application state shared across request handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<config::Config>,
    pub catalog: Arc<storage::CatalogStore>,
    pub resolver: Arc<AppResolver>,
    pub choices: Arc<filters::FilterChoices>,
    pub classifier: Arc<quota::UserAgentClassifier>,
}
