//! # Case Filter Query Builder Module
//!
//! ## Purpose
//! Translates structured case filter parameters (citation, name, docket,
//! jurisdiction, court, reporter, date range, full-text search) into a
//! validated query plan, and maintains the lazily loaded choice sets that
//! back the enumerated filters.
//!
//! ## Input/Output Specification
//! - **Input**: Query-string filter parameters, loaded choice sets
//! - **Output**: `QueryPlan` of predicates plus rendering options, or a
//!   per-field validation error
//! - **Validation**: contains-filters require >= 3 characters; dates must be
//!   `YYYY-MM-DD`; enumerated fields must name a known choice
//!
//! Two declared fields (`full_case`, `body_format`) are display-only: they
//! shape response rendering, never record selection, and are modeled as a
//! distinct filter role rather than no-op predicate methods.

use crate::citations::normalize_cite;
use crate::errors::{AccessError, Result};
use crate::search::{self, SearchExpression};
use chrono::NaiveDate;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Minimum length for contains-style text filters.
pub const MIN_CONTAINS_LEN: usize = 3;

/// Raw filter parameters as they arrive on the query string.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CaseFilterParams {
    pub cite: Option<String>,
    pub name_abbreviation: Option<String>,
    pub docket_number: Option<String>,
    pub court: Option<String>,
    pub jurisdiction: Option<String>,
    pub reporter: Option<String>,
    pub decision_date_min: Option<String>,
    pub decision_date_max: Option<String>,
    pub search: Option<String>,
    pub full_case: Option<String>,
    pub body_format: Option<String>,
}

/// A single compiled predicate constraining record selection.
#[derive(Debug, Clone, PartialEq)]
pub enum CasePredicate {
    /// Case has a citation with this normalized key
    NormalizedCite(String),
    /// Name abbreviation contains this text (case-insensitive)
    NameContains(String),
    /// Docket number contains this text (case-insensitive)
    DocketContains(String),
    CourtSlug(String),
    JurisdictionSlug(String),
    Reporter(Uuid),
    DecisionDateMin(NaiveDate),
    DecisionDateMax(NaiveDate),
    /// Full-text search expression over the case body
    FullText(SearchExpression),
}

/// Case body rendering formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BodyFormat {
    Text,
    Html,
    Xml,
}

/// Display-only options carried on the plan for the rendering collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderOptions {
    /// Include full case text rather than just metadata
    pub full_case: bool,
    pub body_format: BodyFormat,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            full_case: false,
            body_format: BodyFormat::Text,
        }
    }
}

/// Compiled query plan: predicates plus rendering options.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryPlan {
    pub predicates: Vec<CasePredicate>,
    pub rendering: RenderOptions,
    /// Order results by the search index key when full-text search is active
    pub relevance_ordered: bool,
}

/// Whether a declared filter field constrains the query or only affects
/// response rendering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterRole {
    Predicate,
    DisplayOnly,
}

/// Metadata for one declared filter field, surfaced for discoverability.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct FilterSpec {
    pub name: &'static str,
    pub label: &'static str,
    pub role: FilterRole,
}

/// All declared filter fields, including the display-only ones.
pub fn declared_filters() -> &'static [FilterSpec] {
    &[
        FilterSpec { name: "cite", label: "Citation", role: FilterRole::Predicate },
        FilterSpec { name: "name_abbreviation", label: "Name Abbreviation (contains)", role: FilterRole::Predicate },
        FilterSpec { name: "docket_number", label: "Docket Number (contains)", role: FilterRole::Predicate },
        FilterSpec { name: "court", label: "Court Slug", role: FilterRole::Predicate },
        FilterSpec { name: "jurisdiction", label: "Jurisdiction", role: FilterRole::Predicate },
        FilterSpec { name: "reporter", label: "Reporter", role: FilterRole::Predicate },
        FilterSpec { name: "decision_date_min", label: "Date Min (Format YYYY-MM-DD)", role: FilterRole::Predicate },
        FilterSpec { name: "decision_date_max", label: "Date Max (Format YYYY-MM-DD)", role: FilterRole::Predicate },
        FilterSpec { name: "search", label: "Full-Text Search", role: FilterRole::Predicate },
        FilterSpec { name: "full_case", label: "Include full case text or just metadata?", role: FilterRole::DisplayOnly },
        FilterSpec { name: "body_format", label: "Format for case text", role: FilterRole::DisplayOnly },
    ]
}

/// One selectable choice in an enumerated filter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Choice {
    pub key: String,
    pub label: String,
}

/// Choice sets loaded for plan building.
#[derive(Debug, Clone, Default)]
pub struct LoadedChoices {
    pub jurisdictions: Vec<Choice>,
    pub courts: Vec<Choice>,
    pub reporters: Vec<Choice>,
}

/// Build a query plan from raw filter parameters. Fails fast on the first
/// invalid field; no partial filtering is ever applied.
pub fn build_query_plan(params: &CaseFilterParams, choices: &LoadedChoices) -> Result<QueryPlan> {
    let mut plan = QueryPlan::default();

    if let Some(cite) = non_empty(&params.cite) {
        plan.predicates
            .push(CasePredicate::NormalizedCite(normalize_cite(cite)));
    }

    if let Some(value) = non_empty(&params.name_abbreviation) {
        plan.predicates
            .push(CasePredicate::NameContains(min_length("name_abbreviation", value)?));
    }

    if let Some(value) = non_empty(&params.docket_number) {
        plan.predicates
            .push(CasePredicate::DocketContains(min_length("docket_number", value)?));
    }

    if let Some(value) = non_empty(&params.court) {
        require_choice("court", value, &choices.courts)?;
        plan.predicates.push(CasePredicate::CourtSlug(value.to_string()));
    }

    if let Some(value) = non_empty(&params.jurisdiction) {
        require_choice("jurisdiction", value, &choices.jurisdictions)?;
        plan.predicates
            .push(CasePredicate::JurisdictionSlug(value.to_string()));
    }

    if let Some(value) = non_empty(&params.reporter) {
        require_choice("reporter", value, &choices.reporters)?;
        let id = Uuid::parse_str(value).map_err(|_| {
            AccessError::validation("reporter", "Select a valid choice.")
        })?;
        plan.predicates.push(CasePredicate::Reporter(id));
    }

    if let Some(value) = non_empty(&params.decision_date_min) {
        plan.predicates
            .push(CasePredicate::DecisionDateMin(parse_date("decision_date_min", value)?));
    }

    if let Some(value) = non_empty(&params.decision_date_max) {
        plan.predicates
            .push(CasePredicate::DecisionDateMax(parse_date("decision_date_max", value)?));
    }

    if let Some(value) = non_empty(&params.search) {
        let expr = search::simple_filter(value);
        // all-short-word queries reduce to the no-op filter
        if !expr.is_match_all() {
            plan.predicates.push(CasePredicate::FullText(expr));
            plan.relevance_ordered = true;
        }
    }

    // display-only fields: validated, surfaced on the plan, never predicates
    plan.rendering.full_case = match non_empty(&params.full_case) {
        None => false,
        Some("true") => true,
        Some(_) => {
            return Err(AccessError::validation("full_case", "Select a valid choice."));
        }
    };
    plan.rendering.body_format = match non_empty(&params.body_format) {
        None | Some("text") => BodyFormat::Text,
        Some("html") => BodyFormat::Html,
        Some("xml") => BodyFormat::Xml,
        Some(_) => {
            return Err(AccessError::validation("body_format", "Select a valid choice."));
        }
    };

    Ok(plan)
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

fn min_length(field: &str, value: &str) -> Result<String> {
    // character count, not byte length
    if value.chars().count() < MIN_CONTAINS_LEN {
        return Err(AccessError::validation(
            field,
            format!("Minimum query length is {} characters.", MIN_CONTAINS_LEN),
        ));
    }
    Ok(value.to_string())
}

fn parse_date(field: &str, value: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d").map_err(|_| {
        AccessError::validation(field, "Invalid date format. Expected YYYY-MM-DD format.")
    })
}

fn require_choice(field: &str, value: &str, choices: &[Choice]) -> Result<()> {
    if choices.iter().any(|c| c.key == value) {
        Ok(())
    } else {
        Err(AccessError::validation(field, "Select a valid choice."))
    }
}

/// Explicit lazily populated cache for one choice enumeration: computed on
/// first use, safe to construct before storage is ready, refreshed through
/// [`invalidate`](ChoiceCache::invalidate).
#[derive(Default)]
pub struct ChoiceCache {
    entries: RwLock<Option<Vec<Choice>>>,
}

impl ChoiceCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the cached choices, loading them with `load` on first use.
    pub fn get_or_load(&self, load: impl FnOnce() -> Result<Vec<Choice>>) -> Result<Vec<Choice>> {
        if let Some(entries) = self.entries.read().as_ref() {
            return Ok(entries.clone());
        }
        let mut guard = self.entries.write();
        // another writer may have filled the cache while we waited
        if let Some(entries) = guard.as_ref() {
            return Ok(entries.clone());
        }
        let loaded = load()?;
        *guard = Some(loaded.clone());
        Ok(loaded)
    }

    /// Drop the cached value; the next read reloads it.
    pub fn invalidate(&self) {
        *self.entries.write() = None;
    }
}

/// The three enumerated-filter caches, refreshed together when catalog
/// records change.
#[derive(Default)]
pub struct FilterChoices {
    pub jurisdictions: ChoiceCache,
    pub courts: ChoiceCache,
    pub reporters: ChoiceCache,
}

impl FilterChoices {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn invalidate_all(&self) {
        self.jurisdictions.invalidate();
        self.courts.invalidate();
        self.reporters.invalidate();
    }
}
