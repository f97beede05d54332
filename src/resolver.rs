//! # Citation Resolver Module
//!
//! ## Purpose
//! Resolves a citation path (`/<series>/<volume>/<page>[/<case_id>]`) to a
//! single case, a disambiguation set, or a redirect to the canonical slug
//! form, and attaches access and robots directives to single matches.
//!
//! ## Input/Output Specification
//! - **Input**: Citation path segments, request access context
//! - **Output**: `Resolution`: a resolved case (gated through the quota
//!   machinery), a disambiguation list, or a redirect instruction
//! - **Scope**: Only in-scope cases resolve; duplicative citations are
//!   excluded from normalized-key matching

use crate::citations::{full_cite, normalize_cite, slugify};
use crate::errors::{AccessError, Result};
use crate::quota::{AccessDecision, AccountStore, QuotaGate, RequestContext, SessionStore};
use crate::{CaseId, CaseRecord, CitationRecord, JurisdictionRecord, ReporterRecord};
use serde::Serialize;

/// Case-lookup data source used by the resolver.
pub trait CaseStore: Send + Sync {
    /// The first in-scope citation belonging to a case, bypassing
    /// normalized-key matching.
    fn citation_for_case(&self, case_id: CaseId) -> Result<Option<CitationRecord>>;

    /// All non-duplicative citations with the given normalized key whose
    /// cases are in scope.
    fn citations_by_normalized(&self, normalized: &str) -> Result<Vec<CitationRecord>>;

    fn case(&self, case_id: CaseId) -> Result<Option<CaseRecord>>;

    fn jurisdiction(&self, id: uuid::Uuid) -> Result<Option<JurisdictionRecord>>;

    fn reporter_by_slug(&self, slug: &str) -> Result<Option<ReporterRecord>>;
}

impl<T: CaseStore> CaseStore for std::sync::Arc<T> {
    fn citation_for_case(&self, case_id: CaseId) -> Result<Option<CitationRecord>> {
        (**self).citation_for_case(case_id)
    }

    fn citations_by_normalized(&self, normalized: &str) -> Result<Vec<CitationRecord>> {
        (**self).citations_by_normalized(normalized)
    }

    fn case(&self, case_id: CaseId) -> Result<Option<CaseRecord>> {
        (**self).case(case_id)
    }

    fn jurisdiction(&self, id: uuid::Uuid) -> Result<Option<JurisdictionRecord>> {
        (**self).jurisdiction(id)
    }

    fn reporter_by_slug(&self, slug: &str) -> Result<Option<ReporterRecord>> {
        (**self).reporter_by_slug(slug)
    }
}

/// A parsed citation path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CitePath {
    pub series_slug: String,
    pub volume: String,
    pub page: String,
    pub case_id: Option<CaseId>,
}

impl CitePath {
    /// URL form of this path.
    pub fn to_url(&self) -> String {
        match self.case_id {
            Some(id) => format!("/{}/{}/{}/{}", self.series_slug, self.volume, self.page, id),
            None => format!("/{}/{}/{}", self.series_slug, self.volume, self.page),
        }
    }
}

/// Response-level robots directives for a resolved case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ResponseDirectives {
    /// Search engines must not cache restricted case text
    pub noarchive: bool,
    /// Case is explicitly flagged non-indexable
    pub noindex: bool,
}

/// A uniquely resolved case, gated and decorated for rendering.
#[derive(Debug, Clone)]
pub struct ResolvedCase {
    pub case: CaseRecord,
    pub citations: Vec<CitationRecord>,
    pub access: AccessDecision,
    pub directives: ResponseDirectives,
}

/// Candidate list returned when a citation matches zero or multiple cases.
#[derive(Debug, Clone, Serialize)]
pub struct Disambiguation {
    pub candidates: Vec<CaseRecord>,
    /// Display cite of the original request, e.g. `"123 Fake 456"`
    pub full_cite: String,
    /// Reporter short name if the slug is known, otherwise the slug itself
    pub series: String,
    pub series_slug: String,
    pub volume: String,
    pub page: String,
}

/// Outcome of one resolution attempt. Redirects are control flow here, not
/// errors.
#[derive(Debug, Clone)]
pub enum Resolution {
    /// Permanent redirect to the canonical slug form of the same path
    Redirect { path: CitePath },
    /// Exactly one in-scope case matched
    Resolved(Box<ResolvedCase>),
    /// Zero or multiple cases matched
    Ambiguous(Disambiguation),
}

/// Resolves citation paths against a case store, gating single matches
/// through the access quota machinery.
pub struct CitationResolver<C, S, A> {
    store: C,
    gate: QuotaGate<S, A>,
}

impl<C, S, A> CitationResolver<C, S, A>
where
    C: CaseStore,
    S: SessionStore,
    A: AccountStore,
{
    pub fn new(store: C, gate: QuotaGate<S, A>) -> Self {
        Self { store, gate }
    }

    /// Resolve a citation path. `now` is a unix timestamp used for quota
    /// accounting.
    pub fn resolve(
        &self,
        path: &CitePath,
        ctx: &RequestContext,
        now: i64,
    ) -> Result<Resolution> {
        // the redirect rule runs before any lookup
        let canonical = slugify(&path.series_slug);
        if canonical != path.series_slug {
            return Ok(Resolution::Redirect {
                path: CitePath {
                    series_slug: canonical,
                    volume: path.volume.clone(),
                    page: path.page.clone(),
                    case_id: path.case_id,
                },
            });
        }

        let display_cite = full_cite(&path.volume, &path.series_slug, &path.page);
        let citations = match path.case_id {
            Some(case_id) => self
                .store
                .citation_for_case(case_id)?
                .into_iter()
                .collect::<Vec<_>>(),
            None => {
                let normalized = normalize_cite(&display_cite);
                self.store.citations_by_normalized(&normalized)?
            }
        };

        if citations.len() == 1 {
            let case_id = citations[0].case_id;
            let case = self.store.case(case_id)?.ok_or_else(|| {
                // a citation pointing at a missing case is a data defect
                AccessError::Internal {
                    message: format!("citation {} references missing case {}", citations[0].id, case_id),
                }
            })?;

            let whitelisted = self
                .store
                .jurisdiction(case.jurisdiction_id)?
                .map(|j| j.whitelisted)
                .unwrap_or(false);

            let access = self.gate.decide(ctx, whitelisted, now)?;
            let directives = ResponseDirectives {
                noarchive: !whitelisted,
                noindex: case.no_index,
            };

            tracing::debug!(
                case_id = %case.id,
                whitelisted,
                full_text = access.grants_full_text(),
                "resolved citation"
            );

            return Ok(Resolution::Resolved(Box::new(ResolvedCase {
                case,
                citations,
                access,
                directives,
            })));
        }

        // zero or multiple matches: build the disambiguation payload
        let mut candidates = Vec::with_capacity(citations.len());
        for citation in &citations {
            if let Some(case) = self.store.case(citation.case_id)? {
                candidates.push(case);
            }
        }

        let series = self
            .store
            .reporter_by_slug(&path.series_slug)?
            .map(|r| r.short_name)
            .unwrap_or_else(|| path.series_slug.clone());

        Ok(Resolution::Ambiguous(Disambiguation {
            candidates,
            full_cite: display_cite,
            series,
            series_slug: path.series_slug.clone(),
            volume: path.volume.clone(),
            page: path.page.clone(),
        }))
    }
}
