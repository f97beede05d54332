//! # Storage Management Module
//!
//! ## Purpose
//! Handles persistent storage of the case catalog (cases, citations,
//! jurisdictions, courts, reporters, case bodies), visitor quota sessions,
//! and account allowances using an embedded database.
//!
//! ## Input/Output Specification
//! - **Input**: Catalog records, quota sessions, account allowances
//! - **Output**: Persistent storage, indexed retrieval, filtered queries
//! - **Storage**: Sled embedded database, one tree per record family
//!
//! ## Key Features
//! - Secondary index from normalized citation keys to citation records
//! - Query execution for validated filter plans
//! - Per-session exclusive locking for quota updates
//! - Session reads degrade to absent on corruption instead of failing

use crate::citations::natural_cmp;
use crate::errors::{AccessError, Result};
use crate::filters::{CasePredicate, Choice, QueryPlan};
use crate::quota::{AccountStore, QuotaSession, SessionStore};
use crate::resolver::CaseStore;
use crate::{
    CaseBody, CaseId, CaseRecord, CitationRecord, CourtRecord, JurisdictionRecord, ReporterRecord,
};
use bincode::Options;
use dashmap::DashMap;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use uuid::Uuid;

/// Open the embedded database backing all stores.
pub fn open_database(db_path: &Path) -> Result<sled::Db> {
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let db = sled::open(db_path)?;
    Ok(db)
}

fn icontains(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

/// Persistent case catalog: the read side of citation resolution and case
/// filtering.
pub struct CatalogStore {
    cases: sled::Tree,
    citations: sled::Tree,
    /// `"{normalized}/{citation_id}"` -> citation id
    cite_index: sled::Tree,
    /// `"{case_id}/{citation_id}"` -> citation id
    case_cite_index: sled::Tree,
    jurisdictions: sled::Tree,
    courts: sled::Tree,
    reporters: sled::Tree,
    /// reporter slug -> reporter id
    reporter_slugs: sled::Tree,
    bodies: sled::Tree,
    /// operational markers only, never record data
    meta: sled::Tree,
}

impl CatalogStore {
    pub fn open(db: &sled::Db) -> Result<Self> {
        Ok(Self {
            cases: db.open_tree("cases")?,
            citations: db.open_tree("citations")?,
            cite_index: db.open_tree("cite_index")?,
            case_cite_index: db.open_tree("case_cite_index")?,
            jurisdictions: db.open_tree("jurisdictions")?,
            courts: db.open_tree("courts")?,
            reporters: db.open_tree("reporters")?,
            reporter_slugs: db.open_tree("reporter_slugs")?,
            bodies: db.open_tree("bodies")?,
            meta: db.open_tree("meta")?,
        })
    }

    pub fn insert_case(&self, case: &CaseRecord) -> Result<()> {
        let value = bincode::serialize(case)?;
        self.cases.insert(case.id.to_string().as_bytes(), value)?;
        tracing::debug!("Stored case: {}", case.name_abbreviation);
        Ok(())
    }

    /// Store a citation and maintain both secondary indexes. The citation's
    /// normalized key must already be canonical.
    pub fn insert_citation(&self, citation: &CitationRecord) -> Result<()> {
        let value = bincode::serialize(citation)?;
        let id = citation.id.to_string();
        self.citations.insert(id.as_bytes(), value)?;
        self.cite_index.insert(
            format!("{}/{}", citation.normalized_cite, id).as_bytes(),
            id.as_bytes(),
        )?;
        self.case_cite_index.insert(
            format!("{}/{}", citation.case_id, id).as_bytes(),
            id.as_bytes(),
        )?;
        Ok(())
    }

    pub fn insert_jurisdiction(&self, jurisdiction: &JurisdictionRecord) -> Result<()> {
        let value = bincode::serialize(jurisdiction)?;
        self.jurisdictions
            .insert(jurisdiction.id.to_string().as_bytes(), value)?;
        Ok(())
    }

    pub fn insert_court(&self, court: &CourtRecord) -> Result<()> {
        let value = bincode::serialize(court)?;
        self.courts.insert(court.id.to_string().as_bytes(), value)?;
        Ok(())
    }

    pub fn insert_reporter(&self, reporter: &ReporterRecord) -> Result<()> {
        let value = bincode::serialize(reporter)?;
        let id = reporter.id.to_string();
        self.reporters.insert(id.as_bytes(), value)?;
        self.reporter_slugs
            .insert(reporter.slug.as_bytes(), id.as_bytes())?;
        Ok(())
    }

    pub fn insert_body(&self, body: &CaseBody) -> Result<()> {
        let value = bincode::serialize(body)?;
        self.bodies
            .insert(body.case_id.to_string().as_bytes(), value)?;
        Ok(())
    }

    pub fn body(&self, case_id: CaseId) -> Result<Option<CaseBody>> {
        match self.bodies.get(case_id.to_string().as_bytes())? {
            Some(value) => Ok(Some(bincode::deserialize(&value)?)),
            None => Ok(None),
        }
    }

    fn citation_by_id(&self, id: &[u8]) -> Result<Option<CitationRecord>> {
        match self.citations.get(id)? {
            Some(value) => Ok(Some(bincode::deserialize(&value)?)),
            None => Ok(None),
        }
    }

    /// All citations attached to a case, in insertion-index order.
    pub fn citations_for_case(&self, case_id: CaseId) -> Result<Vec<CitationRecord>> {
        let prefix = format!("{}/", case_id);
        let mut citations = Vec::new();
        for entry in self.case_cite_index.scan_prefix(prefix.as_bytes()) {
            let (_, citation_id) = entry?;
            if let Some(citation) = self.citation_by_id(&citation_id)? {
                citations.push(citation);
            }
        }
        Ok(citations)
    }

    /// Whether a case is eligible for public resolution paths.
    fn resolvable(&self, case_id: CaseId) -> Result<bool> {
        Ok(self
            .case(case_id)?
            .map(|c| c.in_scope && !c.duplicative)
            .unwrap_or(false))
    }

    /// Execute a validated filter plan. Only in-scope, non-duplicative cases
    /// are ever returned; full-text predicates require a stored body, so
    /// cases without one never match them.
    pub fn run_query(&self, plan: &QueryPlan) -> Result<Vec<CaseRecord>> {
        let mut matched = Vec::new();
        for entry in self.cases.iter() {
            let (_, value) = entry?;
            let case: CaseRecord = bincode::deserialize(&value)?;
            if !case.in_scope || case.duplicative {
                continue;
            }
            if self.case_matches(&case, plan)? {
                matched.push(case);
            }
        }
        if plan.relevance_ordered {
            // the embedded index has no scoring; id order keeps paging stable
            matched.sort_by_key(|case| case.id);
        } else {
            matched.sort_by(|a, b| {
                a.decision_date
                    .cmp(&b.decision_date)
                    .then_with(|| a.id.cmp(&b.id))
            });
        }
        Ok(matched)
    }

    fn case_matches(&self, case: &CaseRecord, plan: &QueryPlan) -> Result<bool> {
        for predicate in &plan.predicates {
            let ok = match predicate {
                CasePredicate::NormalizedCite(normalized) => self
                    .citations_for_case(case.id)?
                    .iter()
                    .any(|c| !c.duplicative && c.normalized_cite == *normalized),
                CasePredicate::NameContains(needle) => icontains(&case.name_abbreviation, needle),
                CasePredicate::DocketContains(needle) => case
                    .docket_number
                    .as_deref()
                    .map(|d| icontains(d, needle))
                    .unwrap_or(false),
                CasePredicate::CourtSlug(slug) => case.court_slug == *slug,
                CasePredicate::JurisdictionSlug(slug) => case.jurisdiction_slug == *slug,
                CasePredicate::Reporter(id) => case.reporter_id == *id,
                CasePredicate::DecisionDateMin(min) => case.decision_date >= *min,
                CasePredicate::DecisionDateMax(max) => case.decision_date <= *max,
                CasePredicate::FullText(expr) => match self.body(case.id)? {
                    Some(body) => expr.matches(&body.text),
                    None => false,
                },
            };
            if !ok {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Distinct volume numbers published under a reporter, naturally sorted.
    pub fn volumes_for_reporter(&self, reporter_id: Uuid) -> Result<Vec<String>> {
        let mut volumes = Vec::new();
        for entry in self.cases.iter() {
            let (_, value) = entry?;
            let case: CaseRecord = bincode::deserialize(&value)?;
            if case.reporter_id == reporter_id
                && case.in_scope
                && !case.duplicative
                && !volumes.contains(&case.volume_number)
            {
                volumes.push(case.volume_number);
            }
        }
        volumes.sort_by(|a, b| natural_cmp(a, b));
        Ok(volumes)
    }

    /// In-scope cases in one reporter volume, sorted by first page.
    pub fn cases_in_volume(&self, reporter_id: Uuid, volume: &str) -> Result<Vec<CaseRecord>> {
        let mut cases = Vec::new();
        for entry in self.cases.iter() {
            let (_, value) = entry?;
            let case: CaseRecord = bincode::deserialize(&value)?;
            if case.reporter_id == reporter_id
                && case.volume_number == volume
                && case.in_scope
                && !case.duplicative
            {
                cases.push(case);
            }
        }
        cases.sort_by(|a, b| natural_cmp(&a.first_page, &b.first_page));
        Ok(cases)
    }

    pub fn jurisdiction_choices(&self) -> Result<Vec<Choice>> {
        let mut choices = Vec::new();
        for entry in self.jurisdictions.iter() {
            let (_, value) = entry?;
            let jurisdiction: JurisdictionRecord = bincode::deserialize(&value)?;
            choices.push(Choice {
                key: jurisdiction.slug,
                label: jurisdiction.name_long,
            });
        }
        choices.sort_by(|a, b| a.label.cmp(&b.label));
        Ok(choices)
    }

    pub fn court_choices(&self) -> Result<Vec<Choice>> {
        let mut choices = Vec::new();
        for entry in self.courts.iter() {
            let (_, value) = entry?;
            let court: CourtRecord = bincode::deserialize(&value)?;
            choices.push(Choice {
                key: court.slug,
                label: court.name,
            });
        }
        choices.sort_by(|a, b| a.label.cmp(&b.label));
        Ok(choices)
    }

    pub fn reporter_choices(&self) -> Result<Vec<Choice>> {
        let mut choices = Vec::new();
        for entry in self.reporters.iter() {
            let (_, value) = entry?;
            let reporter: ReporterRecord = bincode::deserialize(&value)?;
            choices.push(Choice {
                key: reporter.id.to_string(),
                label: reporter.full_name,
            });
        }
        choices.sort_by(|a, b| a.label.cmp(&b.label));
        Ok(choices)
    }

    /// Health check: exercises one write, read, and delete round trip. The
    /// marker lives in the meta tree so record scans never see it.
    pub fn health_check(&self) -> Result<()> {
        let test_key = b"health_check";
        self.meta.insert(test_key, b"ok".as_slice())?;
        if self.meta.get(test_key)?.is_none() {
            return Err(AccessError::Internal {
                message: "Health check value not found".to_string(),
            });
        }
        self.meta.remove(test_key)?;
        Ok(())
    }
}

impl CaseStore for CatalogStore {
    fn citation_for_case(&self, case_id: CaseId) -> Result<Option<CitationRecord>> {
        if !self.resolvable(case_id)? {
            return Ok(None);
        }
        Ok(self
            .citations_for_case(case_id)?
            .into_iter()
            .find(|c| !c.duplicative))
    }

    fn citations_by_normalized(&self, normalized: &str) -> Result<Vec<CitationRecord>> {
        let prefix = format!("{}/", normalized);
        let mut citations = Vec::new();
        for entry in self.cite_index.scan_prefix(prefix.as_bytes()) {
            let (_, citation_id) = entry?;
            let citation = match self.citation_by_id(&citation_id)? {
                Some(citation) => citation,
                None => continue,
            };
            if citation.duplicative {
                continue;
            }
            if self.resolvable(citation.case_id)? {
                citations.push(citation);
            }
        }
        Ok(citations)
    }

    fn case(&self, case_id: CaseId) -> Result<Option<CaseRecord>> {
        match self.cases.get(case_id.to_string().as_bytes())? {
            Some(value) => Ok(Some(bincode::deserialize(&value)?)),
            None => Ok(None),
        }
    }

    fn jurisdiction(&self, id: Uuid) -> Result<Option<JurisdictionRecord>> {
        match self.jurisdictions.get(id.to_string().as_bytes())? {
            Some(value) => Ok(Some(bincode::deserialize(&value)?)),
            None => Ok(None),
        }
    }

    fn reporter_by_slug(&self, slug: &str) -> Result<Option<ReporterRecord>> {
        let id = match self.reporter_slugs.get(slug.as_bytes())? {
            Some(id) => id,
            None => return Ok(None),
        };
        match self.reporters.get(&id)? {
            Some(value) => Ok(Some(bincode::deserialize(&value)?)),
            None => Ok(None),
        }
    }
}

/// Persistent quota sessions with exclusive per-session locking.
///
/// Reads degrade on corruption: a record that fails to decode is treated as
/// absent, so quota handling never turns a storage problem into an outage.
pub struct SledSessionStore {
    tree: sled::Tree,
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl SledSessionStore {
    pub fn open(db: &sled::Db) -> Result<Self> {
        Ok(Self {
            tree: db.open_tree("quota_sessions")?,
            locks: DashMap::new(),
        })
    }

    fn lock_for(&self, session_id: &str) -> Arc<Mutex<()>> {
        self.locks
            .entry(session_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    fn read(&self, session_id: &str) -> Option<QuotaSession> {
        let value = match self.tree.get(session_id.as_bytes()) {
            Ok(Some(value)) => value,
            Ok(None) => return None,
            Err(e) => {
                tracing::warn!("Session read failed for {}: {}", session_id, e);
                return None;
            }
        };
        // strict decode: a record of the wrong shape or length is corrupt,
        // not a session that happens to parse
        let strict = bincode::options()
            .with_fixint_encoding()
            .reject_trailing_bytes();
        match strict.deserialize(&value) {
            Ok(session) => Some(session),
            Err(e) => {
                tracing::warn!("Discarding undecodable session {}: {}", session_id, e);
                None
            }
        }
    }
}

impl SessionStore for SledSessionStore {
    fn peek(&self, session_id: &str) -> Option<QuotaSession> {
        self.read(session_id)
    }

    fn with_locked<R>(
        &self,
        session_id: &str,
        f: impl FnOnce(&mut Option<QuotaSession>) -> R,
    ) -> R {
        let lock = self.lock_for(session_id);
        let _guard = lock.lock();

        let mut slot = self.read(session_id);
        let out = f(&mut slot);

        // write failures are logged, not surfaced: the decision already made
        // under the lock stands either way
        let result = match slot {
            Some(session) => match bincode::serialize(&session) {
                Ok(value) => self.tree.insert(session_id.as_bytes(), value).map(|_| ()),
                Err(e) => {
                    tracing::error!("Session encode failed for {}: {}", session_id, e);
                    Ok(())
                }
            },
            None => self.tree.remove(session_id.as_bytes()).map(|_| ()),
        };
        if let Err(e) = result {
            tracing::error!("Session write failed for {}: {}", session_id, e);
        }
        out
    }
}

/// Persistent per-account allowance record.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct AccountAllowance {
    pub remaining: u32,
    pub last_updated: i64,
}

/// Account allowance store. Unlike quota sessions, account balances do not
/// reset daily unless explicitly configured to.
pub struct SledAccountStore {
    tree: sled::Tree,
    locks: DashMap<Uuid, Arc<Mutex<()>>>,
    allowance: u32,
    resets_daily: bool,
    reset_interval: i64,
}

impl SledAccountStore {
    pub fn open(db: &sled::Db, allowance: u32, resets_daily: bool, reset_interval: i64) -> Result<Self> {
        Ok(Self {
            tree: db.open_tree("account_allowances")?,
            locks: DashMap::new(),
            allowance,
            resets_daily,
            reset_interval,
        })
    }

    fn lock_for(&self, user_id: Uuid) -> Arc<Mutex<()>> {
        self.locks
            .entry(user_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }
}

impl AccountStore for SledAccountStore {
    fn spend_case_view(&self, user_id: Uuid, now: i64) -> Result<u32> {
        let lock = self.lock_for(user_id);
        let _guard = lock.lock();

        let key = user_id.to_string();
        let mut account = match self.tree.get(key.as_bytes())? {
            Some(value) => bincode::deserialize(&value)?,
            None => AccountAllowance {
                remaining: self.allowance,
                last_updated: now,
            },
        };

        if self.resets_daily && now - account.last_updated >= self.reset_interval {
            account.remaining = self.allowance;
            account.last_updated = now;
        }

        account.remaining = account.remaining.saturating_sub(1);
        self.tree
            .insert(key.as_bytes(), bincode::serialize(&account)?)?;
        Ok(account.remaining)
    }
}
