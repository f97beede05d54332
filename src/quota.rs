//! # Access Quota Gate Module
//!
//! ## Purpose
//! Decides, per request, whether a visitor may view the full text of a case
//! in a restricted (non-whitelisted) jurisdiction, tracking a daily
//! per-session allowance for logged-out readers.
//!
//! ## Input/Output Specification
//! - **Input**: Request context (session id, cookies, auth, crawler flag),
//!   jurisdiction whitelist status, current time
//! - **Output**: An access decision: full text, metadata only, or a redirect
//!   to the bot-verification step
//! - **Synchronization**: The session read-decrement-write runs under an
//!   exclusive per-session lock so parallel tabs cannot double-spend
//!
//! ## Decision order
//! 1. Whitelisted jurisdiction or authenticated user: full text
//!    (authenticated views spend the persistent account allowance)
//! 2. Verification cookie plus an existing quota session: locked quota
//!    tracking with a daily reset
//! 3. Verified search-engine crawler: full text, quota untouched
//! 4. Otherwise: initialize a fresh quota session and redirect to the
//!    verification step
//!
//! A missing or unreadable session always degrades to fresh quota state;
//! quota handling never denies service outright.

use crate::errors::Result;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Seconds after which a quota session's allowance resets.
pub const RESET_INTERVAL_SECS: i64 = 60 * 60 * 24;

/// Ephemeral per-visitor allowance state, keyed by session id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuotaSession {
    /// Restricted case views left before the next reset
    pub remaining: u32,
    /// Unix timestamp of the last allowance reset
    pub last_updated: i64,
}

impl QuotaSession {
    pub fn fresh(allowance: u32, now: i64) -> Self {
        Self {
            remaining: allowance,
            last_updated: now,
        }
    }
}

/// Session store abstraction: a key-value store of [`QuotaSession`] records
/// with exclusive per-key locking.
///
/// Implementations must treat unreadable or expired records as absent, and
/// must release the lock taken by [`with_locked`](SessionStore::with_locked)
/// on every exit path.
pub trait SessionStore: Send + Sync {
    /// Non-locking read. Absent or unreadable sessions read as `None`.
    fn peek(&self, session_id: &str) -> Option<QuotaSession>;

    /// Run `f` with exclusive access to the session record. `None` in the
    /// slot means no session exists; leaving `None` behind deletes it.
    fn with_locked<R>(
        &self,
        session_id: &str,
        f: impl FnOnce(&mut Option<QuotaSession>) -> R,
    ) -> R;
}

impl<T: SessionStore> SessionStore for std::sync::Arc<T> {
    fn peek(&self, session_id: &str) -> Option<QuotaSession> {
        (**self).peek(session_id)
    }

    fn with_locked<R>(
        &self,
        session_id: &str,
        f: impl FnOnce(&mut Option<QuotaSession>) -> R,
    ) -> R {
        (**self).with_locked(session_id, f)
    }
}

/// Persistent per-account allowance for authenticated users.
pub trait AccountStore: Send + Sync {
    /// Atomically spend one case view from the account's allowance and
    /// return the remaining balance. Exhausted accounts clamp at zero; they
    /// still receive content, so this never fails on an empty balance.
    fn spend_case_view(&self, user_id: Uuid, now: i64) -> Result<u32>;
}

impl<T: AccountStore> AccountStore for std::sync::Arc<T> {
    fn spend_case_view(&self, user_id: Uuid, now: i64) -> Result<u32> {
        (**self).spend_case_view(user_id, now)
    }
}

/// Opaque collaborator deciding whether a request comes from a recognized
/// search-engine crawler.
pub trait CrawlerClassifier: Send + Sync {
    fn is_verified_crawler(&self, user_agent: &str) -> bool;
}

/// Crawler classifier matching configured user-agent signatures.
pub struct UserAgentClassifier {
    signatures: Vec<String>,
}

impl UserAgentClassifier {
    pub fn new(signatures: Vec<String>) -> Self {
        Self { signatures }
    }
}

impl CrawlerClassifier for UserAgentClassifier {
    fn is_verified_crawler(&self, user_agent: &str) -> bool {
        self.signatures.iter().any(|sig| user_agent.contains(sig))
    }
}

/// Per-request access context assembled by the API layer.
#[derive(Debug, Clone)]
pub struct RequestContext {
    /// Visitor session id (from the session cookie)
    pub session_id: String,
    /// Authenticated account, if any
    pub authenticated_user: Option<Uuid>,
    /// Whether the `not_a_bot` verification cookie is present
    pub not_a_bot_cookie: bool,
    /// Whether the request was classified as a verified crawler
    pub verified_crawler: bool,
}

/// How a full-text grant was arrived at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GrantReason {
    /// Whitelisted jurisdiction; no quota involved
    Whitelisted,
    /// Authenticated user; account allowance spent
    Authenticated { remaining: u32 },
    /// Session quota spent
    QuotaSpent { remaining: u32 },
    /// Verified crawler; quota untouched
    Crawler,
}

/// Outcome of the quota gate for one restricted-case request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessDecision {
    /// Serve the full case text
    Full(GrantReason),
    /// Session quota exhausted: serve the metadata-only teaser
    MetadataOnly,
    /// No verification cookie yet: redirect to the verification step
    VerifyRedirect,
}

impl AccessDecision {
    pub fn grants_full_text(&self) -> bool {
        matches!(self, AccessDecision::Full(_))
    }
}

/// The access-control state machine, generic over its session and account
/// stores.
pub struct QuotaGate<S, A> {
    sessions: S,
    accounts: A,
    daily_allowance: u32,
    reset_interval: i64,
}

impl<S: SessionStore, A: AccountStore> QuotaGate<S, A> {
    pub fn new(sessions: S, accounts: A, daily_allowance: u32, reset_interval: i64) -> Self {
        Self {
            sessions,
            accounts,
            daily_allowance,
            reset_interval,
        }
    }

    /// Decide access for one case view. `now` is a unix timestamp.
    ///
    /// Whitelisted views return before any session access, so they never
    /// create or touch quota state.
    pub fn decide(
        &self,
        ctx: &RequestContext,
        jurisdiction_whitelisted: bool,
        now: i64,
    ) -> Result<AccessDecision> {
        if jurisdiction_whitelisted {
            return Ok(AccessDecision::Full(GrantReason::Whitelisted));
        }

        if let Some(user_id) = ctx.authenticated_user {
            let remaining = self.accounts.spend_case_view(user_id, now)?;
            return Ok(AccessDecision::Full(GrantReason::Authenticated {
                remaining,
            }));
        }

        // cookie-verified visitor with an existing quota session
        if ctx.not_a_bot_cookie && self.sessions.peek(&ctx.session_id).is_some() {
            let daily_allowance = self.daily_allowance;
            let reset_interval = self.reset_interval;
            let decision = self.sessions.with_locked(&ctx.session_id, |slot| {
                // a session gone stale between peek and lock reads as fresh
                let session = slot.get_or_insert(QuotaSession::fresh(daily_allowance, now));

                if now - session.last_updated >= reset_interval {
                    session.remaining = daily_allowance;
                    session.last_updated = now;
                }

                if session.remaining > 0 {
                    session.remaining -= 1;
                    AccessDecision::Full(GrantReason::QuotaSpent {
                        remaining: session.remaining,
                    })
                } else {
                    AccessDecision::MetadataOnly
                }
            });
            return Ok(decision);
        }

        if ctx.verified_crawler {
            return Ok(AccessDecision::Full(GrantReason::Crawler));
        }

        // no cookie and no quota state yet: seed a session and send the
        // visitor through the verification step
        let daily_allowance = self.daily_allowance;
        self.sessions.with_locked(&ctx.session_id, |slot| {
            *slot = Some(QuotaSession::fresh(daily_allowance, now));
        });
        Ok(AccessDecision::VerifyRedirect)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::collections::HashMap;
    use std::sync::Arc;

    #[derive(Default)]
    struct MemorySessionStore {
        inner: Mutex<HashMap<String, QuotaSession>>,
    }

    impl MemorySessionStore {
        fn session(&self, id: &str) -> Option<QuotaSession> {
            self.inner.lock().get(id).copied()
        }

        fn is_empty(&self) -> bool {
            self.inner.lock().is_empty()
        }
    }

    impl SessionStore for MemorySessionStore {
        fn peek(&self, session_id: &str) -> Option<QuotaSession> {
            self.inner.lock().get(session_id).copied()
        }

        fn with_locked<R>(
            &self,
            session_id: &str,
            f: impl FnOnce(&mut Option<QuotaSession>) -> R,
        ) -> R {
            let mut map = self.inner.lock();
            let mut slot = map.get(session_id).copied();
            let out = f(&mut slot);
            match slot {
                Some(session) => {
                    map.insert(session_id.to_string(), session);
                }
                None => {
                    map.remove(session_id);
                }
            }
            out
        }
    }

    #[derive(Default)]
    struct MemoryAccountStore {
        balances: Mutex<HashMap<Uuid, u32>>,
    }

    impl AccountStore for MemoryAccountStore {
        fn spend_case_view(&self, user_id: Uuid, _now: i64) -> Result<u32> {
            let mut balances = self.balances.lock();
            let balance = balances.entry(user_id).or_insert(500);
            *balance = balance.saturating_sub(1);
            Ok(*balance)
        }
    }

    fn gate() -> QuotaGate<Arc<MemorySessionStore>, Arc<MemoryAccountStore>> {
        QuotaGate::new(
            Arc::new(MemorySessionStore::default()),
            Arc::new(MemoryAccountStore::default()),
            3,
            RESET_INTERVAL_SECS,
        )
    }

    fn visitor(session_id: &str, cookie: bool) -> RequestContext {
        RequestContext {
            session_id: session_id.to_string(),
            authenticated_user: None,
            not_a_bot_cookie: cookie,
            verified_crawler: false,
        }
    }

    #[test]
    fn test_whitelisted_never_touches_session_state() {
        let gate = gate();
        let ctx = visitor("s1", false);
        let decision = gate.decide(&ctx, true, 1000).unwrap();
        assert_eq!(decision, AccessDecision::Full(GrantReason::Whitelisted));
        assert!(gate.sessions.is_empty());
    }

    #[test]
    fn test_authenticated_spends_account_allowance() {
        let gate = gate();
        let user = Uuid::new_v4();
        let ctx = RequestContext {
            authenticated_user: Some(user),
            ..visitor("s1", false)
        };
        let decision = gate.decide(&ctx, false, 1000).unwrap();
        assert_eq!(
            decision,
            AccessDecision::Full(GrantReason::Authenticated { remaining: 499 })
        );
        // account use leaves session state alone
        assert!(gate.sessions.is_empty());
    }

    #[test]
    fn test_fresh_visitor_redirected_and_session_seeded() {
        let gate = gate();
        let ctx = visitor("s1", false);
        let decision = gate.decide(&ctx, false, 1000).unwrap();
        assert_eq!(decision, AccessDecision::VerifyRedirect);
        assert_eq!(gate.sessions.session("s1"), Some(QuotaSession::fresh(3, 1000)));
    }

    #[test]
    fn test_cookie_without_session_still_redirects() {
        // cookie alone is not enough: the quota session must exist too
        let gate = gate();
        let ctx = visitor("s1", true);
        let decision = gate.decide(&ctx, false, 1000).unwrap();
        assert_eq!(decision, AccessDecision::VerifyRedirect);
    }

    #[test]
    fn test_quota_decrements_then_exhausts() {
        let gate = gate();
        let ctx = visitor("s1", true);
        gate.sessions.with_locked("s1", |slot| {
            *slot = Some(QuotaSession::fresh(3, 1000));
        });

        for expected_remaining in [2u32, 1, 0] {
            let decision = gate.decide(&ctx, false, 1000).unwrap();
            assert_eq!(
                decision,
                AccessDecision::Full(GrantReason::QuotaSpent {
                    remaining: expected_remaining
                })
            );
        }

        // fourth view within the same day is metadata only, quota stays at 0
        let decision = gate.decide(&ctx, false, 2000).unwrap();
        assert_eq!(decision, AccessDecision::MetadataOnly);
        assert_eq!(gate.sessions.session("s1").unwrap().remaining, 0);
    }

    #[test]
    fn test_daily_reset_restores_allowance() {
        let gate = gate();
        let ctx = visitor("s1", true);
        gate.sessions.with_locked("s1", |slot| {
            *slot = Some(QuotaSession {
                remaining: 0,
                last_updated: 1000,
            });
        });

        let now = 1000 + RESET_INTERVAL_SECS;
        let decision = gate.decide(&ctx, false, now).unwrap();
        assert_eq!(
            decision,
            AccessDecision::Full(GrantReason::QuotaSpent { remaining: 2 })
        );
        let session = gate.sessions.session("s1").unwrap();
        assert_eq!(session.remaining, 2);
        assert_eq!(session.last_updated, now);
    }

    #[test]
    fn test_crawler_bypasses_quota_without_session() {
        let gate = gate();
        let ctx = RequestContext {
            verified_crawler: true,
            ..visitor("s1", false)
        };
        let decision = gate.decide(&ctx, false, 1000).unwrap();
        assert_eq!(decision, AccessDecision::Full(GrantReason::Crawler));
        assert!(gate.sessions.is_empty());
    }

    #[test]
    fn test_crawler_with_exhausted_session_still_served() {
        // an exhausted session wins over crawler status only through the
        // cookie branch; without the cookie the crawler branch applies
        let gate = gate();
        gate.sessions.with_locked("s1", |slot| {
            *slot = Some(QuotaSession {
                remaining: 0,
                last_updated: 1000,
            });
        });
        let ctx = RequestContext {
            verified_crawler: true,
            ..visitor("s1", false)
        };
        let decision = gate.decide(&ctx, false, 1000).unwrap();
        assert_eq!(decision, AccessDecision::Full(GrantReason::Crawler));
        // crawler views leave the session untouched
        assert_eq!(gate.sessions.session("s1").unwrap().remaining, 0);
    }

    #[test]
    fn test_concurrent_requests_never_double_decrement() {
        let sessions = Arc::new(MemorySessionStore::default());
        let gate = Arc::new(QuotaGate::new(
            sessions.clone(),
            Arc::new(MemoryAccountStore::default()),
            3,
            RESET_INTERVAL_SECS,
        ));
        sessions.with_locked("s1", |slot| {
            *slot = Some(QuotaSession {
                remaining: 1,
                last_updated: 1000,
            });
        });

        let mut handles = Vec::new();
        for _ in 0..2 {
            let gate = gate.clone();
            handles.push(std::thread::spawn(move || {
                let ctx = RequestContext {
                    session_id: "s1".to_string(),
                    authenticated_user: None,
                    not_a_bot_cookie: true,
                    verified_crawler: false,
                };
                gate.decide(&ctx, false, 1000).unwrap()
            }));
        }
        let decisions: Vec<AccessDecision> =
            handles.into_iter().map(|h| h.join().unwrap()).collect();

        let full = decisions.iter().filter(|d| d.grants_full_text()).count();
        let teaser = decisions
            .iter()
            .filter(|d| **d == AccessDecision::MetadataOnly)
            .count();
        assert_eq!((full, teaser), (1, 1));
        assert_eq!(sessions.session("s1").unwrap().remaining, 0);
    }

    #[test]
    fn test_user_agent_classifier() {
        let classifier = UserAgentClassifier::new(vec!["Googlebot".to_string()]);
        assert!(classifier.is_verified_crawler(
            "Mozilla/5.0 (compatible; Googlebot/2.1; +http://www.google.com/bot.html)"
        ));
        assert!(!classifier.is_verified_crawler("Mozilla/5.0 (X11; Linux x86_64)"));
    }
}
