//! # API Server Module
//!
//! ## Purpose
//! REST API server for the caselaw access layer: citation views, case
//! filtering, filter discovery, and the bot-verification step.
//!
//! ## Input/Output Specification
//! - **Input**: HTTP requests with citation paths, filter parameters, cookies
//! - **Output**: JSON responses with resolved cases, listings, redirects
//! - **Endpoints**: Health, cases, filters, verify, citation views
//!
//! ## Key Features
//! - Literal routes registered ahead of the citation path routes
//! - Session and verification cookies feeding the quota gate
//! - `X-Robots-Tag` directives on restricted and non-indexable cases
//! - Open-redirect-safe `next` handling on the verification step

use crate::errors::{AccessError, Result};
use crate::filters::{self, CaseFilterParams, LoadedChoices};
use crate::quota::{AccessDecision, CrawlerClassifier, RequestContext};
use crate::resolver::{CaseStore, CitePath, Resolution, ResolvedCase};
use crate::{AppState, CaseRecord};
use actix_cors::Cors;
use actix_web::cookie::time::Duration as CookieDuration;
use actix_web::cookie::Cookie;
use actix_web::{web, App, HttpRequest, HttpResponse, HttpServer};
use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Verification cookie name
const NOT_A_BOT_COOKIE: &str = "not_a_bot";
/// Session cookie name
const SESSION_COOKIE: &str = "sessionid";
/// Verification cookie lifetime: effectively permanent
const NOT_A_BOT_MAX_AGE_DAYS: i64 = 365 * 100;

/// Characters escaped when a path is embedded as a query value.
const QUERY_VALUE: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'&')
    .add(b'+')
    .add(b'<')
    .add(b'>')
    .add(b'?');

/// API server wrapping the shared application state
pub struct ApiServer {
    app_state: AppState,
}

impl ApiServer {
    pub fn new(app_state: AppState) -> Self {
        Self { app_state }
    }

    /// Run the API server
    pub async fn run(self) -> Result<()> {
        let server = &self.app_state.config.server;
        let bind_addr = format!("{}:{}", server.host, server.port);
        let workers = server.workers;
        let enable_cors = server.enable_cors;

        tracing::info!("Starting API server on {}", bind_addr);

        let app_state = self.app_state.clone();
        HttpServer::new(move || {
            let cors = if enable_cors {
                Cors::permissive()
            } else {
                Cors::default()
            };
            App::new()
                .wrap(cors)
                .app_data(web::Data::new(app_state.clone()))
                .configure(register_routes)
        })
        .workers(workers)
        .bind(&bind_addr)
        .map_err(|e| AccessError::Internal {
            message: format!("Failed to bind server to {}: {}", bind_addr, e),
        })?
        .run()
        .await
        .map_err(|e| AccessError::Internal {
            message: format!("Server error: {}", e),
        })?;

        Ok(())
    }
}

/// Route table. Literal routes come first so `/cases` is never captured by
/// the `/{series}` citation route.
pub fn register_routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/", web::get().to(index_handler))
        .route("/health", web::get().to(health_handler))
        .route("/cases", web::get().to(cases_handler))
        .route("/filters", web::get().to(filters_handler))
        .route("/filters/refresh", web::post().to(filters_refresh_handler))
        .route("/verify", web::get().to(verify_page_handler))
        .route("/verify", web::post().to(verify_submit_handler))
        .route("/{series}", web::get().to(series_handler))
        .route("/{series}/{volume}", web::get().to(volume_handler))
        .route("/{series}/{volume}/{page}", web::get().to(citation_handler))
        .route(
            "/{series}/{volume}/{page}/{case_id}",
            web::get().to(citation_with_id_handler),
        );
}

/// Index page handler
async fn index_handler() -> HttpResponse {
    let html = r#"
    <!DOCTYPE html>
    <html>
    <head>
        <title>Caselaw Access API</title>
        <style>
            body { font-family: Arial, sans-serif; margin: 40px; }
            .header { color: #2c3e50; }
            .endpoint { margin: 20px 0; padding: 15px; background: #f8f9fa; border-radius: 5px; }
            .method { font-weight: bold; color: #27ae60; }
        </style>
    </head>
    <body>
        <h1 class="header">Caselaw Access API</h1>
        <p>Public access layer for a caselaw database: citation resolution, case filtering, and full-text search.</p>

        <h2>Available Endpoints</h2>

        <div class="endpoint">
            <span class="method">GET</span> /{series}/{volume}/{page}
            <p>Resolve a citation to a case, a disambiguation list, or a redirect.</p>
        </div>

        <div class="endpoint">
            <span class="method">GET</span> /cases
            <p>Filter cases by citation, name, court, jurisdiction, date range, or full-text search.</p>
        </div>

        <div class="endpoint">
            <span class="method">GET</span> /filters
            <p>List the declared filter fields and their selectable choices.</p>
        </div>

        <div class="endpoint">
            <span class="method">GET</span> /health
            <p>Check the health status of the service.</p>
        </div>

        <h2>Example</h2>
        <pre>GET /f-3d/123/456
GET /cases?search=%22due%20process%22&jurisdiction=mass</pre>
    </body>
    </html>
    "#;

    HttpResponse::Ok().content_type("text/html").body(html)
}

/// Health check response
#[derive(Debug, Serialize)]
struct HealthResponse {
    status: String,
    version: String,
    storage: String,
}

async fn health_handler(state: web::Data<AppState>) -> HttpResponse {
    let storage_status = match state.catalog.health_check() {
        Ok(_) => "healthy",
        Err(_) => "unhealthy",
    };
    let response = HealthResponse {
        status: storage_status.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        storage: storage_status.to_string(),
    };
    HttpResponse::Ok().json(response)
}

/// Per-request access context plus the session cookie to set when the
/// visitor arrived without one.
fn request_context(req: &HttpRequest, state: &AppState) -> (RequestContext, Option<String>) {
    let (session_id, new_session) = match req.cookie(SESSION_COOKIE) {
        Some(cookie) => (cookie.value().to_string(), None),
        None => {
            let id = Uuid::new_v4().to_string();
            (id.clone(), Some(id))
        }
    };

    let authenticated_user = req
        .headers()
        .get("x-user-id")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| Uuid::parse_str(v).ok());

    let user_agent = req
        .headers()
        .get("user-agent")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");

    let ctx = RequestContext {
        session_id,
        authenticated_user,
        not_a_bot_cookie: req.cookie(NOT_A_BOT_COOKIE).is_some(),
        verified_crawler: state.classifier.is_verified_crawler(user_agent),
    };
    (ctx, new_session)
}

fn session_cookie(session_id: String) -> Cookie<'static> {
    Cookie::build(SESSION_COOKIE, session_id)
        .path("/")
        .http_only(true)
        .finish()
}

/// Attach the session cookie to a response when one was just created.
fn with_session(mut response: HttpResponse, new_session: Option<String>) -> HttpResponse {
    if let Some(id) = new_session {
        if let Err(e) = response.add_cookie(&session_cookie(id)) {
            tracing::error!("Failed to set session cookie: {}", e);
        }
    }
    response
}

/// Redirect targets from query parameters must stay on this origin: they
/// must start with a single `/`.
fn safe_redirect(next: Option<&str>) -> String {
    match next {
        Some(next) if next.starts_with('/') && !next.starts_with("//") => next.to_string(),
        _ => "/".to_string(),
    }
}

#[derive(Debug, Deserialize)]
struct VerifyParams {
    next: Option<String>,
}

async fn verify_page_handler(query: web::Query<VerifyParams>) -> HttpResponse {
    let next = safe_redirect(query.next.as_deref());
    HttpResponse::Ok().json(serde_json::json!({
        "message": "Confirm you are not a bot to continue reading case text.",
        "next": next,
    }))
}

/// Verification submission: set the long-lived verification cookie and send
/// the visitor back where they came from.
async fn verify_submit_handler(
    req: HttpRequest,
    state: web::Data<AppState>,
    query: web::Query<VerifyParams>,
) -> HttpResponse {
    let (_, new_session) = request_context(&req, &state);
    let next = safe_redirect(query.next.as_deref());

    let cookie = Cookie::build(NOT_A_BOT_COOKIE, "1")
        .path("/")
        .max_age(CookieDuration::days(NOT_A_BOT_MAX_AGE_DAYS))
        .finish();

    let mut response = HttpResponse::Found()
        .insert_header(("Location", next))
        .finish();
    if let Err(e) = response.add_cookie(&cookie) {
        tracing::error!("Failed to set verification cookie: {}", e);
    }
    with_session(response, new_session)
}

/// Case listing response entry
#[derive(Debug, Serialize)]
struct CaseListEntry {
    #[serde(flatten)]
    case: CaseRecord,
    #[serde(skip_serializing_if = "Option::is_none")]
    body: Option<String>,
}

async fn cases_handler(
    req: HttpRequest,
    state: web::Data<AppState>,
    params: web::Query<CaseFilterParams>,
) -> std::result::Result<HttpResponse, AccessError> {
    let (ctx, new_session) = request_context(&req, &state);
    let choices = load_choices(&state)?;
    let plan = filters::build_query_plan(&params, &choices)?;
    let cases = state.catalog.run_query(&plan)?;

    let mut entries = Vec::with_capacity(cases.len());
    for case in cases {
        // listings never spend quota: full text only where it is free
        let body = if plan.rendering.full_case && unmetered(&state, &ctx, &case)? {
            state.catalog.body(case.id)?.map(|b| b.text)
        } else {
            None
        };
        entries.push(CaseListEntry { case, body });
    }

    let response = HttpResponse::Ok().json(serde_json::json!({
        "count": entries.len(),
        "body_format": plan.rendering.body_format,
        "results": entries,
    }));
    Ok(with_session(response, new_session))
}

/// Whether this visitor reads the case's text without quota accounting:
/// whitelisted jurisdiction or an authenticated account.
fn unmetered(state: &AppState, ctx: &RequestContext, case: &CaseRecord) -> Result<bool> {
    if ctx.authenticated_user.is_some() {
        return Ok(true);
    }
    Ok(state
        .catalog
        .jurisdiction(case.jurisdiction_id)?
        .map(|j| j.whitelisted)
        .unwrap_or(false))
}

fn load_choices(state: &AppState) -> Result<LoadedChoices> {
    Ok(LoadedChoices {
        jurisdictions: state
            .choices
            .jurisdictions
            .get_or_load(|| state.catalog.jurisdiction_choices())?,
        courts: state
            .choices
            .courts
            .get_or_load(|| state.catalog.court_choices())?,
        reporters: state
            .choices
            .reporters
            .get_or_load(|| state.catalog.reporter_choices())?,
    })
}

async fn filters_handler(
    state: web::Data<AppState>,
) -> std::result::Result<HttpResponse, AccessError> {
    let choices = load_choices(&state)?;
    Ok(HttpResponse::Ok().json(serde_json::json!({
        "filters": filters::declared_filters(),
        "choices": {
            "jurisdiction": choices.jurisdictions,
            "court": choices.courts,
            "reporter": choices.reporters,
        },
    })))
}

/// Drop the cached choice sets after catalog changes.
async fn filters_refresh_handler(state: web::Data<AppState>) -> HttpResponse {
    state.choices.invalidate_all();
    tracing::info!("Filter choice caches invalidated");
    HttpResponse::NoContent().finish()
}

async fn series_handler(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> std::result::Result<HttpResponse, AccessError> {
    let series = path.into_inner();
    let canonical = crate::citations::slugify(&series);
    if canonical != series {
        return Ok(redirect_permanent(&format!("/{}", canonical)));
    }

    let reporter = state
        .catalog
        .reporter_by_slug(&series)?
        .ok_or(AccessError::NotFound { cite: series })?;
    let volumes = state.catalog.volumes_for_reporter(reporter.id)?;
    Ok(HttpResponse::Ok().json(serde_json::json!({
        "reporter": reporter,
        "volumes": volumes,
    })))
}

async fn volume_handler(
    state: web::Data<AppState>,
    path: web::Path<(String, String)>,
) -> std::result::Result<HttpResponse, AccessError> {
    let (series, volume) = path.into_inner();
    let canonical = crate::citations::slugify(&series);
    if canonical != series {
        return Ok(redirect_permanent(&format!("/{}/{}", canonical, volume)));
    }

    let reporter = state
        .catalog
        .reporter_by_slug(&series)?
        .ok_or(AccessError::NotFound { cite: series })?;
    let cases = state.catalog.cases_in_volume(reporter.id, &volume)?;
    let listings: Vec<serde_json::Value> = cases
        .iter()
        .map(|case| {
            serde_json::json!({
                "name_abbreviation": case.name_abbreviation,
                "first_page": case.first_page,
                "path": case.frontend_path(&reporter.slug),
            })
        })
        .collect();
    Ok(HttpResponse::Ok().json(serde_json::json!({
        "reporter": reporter,
        "volume": volume,
        "cases": listings,
    })))
}

async fn citation_handler(
    req: HttpRequest,
    state: web::Data<AppState>,
    path: web::Path<(String, String, String)>,
) -> std::result::Result<HttpResponse, AccessError> {
    let (series, volume, page) = path.into_inner();
    citation_view(req, state, series, volume, page, None)
}

async fn citation_with_id_handler(
    req: HttpRequest,
    state: web::Data<AppState>,
    path: web::Path<(String, String, String, Uuid)>,
) -> std::result::Result<HttpResponse, AccessError> {
    let (series, volume, page, case_id) = path.into_inner();
    citation_view(req, state, series, volume, page, Some(case_id))
}

fn citation_view(
    req: HttpRequest,
    state: web::Data<AppState>,
    series: String,
    volume: String,
    page: String,
    case_id: Option<Uuid>,
) -> std::result::Result<HttpResponse, AccessError> {
    let (ctx, new_session) = request_context(&req, &state);
    let path = CitePath {
        series_slug: series,
        volume,
        page,
        case_id,
    };
    let now = chrono::Utc::now().timestamp();

    let response = match state.resolver.resolve(&path, &ctx, now)? {
        Resolution::Redirect { path } => redirect_permanent(&path.to_url()),
        Resolution::Resolved(resolved) => match resolved.access {
            AccessDecision::VerifyRedirect => {
                let url = path.to_url();
                let next = utf8_percent_encode(&url, QUERY_VALUE);
                HttpResponse::Found()
                    .insert_header(("Location", format!("/verify?next={}", next)))
                    .finish()
            }
            _ => render_case(&state, &resolved)?,
        },
        Resolution::Ambiguous(disambiguation) => {
            if disambiguation.candidates.is_empty() {
                // echo the request back so the 404 page can display the cite
                HttpResponse::NotFound().json(&disambiguation)
            } else {
                HttpResponse::Ok().json(&disambiguation)
            }
        }
    };
    Ok(with_session(response, new_session))
}

fn render_case(state: &AppState, resolved: &ResolvedCase) -> Result<HttpResponse> {
    let body = if resolved.access.grants_full_text() {
        state.catalog.body(resolved.case.id)?.map(|b| b.text)
    } else {
        None
    };

    let access = match resolved.access {
        AccessDecision::Full(reason) => serde_json::json!({
            "full_text": true,
            "reason": reason,
        }),
        _ => serde_json::json!({ "full_text": false }),
    };

    let mut builder = HttpResponse::Ok();
    if let Some(robots) = robots_header(resolved) {
        builder.insert_header(("X-Robots-Tag", robots));
    }
    Ok(builder.json(serde_json::json!({
        "case": resolved.case,
        "citations": resolved.citations,
        "access": access,
        "body": body,
    })))
}

fn robots_header(resolved: &ResolvedCase) -> Option<String> {
    let mut directives = Vec::new();
    if resolved.directives.noindex {
        directives.push("noindex");
    }
    if resolved.directives.noarchive {
        directives.push("noarchive");
    }
    if directives.is_empty() {
        None
    } else {
        Some(directives.join(", "))
    }
}

fn redirect_permanent(location: &str) -> HttpResponse {
    HttpResponse::MovedPermanently()
        .insert_header(("Location", location.to_string()))
        .finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::quota::{QuotaGate, UserAgentClassifier};
    use crate::storage::{open_database, CatalogStore, SledAccountStore, SledSessionStore};
    use crate::{CaseBody, CitationRecord, JurisdictionRecord, ReporterRecord};
    use actix_web::{http::StatusCode, test};
    use chrono::NaiveDate;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn build_state(dir: &TempDir) -> AppState {
        let config = Arc::new(Config::default());
        let db = open_database(&dir.path().join("db")).unwrap();
        let catalog = Arc::new(CatalogStore::open(&db).unwrap());
        let sessions = Arc::new(SledSessionStore::open(&db).unwrap());
        let accounts = Arc::new(
            SledAccountStore::open(
                &db,
                config.quota.account_case_allowance,
                config.quota.account_allowance_resets,
                config.quota.reset_interval_seconds,
            )
            .unwrap(),
        );
        let gate = QuotaGate::new(
            sessions,
            accounts,
            config.quota.daily_case_allowance,
            config.quota.reset_interval_seconds,
        );
        let resolver = Arc::new(crate::AppResolver::new(catalog.clone(), gate));
        AppState {
            config: config.clone(),
            catalog,
            resolver,
            choices: Arc::new(crate::filters::FilterChoices::new()),
            classifier: Arc::new(UserAgentClassifier::new(
                config.quota.verified_crawlers.clone(),
            )),
        }
    }

    fn seed_case(state: &AppState, whitelisted: bool) -> CaseRecord {
        let jurisdiction = JurisdictionRecord {
            id: Uuid::new_v4(),
            slug: "mass".to_string(),
            name: "Mass.".to_string(),
            name_long: "Massachusetts".to_string(),
            whitelisted,
        };
        state.catalog.insert_jurisdiction(&jurisdiction).unwrap();

        let reporter = ReporterRecord {
            id: Uuid::new_v4(),
            slug: "f-3d".to_string(),
            full_name: "Federal Reporter, Third Series".to_string(),
            short_name: "F.3d".to_string(),
            start_year: Some(1993),
            end_year: None,
        };
        state.catalog.insert_reporter(&reporter).unwrap();

        let case = CaseRecord {
            id: Uuid::new_v4(),
            name: "Smith versus Jones".to_string(),
            name_abbreviation: "Smith v. Jones".to_string(),
            docket_number: None,
            decision_date: NaiveDate::from_ymd_opt(1995, 3, 4).unwrap(),
            jurisdiction_id: jurisdiction.id,
            jurisdiction_slug: jurisdiction.slug,
            court_id: Uuid::new_v4(),
            court_slug: "1st-cir".to_string(),
            reporter_id: reporter.id,
            volume_number: "123".to_string(),
            first_page: "456".to_string(),
            in_scope: true,
            no_index: false,
            duplicative: false,
        };
        state.catalog.insert_case(&case).unwrap();
        state
            .catalog
            .insert_citation(&CitationRecord {
                id: Uuid::new_v4(),
                case_id: case.id,
                cite: "123 F.3d 456".to_string(),
                normalized_cite: "123f3d456".to_string(),
                citation_type: "official".to_string(),
                duplicative: false,
            })
            .unwrap();
        state
            .catalog
            .insert_body(&CaseBody {
                case_id: case.id,
                text: "The defendant's negligence caused the injury.".to_string(),
            })
            .unwrap();
        case
    }

    #[actix_web::test]
    async fn test_non_canonical_slug_redirects() {
        let dir = TempDir::new().unwrap();
        let state = build_state(&dir);
        seed_case(&state, true);
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state))
                .configure(register_routes),
        )
        .await;

        let req = test::TestRequest::get().uri("/F.%203d/123/456").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::MOVED_PERMANENTLY);
        assert_eq!(
            resp.headers().get("Location").unwrap(),
            "/f-3d/123/456"
        );
    }

    #[actix_web::test]
    async fn test_whitelisted_case_served_with_body() {
        let dir = TempDir::new().unwrap();
        let state = build_state(&dir);
        seed_case(&state, true);
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state))
                .configure(register_routes),
        )
        .await;

        let req = test::TestRequest::get().uri("/f-3d/123/456").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert!(resp.headers().get("X-Robots-Tag").is_none());

        let body: serde_json::Value = test::read_body_json(resp).await;
        assert!(body["access"]["full_text"].as_bool().unwrap());
        assert!(body["body"].as_str().unwrap().contains("negligence"));
    }

    #[actix_web::test]
    async fn test_fresh_visitor_to_restricted_case_gets_verify_redirect() {
        let dir = TempDir::new().unwrap();
        let state = build_state(&dir);
        seed_case(&state, false);
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state))
                .configure(register_routes),
        )
        .await;

        let req = test::TestRequest::get().uri("/f-3d/123/456").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::FOUND);
        assert_eq!(
            resp.headers().get("Location").unwrap(),
            "/verify?next=/f-3d/123/456"
        );
        // a session cookie is seeded alongside the redirect
        let cookies: Vec<_> = resp.response().cookies().collect();
        assert!(cookies.iter().any(|c| c.name() == SESSION_COOKIE));
    }

    #[actix_web::test]
    async fn test_restricted_case_carries_noarchive_for_authenticated_reader() {
        let dir = TempDir::new().unwrap();
        let state = build_state(&dir);
        seed_case(&state, false);
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state))
                .configure(register_routes),
        )
        .await;

        let req = test::TestRequest::get()
            .uri("/f-3d/123/456")
            .insert_header(("x-user-id", Uuid::new_v4().to_string()))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(resp.headers().get("X-Robots-Tag").unwrap(), "noarchive");
    }

    #[actix_web::test]
    async fn test_unknown_citation_returns_404_with_echo() {
        let dir = TempDir::new().unwrap();
        let state = build_state(&dir);
        seed_case(&state, true);
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state))
                .configure(register_routes),
        )
        .await;

        let req = test::TestRequest::get().uri("/f-3d/999/1").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        let body: serde_json::Value = test::read_body_json(resp).await;
        assert_eq!(body["full_cite"], "999 F 3D 1");
    }

    #[::core::prelude::v1::test]
    fn test_verify_next_value_is_query_safe() {
        // reserved characters in a path segment survive the round trip
        let encoded = utf8_percent_encode("/f-3d/1&2/45?6", QUERY_VALUE).to_string();
        assert_eq!(encoded, "/f-3d/1%262/45%3F6");
        // plain citation paths pass through untouched
        let encoded = utf8_percent_encode("/f-3d/123/456", QUERY_VALUE).to_string();
        assert_eq!(encoded, "/f-3d/123/456");
    }

    #[actix_web::test]
    async fn test_verify_submit_sets_cookie_and_redirects_safely() {
        let dir = TempDir::new().unwrap();
        let state = build_state(&dir);
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state))
                .configure(register_routes),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/verify?next=/f-3d/123/456")
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::FOUND);
        assert_eq!(resp.headers().get("Location").unwrap(), "/f-3d/123/456");
        let cookies: Vec<_> = resp.response().cookies().collect();
        assert!(cookies.iter().any(|c| c.name() == NOT_A_BOT_COOKIE));

        // protocol-relative targets are rejected
        let req = test::TestRequest::post()
            .uri("/verify?next=//evil.example")
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.headers().get("Location").unwrap(), "/");
    }

    #[actix_web::test]
    async fn test_cases_filter_validation_is_a_400() {
        let dir = TempDir::new().unwrap();
        let state = build_state(&dir);
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state))
                .configure(register_routes),
        )
        .await;

        let req = test::TestRequest::get()
            .uri("/cases?name_abbreviation=ab")
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body: serde_json::Value = test::read_body_json(resp).await;
        assert_eq!(
            body["name_abbreviation"],
            "Minimum query length is 3 characters."
        );
    }

    #[actix_web::test]
    async fn test_cases_listing_and_volume_listing() {
        let dir = TempDir::new().unwrap();
        let state = build_state(&dir);
        let case = seed_case(&state, true);
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state))
                .configure(register_routes),
        )
        .await;

        let req = test::TestRequest::get()
            .uri("/cases?jurisdiction=mass&full_case=true")
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let body: serde_json::Value = test::read_body_json(resp).await;
        assert_eq!(body["count"], 1);
        // whitelisted jurisdiction: body included without spending quota
        assert!(body["results"][0]["body"].as_str().is_some());

        let req = test::TestRequest::get().uri("/f-3d/123").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let body: serde_json::Value = test::read_body_json(resp).await;
        assert_eq!(
            body["cases"][0]["path"],
            format!("/f-3d/123/456/{}", case.id)
        );
    }
}
