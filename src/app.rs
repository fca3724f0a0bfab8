use std::{net::SocketAddr, sync::Arc, time::Duration};

use axum::{middleware, routing::get, Json, Router};
use serde_json::{json, Value};
use tokio::sync::Notify;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::auth::extractors::require_auth;
use crate::state::AppState;
use crate::{auth, expenses};

pub fn build_app(state: AppState) -> Router {
    let protected = Router::new()
        .merge(auth::protected_router())
        .merge(expenses::router())
        .route_layer(middleware::from_fn_with_state(state.clone(), require_auth));

    Router::new()
        .merge(auth::public_router())
        .route("/health", get(health))
        .merge(protected)
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|req: &axum::http::Request<_>| {
                    let method = req.method().clone();
                    let uri = req.uri().clone();
                    tracing::info_span!("http_request", %method, uri = %uri, status = tracing::field::Empty)
                })
                .on_response(
                    |res: &axum::http::Response<_>,
                     latency: std::time::Duration,
                     span: &tracing::Span| {
                        let status = res.status();
                        span.record("status", tracing::field::display(status));
                        let latency_ms = latency.as_millis() as u64;
                        if status.is_server_error() {
                            tracing::error!(%status, latency_ms, "response");
                        } else {
                            tracing::info!(%status, latency_ms, "response");
                        }
                    },
                ),
        )
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

/// Serves until `shutdown` resolves, then lets in-flight requests finish
/// for at most `grace` before dropping them.
pub async fn serve<F>(app: Router, addr: SocketAddr, shutdown: F, grace: Duration) -> anyhow::Result<()>
where
    F: std::future::Future<Output = ()> + Send + 'static,
{
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("listening on {}", listener.local_addr()?);

    let stop = Arc::new(Notify::new());
    let stopped = stop.clone();
    let mut server = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async move { stopped.notified().await })
            .await
    });

    tokio::select! {
        res = &mut server => return res?.map_err(Into::into),
        _ = shutdown => {}
    }

    tracing::info!(grace_secs = grace.as_secs(), "draining in-flight requests");
    stop.notify_one();
    match tokio::time::timeout(grace, &mut server).await {
        Ok(res) => {
            res??;
            tracing::info!("server stopped cleanly");
        }
        Err(_) => {
            tracing::warn!("grace period elapsed, forcing shutdown");
            server.abort();
        }
    }
    Ok(())
}

pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("received Ctrl+C, shutting down"),
        _ = terminate => tracing::info!("received SIGTERM, shutting down"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::Body,
        http::{header, Method, Request, StatusCode},
    };
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    async fn call(
        app: &Router,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut req = Request::builder().method(method).uri(uri);
        if let Some(t) = token {
            req = req.header(header::AUTHORIZATION, format!("Bearer {t}"));
        }
        let req = match body {
            Some(b) => req
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(b.to_string())),
            None => req.body(Body::empty()),
        }
        .unwrap();

        let res = app.clone().oneshot(req).await.unwrap();
        let status = res.status();
        let bytes = res.into_body().collect().await.unwrap().to_bytes();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, json)
    }

    async fn register_and_login(app: &Router, email: &str) -> (i64, String) {
        let creds = json!({ "email": email, "password": "password123" });
        let (status, user) = call(app, Method::POST, "/users/register", None, Some(creds.clone())).await;
        assert_eq!(status, StatusCode::CREATED, "register: {user}");

        let (status, body) = call(app, Method::POST, "/users/login", None, Some(creds)).await;
        assert_eq!(status, StatusCode::OK, "login: {body}");
        assert_eq!(body["user"]["id"], user["id"]);
        (
            body["user"]["id"].as_i64().unwrap(),
            body["token"].as_str().unwrap().to_string(),
        )
    }

    #[tokio::test]
    async fn health_needs_no_token() {
        let app = build_app(AppState::fake());
        let (status, body) = call(&app, Method::GET, "/health", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn protected_routes_reject_missing_or_bad_tokens() {
        let app = build_app(AppState::fake());
        for (method, uri) in [
            (Method::GET, "/users/me"),
            (Method::GET, "/users/expenses"),
            (Method::POST, "/users/expenses"),
            (Method::GET, "/expenses/1"),
            (Method::PUT, "/expenses/1"),
            (Method::DELETE, "/expenses/1"),
        ] {
            let (status, body) = call(&app, method.clone(), uri, None, None).await;
            assert_eq!(status, StatusCode::UNAUTHORIZED, "{method} {uri}");
            assert_eq!(body["error"], "unauthorized");

            let (status, _) = call(&app, method.clone(), uri, Some("not-a-token"), None).await;
            assert_eq!(status, StatusCode::UNAUTHORIZED, "{method} {uri}");
        }
    }

    #[tokio::test]
    async fn token_signed_elsewhere_is_rejected() {
        let app = build_app(AppState::fake());
        let foreign = crate::auth::jwt::JwtKeys::new(&crate::config::JwtConfig {
            secret: "another-secret".into(),
            issuer: "test-issuer".into(),
            audience: "test-aud".into(),
            ttl_minutes: 60,
        });
        let token = foreign.sign(1).unwrap();
        let (status, _) = call(&app, Method::GET, "/users/me", Some(&token), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn register_login_and_me() {
        let app = build_app(AppState::fake());
        let (user_id, token) = register_and_login(&app, "ana@example.com").await;

        let (status, me) = call(&app, Method::GET, "/users/me", Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(me["user_id"], user_id);
        assert_eq!(me["email"], "ana@example.com");
        assert!(me.get("password_hash").is_none());
    }

    #[tokio::test]
    async fn valid_token_for_unknown_user_is_unauthorized() {
        let state = AppState::fake();
        let token = state.jwt.sign(9_999).unwrap();
        let app = build_app(state);

        let (status, body) = call(&app, Method::GET, "/users/me", Some(&token), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"], "unauthorized");
    }

    #[tokio::test]
    async fn registration_errors() {
        let app = build_app(AppState::fake());
        register_and_login(&app, "dup@example.com").await;

        let dup = json!({ "email": "dup@example.com", "password": "password123" });
        let (status, body) = call(&app, Method::POST, "/users/register", None, Some(dup)).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error"], "email already registered");

        let bad = json!({ "email": "nope", "password": "password123" });
        let (status, _) = call(&app, Method::POST, "/users/register", None, Some(bad)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let missing = json!({ "email": "x@example.com" });
        let (status, body) = call(&app, Method::POST, "/users/register", None, Some(missing)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "invalid input");
    }

    #[tokio::test]
    async fn login_failures_are_uniform() {
        let app = build_app(AppState::fake());
        register_and_login(&app, "lee@example.com").await;

        let wrong = json!({ "email": "lee@example.com", "password": "wrong-pass" });
        let (s1, b1) = call(&app, Method::POST, "/users/login", None, Some(wrong)).await;
        let unknown = json!({ "email": "ghost@example.com", "password": "password123" });
        let (s2, b2) = call(&app, Method::POST, "/users/login", None, Some(unknown)).await;

        assert_eq!(s1, StatusCode::UNAUTHORIZED);
        assert_eq!((s1, &b1), (s2, &b2));
        assert_eq!(b1["error"], "invalid email or password");
    }

    #[tokio::test]
    async fn expense_lifecycle_over_http() {
        let app = build_app(AppState::fake());
        let (user_id, token) = register_and_login(&app, "kim@example.com").await;

        let (status, created) = call(
            &app,
            Method::POST,
            "/users/expenses",
            Some(&token),
            Some(json!({ "amount": 12.5, "category": "fuel" })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(created["amount"], 12.5);
        assert_eq!(created["category"], "fuel");
        assert_eq!(created["user_id"], user_id);
        let id = created["id"].as_i64().unwrap();

        let uri = format!("/expenses/{id}");
        let (status, got) = call(&app, Method::GET, &uri, Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(got["expense"], created);

        let (status, updated) = call(
            &app,
            Method::PUT,
            &uri,
            Some(&token),
            Some(json!({ "category": "travel" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(updated["expense"]["amount"], 12.5);
        assert_eq!(updated["expense"]["category"], "travel");

        let (status, list) = call(&app, Method::GET, "/users/expenses", Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(list["expenses"].as_array().unwrap().len(), 1);

        let (status, body) = call(&app, Method::DELETE, &uri, Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], "expense deleted successfully");

        let (status, body) = call(&app, Method::DELETE, &uri, Some(&token), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "expense not found");

        let (status, list) = call(&app, Method::GET, "/users/expenses", Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(list["expenses"], json!([]));
    }

    #[tokio::test]
    async fn other_users_expense_answers_like_a_missing_one() {
        let app = build_app(AppState::fake());
        let (_, owner) = register_and_login(&app, "owner@example.com").await;
        let (_, intruder) = register_and_login(&app, "intruder@example.com").await;

        let (_, created) = call(
            &app,
            Method::POST,
            "/users/expenses",
            Some(&owner),
            Some(json!({ "amount": 50.0, "category": "food" })),
        )
        .await;
        let owned = format!("/expenses/{}", created["id"]);
        let missing = "/expenses/424242".to_string();

        for uri in [&owned, &missing] {
            let get = call(&app, Method::GET, uri, Some(&intruder), None).await;
            let put = call(&app, Method::PUT, uri, Some(&intruder), Some(json!({ "amount": 1.0 }))).await;
            let del = call(&app, Method::DELETE, uri, Some(&intruder), None).await;
            for (status, body) in [get, put, del] {
                assert_eq!(status, StatusCode::NOT_FOUND, "{uri}");
                assert_eq!(body, json!({ "error": "expense not found" }));
            }
        }

        let (status, still) = call(&app, Method::GET, &owned, Some(&owner), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(still["expense"]["amount"], 50.0);
    }

    #[tokio::test]
    async fn invalid_expense_input_is_a_bad_request() {
        let app = build_app(AppState::fake());
        let (_, token) = register_and_login(&app, "val@example.com").await;

        for body in [
            json!({ "amount": 0, "category": "food" }),
            json!({ "amount": -5, "category": "food" }),
            json!({ "amount": 5, "category": "   " }),
            json!({ "amount": "five", "category": "food" }),
            json!({ "category": "food" }),
        ] {
            let (status, resp) =
                call(&app, Method::POST, "/users/expenses", Some(&token), Some(body.clone())).await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "{body} -> {resp}");
        }

        let (status, body) = call(&app, Method::GET, "/expenses/abc", Some(&token), None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "invalid expense id");

        let (status, _) = call(&app, Method::DELETE, "/expenses/0", Some(&token), None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}
