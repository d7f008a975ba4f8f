//! The HTTP surface. Tenant routes resolve a tenant from the host and read
//! the session; platform routes (sign-up, the shared OAuth endpoint) work
//! with or without one. Everything except `/health` runs inside the request
//! transaction set up by [`web_setup`].

use std::future::Future;

use axum::middleware::{from_fn, from_fn_with_state};
use axum::routing::{get, post, put};
use axum::Router;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::context::AppState;
use crate::handlers::{self, elevated, protected, public};
use crate::middleware::{
    check_private_tenant, check_token_origin, optional_tenant, read_session, require_administrator,
    require_authenticated, require_collaborator, require_tenant, set_jwt_from_query, web_setup,
};

pub fn app(state: AppState) -> Router {
    let mut app = Router::new()
        .merge(tenant_routes(&state))
        .merge(platform_routes(&state))
        .layer(from_fn_with_state(state.clone(), web_setup))
        .route("/health", get(public::health::health))
        .fallback(handlers::not_found)
        .layer(TraceLayer::new_for_http());

    if state.config().server.enable_cors {
        app = app.layer(CorsLayer::permissive());
    }
    app.with_state(state)
}

/// Serves until `shutdown` resolves, then waits for the workers to finish
/// the jobs already queued. The router holds the last queue sender, so
/// dropping it is what lets the workers stop.
pub async fn serve(
    listener: TcpListener,
    state: AppState,
    workers: Vec<JoinHandle<()>>,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> std::io::Result<()> {
    axum::serve(listener, app(state)).with_graceful_shutdown(shutdown).await?;

    tracing::info!(workers = workers.len(), "waiting for queued jobs");
    for handle in workers {
        if let Err(err) = handle.await {
            tracing::error!(error = %err, "worker ended abnormally");
        }
    }
    Ok(())
}

fn tenant_routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .merge(public_routes())
        .merge(post_read_routes())
        .merge(protected_routes())
        .merge(collaborator_routes())
        .merge(admin_routes())
        .layer(from_fn(check_token_origin))
        .layer(from_fn_with_state(state.clone(), read_session))
        .layer(from_fn_with_state(state.clone(), set_jwt_from_query))
        .layer(from_fn_with_state(state.clone(), require_tenant))
}

fn platform_routes(state: &AppState) -> Router<AppState> {
    use public::{oauth, signup};

    Router::new()
        .route("/_api/tenants", post(signup::create))
        .route("/_api/tenants/:subdomain/availability", get(signup::check_availability))
        .route("/_api/oauth/providers", get(oauth::list_providers))
        .route("/oauth/:provider", get(oauth::start))
        .route("/oauth/:provider/callback", get(oauth::callback))
        .layer(from_fn_with_state(state.clone(), optional_tenant))
}

fn public_routes() -> Router<AppState> {
    use public::{images, oauth, signin, sitemap};

    Router::new()
        // Email sign-in and the links it mails
        .route("/_api/signin", post(signin::sign_in_by_email))
        .route("/_api/signin/complete", post(signin::complete_profile))
        .route("/signin/verify", get(signin::verify_sign_in))
        .route("/invite/verify", get(signin::verify_invite))
        .route("/signup/verify", get(signin::verify_sign_up))
        .route("/signout", get(signin::sign_out))
        // OAuth code exchange on the tenant host
        .route("/oauth/:provider/token", get(oauth::token))
        .route("/sitemap.xml", get(sitemap::sitemap))
        .route("/images/*bkey", get(images::serve))
}

fn post_read_routes() -> Router<AppState> {
    use public::{posts, tags};

    Router::new()
        .route("/api/v1/posts", get(posts::list))
        .route("/api/v1/posts/:number", get(posts::show))
        .route("/api/v1/posts/:number/comments", get(posts::comments))
        .route("/api/v1/posts/:number/tags", get(tags::of_post))
        .route("/api/v1/tags", get(tags::list))
        .route_layer(from_fn(check_private_tenant))
}

fn protected_routes() -> Router<AppState> {
    use protected::{notifications, posts, user};

    Router::new()
        .route("/_api/user", get(user::current))
        .route("/_api/user/settings", post(user::update_settings))
        .route("/_api/user/change-email", post(user::change_email))
        .route("/change-email/verify", get(user::verify_change_email))
        .route("/_api/notifications", get(notifications::list))
        .route("/_api/notifications/unread/total", get(notifications::total_unread))
        .route("/_api/notifications/read-all", post(notifications::read_all))
        .route("/_api/notifications/:id/read", post(notifications::read))
        .route("/api/v1/posts", post(posts::create))
        .route("/api/v1/posts/:number/comments", post(posts::comment))
        .route("/api/v1/posts/:number/support", post(posts::support))
        .route("/api/v1/posts/:number/unsupport", post(posts::unsupport))
        .route_layer(from_fn(require_authenticated))
}

fn collaborator_routes() -> Router<AppState> {
    use protected::{posts, tags};

    Router::new()
        .route("/api/v1/posts/:number", put(posts::update))
        .route("/api/v1/posts/:number/status", put(posts::respond))
        .route("/api/v1/posts/:number/tags/:slug", post(tags::assign).delete(tags::unassign))
        .route_layer(from_fn(require_collaborator))
}

fn admin_routes() -> Router<AppState> {
    use elevated::{admin, tags};

    Router::new()
        .route("/_api/admin/settings/general", post(admin::update_settings))
        .route("/_api/admin/settings/privacy", post(admin::update_privacy))
        .route("/_api/admin/invitations/send", post(admin::send_invitations))
        .route("/_api/admin/users", get(admin::list_users))
        .route("/_api/admin/users/:user_id/role", post(admin::change_role))
        .route("/_api/admin/oauth", get(admin::list_oauth_configs).post(admin::save_oauth_config))
        .route("/_api/admin/oauth/:provider", get(admin::get_oauth_config))
        .route("/_api/admin/tags", post(tags::add))
        .route("/_api/admin/tags/:slug", put(tags::edit).delete(tags::delete))
        .route_layer(from_fn(require_administrator))
}
