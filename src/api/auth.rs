/// Login, registration and session endpoints
use crate::{
    account::{
        ChallengeStartedResponse, SessionResponse, StartLoginRequest, StartRegistrationRequest,
        VerifyCodeRequest,
    },
    auth::AuthContext,
    challenge::PendingStore,
    context::AppContext,
    db::account::Account,
    error::{DeskError, DeskResult},
};
use axum::{
    extract::State,
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};

/// Cookie carrying the pending-challenge holder id
pub const HOLDER_COOKIE: &str = "desk_challenge";

/// Routes that do not send mail; the challenge starts are mounted separately
/// under their own rate limit
pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/auth/login/verify", post(verify_login))
        .route("/auth/register/verify", post(verify_registration))
        .route("/auth/logout", post(logout))
        .route("/auth/session", get(get_session))
}

/// Reuse the caller's holder id or mint one and set the cookie
fn holder(ctx: &AppContext, jar: CookieJar) -> (CookieJar, String) {
    if let Some(existing) = jar.get(HOLDER_COOKIE) {
        let id = existing.value().to_string();
        return (jar, id);
    }

    let id = PendingStore::new_holder();
    let cookie = Cookie::build((HOLDER_COOKIE, id.clone()))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(ctx.config.service.secure_cookies);
    (jar.add(cookie), id)
}

fn existing_holder(jar: &CookieJar) -> DeskResult<String> {
    jar.get(HOLDER_COOKIE)
        .map(|c| c.value().to_string())
        .ok_or(DeskError::NoPendingChallenge)
}

/// POST /auth/login
pub async fn start_login(
    State(ctx): State<AppContext>,
    jar: CookieJar,
    Json(req): Json<StartLoginRequest>,
) -> DeskResult<(CookieJar, Json<ChallengeStartedResponse>)> {
    let (jar, holder) = holder(&ctx, jar);
    let started = ctx.login_flow.start(&holder, &req.identifier).await?;
    Ok((jar, Json(started)))
}

/// POST /auth/login/verify
pub async fn verify_login(
    State(ctx): State<AppContext>,
    jar: CookieJar,
    Json(req): Json<VerifyCodeRequest>,
) -> DeskResult<Json<SessionResponse>> {
    let holder = existing_holder(&jar)?;
    let session = ctx.login_flow.verify(&holder, &req.code).await?;
    Ok(Json(session))
}

/// POST /auth/register
pub async fn start_registration(
    State(ctx): State<AppContext>,
    jar: CookieJar,
    Json(req): Json<StartRegistrationRequest>,
) -> DeskResult<(CookieJar, Json<ChallengeStartedResponse>)> {
    let (jar, holder) = holder(&ctx, jar);
    let started = ctx
        .registration_flow
        .start(&holder, &req.identifier, &req.display_name)
        .await?;
    Ok((jar, Json(started)))
}

/// POST /auth/register/verify
pub async fn verify_registration(
    State(ctx): State<AppContext>,
    jar: CookieJar,
    Json(req): Json<VerifyCodeRequest>,
) -> DeskResult<(StatusCode, Json<SessionResponse>)> {
    let holder = existing_holder(&jar)?;
    let session = ctx.registration_flow.verify(&holder, &req.code).await?;
    Ok((StatusCode::CREATED, Json(session)))
}

/// POST /auth/logout
pub async fn logout(State(ctx): State<AppContext>, auth: AuthContext) -> DeskResult<StatusCode> {
    ctx.account_manager
        .delete_session(&auth.session.session_id)
        .await?;
    tracing::info!(account_id = auth.account_id(), "Logged out");
    Ok(StatusCode::NO_CONTENT)
}

/// GET /auth/session
pub async fn get_session(auth: AuthContext) -> Json<Account> {
    Json(auth.session.account)
}
