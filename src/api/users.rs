/// Self-service profile and CRM user administration
use crate::{
    access::operations,
    account::{AdminUserUpdate, ListUsersResponse, ProfileUpdate, ToggleActiveResponse},
    auth::AuthContext,
    context::AppContext,
    db::account::Account,
    error::DeskResult,
};
use axum::{
    extract::{Path, State},
    response::Json,
    routing::{get, post},
    Router,
};

pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/profile", get(get_profile).put(update_profile))
        .route("/crm/users", get(list_users))
        .route("/crm/users/:id", get(get_user).put(update_user))
        .route("/crm/users/:id/toggle", post(toggle_user))
}

/// GET /profile
pub async fn get_profile(
    State(ctx): State<AppContext>,
    auth: AuthContext,
) -> DeskResult<Json<Account>> {
    let account = ctx.account_manager.get_account(auth.account_id()).await?;
    Ok(Json(account))
}

/// PUT /profile
pub async fn update_profile(
    State(ctx): State<AppContext>,
    auth: AuthContext,
    Json(update): Json<ProfileUpdate>,
) -> DeskResult<Json<Account>> {
    let account = ctx
        .account_manager
        .update_profile(auth.account_id(), update)
        .await?;
    Ok(Json(account))
}

/// GET /crm/users
pub async fn list_users(
    State(ctx): State<AppContext>,
    auth: AuthContext,
) -> DeskResult<Json<ListUsersResponse>> {
    auth.require(&ctx, operations::CRM_PANEL).await?;

    let users = ctx.account_manager.list_accounts().await?;
    Ok(Json(ListUsersResponse { users }))
}

/// GET /crm/users/:id
pub async fn get_user(
    State(ctx): State<AppContext>,
    auth: AuthContext,
    Path(id): Path<i64>,
) -> DeskResult<Json<Account>> {
    auth.require(&ctx, operations::USER_READ).await?;

    let account = ctx.account_manager.get_account(id).await?;
    Ok(Json(account))
}

/// PUT /crm/users/:id
pub async fn update_user(
    State(ctx): State<AppContext>,
    auth: AuthContext,
    Path(id): Path<i64>,
    Json(update): Json<AdminUserUpdate>,
) -> DeskResult<Json<Account>> {
    let subject = auth.require(&ctx, operations::USER_UPDATE).await?;

    let account = ctx.account_manager.admin_update(id, update).await?;
    tracing::info!(by = subject.account_id, account_id = id, "User updated from CRM");
    Ok(Json(account))
}

/// POST /crm/users/:id/toggle
pub async fn toggle_user(
    State(ctx): State<AppContext>,
    auth: AuthContext,
    Path(id): Path<i64>,
) -> DeskResult<Json<ToggleActiveResponse>> {
    let subject = auth.require(&ctx, operations::USER_TOGGLE).await?;

    let is_active = ctx.account_manager.toggle_active(id).await?;
    tracing::info!(by = subject.account_id, account_id = id, is_active, "User activation toggled");
    Ok(Json(ToggleActiveResponse { id, is_active }))
}
