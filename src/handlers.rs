use crate::errors::AppError;
use crate::models::{
    Client, Consumption, CreateClientRequest, CreateConsumptionRequest, CreateHouseRequest,
    CreateUserRequest, CreatedUserResponse, DashboardQuery, DashboardResponse,
    ForgotPasswordRequest, House, LoginRequest, LoginResponse, MessageResponse,
    ProfileUpdateRequest, RegisterRequest, ResetPasswordRequest, SessionResponse,
    UpdateClientRequest, UpdateConsumptionRequest, UpdateHouseRequest, UpdateUserRequest,
    UserResponse,
};
use crate::session;
use crate::state::AppState;
use crate::stats::summarize;
use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use tracing::info;
use uuid::Uuid;

pub async fn health() -> Json<MessageResponse> {
    Json(MessageResponse::new("ok"))
}

pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<UserResponse>), AppError> {
    let mut store = state.store.lock().await;
    let user = store
        .register_user(&payload.name, &payload.email, &payload.password, payload.role)
        .await?;
    Ok((StatusCode::CREATED, Json(UserResponse::from(&user))))
}

pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, AppError> {
    let user = {
        let store = state.store.lock().await;
        store.verify_login(&payload.email, &payload.password)?
    };
    let token = state.sessions.issue(user.id).await;

    Ok(Json(LoginResponse {
        token,
        must_change_password: user.must_change_password,
        user: UserResponse::from(&user),
    }))
}

pub async fn logout(State(state): State<AppState>, headers: HeaderMap) -> StatusCode {
    if let Some(token) = session::bearer_token(&headers) {
        state.sessions.revoke(token).await;
    }
    StatusCode::OK
}

pub async fn session_info(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Json<SessionResponse> {
    let user = session::current_user(&state, &headers).await;
    Json(SessionResponse {
        must_change_password: user.as_ref().is_some_and(|user| user.must_change_password),
        user: user.as_ref().map(UserResponse::from),
    })
}

// Answers the same way whether the email exists or not. The token itself goes
// to the log as a stand-in for out-of-band delivery; it is never in the body.
pub async fn forgot_password(
    State(state): State<AppState>,
    Json(payload): Json<ForgotPasswordRequest>,
) -> Result<(StatusCode, Json<MessageResponse>), AppError> {
    let mut store = state.store.lock().await;
    match store.request_password_reset(&payload.email).await {
        Ok(entry) => {
            info!("password reset token issued for {}: {}", entry.email, entry.token);
        }
        Err(AppError::NotFound(_)) => {}
        Err(err) => return Err(err),
    }

    Ok((
        StatusCode::ACCEPTED,
        Json(MessageResponse::new(
            "if the account exists, a reset token has been issued",
        )),
    ))
}

pub async fn reset_password(
    State(state): State<AppState>,
    Json(payload): Json<ResetPasswordRequest>,
) -> Result<Json<MessageResponse>, AppError> {
    let mut store = state.store.lock().await;
    store
        .reset_password(&payload.email, &payload.token, &payload.new_password)
        .await?;
    Ok(Json(MessageResponse::new("password updated")))
}

// Reachable with a pending forced rotation; changing the password here is how
// the rotation gets satisfied.
pub async fn update_profile(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<ProfileUpdateRequest>,
) -> Result<Json<UserResponse>, AppError> {
    let user = session::authenticated_user(&state, &headers).await?;
    let mut store = state.store.lock().await;
    let updated = store.update_profile(user.id, payload).await?;
    Ok(Json(UserResponse::from(&updated)))
}

pub async fn list_users(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Vec<UserResponse>>, AppError> {
    let user = session::active_user(&state, &headers).await?;
    session::require_admin(&user)?;

    let store = state.store.lock().await;
    let users = store.list_users();
    Ok(Json(users.iter().map(UserResponse::from).collect()))
}

pub async fn create_user(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<CreateUserRequest>,
) -> Result<(StatusCode, Json<CreatedUserResponse>), AppError> {
    let admin = session::active_user(&state, &headers).await?;
    session::require_admin(&admin)?;

    let mut store = state.store.lock().await;
    let (user, temp_password) = store.admin_create_user(payload).await?;
    Ok((
        StatusCode::CREATED,
        Json(CreatedUserResponse {
            user: UserResponse::from(&user),
            temp_password,
        }),
    ))
}

pub async fn update_user(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
    Json(payload): Json<UpdateUserRequest>,
) -> Result<Json<UserResponse>, AppError> {
    let admin = session::active_user(&state, &headers).await?;
    session::require_admin(&admin)?;

    let mut store = state.store.lock().await;
    let updated = store.admin_update_user(id, payload).await?;
    Ok(Json(UserResponse::from(&updated)))
}

pub async fn delete_user(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
) -> Result<StatusCode, AppError> {
    let admin = session::active_user(&state, &headers).await?;
    session::require_admin(&admin)?;

    let mut store = state.store.lock().await;
    store.remove_user(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn list_clients(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Vec<Client>>, AppError> {
    let user = session::active_user(&state, &headers).await?;
    let store = state.store.lock().await;
    Ok(Json(store.clients_for_user(&user)))
}

pub async fn create_client(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<CreateClientRequest>,
) -> Result<(StatusCode, Json<Client>), AppError> {
    let user = session::active_user(&state, &headers).await?;
    let mut store = state.store.lock().await;
    let client = store.create_client(&user, payload).await?;
    Ok((StatusCode::CREATED, Json(client)))
}

pub async fn update_client(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
    Json(payload): Json<UpdateClientRequest>,
) -> Result<Json<Client>, AppError> {
    let user = session::active_user(&state, &headers).await?;
    let mut store = state.store.lock().await;
    let client = store.update_client(&user, id, payload).await?;
    Ok(Json(client))
}

pub async fn delete_client(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
) -> Result<StatusCode, AppError> {
    let user = session::active_user(&state, &headers).await?;
    let mut store = state.store.lock().await;
    store.remove_client(&user, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn list_houses(
    State(state): State<AppState>,
    Path(client_id): Path<Uuid>,
    headers: HeaderMap,
) -> Result<Json<Vec<House>>, AppError> {
    let user = session::active_user(&state, &headers).await?;
    let store = state.store.lock().await;
    Ok(Json(store.houses_for_client(&user, client_id)?))
}

pub async fn create_house(
    State(state): State<AppState>,
    Path(client_id): Path<Uuid>,
    headers: HeaderMap,
    Json(payload): Json<CreateHouseRequest>,
) -> Result<(StatusCode, Json<House>), AppError> {
    let user = session::active_user(&state, &headers).await?;
    let mut store = state.store.lock().await;
    let house = store.create_house(&user, client_id, payload).await?;
    Ok((StatusCode::CREATED, Json(house)))
}

pub async fn update_house(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
    Json(payload): Json<UpdateHouseRequest>,
) -> Result<Json<House>, AppError> {
    let user = session::active_user(&state, &headers).await?;
    let mut store = state.store.lock().await;
    let house = store.update_house(&user, id, payload).await?;
    Ok(Json(house))
}

pub async fn delete_house(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
) -> Result<StatusCode, AppError> {
    let user = session::active_user(&state, &headers).await?;
    let mut store = state.store.lock().await;
    store.remove_house(&user, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn list_consumptions(
    State(state): State<AppState>,
    Path(house_id): Path<Uuid>,
    headers: HeaderMap,
) -> Result<Json<Vec<Consumption>>, AppError> {
    let user = session::active_user(&state, &headers).await?;
    let store = state.store.lock().await;
    Ok(Json(store.consumptions_for_house(&user, house_id)?))
}

pub async fn create_consumption(
    State(state): State<AppState>,
    Path(house_id): Path<Uuid>,
    headers: HeaderMap,
    Json(payload): Json<CreateConsumptionRequest>,
) -> Result<(StatusCode, Json<Consumption>), AppError> {
    let user = session::active_user(&state, &headers).await?;
    let mut store = state.store.lock().await;
    let reading = store.create_consumption(&user, house_id, payload).await?;
    Ok((StatusCode::CREATED, Json(reading)))
}

pub async fn update_consumption(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
    Json(payload): Json<UpdateConsumptionRequest>,
) -> Result<Json<Consumption>, AppError> {
    let user = session::active_user(&state, &headers).await?;
    let mut store = state.store.lock().await;
    let reading = store.update_consumption(&user, id, payload).await?;
    Ok(Json(reading))
}

pub async fn delete_consumption(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
) -> Result<StatusCode, AppError> {
    let user = session::active_user(&state, &headers).await?;
    let mut store = state.store.lock().await;
    store.remove_consumption(&user, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn dashboard(
    State(state): State<AppState>,
    Query(query): Query<DashboardQuery>,
    headers: HeaderMap,
) -> Result<Json<DashboardResponse>, AppError> {
    let user = session::active_user(&state, &headers).await?;
    let store = state.store.lock().await;
    let scope = store.scoped_consumptions(&user, query.client_id, query.house_id)?;
    Ok(Json(DashboardResponse::new(
        summarize(&scope.readings),
        scope.house_count,
    )))
}
