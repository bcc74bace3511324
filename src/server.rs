use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use axum::{
    extract::{FromRequestParts, Path, Query, State},
    http::{request, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, patch, post},
    Json, RequestPartsExt as _, Router,
};
use axum_extra::{
    headers::{authorization::Bearer, Authorization},
    TypedHeader,
};
use derive_more::From;
use itertools::Itertools as _;
use jsonwebtoken::{
    decode, encode, DecodingKey, EncodingKey, Header, Validation,
};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::{api, config, db, schedule};

pub type SharedAppState = Arc<AppState>;

pub struct AppState {
    db_client: db::Client,
    overlap_policy: config::OverlapPolicy,
    jwt_expiration_time: Duration,
    jwt_decoding_key: DecodingKey,
    jwt_encoding_key: EncodingKey,
}

impl AppState {
    pub fn new(
        db_client: db::Client,
        jwt: &config::Jwt,
        overlap_policy: config::OverlapPolicy,
    ) -> Self {
        Self {
            db_client,
            overlap_policy,
            jwt_expiration_time: jwt.expiration_time,
            jwt_decoding_key: DecodingKey::from_secret(jwt.secret.as_bytes()),
            jwt_encoding_key: EncodingKey::from_secret(jwt.secret.as_bytes()),
        }
    }
}

pub fn router(state: SharedAppState) -> Router {
    Router::new()
        .route("/auth/login", post(login))
        .route("/auth/me", get(me))
        .route("/users", get(list_users).post(add_user))
        .route("/users/:id", patch(edit_user))
        .route("/shifts", get(list_shifts).post(add_shift))
        .route("/shifts/migrate", post(migrate_shifts))
        .route("/shifts/:id", patch(edit_shift).delete(remove_shift))
        .route("/schedule/week", get(week_schedule))
        .with_state(state)
}

fn db_status(e: &db::Error) -> StatusCode {
    use db::Error as E;

    match e {
        E::InvalidCredentials => StatusCode::UNAUTHORIZED,
        E::DuplicateUsername | E::Overlap | E::Validation(_) => {
            StatusCode::BAD_REQUEST
        }
        E::ShiftNotFound | E::UserNotFound => StatusCode::NOT_FOUND,
        E::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

#[derive(Debug, From)]
pub enum CallerError {
    #[from]
    Db(db::Error),
    UserNotFound,
    Forbidden,
}

impl IntoResponse for CallerError {
    fn into_response(self) -> Response {
        match self {
            Self::Db(e) => db_status(&e),
            Self::UserNotFound => StatusCode::UNAUTHORIZED,
            Self::Forbidden => StatusCode::FORBIDDEN,
        }
        .into_response()
    }
}

/// Resolves the authenticated caller's identity. Every scoped read or
/// write threads this value explicitly; there is no ambient current user.
async fn require_caller(
    state: &AppState,
    claims: AuthClaims,
) -> Result<db::User, CallerError> {
    state
        .db_client
        .get_user_by_id(claims.user_id)
        .await?
        .ok_or(CallerError::UserNotFound)
}

async fn require_manager(
    state: &AppState,
    claims: AuthClaims,
) -> Result<db::User, CallerError> {
    let my = require_caller(state, claims).await?;
    if my.role != db::user::Role::Manager {
        return Err(CallerError::Forbidden);
    }
    Ok(my)
}

#[derive(Deserialize)]
struct LoginInput {
    username: Option<String>,
    password: Option<String>,
}

#[derive(Serialize)]
struct LoginOutput {
    token: String,
    user: api::User,
}

async fn login(
    State(state): State<SharedAppState>,
    Json(input): Json<LoginInput>,
) -> Result<Json<LoginOutput>, LoginError> {
    use LoginError as E;

    let (Some(username), Some(password)) = (input.username, input.password)
    else {
        return Err(E::MissingFields);
    };

    let user = state.db_client.authenticate(&username, &password).await?;

    let expires_at = OffsetDateTime::now_utc() + state.jwt_expiration_time;
    let token = encode(
        &Header::default(),
        &AuthClaims {
            user_id: user.id,
            exp: expires_at.unix_timestamp(),
        },
        &state.jwt_encoding_key,
    )
    .map_err(|_| E::InvalidToken)?;

    Ok(Json(LoginOutput {
        token,
        user: api::User::from(user),
    }))
}

#[derive(Debug, From)]
pub enum LoginError {
    #[from]
    Db(db::Error),
    InvalidToken,
    MissingFields,
}

impl IntoResponse for LoginError {
    fn into_response(self) -> Response {
        match self {
            Self::Db(e) => db_status(&e),
            Self::InvalidToken => StatusCode::UNAUTHORIZED,
            Self::MissingFields => StatusCode::BAD_REQUEST,
        }
        .into_response()
    }
}

#[derive(Serialize)]
struct MeOutput {
    user: api::User,
}

async fn me(
    State(state): State<SharedAppState>,
    auth_claims: AuthClaims,
) -> Result<Json<MeOutput>, GetMeError> {
    use GetMeError as E;

    let my = state
        .db_client
        .get_user_by_id(auth_claims.user_id)
        .await?
        .ok_or(E::UserNotFound)?;

    Ok(Json(MeOutput {
        user: api::User::from(my),
    }))
}

#[derive(Debug, From)]
pub enum GetMeError {
    #[from]
    Db(db::Error),
    UserNotFound,
}

impl IntoResponse for GetMeError {
    fn into_response(self) -> Response {
        match self {
            Self::Db(e) => db_status(&e),
            Self::UserNotFound => StatusCode::NOT_FOUND,
        }
        .into_response()
    }
}

#[derive(Deserialize)]
struct ListUsersInput {
    role: Option<api::user::Role>,
}

async fn list_users(
    State(state): State<SharedAppState>,
    _: AuthClaims,
    Query(ListUsersInput { role }): Query<ListUsersInput>,
) -> Result<Json<Vec<api::User>>, ListUsersError> {
    let users = state.db_client.get_users(role).await?;

    Ok(Json(users.into_iter().map(api::User::from).collect()))
}

#[derive(Debug, From)]
pub enum ListUsersError {
    #[from]
    Db(db::Error),
}

impl IntoResponse for ListUsersError {
    fn into_response(self) -> Response {
        match self {
            Self::Db(e) => db_status(&e),
        }
        .into_response()
    }
}

#[derive(Serialize)]
struct IdOutput<T> {
    id: T,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AddUserInput {
    name: Option<String>,
    username: Option<String>,
    password: Option<String>,
    role: Option<api::user::Role>,
    avatar_url: Option<String>,
}

async fn add_user(
    State(state): State<SharedAppState>,
    auth_claims: AuthClaims,
    Json(input): Json<AddUserInput>,
) -> Result<(StatusCode, Json<IdOutput<api::user::Id>>), AddUserError> {
    use AddUserError as E;

    require_manager(&state, auth_claims).await?;

    let (Some(name), Some(username), Some(password), Some(role)) =
        (input.name, input.username, input.password, input.role)
    else {
        return Err(E::MissingFields);
    };

    let id = state
        .db_client
        .create_user(db::user::NewUser {
            name,
            username,
            password,
            role,
            avatar_url: input.avatar_url,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(IdOutput { id })))
}

#[derive(Debug, From)]
pub enum AddUserError {
    #[from]
    Db(db::Error),
    #[from]
    Caller(CallerError),
    MissingFields,
}

impl IntoResponse for AddUserError {
    fn into_response(self) -> Response {
        match self {
            Self::Db(e) => db_status(&e).into_response(),
            Self::Caller(e) => e.into_response(),
            Self::MissingFields => StatusCode::BAD_REQUEST.into_response(),
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct EditUserInput {
    name: Option<String>,
    username: Option<String>,
    password: Option<String>,
    role: Option<api::user::Role>,
    avatar_url: Option<String>,
}

async fn edit_user(
    State(state): State<SharedAppState>,
    auth_claims: AuthClaims,
    Path(id): Path<api::user::Id>,
    Json(input): Json<EditUserInput>,
) -> Result<Json<IdOutput<api::user::Id>>, EditUserError> {
    require_manager(&state, auth_claims).await?;

    let id = state
        .db_client
        .update_user(
            id,
            db::user::UserPatch {
                name: input.name,
                username: input.username,
                password: input.password,
                role: input.role,
                avatar_url: input.avatar_url,
            },
        )
        .await?;

    Ok(Json(IdOutput { id }))
}

#[derive(Debug, From)]
pub enum EditUserError {
    #[from]
    Db(db::Error),
    #[from]
    Caller(CallerError),
}

impl IntoResponse for EditUserError {
    fn into_response(self) -> Response {
        match self {
            Self::Db(e) => db_status(&e).into_response(),
            Self::Caller(e) => e.into_response(),
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListShiftsInput {
    start_date: Option<String>,
    end_date: Option<String>,
    user_id: Option<api::user::Id>,
}

async fn list_shifts(
    State(state): State<SharedAppState>,
    auth_claims: AuthClaims,
    Query(input): Query<ListShiftsInput>,
) -> Result<Json<Vec<api::Shift>>, ListShiftsError> {
    let my = require_caller(&state, auth_claims).await?;

    // Employees are scoped to their own schedule; the user filter only
    // means something to managers.
    let shifts = if my.role == db::user::Role::Employee {
        state.db_client.get_shifts_by_employee(my.id).await?
    } else if let Some(user_id) = input.user_id {
        state.db_client.get_shifts_by_employee(user_id).await?
    } else {
        state.db_client.get_shifts().await?
    };

    // Date bounds compare day keys lexically, which only holds for the
    // canonical form; records pending migration never match a date filter.
    let date_filtered =
        input.start_date.is_some() || input.end_date.is_some();
    let shifts = shifts
        .into_iter()
        .filter(|s| {
            (!date_filtered || schedule::parse_day_key(&s.day).is_ok())
                && input
                    .start_date
                    .as_deref()
                    .map_or(true, |d| s.day.as_str() >= d)
                && input
                    .end_date
                    .as_deref()
                    .map_or(true, |d| s.day.as_str() <= d)
        })
        .collect::<Vec<_>>();

    let employee_ids = shifts
        .iter()
        .map(|s| s.employee_id)
        .unique()
        .collect::<Vec<_>>();
    let users = state.db_client.get_users_by_ids(&employee_ids).await?;

    let mut shifts = shifts
        .into_iter()
        .map(|shift| {
            let employee_name =
                users.get(&shift.employee_id).map(|u| u.name.clone());
            api::Shift::from(db::shift::ShiftWithEmployee {
                shift,
                employee_name,
            })
        })
        .collect::<Vec<_>>();
    shifts.sort_by(|a, b| a.day.cmp(&b.day));

    Ok(Json(shifts))
}

#[derive(Debug, From)]
pub enum ListShiftsError {
    #[from]
    Db(db::Error),
    #[from]
    Caller(CallerError),
}

impl IntoResponse for ListShiftsError {
    fn into_response(self) -> Response {
        match self {
            Self::Db(e) => db_status(&e).into_response(),
            Self::Caller(e) => e.into_response(),
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AddShiftInput {
    employee_id: Option<api::user::Id>,
    day: Option<String>,
    start_time: Option<String>,
    end_time: Option<String>,
    task: Option<String>,
}

async fn add_shift(
    State(state): State<SharedAppState>,
    auth_claims: AuthClaims,
    Json(input): Json<AddShiftInput>,
) -> Result<(StatusCode, Json<IdOutput<api::shift::Id>>), AddShiftError> {
    use AddShiftError as E;

    require_manager(&state, auth_claims).await?;

    let (
        Some(employee_id),
        Some(day),
        Some(start_time),
        Some(end_time),
        Some(task),
    ) = (
        input.employee_id,
        input.day,
        input.start_time,
        input.end_time,
        input.task,
    )
    else {
        return Err(E::MissingFields);
    };

    let id = state
        .db_client
        .create_shift(
            db::shift::NewShift {
                employee_id,
                day,
                start_time,
                end_time,
                task,
            },
            state.overlap_policy,
        )
        .await?;

    Ok((StatusCode::CREATED, Json(IdOutput { id })))
}

#[derive(Debug, From)]
pub enum AddShiftError {
    #[from]
    Db(db::Error),
    #[from]
    Caller(CallerError),
    MissingFields,
}

impl IntoResponse for AddShiftError {
    fn into_response(self) -> Response {
        match self {
            Self::Db(e) => db_status(&e).into_response(),
            Self::Caller(e) => e.into_response(),
            Self::MissingFields => StatusCode::BAD_REQUEST.into_response(),
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct EditShiftInput {
    employee_id: Option<api::user::Id>,
    day: Option<String>,
    start_time: Option<String>,
    end_time: Option<String>,
    task: Option<String>,
}

async fn edit_shift(
    State(state): State<SharedAppState>,
    auth_claims: AuthClaims,
    Path(id): Path<api::shift::Id>,
    Json(input): Json<EditShiftInput>,
) -> Result<Json<IdOutput<api::shift::Id>>, EditShiftError> {
    require_manager(&state, auth_claims).await?;

    let id = state
        .db_client
        .update_shift(
            id,
            db::shift::ShiftPatch {
                employee_id: input.employee_id,
                day: input.day,
                start_time: input.start_time,
                end_time: input.end_time,
                task: input.task,
            },
            state.overlap_policy,
        )
        .await?;

    Ok(Json(IdOutput { id }))
}

#[derive(Debug, From)]
pub enum EditShiftError {
    #[from]
    Db(db::Error),
    #[from]
    Caller(CallerError),
}

impl IntoResponse for EditShiftError {
    fn into_response(self) -> Response {
        match self {
            Self::Db(e) => db_status(&e).into_response(),
            Self::Caller(e) => e.into_response(),
        }
    }
}

async fn remove_shift(
    State(state): State<SharedAppState>,
    auth_claims: AuthClaims,
    Path(id): Path<api::shift::Id>,
) -> Result<StatusCode, RemoveShiftError> {
    require_manager(&state, auth_claims).await?;

    state.db_client.delete_shift(id).await?;

    Ok(StatusCode::OK)
}

#[derive(Debug, From)]
pub enum RemoveShiftError {
    #[from]
    Db(db::Error),
    #[from]
    Caller(CallerError),
}

impl IntoResponse for RemoveShiftError {
    fn into_response(self) -> Response {
        match self {
            Self::Db(e) => db_status(&e).into_response(),
            Self::Caller(e) => e.into_response(),
        }
    }
}

#[derive(Serialize)]
struct MigrateOutput {
    deleted: usize,
}

async fn migrate_shifts(
    State(state): State<SharedAppState>,
    auth_claims: AuthClaims,
) -> Result<Json<MigrateOutput>, MigrateShiftsError> {
    require_manager(&state, auth_claims).await?;

    let deleted = state.db_client.migrate_day_formats().await?;

    Ok(Json(MigrateOutput { deleted }))
}

#[derive(Debug, From)]
pub enum MigrateShiftsError {
    #[from]
    Db(db::Error),
    #[from]
    Caller(CallerError),
}

impl IntoResponse for MigrateShiftsError {
    fn into_response(self) -> Response {
        match self {
            Self::Db(e) => db_status(&e).into_response(),
            Self::Caller(e) => e.into_response(),
        }
    }
}

#[derive(Deserialize)]
struct WeekScheduleInput {
    #[serde(default)]
    offset: i64,
}

async fn week_schedule(
    State(state): State<SharedAppState>,
    _: AuthClaims,
    Query(WeekScheduleInput { offset }): Query<WeekScheduleInput>,
) -> Result<Json<schedule::WeekView>, WeekScheduleError> {
    let today = OffsetDateTime::now_utc().date();
    let view = schedule::week_view(&state.db_client, today, offset).await?;

    Ok(Json(view))
}

#[derive(Debug, From)]
pub enum WeekScheduleError {
    #[from]
    Db(db::Error),
}

impl IntoResponse for WeekScheduleError {
    fn into_response(self) -> Response {
        match self {
            Self::Db(e) => db_status(&e),
        }
        .into_response()
    }
}

#[derive(Clone, Copy, Debug, Deserialize, Serialize)]
pub struct AuthClaims {
    user_id: api::user::Id,
    exp: i64,
}

#[async_trait]
impl FromRequestParts<SharedAppState> for AuthClaims {
    type Rejection = LoginError;

    async fn from_request_parts(
        parts: &mut request::Parts,
        state: &SharedAppState,
    ) -> Result<Self, Self::Rejection> {
        let TypedHeader(Authorization(bearer)) = parts
            .extract::<TypedHeader<Authorization<Bearer>>>()
            .await
            .map_err(|_| LoginError::InvalidToken)?;
        let token_data = decode::<Self>(
            bearer.token(),
            &state.jwt_decoding_key,
            &Validation::default(),
        )
        .map_err(|_| LoginError::InvalidToken)?;

        Ok(token_data.claims)
    }
}
