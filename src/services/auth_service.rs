use argon2::{
    Argon2, PasswordHasher,
    password_hash::{PasswordHash, PasswordVerifier, SaltString},
};
use password_hash::rand_core::OsRng;
use sea_orm::ActiveValue::NotSet;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DbErr, EntityTrait, ModelTrait,
    PaginatorTrait, QueryFilter, Set,
};
use uuid::Uuid;

use crate::{
    audit,
    dto::auth::{AdminLoginRequest, LoginRequest, LoginResponse, RegisterRequest},
    entity::{
        auth_tokens::{
            ActiveModel as TokenActive, Column as TokenCol, Entity as AuthTokens,
            Model as TokenModel,
        },
        users::{self, ActiveModel as UserActive, Column as UserCol, Entity as Users, Role},
    },
    error::{AppError, AppResult, unique_violation},
    middleware::auth::AuthUser,
    models::User,
    response::{ApiResponse, Meta},
    state::AppState,
};

pub const MIN_PASSWORD_LEN: usize = 6;

pub fn hash_password(password: &str) -> AppResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();
    let hash = argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| AppError::Internal(anyhow::anyhow!(e.to_string())))?
        .to_string();
    Ok(hash)
}

pub fn verify_password(password: &str, password_hash: &str) -> AppResult<bool> {
    let parsed_hash = PasswordHash::new(password_hash)
        .map_err(|_| AppError::Internal(anyhow::anyhow!("Invalid password hash")))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}

pub async fn register_user(
    state: &AppState,
    payload: RegisterRequest,
) -> AppResult<ApiResponse<User>> {
    let username = payload.username.trim().to_string();
    let email = payload.email.trim().to_string();
    let password = payload.password;

    if username.is_empty() || email.is_empty() || password.is_empty() {
        return Err(AppError::validation("All fields are required"));
    }
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AppError::validation(format!(
            "Password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }

    let username_taken = Users::find()
        .filter(UserCol::Username.eq(username.as_str()))
        .count(&state.orm)
        .await?
        > 0;
    if username_taken {
        return Err(username_conflict());
    }

    let email_taken = Users::find()
        .filter(UserCol::Email.eq(email.as_str()))
        .count(&state.orm)
        .await?
        > 0;
    if email_taken {
        return Err(email_conflict());
    }

    let role = Role::User;
    let user = UserActive {
        id: NotSet,
        username: Set(username),
        email: Set(email),
        first_name: Set(String::new()),
        last_name: Set(String::new()),
        password_hash: Set(hash_password(&password)?),
        role: Set(role),
        is_staff: Set(users::elevated_access(role)),
        created_at: NotSet,
    }
    .insert(&state.orm)
    .await
    .map_err(registration_conflict)?;

    tracing::info!(user_id = user.id, username = %user.username, "user registered");

    audit::record(
        &state.orm,
        Some(user.id),
        "user_register",
        "users",
        serde_json::json!({ "user_id": user.id }),
    )
    .await;

    Ok(ApiResponse::success("User created", User::from(user), None))
}

fn username_conflict() -> AppError {
    AppError::Conflict {
        code: "username_taken",
        message: "Username exists".into(),
    }
}

fn email_conflict() -> AppError {
    AppError::Conflict {
        code: "email_taken",
        message: "Email exists".into(),
    }
}

/// A registration that slips past the pre-checks still hits the unique
/// indexes; report it the same way.
fn registration_conflict(err: DbErr) -> AppError {
    match unique_violation(&err) {
        Some(detail) if detail.contains("email") => email_conflict(),
        Some(_) => username_conflict(),
        None => err.into(),
    }
}

/// Change a user's role, keeping the elevated-access flag in step.
pub async fn assign_role<C: ConnectionTrait>(
    conn: &C,
    user_id: i32,
    role: Role,
) -> AppResult<users::Model> {
    let user = Users::find_by_id(user_id)
        .one(conn)
        .await?
        .ok_or(AppError::NotFound)?;
    let mut active: UserActive = user.into();
    active.role = Set(role);
    active.is_staff = Set(users::elevated_access(role));
    Ok(active.update(conn).await?)
}

/// Username match wins over email match.
async fn find_by_identifier<C: ConnectionTrait>(
    conn: &C,
    identifier: &str,
) -> AppResult<Option<users::Model>> {
    if let Some(user) = Users::find()
        .filter(UserCol::Username.eq(identifier))
        .one(conn)
        .await?
    {
        return Ok(Some(user));
    }
    Ok(Users::find()
        .filter(UserCol::Email.eq(identifier))
        .one(conn)
        .await?)
}

/// Return the user's token, creating it on first login.
pub async fn issue_token<C: ConnectionTrait>(conn: &C, user_id: i32) -> AppResult<String> {
    match find_token(conn, user_id).await? {
        Some(existing) => Ok(existing.key),
        None => create_token(conn, user_id).await,
    }
}

async fn find_token<C: ConnectionTrait>(conn: &C, user_id: i32) -> AppResult<Option<TokenModel>> {
    Ok(AuthTokens::find()
        .filter(TokenCol::UserId.eq(user_id))
        .one(conn)
        .await?)
}

/// Insert a fresh key. If a concurrent login inserted first, its token is the
/// user's token and is returned instead.
async fn create_token<C: ConnectionTrait>(conn: &C, user_id: i32) -> AppResult<String> {
    let inserted = TokenActive {
        key: Set(generate_token_key()),
        user_id: Set(user_id),
        created_at: Set(chrono::Utc::now().into()),
    }
    .insert(conn)
    .await;

    match inserted {
        Ok(token) => Ok(token.key),
        Err(err) if unique_violation(&err).is_some() => {
            tracing::debug!(user_id, "token created concurrently, reusing it");
            match find_token(conn, user_id).await? {
                Some(existing) => Ok(existing.key),
                None => Err(err.into()),
            }
        }
        Err(err) => Err(err.into()),
    }
}

fn generate_token_key() -> String {
    format!("{}{}", Uuid::new_v4().simple(), Uuid::new_v4().simple())
}

pub async fn login_user(
    state: &AppState,
    payload: LoginRequest,
) -> AppResult<ApiResponse<LoginResponse>> {
    let LoginRequest {
        identifier,
        password,
    } = payload;
    let identifier = identifier.trim();
    if identifier.is_empty() || password.is_empty() {
        return Err(AppError::validation(
            "Username/Email and Password are required",
        ));
    }

    let user = find_by_identifier(&state.orm, identifier)
        .await?
        .ok_or_else(invalid_credentials)?;
    if !verify_password(&password, &user.password_hash)? {
        tracing::warn!(user_id = user.id, "login rejected");
        return Err(invalid_credentials());
    }

    let token = issue_token(&state.orm, user.id).await?;

    audit::record(
        &state.orm,
        Some(user.id),
        "user_login",
        "users",
        serde_json::json!({ "user_id": user.id }),
    )
    .await;

    Ok(ApiResponse::success(
        "Login successful",
        LoginResponse {
            token,
            user: User::from(user),
        },
        Some(Meta::empty()),
    ))
}

/// Login for the admin console; only elevated users receive a token.
pub async fn admin_login(
    state: &AppState,
    payload: AdminLoginRequest,
) -> AppResult<ApiResponse<LoginResponse>> {
    let denied = || AppError::InvalidCredentials("Invalid credentials or not an admin".into());

    let user = Users::find()
        .filter(UserCol::Username.eq(payload.username.trim()))
        .one(&state.orm)
        .await?
        .ok_or_else(denied)?;
    if !verify_password(&payload.password, &user.password_hash)? || !user.is_staff {
        tracing::warn!(user_id = user.id, "admin login rejected");
        return Err(denied());
    }

    let token = issue_token(&state.orm, user.id).await?;

    audit::record(
        &state.orm,
        Some(user.id),
        "admin_login",
        "users",
        serde_json::json!({ "user_id": user.id }),
    )
    .await;

    Ok(ApiResponse::success(
        "Admin login successful",
        LoginResponse {
            token,
            user: User::from(user),
        },
        Some(Meta::empty()),
    ))
}

/// Invalidate the caller's token. Anonymous callers get the same answer.
pub async fn logout_user(
    state: &AppState,
    user: Option<&AuthUser>,
) -> AppResult<ApiResponse<serde_json::Value>> {
    if let Some(user) = user {
        if let Some(token) = find_token(&state.orm, user.user_id).await? {
            token.delete(&state.orm).await?;
        }
        tracing::info!(user_id = user.user_id, "user logged out");
    }

    Ok(ApiResponse::success(
        "Logout successful",
        serde_json::json!({}),
        Some(Meta::empty()),
    ))
}

fn invalid_credentials() -> AppError {
    AppError::InvalidCredentials("Invalid credentials".into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hashes_verify_only_the_original_password() {
        let hash = hash_password("s3cret!").unwrap();
        assert_ne!(hash, "s3cret!");
        assert!(verify_password("s3cret!", &hash).unwrap());
        assert!(!verify_password("s3cret?", &hash).unwrap());
    }

    async fn memory_db() -> sea_orm::DatabaseConnection {
        let conn = crate::db::create_orm_conn("sqlite::memory:").await.unwrap();
        crate::db::create_schema(&conn).await.unwrap();
        conn
    }

    fn user_row(username: &str, email: &str) -> UserActive {
        UserActive {
            id: NotSet,
            username: Set(username.into()),
            email: Set(email.into()),
            first_name: Set(String::new()),
            last_name: Set(String::new()),
            password_hash: Set("x".into()),
            role: Set(Role::User),
            is_staff: Set(false),
            created_at: NotSet,
        }
    }

    #[tokio::test]
    async fn unique_index_races_map_to_conflicts() {
        let conn = memory_db().await;
        user_row("grace", "grace@example.com").insert(&conn).await.unwrap();

        let err = user_row("hopper", "grace@example.com")
            .insert(&conn)
            .await
            .unwrap_err();
        assert!(matches!(
            registration_conflict(err),
            AppError::Conflict { code: "email_taken", .. }
        ));

        let err = user_row("grace", "other@example.com")
            .insert(&conn)
            .await
            .unwrap_err();
        assert!(matches!(
            registration_conflict(err),
            AppError::Conflict { code: "username_taken", .. }
        ));
    }

    #[tokio::test]
    async fn losing_the_token_race_reuses_the_winner() {
        let conn = memory_db().await;
        let user = user_row("grace", "grace@example.com").insert(&conn).await.unwrap();

        let first = issue_token(&conn, user.id).await.unwrap();
        let second = create_token(&conn, user.id).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(AuthTokens::find().count(&conn).await.unwrap(), 1);
    }

    #[test]
    fn token_keys_are_long_and_distinct() {
        let a = generate_token_key();
        let b = generate_token_key();
        assert_eq!(a.len(), 64);
        assert_ne!(a, b);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
