mod common;

use sea_orm::{EntityTrait, PaginatorTrait};
use storefront_api::{
    dto::auth::{AdminLoginRequest, LoginRequest, RegisterRequest},
    entity::{AuthTokens, Users, users::Role},
    error::AppError,
    middleware::auth::resolve_token,
    services::auth_service,
};

use common::{PASSWORD, create_user, setup_state};

fn register(username: &str, email: &str, password: &str) -> RegisterRequest {
    RegisterRequest {
        username: username.into(),
        email: email.into(),
        password: password.into(),
    }
}

fn login(identifier: &str, password: &str) -> LoginRequest {
    LoginRequest {
        identifier: identifier.into(),
        password: password.into(),
    }
}

#[tokio::test]
async fn registration_rejects_duplicates_and_weak_input() -> anyhow::Result<()> {
    let state = setup_state().await?;

    let created = auth_service::register_user(&state, register("grace", "grace@example.com", PASSWORD))
        .await?
        .data
        .expect("user");
    assert_eq!(created.username, "grace");
    assert_eq!(created.role, Role::User);

    let err = auth_service::register_user(&state, register("grace", "other@example.com", PASSWORD))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Conflict { code: "username_taken", .. }));
    assert_eq!(err.to_string(), "Username exists");

    let err = auth_service::register_user(&state, register("hopper", "grace@example.com", PASSWORD))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Conflict { code: "email_taken", .. }));
    assert_eq!(Users::find().count(&state.orm).await?, 1);

    let err = auth_service::register_user(&state, register("", "x@example.com", PASSWORD))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));

    let err = auth_service::register_user(&state, register("short", "short@example.com", "abc"))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));
    assert_eq!(Users::find().count(&state.orm).await?, 1);
    Ok(())
}

#[tokio::test]
async fn login_reuses_the_same_token_until_logout() -> anyhow::Result<()> {
    let state = setup_state().await?;
    create_user(&state, "grace", "grace@example.com", Role::User).await?;

    let first = auth_service::login_user(&state, login("grace", PASSWORD))
        .await?
        .data
        .expect("login");
    let second = auth_service::login_user(&state, login("grace@example.com", PASSWORD))
        .await?
        .data
        .expect("login");
    assert_eq!(first.token, second.token);
    assert_eq!(AuthTokens::find().count(&state.orm).await?, 1);

    let resolved = resolve_token(&state.orm, &first.token)
        .await?
        .expect("token resolves");
    assert_eq!(resolved.username, "grace");
    assert!(!resolved.is_staff);

    auth_service::logout_user(&state, Some(&resolved)).await?;
    assert!(resolve_token(&state.orm, &first.token).await?.is_none());
    assert_eq!(AuthTokens::find().count(&state.orm).await?, 0);

    let third = auth_service::login_user(&state, login("grace", PASSWORD))
        .await?
        .data
        .expect("login");
    assert_ne!(third.token, first.token);
    Ok(())
}

#[tokio::test]
async fn bad_credentials_are_rejected() -> anyhow::Result<()> {
    let state = setup_state().await?;
    create_user(&state, "grace", "grace@example.com", Role::User).await?;

    let err = auth_service::login_user(&state, login("grace", "wrong-password"))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InvalidCredentials(_)));
    assert_eq!(err.status(), axum::http::StatusCode::UNAUTHORIZED);

    let err = auth_service::login_user(&state, login("nobody", PASSWORD))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InvalidCredentials(_)));

    let err = auth_service::login_user(&state, login("", ""))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));

    assert_eq!(AuthTokens::find().count(&state.orm).await?, 0);
    Ok(())
}

#[tokio::test]
async fn admin_login_requires_elevated_role() -> anyhow::Result<()> {
    let state = setup_state().await?;
    create_user(&state, "grace", "grace@example.com", Role::User).await?;
    let boss = create_user(&state, "boss", "boss@example.com", Role::Admin).await?;
    assert!(boss.is_staff);

    let err = auth_service::admin_login(
        &state,
        AdminLoginRequest {
            username: "grace".into(),
            password: PASSWORD.into(),
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::InvalidCredentials(_)));

    let session = auth_service::admin_login(
        &state,
        AdminLoginRequest {
            username: "boss".into(),
            password: PASSWORD.into(),
        },
    )
    .await?
    .data
    .expect("admin login");
    assert_eq!(session.user.role, Role::Admin);

    // Demotion clears the elevated flag at the same time.
    let demoted = auth_service::assign_role(&state.orm, boss.id, Role::User).await?;
    assert!(!demoted.is_staff);
    let resolved = resolve_token(&state.orm, &session.token)
        .await?
        .expect("token resolves");
    assert!(!resolved.is_staff);
    Ok(())
}

#[tokio::test]
async fn anonymous_logout_is_accepted() -> anyhow::Result<()> {
    let state = setup_state().await?;
    let resp = auth_service::logout_user(&state, None).await?;
    assert_eq!(resp.message, "Logout successful");
    Ok(())
}
