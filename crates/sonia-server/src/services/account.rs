//! Signup and login.

use sonia_core::{now_millis, User};
use sonia_store::StoreError;
use tracing::info;
use uuid::Uuid;

use crate::auth;
use crate::dto::{LoginRequest, LoginResponse, SignupRequest};
use crate::error::AppError;
use crate::ServerState;

/// Hashing is CPU-bound, so it runs off the async workers.
async fn hash_password(password: String, cost: u32) -> Result<String, AppError> {
    tokio::task::spawn_blocking(move || bcrypt::hash(password, cost))
        .await
        .map_err(AppError::internal)?
        .map_err(AppError::internal)
}

async fn verify_password(password: String, hash: String) -> Result<bool, AppError> {
    tokio::task::spawn_blocking(move || bcrypt::verify(password, &hash))
        .await
        .map_err(AppError::internal)?
        .map_err(AppError::internal)
}

pub async fn signup(state: &ServerState, req: SignupRequest) -> Result<(), AppError> {
    let email = req.email.trim().to_string();
    if email.is_empty() || req.password.is_empty() {
        return Err(AppError::bad_request("Missing fields"));
    }
    if state.store.find_user_by_email(&email)?.is_some() {
        return Err(AppError::bad_request("User already exists"));
    }

    let user = User {
        id: Uuid::new_v4().to_string(),
        name: req.name.trim().to_string(),
        email,
        password_hash: hash_password(req.password, state.config.auth.bcrypt_cost).await?,
        created_at: now_millis(),
    };

    match state.store.create_user(&user) {
        Ok(()) => {}
        // Lost a race with a concurrent signup for the same email.
        Err(StoreError::Duplicate(_)) => return Err(AppError::bad_request("User already exists")),
        Err(e) => return Err(e.into()),
    }
    info!("New account: {}", user.id);
    Ok(())
}

pub async fn login(state: &ServerState, req: LoginRequest) -> Result<LoginResponse, AppError> {
    let email = req.email.trim();
    if email.is_empty() || req.password.is_empty() {
        return Err(AppError::bad_request("Missing credentials"));
    }

    let user = state
        .store
        .find_user_by_email(email)?
        .ok_or_else(|| AppError::bad_request("User not found"))?;

    if !verify_password(req.password, user.password_hash.clone()).await? {
        return Err(AppError::bad_request("Wrong password"));
    }

    let token = auth::issue_token(&user.id, &state.config.auth)?;
    Ok(LoginResponse { token, user_id: user.id, email: user.email, name: user.name })
}
