use argon2::{password_hash::SaltString, Argon2, PasswordHasher};
use axum::{extract::State, Json};
use tracing::info;

use crate::{
    error::{AppError, AppResult},
    extract::Payload,
    state::AppState,
    types::{ApiResponse, RegisterRequest, RegisterResponse},
};

/// `POST /api/register`
///
/// Creates a user from `{name, mobile, password}`. The mobile number must not be
/// registered yet; the lookup and the insert run in one transaction.
pub async fn register(
    State(state): State<AppState>,
    Payload(mut req): Payload<RegisterRequest>,
) -> AppResult<Json<ApiResponse<RegisterResponse>>> {
    req.validate()?;

    let pool = state.db.pool().await?;
    let password_hash = hash_password(std::mem::take(&mut req.password)).await?;

    let mut tx = pool.begin().await?;

    let count: i64 = sqlx::query_scalar("SELECT COUNT(user_id) FROM users WHERE mobile = ?1")
        .bind(&req.mobile)
        .fetch_one(&mut *tx)
        .await?;
    if count != 0 {
        return Err(AppError::Conflict("Mobile number is already registered".into()));
    }

    let result = sqlx::query("INSERT INTO users (name, mobile, password_hash) VALUES (?1, ?2, ?3)")
        .bind(&req.name)
        .bind(&req.mobile)
        .bind(&password_hash)
        .execute(&mut *tx)
        .await?;
    if result.rows_affected() != 1 {
        return Err(AppError::Internal(anyhow::anyhow!(
            "registration inserted {} rows",
            result.rows_affected()
        )));
    }

    tx.commit().await?;
    info!(user_id = result.last_insert_rowid(), "Registered new user");

    Ok(Json(ApiResponse::ok(RegisterResponse::default())))
}

// Argon2 is CPU-bound; hash on the blocking pool.
async fn hash_password(password: String) -> AppResult<String> {
    tokio::task::spawn_blocking(move || {
        let salt = SaltString::generate(rand::thread_rng());
        Argon2::default().hash_password(password.as_bytes(), &salt).map(|hash| hash.to_string())
    })
    .await
    .map_err(|e| AppError::Internal(anyhow::anyhow!("password hashing task failed: {}", e)))?
    .map_err(|e| AppError::Internal(anyhow::anyhow!("failed to hash password: {}", e)))
}
