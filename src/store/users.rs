//! Moderation state for sellers. Three warnings deactivate the account;
//! the caller sends the matching notification after the row is committed.

use serde::Serialize;
use sqlx::Row;
use tracing::info;
use uuid::Uuid;

use crate::error::AppError;
use crate::store::Db;

const WARNING_LIMIT: i32 = 3;

#[derive(Debug, Clone, Serialize)]
pub struct WarningOutcome {
    pub user_id: Uuid,
    pub email: String,
    pub name: String,
    pub warning_count: i32,
    pub deactivated: bool,
}

impl Db {
    /// Record one warning against a user, deactivating them once the count
    /// reaches the limit. The notification side effect belongs to the
    /// caller, after this write has committed.
    pub async fn warn_user(&self, user_id: Uuid) -> Result<WarningOutcome, AppError> {
        let row = sqlx::query(
            "UPDATE users SET
                warning_count = warning_count + 1,
                is_active = CASE WHEN warning_count + 1 >= $2 THEN false ELSE is_active END,
                updated_at = now()
             WHERE id = $1
             RETURNING email, name, warning_count, is_active",
        )
        .bind(user_id)
        .bind(WARNING_LIMIT)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::not_found(format!("user {user_id}")))?;

        let warning_count: i32 = row.try_get("warning_count")?;
        let is_active: bool = row.try_get("is_active")?;
        let outcome = WarningOutcome {
            user_id,
            email: row.try_get("email")?,
            name: row.try_get("name")?,
            warning_count,
            deactivated: !is_active && warning_count >= WARNING_LIMIT,
        };
        info!(
            user_id = %user_id,
            warning_count,
            deactivated = outcome.deactivated,
            "user warned"
        );
        Ok(outcome)
    }
}
