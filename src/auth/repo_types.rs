use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

/// User record in the database: the credential store. Only a one-way hash
/// of any verify/reset/refresh secret is ever persisted, and at most one
/// refresh hash is live per user.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub is_email_verified: bool,
    #[serde(skip_serializing)]
    pub verify_token_hash: Option<String>,
    pub verify_token_expires: Option<OffsetDateTime>,
    #[serde(skip_serializing)]
    pub reset_token_hash: Option<String>,
    pub reset_token_expires: Option<OffsetDateTime>,
    #[serde(skip_serializing)]
    pub refresh_token_hash: Option<String>,
    pub refresh_token_expires: Option<OffsetDateTime>,
    pub created_at: OffsetDateTime,
}
