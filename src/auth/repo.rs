use sqlx::PgPool;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::auth::repo_types::User;

const USER_COLUMNS: &str = "id, email, name, password_hash, is_email_verified, \
     verify_token_hash, verify_token_expires, reset_token_hash, reset_token_expires, \
     refresh_token_hash, refresh_token_expires, created_at";

impl User {
    /// Find a user by normalized email.
    pub async fn find_by_email(db: &PgPool, email: &str) -> sqlx::Result<Option<User>> {
        sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = $1"
        ))
        .bind(email)
        .fetch_optional(db)
        .await
    }

    pub async fn find_by_id(db: &PgPool, id: Uuid) -> sqlx::Result<Option<User>> {
        sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
            .bind(id)
            .fetch_optional(db)
            .await
    }

    /// Create an unverified user with a pending verification token hash.
    pub async fn create(
        db: &PgPool,
        email: &str,
        name: &str,
        password_hash: &str,
        verify_token_hash: &str,
        verify_token_expires: OffsetDateTime,
    ) -> sqlx::Result<User> {
        sqlx::query_as::<_, User>(&format!(
            "INSERT INTO users (email, name, password_hash, verify_token_hash, verify_token_expires)
             VALUES ($1, $2, $3, $4, $5)
             RETURNING {USER_COLUMNS}"
        ))
        .bind(email)
        .bind(name)
        .bind(password_hash)
        .bind(verify_token_hash)
        .bind(verify_token_expires)
        .fetch_one(db)
        .await
    }

    /// Reissue the verification token (resend flow).
    pub async fn set_verify_token(
        db: &PgPool,
        id: Uuid,
        token_hash: &str,
        expires: OffsetDateTime,
    ) -> sqlx::Result<()> {
        sqlx::query("UPDATE users SET verify_token_hash = $2, verify_token_expires = $3 WHERE id = $1")
            .bind(id)
            .bind(token_hash)
            .bind(expires)
            .execute(db)
            .await?;
        Ok(())
    }

    /// Consume an unexpired verification token: flips the verified flag and
    /// clears the verify fields in one statement, so the token is single-use.
    pub async fn consume_verify_token(db: &PgPool, token_hash: &str) -> sqlx::Result<Option<User>> {
        sqlx::query_as::<_, User>(&format!(
            "UPDATE users
             SET is_email_verified = TRUE, verify_token_hash = NULL, verify_token_expires = NULL
             WHERE verify_token_hash = $1 AND verify_token_expires > now()
             RETURNING {USER_COLUMNS}"
        ))
        .bind(token_hash)
        .fetch_optional(db)
        .await
    }

    pub async fn set_reset_token(
        db: &PgPool,
        id: Uuid,
        token_hash: &str,
        expires: OffsetDateTime,
    ) -> sqlx::Result<()> {
        sqlx::query("UPDATE users SET reset_token_hash = $2, reset_token_expires = $3 WHERE id = $1")
            .bind(id)
            .bind(token_hash)
            .bind(expires)
            .execute(db)
            .await?;
        Ok(())
    }

    /// Consume an unexpired reset token, replacing the password hash and
    /// clearing the reset fields in one statement.
    pub async fn consume_reset_token(
        db: &PgPool,
        token_hash: &str,
        new_password_hash: &str,
    ) -> sqlx::Result<Option<User>> {
        sqlx::query_as::<_, User>(&format!(
            "UPDATE users
             SET password_hash = $2, reset_token_hash = NULL, reset_token_expires = NULL
             WHERE reset_token_hash = $1 AND reset_token_expires > now()
             RETURNING {USER_COLUMNS}"
        ))
        .bind(token_hash)
        .bind(new_password_hash)
        .fetch_optional(db)
        .await
    }

    /// Store the new refresh hash, overwriting any previous one. This is
    /// the rotation point: the prior session secret dies here.
    pub async fn set_refresh_token(
        db: &PgPool,
        id: Uuid,
        token_hash: &str,
        expires: OffsetDateTime,
    ) -> sqlx::Result<()> {
        sqlx::query(
            "UPDATE users SET refresh_token_hash = $2, refresh_token_expires = $3 WHERE id = $1",
        )
        .bind(id)
        .bind(token_hash)
        .bind(expires)
        .execute(db)
        .await?;
        Ok(())
    }

    /// Look up the holder of an unexpired refresh token.
    pub async fn find_by_refresh_hash(db: &PgPool, token_hash: &str) -> sqlx::Result<Option<User>> {
        sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users
             WHERE refresh_token_hash = $1 AND refresh_token_expires > now()"
        ))
        .bind(token_hash)
        .fetch_optional(db)
        .await
    }

    /// Destroy the session matching this refresh hash. A miss is fine;
    /// logout is best-effort.
    pub async fn clear_refresh_by_hash(db: &PgPool, token_hash: &str) -> sqlx::Result<()> {
        sqlx::query(
            "UPDATE users SET refresh_token_hash = NULL, refresh_token_expires = NULL
             WHERE refresh_token_hash = $1",
        )
        .bind(token_hash)
        .execute(db)
        .await?;
        Ok(())
    }
}

/// Postgres unique-constraint violation, used to map duplicate-email races
/// onto the conflict error.
pub fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.code().is_some_and(|code| code.as_ref() == "23505"),
        _ => false,
    }
}
