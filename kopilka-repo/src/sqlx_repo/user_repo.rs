use crate::sqlx_repo::SQLxRepo;
use crate::user_repo::UserRepoError::{EmailTaken, UserNotFound, UsernameTaken};
use crate::user_repo::{NewUser, User, UserId, UserRepo, UserRepoError};
use anyhow::Context;
use async_trait::async_trait;
use chrono::NaiveDateTime;
use sqlx::Postgres;
use tracing::instrument;

#[derive(sqlx::FromRow)]
struct UserEntry {
    id: UserId,
    username: String,
    email: String,
    password_hash: String,
    created_at: NaiveDateTime,
}

impl From<UserEntry> for User {
    fn from(entry: UserEntry) -> Self {
        User {
            id: entry.id,
            username: entry.username,
            email: entry.email,
            password_hash: entry.password_hash,
            created_at: entry.created_at,
        }
    }
}

/// Maps a unique-constraint violation to the matching conflict error.
fn conflict_error(e: sqlx::Error, username: &str, email: &str) -> UserRepoError {
    if let sqlx::Error::Database(db_err) = &e {
        if db_err.is_unique_violation() {
            return match db_err.constraint() {
                Some("users_email_key") => EmailTaken(email.to_owned()),
                _ => UsernameTaken(username.to_owned()),
            };
        }
    }
    UserRepoError::Other(anyhow::Error::new(e).context("Unable to write user"))
}

#[async_trait]
impl UserRepo for SQLxRepo {
    #[instrument(skip(self))]
    async fn get_user(&self, user_id: UserId) -> Result<User, UserRepoError> {
        let entry = sqlx::query_as::<Postgres, UserEntry>("SELECT * FROM users WHERE id = $1")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await
            .with_context(|| format!("Unable to get user {}", user_id))?
            .ok_or_else(|| UserNotFound(user_id.to_string()))?;
        Ok(entry.into())
    }

    #[instrument(skip(self))]
    async fn get_user_by_username(&self, username: &str) -> Result<User, UserRepoError> {
        let entry =
            sqlx::query_as::<Postgres, UserEntry>("SELECT * FROM users WHERE username = $1")
                .bind(username)
                .fetch_optional(&self.pool)
                .await
                .with_context(|| format!("Unable to get user {}", username))?
                .ok_or_else(|| UserNotFound(username.to_owned()))?;
        Ok(entry.into())
    }

    #[instrument(skip(self))]
    async fn get_user_by_email(&self, email: &str) -> Result<User, UserRepoError> {
        let entry = sqlx::query_as::<Postgres, UserEntry>("SELECT * FROM users WHERE email = $1")
            .bind(email)
            .fetch_optional(&self.pool)
            .await
            .context("Unable to get user by email")?
            .ok_or_else(|| UserNotFound(email.to_owned()))?;
        Ok(entry.into())
    }

    #[instrument(skip(self, new_user))]
    async fn create_user(&self, new_user: NewUser) -> Result<User, UserRepoError> {
        let entry = sqlx::query_as::<Postgres, UserEntry>(
            "INSERT INTO users(username, email, password_hash) VALUES ($1, $2, $3) RETURNING *",
        )
        .bind(&new_user.username)
        .bind(&new_user.email)
        .bind(&new_user.password_hash)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| conflict_error(e, &new_user.username, &new_user.email))?;
        Ok(entry.into())
    }

    #[instrument(skip(self))]
    async fn update_profile(
        &self,
        user_id: UserId,
        username: Option<String>,
        email: Option<String>,
    ) -> Result<User, UserRepoError> {
        let current = self.get_user(user_id).await?;
        let username = username.unwrap_or(current.username);
        let email = email.unwrap_or(current.email);

        let entry = sqlx::query_as::<Postgres, UserEntry>(
            "UPDATE users SET username = $1, email = $2 WHERE id = $3 RETURNING *",
        )
        .bind(&username)
        .bind(&email)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| conflict_error(e, &username, &email))?
        .ok_or_else(|| UserNotFound(user_id.to_string()))?;
        Ok(entry.into())
    }

    #[instrument(skip(self, password_hash))]
    async fn update_password_hash(
        &self,
        user_id: UserId,
        password_hash: &str,
    ) -> Result<(), UserRepoError> {
        let result = sqlx::query("UPDATE users SET password_hash = $1 WHERE id = $2")
            .bind(password_hash)
            .bind(user_id)
            .execute(&self.pool)
            .await
            .with_context(|| format!("Unable to update password for user {}", user_id))?;
        if result.rows_affected() == 0 {
            Err(UserNotFound(user_id.to_string()))
        } else {
            Ok(())
        }
    }

    #[instrument(skip(self))]
    async fn delete_user(&self, user_id: UserId) -> Result<(), UserRepoError> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await
            .with_context(|| format!("Unable to delete user {}", user_id))?;
        if result.rows_affected() == 0 {
            Err(UserNotFound(user_id.to_string()))
        } else {
            Ok(())
        }
    }
}
