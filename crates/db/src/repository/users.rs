//! User repository.

use profile_shop_core::{Role, UserId};

use super::{RepositoryError, ensure_written, required_id, required_text};
use crate::backend::Database;
use crate::models::User;
use crate::params;
use crate::statement::{Filter, Select, Statement};
use crate::value::Row;

impl TryFrom<&Row> for User {
    type Error = RepositoryError;

    fn try_from(row: &Row) -> Result<Self, Self::Error> {
        let role = row
            .text("role")
            .unwrap_or_default()
            .parse::<Role>()
            .map_err(|e| RepositoryError::DataCorruption(e.to_string()))?;

        Ok(Self {
            id: UserId::new(required_id(row, "id")?),
            username: required_text(row, "username")?,
            role,
        })
    }
}

/// Repository for user accounts.
pub struct UserRepository<'a> {
    db: &'a Database,
}

impl<'a> UserRepository<'a> {
    /// Create a new user repository.
    #[must_use]
    pub const fn new(db: &'a Database) -> Self {
        Self { db }
    }

    /// Look up an account by exact username and password.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    /// Returns `RepositoryError::DataCorruption` if the stored role is invalid.
    pub async fn find_by_credentials(
        &self,
        username: &str,
        password: &str,
    ) -> Result<Option<User>, RepositoryError> {
        let stmt = Select::all("users").filter(Filter::Credentials).into();
        let row = self.db.query(&stmt).get(&params![username, password]).await?;
        row.as_ref().map(User::try_from).transpose()
    }

    /// Look up an account by username.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    /// Returns `RepositoryError::DataCorruption` if the stored role is invalid.
    pub async fn find_by_username(&self, username: &str) -> Result<Option<User>, RepositoryError> {
        let stmt = Select::all("users")
            .filter(Filter::Username(username.to_owned()))
            .into();
        let row = self.db.query(&stmt).get(&[]).await?;
        row.as_ref().map(User::try_from).transpose()
    }

    /// Register a storefront customer.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the username is taken.
    /// Returns `RepositoryError::Database` if the store refused the write.
    pub async fn create(&self, username: &str, password: &str) -> Result<User, RepositoryError> {
        let role = Role::User;
        let stmt = Statement::insert("users", &["username", "password", "role"]);
        let result = ensure_written(
            self.db
                .run(&stmt, &params![username, password, role.as_str()])
                .await?,
        )?;

        tracing::info!(user_id = result.inserted_id, "Registered user");
        Ok(User {
            id: UserId::new(result.inserted_id),
            username: username.to_owned(),
            role,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::bootstrap;

    async fn db() -> Database {
        let db = Database::memory();
        bootstrap::run(&db).await.unwrap();
        db
    }

    #[tokio::test]
    async fn test_login_with_seeded_admin() {
        let db = db().await;
        let users = UserRepository::new(&db);
        let admin = users
            .find_by_credentials(bootstrap::ADMIN_USERNAME, bootstrap::ADMIN_PASSWORD)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(admin.role, Role::Admin);
        assert!(users.find_by_credentials("admin", "wrong").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_register_then_duplicate() {
        let db = db().await;
        let users = UserRepository::new(&db);
        let user = users.create("o'brien", "pw").await.unwrap();
        assert_eq!(user.id, UserId::new(2));
        assert_eq!(user.role, Role::User);

        let found = users.find_by_username("o'brien").await.unwrap().unwrap();
        assert_eq!(found, user);

        let err = users.create("o'brien", "other").await.unwrap_err();
        assert!(matches!(err, RepositoryError::Conflict(_)));
    }
}
