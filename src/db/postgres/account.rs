use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::map_sqlx_error;
use super::transactor::PgScope;
use crate::db::PersistenceError;
use crate::domain::account::{
    Account, AccountRepository, Email, HashedPassword, NewAccount, Username,
};
use crate::domain::ids::AccountId;

#[derive(Debug, sqlx::FromRow)]
struct AccountRow {
    account_id: i64,
    username: String,
    password: String,
    email: Option<String>,
    created_at: DateTime<Utc>,
    last_access: Option<DateTime<Utc>>,
}

impl TryFrom<AccountRow> for Account {
    type Error = PersistenceError;

    fn try_from(row: AccountRow) -> Result<Self, Self::Error> {
        let username = Username::parse(row.username)
            .map_err(|error| {
                PersistenceError::database(format!("stored username rejected: {error}"))
            })?;
        let email = row
            .email
            .as_deref()
            .map(Email::parse)
            .transpose()
            .map_err(|error| {
                PersistenceError::database(format!("stored email rejected: {error}"))
            })?;

        Ok(Account {
            id: AccountId(row.account_id),
            username,
            password: HashedPassword::new(row.password),
            email,
            created_at: row.created_at,
            last_access: row.last_access,
        })
    }
}

const SELECT_ACCOUNT: &str = "
    SELECT account_id, username, password, email, created_at, last_access
    FROM accounts
";

#[derive(Debug, Default, Clone, Copy)]
pub struct PgAccountRepository;

#[async_trait]
impl AccountRepository<PgScope> for PgAccountRepository {
    async fn save(
        &self,
        scope: &PgScope,
        account: &NewAccount,
    ) -> Result<Account, PersistenceError> {
        let mut conn = scope.conn().await?;

        let row: AccountRow = sqlx::query_as(
            "INSERT INTO accounts (username, password, email, created_at)
             VALUES ($1, $2, $3, $4)
             RETURNING account_id, username, password, email, created_at, last_access",
        )
        .bind(account.username.as_str())
        .bind(account.password.as_str())
        .bind(account.email.as_ref().map(Email::as_str))
        .bind(Utc::now())
        .fetch_one(&mut *conn)
        .await
        .map_err(map_sqlx_error)?;

        row.try_into()
    }

    async fn find_by_username(
        &self,
        scope: &PgScope,
        username: &str,
    ) -> Result<Option<Account>, PersistenceError> {
        let mut conn = scope.conn().await?;

        let row: Option<AccountRow> =
            sqlx::query_as(&format!("{SELECT_ACCOUNT} WHERE username = $1"))
                .bind(username)
                .fetch_optional(&mut *conn)
            .await
            .map_err(map_sqlx_error)?;

        row.map(Account::try_from).transpose()
    }

    async fn find_by_id(
        &self,
        scope: &PgScope,
        id: AccountId,
    ) -> Result<Option<Account>, PersistenceError> {
        let mut conn = scope.conn().await?;

        let row: Option<AccountRow> =
            sqlx::query_as(&format!("{SELECT_ACCOUNT} WHERE account_id = $1"))
                .bind(id.get())
                .fetch_optional(&mut *conn)
            .await
            .map_err(map_sqlx_error)?;

        row.map(Account::try_from).transpose()
    }

    async fn update_last_access(
        &self,
        scope: &PgScope,
        id: AccountId,
    ) -> Result<(), PersistenceError> {
        let mut conn = scope.conn().await?;

        let result = sqlx::query("UPDATE accounts SET last_access = $1 WHERE account_id = $2")
            .bind(Utc::now())
            .bind(id.get())
            .execute(&mut *conn)
            .await
            .map_err(map_sqlx_error)?;

        if result.rows_affected() == 0 {
            return Err(PersistenceError::NotFound);
        }
        Ok(())
    }

    async fn update(&self, scope: &PgScope, account: &Account) -> Result<(), PersistenceError> {
        let mut conn = scope.conn().await?;

        let result = sqlx::query("UPDATE accounts SET email = $1 WHERE account_id = $2")
            .bind(account.email.as_ref().map(Email::as_str))
            .bind(account.id.get())
            .execute(&mut *conn)
            .await
            .map_err(map_sqlx_error)?;

        if result.rows_affected() == 0 {
            return Err(PersistenceError::NotFound);
        }
        Ok(())
    }
}
