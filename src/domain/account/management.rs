use std::sync::Arc;

use super::account::Account;
use super::errors::AccountError;
use super::repository::AccountRepository;
use super::value_objects::Email;
use crate::db::Transactor;
use crate::domain::ids::AccountId;

/// Changes to an existing account
pub struct AccountManagement<T: Transactor> {
    transactor: Arc<T>,
    accounts: Arc<dyn AccountRepository<T::Scope>>,
}

impl<T: Transactor> AccountManagement<T> {
    pub fn new(transactor: Arc<T>, accounts: Arc<dyn AccountRepository<T::Scope>>) -> Self {
        Self { transactor, accounts }
    }

    pub async fn update_email(
        &self,
        account_id: AccountId,
        raw_email: &str,
    ) -> Result<Account, AccountError> {
        let email = Email::parse(raw_email)?;
        let accounts = self.accounts.clone();

        self.transactor
            .within_transaction(move |scope| async move {
                let mut account = accounts
                    .find_by_id(&scope, account_id)
                    .await
                    .map_err(|error| {
                        tracing::error!(
                            account_id = %account_id,
                            error = %error,
                            "Failed to load account"
                        );
                        AccountError::Database
                    })?
                    .ok_or(AccountError::AccountNotFound)?;

                account.update_email(email);

                accounts.update(&scope, &account).await.map_err(|error| {
                    tracing::error!(
                        account_id = %account_id,
                        error = %error,
                        "Failed to update account"
                    );
                    AccountError::Database
                })?;

                tracing::info!(account_id = %account_id, "Account email updated");
                Ok::<_, AccountError>(account)
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::account::{HashedPassword, NewAccount, Username};
    use crate::db::memory::MemoryStore;

    #[tokio::test]
    async fn test_update_email_persists_normalized_value() {
        let store = Arc::new(MemoryStore::new());
        let new_account =
            NewAccount::new(Username::parse("samwise").unwrap(), HashedPassword::new("x"));
        let account = AccountRepository::save(&*store, &store.autocommit(), &new_account)
            .await
            .unwrap();

        let management = AccountManagement::new(store.clone(), store.clone());
        management.update_email(account.id, " Sam@Shire.ME ").await.unwrap();

        let stored = AccountRepository::find_by_id(&*store, &store.autocommit(), account.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.email.unwrap().as_str(), "sam@shire.me");
    }

    #[tokio::test]
    async fn test_update_email_on_missing_account() {
        let store = Arc::new(MemoryStore::new());
        let management = AccountManagement::new(store.clone(), store);

        let result = management.update_email(AccountId(42), "sam@shire.me").await;

        assert!(matches!(result, Err(AccountError::AccountNotFound)));
    }

    #[tokio::test]
    async fn test_update_email_rejects_invalid_address() {
        let store = Arc::new(MemoryStore::new());
        let management = AccountManagement::new(store.clone(), store);

        let result = management.update_email(AccountId(1), "nope").await;

        assert!(matches!(result, Err(AccountError::InvalidEmail)));
    }
}
