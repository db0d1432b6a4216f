use async_trait::async_trait;
use chrono::Utc;
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::db::{PersistenceError, TransactionError, Transactor};
use crate::domain::account::{Account, AccountRepository, NewAccount};
use crate::domain::campaign::{AccessCode, Campaign, CampaignRepository};
use crate::domain::ids::{AccountId, CampaignId, PlayerId};
use crate::domain::player::{Player, PlayerName, PlayerRepository};
use crate::metrics::Metrics;

// ============================================================================
// In-Memory Store
// ============================================================================
//
// Same contracts and constraints as the PostgreSQL schema, held in process:
// - a transaction works on a private copy of the tables; on commit only the
//   rows it wrote are checked against and applied to the committed tables
// - transactions run one at a time; autocommit calls apply immediately
// - unique username, unique player name, one player per account
// - ids come from sequences that are never rolled back
//
// Fault injection hooks drive failure paths in tests.
//
// ============================================================================

const USERNAME_CONSTRAINT: &str = "accounts_username_key";
const PLAYER_NAME_CONSTRAINT: &str = "players_player_name_key";
const PLAYER_ACCOUNT_CONSTRAINT: &str = "players_account_id_key";

#[derive(Debug, Clone)]
struct PlayerEntry {
    name: PlayerName,
    account_id: AccountId,
}

#[derive(Debug, Clone)]
struct CampaignEntry {
    campaign: Campaign,
    code: AccessCode,
}

/// Keys written since the tables were copied
#[derive(Debug, Clone, Default)]
struct Written {
    accounts: BTreeSet<AccountId>,
    players: BTreeSet<PlayerId>,
    campaigns: BTreeSet<CampaignId>,
}

#[derive(Debug, Clone, Default)]
struct Tables {
    accounts: BTreeMap<AccountId, Account>,
    players: BTreeMap<PlayerId, PlayerEntry>,
    campaigns: BTreeMap<CampaignId, CampaignEntry>,
    written: Written,
}

impl Tables {
    fn put_account(&mut self, account: Account) {
        self.written.accounts.insert(account.id);
        self.accounts.insert(account.id, account);
    }

    fn put_player(&mut self, id: PlayerId, entry: PlayerEntry) {
        self.written.players.insert(id);
        self.players.insert(id, entry);
    }

    fn put_campaign(&mut self, id: CampaignId, entry: CampaignEntry) {
        self.written.campaigns.insert(id);
        self.campaigns.insert(id, entry);
    }

    /// Applies the written rows onto `target`, re-checking unique constraints
    /// against rows committed by others in the meantime. Nothing is applied
    /// on conflict.
    fn merge_into(mut self, target: &mut Tables) -> Result<(), PersistenceError> {
        for id in &self.written.accounts {
            let Some(account) = self.accounts.get(id) else { continue };
            if target
                .accounts
                .values()
                .any(|other| other.id != *id && other.username == account.username)
            {
                return Err(PersistenceError::unique(USERNAME_CONSTRAINT));
            }
        }

        for id in &self.written.players {
            let Some(entry) = self.players.get(id) else { continue };
            for (other_id, other) in &target.players {
                if other_id == id {
                    continue;
                }
                if other.name == entry.name {
                    return Err(PersistenceError::unique(PLAYER_NAME_CONSTRAINT));
                }
                if other.account_id == entry.account_id {
                    return Err(PersistenceError::database(format!(
                        "unique constraint violated: {PLAYER_ACCOUNT_CONSTRAINT}"
                    )));
                }
            }
        }

        let written = std::mem::take(&mut self.written);
        for id in written.accounts {
            if let Some(account) = self.accounts.remove(&id) {
                target.accounts.insert(id, account);
            }
        }
        for id in written.players {
            if let Some(entry) = self.players.remove(&id) {
                target.players.insert(id, entry);
            }
        }
        for id in written.campaigns {
            if let Some(entry) = self.campaigns.remove(&id) {
                target.campaigns.insert(id, entry);
            }
        }
        Ok(())
    }
}

type TablesSlot = Arc<Mutex<Option<Tables>>>;

/// Scope handle of [`MemoryStore`]
#[derive(Clone)]
pub struct MemoryScope {
    transaction: Option<TablesSlot>,
}

impl MemoryScope {
    pub fn in_transaction(&self) -> bool {
        self.transaction.is_some()
    }
}

#[derive(Default)]
pub struct MemoryStore {
    committed: Mutex<Tables>,
    writer: tokio::sync::Mutex<()>,
    account_seq: AtomicI64,
    player_seq: AtomicI64,
    campaign_seq: AtomicI64,
    reserved_names: Mutex<HashSet<String>>,
    fail_next_commit: AtomicBool,
    fail_player_inserts: AtomicBool,
    fail_last_access_updates: AtomicBool,
    metrics: Option<Arc<Metrics>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn next_id(seq: &AtomicI64) -> i64 {
    seq.fetch_add(1, Ordering::SeqCst) + 1
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    // ========================================================================
    // Fault injection
    // ========================================================================

    /// The next commit fails with `CommitFailed` and nothing is applied
    pub fn fail_next_commit(&self) {
        self.fail_next_commit.store(true, Ordering::SeqCst);
    }

    /// Player inserts fail with a non-conflict database error until reset
    pub fn fail_player_inserts(&self, fail: bool) {
        self.fail_player_inserts.store(fail, Ordering::SeqCst);
    }

    /// Last-access updates fail with a database error until reset
    pub fn fail_last_access_updates(&self, fail: bool) {
        self.fail_last_access_updates.store(fail, Ordering::SeqCst);
    }

    /// Marks a player name as taken without creating a player
    pub fn reserve_player_name(&self, name: &str) {
        lock(&self.reserved_names).insert(name.to_string());
    }

    // ========================================================================
    // Inspection
    // ========================================================================

    pub fn account_count(&self) -> usize {
        lock(&self.committed).accounts.len()
    }

    pub fn player_count(&self) -> usize {
        lock(&self.committed).players.len()
    }

    pub fn campaign_count(&self) -> usize {
        lock(&self.committed).campaigns.len()
    }

    fn record(&self, outcome: &str) {
        if let Some(metrics) = &self.metrics {
            metrics.record_transaction(outcome);
        }
    }

    /// Runs `f` against the tables visible to `scope`. In autocommit mode the
    /// change is applied only when `f` succeeds.
    fn with_tables<R>(
        &self,
        scope: &MemoryScope,
        f: impl FnOnce(&mut Tables) -> Result<R, PersistenceError>,
    ) -> Result<R, PersistenceError> {
        match &scope.transaction {
            Some(slot) => {
                let mut guard = lock(slot);
                let tables = guard
                    .as_mut()
                    .ok_or_else(|| PersistenceError::database("transaction already closed"))?;
                f(tables)
            }
            None => {
                let mut committed = lock(&self.committed);
                let mut working = committed.clone();
                let value = f(&mut working)?;
                working.merge_into(&mut committed)?;
                Ok(value)
            }
        }
    }
}

#[async_trait]
impl Transactor for MemoryStore {
    type Scope = MemoryScope;

    fn autocommit(&self) -> MemoryScope {
        MemoryScope { transaction: None }
    }

    async fn within_transaction<T, E, F, Fut>(&self, work: F) -> Result<T, E>
    where
        T: Send + 'static,
        E: From<TransactionError> + Send + 'static,
        F: FnOnce(MemoryScope) -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
    {
        let _writer = self.writer.lock().await;

        let snapshot = lock(&self.committed).clone();
        let slot: TablesSlot = Arc::new(Mutex::new(Some(snapshot)));

        let result = work(MemoryScope {
            transaction: Some(slot.clone()),
        })
        .await;

        let working = lock(&slot).take();
        let Some(working) = working else {
            self.record("commit_failed");
            let closed = PersistenceError::database("transaction already closed");
            return Err(TransactionError::CommitFailed(closed).into());
        };

        match result {
            Ok(value) => {
                if self.fail_next_commit.swap(false, Ordering::SeqCst) {
                    tracing::warn!("Injected commit failure, discarding transaction");
                    self.record("commit_failed");
                    let injected = PersistenceError::database("injected commit failure");
                    return Err(TransactionError::CommitFailed(injected).into());
                }
                if let Err(e) = working.merge_into(&mut lock(&self.committed)) {
                    tracing::warn!(error = %e, "Commit conflicts with committed rows");
                    self.record("commit_failed");
                    return Err(TransactionError::CommitFailed(e).into());
                }
                self.record("committed");
                Ok(value)
            }
            Err(err) => {
                self.record("rolled_back");
                Err(err)
            }
        }
    }
}

#[async_trait]
impl AccountRepository<MemoryScope> for MemoryStore {
    async fn save(
        &self,
        scope: &MemoryScope,
        account: &NewAccount,
    ) -> Result<Account, PersistenceError> {
        self.with_tables(scope, |tables| {
            if tables.accounts.values().any(|a| a.username == account.username) {
                return Err(PersistenceError::unique(USERNAME_CONSTRAINT));
            }

            let stored = Account {
                id: AccountId(next_id(&self.account_seq)),
                username: account.username.clone(),
                password: account.password.clone(),
                email: account.email.clone(),
                created_at: Utc::now(),
                last_access: None,
            };
            tables.put_account(stored.clone());
            Ok(stored)
        })
    }

    async fn find_by_username(
        &self,
        scope: &MemoryScope,
        username: &str,
    ) -> Result<Option<Account>, PersistenceError> {
        self.with_tables(scope, |tables| {
            Ok(tables.accounts.values().find(|a| a.username.as_str() == username).cloned())
        })
    }

    async fn find_by_id(
        &self,
        scope: &MemoryScope,
        id: AccountId,
    ) -> Result<Option<Account>, PersistenceError> {
        self.with_tables(scope, |tables| Ok(tables.accounts.get(&id).cloned()))
    }

    async fn update_last_access(
        &self,
        scope: &MemoryScope,
        id: AccountId,
    ) -> Result<(), PersistenceError> {
        if self.fail_last_access_updates.load(Ordering::SeqCst) {
            return Err(PersistenceError::database("injected last access failure"));
        }
        self.with_tables(scope, |tables| {
            let mut account = tables.accounts.get(&id).cloned().ok_or(PersistenceError::NotFound)?;
            account.last_access = Some(Utc::now());
            tables.put_account(account);
            Ok(())
        })
    }

    async fn update(&self, scope: &MemoryScope, account: &Account) -> Result<(), PersistenceError> {
        self.with_tables(scope, |tables| {
            let mut stored = tables
                .accounts
                .get(&account.id)
                .cloned()
                .ok_or(PersistenceError::NotFound)?;
            stored.email = account.email.clone();
            tables.put_account(stored);
            Ok(())
        })
    }
}

#[async_trait]
impl PlayerRepository<MemoryScope> for MemoryStore {
    async fn save(
        &self,
        scope: &MemoryScope,
        name: &PlayerName,
        account_id: AccountId,
    ) -> Result<Player, PersistenceError> {
        if self.fail_player_inserts.load(Ordering::SeqCst) {
            return Err(PersistenceError::database("injected player insert failure"));
        }
        let reserved = lock(&self.reserved_names).contains(name.as_str());

        self.with_tables(scope, |tables| {
            if reserved || tables.players.values().any(|p| &p.name == name) {
                return Err(PersistenceError::unique(PLAYER_NAME_CONSTRAINT));
            }
            if !tables.accounts.contains_key(&account_id) {
                return Err(PersistenceError::database(
                    "foreign key violated: players_account_id_fkey",
                ));
            }
            if tables.players.values().any(|p| p.account_id == account_id) {
                return Err(PersistenceError::database(format!(
                    "unique constraint violated: {PLAYER_ACCOUNT_CONSTRAINT}"
                )));
            }

            let id = PlayerId(next_id(&self.player_seq));
            tables.put_player(
                id,
                PlayerEntry {
                    name: name.clone(),
                    account_id,
                },
            );
            Ok(Player { id, name: name.clone() })
        })
    }

    async fn find_by_name(
        &self,
        scope: &MemoryScope,
        name: &str,
    ) -> Result<Option<Player>, PersistenceError> {
        self.with_tables(scope, |tables| {
            Ok(tables
                .players
                .iter()
                .find(|(_, entry)| entry.name.as_str() == name)
                .map(|(id, entry)| Player {
                    id: *id,
                    name: entry.name.clone(),
                }))
        })
    }

    async fn find_by_id(
        &self,
        scope: &MemoryScope,
        id: PlayerId,
    ) -> Result<Option<Player>, PersistenceError> {
        self.with_tables(scope, |tables| {
            Ok(tables.players.get(&id).map(|entry| Player {
                id,
                name: entry.name.clone(),
            }))
        })
    }

    async fn find_by_account_id(
        &self,
        scope: &MemoryScope,
        account_id: AccountId,
    ) -> Result<Option<Player>, PersistenceError> {
        self.with_tables(scope, |tables| {
            Ok(tables
                .players
                .iter()
                .find(|(_, entry)| entry.account_id == account_id)
                .map(|(id, entry)| Player {
                    id: *id,
                    name: entry.name.clone(),
                }))
        })
    }
}

#[async_trait]
impl CampaignRepository<MemoryScope> for MemoryStore {
    async fn save(
        &self,
        scope: &MemoryScope,
        campaign: &Campaign,
        code: &AccessCode,
    ) -> Result<CampaignId, PersistenceError> {
        self.with_tables(scope, |tables| {
            let id = CampaignId(next_id(&self.campaign_seq));

            let mut stored = campaign.clone();
            stored.assign_id(id);
            tables.put_campaign(
                id,
                CampaignEntry {
                    campaign: stored,
                    code: code.clone(),
                },
            );
            Ok(id)
        })
    }

    async fn find_by_id(
        &self,
        scope: &MemoryScope,
        id: CampaignId,
    ) -> Result<Option<Campaign>, PersistenceError> {
        self.with_tables(scope, |tables| {
            Ok(tables.campaigns.get(&id).map(|entry| entry.campaign.clone()))
        })
    }

    async fn find_access_code(
        &self,
        scope: &MemoryScope,
        id: CampaignId,
    ) -> Result<AccessCode, PersistenceError> {
        self.with_tables(scope, |tables| {
            tables
                .campaigns
                .get(&id)
                .map(|entry| entry.code.clone())
                .ok_or(PersistenceError::NotFound)
        })
    }

    async fn update(
        &self,
        scope: &MemoryScope,
        campaign: &Campaign,
    ) -> Result<(), PersistenceError> {
        let id = campaign.id().ok_or(PersistenceError::NotFound)?;
        self.with_tables(scope, |tables| {
            let mut entry = tables.campaigns.get(&id).cloned().ok_or(PersistenceError::NotFound)?;
            entry.campaign = campaign.clone();
            tables.put_campaign(id, entry);
            Ok(())
        })
    }

    async fn find_all(&self, scope: &MemoryScope) -> Result<Vec<Campaign>, PersistenceError> {
        self.with_tables(scope, |tables| {
            Ok(tables.campaigns.values().map(|entry| entry.campaign.clone()).collect())
        })
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::account::{HashedPassword, Username};

    #[derive(Debug, thiserror::Error)]
    enum TestError {
        #[error("work failed")]
        Work,
        #[error(transparent)]
        Transaction(#[from] TransactionError),
    }

    fn new_account(name: &str) -> NewAccount {
        NewAccount::new(Username::parse(name).unwrap(), HashedPassword::new("hash"))
    }

    #[tokio::test]
    async fn test_commit_publishes_writes() {
        let store = Arc::new(MemoryStore::new());
        let repo = store.clone();

        let account = store
            .within_transaction(move |scope| async move {
                Ok::<_, TestError>(AccountRepository::save(&*repo, &scope, &new_account("merry"))
                    .await
                    .unwrap())
            })
            .await
            .unwrap();

        assert_eq!(account.id, AccountId(1));
        assert_eq!(store.account_count(), 1);
    }

    #[tokio::test]
    async fn test_failed_work_rolls_back() {
        let store = Arc::new(MemoryStore::new());
        let repo = store.clone();

        let result: Result<(), TestError> = store
            .within_transaction(move |scope| async move {
                AccountRepository::save(&*repo, &scope, &new_account("merry")).await.unwrap();
                Err(TestError::Work)
            })
            .await;

        assert!(matches!(result, Err(TestError::Work)));
        assert_eq!(store.account_count(), 0);
    }

    #[tokio::test]
    async fn test_commit_failure_discards_writes() {
        let store = Arc::new(MemoryStore::new());
        store.fail_next_commit();
        let repo = store.clone();

        let result = store
            .within_transaction(move |scope| async move {
                AccountRepository::save(&*repo, &scope, &new_account("merry")).await.unwrap();
                Ok::<_, TestError>(())
            })
            .await;

        assert!(matches!(result, Err(TestError::Transaction(TransactionError::CommitFailed(_)))));
        assert_eq!(store.account_count(), 0);
    }

    #[tokio::test]
    async fn test_writes_are_invisible_outside_the_transaction() {
        let store = Arc::new(MemoryStore::new());
        let repo = store.clone();
        let outside = store.clone();

        store
            .within_transaction(move |scope| async move {
                AccountRepository::save(&*repo, &scope, &new_account("merry")).await.unwrap();
                let autocommit = outside.autocommit();
                let seen = AccountRepository::find_by_username(&*outside, &autocommit, "merry")
                    .await
                    .unwrap();
                assert!(seen.is_none());
                Ok::<_, TestError>(())
            })
            .await
            .unwrap();

        assert_eq!(store.account_count(), 1);
    }

    #[tokio::test]
    async fn test_autocommit_writes_survive_an_overlapping_commit() {
        let store = Arc::new(MemoryStore::new());
        let scope = store.autocommit();
        let existing = AccountRepository::save(&*store, &scope, &new_account("frodo"))
            .await
            .unwrap()
            .id;

        let repo = store.clone();
        let outside = store.clone();
        store
            .within_transaction(move |scope| async move {
                AccountRepository::save(&*repo, &scope, &new_account("txuser")).await.unwrap();

                let autocommit = outside.autocommit();
                AccountRepository::save(&*outside, &autocommit, &new_account("autouser"))
                    .await
                    .unwrap();
                AccountRepository::update_last_access(&*outside, &autocommit, existing)
                    .await
                    .unwrap();
                assert_eq!(outside.account_count(), 2);
                Ok::<_, TestError>(())
            })
            .await
            .unwrap();

        assert_eq!(store.account_count(), 3);
        let frodo = AccountRepository::find_by_id(&*store, &scope, existing)
            .await
            .unwrap()
            .unwrap();
        assert!(frodo.last_access.is_some());

        let ids: HashSet<AccountId> = ["frodo", "txuser", "autouser"]
            .into_iter()
            .map(|name| {
                let committed = lock(&store.committed);
                let account = committed.accounts.values().find(|a| a.username.as_str() == name);
                account.unwrap().id
            })
            .collect();
        assert_eq!(ids.len(), 3);
    }

    #[tokio::test]
    async fn test_commit_conflicting_with_autocommit_write_applies_nothing() {
        let store = Arc::new(MemoryStore::new());
        let repo = store.clone();
        let outside = store.clone();

        let result = store
            .within_transaction(move |scope| async move {
                AccountRepository::save(&*repo, &scope, &new_account("merry")).await.unwrap();
                AccountRepository::save(&*repo, &scope, &new_account("pippin")).await.unwrap();
                AccountRepository::save(&*outside, &outside.autocommit(), &new_account("merry"))
                    .await
                    .unwrap();
                Ok::<_, TestError>(())
            })
            .await;

        match result {
            Err(TestError::Transaction(TransactionError::CommitFailed(err))) => {
                assert!(err.is_unique_violation())
            }
            other => panic!("expected a commit conflict, got {other:?}"),
        }
        assert_eq!(store.account_count(), 1);
    }

    #[tokio::test]
    async fn test_rolled_back_ids_are_not_reused() {
        let store = Arc::new(MemoryStore::new());
        let repo = store.clone();

        let _ = store
            .within_transaction(move |scope| async move {
                AccountRepository::save(&*repo, &scope, &new_account("merry")).await.unwrap();
                Err::<(), _>(TestError::Work)
            })
            .await;

        let account = AccountRepository::save(&*store, &store.autocommit(), &new_account("merry"))
            .await
            .unwrap();
        assert_eq!(account.id, AccountId(2));
    }

    #[tokio::test]
    async fn test_last_access_fault_hook() {
        let store = MemoryStore::new();
        let scope = store.autocommit();
        let account = AccountRepository::save(&store, &scope, &new_account("sam")).await.unwrap();

        store.fail_last_access_updates(true);
        let err = AccountRepository::update_last_access(&store, &scope, account.id)
            .await
            .unwrap_err();
        assert!(!err.is_unique_violation());

        store.fail_last_access_updates(false);
        AccountRepository::update_last_access(&store, &scope, account.id).await.unwrap();
        let stored = AccountRepository::find_by_id(&store, &scope, account.id)
            .await
            .unwrap()
            .unwrap();
        assert!(stored.last_access.is_some());
    }

    #[tokio::test]
    async fn test_duplicate_username_is_a_unique_violation() {
        let store = MemoryStore::new();
        let scope = store.autocommit();

        AccountRepository::save(&store, &scope, &new_account("pippin")).await.unwrap();
        let err = AccountRepository::save(&store, &scope, &new_account("pippin"))
            .await
            .unwrap_err();

        assert!(err.is_unique_violation());
        assert_eq!(store.account_count(), 1);
    }

    #[tokio::test]
    async fn test_player_constraints() {
        let store = MemoryStore::new();
        let scope = store.autocommit();
        let account = AccountRepository::save(&store, &scope, &new_account("pippin"))
            .await
            .unwrap();
        let name = PlayerName::parse("pippin").unwrap();

        store.reserve_player_name("pippin");
        let reserved = PlayerRepository::save(&store, &scope, &name, account.id).await.unwrap_err();
        assert!(reserved.is_unique_violation());

        let other = PlayerName::parse("pippin_1").unwrap();
        PlayerRepository::save(&store, &scope, &other, account.id).await.unwrap();

        let second = PlayerName::parse("took").unwrap();
        let err = PlayerRepository::save(&store, &scope, &second, account.id).await.unwrap_err();
        assert!(!err.is_unique_violation());

        let orphan = PlayerRepository::save(&store, &scope, &second, AccountId(99))
            .await
            .unwrap_err();
        assert!(!orphan.is_unique_violation());

        assert_eq!(store.player_count(), 1);
    }

    #[tokio::test]
    async fn test_transactions_are_counted() {
        let metrics = Arc::new(Metrics::new().unwrap());
        let store = Arc::new(MemoryStore::new().with_metrics(metrics.clone()));

        store.within_transaction(|_| async { Ok::<_, TestError>(()) }).await.unwrap();
        let _ = store.within_transaction(|_| async { Err::<(), _>(TestError::Work) }).await;

        let by_outcome = |label: &str| metrics.transactions_total.with_label_values(&[label]).get();
        assert_eq!(by_outcome("committed"), 1);
        assert_eq!(by_outcome("rolled_back"), 1);
    }
}
