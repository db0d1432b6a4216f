use std::collections::BTreeSet;
use std::sync::Arc;

use campaign_hub::db::memory::MemoryStore;
use campaign_hub::db::Transactor;
use campaign_hub::domain::campaign::{
    CampaignError, CampaignRepository, CampaignStatus, CampaignUseCase, CreateCampaignRequest,
    JoinCampaignRequest,
};
use campaign_hub::domain::ids::{CampaignId, PlayerId};
use campaign_hub::metrics::Metrics;

// ============================================================================
// Campaign use cases against the in-memory store
// ============================================================================

const MASTER: PlayerId = PlayerId(7);
const GUEST: PlayerId = PlayerId(9);

fn use_case(store: &Arc<MemoryStore>) -> CampaignUseCase<MemoryStore> {
    CampaignUseCase::new(store.clone(), store.clone())
}

fn strahd() -> CreateCampaignRequest {
    CreateCampaignRequest {
        name: "Curse of Strahd".to_string(),
        description: "gothic horror".to_string(),
    }
}

fn join(code: &str) -> JoinCampaignRequest {
    JoinCampaignRequest { code: code.to_string() }
}

async fn members(store: &MemoryStore, id: CampaignId) -> BTreeSet<PlayerId> {
    CampaignRepository::find_by_id(store, &store.autocommit(), id)
        .await
        .unwrap()
        .unwrap()
        .members()
        .clone()
}

#[tokio::test]
async fn test_end_to_end_lifecycle() {
    let store = Arc::new(MemoryStore::new());
    let campaigns = use_case(&store);

    let created = campaigns.create_campaign(strahd(), MASTER).await.unwrap();
    assert_eq!(created.status, CampaignStatus::Created);
    assert_eq!(created.master_id, MASTER);
    assert_eq!(created.access_code.len(), 6);
    assert!(created
        .access_code
        .chars()
        .all(|c| c.is_ascii_hexdigit() && !c.is_ascii_lowercase()));
    assert_eq!(members(&store, created.id).await, BTreeSet::from([MASTER]));

    let joined = campaigns
        .join_campaign(created.id, GUEST, join(&created.access_code))
        .await
        .unwrap();
    assert_eq!(joined.status, CampaignStatus::Created);
    assert_eq!(members(&store, created.id).await, BTreeSet::from([MASTER, GUEST]));

    let started = campaigns.start_campaign(created.id, MASTER).await.unwrap();
    assert_eq!(started.status, CampaignStatus::Started);

    let finished = campaigns.finish_campaign(created.id, MASTER).await.unwrap();
    assert_eq!(finished.status, CampaignStatus::Finished);

    let again = campaigns.finish_campaign(created.id, MASTER).await;
    assert!(matches!(again, Err(CampaignError::CampaignFinished)));

    let listed = campaigns.search_campaigns().await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].status, CampaignStatus::Finished);
    assert_eq!(listed[0].number_players, 1);
}

#[tokio::test]
async fn test_access_code_is_normalized() {
    let store = Arc::new(MemoryStore::new());
    let campaigns = use_case(&store);
    let created = campaigns.create_campaign(strahd(), MASTER).await.unwrap();

    let submitted = format!("  {}\t", created.access_code.to_lowercase());
    campaigns.join_campaign(created.id, GUEST, join(&submitted)).await.unwrap();

    assert!(members(&store, created.id).await.contains(&GUEST));
}

#[tokio::test]
async fn test_wrong_access_code_leaves_membership_unchanged() {
    let store = Arc::new(MemoryStore::new());
    let campaigns = use_case(&store);
    let created = campaigns.create_campaign(strahd(), MASTER).await.unwrap();

    // Seven characters can never equal a six-character code
    let result = campaigns.join_campaign(created.id, GUEST, join("ZZZZZZZ")).await;

    assert!(matches!(result, Err(CampaignError::WrongAccessCode)));
    assert_eq!(members(&store, created.id).await, BTreeSet::from([MASTER]));
}

#[tokio::test]
async fn test_code_differing_in_one_character_is_rejected() {
    let store = Arc::new(MemoryStore::new());
    let campaigns = use_case(&store);
    let created = campaigns.create_campaign(strahd(), MASTER).await.unwrap();

    let mut near_miss = created.access_code.clone();
    let last = if near_miss.ends_with('A') { 'B' } else { 'A' };
    near_miss.pop();
    near_miss.push(last);
    assert_eq!(near_miss.len(), 6);
    assert_ne!(near_miss, created.access_code);

    let result = campaigns.join_campaign(created.id, GUEST, join(&near_miss)).await;

    assert!(matches!(result, Err(CampaignError::WrongAccessCode)));
    assert_eq!(members(&store, created.id).await, BTreeSet::from([MASTER]));
}

#[tokio::test]
async fn test_join_unknown_campaign() {
    let store = Arc::new(MemoryStore::new());
    let campaigns = use_case(&store);

    let result = campaigns.join_campaign(CampaignId(404), GUEST, join("ABCDEF")).await;

    assert!(matches!(result, Err(CampaignError::CampaignNotFound)));
}

#[tokio::test]
async fn test_joining_twice_is_rejected() {
    let store = Arc::new(MemoryStore::new());
    let campaigns = use_case(&store);
    let created = campaigns.create_campaign(strahd(), MASTER).await.unwrap();

    campaigns
        .join_campaign(created.id, GUEST, join(&created.access_code))
        .await
        .unwrap();
    let second = campaigns
        .join_campaign(created.id, GUEST, join(&created.access_code))
        .await;

    assert!(matches!(second, Err(CampaignError::PlayerAlreadyInCampaign)));
    assert_eq!(members(&store, created.id).await, BTreeSet::from([MASTER, GUEST]));
}

#[tokio::test]
async fn test_start_needs_a_second_member() {
    let store = Arc::new(MemoryStore::new());
    let campaigns = use_case(&store);
    let created = campaigns.create_campaign(strahd(), MASTER).await.unwrap();

    let early = campaigns.start_campaign(created.id, MASTER).await;
    assert!(matches!(early, Err(CampaignError::NotEnoughPlayers)));

    campaigns
        .join_campaign(created.id, GUEST, join(&created.access_code))
        .await
        .unwrap();
    let started = campaigns.start_campaign(created.id, MASTER).await.unwrap();
    assert_eq!(started.status, CampaignStatus::Started);
}

#[tokio::test]
async fn test_repeated_start_keeps_timestamp() {
    let store = Arc::new(MemoryStore::new());
    let campaigns = use_case(&store);
    let created = campaigns.create_campaign(strahd(), MASTER).await.unwrap();
    campaigns
        .join_campaign(created.id, GUEST, join(&created.access_code))
        .await
        .unwrap();

    let first = campaigns.start_campaign(created.id, MASTER).await.unwrap();
    let second = campaigns.start_campaign(created.id, MASTER).await.unwrap();

    assert_eq!(second.status, CampaignStatus::Started);
    assert_eq!(first.started_at, second.started_at);
}

#[tokio::test]
async fn test_concurrent_start_and_cancel_pick_one_outcome() {
    let store = Arc::new(MemoryStore::new());
    let campaigns = Arc::new(use_case(&store));
    let created = campaigns.create_campaign(strahd(), MASTER).await.unwrap();
    campaigns
        .join_campaign(created.id, GUEST, join(&created.access_code))
        .await
        .unwrap();
    let id = created.id;

    let start = {
        let campaigns = campaigns.clone();
        tokio::spawn(async move { campaigns.start_campaign(id, MASTER).await })
    };
    let cancel = {
        let campaigns = campaigns.clone();
        tokio::spawn(async move { campaigns.cancel_campaign(id, MASTER).await })
    };
    let (start, cancel) = (start.await.unwrap(), cancel.await.unwrap());

    assert_ne!(start.is_ok(), cancel.is_ok());
    let stored = CampaignRepository::find_by_id(&*store, &store.autocommit(), id)
        .await
        .unwrap()
        .unwrap();
    match stored.status() {
        CampaignStatus::Started => {
            assert!(matches!(cancel, Err(CampaignError::CampaignAlreadyStarted)));
            assert!(stored.started_at().is_some());
        }
        CampaignStatus::Cancelled => {
            assert!(matches!(start, Err(CampaignError::CampaignCancelled)));
            assert!(stored.started_at().is_none());
        }
        other => panic!("unexpected status {other:?}"),
    }
}

#[tokio::test]
async fn test_only_master_drives_lifecycle() {
    let store = Arc::new(MemoryStore::new());
    let campaigns = use_case(&store);
    let created = campaigns.create_campaign(strahd(), MASTER).await.unwrap();

    let result = campaigns.cancel_campaign(created.id, GUEST).await;
    assert!(matches!(result, Err(CampaignError::NotCampaignMaster)));

    let cancelled = campaigns.cancel_campaign(created.id, MASTER).await.unwrap();
    assert_eq!(cancelled.status, CampaignStatus::Cancelled);

    let join_after = campaigns
        .join_campaign(created.id, GUEST, join(&created.access_code))
        .await;
    assert!(matches!(join_after, Err(CampaignError::CampaignCancelled)));
}

#[tokio::test]
async fn test_invalid_campaign_is_never_stored() {
    let store = Arc::new(MemoryStore::new());
    let campaigns = use_case(&store);

    let result = campaigns
        .create_campaign(
            CreateCampaignRequest {
                name: "x".repeat(51),
                description: String::new(),
            },
            MASTER,
        )
        .await;

    assert!(matches!(result, Err(CampaignError::InvalidName { .. })));
    assert_eq!(store.campaign_count(), 0);
}

#[tokio::test]
async fn test_failed_commit_on_create() {
    let store = Arc::new(MemoryStore::new());
    let campaigns = use_case(&store);
    store.fail_next_commit();

    let result = campaigns.create_campaign(strahd(), MASTER).await;

    assert!(matches!(result, Err(CampaignError::CommitFailed)));
    assert_eq!(store.campaign_count(), 0);
}

#[tokio::test]
async fn test_search_reports_joinability_and_player_count() {
    let store = Arc::new(MemoryStore::new());
    let campaigns = use_case(&store);
    let first = campaigns.create_campaign(strahd(), MASTER).await.unwrap();
    let second = campaigns
        .create_campaign(
            CreateCampaignRequest {
                name: "Tomb of Annihilation".to_string(),
                description: String::new(),
            },
            PlayerId(11),
        )
        .await
        .unwrap();
    campaigns
        .join_campaign(first.id, GUEST, join(&first.access_code))
        .await
        .unwrap();

    let listed = campaigns.search_campaigns().await.unwrap();

    let ids: Vec<CampaignId> = listed.iter().map(|c| c.id).collect();
    assert_eq!(ids, vec![first.id, second.id]);
    assert_eq!(listed[0].number_players, 1);
    assert_eq!(listed[1].number_players, 0);
    assert!(listed.iter().all(|c| c.can_be_joined));
}

#[tokio::test]
async fn test_transitions_are_counted() {
    let metrics = Arc::new(Metrics::new().unwrap());
    let store = Arc::new(MemoryStore::new());
    let campaigns = use_case(&store).with_metrics(metrics.clone());
    let created = campaigns.create_campaign(strahd(), MASTER).await.unwrap();
    campaigns
        .join_campaign(created.id, GUEST, join(&created.access_code))
        .await
        .unwrap();

    campaigns.start_campaign(created.id, MASTER).await.unwrap();
    campaigns.start_campaign(created.id, MASTER).await.unwrap();

    let starts = metrics
        .campaign_transitions_total
        .with_label_values(&["start"])
        .get();
    assert_eq!(starts, 1);
}
