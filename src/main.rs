use clap::Parser;
use std::sync::Arc;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use campaign_hub::auth::{Argon2PasswordHasher, JwtTokenService, PasswordHasher, TokenVerifier};
use campaign_hub::config::Settings;
use campaign_hub::db::memory::MemoryStore;
use campaign_hub::db::postgres::{
    self, PgAccountRepository, PgCampaignRepository, PgPlayerRepository, PgTransactor,
};
use campaign_hub::db::Transactor;
use campaign_hub::domain::account::{
    AccountRegistration, AccountRepository, Login, LoginRequest, RegistrationRequest,
};
use campaign_hub::domain::campaign::{
    CampaignRepository, CampaignUseCase, CreateCampaignRequest, JoinCampaignRequest,
};
use campaign_hub::domain::player::PlayerRepository;
use campaign_hub::metrics::Metrics;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Default to INFO level, can be overridden with RUST_LOG env var
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_thread_ids(true))
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,campaign_hub=debug")),
        )
        .init();

    let settings = Settings::parse();
    settings.validate()?;

    tracing::info!("🚀 Starting campaign hub demo");

    let metrics = Arc::new(Metrics::new()?);
    let tokens = Arc::new(JwtTokenService::new(
        settings.jwt_secret.as_bytes(),
        settings.jwt_issuer.clone(),
        settings.token_lifetime(),
    ));
    let hasher: Arc<dyn PasswordHasher> = Arc::new(Argon2PasswordHasher::default());

    match &settings.database_url {
        Some(url) => {
            let pool = postgres::connect(url, settings.database_max_connections).await?;
            postgres::migrate(&pool, &settings.migrations_dir).await?;

            let transactor = Arc::new(PgTransactor::new(pool).with_metrics(metrics.clone()));
            run_demo(
                transactor,
                Arc::new(PgAccountRepository),
                Arc::new(PgPlayerRepository),
                Arc::new(PgCampaignRepository),
                hasher,
                tokens,
                metrics.clone(),
            )
            .await?;
        }
        None => {
            tracing::info!("DATABASE_URL not set, using the in-memory store");
            let store = Arc::new(MemoryStore::new().with_metrics(metrics.clone()));
            run_demo(
                store.clone(),
                store.clone(),
                store.clone(),
                store,
                hasher,
                tokens,
                metrics.clone(),
            )
            .await?;
        }
    }

    tracing::info!(
        metric_families = metrics.registry().gather().len(),
        "🎉 Demo complete"
    );
    Ok(())
}

/// Registers a master and a guest, then walks a campaign through its lifecycle
async fn run_demo<T: Transactor>(
    transactor: Arc<T>,
    accounts: Arc<dyn AccountRepository<T::Scope>>,
    players: Arc<dyn PlayerRepository<T::Scope>>,
    campaigns: Arc<dyn CampaignRepository<T::Scope>>,
    hasher: Arc<dyn PasswordHasher>,
    tokens: Arc<JwtTokenService>,
    metrics: Arc<Metrics>,
) -> anyhow::Result<()> {
    let registration = AccountRegistration::new(
        transactor.clone(),
        accounts.clone(),
        players.clone(),
        hasher.clone(),
        tokens.clone(),
    )
    .with_metrics(metrics.clone());
    let login = Login::new(transactor.clone(), accounts, players, hasher, tokens.clone());
    let use_case = CampaignUseCase::new(transactor, campaigns).with_metrics(metrics);

    // Suffix keeps reruns against the same database from colliding
    let run = uuid::Uuid::new_v4().simple().to_string();
    let password = "roll-for-initiative".to_string();

    let master = registration
        .register(RegistrationRequest {
            username: format!("master_{}", &run[..8]),
            password: password.clone(),
            email: Some("Master@Example.com".to_string()),
        })
        .await?;
    tracing::info!(
        account_id = %master.response.account_id,
        player = %master.response.player.name,
        "✅ Master registered"
    );

    let guest = registration
        .register(RegistrationRequest {
            username: format!("guest_{}", &run[..8]),
            password: password.clone(),
            email: None,
        })
        .await?;
    tracing::info!(player = %guest.response.player.name, "✅ Guest registered");

    let session = login
        .login(LoginRequest {
            username: master.response.username.to_string(),
            password,
        })
        .await?;
    let claims = tokens.verify(&session.token)?;
    tracing::info!(player_id = %claims.player_id, "✅ Master logged in");

    let created = use_case
        .create_campaign(
            CreateCampaignRequest {
                name: "Curse of Strahd".to_string(),
                description: "gothic horror".to_string(),
            },
            claims.player_id,
        )
        .await?;
    tracing::info!(campaign_id = %created.id, status = %created.status, "✅ Campaign created");

    // Codes are matched after trimming and uppercasing
    let joined = use_case
        .join_campaign(
            created.id,
            guest.response.player.player_id,
            JoinCampaignRequest {
                code: format!(" {} ", created.access_code.to_lowercase()),
            },
        )
        .await?;
    tracing::info!(campaign_id = %joined.id, "✅ Guest joined");

    let started = use_case.start_campaign(created.id, claims.player_id).await?;
    tracing::info!(
        status = %started.status,
        players = started.number_players,
        "✅ Campaign started"
    );

    let finished = use_case.finish_campaign(created.id, claims.player_id).await?;
    tracing::info!(status = %finished.status, "✅ Campaign finished");

    if let Err(error) = use_case.finish_campaign(created.id, claims.player_id).await {
        tracing::info!(error = %error, kind = ?error.kind(), "Second finish rejected as expected");
    }

    for summary in use_case.search_campaigns().await? {
        tracing::info!(
            campaign_id = %summary.id,
            name = %summary.name,
            status = %summary.status,
            players = summary.number_players,
            can_be_joined = summary.can_be_joined,
            "Campaign listed"
        );
    }

    Ok(())
}
