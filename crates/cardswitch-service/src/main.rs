use cardswitch_adapters::{
    InMemoryAuthorizationStore, InMemoryCardStore, InMemoryHoldStore, InMemoryLedgerStore,
    InMemoryMappingStore, InMemoryPipelineStore, InMemoryProcessorMappingStore, PostgresStore,
    ShadowJournalAdapter,
};
use cardswitch_core::{
    AuthorizationPipeline, AuthorizationStore, BankAccountAdapter, CardStore, DailySpendLimitRule,
    InboundProcessorAdapter, LedgerStore, MappingStore, MccBlockingRule, PipelineUnitOfWork,
    ProcessorMappingStore, Rule, RulesConfig, RulesEngine, SettlementPipeline, TransactionLimitRule,
    VelocityRule,
};
use cardswitch_service::{build_router, ServiceState};
use clap::{Parser, ValueEnum};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::info;

#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq)]
enum StorageMode {
    Memory,
    Postgres,
}

#[derive(Debug, Parser)]
#[command(name = "cardswitch-service", version, about = "Card orchestration core REST service")]
struct Cli {
    /// HTTP socket address to bind, e.g. 127.0.0.1:8080.
    #[arg(long, default_value = "127.0.0.1:8080", env = "SERVICE_LISTEN")]
    listen: SocketAddr,

    /// Persistence backend for all stores.
    #[arg(long, value_enum, default_value_t = StorageMode::Memory, env = "STORAGE_MODE")]
    storage_mode: StorageMode,

    /// PostgreSQL connection url, required when storage-mode=postgres.
    #[arg(long, env = "STORAGE_DATABASE_URL")]
    storage_database_url: Option<String>,

    /// Max PostgreSQL pool connections.
    #[arg(long, default_value_t = 10, env = "STORAGE_MAX_CONNECTIONS")]
    storage_max_connections: u32,

    /// CBS adapter to bind. Only "shadow-journal" (the reference adapter) is
    /// available in this build.
    #[arg(long, default_value = "shadow-journal", env = "BANK_ADAPTER")]
    bank_adapter: String,

    /// Name the inbound processor webhook routes answer to.
    #[arg(long, default_value = "default", env = "PROCESSOR_ACTIVE")]
    processor_active: String,

    /// Per-transaction cap applied by the transaction-limit rule, in the
    /// request's own currency's minor units as a decimal string.
    #[arg(long, default_value = "1000.00", env = "RULES_TRANSACTION_LIMIT")]
    rules_transaction_limit: String,

    /// Daily cumulative cap applied by the daily-spend-limit rule.
    #[arg(long, default_value = "5000.00", env = "RULES_DAILY_LIMIT")]
    rules_daily_limit: String,

    /// Authorizations per rolling 60s window before the velocity rule declines.
    #[arg(long, default_value_t = 5, env = "RULES_VELOCITY_MAX_PER_MINUTE")]
    rules_velocity_max_per_minute: u64,

    /// Comma-separated merchant category codes blocked outright.
    #[arg(long, default_value = "7995,6211", env = "RULES_MCC_BLOCKLIST")]
    rules_mcc_blocklist: String,

    /// tracing filter directive, e.g. "cardswitch_service=debug,info".
    #[arg(long, default_value = "cardswitch_service=info,cardswitch_core=info,info", env = "LOG_FILTER")]
    log_filter: String,
}

struct Stores {
    cards: Arc<dyn CardStore>,
    mappings: Arc<dyn MappingStore>,
    authorizations: Arc<dyn AuthorizationStore>,
    ledger: Arc<dyn LedgerStore>,
    unit_of_work: Arc<dyn PipelineUnitOfWork>,
    holds: Arc<dyn cardswitch_core::HoldStore>,
    processor_mappings: Arc<dyn ProcessorMappingStore>,
}

async fn bootstrap_stores(cli: &Cli) -> anyhow::Result<Stores> {
    match cli.storage_mode {
        StorageMode::Memory => {
            let authorizations = Arc::new(InMemoryAuthorizationStore::new());
            let ledger = Arc::new(InMemoryLedgerStore::new());
            let unit_of_work = Arc::new(InMemoryPipelineStore::new(authorizations.clone(), ledger.clone()));
            Ok(Stores {
                cards: Arc::new(InMemoryCardStore::new()),
                mappings: Arc::new(InMemoryMappingStore::new()),
                authorizations,
                ledger,
                unit_of_work,
                holds: Arc::new(InMemoryHoldStore::new()),
                processor_mappings: Arc::new(InMemoryProcessorMappingStore::new()),
            })
        }
        StorageMode::Postgres => {
            let database_url = cli
                .storage_database_url
                .clone()
                .ok_or_else(|| anyhow::anyhow!("storage-mode=postgres requires --storage-database-url"))?;
            let store = PostgresStore::connect(&database_url, cli.storage_max_connections).await?;
            store.ensure_schema().await?;
            let store = Arc::new(store);
            Ok(Stores {
                cards: store.clone(),
                mappings: store.clone(),
                authorizations: store.clone(),
                ledger: store.clone(),
                unit_of_work: store.clone(),
                holds: store.clone(),
                processor_mappings: store,
            })
        }
    }
}

fn build_bank_adapter(cli: &Cli, holds: Arc<dyn cardswitch_core::HoldStore>) -> anyhow::Result<Arc<dyn BankAccountAdapter>> {
    match cli.bank_adapter.as_str() {
        "shadow-journal" => Ok(Arc::new(ShadowJournalAdapter::new(holds))),
        other => Err(anyhow::anyhow!("unknown bank adapter '{other}'")),
    }
}

fn build_rules_engine(cli: &Cli, authorizations: Arc<dyn AuthorizationStore>) -> RulesEngine {
    let config = RulesConfig {
        transaction_limit_default: cli
            .rules_transaction_limit
            .parse()
            .expect("RULES_TRANSACTION_LIMIT must be a valid decimal"),
        daily_limit_default: cli
            .rules_daily_limit
            .parse()
            .expect("RULES_DAILY_LIMIT must be a valid decimal"),
        velocity_max_per_minute: cli.rules_velocity_max_per_minute,
        mcc_blocklist: cli
            .rules_mcc_blocklist
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect(),
    };

    let currency = cardswitch_core::Currency::Usd;
    let rules: Vec<Arc<dyn Rule>> = vec![
        Arc::new(TransactionLimitRule::new(config.transaction_limit(currency))),
        Arc::new(DailySpendLimitRule::new(config.daily_limit(currency), authorizations.clone())),
        Arc::new(MccBlockingRule::new(config.mcc_blocklist.clone())),
        Arc::new(VelocityRule::new(config.velocity_max_per_minute, authorizations)),
    ];
    RulesEngine::new(rules)
}

async fn bootstrap(cli: &Cli) -> anyhow::Result<ServiceState> {
    let stores = bootstrap_stores(cli).await?;
    let adapter = build_bank_adapter(cli, stores.holds.clone())?;
    let rules = build_rules_engine(cli, stores.authorizations.clone());

    let authorize = Arc::new(AuthorizationPipeline::new(
        stores.cards.clone(),
        stores.mappings.clone(),
        stores.authorizations.clone(),
        stores.unit_of_work.clone(),
        rules,
        adapter.clone(),
    ));
    let settle = Arc::new(SettlementPipeline::new(
        stores.authorizations.clone(),
        stores.ledger.clone(),
        stores.unit_of_work.clone(),
        adapter.clone(),
    ));
    let processors = vec![InboundProcessorAdapter::new(
        cli.processor_active.clone(),
        authorize.clone(),
        settle.clone(),
        stores.processor_mappings,
    )];

    Ok(ServiceState {
        cards: stores.cards,
        ledger: stores.ledger,
        adapter,
        authorize,
        settle,
        processors: Arc::new(processors),
    })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(std::env::var("RUST_LOG").unwrap_or_else(|_| cli.log_filter.clone()))
        .init();

    let state = bootstrap(&cli).await?;
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(cli.listen).await?;
    info!("cardswitch-service listening on {}", listener.local_addr()?);
    axum::serve(listener, app).await?;

    Ok(())
}
