//! Catalog Sync demo
//!
//! Drives a scripted browsing session against the bundled catalog on the
//! logical clock and logs each transition.

use std::rc::Rc;

use anyhow::Context as _;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use catalog_sync::models::{PlatformId, SortKey};
use catalog_sync::query_params::MemoryNavigator;
use catalog_sync::storage::{FileStorage, MemoryStorage, Storage};
use catalog_sync::{AppContext, Config, InMemoryCatalog};

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    // Defaults to "catalog_sync=info", can be overridden with RUST_LOG
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "catalog_sync=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env();
    info!(
        cache_ttl_ms = config.cache_ttl_ms,
        sweep_interval_ms = config.sweep_interval_ms,
        page_limit = config.page_limit,
        "Configuration loaded"
    );

    let storage: Rc<dyn Storage> = match &config.storage_path {
        Some(path) => Rc::new(FileStorage::open(path)),
        None => Rc::new(MemoryStorage::new()),
    };
    let catalog = InMemoryCatalog::seeded().context("loading bundled catalog")?;
    let navigator = MemoryNavigator::new("?sort=popularity&limit=5");

    let debounce = config.search_debounce_ms;
    let ctx = AppContext::new(config, catalog, navigator, storage);
    ctx.start();
    ctx.dispatch().await;
    report(&ctx, "initial load");

    for prefix in ["e", "em", "emb", "ember"] {
        ctx.type_query(prefix);
        ctx.tick(debounce / 3).await;
    }
    ctx.tick(debounce).await;
    report(&ctx, "typed query");

    ctx.submit_query("northlight");
    ctx.with_session(|s| {
        s.toggle_platform(PlatformId::Steam);
        s.set_sort(SortKey::Rarity);
    });
    ctx.settle().await;
    report(&ctx, "filtered");

    ctx.navigate(|nav| nav.back());
    ctx.settle().await;
    report(&ctx, "back");

    let game = ctx.open_game("hollow-depths").await?;
    info!(
        game = %game.title,
        unlocked = game.unlocked_count,
        completion = game.completion_rate,
        "Opened game"
    );
    let unlocked = ctx.toggle_achievement("hollow-depths", "hd-grubs")?;
    let stats = ctx.games().cache().borrow_mut().stats("hollow-depths");
    info!(unlocked, ?stats, "Toggled achievement");

    info!(
        history = ?ctx.session().history().entries(),
        recent = ?ctx.preferences().recent,
        page_cache = ?ctx.page_cache_stats(),
        "Session finished"
    );
    Ok(())
}

fn report(ctx: &AppContext<InMemoryCatalog, MemoryNavigator>, step: &str) {
    let session = ctx.session();
    let titles: Vec<&str> = session.results().iter().map(|g| g.title.as_str()).collect();
    info!(
        step,
        location = %ctx.location(),
        status = ?session.status(),
        total = session.total(),
        ?titles,
        "Search state"
    );
}
