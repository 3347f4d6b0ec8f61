//! `charfeed-agent` -- interactive character feed daemon.
//!
//! Loads the character catalog from the backend, keeps it fresh (periodic
//! polling plus debounced invalidation events) and serves the filtered,
//! paged feed to stdin commands. Type `help` for the command list.
//!
//! # Environment variables
//!
//! See `ApiConfig::from_env` and `FeedConfig::from_env` for the full list.
//! The most common ones:
//!
//! | Variable                      | Default                 | Description                     |
//! |-------------------------------|-------------------------|---------------------------------|
//! | `CHARFEED_API_ORIGIN`         | `http://localhost:8000` | Backend origin                  |
//! | `CHARFEED_POLL_INTERVAL_SECS` | `30`                    | Reload period, `0` disables     |
//! | `CHARFEED_CONTENT_MODE`       | `safe`                  | Initial content mode            |
//! | `CHARFEED_ACCESS_TOKEN`       | --                      | Bearer token for rating lookups |

use std::sync::Arc;

use anyhow::Context;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use charfeed_agent::command::{Command, HELP};
use charfeed_client::{ApiConfig, AuthSession, CatalogApi};
use charfeed_core::cache::Page;
use charfeed_core::character::Character;
use charfeed_events::{run_invalidation_listener, CatalogEvent, EventBus, InvalidationReason};
use charfeed_feed::{run_poller, FeedConfig, FeedService, LoadOutcome};

type Feed = FeedService<CatalogApi>;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| {
                    "charfeed_agent=info,charfeed_feed=info,charfeed_client=info".into()
                }),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let api_config = ApiConfig::from_env().context("invalid API configuration")?;
    let feed_config = FeedConfig::from_env().context("invalid feed configuration")?;

    tracing::info!(
        origin = %api_config.origin,
        base_url = %api_config.base_url,
        mode = %feed_config.content_mode,
        page_size = feed_config.page_size,
        "Starting charfeed-agent",
    );

    let resolver = api_config.photo_resolver();
    let mut api = CatalogApi::new(api_config).context("failed to build HTTP client")?;
    if let Some(session) = AuthSession::from_env() {
        tracing::info!("Using access token from environment");
        api = api.with_session(Arc::new(session));
    }
    let api = Arc::new(api);

    let poll_interval = feed_config.poll_interval;
    let feed = Arc::new(FeedService::new(api.clone(), resolver, feed_config));
    let bus = Arc::new(EventBus::default());
    let cancel = CancellationToken::new();

    let listener = tokio::spawn(run_invalidation_listener(
        bus.subscribe(),
        feed.clone(),
        cancel.clone(),
    ));
    let poller = poll_interval.map(|period| tokio::spawn(run_poller(feed.clone(), period, cancel.clone())));

    let mut updates = feed.subscribe();
    let update_log = tokio::spawn({
        let cancel = cancel.clone();
        async move {
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    update = updates.recv() => match update {
                        Ok(update) => match serde_json::to_string(&update) {
                            Ok(json) => tracing::debug!(update = %json, "Feed update"),
                            Err(e) => tracing::warn!(error = %e, "Unserializable feed update"),
                        },
                        Err(tokio::sync::broadcast::error::RecvError::Lagged(missed)) => {
                            tracing::debug!(missed, "Feed update log lagged");
                        }
                        Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                    },
                }
            }
        }
    });

    match feed.load().await {
        Ok(LoadOutcome::Loaded(page)) => print_page(&page),
        Ok(_) => {}
        Err(e) => tracing::warn!(error = %e, "Initial catalog load failed"),
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Interrupted");
                break;
            }
            line = lines.next_line() => {
                let Some(line) = line.context("failed to read stdin")? else {
                    break;
                };
                match Command::parse(&line) {
                    Ok(Some(Command::Quit)) => break,
                    Ok(Some(command)) => execute(command, &feed, &api, &bus).await,
                    Ok(None) => {}
                    Err(e) => println!("{e}; type `help` for commands"),
                }
            }
        }
    }

    cancel.cancel();
    listener.await.context("invalidation listener panicked")?;
    if let Some(poller) = poller {
        poller.await.context("poller panicked")?;
    }
    update_log.await.context("update log panicked")?;
    tracing::info!("charfeed-agent stopped");
    Ok(())
}

async fn execute(command: Command, feed: &Feed, api: &CatalogApi, bus: &EventBus) {
    match command {
        Command::Show => {
            let snapshot = feed.snapshot().await;
            println!(
                "[{} | tags: {}] {}/{} shown{}",
                snapshot.mode,
                if snapshot.tags.is_empty() {
                    "-".to_string()
                } else {
                    snapshot.tags.join(",")
                },
                snapshot.items.len(),
                snapshot.total,
                if snapshot.is_loading { " (loading)" } else { "" },
            );
            print_characters(&snapshot.items);
        }
        Command::More => match feed.load_more().await {
            Some(page) => print_page(&page),
            None => println!("nothing more to show"),
        },
        Command::Mode(mode) => match feed.set_content_mode(mode).await {
            Ok(LoadOutcome::Loaded(page)) => print_page(&page),
            Ok(_) => {}
            Err(e) => println!("load failed: {e}"),
        },
        Command::Tags(tags) => print_page(&feed.set_selected_tags(tags).await),
        Command::AvailableTags => match api.fetch_available_tags().await {
            Ok(tags) => {
                for tag in tags {
                    println!("  {} ({})", tag.label("en"), tag.slug);
                }
            }
            Err(e) => println!("could not load tags: {e}"),
        },
        Command::Refresh => match feed.refresh(InvalidationReason::Manual).await {
            Ok(LoadOutcome::Loaded(page)) => print_page(&page),
            Ok(LoadOutcome::Coalesced) => println!("refresh already running; queued"),
            Ok(LoadOutcome::Superseded) => {}
            Err(e) => println!("refresh failed: {e}"),
        },
        Command::Ratings => {
            let updated = feed.refresh_ratings().await;
            println!("ratings updated for {updated} characters");
        }
        Command::Publish { kind, character_id } => {
            let mut event = CatalogEvent::new(kind);
            if let Some(id) = character_id {
                event = event.with_character(id);
            }
            bus.publish(event);
            println!("published {kind}; refresh in {}ms", kind.debounce_delay().as_millis());
        }
        Command::Help => println!("{HELP}"),
        Command::Quit => {}
    }
}

fn print_page(page: &Page) {
    print_characters(&page.items);
    println!(
        "-- {}/{} revealed{}",
        page.revealed,
        page.total,
        if page.has_more { ", `more` for next page" } else { "" },
    );
}

fn print_characters(items: &[Character]) {
    for c in items {
        println!(
            "  {} {:<24} #{:<6} likes {:<5} photos {}  {}",
            c.avatar,
            c.name,
            c.id,
            c.likes,
            c.photos.len(),
            c.tags.join(", "),
        );
    }
}
