//! CapyServices - desktop session state as addressable resources
//!
//! One store, one change bus, one composition root. Domain services push
//! into the store; readers query the store, the icon resolver and search.

mod config;
mod search;
mod services;

use capy_resources::{ChangeBus, ResourceStore};
use config::Config;
use log::{error, info, warn};
use std::error::Error;
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    info!("Starting CapyServices...");

    let config = Config::load(&Config::default_path());

    let bus = ChangeBus::new();
    let store = Arc::new(ResourceStore::with_reserved(
        bus.clone(),
        config.reserved_paths.iter(),
    ));

    // Subscribe before any producer runs so the initial scans are logged too.
    let mut changes = bus.subscribe();

    let services = services::start_all(&config, &store);
    let aggregator = search::build_aggregator(&store, config.min_search_length);
    info!(
        "Services up: icons={}, power={}, search min length {}",
        services.icons.is_some(),
        services.has_power,
        aggregator.min_term_length()
    );

    if let Some(icons) = &services.icons {
        info!(
            "Icon search order: {}",
            icons.resolver.search_order().join(" -> ")
        );
    }

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Cannot listen for Ctrl-C: {}", e);
        }
    };
    tokio::pin!(shutdown);

    while let Some(event) = changes.next_until(&mut shutdown).await {
        if event.is_resync() {
            warn!("Change log fell behind, {} resources now", store.len());
            continue;
        }
        // Collection topics end with '/', resource topics do not.
        if event.topic.ends_with('/') {
            info!("{} ({} resources)", event.payload, store.get_by_prefix(&event.topic).len());
        }
    }

    info!("Shutting down");
    Ok(())
}
