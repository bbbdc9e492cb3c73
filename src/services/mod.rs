//! Domain producers for CapyServices.
//!
//! Each service owns one collection of the store and is its only writer.
//! Services spawn their own background thread; a failing service logs and
//! leaves its collection empty.
//!
//! - `apps` - installed applications from .desktop files
//! - `icons` - icon resolver and installed icon themes
//! - `power` - power devices via UPower D-Bus

pub mod apps;
pub mod icons;
pub mod power;

use crate::config::Config;
use capy_resources::ResourceStore;
use icons::IconService;
use log::{info, warn};
use std::sync::Arc;

/// Handles of started services. Dropping them stops the watchers.
pub struct Services {
    pub icons: Option<IconService>,
    pub has_power: bool,
    _apps: Option<apps::AppsHandle>,
}

/// Start all domain services.
/// Call this once from main after the store exists.
pub fn start_all(config: &Config, store: &Arc<ResourceStore>) -> Services {
    info!("Starting services...");

    let icons = match IconService::start(store, config.icon_config()) {
        Ok(service) => Some(service),
        Err(e) => {
            warn!("Icon service failed to start: {}", e);
            None
        }
    };

    let apps = if config.applications {
        apps::start_indexing(store)
    } else {
        info!("Application catalog disabled");
        None
    };

    let has_power = config.power && power::start_monitor(store);

    Services {
        icons,
        has_power,
        _apps: apps,
    }
}
