pub mod commands;
pub mod runtime;
pub mod state;

use crate::state::AppState;
use muni_core::{
    ApiClient, AuthStore, ClientConfig, DesignerApi, FinanceStore, Route, RouteCell, SessionCell,
    SnapshotStore,
};
use std::sync::Arc;
use tracing::{info, warn};

pub fn build_state(config: ClientConfig) -> Result<AppState, String> {
    let snapshots = match SnapshotStore::open(&config.state_path) {
        Ok(store) => Some(store),
        Err(e) => {
            warn!(path = %config.state_path.display(), "local state unavailable, not persisting: {e}");
            None
        }
    };

    let routes = Arc::new(RouteCell::new(Route::Landing));
    let session = Arc::new(SessionCell::new(snapshots.clone(), routes.clone()));
    let client = ApiClient::new(&config, session).map_err(|e| e.to_string())?;

    Ok(AppState {
        auth: AuthStore::new(client.clone()),
        finance: FinanceStore::new(client.clone(), snapshots),
        designer: DesignerApi::new(client.clone()),
        client,
        routes,
        config,
    })
}

pub async fn run() -> Result<(), String> {
    let state = build_state(ClientConfig::load())?;
    let _watcher = runtime::start(&state);

    let session = commands::session(&state);
    info!(
        api = %state.config.base_url,
        authenticated = session.is_authenticated,
        "muni-app ready"
    );
    println!(
        "{}",
        serde_json::to_string_pretty(&session).map_err(|e| e.to_string())?
    );
    Ok(())
}

/// Walks the main flow against a live backend and prints what each page
/// would show.
pub async fn run_demo() -> Result<(), String> {
    let state = build_state(ClientConfig::load())?;
    let _watcher = runtime::start(&state);

    let email = std::env::var("MUNI_DEMO_EMAIL").unwrap_or_else(|_| "demo@example.com".into());
    let password = std::env::var("MUNI_DEMO_PASSWORD").unwrap_or_else(|_| "Demo#2025".into());

    let session = commands::login(&state, email, password).await?;
    print_json("session", &session)?;
    commands::home_init(&state).await?;

    let regions = commands::list_regions(&state).await?;
    print_json("regions", &regions)?;
    let Some(region) = regions.into_iter().next() else {
        return Ok(());
    };

    let municipalities = commands::select_region(&state, region).await?;
    print_json("municipalities", &municipalities)?;
    let Some(first) = municipalities.into_iter().next() else {
        return Ok(());
    };
    let Some(mid) = first.mid else {
        warn!(municipality = %first.name, "municipality has no financial records id");
        return Ok(());
    };

    let header = commands::select_municipality(&state, first.id, mid).await?;
    print_json("header", &header)?;
    print_json("data", &commands::municipality_data(&state)?)?;
    print_json("charts", &commands::municipality_charts(&state)?)?;
    Ok(())
}

fn print_json<T: serde::Serialize>(label: &str, value: &T) -> Result<(), String> {
    println!(
        "{label}:\n{}",
        serde_json::to_string_pretty(value).map_err(|e| e.to_string())?
    );
    Ok(())
}
