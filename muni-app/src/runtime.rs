use crate::state::AppState;
use muni_core::{FinanceState, Session};
use serde_json::json;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::debug;

pub trait EventSink: Send + Sync + 'static {
    fn emit_json(&self, event: &str, payload: serde_json::Value);
}

pub struct NoopSink;

impl EventSink for NoopSink {
    fn emit_json(&self, _event: &str, _payload: serde_json::Value) {}
}

pub fn start(state: &AppState) -> JoinHandle<()> {
    start_with_sink(state, NoopSink)
}

pub fn start_with_sink(state: &AppState, sink: impl EventSink) -> JoinHandle<()> {
    tokio::spawn(watch_stores(
        state.auth.subscribe(),
        state.finance.subscribe(),
        sink,
    ))
}

/// Forwards store changes to `sink` until either store is dropped.
pub async fn watch_stores(
    mut session: watch::Receiver<Session>,
    mut finance: watch::Receiver<FinanceState>,
    sink: impl EventSink,
) {
    let mut last = finance.borrow_and_update().clone();
    session.borrow_and_update();

    loop {
        tokio::select! {
            changed = session.changed() => {
                if changed.is_err() {
                    break;
                }
                let current = session.borrow_and_update().clone();
                sink.emit_json(
                    "session-changed",
                    json!({
                        "is_authenticated": current.is_authenticated,
                        "user_id": current.user.map(|u| u.id),
                    }),
                );
            }
            changed = finance.changed() => {
                if changed.is_err() {
                    break;
                }
                let next = finance.borrow_and_update().clone();
                emit_finance_updates(&last, &next, &sink);
                last = next;
            }
        }
    }
    debug!("store watcher stopped");
}

fn emit_finance_updates(prev: &FinanceState, next: &FinanceState, sink: &impl EventSink) {
    if prev.selected_state != next.selected_state
        || prev.municipal_boundaries != next.municipal_boundaries
    {
        sink.emit_json(
            "boundaries-loaded",
            json!({
                "region": next.selected_state.as_ref().map(|r| r.abbr.clone()),
                "feature_count": next.municipal_boundaries.as_ref().map(|b| b.features.len()),
            }),
        );
    }

    if prev.selected_finances != next.selected_finances
        || prev.selected_feature != next.selected_feature
    {
        sink.emit_json(
            "municipality-selected",
            json!({
                "feature_id": next.selected_feature.as_ref().map(|f| f.id),
                "years": next
                    .selected_finances
                    .as_ref()
                    .map(|records| records.iter().map(|r| r.year).collect::<Vec<_>>()),
            }),
        );
    }

    if prev.search_query != next.search_query {
        sink.emit_json("search-changed", json!({ "query": next.search_query }));
    }
}
