use crate::error::ApiError;
use crate::http::{ApiClient, ApiRequest};
use crate::persist::SnapshotStore;
use crate::series::{derive_series, latest_record, ChartSeries};
use muni_schema::{
    filter_municipalities, municipality_list, parse_feature_collection, parse_finance_records,
    regions_from_states, BoundaryCollection, MunicipalFeature, MunicipalityFinance,
    MunicipalityListItem, RegionInfo,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info, warn};

pub const FINANCE_STORAGE_KEY: &str = "finance-storage";
pub const STATES_PATH: &str = "/financial/gis/states";
pub const MUNICIPALITIES_PATH: &str = "/financial/gis/municipalities";
pub const FINANCES_PATH: &str = "/financial/municipality/finances";
pub const SAMPLE_DATA_PATH: &str = "/financial/init-sample-data";

#[derive(Clone, Debug, Default, PartialEq)]
pub struct FinanceState {
    pub selected_state: Option<RegionInfo>,
    pub municipal_boundaries: Option<BoundaryCollection>,
    pub selected_finances: Option<Vec<MunicipalityFinance>>,
    pub selected_feature: Option<MunicipalFeature>,
    pub search_query: String,
}

/// Persisted subset of [`FinanceState`]. Boundaries are refetched, not stored.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct FinanceSnapshot {
    #[serde(default)]
    pub selected_state: Option<RegionInfo>,
    #[serde(default)]
    pub selected_finances: Option<Vec<MunicipalityFinance>>,
    #[serde(default)]
    pub selected_feature: Option<MunicipalFeature>,
    #[serde(default)]
    pub search_query: String,
}

impl From<&FinanceState> for FinanceSnapshot {
    fn from(state: &FinanceState) -> Self {
        Self {
            selected_state: state.selected_state.clone(),
            selected_finances: state.selected_finances.clone(),
            selected_feature: state.selected_feature.clone(),
            search_query: state.search_query.clone(),
        }
    }
}

impl From<FinanceSnapshot> for FinanceState {
    fn from(snapshot: FinanceSnapshot) -> Self {
        Self {
            selected_state: snapshot.selected_state,
            municipal_boundaries: None,
            selected_finances: snapshot.selected_finances,
            selected_feature: snapshot.selected_feature,
            search_query: snapshot.search_query,
        }
    }
}

/// Whether a completed fetch was written to the store.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Applied {
    Committed,
    /// A newer request of the same kind was issued while this one was in
    /// flight; its response was dropped.
    Superseded,
}

#[derive(Clone)]
pub struct FinanceStore {
    inner: Arc<FinanceInner>,
}

struct FinanceInner {
    client: ApiClient,
    state: watch::Sender<FinanceState>,
    snapshots: Option<SnapshotStore>,
    region_seq: AtomicU64,
    municipality_seq: AtomicU64,
}

impl FinanceStore {
    pub fn new(client: ApiClient, snapshots: Option<SnapshotStore>) -> Self {
        let restored = snapshots
            .as_ref()
            .map(|store| match store.load::<FinanceSnapshot>(FINANCE_STORAGE_KEY) {
                Ok(Some(snapshot)) => FinanceState::from(snapshot),
                Ok(None) => FinanceState::default(),
                Err(e) => {
                    warn!("ignoring unreadable finance snapshot: {e}");
                    FinanceState::default()
                }
            })
            .unwrap_or_default();

        let (state, _) = watch::channel(restored);
        Self {
            inner: Arc::new(FinanceInner {
                client,
                state,
                snapshots,
                region_seq: AtomicU64::new(0),
                municipality_seq: AtomicU64::new(0),
            }),
        }
    }

    pub fn snapshot(&self) -> FinanceState {
        self.inner.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<FinanceState> {
        self.inner.state.subscribe()
    }

    pub async fn fetch_regions(&self) -> Result<Vec<RegionInfo>, ApiError> {
        let payload = self
            .inner
            .client
            .get_json_value(ApiRequest::get(STATES_PATH))
            .await?;
        Ok(regions_from_states(&payload)?)
    }

    /// Seeds demo data on the backend. Safe to call repeatedly.
    pub async fn init_sample_data(&self) -> Result<Value, ApiError> {
        self.inner
            .client
            .send(&ApiRequest::post(SAMPLE_DATA_PATH))
            .await
    }

    /// Loads the region's municipality boundaries. On commit the previous
    /// municipality selection is cleared and any municipality fetch still in
    /// flight is invalidated.
    pub async fn set_selected_state(&self, region: RegionInfo) -> Result<Applied, ApiError> {
        let ticket = self.inner.region_seq.fetch_add(1, Ordering::SeqCst) + 1;
        let payload = self
            .inner
            .client
            .get_json_value(ApiRequest::get(MUNICIPALITIES_PATH).query("state", &region.abbr))
            .await?;
        let boundaries = parse_feature_collection(&payload)?;

        info!(
            region = %region.abbr,
            features = boundaries.features.len(),
            "boundaries loaded"
        );
        Ok(self.apply_region(ticket, region, boundaries))
    }

    /// Loads the municipality's yearly records and pairs them with its
    /// feature from the boundaries current at commit time. A feature missing
    /// from those boundaries leaves `selected_feature` empty.
    pub async fn set_selected_municipality(
        &self,
        feature_id: i64,
        mid: &str,
    ) -> Result<Applied, ApiError> {
        let ticket = self.inner.municipality_seq.fetch_add(1, Ordering::SeqCst) + 1;
        let payload = self
            .inner
            .client
            .get_json_value(ApiRequest::get(FINANCES_PATH).query("mid", mid))
            .await?;
        let records = parse_finance_records(payload)?;

        let applied = self.apply_municipality(ticket, feature_id, records);
        if applied == Applied::Superseded {
            debug!(mid = %mid, "dropping superseded finance response");
        }
        Ok(applied)
    }

    /// Commits a region response if `ticket` is still the latest region
    /// request. The check and the write happen under the state lock.
    fn apply_region(
        &self,
        ticket: u64,
        region: RegionInfo,
        boundaries: BoundaryCollection,
    ) -> Applied {
        let committed = self.commit_if(|state| {
            if self.inner.region_seq.load(Ordering::SeqCst) != ticket {
                return false;
            }
            self.inner.municipality_seq.fetch_add(1, Ordering::SeqCst);
            state.selected_state = Some(region);
            state.municipal_boundaries = Some(boundaries);
            state.selected_finances = None;
            state.selected_feature = None;
            true
        });
        if committed {
            Applied::Committed
        } else {
            debug!("dropping superseded boundary response");
            Applied::Superseded
        }
    }

    fn apply_municipality(
        &self,
        ticket: u64,
        feature_id: i64,
        records: Vec<MunicipalityFinance>,
    ) -> Applied {
        let committed = self.commit_if(|state| {
            if self.inner.municipality_seq.load(Ordering::SeqCst) != ticket {
                return false;
            }
            let feature = state
                .municipal_boundaries
                .as_ref()
                .and_then(|b| b.find(feature_id))
                .cloned();
            if feature.is_none() {
                warn!(feature_id, "feature not in current boundaries");
            }
            state.selected_finances = Some(records);
            state.selected_feature = feature;
            true
        });
        if committed {
            Applied::Committed
        } else {
            Applied::Superseded
        }
    }

    pub fn set_search_query(&self, query: impl Into<String>) {
        let query = query.into();
        self.commit(|state| state.search_query = query);
    }

    pub fn latest_record(&self) -> Option<MunicipalityFinance> {
        let state = self.inner.state.borrow();
        state
            .selected_finances
            .as_deref()
            .and_then(latest_record)
            .cloned()
    }

    pub fn municipality_list(&self) -> Vec<MunicipalityListItem> {
        self.inner
            .state
            .borrow()
            .municipal_boundaries
            .as_ref()
            .map(municipality_list)
            .unwrap_or_default()
    }

    pub fn filtered_municipalities(&self) -> Vec<MunicipalityListItem> {
        let query = self.inner.state.borrow().search_query.clone();
        filter_municipalities(&self.municipality_list(), &query)
    }

    pub fn chart_series(&self) -> Option<ChartSeries> {
        let state = self.inner.state.borrow();
        state
            .selected_finances
            .as_deref()
            .filter(|records| !records.is_empty())
            .map(derive_series)
    }

    fn commit(&self, change: impl FnOnce(&mut FinanceState)) {
        self.commit_if(|state| {
            change(state);
            true
        });
    }

    /// Applies `change` under the state lock; persists and notifies only
    /// when it reports a modification.
    fn commit_if(&self, change: impl FnOnce(&mut FinanceState) -> bool) -> bool {
        let modified = self.inner.state.send_if_modified(change);
        if modified {
            self.persist();
        }
        modified
    }

    fn persist(&self) {
        let Some(store) = &self.inner.snapshots else {
            return;
        };
        let snapshot = FinanceSnapshot::from(&*self.inner.state.borrow());
        if let Err(e) = store.save(FINANCE_STORAGE_KEY, &snapshot) {
            warn!("failed to persist finance state: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ClientConfig;
    use crate::persist::temp_store;
    use crate::session::SessionCell;

    fn offline_store(snapshots: Option<SnapshotStore>) -> FinanceStore {
        let config = ClientConfig::default().with_base_url("http://127.0.0.1:9");
        let client = ApiClient::new(&config, Arc::new(SessionCell::ephemeral())).expect("client");
        FinanceStore::new(client, snapshots)
    }

    #[test]
    fn search_query_is_local_and_persisted() {
        let store_file = temp_store("finance-search");
        let store = offline_store(Some(store_file.clone()));
        let mut rx = store.subscribe();

        store.set_search_query("lack");
        assert!(rx.has_changed().expect("alive"));
        assert_eq!(rx.borrow_and_update().search_query, "lack");

        let restored = offline_store(Some(store_file));
        assert_eq!(restored.snapshot().search_query, "lack");
        assert!(restored.snapshot().municipal_boundaries.is_none());
    }

    fn region() -> RegionInfo {
        RegionInfo {
            name: "New York".into(),
            abbr: "NY".into(),
            code: "36".into(),
        }
    }

    fn boundaries(ids: &[i64]) -> BoundaryCollection {
        BoundaryCollection {
            features: ids
                .iter()
                .map(|id| MunicipalFeature {
                    id: *id,
                    properties: Default::default(),
                    geometry: Value::Null,
                })
                .collect(),
        }
    }

    fn next_ticket(seq: &AtomicU64) -> u64 {
        seq.fetch_add(1, Ordering::SeqCst) + 1
    }

    #[test]
    fn municipality_ticket_taken_before_region_commit_is_dropped() {
        let store = offline_store(None);
        let muni_ticket = next_ticket(&store.inner.municipality_seq);

        let region_ticket = next_ticket(&store.inner.region_seq);
        assert_eq!(
            store.apply_region(region_ticket, region(), boundaries(&[1, 2])),
            Applied::Committed
        );

        let records = vec![MunicipalityFinance {
            year: 2021,
            ..Default::default()
        }];
        assert_eq!(
            store.apply_municipality(muni_ticket, 1, records),
            Applied::Superseded
        );
        let state = store.snapshot();
        assert!(state.selected_finances.is_none());
        assert!(state.selected_feature.is_none());
        assert_eq!(state.municipal_boundaries, Some(boundaries(&[1, 2])));
    }

    #[test]
    fn superseded_region_neither_notifies_nor_clears_selection() {
        let store = offline_store(None);
        let first = next_ticket(&store.inner.region_seq);
        let second = next_ticket(&store.inner.region_seq);
        assert_eq!(
            store.apply_region(second, region(), boundaries(&[7])),
            Applied::Committed
        );
        let muni = next_ticket(&store.inner.municipality_seq);
        assert_eq!(store.apply_municipality(muni, 7, Vec::new()), Applied::Committed);

        let mut rx = store.subscribe();
        rx.borrow_and_update();
        assert_eq!(
            store.apply_region(first, region(), boundaries(&[8])),
            Applied::Superseded
        );
        assert!(!rx.has_changed().expect("alive"));
        let state = store.snapshot();
        assert_eq!(state.selected_feature.map(|f| f.id), Some(7));
        assert_eq!(state.selected_finances, Some(Vec::new()));
    }

    #[test]
    fn failed_snapshot_write_does_not_fail_commit() {
        let path = format!(
            "/tmp/muni-tests/finance-unwritable-{}.db",
            std::process::id()
        );
        let snapshots = SnapshotStore::open(&path).expect("open store");
        let store = offline_store(Some(snapshots));
        for suffix in ["", "-wal", "-shm"] {
            let _ = std::fs::remove_file(format!("{path}{suffix}"));
        }

        store.set_search_query("scr");
        assert_eq!(store.snapshot().search_query, "scr");
    }

    #[test]
    fn derived_views_are_empty_without_selection() {
        let store = offline_store(None);
        assert!(store.latest_record().is_none());
        assert!(store.municipality_list().is_empty());
        assert!(store.chart_series().is_none());
    }
}
