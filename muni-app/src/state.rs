use muni_core::{ApiClient, AuthStore, ClientConfig, DesignerApi, FinanceStore, RouteCell};
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub config: ClientConfig,
    pub routes: Arc<RouteCell>,
    pub client: ApiClient,
    pub auth: AuthStore,
    pub finance: FinanceStore,
    pub designer: DesignerApi,
}
