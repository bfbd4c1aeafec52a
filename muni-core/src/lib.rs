//! Client-side core of the municipal finance app: the authenticated HTTP
//! client, the session and finance stores, chart series and the designer
//! API.

pub mod auth;
pub mod config;
pub mod design;
pub mod error;
pub mod finance;
pub mod format;
pub mod http;
pub mod persist;
pub mod series;
pub mod session;

pub use auth::AuthStore;
pub use config::ClientConfig;
pub use design::DesignerApi;
pub use error::{ApiError, FieldError, PersistError};
pub use finance::{Applied, FinanceSnapshot, FinanceState, FinanceStore};
pub use format::{format_currency, format_number};
pub use http::{ApiClient, ApiRequest};
pub use persist::SnapshotStore;
pub use series::{derive_series, latest_record, safe_ratio, AssetsSplit, ChartSeries};
pub use session::{AuthSnapshot, Navigator, NoopNavigator, Route, RouteCell, Session, SessionCell};
