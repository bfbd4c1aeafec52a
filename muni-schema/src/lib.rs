//! Wire schemas for the municipal finance REST API.
//!
//! Every payload the client accepts is parsed here, at the network boundary,
//! against an explicit contract. Loosely typed numeric fields are coerced in
//! exactly one place ([`numeric`]) instead of at each call site.

pub mod auth;
pub mod design;
pub mod error;
pub mod finance;
pub mod gis;
pub mod numeric;

pub use auth::{
    validate_email, validate_password, validate_register, LoginResponse, RegisterData, TokenPair,
    User,
};
pub use design::{CrossSectionPanel, DesignTemplate, GeneratedImage, Units};
pub use error::SchemaError;
pub use finance::{normalize_records, parse_finance_records, MunicipalityFinance};
pub use gis::{
    filter_municipalities, municipality_list, parse_feature_collection, regions_from_states,
    BoundaryCollection, MunicipalFeature, MunicipalProperties, MunicipalityListItem, RegionInfo,
    StateBoundary,
};
