use crate::error::SchemaError;
use crate::numeric::number;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One municipality's balance sheet, revenue and service data for one
/// fiscal year. Numeric fields follow the contract in [`crate::numeric`].
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct MunicipalityFinance {
    #[serde(default)]
    pub mid: String,
    #[serde(default)]
    pub name: String,
    pub year: i32,

    #[serde(default, deserialize_with = "number")]
    pub current_assets: f64,
    #[serde(default, deserialize_with = "number")]
    pub capital_assets: f64,
    #[serde(default, deserialize_with = "number")]
    pub total_assets: f64,
    #[serde(default, deserialize_with = "number")]
    pub deferred_outflows: f64,
    #[serde(default, deserialize_with = "number")]
    pub debt: f64,
    #[serde(default, deserialize_with = "number")]
    pub liabilities: f64,
    #[serde(default, deserialize_with = "number")]
    pub deferred_inflows: f64,
    #[serde(default, deserialize_with = "number")]
    pub total_revenues: f64,
    #[serde(default, deserialize_with = "number")]
    pub operating_grants: f64,
    #[serde(default, deserialize_with = "number")]
    pub capital_grants: f64,
    #[serde(default, deserialize_with = "number")]
    pub interest_charges: f64,

    #[serde(default)]
    pub component_units: Option<String>,

    #[serde(default, deserialize_with = "number")]
    pub government_assets_not_being_depreciated: f64,
    #[serde(default, deserialize_with = "number")]
    pub government_assets_being_depreciated: f64,
    #[serde(default, deserialize_with = "number")]
    pub government_assets_other: f64,
    #[serde(default, deserialize_with = "number")]
    pub business_type_assets_not_being_depreciated_total: f64,
    #[serde(default, deserialize_with = "number")]
    pub business_type_assets_being_depreciated_total: f64,
    #[serde(default, deserialize_with = "number")]
    pub component_unit_assets_not_being_depreciated: f64,
    #[serde(default, deserialize_with = "number")]
    pub component_unit_assets_being_depreciated: f64,
    #[serde(default, deserialize_with = "number")]
    pub component_unit_assets_other: f64,

    #[serde(default, deserialize_with = "number")]
    pub net_book_total_capital_assets: f64,

    #[serde(default, deserialize_with = "number")]
    pub de_general: f64,
    #[serde(default, deserialize_with = "number")]
    pub de_infrastructure: f64,
    #[serde(default, deserialize_with = "number")]
    pub de_public_safety: f64,
    #[serde(default, deserialize_with = "number")]
    pub de_health: f64,
    #[serde(default, deserialize_with = "number")]
    pub de_housing: f64,
    #[serde(default, deserialize_with = "number")]
    pub de_recreation: f64,
    #[serde(default, deserialize_with = "number")]
    pub de_utilities: f64,
    #[serde(default, deserialize_with = "number")]
    pub de_airport: f64,
    #[serde(default, deserialize_with = "number")]
    pub de_other: f64,

    #[serde(default, deserialize_with = "number")]
    pub taxable_assessed_value: f64,
    #[serde(default, deserialize_with = "number")]
    pub property_taxes_levied: f64,

    #[serde(default, deserialize_with = "number")]
    pub pension_bonds: f64,
    #[serde(default, deserialize_with = "number")]
    pub water_revenue_bonds: f64,
    #[serde(default, deserialize_with = "number")]
    pub total_utility_bonds: f64,
    #[serde(default, deserialize_with = "number")]
    pub airport_bonds: f64,
    #[serde(default, deserialize_with = "number")]
    pub debt_governmental_activities: f64,
    #[serde(default, deserialize_with = "number")]
    pub debt_business_activities: f64,
    #[serde(default, deserialize_with = "number")]
    pub debt_total_primary_government: f64,
    #[serde(default, deserialize_with = "number")]
    pub general_obligation_bonds: f64,
    #[serde(default, deserialize_with = "number")]
    pub population: f64,
    #[serde(default, deserialize_with = "number")]
    pub per_capita_income: f64,

    #[serde(default)]
    pub principal_employers: Option<String>,

    #[serde(default, deserialize_with = "number")]
    pub police_force: f64,
    #[serde(default, deserialize_with = "number")]
    pub fire_dept: f64,
    #[serde(default, deserialize_with = "number")]
    pub total_employees: f64,
    #[serde(default, deserialize_with = "number")]
    pub street_repair_miles: f64,
    #[serde(default, deserialize_with = "number")]
    pub water_main_breaks: f64,
    #[serde(default, deserialize_with = "number")]
    pub water_daily_pumpage_gallons_million: f64,
    #[serde(default, deserialize_with = "number")]
    pub sewer_repairs: f64,

    #[serde(default, deserialize_with = "number")]
    pub parks: f64,
    #[serde(default, deserialize_with = "number")]
    pub street_miles: f64,
    #[serde(default, deserialize_with = "number")]
    pub sewer_miles: f64,
    #[serde(default, deserialize_with = "number")]
    pub water_main_miles: f64,

    #[serde(default)]
    pub modifier: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
}

impl MunicipalityFinance {
    pub fn total_liabilities(&self) -> f64 {
        self.liabilities + self.deferred_inflows
    }

    /// Gross cost of capital assets across government, business-type and
    /// component-unit activities.
    pub fn capital_asset_cost(&self) -> f64 {
        self.government_assets_not_being_depreciated
            + self.government_assets_being_depreciated
            + self.government_assets_other
            + self.business_type_assets_not_being_depreciated_total
            + self.business_type_assets_being_depreciated_total
            + self.component_unit_assets_not_being_depreciated
            + self.component_unit_assets_being_depreciated
            + self.component_unit_assets_other
    }

    pub fn government_transfers(&self) -> f64 {
        self.operating_grants + self.capital_grants
    }

    pub fn principal_employers(&self) -> Vec<String> {
        self.principal_employers
            .as_deref()
            .unwrap_or_default()
            .split('+')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(ToString::to_string)
            .collect()
    }
}

/// Stable sort by year, keeping the first record seen for a repeated year,
/// so the result is strictly ascending.
pub fn normalize_records(mut records: Vec<MunicipalityFinance>) -> Vec<MunicipalityFinance> {
    records.sort_by_key(|r| r.year);
    records.dedup_by_key(|r| r.year);
    records
}

/// Accepts either an array of yearly records or a single record object.
pub fn parse_finance_records(payload: Value) -> Result<Vec<MunicipalityFinance>, SchemaError> {
    let records = match payload {
        Value::Array(_) => serde_json::from_value::<Vec<MunicipalityFinance>>(payload)?,
        Value::Object(_) => vec![serde_json::from_value::<MunicipalityFinance>(payload)?],
        Value::Null => Vec::new(),
        other => {
            return Err(SchemaError::Rejected(format!(
                "expected financial records, got {other}"
            )))
        }
    };
    Ok(normalize_records(records))
}
