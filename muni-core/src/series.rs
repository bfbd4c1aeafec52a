use muni_schema::{normalize_records, MunicipalityFinance};
use serde::{Deserialize, Serialize};

pub const BILLION: f64 = 1e9;

/// `numerator / denominator`, or 0 when the quotient is undefined.
pub fn safe_ratio(numerator: f64, denominator: f64) -> f64 {
    if denominator == 0.0 {
        return 0.0;
    }
    let ratio = numerator / denominator;
    if ratio.is_finite() {
        ratio
    } else {
        0.0
    }
}

/// Year-indexed series for the municipality charts. Every vector has one
/// entry per year in `years`, ascending.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ChartSeries {
    pub years: Vec<i32>,
    pub current_assets: Vec<f64>,
    pub total_liabilities: Vec<f64>,
    pub total_revenues: Vec<f64>,
    pub net_position: Vec<f64>,
    pub financial_assets_to_liabilities: Vec<f64>,
    pub total_assets_to_liabilities: Vec<f64>,
    pub debt_to_revenue: Vec<f64>,
    pub interest_to_revenue: Vec<f64>,
    pub book_value_to_cost: Vec<f64>,
    pub transfers_to_revenue: Vec<f64>,
}

impl ChartSeries {
    pub fn len(&self) -> usize {
        self.years.len()
    }

    pub fn is_empty(&self) -> bool {
        self.years.is_empty()
    }
}

pub fn derive_series(records: &[MunicipalityFinance]) -> ChartSeries {
    let records = normalize_records(records.to_vec());
    let mut series = ChartSeries::default();

    for r in &records {
        let liabilities = r.total_liabilities();
        let net_position = r.current_assets - liabilities;

        series.years.push(r.year);
        series.current_assets.push(r.current_assets);
        series.total_liabilities.push(liabilities);
        series.total_revenues.push(r.total_revenues);
        series.net_position.push(net_position);
        series
            .financial_assets_to_liabilities
            .push(safe_ratio(r.current_assets, liabilities));
        series
            .total_assets_to_liabilities
            .push(safe_ratio(r.total_assets + r.deferred_outflows, liabilities));
        series.debt_to_revenue.push(if net_position >= 0.0 {
            0.0
        } else {
            safe_ratio(net_position, r.total_revenues)
        });
        series
            .interest_to_revenue
            .push(safe_ratio(r.interest_charges, r.total_revenues));
        series
            .book_value_to_cost
            .push(safe_ratio(r.net_book_total_capital_assets, r.capital_asset_cost()));
        series
            .transfers_to_revenue
            .push(safe_ratio(r.government_transfers(), r.total_revenues));
    }

    series
}

/// Values in billions, as the dollar charts plot them.
pub fn in_billions(values: &[f64]) -> Vec<f64> {
    values.iter().map(|v| v / BILLION).collect()
}

/// Record with the greatest year; the first such record wins a tie.
pub fn latest_record(records: &[MunicipalityFinance]) -> Option<&MunicipalityFinance> {
    records.iter().fold(None, |latest, record| match latest {
        Some(best) if record.year <= best.year => Some(best),
        _ => Some(record),
    })
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct AssetsSplit {
    pub current_assets: f64,
    pub total_liabilities: f64,
}

impl AssetsSplit {
    pub fn of(record: &MunicipalityFinance) -> Self {
        Self {
            current_assets: record.current_assets,
            total_liabilities: record.total_liabilities(),
        }
    }
}
