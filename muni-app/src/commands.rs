use crate::state::AppState;
use muni_core::series::{in_billions, AssetsSplit};
use muni_core::{format_currency, format_number, safe_ratio, Applied, Navigator, Route};
use muni_schema::{
    CrossSectionPanel, DesignTemplate, GeneratedImage, MunicipalityFinance,
    MunicipalityListItem, RegionInfo, RegisterData, Units,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{error, info};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SessionDto {
    pub is_authenticated: bool,
    pub display_name: Option<String>,
    pub email: Option<String>,
    pub route: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct UserDto {
    pub id: i64,
    pub display_name: String,
    pub email: String,
    pub organization: Option<String>,
    pub subscription_tier: Option<String>,
    pub credits: Option<i64>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MunicipalityHeaderDto {
    pub name: String,
    pub county: String,
    pub region: String,
    pub latest_year: i32,
    pub population: String,
    pub total_revenues: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DataRowDto {
    pub label: String,
    pub value: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DataSectionDto {
    pub title: String,
    pub rows: Vec<DataRowDto>,
}

/// Chart inputs. Dollar series are in billions; ratios are keyed by chart
/// title.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ChartsDto {
    pub years: Vec<i32>,
    pub current_assets: Vec<f64>,
    pub total_liabilities: Vec<f64>,
    pub net_position: Vec<f64>,
    pub total_revenues: Vec<f64>,
    pub ratios: BTreeMap<String, Vec<f64>>,
    pub assets_split: Option<AssetsSplit>,
}

pub fn session(state: &AppState) -> SessionDto {
    let snapshot = state.auth.snapshot();
    SessionDto {
        is_authenticated: snapshot.is_authenticated,
        display_name: snapshot.user.as_ref().map(|u| u.display_name()),
        email: snapshot.user.map(|u| u.email),
        route: state.routes.current().path().to_string(),
    }
}

fn require_auth(state: &AppState) -> Result<(), String> {
    if state.auth.is_authenticated() {
        return Ok(());
    }
    state.routes.navigate(Route::Login);
    Err("Not authenticated".into())
}

pub async fn login(state: &AppState, email: String, password: String) -> Result<SessionDto, String> {
    state
        .auth
        .login(&email, &password)
        .await
        .map_err(|e| e.user_message_or("Invalid email or password."))?;
    state.routes.navigate(Route::Home);
    Ok(session(state))
}

pub fn logout(state: &AppState) -> SessionDto {
    state.auth.logout();
    session(state)
}

/// Returns the server's confirmation message; failures carry the message to
/// show next to the form.
pub async fn register(state: &AppState, data: RegisterData) -> Result<String, String> {
    let response = state
        .auth
        .register(&data)
        .await
        .map_err(|e| e.user_message_or("Registration failed."))?;
    state.routes.navigate(Route::Login);
    Ok(response
        .get("message")
        .and_then(serde_json::Value::as_str)
        .unwrap_or("Registration successful.")
        .to_string())
}

pub async fn current_user(state: &AppState) -> Result<UserDto, String> {
    require_auth(state)?;
    let user = state.auth.get_user().await.map_err(|e| e.to_string())?;
    Ok(UserDto {
        id: user.id,
        display_name: user.display_name(),
        email: user.email,
        organization: user.organization,
        subscription_tier: user.subscription_tier,
        credits: user.credits,
    })
}

/// Seeds sample data for the home page. Seeding failures never block the
/// page.
pub async fn home_init(state: &AppState) -> Result<(), String> {
    require_auth(state)?;
    match state.finance.init_sample_data().await {
        Ok(_) => info!("sample data ready"),
        Err(e) => error!("sample data init failed: {e}"),
    }
    Ok(())
}

pub async fn list_regions(state: &AppState) -> Result<Vec<RegionInfo>, String> {
    require_auth(state)?;
    state.finance.fetch_regions().await.map_err(|e| e.to_string())
}

pub async fn select_region(
    state: &AppState,
    region: RegionInfo,
) -> Result<Vec<MunicipalityListItem>, String> {
    require_auth(state)?;
    state
        .finance
        .set_selected_state(region)
        .await
        .map_err(|e| e.to_string())?;
    Ok(state.finance.filtered_municipalities())
}

pub fn search_municipalities(
    state: &AppState,
    query: String,
) -> Result<Vec<MunicipalityListItem>, String> {
    require_auth(state)?;
    state.finance.set_search_query(query);
    Ok(state.finance.filtered_municipalities())
}

/// A municipality without financial records yields `None` rather than an
/// error.
pub async fn select_municipality(
    state: &AppState,
    feature_id: i64,
    mid: String,
) -> Result<Option<MunicipalityHeaderDto>, String> {
    require_auth(state)?;
    match state.finance.set_selected_municipality(feature_id, &mid).await {
        Ok(Applied::Committed) => municipality_header(state),
        Ok(Applied::Superseded) => Ok(None),
        Err(e) if e.is_not_found() => {
            info!(mid = %mid, "no financial records");
            Ok(None)
        }
        Err(e) => Err(e.to_string()),
    }
}

pub fn municipality_header(state: &AppState) -> Result<Option<MunicipalityHeaderDto>, String> {
    require_auth(state)?;
    let Some(latest) = state.finance.latest_record() else {
        return Ok(None);
    };
    let snapshot = state.finance.snapshot();
    let properties = snapshot.selected_feature.map(|f| f.properties);

    Ok(Some(MunicipalityHeaderDto {
        name: properties
            .as_ref()
            .map(|p| p.municipal_name.clone())
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| latest.name.clone()),
        county: properties
            .and_then(|p| p.county_name)
            .unwrap_or_default(),
        region: snapshot
            .selected_state
            .map(|r| r.name)
            .unwrap_or_default(),
        latest_year: latest.year,
        population: format_number(latest.population),
        total_revenues: format_currency(latest.total_revenues),
    }))
}

pub fn municipality_data(state: &AppState) -> Result<Vec<DataSectionDto>, String> {
    require_auth(state)?;
    let Some(latest) = state.finance.latest_record() else {
        return Ok(Vec::new());
    };
    let area = state
        .finance
        .snapshot()
        .selected_feature
        .and_then(|f| f.properties.sq_mi);
    Ok(data_sections(&latest, area))
}

fn row(label: &str, value: String) -> DataRowDto {
    DataRowDto {
        label: label.to_string(),
        value,
    }
}

fn data_sections(f: &MunicipalityFinance, area_sq_mi: Option<f64>) -> Vec<DataSectionDto> {
    let area = area_sq_mi.unwrap_or_default();
    let section = |title: &str, rows: Vec<DataRowDto>| DataSectionDto {
        title: title.to_string(),
        rows,
    };

    vec![
        section(
            "Demographics",
            vec![
                row("Population", format_number(f.population)),
                row("Per Capita Income", format_currency(f.per_capita_income)),
                row("Population Density", format_number(safe_ratio(f.population, area))),
                row("Park Facilities", format_number(f.parks)),
                row("Land Area (sq mi)", format_number(area)),
            ],
        ),
        section(
            "Net Position",
            vec![
                row("Current Assets", format_currency(f.current_assets)),
                row("Capital Assets", format_currency(f.capital_assets)),
                row("Total Assets", format_currency(f.total_assets)),
                row("Deferred Outflows", format_currency(f.deferred_outflows)),
                row("Liabilities", format_currency(f.liabilities)),
                row("Deferred Inflows", format_currency(f.deferred_inflows)),
                row("Total Revenues", format_currency(f.total_revenues)),
                row("Operating Grants", format_currency(f.operating_grants)),
                row("Capital Grants", format_currency(f.capital_grants)),
                row("Interest Charges", format_currency(f.interest_charges)),
                row("Taxable Assessed Value", format_currency(f.taxable_assessed_value)),
                row("Property Tax Revenue", format_currency(f.property_taxes_levied)),
            ],
        ),
        section(
            "Debt",
            vec![
                row("Debt (General)", format_currency(f.debt)),
                row(
                    "Debt (Total Primary Government)",
                    format_currency(f.debt_total_primary_government),
                ),
            ],
        ),
        section(
            "Infrastructure",
            vec![
                row("Street Miles", format_number(f.street_miles)),
                row("Sewer Miles", format_number(f.sewer_miles)),
                row("Water Main Miles", format_number(f.water_main_miles)),
            ],
        ),
        section(
            "Staffing",
            vec![
                row("Police (Civilian/Non-civilian)", format_number(f.police_force)),
                row("Fire Dept.", format_number(f.fire_dept)),
                row("Total Employees", format_number(f.total_employees)),
            ],
        ),
        section(
            "Principal Employers",
            f.principal_employers()
                .into_iter()
                .enumerate()
                .map(|(i, name)| row(&(i + 1).to_string(), name))
                .collect(),
        ),
    ]
}

pub fn municipality_charts(state: &AppState) -> Result<Option<ChartsDto>, String> {
    require_auth(state)?;
    let Some(series) = state.finance.chart_series() else {
        return Ok(None);
    };

    let ratios = BTreeMap::from([
        (
            "Financial Assets / Liabilities".to_string(),
            series.financial_assets_to_liabilities.clone(),
        ),
        (
            "Total Assets / Liabilities".to_string(),
            series.total_assets_to_liabilities.clone(),
        ),
        ("Debt / Revenue".to_string(), series.debt_to_revenue.clone()),
        ("Interest / Revenue".to_string(), series.interest_to_revenue.clone()),
        ("Book Value / Cost".to_string(), series.book_value_to_cost.clone()),
        ("Transfers / Revenue".to_string(), series.transfers_to_revenue.clone()),
    ]);

    Ok(Some(ChartsDto {
        current_assets: in_billions(&series.current_assets),
        total_liabilities: in_billions(&series.total_liabilities),
        net_position: in_billions(&series.net_position),
        total_revenues: in_billions(&series.total_revenues),
        assets_split: state.finance.latest_record().as_ref().map(AssetsSplit::of),
        years: series.years,
        ratios,
    }))
}

pub async fn list_templates(state: &AppState) -> Result<Vec<DesignTemplate>, String> {
    require_auth(state)?;
    state.designer.templates().await.map_err(|e| e.to_string())
}

pub async fn generate_cross_section(
    state: &AppState,
    units: Units,
    theme: String,
    panels: Vec<CrossSectionPanel>,
) -> Result<GeneratedImage, String> {
    require_auth(state)?;
    if panels.is_empty() {
        return Err("Add at least one panel".into());
    }
    state
        .designer
        .generate_cross_section(units, &theme, &panels)
        .await
        .map_err(|e| e.user_message_or("Image generation failed."))
}

pub async fn save_cross_section(state: &AppState, image_id: i64) -> Result<(), String> {
    require_auth(state)?;
    state
        .designer
        .save_image(image_id)
        .await
        .map(|_| ())
        .map_err(|e| e.user_message_or("Saving the image failed."))
}
