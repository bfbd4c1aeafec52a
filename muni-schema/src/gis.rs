use crate::error::SchemaError;
use crate::numeric;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A selected administrative region (state-equivalent).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegionInfo {
    pub name: String,
    pub abbr: String,
    pub code: String,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct StateBoundary {
    #[serde(default)]
    pub statefp: Option<String>,
    #[serde(default)]
    pub stusps: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub geoid: Option<String>,
    #[serde(default)]
    pub lsad: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct MunicipalProperties {
    #[serde(default)]
    pub municipal_name: String,
    #[serde(default)]
    pub municipal_code: Option<String>,
    #[serde(default)]
    pub municipal_type: Option<String>,
    #[serde(default)]
    pub county_name: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub gnis_id: Option<String>,
    #[serde(default)]
    pub fips_code: Option<String>,
    #[serde(default)]
    pub fips_name: Option<String>,
    #[serde(default, deserialize_with = "numeric::optional_number")]
    pub pop_2010: Option<f64>,
    #[serde(default, deserialize_with = "numeric::optional_number")]
    pub pop_2020: Option<f64>,
    #[serde(default, deserialize_with = "numeric::optional_number")]
    pub sq_mi: Option<f64>,
    /// Identifier of the municipality's financial records.
    #[serde(default)]
    pub mid: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MunicipalFeature {
    pub id: i64,
    pub properties: MunicipalProperties,
    #[serde(default)]
    pub geometry: Value,
}

/// Municipality boundaries for one region. Replaced wholesale, never patched.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct BoundaryCollection {
    pub features: Vec<MunicipalFeature>,
}

impl BoundaryCollection {
    pub fn find(&self, feature_id: i64) -> Option<&MunicipalFeature> {
        self.features.iter().find(|f| f.id == feature_id)
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MunicipalityListItem {
    pub id: i64,
    pub name: String,
    pub county: String,
    pub code: String,
    pub mid: Option<String>,
}

/// Raw features of a GeoJSON `FeatureCollection`, with each feature's id
/// resolved.
///
/// The payload may arrive double-encoded as a JSON string. A feature's id is
/// the top-level `id`, else `properties.pk`, else `properties.id`.
fn raw_features(payload: &Value) -> Result<Vec<(i64, Value, Value)>, SchemaError> {
    let decoded;
    let collection = match payload {
        Value::String(inner) => {
            decoded = serde_json::from_str::<Value>(inner)?;
            &decoded
        }
        other => other,
    };

    let kind = collection
        .get("type")
        .and_then(Value::as_str)
        .unwrap_or_default();
    if kind != "FeatureCollection" {
        return Err(SchemaError::NotFeatureCollection(kind.to_string()));
    }

    let features = collection
        .get("features")
        .and_then(Value::as_array)
        .ok_or(SchemaError::MissingFeatures)?;

    let mut out = Vec::with_capacity(features.len());
    for (index, feature) in features.iter().enumerate() {
        let properties = feature
            .get("properties")
            .cloned()
            .unwrap_or_else(|| Value::Object(Default::default()));
        let id = feature
            .get("id")
            .or_else(|| properties.get("pk"))
            .or_else(|| properties.get("id"))
            .and_then(feature_id)
            .ok_or(SchemaError::MissingFeatureId(index))?;
        let geometry = feature.get("geometry").cloned().unwrap_or(Value::Null);
        out.push((id, properties, geometry));
    }
    Ok(out)
}

fn feature_id(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

pub fn parse_feature_collection(payload: &Value) -> Result<BoundaryCollection, SchemaError> {
    let mut features = Vec::new();
    for (id, properties, geometry) in raw_features(payload)? {
        let properties: MunicipalProperties =
            serde_json::from_value(properties).map_err(|e| SchemaError::InvalidField {
                field: format!("features[{id}].properties"),
                reason: e.to_string(),
            })?;
        features.push(MunicipalFeature {
            id,
            properties,
            geometry,
        });
    }
    Ok(BoundaryCollection { features })
}

/// Region choices from the states payload, sorted by name.
///
/// Features missing a name or postal abbreviation cannot be selected and are
/// skipped.
pub fn regions_from_states(payload: &Value) -> Result<Vec<RegionInfo>, SchemaError> {
    let mut regions = Vec::new();
    for (_, properties, _) in raw_features(payload)? {
        let state: StateBoundary = serde_json::from_value(properties)?;
        let (Some(name), Some(abbr)) = (state.name, state.stusps) else {
            continue;
        };
        regions.push(RegionInfo {
            name,
            abbr,
            code: state.statefp.unwrap_or_default(),
        });
    }
    regions.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(regions)
}

pub fn municipality_list(collection: &BoundaryCollection) -> Vec<MunicipalityListItem> {
    let mut items: Vec<MunicipalityListItem> = collection
        .features
        .iter()
        .map(|f| MunicipalityListItem {
            id: f.id,
            name: f.properties.municipal_name.clone(),
            county: f.properties.county_name.clone().unwrap_or_default(),
            code: f.properties.fips_code.clone().unwrap_or_default(),
            mid: f.properties.mid.clone(),
        })
        .collect();
    items.sort_by(|a, b| a.name.cmp(&b.name));
    items
}

/// Case-insensitive match on name or county. An empty query keeps everything.
pub fn filter_municipalities(
    items: &[MunicipalityListItem],
    query: &str,
) -> Vec<MunicipalityListItem> {
    let needle = query.trim().to_lowercase();
    if needle.is_empty() {
        return items.to_vec();
    }
    items
        .iter()
        .filter(|item| {
            item.name.to_lowercase().contains(&needle)
                || item.county.to_lowercase().contains(&needle)
        })
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn municipalities() -> Value {
        json!({
            "type": "FeatureCollection",
            "features": [
                {
                    "type": "Feature",
                    "id": 2,
                    "properties": {
                        "municipal_name": "Scranton",
                        "county_name": "Lackawanna",
                        "state": "PA",
                        "fips_code": "69000",
                        "sq_mi": "25.2",
                        "mid": "m-scranton"
                    },
                    "geometry": {"type": "Polygon", "coordinates": []}
                },
                {
                    "type": "Feature",
                    "properties": {
                        "pk": 1,
                        "municipal_name": "Allentown",
                        "county_name": "Lehigh",
                        "state": "PA",
                        "sq_mi": null
                    },
                    "geometry": null
                }
            ]
        })
    }

    #[test]
    fn parses_features_with_fallback_ids() {
        let collection = parse_feature_collection(&municipalities()).expect("parse");
        assert_eq!(collection.features.len(), 2);
        assert_eq!(collection.features[0].id, 2);
        assert_eq!(collection.features[0].properties.sq_mi, Some(25.2));
        assert_eq!(collection.features[1].id, 1);
        assert_eq!(collection.features[1].properties.sq_mi, None);
        assert!(collection.find(1).is_some());
        assert!(collection.find(99).is_none());
    }

    #[test]
    fn accepts_double_encoded_payload() {
        let encoded = Value::String(municipalities().to_string());
        let collection = parse_feature_collection(&encoded).expect("parse");
        assert_eq!(collection.features.len(), 2);
    }

    #[test]
    fn rejects_non_collections_and_missing_ids() {
        assert!(matches!(
            parse_feature_collection(&json!({"type": "Feature"})),
            Err(SchemaError::NotFeatureCollection(_))
        ));
        assert!(matches!(
            parse_feature_collection(&json!({"type": "FeatureCollection"})),
            Err(SchemaError::MissingFeatures)
        ));
        assert!(matches!(
            parse_feature_collection(&json!({
                "type": "FeatureCollection",
                "features": [{"properties": {"municipal_name": "Nowhere"}}]
            })),
            Err(SchemaError::MissingFeatureId(0))
        ));
    }

    #[test]
    fn regions_are_sorted_and_incomplete_states_skipped() {
        let payload = json!({
            "type": "FeatureCollection",
            "features": [
                {"id": 1, "properties": {"name": "Pennsylvania", "stusps": "PA", "statefp": "42"}},
                {"id": 2, "properties": {"name": "New York", "stusps": "NY", "statefp": "36"}},
                {"id": 3, "properties": {"name": "Unnamed"}}
            ]
        });
        let regions = regions_from_states(&payload).expect("regions");
        assert_eq!(
            regions,
            vec![
                RegionInfo { name: "New York".into(), abbr: "NY".into(), code: "36".into() },
                RegionInfo { name: "Pennsylvania".into(), abbr: "PA".into(), code: "42".into() },
            ]
        );
    }

    #[test]
    fn municipality_list_sorts_and_filters() {
        let collection = parse_feature_collection(&municipalities()).expect("parse");
        let items = municipality_list(&collection);
        assert_eq!(items[0].name, "Allentown");
        assert_eq!(items[1].mid.as_deref(), Some("m-scranton"));

        let hits = filter_municipalities(&items, "lacka");
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].name, "Scranton");
        assert_eq!(filter_municipalities(&items, "  ").len(), 2);
    }
}
