use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Units {
    #[default]
    Imperial,
    Metric,
}

impl Units {
    pub fn as_str(&self) -> &'static str {
        match self {
            Units::Imperial => "imperial",
            Units::Metric => "metric",
        }
    }
}

/// One lane/strip of a street cross-section, left to right.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CrossSectionPanel {
    pub name: String,
    pub width: f64,
    #[serde(default)]
    pub material: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GeneratedImage {
    pub id: i64,
    #[serde(alias = "imageUrl")]
    pub image_url: String,
    #[serde(alias = "createdAt", default)]
    pub created_at: Option<String>,
    #[serde(alias = "isSaved", default)]
    pub is_saved: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DesignTemplate {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}
