use crate::error::ApiError;
use crate::http::{ApiClient, ApiRequest};
use muni_schema::{CrossSectionPanel, DesignTemplate, GeneratedImage, Units};
use serde_json::Value;
use tracing::info;

pub const TEMPLATES_PATH: &str = "/design/templates";
pub const GENERATE_PATH: &str = "/design/cross-section/generate";

/// Street cross-section designer endpoints.
#[derive(Clone)]
pub struct DesignerApi {
    client: ApiClient,
}

impl DesignerApi {
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }

    pub async fn templates(&self) -> Result<Vec<DesignTemplate>, ApiError> {
        let payload = self.client.get_json_value(ApiRequest::get(TEMPLATES_PATH)).await?;
        let list = match payload {
            Value::Object(mut map) => map.remove("templates").unwrap_or(Value::Array(Vec::new())),
            other => other,
        };
        serde_json::from_value(list).map_err(|e| ApiError::Decode(e.to_string()))
    }

    pub async fn generate_cross_section(
        &self,
        units: Units,
        theme: &str,
        panels: &[CrossSectionPanel],
    ) -> Result<GeneratedImage, ApiError> {
        let sections =
            serde_json::to_string(panels).map_err(|e| ApiError::Decode(e.to_string()))?;
        let request = ApiRequest::get(GENERATE_PATH)
            .query("units", units.as_str())
            .query("theme", theme)
            .query("sections", sections);

        let payload = match self.client.get_json_value(request).await? {
            Value::Object(mut map) if map.contains_key("image") => {
                map.remove("image").unwrap_or(Value::Null)
            }
            other => other,
        };
        let image: GeneratedImage =
            serde_json::from_value(payload).map_err(|e| ApiError::Decode(e.to_string()))?;
        info!(image_id = image.id, panels = panels.len(), "cross-section generated");
        Ok(image)
    }

    pub async fn save_image(&self, image_id: i64) -> Result<Value, ApiError> {
        self.client
            .send(&ApiRequest::post(format!(
                "/design/cross-section/{image_id}/save"
            )))
            .await
    }
}
