//! Model-listing calls against the gateway's text and image catalogs.

use crate::api::{ModelInfo, ModelsResponse};
use crate::core::constants::MODEL_LIST_TIMEOUT;
use crate::utils::url::construct_api_url;

type FetchError = Box<dyn std::error::Error + Send + Sync>;

/// Fetch the text-model catalog. Entries without a string `id` are skipped
/// rather than failing the whole listing.
pub async fn fetch_text_models(
    client: &reqwest::Client,
    base_url: &str,
    api_key: Option<&str>,
) -> Result<Vec<ModelInfo>, FetchError> {
    let models_url = construct_api_url(base_url, "v1/models");
    let mut request = client
        .get(models_url)
        .timeout(MODEL_LIST_TIMEOUT)
        .header("Content-Type", "application/json");
    if let Some(key) = api_key {
        request = request.header("Authorization", format!("Bearer {key}"));
    }

    let response = request.send().await?;
    if !response.status().is_success() {
        let status = response.status();
        return Err(format!("model listing failed with status {status}").into());
    }

    let listing = response.json::<ModelsResponse>().await?;
    Ok(listing
        .data
        .into_iter()
        .filter_map(|value| serde_json::from_value::<ModelInfo>(value).ok())
        .collect())
}

/// Fetch the image-model catalog. The endpoint returns a bare JSON array of
/// identifiers; non-string entries are skipped.
pub async fn fetch_image_models(
    client: &reqwest::Client,
    base_url: &str,
) -> Result<Vec<String>, FetchError> {
    let models_url = construct_api_url(base_url, "image/models");
    let response = client
        .get(models_url)
        .timeout(MODEL_LIST_TIMEOUT)
        .send()
        .await?;
    if !response.status().is_success() {
        let status = response.status();
        return Err(format!("image model listing failed with status {status}").into());
    }

    let values = response.json::<Vec<serde_json::Value>>().await?;
    Ok(values
        .into_iter()
        .filter_map(|value| value.as_str().map(str::to_string))
        .collect())
}
