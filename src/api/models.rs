use crate::api::TagsResponse;
use crate::core::error::ClientError;
use crate::utils::url::construct_api_url;
use tracing::debug;

pub async fn fetch_models(
    client: &reqwest::Client,
    base_url: &str,
) -> Result<TagsResponse, ClientError> {
    let tags_url = construct_api_url(base_url, "api/tags");
    debug!(url = %tags_url, "fetching model list");

    let response = client
        .get(tags_url)
        .header("Content-Type", "application/json")
        .send()
        .await
        .map_err(ClientError::from_transport)?;

    if !response.status().is_success() {
        let status = response.status();
        let error_text = response
            .text()
            .await
            .unwrap_or_else(|_| "<no body>".to_string());
        return Err(ClientError::rejected(status, &error_text));
    }

    let body = response
        .bytes()
        .await
        .map_err(ClientError::from_transport)?;
    serde_json::from_slice::<TagsResponse>(&body)
        .map_err(|e| ClientError::Malformed(format!("model list: {e}")))
}

/// Model names in the order the server listed them.
pub fn model_names(response: TagsResponse) -> Vec<String> {
    response.models.into_iter().map(|model| model.name).collect()
}
