//! URL utilities for consistent URL handling
//!
//! This module normalizes gateway URLs so endpoint construction never
//! produces double slashes, and builds the image-generation URL with a
//! percent-encoded prompt.

/// Normalize a base URL by removing trailing slashes.
///
/// # Examples
///
/// ```
/// use quorum::utils::url::normalize_base_url;
///
/// assert_eq!(normalize_base_url("https://gen.pollinations.ai/"), "https://gen.pollinations.ai");
/// ```
pub fn normalize_base_url(base_url: &str) -> String {
    base_url.trim_end_matches('/').to_string()
}

/// Construct a complete API endpoint URL from a base URL and endpoint path.
///
/// # Examples
///
/// ```
/// use quorum::utils::url::construct_api_url;
///
/// assert_eq!(
///     construct_api_url("https://gen.pollinations.ai/", "v1/chat/completions"),
///     "https://gen.pollinations.ai/v1/chat/completions"
/// );
/// ```
pub fn construct_api_url(base_url: &str, endpoint: &str) -> String {
    let normalized_base = normalize_base_url(base_url);
    let endpoint = endpoint.trim_start_matches('/');
    format!("{}/{}", normalized_base, endpoint)
}

/// Build the direct image-generation URL for a prompt.
///
/// The prompt becomes a percent-encoded path segment; the model, branding
/// suppression flag, and seed ride in the query string. Returns `None` when
/// the base URL cannot be parsed (image dispatch is best-effort).
pub fn build_image_url(base_url: &str, prompt: &str, model: &str, seed: u32) -> Option<String> {
    let mut url = reqwest::Url::parse(&normalize_base_url(base_url)).ok()?;
    url.path_segments_mut()
        .ok()?
        .pop_if_empty()
        .push("image")
        .push(prompt);
    url.query_pairs_mut()
        .append_pair("model", model)
        .append_pair("nologo", "true")
        .append_pair("seed", &seed.to_string());
    Some(url.to_string())
}
