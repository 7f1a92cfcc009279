use once_cell::sync::Lazy;

use crate::api::models::PeerId;

pub static RUNTIME: Lazy<tokio::runtime::Runtime> = Lazy::new(|| {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .expect("Failed to build Tokio runtime")
});

pub fn normalize_url(input: &str) -> String {
    let trimmed = input.trim().trim_end_matches('/');
    if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
        trimmed.to_string()
    } else {
        format!("https://{}", trimmed)
    }
}

/// Reads the `uid` parameter from a navigation target such as `/messages?uid=42`
/// or a bare query string `uid=42`.
pub fn deep_link_from_query(target: &str) -> Option<PeerId> {
    let query = match target.split_once('?') {
        Some((_, q)) => q,
        None => target,
    };
    url::form_urlencoded::parse(query.as_bytes())
        .find(|(key, _)| key == "uid")
        .and_then(|(_, value)| value.trim().parse().ok())
}
