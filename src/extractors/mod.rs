pub mod html;
pub mod remote;

pub use html::HtmlPageExtractor;
pub use remote::RemotePageExtractor;

use std::collections::HashSet;

use url::Url;

const FURNITURE: [&str; 3] = ["avatar", "logo", "icon"];

/// Accepts any http(s) URL whose file name does not look like site furniture
/// (logos, avatars, icons). Host and directory names are not inspected, and no
/// file extension is required: callers only pass URLs taken from image elements.
pub(crate) fn is_page_image(url: &str) -> bool {
    let Ok(parsed) = Url::parse(url) else {
        return false;
    };
    if !matches!(parsed.scheme(), "http" | "https") {
        return false;
    }

    let file_name = parsed
        .path_segments()
        .and_then(|segments| segments.last())
        .unwrap_or_default()
        .to_ascii_lowercase();
    !FURNITURE.iter().any(|word| file_name.contains(word))
}

/// Drops repeats, keeping first-seen order.
pub(crate) fn dedup_in_order(urls: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    urls.into_iter().filter(|u| seen.insert(u.clone())).collect()
}
