//! The static status page.

use axum::response::Html;

/// Page bytes are compiled in so the binary has no runtime file
/// dependencies.
const INDEX_HTML: &str = include_str!("../../static/index.html");

/// `GET /` — serves the embedded status page.
pub async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}
