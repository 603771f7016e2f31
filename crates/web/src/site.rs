use std::path::{Path, PathBuf};
use std::sync::Arc;

use axum::response::Html;
use axum::Router;
use tower_http::services::{ServeDir, ServeFile};

const ENV_WEB_ROOT: &str = "THINKRELAY_WEB_ROOT";

/// Named pages of the bundled front end.
pub(crate) const PAGES: [(&str, &str); 11] = [
    ("/", "index.html"),
    ("/about", "about.html"),
    ("/transformers", "transformers.html"),
    ("/ai-ethics", "ai-ethics.html"),
    ("/advanced-ai", "advanced-ai.html"),
    ("/documentation", "documentation.html"),
    ("/partners", "partners.html"),
    ("/settings", "settings.html"),
    ("/terms", "terms.html"),
    ("/qwen3-235b", "qwen3-235b.html"),
    ("/gemini", "gemini.html"),
];

pub(crate) fn read_env_trim(name: &str) -> Option<String> {
    let value = std::env::var(name).ok()?;
    let value = value.trim();
    (!value.is_empty()).then(|| value.to_string())
}

pub(crate) fn resolve_web_root() -> PathBuf {
    let exe_dir = thinkrelay_service::process_env::exe_dir();
    match read_env_trim(ENV_WEB_ROOT) {
        Some(raw) => {
            let path = PathBuf::from(raw);
            if path.is_absolute() {
                path
            } else {
                exe_dir.join(path)
            }
        }
        None => exe_dir.join("web"),
    }
}

fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            other => escaped.push(other),
        }
    }
    escaped
}

const MISSING_UI_PAGE: &str = r#"<!doctype html>
<html lang="en">
<meta charset="utf-8">
<title>ThinkRelay: UI not available</title>
<style>
  main { max-width: 40rem; margin: 4rem auto; font: 16px/1.5 system-ui, sans-serif; }
  code { background: #f1f5f9; padding: 0 0.25rem; }
</style>
<main>
  <h1>UI not available</h1>
  <p>No front end was found at <code>{root}</code>.</p>
  <p>The gateway still answers on <code>/api/generate</code> and <code>/api/gemini</code>.
     Set <code>THINKRELAY_WEB_ROOT</code> to a directory with <code>index.html</code>.</p>
</main>
</html>
"#;

fn builtin_missing_ui_html(web_root: &Path) -> String {
    MISSING_UI_PAGE.replace("{root}", &escape_html(&web_root.display().to_string()))
}

/// Page routes plus a static-asset fallback rooted at `web_root`.
pub(crate) fn site_router(web_root: &Path) -> Router {
    let index = web_root.join("index.html");
    if !index.is_file() {
        log::warn!("event=web_root_missing path={}", web_root.display());
        let html = Arc::new(builtin_missing_ui_html(web_root));
        return Router::new().fallback(move || {
            let html = Arc::clone(&html);
            async move { Html((*html).clone()) }
        });
    }

    let router = PAGES.iter().fold(Router::new(), |router, (route, file)| {
        router.route_service(route, ServeFile::new(web_root.join(file)))
    });
    router.fallback_service(ServeDir::new(web_root))
}
