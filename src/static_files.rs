use std::path::PathBuf;

use axum::Router;
use tower_http::services::ServeDir;

/// Where static files come from and where they are mounted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StaticConfig {
    /// Defaults to `/`.
    pub url_prefix: String,
    /// Defaults to `./public`.
    pub file_root: PathBuf,
    /// Serve `index.html` for directory requests. Off by default.
    pub index: bool,
}

impl Default for StaticConfig {
    fn default() -> Self {
        Self {
            url_prefix: "/".to_string(),
            file_root: PathBuf::from("./public"),
            index: false,
        }
    }
}

impl StaticConfig {
    pub fn with_url_prefix(mut self, url_prefix: impl Into<String>) -> Self {
        self.url_prefix = url_prefix.into();
        self
    }

    pub fn with_file_root(mut self, file_root: impl Into<PathBuf>) -> Self {
        self.file_root = file_root.into();
        self
    }

    pub fn with_index(mut self, index: bool) -> Self {
        self.index = index;
        self
    }
}

/// Router serving `config.file_root` under `config.url_prefix`.
///
/// A root prefix installs the files as the fallback, so explicit routes
/// merged next to it keep priority.
pub fn static_router(config: &StaticConfig) -> Router {
    let serve_dir =
        ServeDir::new(&config.file_root).append_index_html_on_directories(config.index);

    let prefix = config.url_prefix.trim_end_matches('/');
    if prefix.is_empty() {
        Router::new().fallback_service(serve_dir)
    } else {
        Router::new().nest_service(prefix, serve_dir)
    }
}
