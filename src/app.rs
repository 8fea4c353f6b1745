use std::{sync::Arc, time::Duration};

use axum::{middleware, Router};
use tower_http::timeout::TimeoutLayer;
use tracing::info;

use crate::{
    config::{AppConfig, ConfigError},
    middleware::{
        access_log, cors_layer, fake_user_middleware, hsts_middleware, request_id_layers,
        AccessLogger, FakeUser, UserLoader,
    },
    proxy::ReverseProxy,
    static_files::static_router,
};

/// Assembles the middleware stack around an application's routes.
///
/// From the outside in: request id, CORS, HSTS, access log, timeout,
/// fake user, then the routes themselves.
pub struct AppBuilder {
    config: AppConfig,
    logger: Option<AccessLogger>,
    fake_user: Option<Arc<dyn UserLoader>>,
}

impl AppBuilder {
    pub fn new(config: AppConfig) -> Self {
        Self {
            config,
            logger: None,
            fake_user: None,
        }
    }

    /// Replaces the default `tracing` access logger built from the config.
    pub fn with_logger(mut self, logger: AccessLogger) -> Self {
        self.logger = Some(logger);
        self
    }

    pub fn with_fake_user(mut self, loader: Arc<dyn UserLoader>) -> Self {
        self.fake_user = Some(loader);
        self
    }

    pub fn build(self, routes: Router) -> Result<Router, ConfigError> {
        let config = self.config;
        config.validate()?;

        let mut app = routes;

        if config.proxy.enabled {
            let proxy = ReverseProxy::new(config.proxy_target()?)
                .with_timeout(Duration::from_millis(config.proxy.timeout_ms));
            info!(prefix = %config.proxy.prefix, target = %proxy.target(), "Reverse proxy enabled");

            let prefix = config.proxy.prefix.trim_end_matches('/');
            app = if prefix.is_empty() {
                app.fallback_service(proxy.router())
            } else {
                app.nest_service(prefix, proxy.router())
            };
        }

        if config.static_files.enabled {
            info!(
                prefix = %config.static_files.url_prefix,
                root = %config.static_files.file_root,
                "Static file serving enabled"
            );
            app = app.merge(static_router(&config.static_config()));
        }

        if let Some(loader) = self.fake_user {
            let fake = FakeUser::new(loader, config.mode);
            app = app.layer(middleware::from_fn_with_state(fake, fake_user_middleware));
        }

        app = app.layer(TimeoutLayer::new(Duration::from_secs(
            config.server.timeout_seconds,
        )));

        if config.access_log.enabled {
            let logger = self
                .logger
                .unwrap_or_else(|| AccessLogger::with_tracing(config.log_config()));
            app = app.layer(middleware::from_fn_with_state(logger, access_log));
        }

        if config.hsts.enabled {
            app = app.layer(middleware::from_fn(hsts_middleware));
        }

        if config.cors.enabled {
            app = app.layer(cors_layer());
        }

        let (set_request_id, propagate_request_id) = request_id_layers();
        Ok(app.layer(propagate_request_id).layer(set_request_id))
    }
}
