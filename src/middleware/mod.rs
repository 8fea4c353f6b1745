// Middleware modules
pub mod access_log;
pub mod client_ip;
pub mod cors;
pub mod fake_user;
pub mod hsts;
pub mod request_id;

pub use access_log::{access_log, AccessLogger, LogConfig, LogRecord, LogSink, TracingSink};
pub use cors::cors_layer;
pub use fake_user::{fake_user_middleware, FakeUser, UserLoader};
pub use hsts::hsts_middleware;
pub use request_id::{request_id, request_id_layers};
