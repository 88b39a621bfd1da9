pub mod config;
pub mod mailer;
pub mod observability;
pub mod server;

pub use config::{AppConfig, DatabaseConfig, LoggingConfig, MailConfig, ServerConfig};
pub use mailer::SmtpMailer;
pub use observability::{apply_logging_level, init_tracing};
pub use server::{AgrisafeServer, ServerBuilder, build_app, build_auth_state};
