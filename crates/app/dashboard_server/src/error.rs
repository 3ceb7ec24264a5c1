use dashboard_core::auth::AuthError;
use dashboard_core::mail::MailError;
use dashboard_core::store::StoreError;
use thiserror::Error;

pub type Result<T> = core::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("{}", .0)]
    Custom(String),

    #[error("IO::{:?}: {}", .0, .0)]
    Io(#[from] std::io::Error),

    #[error("Database: {}", .0)]
    Database(#[from] sqlx::Error),

    #[error("Migrate: {}", .0)]
    Migrate(#[from] sqlx::migrate::MigrateError),

    #[error("Store: {}", .0)]
    Store(#[from] StoreError),

    #[error("Mail: {}", .0)]
    Mail(#[from] MailError),

    #[error("{}", .0.detail())]
    Auth(#[from] AuthError),

    #[error("Logging: {}", .0)]
    Logging(String),
}
