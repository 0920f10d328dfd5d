use thiserror::Error;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("db: {0}")]
    Sqlx(#[from] sqlx::Error),

    #[error("migrate: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),
}
