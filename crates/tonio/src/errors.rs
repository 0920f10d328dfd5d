use thiserror::Error;

#[derive(Debug, Error)]
pub enum TonError {
    #[error("http: {0}")]
    Http(#[from] reqwest::Error),

    #[error("rpc error {code}: {message}")]
    Rpc { code: i32, message: String },

    #[error("rpc response carried no result")]
    MissingResult,

    #[error("invalid base64: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("invalid address: {0}")]
    InvalidAddress(String),

    #[error("no usable endpoints")]
    NoEndpoints,
}
