use thiserror::Error;

#[derive(Debug, Error)]
pub enum LazarusError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid image: {0}")]
    InvalidImage(String),

    #[error("Corrupt cluster chain: {0}")]
    CorruptChain(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

pub type LazarusResult<T> = Result<T, LazarusError>;
