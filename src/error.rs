use thiserror::Error;

#[derive(Error, Debug)]
pub enum TrackerError {
    #[error("upload is empty: no header line found")]
    EmptyInput,
    #[error("No valid entries found in {source_name}. Please check the file format.")]
    NoValidEntries { source_name: String },
    #[error("failed to read tab-separated input: {0}")]
    Csv(#[from] csv::Error),
    #[error("failed to read upload: {0}")]
    Io(#[from] std::io::Error),
    #[error("unknown keyword: {0}")]
    UnknownKeyword(String),
    #[error("unknown business: {0}")]
    UnknownBusiness(String),
    #[error("invalid configuration: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, TrackerError>;
