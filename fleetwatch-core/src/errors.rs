use thiserror::Error;

#[derive(Error, Debug)]
#[error(transparent)]
pub struct FleetError(Box<ErrorKind>);

#[derive(Error, Debug)]
pub enum ErrorKind {
    #[error("HttpError: {0}")]
    Http(#[from] reqwest::Error),
    #[error("HttpStatusError: {endpoint} responded with status {status}")]
    Status { endpoint: String, status: u16 },
    #[error("UnsupportedOperation: {0}")]
    Unsupported(String),
    #[error("SerdeJsonError: {0}")]
    SerdeJson(#[from] serde_json::Error),
    #[error("CsvError: {0}")]
    Csv(#[from] csv::Error),
    #[error("IoError: {0}")]
    Io(#[from] std::io::Error),
    #[error("InvalidDate: {0}")]
    Date(#[from] chrono::ParseError),
    #[error("TomlError: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("ValidationError: {0}")]
    Validation(#[from] ValidationError),
}

impl<E> From<E> for FleetError
where
    ErrorKind: From<E>,
{
    fn from(err: E) -> Self {
        FleetError(Box::new(ErrorKind::from(err)))
    }
}

impl FleetError {
    pub fn kind(&self) -> &ErrorKind {
        &self.0
    }

    /// Network, HTTP status and undecodable-response failures. Listing
    /// callers recover from these with placeholder data.
    pub fn is_transport(&self) -> bool {
        matches!(
            *self.0,
            ErrorKind::Http(_)
                | ErrorKind::Status { .. }
                | ErrorKind::Unsupported(_)
                | ErrorKind::SerdeJson(_)
        )
    }

    pub fn validation(&self) -> Option<&ValidationError> {
        match &*self.0 {
            ErrorKind::Validation(err) => Some(err),
            _ => None,
        }
    }
}

/// User input rejected before any request is issued.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("invalid page number '{input}', expected a value between 1 and {total_pages}")]
    InvalidPageNumber { input: String, total_pages: usize },
    #[error("page size must be greater than zero")]
    ZeroPageSize,
    #[error("unsupported import file '{name}', expected an Excel file (.xls or .xlsx)")]
    UnsupportedImportFile { name: String },
}
