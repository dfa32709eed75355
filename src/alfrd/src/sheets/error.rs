use std::fmt;

/// Errors that can occur while talking to the spreadsheet API
#[derive(Debug)]
pub enum SheetError {
    /// Service-account key missing, unreadable or rejected
    Credentials(anyhow::Error),

    /// Network request failed
    Network(reqwest::Error),

    /// API returned a non-2XX status code
    Api { status: u16, body: String },

    /// No spreadsheet id could be found in the url
    InvalidUrl(String),

    /// Requested worksheet does not exist in the spreadsheet
    WorksheetNotFound(String),

    /// Operation needs an opened worksheet
    NotOpened,

    /// Malformed A1 range
    InvalidRange(String),
}

impl fmt::Display for SheetError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SheetError::Credentials(e) => write!(f, "Invalid credentials: {:#}", e),
            SheetError::Network(e) => write!(f, "Network request failed: {}", e),
            SheetError::Api { status, body } => write!(f, "Sheets API error {}: {}", status, body),
            SheetError::InvalidUrl(url) => write!(f, "No spreadsheet id found in url '{}'", url),
            SheetError::WorksheetNotFound(ws) => write!(f, "Worksheet '{}' not found", ws),
            SheetError::NotOpened => write!(f, "Worksheet is not opened"),
            SheetError::InvalidRange(range) => write!(f, "Invalid A1 range '{}'", range),
        }
    }
}

impl std::error::Error for SheetError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SheetError::Credentials(e) => Some(e.as_ref()),
            SheetError::Network(e) => Some(e),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for SheetError {
    fn from(err: reqwest::Error) -> Self {
        SheetError::Network(err)
    }
}

impl SheetError {
    pub fn api_error(status: u16, body: String) -> Self {
        SheetError::Api { status, body }
    }

    /// Rate limits and 5XX responses are worth another attempt later.
    pub fn is_retryable(&self) -> bool {
        match self {
            SheetError::Network(_) => true,
            SheetError::Api { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }

    pub fn user_message(&self) -> String {
        match self {
            SheetError::Credentials(_) => "Could not authorize with the service-account key".to_string(),
            SheetError::Network(_) => "Network connection failed while talking to the spreadsheet".to_string(),
            SheetError::Api { status, .. } => format!("Spreadsheet rejected the request with status {}", status),
            SheetError::InvalidUrl(_) => "Spreadsheet url does not contain a spreadsheet id".to_string(),
            SheetError::WorksheetNotFound(ws) => format!("Worksheet '{}' does not exist", ws),
            SheetError::NotOpened => "Open the worksheet first".to_string(),
            SheetError::InvalidRange(range) => format!("'{}' is not a valid range", range),
        }
    }
}

pub type SheetResult<T> = Result<T, SheetError>;
