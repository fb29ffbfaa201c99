use serde::Serialize;

/// `{ "data": ... }`
#[derive(Debug, Serialize)]
pub struct DataResponse<T> {
    pub data: T,
}

/// `{ "message": ..., "data": ... }`, `data` omitted when absent.
#[derive(Debug, Serialize)]
pub struct MessageResponse<T> {
    pub message: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T> MessageResponse<T> {
    pub fn with_data(message: &'static str, data: T) -> Self {
        Self {
            message,
            data: Some(data),
        }
    }
}

impl MessageResponse<()> {
    pub fn message(message: &'static str) -> Self {
        Self {
            message,
            data: None,
        }
    }
}
