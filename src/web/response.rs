use axum::{http::StatusCode, Json};
use serde::Serialize;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope<T> {
    pub status_code: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

pub type ApiResponse<T> = (StatusCode, Json<Envelope<T>>);

pub fn data<T: Serialize>(status: StatusCode, data: T) -> ApiResponse<T> {
    (
        status,
        Json(Envelope {
            status_code: status.as_u16(),
            message: None,
            data: Some(data),
        }),
    )
}

pub fn message_with<T: Serialize>(status: StatusCode, message: &str, data: T) -> ApiResponse<T> {
    (
        status,
        Json(Envelope {
            status_code: status.as_u16(),
            message: Some(message.to_string()),
            data: Some(data),
        }),
    )
}
