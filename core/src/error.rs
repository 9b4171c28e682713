use std::time::Duration;

use thiserror::Error;

use crate::models::EntryKind;

/// A form value rejected before any store call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct ValidationError(pub String);

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("No usable storage backend: {0}")]
    Unavailable(String),

    #[error("Store has not been opened")]
    NotOpen,

    #[error("{kind} entry {id} not found")]
    NotFound { kind: EntryKind, id: i64 },

    #[error("Failed to write to store: {0}")]
    Write(String),

    #[error("Failed to read from store: {0}")]
    Read(String),

    #[error("Store operation timed out after {0:?}")]
    Timeout(Duration),
}

impl StoreError {
    pub(crate) fn write(err: impl std::fmt::Display) -> Self {
        StoreError::Write(err.to_string())
    }

    pub(crate) fn read(err: impl std::fmt::Display) -> Self {
        StoreError::Read(err.to_string())
    }
}

#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("{0}")]
    PermissionDenied(String),

    #[error("Camera is not available: {0}")]
    Unavailable(String),

    #[error("Failed to capture image: {0}")]
    Device(String),

    #[error("Image Error: {0}")]
    Image(#[from] image::ImageError),

    #[error("IO Error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid image data: {0}")]
    InvalidData(String),
}

#[derive(Debug, Error)]
pub enum ViewError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Capture(#[from] CaptureError),

    #[error("Storage is unavailable; the diary is read-only")]
    ReadOnly,

    #[error("No form is open")]
    NoForm,

    #[error("{kind} entry {id} is not in the list for {date}")]
    NotListed { kind: EntryKind, id: i64, date: String },
}
