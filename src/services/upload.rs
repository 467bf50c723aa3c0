//! Uploaded media file as received from a form

use chrono::Utc;

#[derive(Debug, Clone)]
pub struct Upload {
    pub file_name: Option<String>,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl Upload {
    pub fn new(file_name: Option<String>, content_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            file_name,
            content_type: content_type.into(),
            bytes,
        }
    }

    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }
}

/// Milliseconds since the epoch, used to name uploaded objects
pub(crate) fn upload_stamp() -> i64 {
    Utc::now().timestamp_millis()
}
