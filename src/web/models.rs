//! Contains the data models for API requests and responses.

use serde::{Deserialize, Serialize};

use crate::engine::LogRow;

/// Plain acknowledgement, optionally naming the roast log that was written.
#[derive(Serialize, Deserialize, Debug, PartialEq)]
pub struct MessageResponse {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log: Option<String>,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            log: None,
        }
    }

    pub fn with_log(mut self, log: Option<String>) -> Self {
        self.log = log;
        self
    }
}

/// Response for POST /start_preheat.
#[derive(Serialize, Deserialize, Debug)]
pub struct PreheatResponse {
    pub message: String,
    pub target_temperature: f64,
}

/// Response for GET /roast_logs.
#[derive(Serialize, Deserialize, Debug)]
pub struct LogsResponse {
    pub logs: Vec<String>,
}

/// Response for GET /roast_log/{filename}.
#[derive(Serialize, Deserialize, Debug)]
pub struct LogResponse {
    pub data: Vec<LogRow>,
}

/// Response for GET /profiles.
#[derive(Serialize, Deserialize, Debug)]
pub struct ProfilesResponse {
    pub profiles: Vec<String>,
}
