//! Wire protocol types for controller-device communication.
//!
//! One JSON object per frame:
//! - **Requests** (controller → device): `_id`, `_type` tag, command fields
//! - **Responses** (device → controller): `_id`, `_type`, optional `error`, result fields

use serde::{Deserialize, Deserializer, Serialize};

/// Vibration pattern used when the caller does not supply one (milliseconds).
pub const DEFAULT_VIBRATE_PATTERN: [u32; 6] = [100, 500, 500, 500, 500, 500];

/// Language tag sent with speech requests.
pub const DEFAULT_LANGUAGE: &str = "en-US";

/// Unique identifier for one outstanding request.
///
/// 32 lowercase hex characters (UUID v4, simple form). Collisions within a
/// session are not handled; generator entropy is the mitigation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(String);

impl RequestId {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4().simple().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<&str> for RequestId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Request frame: identifier plus a tagged command.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Request {
    #[serde(rename = "_id")]
    pub id: RequestId,
    #[serde(flatten)]
    pub command: Command,
}

impl Request {
    pub fn new(id: RequestId, command: Command) -> Self {
        Self { id, command }
    }
}

/// Commands understood by the device, tagged by `_type`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "_type")]
pub enum Command {
    #[serde(rename = "wf_api_get_device_info_request")]
    GetDeviceInfo {
        query: DeviceInfoQuery,
        #[serde(default, skip_serializing_if = "std::ops::Not::not")]
        refresh: bool,
    },

    #[serde(rename = "wf_api_get_var_request")]
    GetVar { name: String },

    #[serde(rename = "wf_api_set_device_info_request")]
    SetDeviceInfo { field: String, value: String },

    #[serde(rename = "wf_api_say_request")]
    Say { text: String, lang: String },

    #[serde(rename = "wf_api_listen_request")]
    Listen {
        transcribe: bool,
        phrases: Vec<String>,
        /// Seconds the device listens before giving up.
        timeout: u64,
        alt_lang: String,
    },

    #[serde(rename = "wf_api_vibrate_request")]
    Vibrate { pattern: Vec<u32> },

    #[serde(rename = "wf_api_set_led_request")]
    SetLed { effect: LedEffect, args: LedArgs },

    #[serde(rename = "wf_api_terminate_request")]
    Terminate,
}

impl Command {
    pub fn device_info(query: DeviceInfoQuery) -> Self {
        Self::GetDeviceInfo {
            query,
            refresh: false,
        }
    }

    pub fn say(text: impl Into<String>, lang: impl Into<String>) -> Self {
        Self::Say {
            text: text.into(),
            lang: lang.into(),
        }
    }

    pub fn vibrate() -> Self {
        Self::Vibrate {
            pattern: DEFAULT_VIBRATE_PATTERN.to_vec(),
        }
    }

    /// Wire tag for logging.
    pub fn type_tag(&self) -> &'static str {
        match self {
            Self::GetDeviceInfo { .. } => "wf_api_get_device_info_request",
            Self::GetVar { .. } => "wf_api_get_var_request",
            Self::SetDeviceInfo { .. } => "wf_api_set_device_info_request",
            Self::Say { .. } => "wf_api_say_request",
            Self::Listen { .. } => "wf_api_listen_request",
            Self::Vibrate { .. } => "wf_api_vibrate_request",
            Self::SetLed { .. } => "wf_api_set_led_request",
            Self::Terminate => "wf_api_terminate_request",
        }
    }
}

/// Device attribute selectable by `wf_api_get_device_info_request`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceInfoQuery {
    Id,
    Name,
    Battery,
    #[serde(rename = "latlong")]
    LatLong,
    IndoorLocation,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LedEffect {
    Static,
    Off,
    Rainbow,
    Rotate,
    Flash,
    Breathe,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedArgs {
    pub colors: LedColors,
}

impl LedArgs {
    /// Whole ring lit with one hex color (e.g. `FFFFFF`).
    pub fn ring(color: impl Into<String>) -> Self {
        Self {
            colors: LedColors {
                ring: color.into(),
            },
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedColors {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub ring: String,
}

/// Response frame from the device.
///
/// Result fields are all optional; which ones are populated depends on the
/// request that produced the response.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Response {
    #[serde(rename = "_id")]
    pub id: RequestId,
    #[serde(rename = "_type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    /// Non-empty means the request failed on the device.
    #[serde(
        default,
        deserialize_with = "deserialize_error",
        skip_serializing_if = "Option::is_none"
    )]
    pub error: Option<String>,

    #[serde(rename = "id", default, skip_serializing_if = "Option::is_none")]
    pub device_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub battery: Option<i64>,
    #[serde(rename = "latlong", default, skip_serializing_if = "Option::is_none")]
    pub lat_long: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub indoor_location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub button: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub taps: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notification_state: Option<String>,
}

impl Response {
    /// Remote failure message, if the device reported one.
    pub fn remote_error(&self) -> Option<&str> {
        self.error.as_deref().filter(|e| !e.is_empty())
    }
}

/// `error` is untyped on the wire: null, a string, or occasionally a JSON
/// object. Strings pass through (empty means no error); anything else is
/// kept as its JSON text.
fn deserialize_error<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        None | Some(serde_json::Value::Null) => None,
        Some(serde_json::Value::String(s)) if s.is_empty() => None,
        Some(serde_json::Value::String(s)) => Some(s),
        Some(other) => Some(other.to_string()),
    })
}
