//! Bridge channel protocol types.
//!
//! Defines the JSON envelope used for communication between the embedded
//! webmail context and the host context over the shared message channel.
//!
//! The channel is shared with unrelated traffic and gives no ordering
//! guarantee across request ids, so the codec is deliberately tolerant:
//! anything that does not look like a bridge message is dropped, not errored.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Operations the host dispatcher serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Action {
    PickFile,
    SaveFile,
    SaveFiles,
    CreateShareLink,
    GetCalendars,
    AddToCalendar,
}

impl Action {
    /// Parse a wire action name. `None` for actions this bridge does not serve.
    pub fn from_wire(name: &str) -> Option<Action> {
        match name {
            "pickFile" => Some(Action::PickFile),
            "saveFile" => Some(Action::SaveFile),
            "saveFiles" => Some(Action::SaveFiles),
            "createShareLink" => Some(Action::CreateShareLink),
            "getCalendars" => Some(Action::GetCalendars),
            "addToCalendar" => Some(Action::AddToCalendar),
            _ => None,
        }
    }
}

/// A file handed back by the host's picker.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileDescriptor {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    /// File bytes as base64 text, when the picker loads content eagerly.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

/// A file sent from the embedded context for storage.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilePayload {
    pub filename: String,
    /// File bytes as base64 text.
    pub content: String,
    pub mime_type: String,
}

/// A calendar visible to the current identity.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalendarDescriptor {
    pub url: String,
    pub display_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

/// Result of `createShareLink`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShareLink {
    pub url: String,
    pub filename: String,
}

/// Result of `addToCalendar` (see the upsert reconciler).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpsertOutcome {
    pub updated: bool,
    pub uid: String,
}

fn default_true() -> bool {
    true
}

/// Action-specific request fields, discriminated by the `action` key.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum RequestBody {
    #[serde(rename_all = "camelCase")]
    PickFile {
        #[serde(default = "default_true")]
        multiple: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        mime_types: Option<Vec<String>>,
    },
    #[serde(rename_all = "camelCase")]
    SaveFile {
        filename: String,
        /// File bytes as base64 text.
        content: String,
        mime_type: String,
    },
    SaveFiles {
        files: Vec<FilePayload>,
    },
    CreateShareLink {},
    GetCalendars {},
    #[serde(rename_all = "camelCase")]
    AddToCalendar {
        calendar_url: String,
        ics_content: String,
    },
}

impl RequestBody {
    pub fn action(&self) -> Action {
        match self {
            RequestBody::PickFile { .. } => Action::PickFile,
            RequestBody::SaveFile { .. } => Action::SaveFile,
            RequestBody::SaveFiles { .. } => Action::SaveFiles,
            RequestBody::CreateShareLink {} => Action::CreateShareLink,
            RequestBody::GetCalendars {} => Action::GetCalendars,
            RequestBody::AddToCalendar { .. } => Action::AddToCalendar,
        }
    }
}

/// Request sent from the embedded context to the host.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Request {
    #[serde(rename = "requestId")]
    pub request_id: String,
    #[serde(flatten)]
    pub body: RequestBody,
}

impl Request {
    /// Build a request with a fresh caller-generated id.
    pub fn new(body: RequestBody) -> Self {
        Request {
            request_id: format!("req_{}", Uuid::new_v4()),
            body,
        }
    }
}

/// Action-specific response fields.
///
/// Untagged: the variant is implied by the request the response answers.
/// `Empty` must stay last so it only matches when nothing richer does.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ResponseBody {
    Files { files: Vec<FileDescriptor> },
    Path { path: String },
    Share { url: String, filename: String },
    Calendars { calendars: Vec<CalendarDescriptor> },
    Upsert { updated: bool, uid: String },
    Empty {},
}

/// Response sent from the host back to the embedded context.
///
/// Invariant: `error` is present iff `success` is false, and `request_id`
/// always names exactly one prior request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Response {
    #[serde(rename = "requestId")]
    pub request_id: String,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(flatten)]
    pub body: ResponseBody,
}

impl Response {
    pub fn ok(request_id: impl Into<String>, body: ResponseBody) -> Self {
        Response {
            request_id: request_id.into(),
            success: true,
            error: None,
            body,
        }
    }

    pub fn err(request_id: impl Into<String>, error: impl Into<String>) -> Self {
        Response {
            request_id: request_id.into(),
            success: false,
            error: Some(error.into()),
            body: ResponseBody::Empty {},
        }
    }
}

/// A message the codec accepted off the shared channel.
#[derive(Debug)]
pub enum Inbound {
    Request(Request),
    Response(Response),
    /// Well-formed envelope addressed at the bridge, but the action is not
    /// one we serve. Answered with `success:false` rather than dropped.
    UnknownRequest { request_id: String, action: String },
    /// Recognized action whose fields failed validation.
    Invalid { request_id: String, error: String },
}

/// Validate a raw channel value.
///
/// Returns `None` for anything that does not carry a non-empty string
/// `requestId` plus either a boolean `success` (response) or an `action`
/// string (request) — foreign traffic on the shared channel is expected
/// and silently discarded.
pub fn decode(value: &serde_json::Value) -> Option<Inbound> {
    let obj = value.as_object()?;
    let request_id = obj.get("requestId")?.as_str()?;
    if request_id.is_empty() {
        return None;
    }

    match obj.get("success") {
        Some(serde_json::Value::Bool(_)) => serde_json::from_value::<Response>(value.clone())
            .ok()
            .map(Inbound::Response),
        // `success` present but not boolean: not a bridge response.
        Some(_) => None,
        None => {
            let action = obj.get("action")?.as_str()?;
            if Action::from_wire(action).is_none() {
                return Some(Inbound::UnknownRequest {
                    request_id: request_id.to_string(),
                    action: action.to_string(),
                });
            }
            match serde_json::from_value::<Request>(value.clone()) {
                Ok(request) => Some(Inbound::Request(request)),
                Err(e) => Some(Inbound::Invalid {
                    request_id: request_id.to_string(),
                    error: e.to_string(),
                }),
            }
        }
    }
}
