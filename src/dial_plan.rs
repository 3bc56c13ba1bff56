//! Continuation state for multi-step call flows.
//!
//! The provider calls us back once per dial attempt. Everything needed to
//! resume the flow travels in the callback URL's query string, so no server
//! side session exists between attempts.

use serde::Deserialize;
use thiserror::Error;
use url::Url;
use uuid::Uuid;

pub const INBOUND_PATH: &str = "twiml/inbound";
pub const GROUP_DIAL_STATUS_PATH: &str = "twiml/handle-group-dial-status";
pub const SEQUENTIAL_DIAL_PATH: &str = "twiml/sequential-dial";
pub const STATUS_PATH: &str = "twiml/status";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PlanError {
    #[error("missing query parameter `{0}`")]
    Missing(&'static str),
    #[error("invalid query parameter `{name}`: {value}")]
    Invalid { name: &'static str, value: String },
}

/// Raw query of the group ring callback, as the provider sends it back.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupRingParams {
    pub group_id: Option<String>,
    pub call_sid: Option<String>,
    pub from_number: Option<String>,
    pub called_number: Option<String>,
}

/// Raw query of a sequential dial callback.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SequentialDialParams {
    pub group_id: Option<String>,
    pub call_sid: Option<String>,
    pub from_number: Option<String>,
    pub dial_index: Option<String>,
    pub group_number: Option<String>,
}

/// A group ring in flight: which group, which root call, who is calling.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupRing {
    pub group_id: Uuid,
    pub root_call_sid: String,
    pub caller_number: String,
    pub group_number: String,
}

impl GroupRing {
    /// The sequential dial plan that takes over when nobody picks up.
    pub fn fallback_plan(&self) -> DialPlan {
        DialPlan {
            group_id: self.group_id,
            root_call_sid: self.root_call_sid.clone(),
            caller_number: self.caller_number.clone(),
            group_number: self.group_number.clone(),
            dial_index: 0,
        }
    }
}

impl TryFrom<GroupRingParams> for GroupRing {
    type Error = PlanError;

    fn try_from(params: GroupRingParams) -> Result<Self, Self::Error> {
        Ok(Self {
            group_id: parse_uuid("groupId", params.group_id)?,
            root_call_sid: required("callSid", params.call_sid)?,
            caller_number: required("fromNumber", params.from_number)?,
            group_number: required("calledNumber", params.called_number)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DialPlan {
    pub group_id: Uuid,
    pub root_call_sid: String,
    pub caller_number: String,
    pub group_number: String,
    pub dial_index: usize,
}

impl DialPlan {
    /// The plan for the attempt after this one.
    pub fn advance(&self) -> DialPlan {
        DialPlan {
            dial_index: self.dial_index + 1,
            ..self.clone()
        }
    }
}

impl TryFrom<SequentialDialParams> for DialPlan {
    type Error = PlanError;

    fn try_from(params: SequentialDialParams) -> Result<Self, Self::Error> {
        let dial_index = match params.dial_index.as_deref().map(str::trim) {
            None | Some("") => 0,
            Some(raw) => raw.parse().map_err(|_| PlanError::Invalid {
                name: "dialIndex",
                value: raw.to_string(),
            })?,
        };

        Ok(Self {
            group_id: parse_uuid("groupId", params.group_id)?,
            root_call_sid: required("callSid", params.call_sid)?,
            caller_number: required("fromNumber", params.from_number)?,
            group_number: required("groupNumber", params.group_number)?,
            dial_index,
        })
    }
}

fn required(name: &'static str, value: Option<String>) -> Result<String, PlanError> {
    value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .ok_or(PlanError::Missing(name))
}

fn parse_uuid(name: &'static str, value: Option<String>) -> Result<Uuid, PlanError> {
    let raw = required(name, value)?;
    Uuid::parse_str(&raw).map_err(|_| PlanError::Invalid { name, value: raw })
}

/// Builds absolute callback URLs under the service's public base URL.
#[derive(Debug, Clone)]
pub struct CallbackUrls {
    base: Url,
}

impl CallbackUrls {
    pub fn new(public_base_url: &str) -> Result<Self, url::ParseError> {
        let mut base = Url::parse(public_base_url)?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        base.set_query(None);
        Ok(Self { base })
    }

    pub fn base(&self) -> &Url {
        &self.base
    }

    fn endpoint(&self, path: &str) -> Url {
        let mut url = self.base.clone();
        let joined = format!("{}{}", self.base.path(), path);
        url.set_path(&joined);
        url
    }

    /// Generic leg status endpoint, optionally tagged with the caller number.
    pub fn status(&self, from_number: Option<&str>) -> String {
        let mut url = self.endpoint(STATUS_PATH);
        if let Some(from) = from_number.filter(|from| !from.is_empty()) {
            url.query_pairs_mut().append_pair("fromNumber", from);
        }
        url.to_string()
    }

    pub fn group_dial_status(&self, ring: &GroupRing) -> String {
        let mut url = self.endpoint(GROUP_DIAL_STATUS_PATH);
        url.query_pairs_mut()
            .append_pair("groupId", &ring.group_id.to_string())
            .append_pair("callSid", &ring.root_call_sid)
            .append_pair("fromNumber", &ring.caller_number)
            .append_pair("calledNumber", &ring.group_number);
        url.to_string()
    }

    pub fn sequential_dial(&self, plan: &DialPlan) -> String {
        let mut url = self.endpoint(SEQUENTIAL_DIAL_PATH);
        url.query_pairs_mut()
            .append_pair("groupId", &plan.group_id.to_string())
            .append_pair("callSid", &plan.root_call_sid)
            .append_pair("fromNumber", &plan.caller_number)
            .append_pair("dialIndex", &plan.dial_index.to_string())
            .append_pair("groupNumber", &plan.group_number);
        url.to_string()
    }

    /// Full public URL of a request path and query, as the provider signed it.
    pub fn public_url(&self, path_and_query: &str) -> String {
        let trimmed = path_and_query.trim_start_matches('/');
        let mut url = self.base.to_string();
        url.push_str(trimmed);
        url
    }
}
