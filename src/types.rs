use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

use crate::Error;

/// Which hub API a client talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ApiVersion {
    /// Cloud API, authenticated by the hub token.
    V1,
    /// On-premises API, authenticated with username and password.
    V3,
}

impl ApiVersion {
    pub fn default_timeout(self) -> Duration {
        match self {
            ApiVersion::V1 => Duration::from_secs(120),
            ApiVersion::V3 => Duration::from_secs(20),
        }
    }

    /// Advisory interval for whoever schedules `update` calls.
    pub fn default_poll_interval(self) -> Duration {
        match self {
            ApiVersion::V1 => Duration::from_secs(60),
            ApiVersion::V3 => Duration::from_secs(10),
        }
    }
}

/// A vocabulary value as it appears in a normalized record: either its
/// name, or the raw numeric code when the normalizer had no name for it.
#[derive(Deserialize)]
#[serde(untagged)]
enum WireText {
    Name(String),
    Code(i64),
}

impl WireText {
    fn into_text(self) -> String {
        match self {
            WireText::Name(s) => s,
            WireText::Code(c) => c.to_string(),
        }
    }
}

fn deserialize_id<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
    Ok(WireText::deserialize(d)?.into_text())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ZoneType {
    Manager,
    OnOffTimer,
    ControlSp,
    ControlOnOffPid,
    Tpi,
    Surrogate,
    Unknown(String),
}

impl ZoneType {
    pub fn from_code(code: i64) -> Self {
        match code {
            1 => ZoneType::Manager,
            2 => ZoneType::OnOffTimer,
            3 => ZoneType::ControlSp,
            4 => ZoneType::ControlOnOffPid,
            5 => ZoneType::Tpi,
            6 => ZoneType::Surrogate,
            other => ZoneType::Unknown(other.to_string()),
        }
    }

    pub fn as_api_str(&self) -> &str {
        match self {
            ZoneType::Manager => "manager",
            ZoneType::OnOffTimer => "on / off",
            ZoneType::ControlSp => "radiator",
            ZoneType::ControlOnOffPid => "wet underfloor",
            ZoneType::Tpi => "hot water temperature",
            ZoneType::Surrogate => "group",
            ZoneType::Unknown(raw) => raw,
        }
    }

    pub fn from_api_str(s: &str) -> Self {
        match s {
            "manager" => ZoneType::Manager,
            "on / off" => ZoneType::OnOffTimer,
            "radiator" => ZoneType::ControlSp,
            "wet underfloor" => ZoneType::ControlOnOffPid,
            "hot water temperature" => ZoneType::Tpi,
            "group" => ZoneType::Surrogate,
            other => ZoneType::Unknown(other.to_string()),
        }
    }
}

impl Serialize for ZoneType {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(self.as_api_str())
    }
}

impl<'de> Deserialize<'de> for ZoneType {
    fn deserialize<D: Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        Ok(match WireText::deserialize(d)? {
            WireText::Name(name) => ZoneType::from_api_str(&name),
            WireText::Code(code) => ZoneType::Unknown(code.to_string()),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ZoneMode {
    Off,
    Timer,
    Footprint,
    Away,
    Override,
    Early,
    Test,
    Linked,
    Other,
    /// A mode the hub reported that has no name here; holds the raw text or code.
    Unknown(String),
}

impl ZoneMode {
    pub fn from_code(code: i64) -> Self {
        match code {
            1 => ZoneMode::Off,
            2 => ZoneMode::Timer,
            4 => ZoneMode::Footprint,
            8 => ZoneMode::Away,
            16 => ZoneMode::Override,
            32 => ZoneMode::Early,
            64 => ZoneMode::Test,
            128 => ZoneMode::Linked,
            256 => ZoneMode::Other,
            other => ZoneMode::Unknown(other.to_string()),
        }
    }

    pub fn code(&self) -> Option<i64> {
        match self {
            ZoneMode::Off => Some(1),
            ZoneMode::Timer => Some(2),
            ZoneMode::Footprint => Some(4),
            ZoneMode::Away => Some(8),
            ZoneMode::Override => Some(16),
            ZoneMode::Early => Some(32),
            ZoneMode::Test => Some(64),
            ZoneMode::Linked => Some(128),
            ZoneMode::Other => Some(256),
            ZoneMode::Unknown(_) => None,
        }
    }

    pub fn as_api_str(&self) -> &str {
        match self {
            ZoneMode::Off => "off",
            ZoneMode::Timer => "timer",
            ZoneMode::Footprint => "footprint",
            ZoneMode::Away => "away",
            ZoneMode::Override => "override",
            ZoneMode::Early => "early",
            ZoneMode::Test => "test",
            ZoneMode::Linked => "linked",
            ZoneMode::Other => "other",
            ZoneMode::Unknown(raw) => raw,
        }
    }

    pub fn from_api_str(s: &str) -> Option<Self> {
        match s {
            "off" => Some(ZoneMode::Off),
            "timer" => Some(ZoneMode::Timer),
            "footprint" => Some(ZoneMode::Footprint),
            "away" => Some(ZoneMode::Away),
            "override" => Some(ZoneMode::Override),
            "early" => Some(ZoneMode::Early),
            "test" => Some(ZoneMode::Test),
            "linked" => Some(ZoneMode::Linked),
            "other" => Some(ZoneMode::Other),
            _ => None,
        }
    }

    /// Modes a caller may switch a zone into.
    pub fn is_settable(&self) -> bool {
        matches!(
            self,
            ZoneMode::Off | ZoneMode::Timer | ZoneMode::Footprint | ZoneMode::Override
        )
    }
}

impl fmt::Display for ZoneMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_api_str())
    }
}

impl FromStr for ZoneMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ZoneMode::from_api_str(s).ok_or_else(|| Error::InvalidArgument(format!("unknown zone mode: {s}")))
    }
}

impl Serialize for ZoneMode {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(self.as_api_str())
    }
}

impl<'de> Deserialize<'de> for ZoneMode {
    fn deserialize<D: Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        Ok(match WireText::deserialize(d)? {
            WireText::Name(name) => ZoneMode::from_api_str(&name).unwrap_or(ZoneMode::Unknown(name)),
            WireText::Code(code) => ZoneMode::Unknown(code.to_string()),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IssueLevel {
    Error,
    Warning,
    Information,
    /// Severity with no known name; holds the raw text or code.
    Unknown(String),
}

impl IssueLevel {
    pub fn as_api_str(&self) -> &str {
        match self {
            IssueLevel::Error => "error",
            IssueLevel::Warning => "warning",
            IssueLevel::Information => "information",
            IssueLevel::Unknown(raw) => raw,
        }
    }

    pub fn from_api_str(s: &str) -> Self {
        match s {
            "error" => IssueLevel::Error,
            "warning" => IssueLevel::Warning,
            "information" | "info" => IssueLevel::Information,
            other => IssueLevel::Unknown(other.to_string()),
        }
    }
}

impl Serialize for IssueLevel {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(self.as_api_str())
    }
}

impl<'de> Deserialize<'de> for IssueLevel {
    fn deserialize<D: Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        Ok(match WireText::deserialize(d)? {
            WireText::Name(name) => IssueLevel::from_api_str(&name),
            WireText::Code(code) => IssueLevel::Unknown(code.to_string()),
        })
    }
}

/// A zone setpoint: a temperature, or on/off for switched zones.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Setpoint {
    Switch(bool),
    Celsius(f64),
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Override {
    /// Seconds remaining.
    pub duration: i64,
    pub setpoint: Setpoint,
}

/// A zone in the v1 shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZoneRecord {
    #[serde(deserialize_with = "deserialize_id")]
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub zone_type: ZoneType,
    pub mode: ZoneMode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub setpoint: Option<Setpoint>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub occupied: Option<bool>,
    #[serde(rename = "override", default, skip_serializing_if = "Option::is_none")]
    pub override_state: Option<Override>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schedule: Option<Map<String, Value>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssignedZone {
    #[serde(default)]
    pub name: Option<String>,
}

/// A device in the v1 shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceRecord {
    #[serde(deserialize_with = "deserialize_id")]
    pub id: String,
    #[serde(rename = "type", default)]
    pub device_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sku: Option<String>,
    #[serde(rename = "assignedZones", default)]
    pub assigned_zones: Vec<AssignedZone>,
    #[serde(default)]
    pub state: Map<String, Value>,
}

impl DeviceRecord {
    /// Name of the zone the device reports itself assigned to, if any.
    pub fn zone_name(&self) -> Option<&str> {
        self.assigned_zones.first().and_then(|z| z.name.as_deref())
    }
}

/// A diagnostic reported by the hub. Issues carry no identity and are
/// replaced wholesale on every update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Issue {
    pub description: String,
    pub level: IssueLevel,
}
