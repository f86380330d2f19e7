//! Conversion of v3 records into the v1 shape.
//!
//! Every conversion is a pure function of its input. For a v1 client the
//! records already have the v1 shape and are passed through untouched.
//! A v3 record lacking a field the conversion needs is a [`Error::Schema`]:
//! it means the hub changed its contract, so nothing is defaulted.

use serde::de::DeserializeOwned;
use serde_json::{json, Map, Value};
use tracing::{trace, warn};

use crate::graph::PollResult;
use crate::types::{ApiVersion, DeviceRecord, Issue, ZoneMode, ZoneRecord, ZoneType};
use crate::vocabulary::IssueVocabulary;
use crate::{Error, Result};

/// Bit of `iFlagExpectedKit` marking a zone that expects a PIR sensor.
const KIT_PIR: i64 = 4;

/// Node addresses that are hub-internal rather than real devices.
const RESERVED_ADDRESSES: &[&str] = &["1", "WeatherData"];

/// Raw records as fetched, before normalization.
#[derive(Debug, Clone, Default)]
pub struct RawPoll {
    pub zones: Vec<Value>,
    pub devices: Vec<Value>,
    pub issues: Vec<Value>,
}

#[derive(Debug, Clone)]
pub struct Normalizer {
    api: ApiVersion,
    vocabulary: IssueVocabulary,
}

impl Normalizer {
    pub fn new(api: ApiVersion, vocabulary: IssueVocabulary) -> Self {
        Self { api, vocabulary }
    }

    pub fn api_version(&self) -> ApiVersion {
        self.api
    }

    pub fn zone(&self, raw: Value) -> Result<Value> {
        match self.api {
            ApiVersion::V1 => Ok(raw),
            ApiVersion::V3 => convert_zone(&raw),
        }
    }

    pub fn device(&self, raw: Value) -> Result<Value> {
        match self.api {
            ApiVersion::V1 => Ok(raw),
            ApiVersion::V3 => convert_device(&raw),
        }
    }

    pub fn issue(&self, raw: Value) -> Result<Value> {
        match self.api {
            ApiVersion::V1 => Ok(raw),
            ApiVersion::V3 => convert_issue(&raw, &self.vocabulary),
        }
    }

    /// Normalize a whole poll. Fails on the first bad record, so a caller
    /// never sees a partially converted poll.
    pub fn normalize(&self, raw: RawPoll) -> Result<PollResult> {
        let zones = raw
            .zones
            .into_iter()
            .map(|z| parse_record::<ZoneRecord>("zone", self.zone(z)?))
            .collect::<Result<Vec<_>>>()?;
        let devices = raw
            .devices
            .into_iter()
            .map(|d| parse_record::<DeviceRecord>("device", self.device(d)?))
            .collect::<Result<Vec<_>>>()?;
        let issues = raw
            .issues
            .into_iter()
            .map(|i| parse_record::<Issue>("issue", self.issue(i)?))
            .collect::<Result<Vec<_>>>()?;

        trace!(
            zones = zones.len(),
            devices = devices.len(),
            issues = issues.len(),
            "normalized poll"
        );
        Ok(PollResult {
            zones,
            devices,
            issues,
        })
    }
}

fn parse_record<T: DeserializeOwned>(kind: &str, value: Value) -> Result<T> {
    serde_json::from_value(value).map_err(|e| Error::Schema(format!("{kind} record: {e}")))
}

/// Typed, error-reporting access to the fields of one raw v3 record.
struct Fields<'a> {
    entity: &'static str,
    raw: &'a Value,
}

impl<'a> Fields<'a> {
    fn new(entity: &'static str, raw: &'a Value) -> Self {
        Self { entity, raw }
    }

    fn get(&self, pointer: &str) -> Result<&'a Value> {
        self.raw.pointer(pointer).ok_or_else(|| {
            Error::Schema(format!(
                "v3 {} record has no `{}`",
                self.entity,
                pointer.trim_start_matches('/')
            ))
        })
    }

    fn wrong_type(&self, pointer: &str, expected: &str) -> Error {
        Error::Schema(format!(
            "v3 {} record field `{}` is not {expected}",
            self.entity,
            pointer.trim_start_matches('/')
        ))
    }

    fn int(&self, pointer: &str) -> Result<i64> {
        self.get(pointer)?
            .as_i64()
            .ok_or_else(|| self.wrong_type(pointer, "an integer"))
    }

    fn float(&self, pointer: &str) -> Result<f64> {
        self.get(pointer)?
            .as_f64()
            .ok_or_else(|| self.wrong_type(pointer, "a number"))
    }

    fn flag(&self, pointer: &str) -> Result<bool> {
        self.get(pointer)?
            .as_bool()
            .ok_or_else(|| self.wrong_type(pointer, "a boolean"))
    }

    fn text(&self, pointer: &str) -> Result<&'a str> {
        self.get(pointer)?
            .as_str()
            .ok_or_else(|| self.wrong_type(pointer, "a string"))
    }

    /// An identifier, which the hub sends as either a string or an integer.
    fn id(&self, pointer: &str) -> Result<Value> {
        match self.get(pointer)? {
            v @ (Value::String(_) | Value::Number(_)) => Ok(v.clone()),
            _ => Err(self.wrong_type(pointer, "an identifier")),
        }
    }
}

/// A zone counts as occupied only in footprint mode, with the reactive
/// trigger on, outside the footprint night period.
fn occupancy(footprint_mode: bool, trigger_on: bool, night: bool) -> bool {
    footprint_mode && trigger_on && !night
}

pub(crate) fn convert_zone(raw: &Value) -> Result<Value> {
    let f = Fields::new("zone", raw);
    let type_code = f.int("/iType")?;
    let mode_code = f.int("/iMode")?;
    let zone_type = ZoneType::from_code(type_code);
    let mode = ZoneMode::from_code(mode_code);

    let mut result = Map::new();
    result.insert("id".into(), f.id("/iID")?);
    result.insert("name".into(), json!(f.text("/strName")?));
    result.insert(
        "type".into(),
        match zone_type {
            ZoneType::Unknown(_) => json!(type_code),
            ref known => json!(known.as_api_str()),
        },
    );

    match zone_type {
        ZoneType::ControlSp | ZoneType::Tpi => {
            result.insert("temperature".into(), json!(f.float("/fPV")?));
            result.insert("setpoint".into(), json!(f.float("/fSP")?));
        }
        ZoneType::OnOffTimer => {
            result.insert("setpoint".into(), json!(f.float("/fSP")? != 0.0));
        }
        _ => {}
    }

    result.insert(
        "mode".into(),
        match mode {
            ZoneMode::Unknown(_) => json!(mode_code),
            ref known => json!(known.as_api_str()),
        },
    );

    if f.int("/iFlagExpectedKit")? & KIT_PIR != 0 {
        let trigger_on = f.flag("/objFootprint/objReactive/bTriggerOn")?;
        let night = f.flag("/objFootprint/bIsNight")?;
        result.insert(
            "occupied".into(),
            json!(occupancy(mode == ZoneMode::Footprint, trigger_on, night)),
        );
    }

    if matches!(
        zone_type,
        ZoneType::OnOffTimer | ZoneType::ControlSp | ZoneType::Tpi
    ) {
        let boost = f.float("/fBoostSP")?;
        let setpoint = if zone_type == ZoneType::OnOffTimer {
            json!(boost != 0.0)
        } else {
            json!(boost)
        };
        result.insert(
            "override".into(),
            json!({
                "duration": f.int("/iBoostTimeRemaining")?,
                "setpoint": setpoint,
            }),
        );
        result.insert("schedule".into(), json!({}));
    }

    Ok(Value::Object(result))
}

pub(crate) fn convert_device(raw: &Value) -> Result<Value> {
    let f = Fields::new("device", raw);

    let mut result = Map::new();
    result.insert("id".into(), f.id("/addr")?);

    match raw.pointer("/childNodes/_cfg/childValues") {
        Some(Value::Object(cfg)) if !cfg.is_empty() => {
            result.insert(
                "type".into(),
                json!(f.text("/childNodes/_cfg/childValues/name/val")?),
            );
            if let Some(sku) = cfg.get("sku").and_then(|s| s.get("val")) {
                result.insert("sku".into(), sku.clone());
            }
        }
        _ => {
            result.insert("type".into(), Value::Null);
        }
    }

    let location = raw
        .pointer("/childValues/location/val")
        .and_then(Value::as_str)
        .filter(|name| !name.is_empty());
    result.insert("assignedZones".into(), json!([{ "name": location }]));
    result.insert("state".into(), json!({}));

    Ok(Value::Object(result))
}

pub(crate) fn convert_issue(raw: &Value, vocabulary: &IssueVocabulary) -> Result<Value> {
    let f = Fields::new("issue", raw);
    let id = f.text("/id")?;
    let code = f.int("/level")?;
    let zone_name = f.text("/zone_name")?;

    let description = vocabulary.describe(id, zone_name).unwrap_or_else(|| {
        warn!(issue = id, zone = zone_name, "unmapped issue id");
        format!("Unknown issue '{id}' in {zone_name}")
    });
    let level = match vocabulary.level(code) {
        Some(level) => json!(level.as_api_str()),
        None => {
            warn!(issue = id, level = code, "unmapped issue level");
            json!(code)
        }
    };

    Ok(json!({ "description": description, "level": level }))
}

fn is_reserved(addr: &str) -> bool {
    RESERVED_ADDRESSES.contains(&addr)
}

/// Zones from the `data` member of a v3 `zones` response.
pub fn extract_zones(data: Value) -> Result<Vec<Value>> {
    match data {
        Value::Array(zones) => Ok(zones),
        other => Err(Error::Schema(format!(
            "v3 zones payload is not a list: {other}"
        ))),
    }
}

/// Devices from the nested tree of a v3 `data_manager` response.
pub fn extract_devices_from_data_manager(tree: &Value) -> Result<Vec<Value>> {
    let Some(Value::Object(groups)) = tree.get("childNodes") else {
        return Err(Error::Schema(
            "v3 data_manager payload has no `childNodes`".to_string(),
        ));
    };

    let mut result = Vec::new();
    for (group_key, group) in groups {
        if is_reserved(group_key) {
            continue;
        }
        let Some(Value::Object(nodes)) = group.get("childNodes") else {
            return Err(Error::Schema(format!(
                "v3 data_manager group `{group_key}` has no `childNodes`"
            )));
        };
        for (addr, device) in nodes {
            let reported = device.get("addr").and_then(Value::as_str);
            if is_reserved(addr) || reported.is_some_and(is_reserved) {
                continue;
            }
            result.push(device.clone());
        }
    }
    Ok(result)
}

/// Devices listed in each zone's `nodes` member of a v3 `zones` response.
pub fn extract_devices_from_zones(zones: &[Value]) -> Vec<Value> {
    zones
        .iter()
        .filter_map(|zone| zone.get("nodes").and_then(Value::as_array))
        .flatten()
        .filter(|device| {
            !device
                .get("addr")
                .and_then(Value::as_str)
                .is_some_and(is_reserved)
        })
        .cloned()
        .collect()
}

/// Issues listed in each zone's `lstIssues` member, each stamped with the
/// name of the zone it came from.
pub fn extract_issues_from_zones(zones: &[Value]) -> Result<Vec<Value>> {
    let mut result = Vec::new();
    for zone in zones {
        let f = Fields::new("zone", zone);
        let issues = f
            .get("/lstIssues")?
            .as_array()
            .ok_or_else(|| f.wrong_type("/lstIssues", "a list"))?;
        if issues.is_empty() {
            continue;
        }
        let zone_name = f.text("/strName")?;
        for issue in issues {
            let mut issue = issue.clone();
            if let Some(fields) = issue.as_object_mut() {
                fields.insert("zone_name".into(), json!(zone_name));
            }
            result.push(issue);
        }
    }
    Ok(result)
}
