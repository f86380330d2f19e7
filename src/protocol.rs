use reqwest::Method;
use serde_json::{json, Value};

use crate::types::{ApiVersion, ZoneMode};

pub const V1_BASE_URL: &str = "https://my.geniushub.co.uk/v1/";
pub const V3_PORT: u16 = 1223;

pub(crate) const ZONES_PATH: &str = "zones";
pub(crate) const DEVICES_PATH: &str = "devices";
pub(crate) const ISSUES_PATH: &str = "issues";
pub(crate) const DATA_MANAGER_PATH: &str = "data_manager";
pub(crate) const VERSION_PATH: &str = "version";

pub(crate) const V3_VERSION_PLACEHOLDER: &str = "unable to determine via v3 API";

pub fn v3_base_url(hub_address: &str) -> String {
    format!("http://{hub_address}:{V3_PORT}/v3/")
}

/// A control request, ready to hand to the transport.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Command {
    pub method: Method,
    pub path: String,
    pub body: Value,
}

pub(crate) fn set_mode_command(api: ApiVersion, zone_id: &str, mode: &ZoneMode) -> Command {
    match api {
        ApiVersion::V1 => Command {
            method: Method::PUT,
            path: format!("zones/{zone_id}/mode"),
            body: json!(mode.as_api_str()),
        },
        ApiVersion::V3 => Command {
            method: Method::PATCH,
            path: format!("zone/{zone_id}"),
            body: json!({ "iMode": mode.code() }),
        },
    }
}

pub(crate) fn set_override_command(
    api: ApiVersion,
    zone_id: &str,
    duration_secs: i64,
    setpoint: f64,
) -> Command {
    match api {
        ApiVersion::V1 => Command {
            method: Method::POST,
            path: format!("zones/{zone_id}/override"),
            body: json!({ "duration": duration_secs, "setpoint": setpoint }),
        },
        ApiVersion::V3 => Command {
            method: Method::PATCH,
            path: format!("zone/{zone_id}"),
            body: json!({
                "iMode": ZoneMode::Override.code(),
                "iBoostTimeRemaining": duration_secs,
                "fBoostSP": setpoint,
            }),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn v3_url_uses_hub_port() {
        assert_eq!(v3_base_url("192.168.1.20"), "http://192.168.1.20:1223/v3/");
    }

    #[test]
    fn v1_mode_sends_name() {
        let cmd = set_mode_command(ApiVersion::V1, "3", &ZoneMode::Footprint);
        assert_eq!(cmd.method, Method::PUT);
        assert_eq!(cmd.path, "zones/3/mode");
        assert_eq!(cmd.body, json!("footprint"));
    }

    #[test]
    fn v3_mode_sends_code() {
        for (mode, code) in [
            (ZoneMode::Off, 1),
            (ZoneMode::Timer, 2),
            (ZoneMode::Footprint, 4),
            (ZoneMode::Override, 16),
        ] {
            let cmd = set_mode_command(ApiVersion::V3, "3", &mode);
            assert_eq!(cmd.method, Method::PATCH);
            assert_eq!(cmd.path, "zone/3");
            assert_eq!(cmd.body, json!({ "iMode": code }));
        }
    }

    #[test]
    fn v1_override_payload() {
        let cmd = set_override_command(ApiVersion::V1, "7", 3600, 19.5);
        assert_eq!(cmd.method, Method::POST);
        assert_eq!(cmd.path, "zones/7/override");
        assert_eq!(cmd.body, json!({ "duration": 3600, "setpoint": 19.5 }));
    }

    #[test]
    fn v3_override_payload() {
        let cmd = set_override_command(ApiVersion::V3, "7", 3600, 19.5);
        assert_eq!(cmd.method, Method::PATCH);
        assert_eq!(cmd.path, "zone/7");
        assert_eq!(
            cmd.body,
            json!({ "iMode": 16, "iBoostTimeRemaining": 3600, "fBoostSP": 19.5 })
        );
    }
}
