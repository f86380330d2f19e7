use std::time::Duration;

use serde_json::{json, Value};
use tracing::{debug, info};

use crate::graph::{Hub, PollResult, ReconcileSummary};
use crate::logger::{MessageLogMode, MessageLogger};
use crate::normalize::{
    extract_devices_from_data_manager, extract_devices_from_zones, extract_issues_from_zones,
    extract_zones, Normalizer, RawPoll,
};
use crate::protocol::{
    set_mode_command, set_override_command, v3_base_url, Command, DATA_MANAGER_PATH, DEVICES_PATH,
    ISSUES_PATH, V1_BASE_URL, V3_VERSION_PLACEHOLDER, VERSION_PATH, ZONES_PATH,
};
use crate::transport::{Auth, Transport};
use crate::types::{ApiVersion, ZoneMode};
use crate::vocabulary::IssueVocabulary;
use crate::{Error, Result};

/// Lowest and highest override setpoint accepted, in Celsius.
const MIN_SETPOINT_C: f64 = 4.0;
const MAX_SETPOINT_C: f64 = 35.0;

/// Where a v3 client reads its device list from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeviceSource {
    /// The `nodes` embedded in the zones payload; no extra request.
    #[default]
    Zones,
    /// The separate `data_manager` tree.
    DataManager,
}

pub struct GeniusClientBuilder {
    hub_id: String,
    credentials: Option<(String, String)>,
    http: Option<reqwest::Client>,
    base_url: Option<String>,
    timeout: Option<Duration>,
    device_source: DeviceSource,
    vocabulary: IssueVocabulary,
    log_mode: Option<MessageLogMode>,
    log_path: Option<String>,
}

impl GeniusClientBuilder {
    /// `hub_id` is the hub token for the v1 API, or the hub's host name or
    /// address when [`credentials`](Self::credentials) are given.
    pub fn new(hub_id: impl Into<String>) -> Self {
        Self {
            hub_id: hub_id.into(),
            credentials: None,
            http: None,
            base_url: None,
            timeout: None,
            device_source: DeviceSource::default(),
            vocabulary: IssueVocabulary::default(),
            log_mode: None,
            log_path: None,
        }
    }

    /// Talk to the hub's local v3 API with these credentials.
    pub fn credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.credentials = Some((username.into(), password.into()));
        self
    }

    /// Share an existing connection pool instead of creating one.
    pub fn http_client(mut self, http: reqwest::Client) -> Self {
        self.http = Some(http);
        self
    }

    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn device_source(mut self, source: DeviceSource) -> Self {
        self.device_source = source;
        self
    }

    pub fn issue_vocabulary(mut self, vocabulary: IssueVocabulary) -> Self {
        self.vocabulary = vocabulary;
        self
    }

    pub fn message_log(mut self, mode: MessageLogMode, path: impl Into<String>) -> Self {
        self.log_mode = Some(mode);
        self.log_path = Some(path.into());
        self
    }

    pub fn build(self) -> Result<GeniusClient> {
        let api = if self.credentials.is_some() {
            ApiVersion::V3
        } else {
            ApiVersion::V1
        };

        let http = match self.http {
            Some(http) => http,
            None => reqwest::Client::builder().build()?,
        };

        let base_url = match self.base_url {
            Some(url) if url.ends_with('/') => url,
            Some(url) => format!("{url}/"),
            None => match api {
                ApiVersion::V1 => V1_BASE_URL.to_string(),
                ApiVersion::V3 => v3_base_url(&self.hub_id),
            },
        };

        let auth = match &self.credentials {
            Some((username, password)) => Auth::basic(username, password),
            None => Auth::Bearer(self.hub_id.clone()),
        };

        let logger = match (self.log_mode, self.log_path) {
            (Some(mode), Some(path)) => Some(MessageLogger::new(mode, &path)?),
            _ => None,
        };

        let timeout = self.timeout.unwrap_or_else(|| api.default_timeout());
        let hub = Hub::new(&self.hub_id, api);
        info!(hub = %hub.id(), api = ?api, url = %base_url, "created hub client");

        Ok(GeniusClient {
            transport: Transport::new(http, base_url, api, auth, timeout, logger),
            normalizer: Normalizer::new(api, self.vocabulary),
            device_source: self.device_source,
            hub,
        })
    }
}

/// A client for one hub, holding the graph of everything the hub has
/// reported so far.
///
/// Operations take `&mut self`: one request or reconciliation is in flight
/// at a time.
pub struct GeniusClient {
    transport: Transport,
    normalizer: Normalizer,
    device_source: DeviceSource,
    hub: Hub,
}

impl GeniusClient {
    pub fn builder(hub_id: impl Into<String>) -> GeniusClientBuilder {
        GeniusClientBuilder::new(hub_id)
    }

    pub fn api_version(&self) -> ApiVersion {
        self.normalizer.api_version()
    }

    pub fn hub(&self) -> &Hub {
        &self.hub
    }

    /// Fetch zones, devices and issues, normalize them, and merge them into
    /// the hub. The graph is untouched unless every step succeeds.
    pub async fn update(&mut self) -> Result<ReconcileSummary> {
        let poll = self.fetch().await?;
        let summary = self.hub.reconcile(poll);
        debug!(
            hub = %self.hub.id(),
            created_zones = summary.zones_created,
            created_devices = summary.devices_created,
            "hub updated"
        );
        Ok(summary)
    }

    /// Fetch and normalize one poll without touching the graph.
    pub async fn fetch(&mut self) -> Result<PollResult> {
        let raw = match self.api_version() {
            ApiVersion::V1 => self.fetch_v1().await?,
            ApiVersion::V3 => self.fetch_v3().await?,
        };
        self.normalizer.normalize(raw)
    }

    async fn fetch_v1(&mut self) -> Result<RawPoll> {
        let zones = expect_list(ZONES_PATH, self.transport.get(ZONES_PATH).await?)?;
        let devices = expect_list(DEVICES_PATH, self.transport.get(DEVICES_PATH).await?)?;
        let issues = expect_list(ISSUES_PATH, self.transport.get(ISSUES_PATH).await?)?;
        Ok(RawPoll {
            zones,
            devices,
            issues,
        })
    }

    async fn fetch_v3(&mut self) -> Result<RawPoll> {
        let zones = extract_zones(take_data(ZONES_PATH, self.transport.get(ZONES_PATH).await?)?)?;
        let devices = match self.device_source {
            DeviceSource::Zones => extract_devices_from_zones(&zones),
            DeviceSource::DataManager => {
                let tree = take_data(
                    DATA_MANAGER_PATH,
                    self.transport.get(DATA_MANAGER_PATH).await?,
                )?;
                extract_devices_from_data_manager(&tree)?
            }
        };
        let issues = extract_issues_from_zones(&zones)?;
        Ok(RawPoll {
            zones,
            devices,
            issues,
        })
    }

    /// Software version of the hub. Only the v1 API reports one; a v3
    /// client records a placeholder without a request.
    pub async fn version(&mut self) -> Result<&Value> {
        let version = match self.api_version() {
            ApiVersion::V1 => self.transport.get(VERSION_PATH).await?,
            ApiVersion::V3 => json!({ "hubSoftwareVersion": V3_VERSION_PLACEHOLDER }),
        };
        debug!(hub = %self.hub.id(), version = %version, "hub version");
        Ok(self.hub.set_version(version))
    }

    // -- Command methods --

    /// Switch a zone (by id or name) to off, timer, footprint or override.
    /// The change shows up in the graph after the next [`update`](Self::update).
    pub async fn set_mode(&mut self, zone: &str, mode: ZoneMode) -> Result<()> {
        if !mode.is_settable() {
            return Err(Error::InvalidArgument(format!(
                "zone mode cannot be set: {mode}"
            )));
        }
        let zone_id = self.find_zone_id(zone)?;
        let cmd = set_mode_command(self.api_version(), &zone_id, &mode);
        self.send_command("set_mode", &zone_id, cmd).await
    }

    /// Override a zone (by id or name) to `setpoint` °C for `duration_secs`.
    pub async fn set_override(&mut self, zone: &str, duration_secs: i64, setpoint: f64) -> Result<()> {
        validate_override(duration_secs, setpoint)?;
        let zone_id = self.find_zone_id(zone)?;
        let cmd = set_override_command(self.api_version(), &zone_id, duration_secs, setpoint);
        self.send_command("set_override", &zone_id, cmd).await
    }

    // -- Helpers --

    fn find_zone_id(&self, key: &str) -> Result<String> {
        self.hub
            .find_zone(key)
            .map(|z| z.id.clone())
            .ok_or_else(|| Error::InvalidZone(key.to_string()))
    }

    async fn send_command(&mut self, action: &str, zone_id: &str, cmd: Command) -> Result<()> {
        debug!(action, zone = zone_id, url = %self.transport.base_url(), "sending command");
        self.transport.log_command(action, Some(zone_id), &cmd.body);
        self.transport
            .request(cmd.method, &cmd.path, Some(&cmd.body))
            .await?;
        Ok(())
    }
}

fn validate_override(duration_secs: i64, setpoint: f64) -> Result<()> {
    if duration_secs < 0 {
        return Err(Error::InvalidArgument(format!(
            "override duration must not be negative: {duration_secs}s"
        )));
    }
    if !setpoint.is_finite() || !(MIN_SETPOINT_C..=MAX_SETPOINT_C).contains(&setpoint) {
        return Err(Error::InvalidArgument(format!(
            "override setpoint {setpoint} outside {MIN_SETPOINT_C}..={MAX_SETPOINT_C} °C"
        )));
    }
    Ok(())
}

fn expect_list(path: &str, body: Value) -> Result<Vec<Value>> {
    match body {
        Value::Array(items) => Ok(items),
        other => Err(Error::Schema(format!("{path}: expected a list, got {other}"))),
    }
}

/// The `data` member that wraps every v3 payload.
fn take_data(path: &str, body: Value) -> Result<Value> {
    match body {
        Value::Object(mut fields) => fields
            .remove("data")
            .ok_or_else(|| Error::Schema(format!("{path}: response has no `data`"))),
        other => Err(Error::Schema(format!("{path}: expected an object, got {other}"))),
    }
}
