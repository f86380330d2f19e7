//! The Hub → Zone → Device graph and its reconciliation against polls.
//!
//! The hub owns every zone and device it has ever seen, keyed by id. A zone
//! refers to its devices by id and a device to its zone by id, so there is
//! a single owner for each object. Nothing is ever evicted: an object
//! created by one poll keeps its slot for the life of the hub and later
//! polls update it in place.

use std::collections::{BTreeSet, HashMap};

use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{debug, trace, warn};

use crate::types::{
    ApiVersion, AssignedZone, DeviceRecord, Issue, Override, Setpoint, ZoneMode, ZoneRecord,
    ZoneType,
};

/// One poll's worth of normalized records.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PollResult {
    pub zones: Vec<ZoneRecord>,
    pub devices: Vec<DeviceRecord>,
    pub issues: Vec<Issue>,
}

/// What a reconciliation did, for logging and tests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileSummary {
    pub zones_created: usize,
    pub zones_updated: usize,
    pub devices_created: usize,
    pub devices_updated: usize,
    /// Devices registered at hub level only: no zone, or a zone the hub
    /// does not know.
    pub unassigned_devices: usize,
    /// Zones whose name was already indexed for a different zone id. The
    /// name resolves to the zone seen last.
    pub duplicate_zone_names: usize,
    pub issues: usize,
}

/// Something devices can be attached to: the hub itself, or a zone.
pub trait DeviceOwner {
    fn device_ids(&self) -> Box<dyn Iterator<Item = &str> + '_>;

    fn owns_device(&self, id: &str) -> bool;
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Zone {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub zone_type: ZoneType,
    pub mode: ZoneMode,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub setpoint: Option<Setpoint>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub occupied: Option<bool>,
    #[serde(rename = "override", skip_serializing_if = "Option::is_none")]
    pub override_state: Option<Override>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schedule: Option<Map<String, Value>>,
    #[serde(skip)]
    device_ids: BTreeSet<String>,
}

impl Zone {
    fn from_record(record: ZoneRecord) -> Self {
        let ZoneRecord {
            id,
            name,
            zone_type,
            mode,
            temperature,
            setpoint,
            occupied,
            override_state,
            schedule,
        } = record;
        Self {
            id,
            name,
            zone_type,
            mode,
            temperature,
            setpoint,
            occupied,
            override_state,
            schedule,
            device_ids: BTreeSet::new(),
        }
    }

    fn apply(&mut self, record: ZoneRecord) {
        let ZoneRecord {
            id: _,
            name,
            zone_type,
            mode,
            temperature,
            setpoint,
            occupied,
            override_state,
            schedule,
        } = record;
        self.name = name;
        self.zone_type = zone_type;
        self.mode = mode;
        self.temperature = temperature;
        self.setpoint = setpoint;
        self.occupied = occupied;
        self.override_state = override_state;
        self.schedule = schedule;
    }
}

impl DeviceOwner for Zone {
    fn device_ids(&self) -> Box<dyn Iterator<Item = &str> + '_> {
        Box::new(self.device_ids.iter().map(String::as_str))
    }

    fn owns_device(&self, id: &str) -> bool {
        self.device_ids.contains(id)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Device {
    pub id: String,
    #[serde(rename = "type")]
    pub device_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sku: Option<String>,
    #[serde(rename = "assignedZones")]
    pub assigned_zones: Vec<AssignedZone>,
    pub state: Map<String, Value>,
    #[serde(skip)]
    zone_id: Option<String>,
}

impl Device {
    fn from_record(record: DeviceRecord) -> Self {
        let DeviceRecord {
            id,
            device_type,
            sku,
            assigned_zones,
            state,
        } = record;
        Self {
            id,
            device_type,
            sku,
            assigned_zones,
            state,
            zone_id: None,
        }
    }

    fn apply(&mut self, record: DeviceRecord) {
        let DeviceRecord {
            id: _,
            device_type,
            sku,
            assigned_zones,
            state,
        } = record;
        self.device_type = device_type;
        self.sku = sku;
        self.assigned_zones = assigned_zones;
        self.state = state;
    }

    /// Id of the zone this device is attached to.
    pub fn zone_id(&self) -> Option<&str> {
        self.zone_id.as_deref()
    }
}

/// Shorten long hub tokens so they are safe to show.
fn display_id(hub_id: &str) -> String {
    if hub_id.chars().count() > 20 {
        let prefix: String = hub_id.chars().take(8).collect();
        format!("{prefix}...")
    } else {
        hub_id.to_string()
    }
}

#[derive(Debug, Clone)]
pub struct Hub {
    id: String,
    api_version: ApiVersion,
    version: Option<Value>,
    zones: HashMap<String, Zone>,
    zone_ids_by_name: HashMap<String, String>,
    devices: HashMap<String, Device>,
    issues: Vec<Issue>,
}

impl Hub {
    pub fn new(hub_id: &str, api_version: ApiVersion) -> Self {
        Self {
            id: display_id(hub_id),
            api_version,
            version: None,
            zones: HashMap::new(),
            zone_ids_by_name: HashMap::new(),
            devices: HashMap::new(),
            issues: Vec::new(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn api_version(&self) -> ApiVersion {
        self.api_version
    }

    /// Software version info, once fetched.
    pub fn version(&self) -> Option<&Value> {
        self.version.as_ref()
    }

    pub(crate) fn set_version(&mut self, version: Value) -> &Value {
        self.version.insert(version)
    }

    pub fn zone(&self, id: &str) -> Option<&Zone> {
        self.zones.get(id)
    }

    pub fn zone_by_name(&self, name: &str) -> Option<&Zone> {
        self.zone_ids_by_name
            .get(name)
            .and_then(|id| self.zones.get(id))
    }

    /// Look a zone up by id, then by name.
    pub fn find_zone(&self, key: &str) -> Option<&Zone> {
        self.zone(key).or_else(|| self.zone_by_name(key))
    }

    pub fn zones(&self) -> impl Iterator<Item = &Zone> {
        self.zones.values()
    }

    pub fn device(&self, id: &str) -> Option<&Device> {
        self.devices.get(id)
    }

    pub fn devices(&self) -> impl Iterator<Item = &Device> {
        self.devices.values()
    }

    /// Issues from the latest poll.
    pub fn issues(&self) -> &[Issue] {
        &self.issues
    }

    /// Devices attached to `owner`, resolved against this hub.
    pub fn devices_of<'a, O: DeviceOwner + ?Sized>(
        &'a self,
        owner: &'a O,
    ) -> impl Iterator<Item = &'a Device> + 'a {
        owner.device_ids().filter_map(|id| self.devices.get(id))
    }

    pub fn zone_devices<'a>(&'a self, zone: &'a Zone) -> impl Iterator<Item = &'a Device> + 'a {
        self.devices_of(zone)
    }

    pub fn device_zone(&self, device: &Device) -> Option<&Zone> {
        device.zone_id().and_then(|id| self.zones.get(id))
    }

    /// Merge a poll into the graph: zones first, so that devices can be
    /// attached to them, then devices, then issues.
    pub fn reconcile(&mut self, poll: PollResult) -> ReconcileSummary {
        let mut summary = ReconcileSummary::default();

        for record in poll.zones {
            self.reconcile_zone(record, &mut summary);
        }
        for record in poll.devices {
            self.reconcile_device(record, &mut summary);
        }

        summary.issues = poll.issues.len();
        self.issues = poll.issues;

        debug!(
            hub = %self.id,
            zones = self.zones.len(),
            devices = self.devices.len(),
            issues = summary.issues,
            "reconciled poll"
        );
        summary
    }

    fn reconcile_zone(&mut self, record: ZoneRecord, summary: &mut ReconcileSummary) {
        let id = record.id.clone();
        let name = record.name.clone();

        match self.zones.get_mut(&id) {
            Some(zone) => {
                trace!(hub = %self.id, zone = %id, "found zone");
                if zone.name != name && self.zone_ids_by_name.get(&zone.name) == Some(&id) {
                    self.zone_ids_by_name.remove(&zone.name);
                }
                zone.apply(record);
                summary.zones_updated += 1;
            }
            None => {
                trace!(hub = %self.id, zone = %id, "creating zone");
                self.zones.insert(id.clone(), Zone::from_record(record));
                summary.zones_created += 1;
            }
        }
        if let Some(previous) = self.zone_ids_by_name.insert(name.clone(), id.clone())
            && previous != id
            && self.zones.get(&previous).is_some_and(|z| z.name == name)
        {
            warn!(hub = %self.id, zone = %id, shadowed = %previous, name = %name, "duplicate zone name");
            summary.duplicate_zone_names += 1;
        }
    }

    fn reconcile_device(&mut self, record: DeviceRecord, summary: &mut ReconcileSummary) {
        let id = record.id.clone();
        let target = match record.zone_name() {
            Some(name) => {
                let zone_id = self.zone_ids_by_name.get(name).cloned();
                if zone_id.is_none() {
                    debug!(hub = %self.id, device = %id, zone = name, "device names an unknown zone");
                }
                zone_id
            }
            None => None,
        };
        if target.is_none() {
            summary.unassigned_devices += 1;
        }

        let previous = match self.devices.get_mut(&id) {
            Some(device) => {
                trace!(hub = %self.id, device = %id, "found device");
                device.apply(record);
                summary.devices_updated += 1;
                std::mem::replace(&mut device.zone_id, target.clone())
            }
            None => {
                trace!(hub = %self.id, device = %id, "creating device");
                let mut device = Device::from_record(record);
                device.zone_id = target.clone();
                self.devices.insert(id.clone(), device);
                summary.devices_created += 1;
                None
            }
        };

        if previous != target
            && let Some(old) = previous
            && let Some(zone) = self.zones.get_mut(&old)
        {
            trace!(hub = %self.id, device = %id, zone = %old, "detaching device");
            zone.device_ids.remove(&id);
        }
        if let Some(zone_id) = target
            && let Some(zone) = self.zones.get_mut(&zone_id)
        {
            zone.device_ids.insert(id);
        }
    }
}

impl DeviceOwner for Hub {
    fn device_ids(&self) -> Box<dyn Iterator<Item = &str> + '_> {
        Box::new(self.devices.keys().map(String::as_str))
    }

    fn owns_device(&self, id: &str) -> bool {
        self.devices.contains_key(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::IssueLevel;

    fn zone(id: &str, name: &str, setpoint: f64) -> ZoneRecord {
        ZoneRecord {
            id: id.to_string(),
            name: name.to_string(),
            zone_type: ZoneType::ControlSp,
            mode: ZoneMode::Timer,
            temperature: Some(19.0),
            setpoint: Some(Setpoint::Celsius(setpoint)),
            occupied: None,
            override_state: None,
            schedule: Some(Map::new()),
        }
    }

    fn device(id: &str, zone: Option<&str>) -> DeviceRecord {
        DeviceRecord {
            id: id.to_string(),
            device_type: Some("Radiator Valve".to_string()),
            sku: None,
            assigned_zones: vec![AssignedZone {
                name: zone.map(str::to_string),
            }],
            state: Map::new(),
        }
    }

    fn poll() -> PollResult {
        PollResult {
            zones: vec![zone("1", "Lounge", 21.0), zone("2", "Bedroom", 18.0)],
            devices: vec![
                device("4", Some("Lounge")),
                device("5", Some("Lounge")),
                device("6", Some("Bedroom")),
            ],
            issues: vec![Issue {
                description: "Lounge is currently using the outside temperature".to_string(),
                level: IssueLevel::Warning,
            }],
        }
    }

    fn device_ids<'a>(hub: &'a Hub, zone_id: &str) -> Vec<&'a str> {
        let mut ids: Vec<&str> = hub
            .zone_devices(hub.zone(zone_id).unwrap())
            .map(|d| d.id.as_str())
            .collect();
        ids.sort();
        ids
    }

    #[test]
    fn first_poll_creates_everything() {
        let mut hub = Hub::new("hub", ApiVersion::V1);
        let summary = hub.reconcile(poll());

        assert_eq!(summary.zones_created, 2);
        assert_eq!(summary.devices_created, 3);
        assert_eq!(summary.unassigned_devices, 0);
        assert_eq!(hub.zones().count(), 2);
        assert_eq!(hub.devices().count(), 3);
        assert_eq!(hub.zone_by_name("Bedroom").unwrap().id, "2");
        assert_eq!(hub.issues().len(), 1);
    }

    #[test]
    fn repeated_poll_keeps_object_identity() {
        let mut hub = Hub::new("hub", ApiVersion::V1);
        hub.reconcile(poll());
        let zone_before: *const Zone = hub.zone("1").unwrap();
        let device_before: *const Device = hub.device("4").unwrap();

        let summary = hub.reconcile(poll());

        assert_eq!(summary.zones_created, 0);
        assert_eq!(summary.devices_created, 0);
        assert_eq!(summary.zones_updated, 2);
        assert_eq!(summary.devices_updated, 3);
        assert!(std::ptr::eq(zone_before, hub.zone("1").unwrap()));
        assert!(std::ptr::eq(device_before, hub.device("4").unwrap()));
        assert_eq!(hub.zones().count(), 2);
        assert_eq!(device_ids(&hub, "1"), ["4", "5"]);
    }

    #[test]
    fn update_is_applied_in_place() {
        let mut hub = Hub::new("hub", ApiVersion::V1);
        hub.reconcile(poll());
        let before: *const Zone = hub.zone("1").unwrap();

        let mut next = poll();
        next.zones[0].setpoint = Some(Setpoint::Celsius(23.5));
        next.zones[0].mode = ZoneMode::Override;
        hub.reconcile(next);

        let lounge = hub.zone("1").unwrap();
        assert!(std::ptr::eq(before, lounge));
        assert_eq!(lounge.setpoint, Some(Setpoint::Celsius(23.5)));
        assert_eq!(lounge.mode, ZoneMode::Override);
    }

    #[test]
    fn every_device_is_in_exactly_one_zone_and_the_hub() {
        let mut hub = Hub::new("hub", ApiVersion::V1);
        hub.reconcile(poll());

        for device in hub.devices() {
            let owners = hub.zones().filter(|z| z.owns_device(&device.id)).count();
            assert_eq!(owners, 1, "device {}", device.id);
            assert!(hub.owns_device(&device.id));
            assert_eq!(
                hub.device_zone(device).unwrap().name,
                device.assigned_zones[0].name.clone().unwrap()
            );
        }
    }

    #[test]
    fn device_for_unknown_zone_is_hub_only() {
        let mut hub = Hub::new("hub", ApiVersion::V1);
        let mut p = poll();
        p.devices.push(device("9", Some("Conservatory")));
        p.devices.push(device("10", None));
        let summary = hub.reconcile(p);

        assert_eq!(summary.unassigned_devices, 2);
        for id in ["9", "10"] {
            let d = hub.device(id).unwrap();
            assert_eq!(d.zone_id(), None);
            assert!(hub.zones().all(|z| !z.owns_device(id)));
        }
        assert_eq!(hub.devices_of(&hub).count(), 5);
    }

    #[test]
    fn moved_device_leaves_its_old_zone() {
        let mut hub = Hub::new("hub", ApiVersion::V1);
        hub.reconcile(poll());

        let mut next = poll();
        next.devices[1] = device("5", Some("Bedroom"));
        hub.reconcile(next);

        assert_eq!(device_ids(&hub, "1"), ["4"]);
        assert_eq!(device_ids(&hub, "2"), ["5", "6"]);
        assert_eq!(hub.device("5").unwrap().zone_id(), Some("2"));
    }

    #[test]
    fn renamed_zone_is_reindexed() {
        let mut hub = Hub::new("hub", ApiVersion::V1);
        hub.reconcile(poll());

        let mut next = poll();
        next.zones[0].name = "Living Room".to_string();
        next.devices[0] = device("4", Some("Living Room"));
        next.devices[1] = device("5", Some("Living Room"));
        hub.reconcile(next);

        assert!(hub.zone_by_name("Lounge").is_none());
        assert_eq!(hub.zone_by_name("Living Room").unwrap().id, "1");
        assert_eq!(hub.find_zone("Living Room").unwrap().id, "1");
        assert_eq!(device_ids(&hub, "1"), ["4", "5"]);
    }

    #[test]
    fn duplicate_zone_name_is_counted_and_resolves_to_last() {
        let mut hub = Hub::new("hub", ApiVersion::V1);
        let summary = hub.reconcile(PollResult {
            zones: vec![zone("1", "Room", 20.0), zone("2", "Room", 18.0)],
            devices: vec![device("4", Some("Room"))],
            issues: Vec::new(),
        });

        assert_eq!(summary.duplicate_zone_names, 1);
        assert_eq!(hub.zones().count(), 2);
        assert_eq!(hub.zone_by_name("Room").unwrap().id, "2");
        assert_eq!(device_ids(&hub, "2"), ["4"]);
        assert!(device_ids(&hub, "1").is_empty());

        let summary = hub.reconcile(poll());
        assert_eq!(summary.duplicate_zone_names, 0);
    }

    #[test]
    fn issues_are_replaced_each_poll() {
        let mut hub = Hub::new("hub", ApiVersion::V1);
        hub.reconcile(poll());

        let mut next = poll();
        next.issues.clear();
        hub.reconcile(next);
        assert!(hub.issues().is_empty());
    }

    #[test]
    fn find_zone_prefers_id() {
        let mut hub = Hub::new("hub", ApiVersion::V1);
        hub.reconcile(PollResult {
            zones: vec![zone("1", "2", 20.0), zone("2", "Hall", 20.0)],
            ..Default::default()
        });
        assert_eq!(hub.find_zone("2").unwrap().name, "Hall");
        assert_eq!(hub.find_zone("Hall").unwrap().id, "2");
        assert!(hub.find_zone("Loft").is_none());
    }

    #[test]
    fn long_hub_tokens_are_shortened() {
        assert_eq!(Hub::new("0123456789abcdefghijklmnop", ApiVersion::V1).id(), "01234567...");
        assert_eq!(Hub::new("192.168.1.20", ApiVersion::V3).id(), "192.168.1.20");
    }

    #[test]
    fn zone_serializes_in_v1_shape() {
        let mut hub = Hub::new("hub", ApiVersion::V1);
        hub.reconcile(poll());
        let json = serde_json::to_value(hub.zone("1").unwrap()).unwrap();
        assert_eq!(json["type"], "radiator");
        assert_eq!(json["mode"], "timer");
        assert_eq!(json["setpoint"], 21.0);
        assert!(json.get("occupied").is_none());
        assert!(json.get("device_ids").is_none());
    }
}
