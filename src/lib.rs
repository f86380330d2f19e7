mod client;
mod error;
mod graph;
mod logger;
mod normalize;
mod protocol;
mod transport;
mod types;
mod vocabulary;

pub use client::{DeviceSource, GeniusClient, GeniusClientBuilder};
pub use error::{lookup_status_error, Error, Result};
pub use graph::{Device, DeviceOwner, Hub, PollResult, ReconcileSummary, Zone};
pub use logger::MessageLogMode;
pub use normalize::{
    extract_devices_from_data_manager, extract_devices_from_zones, extract_issues_from_zones,
    extract_zones, Normalizer, RawPoll,
};
pub use protocol::{v3_base_url, V1_BASE_URL};
pub use types::*;
pub use vocabulary::IssueVocabulary;
