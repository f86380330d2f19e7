use std::collections::HashMap;

use crate::types::IssueLevel;

const DEFAULT_DESCRIPTIONS: &[(&str, &str)] = &[
    ("zone:using_weather_temp", "{} is currently using the outside temperature"),
    ("zone:using_assumed_temp", "{} is currently using the assumed temperature"),
    ("zone:tpi_no_temp", "{} currently has no valid temperature"),
    ("node:no_comms", "A device in {} has lost communication with the hub"),
    ("node:not_seen", "A device in {} can not be found by the hub"),
    ("node:low_battery", "The battery for a device in {} is dead and needs to be replaced"),
    ("node:warn_battery", "The battery for a device in {} is low"),
    ("manager:no_boiler_controller", "The hub does not have a boiler controller assigned"),
    ("manager:no_boiler_comms", "The hub has lost communication with the boiler controller"),
    ("manager:no_temp", "The hub does not have a valid temperature"),
    ("manager:weather", "Unable to fetch the weather data"),
    ("manager:weather_data", "Weather data -"),
];

/// Lookup tables for the v3 issue vocabulary: issue ids to description
/// templates, numeric severities to levels.
///
/// The hub defines these outside the API, so callers can extend or replace
/// them. A template may contain one `{}`, which is filled with the zone name.
#[derive(Debug, Clone)]
pub struct IssueVocabulary {
    descriptions: HashMap<String, String>,
    levels: HashMap<i64, IssueLevel>,
}

impl Default for IssueVocabulary {
    fn default() -> Self {
        let descriptions = DEFAULT_DESCRIPTIONS
            .iter()
            .map(|(id, text)| (id.to_string(), text.to_string()))
            .collect();
        let levels = HashMap::from([
            (0, IssueLevel::Error),
            (1, IssueLevel::Warning),
            (2, IssueLevel::Information),
        ]);
        Self { descriptions, levels }
    }
}

impl IssueVocabulary {
    /// A vocabulary with no entries; every issue takes the fallback path.
    pub fn empty() -> Self {
        Self {
            descriptions: HashMap::new(),
            levels: HashMap::new(),
        }
    }

    pub fn with_description(mut self, id: impl Into<String>, template: impl Into<String>) -> Self {
        self.descriptions.insert(id.into(), template.into());
        self
    }

    pub fn with_level(mut self, code: i64, level: IssueLevel) -> Self {
        self.levels.insert(code, level);
        self
    }

    /// Render the description for an issue id, or `None` if the id is unmapped.
    pub fn describe(&self, id: &str, zone_name: &str) -> Option<String> {
        let template = self.descriptions.get(id)?;
        Some(template.replacen("{}", zone_name, 1))
    }

    pub fn level(&self, code: i64) -> Option<IssueLevel> {
        self.levels.get(&code).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn template_takes_zone_name() {
        let vocab = IssueVocabulary::default();
        assert_eq!(
            vocab.describe("zone:using_weather_temp", "Upstairs Hall").as_deref(),
            Some("Upstairs Hall is currently using the outside temperature")
        );
    }

    #[test]
    fn template_without_placeholder_ignores_zone() {
        let vocab = IssueVocabulary::default();
        assert_eq!(
            vocab.describe("manager:no_temp", "Kitchen").as_deref(),
            Some("The hub does not have a valid temperature")
        );
    }

    #[test]
    fn unmapped_entries_are_none() {
        let vocab = IssueVocabulary::default();
        assert!(vocab.describe("zone:something_new", "Kitchen").is_none());
        assert!(vocab.level(9).is_none());
    }

    #[test]
    fn injected_entries_override_defaults() {
        let vocab = IssueVocabulary::empty()
            .with_description("zone:custom", "{} needs attention")
            .with_level(1, IssueLevel::Error);
        assert_eq!(vocab.describe("zone:custom", "Loft").as_deref(), Some("Loft needs attention"));
        assert_eq!(vocab.level(1), Some(IssueLevel::Error));
        assert!(vocab.level(0).is_none());
    }
}
