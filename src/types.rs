use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A station, thermostat relay or home coach as listed by the device endpoints.
///
/// Only the identifying fields are typed; the rest of the vendor payload is
/// kept verbatim in `extra`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Device {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub device_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub station_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub module_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Device {
    pub fn display_name(&self) -> &str {
        self.station_name
            .as_deref()
            .or(self.name.as_deref())
            .or(self.module_name.as_deref())
            .unwrap_or("Unnamed")
    }

    /// Number of attached modules, when the payload lists them.
    pub fn module_count(&self) -> usize {
        self.extra
            .get("modules")
            .and_then(Value::as_array)
            .map(Vec::len)
            .unwrap_or(0)
    }

    pub fn is_reachable(&self) -> Option<bool> {
        self.extra.get("reachable").and_then(Value::as_bool)
    }
}

#[derive(Debug, Clone, Default)]
pub struct StationsDataOptions {
    pub device_id: Option<String>,
    pub get_favorites: Option<bool>,
}

/// Narrows a device listing to one device.
#[derive(Debug, Clone, Default)]
pub struct DeviceFilter {
    pub device_id: Option<String>,
}

impl DeviceFilter {
    pub fn device(device_id: impl Into<String>) -> Self {
        Self {
            device_id: Some(device_id.into()),
        }
    }
}

/// One or more measurement types, e.g. `"Temperature"` or `["Temperature", "CO2"]`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MeasureTypes(pub Vec<String>);

impl MeasureTypes {
    pub fn is_empty(&self) -> bool {
        self.0.iter().all(|t| t.trim().is_empty())
    }
}

impl From<&str> for MeasureTypes {
    fn from(value: &str) -> Self {
        Self(vec![value.to_string()])
    }
}

impl From<String> for MeasureTypes {
    fn from(value: String) -> Self {
        Self(vec![value])
    }
}

impl From<Vec<String>> for MeasureTypes {
    fn from(value: Vec<String>) -> Self {
        Self(value)
    }
}

impl From<Vec<&str>> for MeasureTypes {
    fn from(value: Vec<&str>) -> Self {
        Self(value.into_iter().map(String::from).collect())
    }
}

impl<const N: usize> From<[&str; N]> for MeasureTypes {
    fn from(value: [&str; N]) -> Self {
        Self(value.iter().map(|t| t.to_string()).collect())
    }
}

/// Upper bound of a measurement query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateEnd {
    /// Epoch seconds or epoch milliseconds.
    At(i64),
    /// The most recent measurement.
    Last,
}

impl From<i64> for DateEnd {
    fn from(value: i64) -> Self {
        DateEnd::At(value)
    }
}

#[derive(Debug, Clone, Default)]
pub struct MeasureOptions {
    pub device_id: String,
    pub module_id: Option<String>,
    pub scale: String,
    pub types: MeasureTypes,
    /// Epoch seconds or epoch milliseconds.
    pub date_begin: Option<i64>,
    pub date_end: Option<DateEnd>,
    pub limit: Option<u32>,
    pub optimize: Option<bool>,
    pub real_time: Option<bool>,
}

impl MeasureOptions {
    pub fn new(
        device_id: impl Into<String>,
        scale: impl Into<String>,
        types: impl Into<MeasureTypes>,
    ) -> Self {
        Self {
            device_id: device_id.into(),
            scale: scale.into(),
            types: types.into(),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct SyncScheduleOptions {
    pub device_id: String,
    pub module_id: String,
    pub zones: Value,
    pub timetable: Value,
}

#[derive(Debug, Clone, Default)]
pub struct ThermpointOptions {
    pub device_id: String,
    pub module_id: String,
    pub setpoint_mode: String,
    pub setpoint_endtime: Option<i64>,
    pub setpoint_temp: Option<f64>,
}

#[derive(Debug, Clone, Default)]
pub struct HomeDataOptions {
    pub home_id: Option<String>,
    pub size: Option<u32>,
}

#[derive(Debug, Clone, Default)]
pub struct NextEventsOptions {
    pub home_id: String,
    pub event_id: String,
    pub size: Option<u32>,
}

#[derive(Debug, Clone, Default)]
pub struct LastEventOfOptions {
    pub home_id: String,
    pub person_id: String,
    pub offset: Option<u32>,
}

#[derive(Debug, Clone, Default)]
pub struct EventsUntilOptions {
    pub home_id: String,
    pub event_id: String,
}

#[derive(Debug, Clone, Default)]
pub struct CameraPictureOptions {
    pub image_id: String,
    pub key: String,
}

/// True when a JSON option carries nothing worth sending.
pub(crate) fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_device_parsing_keeps_extra_fields() {
        let device: Device = serde_json::from_value(json!({
            "_id": "70:ee:50:00:02:20",
            "type": "NAMain",
            "station_name": "Home",
            "reachable": true,
            "modules": [{"_id": "02:00:00:00:02:20"}]
        }))
        .unwrap();

        assert_eq!(device.id, "70:ee:50:00:02:20");
        assert_eq!(device.device_type.as_deref(), Some("NAMain"));
        assert_eq!(device.display_name(), "Home");
        assert_eq!(device.module_count(), 1);
        assert_eq!(device.is_reachable(), Some(true));
    }

    #[test]
    fn test_device_display_name_fallback() {
        let device: Device = serde_json::from_value(json!({"_id": "70:ee:50:3a:d2:2e"})).unwrap();
        assert_eq!(device.display_name(), "Unnamed");
        assert_eq!(device.module_count(), 0);
        assert_eq!(device.is_reachable(), None);
    }

    #[test]
    fn test_measure_types_conversions() {
        assert_eq!(MeasureTypes::from("Temperature").0, vec!["Temperature"]);
        assert_eq!(
            MeasureTypes::from(["Temperature", "CO2"]).0,
            vec!["Temperature", "CO2"]
        );
        assert!(MeasureTypes::default().is_empty());
        assert!(MeasureTypes::from(" ").is_empty());
    }

    #[test]
    fn test_is_blank() {
        assert!(is_blank(&Value::Null));
        assert!(is_blank(&json!([])));
        assert!(!is_blank(&json!([{"id": 0}])));
        assert!(!is_blank(&json!(0)));
    }
}
