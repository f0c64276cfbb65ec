// Device identity domain model
use super::telemetry::{DeviceId, ThresholdOverrides};
use serde::{Deserialize, Serialize};

/// Asset metadata returned by the metadata resolver
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceMetadata {
    #[serde(default)]
    pub asset_name: Option<String>,
    #[serde(default)]
    pub serial_number: Option<String>,
    #[serde(default)]
    pub operator_name: Option<String>,
    #[serde(default)]
    pub thresholds: Option<ThresholdOverrides>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceIdentity {
    pub device_id: DeviceId,
    pub display_name: String,
    pub serial_number: Option<String>,
    pub operator_name: Option<String>,
    pub resolved: bool,
}

impl DeviceIdentity {
    /// Identity for a device the resolver knows nothing about
    pub fn unresolved(device_id: &str) -> Self {
        Self {
            device_id: device_id.to_string(),
            display_name: device_id.to_string(),
            serial_number: None,
            operator_name: None,
            resolved: false,
        }
    }

    pub fn from_metadata(device_id: &str, metadata: &DeviceMetadata) -> Self {
        let display_name = metadata
            .asset_name
            .as_deref()
            .and_then(Self::format_name)
            .unwrap_or_else(|| device_id.to_string());

        Self {
            device_id: device_id.to_string(),
            display_name,
            serial_number: non_blank(metadata.serial_number.as_deref()),
            operator_name: non_blank(metadata.operator_name.as_deref()),
            resolved: true,
        }
    }

    fn format_name(name: &str) -> Option<String> {
        // Collapse runs of whitespace: "  Truck   07 " -> "Truck 07"
        let name = name.split_whitespace().collect::<Vec<_>>().join(" ");
        (!name.is_empty()).then_some(name)
    }
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_name() {
        let metadata = DeviceMetadata {
            asset_name: Some("  Truck   07 ".to_string()),
            serial_number: Some("SN-1".to_string()),
            operator_name: Some(" ".to_string()),
            thresholds: None,
        };

        let identity = DeviceIdentity::from_metadata("867530900000001", &metadata);
        assert_eq!(identity.display_name, "Truck 07");
        assert_eq!(identity.serial_number.as_deref(), Some("SN-1"));
        assert_eq!(identity.operator_name, None);
        assert!(identity.resolved);
    }

    #[test]
    fn test_falls_back_to_device_id() {
        let identity = DeviceIdentity::from_metadata("D1", &DeviceMetadata::default());
        assert_eq!(identity.display_name, "D1");

        let identity = DeviceIdentity::unresolved("D2");
        assert_eq!(identity.display_name, "D2");
        assert!(!identity.resolved);
    }

    #[test]
    fn test_metadata_deserializes_partial_payload() {
        let metadata: DeviceMetadata = serde_json::from_str(
            r#"{"assetName":"Excavator","thresholds":{"rpmMax":2200}}"#,
        )
        .unwrap();

        assert_eq!(metadata.asset_name.as_deref(), Some("Excavator"));
        assert_eq!(metadata.thresholds.unwrap().rpm_max, Some(2200.0));
        assert_eq!(metadata.thresholds.unwrap().speed_max, None);
    }
}
