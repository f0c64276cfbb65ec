// Snapshot normalizer - Lenient translation of inbound frames into canonical snapshots
use crate::domain::telemetry::{EventType, Reading, TelemetrySnapshot, ThresholdOverrides};
use chrono::{DateTime, NaiveDateTime, Utc};
use serde_json::{Map, Value};

const DEVICE_ID_KEYS: [&str; 2] = ["deviceId", "imei"];
const NAIVE_TIMESTAMP_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];
const MAX_SIGNAL_STRENGTH: f64 = 5.0;

#[derive(Debug, Clone, PartialEq)]
pub enum InboundMessage {
    Snapshot {
        snapshot: TelemetrySnapshot,
        thresholds: Option<ThresholdOverrides>,
    },
    SessionTimeout {
        session_id: String,
        timeout_seconds: u64,
    },
}

/// Classify one inbound frame. Returns `None` only when the frame cannot be keyed.
pub fn parse_inbound(frame: &Value, received_at: DateTime<Utc>) -> Option<InboundMessage> {
    let fields = frame.as_object()?;

    if let (Some(session_id), Some(timeout)) = (
        text(fields.get("sessionId")),
        number(fields.get("timeoutSeconds")),
    ) {
        return Some(InboundMessage::SessionTimeout {
            session_id,
            timeout_seconds: timeout.max(0.0) as u64,
        });
    }

    let snapshot = normalize(fields, received_at)?;
    let thresholds = fields
        .get("thresholds")
        .and_then(Value::as_object)
        .map(threshold_overrides)
        .filter(|t| !t.is_empty());

    Some(InboundMessage::Snapshot {
        snapshot,
        thresholds,
    })
}

/// Build a snapshot from raw fields, defaulting everything but the device id
pub fn normalize(fields: &Map<String, Value>, received_at: DateTime<Utc>) -> Option<TelemetrySnapshot> {
    let device_id = DEVICE_ID_KEYS
        .iter()
        .find_map(|key| text(fields.get(*key)))?;

    let reading = |key: &str| Reading::new(number(fields.get(key)));

    Some(TelemetrySnapshot {
        device_id,
        timestamp: timestamp(fields.get("timestamp")).unwrap_or(received_at),
        speed: reading("speed"),
        rpm: reading("rpm"),
        engine_temp: reading("engineTemp"),
        fuel_level: reading("fuelLevel"),
        fuel_used_total: reading("fuelUsedTotal"),
        instant_consumption: reading("instantConsumption"),
        event_type: number(fields.get("eventType"))
            .map(|code| EventType::from_code(code as i64))
            .unwrap_or_default(),
        event_g_value: reading("eventGValue"),
        engine_load: reading("engineLoad"),
        oil_level: reading("oilLevel"),
        odometer_total: reading("odometerTotal"),
        odometer_trip: reading("odometerTrip"),
        obd_faults: fault_codes(fields.get("obdFaults")),
        ignition_on: boolean(fields.get("ignitionOn")).unwrap_or(false),
        moving: boolean(fields.get("moving")).unwrap_or(false),
        signal_strength: number(fields.get("signalStrength"))
            .map(|s| s.clamp(0.0, MAX_SIGNAL_STRENGTH).round() as u8),
    })
}

fn threshold_overrides(fields: &Map<String, Value>) -> ThresholdOverrides {
    ThresholdOverrides {
        speed_max: number(fields.get("speedMax")),
        rpm_max: number(fields.get("rpmMax")),
        engine_temp_max: number(fields.get("engineTempMax")),
        fuel_level_min: number(fields.get("fuelLevelMin")),
    }
}

fn text(value: Option<&Value>) -> Option<String> {
    let text = match value? {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        _ => return None,
    };
    (!text.is_empty()).then_some(text)
}

fn number(value: Option<&Value>) -> Option<f64> {
    let n = match value? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }?;
    n.is_finite().then_some(n)
}

fn boolean(value: Option<&Value>) -> Option<bool> {
    match value? {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => n.as_f64().map(|v| v != 0.0),
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "1" => Some(true),
            "false" | "0" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

fn timestamp(value: Option<&Value>) -> Option<DateTime<Utc>> {
    match value? {
        Value::String(s) => {
            let s = s.trim();
            DateTime::parse_from_rfc3339(s)
                .map(|t| t.with_timezone(&Utc))
                .ok()
                .or_else(|| {
                    NAIVE_TIMESTAMP_FORMATS
                        .iter()
                        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
                        .map(|naive| naive.and_utc())
                })
        }
        Value::Number(n) => n.as_i64().and_then(DateTime::from_timestamp_millis),
        _ => None,
    }
}

fn fault_codes(value: Option<&Value>) -> Vec<String> {
    let mut codes: Vec<String> = Vec::new();
    if let Some(Value::Array(items)) = value {
        for code in items.iter().filter_map(Value::as_str).map(str::trim) {
            if !code.is_empty() && !codes.iter().any(|c| c == code) {
                codes.push(code.to_string());
            }
        }
    }
    codes
}
