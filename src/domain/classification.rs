// Display classification of a snapshot
use super::telemetry::{EventType, TelemetrySnapshot};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DisplayEvent {
    Motion,
    Stationary,
    Off,
    Acceleration,
    Braking,
    Curve,
}

impl std::fmt::Display for DisplayEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DisplayEvent::Motion => write!(f, "In motion"),
            DisplayEvent::Stationary => write!(f, "Stationary"),
            DisplayEvent::Off => write!(f, "Off"),
            DisplayEvent::Acceleration => write!(f, "Harsh acceleration"),
            DisplayEvent::Braking => write!(f, "Harsh braking"),
            DisplayEvent::Curve => write!(f, "Sharp curve"),
        }
    }
}

/// Harsh events take precedence, then engine/motion state
pub fn classify(snapshot: &TelemetrySnapshot) -> DisplayEvent {
    match snapshot.event_type {
        EventType::Acceleration => return DisplayEvent::Acceleration,
        EventType::Braking => return DisplayEvent::Braking,
        EventType::Curve => return DisplayEvent::Curve,
        EventType::None => {}
    }

    let speed = snapshot.speed.value();
    let rpm = snapshot.rpm.value();

    if speed > 0.0 && rpm > 0.0 {
        DisplayEvent::Motion
    } else if speed == 0.0 && rpm > 0.0 {
        DisplayEvent::Stationary
    } else {
        DisplayEvent::Off
    }
}
