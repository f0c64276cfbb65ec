// Domain layer - Telemetry models and pure derivations
pub mod alerts;
pub mod chart;
pub mod classification;
pub mod dashboard;
pub mod device;
pub mod telemetry;
