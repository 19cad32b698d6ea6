//! Telemetry payloads carried on `TELEMETRY_APP`.

use crate::mesh::DeviceMetrics;

/// Environment sensor readings.
#[derive(Clone, Copy, PartialEq, ::prost::Message)]
pub struct EnvironmentMetrics {
    /// Temperature in degrees Celsius
    #[prost(float, optional, tag = "1")]
    pub temperature: Option<f32>,
    /// Relative humidity in percent
    #[prost(float, optional, tag = "2")]
    pub relative_humidity: Option<f32>,
    /// Barometric pressure in hPa
    #[prost(float, optional, tag = "3")]
    pub barometric_pressure: Option<f32>,
}

/// A telemetry report.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Telemetry {
    /// Report time (seconds since epoch)
    #[prost(fixed32, tag = "1")]
    pub time: u32,
    /// Which metrics the report carries
    #[prost(oneof = "telemetry::Variant", tags = "2, 3")]
    pub variant: Option<telemetry::Variant>,
}

/// Nested types for [`Telemetry`].
pub mod telemetry {
    /// Report contents
    #[derive(Clone, PartialEq, ::prost::Oneof)]
    pub enum Variant {
        /// Battery, voltage and airtime
        #[prost(message, tag = "2")]
        DeviceMetrics(super::DeviceMetrics),
        /// Sensor readings
        #[prost(message, tag = "3")]
        EnvironmentMetrics(super::EnvironmentMetrics),
    }
}

impl Telemetry {
    /// Device metrics report.
    pub fn device(time: u32, metrics: DeviceMetrics) -> Self {
        Self {
            time,
            variant: Some(telemetry::Variant::DeviceMetrics(metrics)),
        }
    }

    /// Short name of the carried variant, for diagnostics.
    pub fn variant_name(&self) -> &'static str {
        match self.variant {
            Some(telemetry::Variant::DeviceMetrics(_)) => "device_metrics",
            Some(telemetry::Variant::EnvironmentMetrics(_)) => "environment_metrics",
            None => "none",
        }
    }
}
