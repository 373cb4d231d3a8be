use crate::StoreError;

const DEFAULT_MEASUREMENT: &str = "exchange_rates";

/// Which `RateStore` implementation to run against
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    InfluxDb,
    Memory,
}

impl std::str::FromStr for StoreBackend {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "influxdb" | "influx" => Ok(StoreBackend::InfluxDb),
            "memory" => Ok(StoreBackend::Memory),
            other => Err(StoreError::ConfigError(format!(
                "Unknown store backend: {}. Supported backends: influxdb, memory",
                other
            ))),
        }
    }
}

/// Configuration for the InfluxDB store
#[derive(Debug, Clone)]
pub struct InfluxConfig {
    /// InfluxDB server URL
    pub url: String,
    /// InfluxDB authentication token
    pub token: String,
    /// InfluxDB organization
    pub org: String,
    /// InfluxDB bucket to use for storing data
    pub bucket: String,
    /// Measurement holding the rate snapshots
    pub measurement: String,
}

#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub backend: StoreBackend,
    /// Only present for `StoreBackend::InfluxDb`
    pub influx: Option<InfluxConfig>,
}

impl StoreConfig {
    pub fn memory() -> Self {
        Self {
            backend: StoreBackend::Memory,
            influx: None,
        }
    }

    /// Create a new store configuration from environment variables
    pub fn from_env() -> Result<Self, StoreError> {
        let backend = match std::env::var("STORE_BACKEND") {
            Ok(value) => value.parse()?,
            Err(_) => StoreBackend::InfluxDb,
        };

        if backend == StoreBackend::Memory {
            return Ok(Self::memory());
        }

        let url = required_var("INFLUXDB_URL")?;
        let token = required_var("INFLUXDB_TOKEN")?;
        let org = required_var("INFLUXDB_ORG")?;
        let bucket = required_var("INFLUXDB_BUCKET")?;
        let measurement = std::env::var("INFLUXDB_MEASUREMENT")
            .unwrap_or_else(|_| DEFAULT_MEASUREMENT.to_string());

        Ok(Self {
            backend,
            influx: Some(InfluxConfig {
                url,
                token,
                org,
                bucket,
                measurement,
            }),
        })
    }
}

fn required_var(name: &str) -> Result<String, StoreError> {
    std::env::var(name)
        .map_err(|_| StoreError::ConfigError(format!("{} environment variable not set", name)))
}
