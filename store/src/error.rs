use influxdb2::models::data_point::DataPointError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("InfluxDB client error: {0}")]
    ClientError(String),

    #[error("InfluxDB write error: {0}")]
    WriteError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Data conversion error: {0}")]
    ConversionError(String),

    #[error("InfluxDB error: {0}")]
    InfluxDbError(String),

    #[error("{0}")]
    NotFound(String),
}

impl From<StoreError> for common::Error {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(msg) => common::Error::NotFound(msg),
            other => common::Error::DbError(other.to_string()),
        }
    }
}

impl From<influxdb2::RequestError> for StoreError {
    fn from(err: influxdb2::RequestError) -> Self {
        StoreError::InfluxDbError(err.to_string())
    }
}

impl From<DataPointError> for StoreError {
    fn from(err: DataPointError) -> Self {
        StoreError::WriteError(err.to_string())
    }
}
