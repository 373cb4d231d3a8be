use crate::{not_found, sort_newest_first, InfluxConfig, RateFilter, RateStore, StoreError};
use async_trait::async_trait;
use chrono::{DateTime, Duration, FixedOffset, NaiveDateTime, SecondsFormat, SubsecRound, Utc};
use common::models::{Cryptocurrency, FiatCurrency, RateSnapshot, RateTable};
use futures::stream;
use influxdb2::models::{DataPoint, Query};
use influxdb2::{Client, FromDataPoint};
use tracing::{debug, info};

const RATE_FIELD: &str = "rate";

/// One `rate` field row as returned by Flux, before pivoting into a snapshot
#[derive(Debug, FromDataPoint)]
struct RateRow {
    cryptocurrency: String,
    fiat_currency: String,
    value: f64,
    time: DateTime<FixedOffset>,
}

impl Default for RateRow {
    fn default() -> Self {
        Self {
            cryptocurrency: String::new(),
            fiat_currency: String::new(),
            value: 0.0,
            time: DateTime::<Utc>::MIN_UTC.into(),
        }
    }
}

#[derive(Debug, Default, FromDataPoint)]
struct RowCount {
    value: f64,
}

/// Rate snapshots stored as InfluxDB points: one point per pair, tagged
/// with `cryptocurrency` and `fiat_currency`, carrying a single `rate` field.
pub struct InfluxRateStore {
    client: Client,
    config: InfluxConfig,
}

impl InfluxRateStore {
    pub fn new(config: InfluxConfig) -> Self {
        let client = Client::new(&config.url, &config.org, &config.token);

        Self { client, config }
    }

    /// Ping the server so a bad URL or token fails at startup
    pub async fn check_health(&self) -> Result<(), StoreError> {
        self.client
            .health()
            .await
            .map_err(|e| StoreError::ClientError(format!("InfluxDB health check failed: {}", e)))?;
        info!("Connected to InfluxDB at {}", self.config.url);
        Ok(())
    }

    fn latest_query(&self, filter: &RateFilter, since: DateTime<Utc>) -> String {
        let mut flux = format!(
            r#"from(bucket: "{}")
               |> range(start: {})
               |> filter(fn: (r) => r._measurement == "{}" and r._field == "{}")"#,
            self.config.bucket,
            since.to_rfc3339_opts(SecondsFormat::Nanos, true),
            self.config.measurement,
            RATE_FIELD
        );
        push_filter(&mut flux, filter);
        flux.push_str(
            r#"
               |> group()
               |> sort(columns: ["_time"], desc: true)"#,
        );
        flux
    }

    fn one_query(&self, cryptocurrency: Cryptocurrency, fiat_currency: FiatCurrency) -> String {
        let mut flux = format!(
            r#"from(bucket: "{}")
               |> range(start: 0)
               |> filter(fn: (r) => r._measurement == "{}" and r._field == "{}")"#,
            self.config.bucket, self.config.measurement, RATE_FIELD
        );
        push_filter(&mut flux, &RateFilter::pair(cryptocurrency, fiat_currency));
        flux.push_str(
            r#"
               |> group()
               |> sort(columns: ["_time"], desc: true)
               |> limit(n: 1)"#,
        );
        flux
    }

    // The client folds every record by `_field`, so the aggregate has to
    // carry one back after group() drops it.
    fn count_query(&self, stop: DateTime<Utc>) -> String {
        format!(
            r#"from(bucket: "{}")
               |> range(start: 0, stop: {})
               |> filter(fn: (r) => r._measurement == "{}" and r._field == "{}")
               |> group()
               |> count()
               |> map(fn: (r) => ({{ r with _value: float(v: r._value) }}))
               |> set(key: "_field", value: "count")
               |> set(key: "_measurement", value: "{}")"#,
            self.config.bucket,
            stop.to_rfc3339_opts(SecondsFormat::Secs, true),
            self.config.measurement,
            RATE_FIELD,
            self.config.measurement
        )
    }

    async fn fetch_rows(&self, flux: String) -> Result<Vec<RateSnapshot>, StoreError> {
        debug!("Executing InfluxDB query: {}", flux);

        let rows = self.client.query::<RateRow>(Some(Query::new(flux))).await?;
        rows.into_iter().map(into_snapshot).collect()
    }
}

fn push_filter(flux: &mut String, filter: &RateFilter) {
    if let Some(crypto) = filter.cryptocurrency {
        flux.push_str(&format!(
            r#"
               |> filter(fn: (r) => r.cryptocurrency == "{}")"#,
            crypto
        ));
    }
    if let Some(fiat) = filter.fiat_currency {
        flux.push_str(&format!(
            r#"
               |> filter(fn: (r) => r.fiat_currency == "{}")"#,
            fiat
        ));
    }
}

fn into_snapshot(row: RateRow) -> Result<RateSnapshot, StoreError> {
    let cryptocurrency: Cryptocurrency = row
        .cryptocurrency
        .parse()
        .map_err(|e: common::Error| StoreError::ConversionError(e.to_string()))?;
    let fiat_currency: FiatCurrency = row
        .fiat_currency
        .parse()
        .map_err(|e: common::Error| StoreError::ConversionError(e.to_string()))?;
    let timestamp = row.time.with_timezone(&Utc);
    let nanos = timestamp.timestamp_nanos_opt().ok_or_else(|| {
        StoreError::ConversionError(format!("Timestamp out of range: {}", timestamp))
    })?;

    Ok(RateSnapshot {
        // series key plus time is unique within a measurement
        id: format!("{}-{}-{}", cryptocurrency, fiat_currency, nanos),
        cryptocurrency,
        fiat_currency,
        rate: row.value,
        timestamp,
    })
}

#[async_trait]
impl RateStore for InfluxRateStore {
    async fn append(&self, table: &RateTable, captured_at: DateTime<Utc>) -> Result<usize, StoreError> {
        let nanos = captured_at.timestamp_nanos_opt().ok_or_else(|| {
            StoreError::ConversionError(format!("Timestamp out of range: {}", captured_at))
        })?;

        let mut points = Vec::with_capacity(RateTable::len());
        for (crypto, fiat, rate) in table.iter() {
            let point = DataPoint::builder(&self.config.measurement)
                .tag("cryptocurrency", crypto.as_str())
                .tag("fiat_currency", fiat.as_str())
                .field(RATE_FIELD, rate)
                .timestamp(nanos)
                .build()?;
            points.push(point);
        }
        let written = points.len();

        debug!(
            "Writing {} rate points to bucket {} at {}",
            written, self.config.bucket, captured_at
        );

        self.client
            .write(&self.config.bucket, stream::iter(points))
            .await?;

        Ok(written)
    }

    async fn query_latest(
        &self,
        filter: &RateFilter,
        since: DateTime<Utc>,
    ) -> Result<Vec<RateSnapshot>, StoreError> {
        let mut snapshots = self.fetch_rows(self.latest_query(filter, since)).await?;

        // range() is inclusive at the start; keep the bound explicit anyway
        snapshots.retain(|s| s.timestamp >= since);
        sort_newest_first(&mut snapshots);
        Ok(snapshots)
    }

    async fn query_one(
        &self,
        cryptocurrency: Cryptocurrency,
        fiat_currency: FiatCurrency,
    ) -> Result<RateSnapshot, StoreError> {
        self.fetch_rows(self.one_query(cryptocurrency, fiat_currency))
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| not_found(cryptocurrency, fiat_currency))
    }

    /// Counts then deletes everything before one shared `stop`. A refresh
    /// that writes between the two requests with an earlier timestamp is
    /// removed without being counted.
    async fn delete_all(&self) -> Result<u64, StoreError> {
        // the delete API only takes whole seconds
        let stop = (Utc::now() + Duration::seconds(1)).trunc_subsecs(0);
        let flux = self.count_query(stop);
        debug!("Executing InfluxDB query: {}", flux);

        let existing = self
            .client
            .query::<RowCount>(Some(Query::new(flux)))
            .await?
            .first()
            .map(|c| c.value as u64)
            .unwrap_or(0);

        let start = NaiveDateTime::default();
        let predicate = format!(r#"_measurement="{}""#, self.config.measurement);

        self.client
            .delete(&self.config.bucket, start, stop.naive_utc(), Some(predicate))
            .await?;

        info!(
            "Deleted {} rate snapshots from bucket {}",
            existing, self.config.bucket
        );
        Ok(existing)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::sync::{Arc, Mutex};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};

    const COUNT_RESPONSE: &str = "#datatype,string,long,double,string,string\r\n\
        #group,false,false,false,true,true\r\n\
        #default,_result,,,,\r\n\
        ,result,table,_value,_field,_measurement\r\n\
        ,,0,18,count,exchange_rates\r\n";

    const RATES_RESPONSE: &str = "#datatype,string,long,dateTime:RFC3339,double,string,string,string,string\r\n\
        #group,false,false,false,false,false,false,false,false\r\n\
        #default,_result,,,,,,,\r\n\
        ,result,table,_time,_value,_field,_measurement,cryptocurrency,fiat_currency\r\n\
        ,,0,2024-03-01T12:05:00Z,3000,rate,exchange_rates,ETH,EUR\r\n\
        ,,0,2024-03-01T12:00:00Z,2900.5,rate,exchange_rates,ETH,EUR\r\n";

    fn store() -> InfluxRateStore {
        store_at("http://localhost:8086")
    }

    fn store_at(url: &str) -> InfluxRateStore {
        InfluxRateStore::new(InfluxConfig {
            url: url.to_string(),
            token: "token".to_string(),
            org: "org".to_string(),
            bucket: "rates".to_string(),
            measurement: "exchange_rates".to_string(),
        })
    }

    #[test]
    fn latest_query_applies_window_and_filters() {
        let since = Utc.with_ymd_and_hms(2024, 3, 1, 11, 55, 0).unwrap();
        let flux = store().latest_query(
            &RateFilter::pair(Cryptocurrency::Eth, FiatCurrency::Eur),
            since,
        );

        assert!(flux.contains(r#"from(bucket: "rates")"#));
        assert!(flux.contains("range(start: 2024-03-01T11:55:00.000000000Z)"));
        assert!(flux.contains(r#"r._measurement == "exchange_rates" and r._field == "rate""#));
        assert!(flux.contains(r#"r.cryptocurrency == "ETH""#));
        assert!(flux.contains(r#"r.fiat_currency == "EUR""#));
        assert!(flux.contains(r#"sort(columns: ["_time"], desc: true)"#));
    }

    #[test]
    fn unfiltered_query_has_no_tag_predicates() {
        let flux = store().latest_query(&RateFilter::all(), Utc::now());
        assert!(!flux.contains("r.cryptocurrency"));
        assert!(!flux.contains("r.fiat_currency"));
    }

    #[test]
    fn one_query_limits_to_newest_row() {
        let flux = store().one_query(Cryptocurrency::Ltc, FiatCurrency::Usd);
        assert!(flux.contains("range(start: 0)"));
        assert!(flux.contains(r#"r.cryptocurrency == "LTC""#));
        assert!(flux.ends_with("|> limit(n: 1)"));
    }

    #[test]
    fn count_query_is_bounded_and_keeps_field_column() {
        let stop = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 1).unwrap();
        let flux = store().count_query(stop);
        assert!(flux.contains("range(start: 0, stop: 2024-03-01T12:00:01Z)"));
        assert!(flux.contains("|> count()"));
        assert!(flux.contains("{ r with _value: float(v: r._value) }"));
        assert!(flux.contains(r#"set(key: "_field", value: "count")"#));
        assert!(flux.contains(r#"set(key: "_measurement", value: "exchange_rates")"#));
    }

    #[test]
    fn converts_rows_into_snapshots() {
        let time = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        let snapshot = into_snapshot(RateRow {
            cryptocurrency: "BTC".to_string(),
            fiat_currency: "GBP".to_string(),
            value: 40000.0,
            time: time.into(),
        })
        .unwrap();

        assert_eq!(snapshot.cryptocurrency, Cryptocurrency::Btc);
        assert_eq!(snapshot.fiat_currency, FiatCurrency::Gbp);
        assert_eq!(snapshot.rate, 40000.0);
        assert_eq!(snapshot.timestamp, time);
        assert_eq!(snapshot.id, "BTC-GBP-1709294400000000000");
    }

    #[test]
    fn rejects_unknown_tags() {
        let row = RateRow {
            cryptocurrency: "DOGE".to_string(),
            ..RateRow::default()
        };
        assert!(matches!(into_snapshot(row), Err(StoreError::ConversionError(_))));
    }

    /// Stand-in InfluxDB: answers every Flux query with `query_body`,
    /// acknowledges writes and deletes, and records the paths it served.
    async fn fake_influx(query_body: &'static str) -> (String, Arc<Mutex<Vec<String>>>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}", listener.local_addr().unwrap());
        let seen = Arc::new(Mutex::new(Vec::new()));
        let log = seen.clone();

        tokio::spawn(async move {
            loop {
                let (mut socket, _) = listener.accept().await.unwrap();
                let request = read_request(&mut socket).await;
                let path = request
                    .split_whitespace()
                    .nth(1)
                    .and_then(|target| target.split('?').next())
                    .unwrap_or_default()
                    .to_string();

                let response = if path == "/api/v2/query" {
                    format!(
                        "HTTP/1.1 200 OK\r\nContent-Type: text/csv\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                        query_body.len(),
                        query_body
                    )
                } else {
                    "HTTP/1.1 204 No Content\r\nConnection: close\r\n\r\n".to_string()
                };

                log.lock().unwrap().push(path);
                socket.write_all(response.as_bytes()).await.unwrap();
                let _ = socket.shutdown().await;
            }
        });

        (url, seen)
    }

    // Reads one request, sized by Content-Length or chunked framing
    async fn read_request(socket: &mut TcpStream) -> String {
        let mut buf = Vec::new();
        let mut chunk = [0u8; 4096];
        loop {
            let n = socket.read(&mut chunk).await.unwrap();
            if n == 0 {
                break;
            }
            buf.extend_from_slice(&chunk[..n]);

            let Some(end) = buf.windows(4).position(|w| w == b"\r\n\r\n") else {
                continue;
            };
            let head = String::from_utf8_lossy(&buf[..end]).to_ascii_lowercase();
            let body = &buf[end + 4..];
            let complete = if head.contains("transfer-encoding: chunked") {
                body.ends_with(b"0\r\n\r\n")
            } else {
                let length = head
                    .lines()
                    .find_map(|line| line.strip_prefix("content-length:"))
                    .and_then(|value| value.trim().parse::<usize>().ok())
                    .unwrap_or(0);
                body.len() >= length
            };
            if complete {
                break;
            }
        }
        String::from_utf8_lossy(&buf).into_owned()
    }

    #[tokio::test]
    async fn delete_all_reports_counted_rows() {
        let (url, seen) = fake_influx(COUNT_RESPONSE).await;

        let deleted = store_at(&url).delete_all().await.unwrap();

        assert_eq!(deleted, 18);
        assert_eq!(
            *seen.lock().unwrap(),
            vec!["/api/v2/query".to_string(), "/api/v2/delete".to_string()]
        );
    }

    #[tokio::test]
    async fn delete_all_on_empty_bucket_is_zero() {
        let (url, seen) = fake_influx("").await;

        assert_eq!(store_at(&url).delete_all().await.unwrap(), 0);
        assert!(seen.lock().unwrap().contains(&"/api/v2/delete".to_string()));
    }

    #[tokio::test]
    async fn append_writes_one_point_per_pair() {
        let (url, seen) = fake_influx("").await;
        let table = RateTable::try_from_fn::<(), _>(|_, _| Ok(1.5)).unwrap();

        let written = store_at(&url).append(&table, Utc::now()).await.unwrap();

        assert_eq!(written, 9);
        assert_eq!(*seen.lock().unwrap(), vec!["/api/v2/write".to_string()]);
    }

    #[tokio::test]
    async fn query_latest_decodes_rows_newest_first() {
        let (url, _) = fake_influx(RATES_RESPONSE).await;
        let since = Utc.with_ymd_and_hms(2024, 3, 1, 11, 0, 0).unwrap();

        let rows = store_at(&url)
            .query_latest(&RateFilter::pair(Cryptocurrency::Eth, FiatCurrency::Eur), since)
            .await
            .unwrap();

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].rate, 3000.0);
        assert_eq!(rows[1].rate, 2900.5);
        assert!(rows[0].timestamp > rows[1].timestamp);
        assert!(rows.iter().all(|r| r.cryptocurrency == Cryptocurrency::Eth));
    }
}
