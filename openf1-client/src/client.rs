use chrono::Datelike;
use chrono::Utc;
use serde::de::DeserializeOwned;
use tower_pace::ApiRequest;
use tower_pace::FetchError;
use tower_pace::FetchQueue;
use tower_pace::QueueConfig;
use tracing::debug;

use crate::records::CarData;
use crate::records::Driver;
use crate::records::Interval;
use crate::records::Lap;
use crate::records::Overtake;
use crate::records::Pit;
use crate::records::Position;
use crate::records::RaceControl;
use crate::records::Session;
use crate::records::Stint;
use crate::records::TeamRadio;
use crate::records::TrackLocation;
use crate::records::Weather;

pub const SESSION_TYPE_RACE: &str = "Race";

/// Optional `date_start`/`date_end` bounds for the high-rate telemetry
/// endpoints. Values are passed through as upstream date filters.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DateWindow {
    pub start: Option<String>,
    pub end: Option<String>,
}

impl DateWindow {
    pub fn between(start: impl Into<String>, end: impl Into<String>) -> Self {
        Self {
            start: Some(start.into()),
            end: Some(end.into()),
        }
    }

    fn apply(&self, request: ApiRequest) -> ApiRequest {
        let non_empty = |v: &Option<String>| v.as_deref().filter(|s| !s.is_empty()).map(str::to_owned);
        request
            .param_opt("date_start", non_empty(&self.start))
            .param_opt("date_end", non_empty(&self.end))
    }
}

/// Typed access to the OpenF1 endpoints.
///
/// Every call goes through the one [`FetchQueue`] the client was built
/// with, so all of them share its spacing and retry budget. Like
/// [`FetchQueue::enqueue`], every operation is fail-soft: a failed fetch
/// yields no records.
#[derive(Clone, Debug)]
pub struct OpenF1 {
    queue: FetchQueue,
}

impl OpenF1 {
    pub fn new(queue: FetchQueue) -> Self {
        Self { queue }
    }

    /// A client over the real upstream. Must be called inside a tokio runtime.
    pub fn from_config(config: &QueueConfig) -> Result<Self, FetchError> {
        Ok(Self::new(FetchQueue::new(config)?))
    }

    pub fn queue(&self) -> &FetchQueue {
        &self.queue
    }

    pub async fn sessions(&self, year: i32, session_type: &str) -> Vec<Session> {
        self.get(
            ApiRequest::new("/sessions")
                .param("year", year)
                .param("session_type", session_type),
        )
        .await
    }

    /// The most recent race of the current UTC year, falling back to the
    /// previous year before the season has started.
    pub async fn latest_session(&self) -> Option<Session> {
        self.latest_session_as_of(Utc::now().year()).await
    }

    /// The most recent race of `year`, else of `year - 1`.
    pub async fn latest_session_as_of(&self, year: i32) -> Option<Session> {
        for year in [year, year - 1] {
            let sessions = self.sessions(year, SESSION_TYPE_RACE).await;
            // max_by_key keeps the last of equal starts, matching a stable sort.
            if let Some(latest) = sessions.into_iter().max_by_key(|s| s.date_start) {
                return Some(latest);
            }
            debug!(year, "no races found");
        }
        None
    }

    pub async fn drivers(&self, session_key: u32) -> Vec<Driver> {
        self.get(by_session("/drivers", session_key)).await
    }

    pub async fn laps(&self, session_key: u32, driver_number: Option<u32>) -> Vec<Lap> {
        self.get(by_driver("/laps", session_key, driver_number)).await
    }

    pub async fn positions(&self, session_key: u32, driver_number: Option<u32>) -> Vec<Position> {
        self.get(by_driver("/position", session_key, driver_number))
            .await
    }

    pub async fn car_data(
        &self,
        session_key: u32,
        driver_number: u32,
        window: &DateWindow,
    ) -> Vec<CarData> {
        let request = window.apply(by_driver("/car_data", session_key, Some(driver_number)));
        self.get(request).await
    }

    pub async fn stints(&self, session_key: u32, driver_number: Option<u32>) -> Vec<Stint> {
        self.get(by_driver("/stints", session_key, driver_number)).await
    }

    pub async fn race_control(&self, session_key: u32) -> Vec<RaceControl> {
        self.get(by_session("/race_control", session_key)).await
    }

    pub async fn locations(
        &self,
        session_key: u32,
        driver_number: Option<u32>,
        window: &DateWindow,
    ) -> Vec<TrackLocation> {
        let request = window.apply(by_driver("/location", session_key, driver_number));
        self.get(request).await
    }

    pub async fn pits(&self, session_key: u32, driver_number: Option<u32>) -> Vec<Pit> {
        self.get(by_driver("/pit", session_key, driver_number)).await
    }

    pub async fn intervals(&self, session_key: u32, driver_number: Option<u32>) -> Vec<Interval> {
        self.get(by_driver("/intervals", session_key, driver_number))
            .await
    }

    pub async fn team_radio(&self, session_key: u32, driver_number: Option<u32>) -> Vec<TeamRadio> {
        self.get(by_driver("/team_radio", session_key, driver_number))
            .await
    }

    /// Overtakes in a session, optionally only those made by one driver.
    pub async fn overtakes(
        &self,
        session_key: u32,
        overtaking_driver: Option<u32>,
    ) -> Vec<Overtake> {
        let request = by_session("/overtakes", session_key)
            .param_opt("overtaking_driver_number", driver_filter(overtaking_driver));
        self.get(request).await
    }

    pub async fn weather(&self, session_key: u32) -> Vec<Weather> {
        self.get(by_session("/weather", session_key)).await
    }

    async fn get<T: DeserializeOwned>(&self, request: ApiRequest) -> Vec<T> {
        self.queue.enqueue(request).await
    }
}

fn by_session(path: &str, session_key: u32) -> ApiRequest {
    ApiRequest::new(path).param("session_key", session_key)
}

fn by_driver(path: &str, session_key: u32, driver_number: Option<u32>) -> ApiRequest {
    by_session(path, session_key).param_opt("driver_number", driver_filter(driver_number))
}

// Driver numbers start at 1; 0 means "no filter".
fn driver_filter(driver_number: Option<u32>) -> Option<u32> {
    driver_number.filter(|&n| n != 0)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::Mutex;
    use std::time::Duration;

    use tower::BoxError;
    use tower::service_fn;
    use tower_pace::ApiResponse;

    use super::*;
    use crate::records::Compound;

    type Log = Arc<Mutex<Vec<String>>>;

    fn race(key: u32, start: &str) -> serde_json::Value {
        serde_json::json!({
            "session_key": key, "meeting_key": 1000 + key,
            "session_name": "Race", "session_type": "Race",
            "date_start": start, "date_end": start,
            "gmt_offset": "00:00:00", "year": 2024,
            "circuit_key": 1, "circuit_short_name": "Circuit",
            "country_code": "GBR"
        })
    }

    /// A client over an in-process upstream that logs each request line and
    /// answers with whatever `respond` returns for it.
    fn client<F>(respond: F) -> (OpenF1, Log)
    where
        F: Fn(&ApiRequest) -> ApiResponse + Send + Sync + 'static,
    {
        let log: Log = Arc::default();
        let seen = log.clone();
        let respond = Arc::new(respond);
        let transport = service_fn(move |req: ApiRequest| {
            seen.lock().unwrap().push(req.to_string());
            let response = respond(&req);
            async move { Ok::<_, BoxError>(response) }
        });
        let config = QueueConfig {
            min_interval: Duration::from_millis(200),
            backoff_step: Duration::from_millis(10),
            ..QueueConfig::default()
        };
        let queue = FetchQueue::with_transport(&config, transport);
        (OpenF1::new(queue), log)
    }

    fn json(value: serde_json::Value) -> ApiResponse {
        ApiResponse::new(200, value.to_string())
    }

    #[tokio::test(start_paused = true)]
    async fn latest_session_is_the_latest_race_of_the_year() {
        let (f1, log) = client(|_| {
            json(serde_json::json!([
                race(3, "2024-05-05T20:00:00+00:00"),
                race(1, "2024-03-02T15:00:00+00:00"),
                race(2, "2024-03-09T17:00:00+00:00"),
            ]))
        });

        let latest = f1.latest_session_as_of(2024).await.unwrap();

        assert_eq!(latest.session_key, 3);
        assert_eq!(*log.lock().unwrap(), ["/sessions?year=2024&session_type=Race"]);
    }

    #[tokio::test(start_paused = true)]
    async fn latest_session_compares_instants_not_strings() {
        // Same instant written with different offsets sorts by time.
        let (f1, _log) = client(|_| {
            json(serde_json::json!([
                race(1, "2024-06-01T23:00:00-05:00"),
                race(2, "2024-06-02T02:00:00+00:00"),
            ]))
        });

        let latest = f1.latest_session_as_of(2024).await.unwrap();

        assert_eq!(latest.session_key, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn latest_session_falls_back_to_last_year() {
        let (f1, log) = client(|req| {
            if req.to_string().contains("year=2025") {
                json(serde_json::json!([]))
            } else {
                json(serde_json::json!([race(9, "2024-12-08T13:00:00+00:00")]))
            }
        });

        let latest = f1.latest_session_as_of(2025).await.unwrap();

        assert_eq!(latest.session_key, 9);
        assert_eq!(
            *log.lock().unwrap(),
            [
                "/sessions?year=2025&session_type=Race",
                "/sessions?year=2024&session_type=Race",
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn latest_session_is_none_when_both_years_fail() {
        let (f1, log) = client(|_| ApiResponse::new(503, ""));

        assert_eq!(f1.latest_session_as_of(2025).await, None);
        // A non-429 status is final, so each year costs exactly one dispatch.
        assert_eq!(log.lock().unwrap().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn driver_filters_are_optional() {
        let (f1, log) = client(|_| json(serde_json::json!([])));

        f1.laps(9158, Some(44)).await;
        f1.laps(9158, None).await;
        f1.positions(9158, Some(0)).await;
        f1.pits(9158, Some(1)).await;

        assert_eq!(
            *log.lock().unwrap(),
            [
                "/laps?session_key=9158&driver_number=44",
                "/laps?session_key=9158",
                "/position?session_key=9158",
                "/pit?session_key=9158&driver_number=1",
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn windows_and_overtake_filters_use_upstream_keys() {
        let (f1, log) = client(|_| json(serde_json::json!([])));

        f1.car_data(
            9158,
            16,
            &DateWindow::between("2023-09-17T13:00:00", "2023-09-17T13:01:00"),
        )
        .await;
        f1.locations(
            9158,
            None,
            &DateWindow {
                start: Some(String::new()),
                end: Some("2023-09-17T13:01:00".into()),
            },
        )
        .await;
        f1.overtakes(9158, Some(81)).await;
        f1.weather(9158).await;

        assert_eq!(
            *log.lock().unwrap(),
            [
                "/car_data?session_key=9158&driver_number=16&date_start=2023-09-17T13:00:00&date_end=2023-09-17T13:01:00",
                "/location?session_key=9158&date_end=2023-09-17T13:01:00",
                "/overtakes?session_key=9158&overtaking_driver_number=81",
                "/weather?session_key=9158",
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn records_are_decoded_into_their_types() {
        let (f1, _log) = client(|req| match req.path() {
            "/stints" => json(serde_json::json!([{
                "session_key": 9158, "meeting_key": 1219, "driver_number": 44,
                "stint_number": 1, "compound": "MEDIUM", "tyre_age_at_start": 3,
                "lap_start": 1, "lap_end": 18
            }])),
            _ => ApiResponse::new(404, ""),
        });

        let stints = f1.stints(9158, Some(44)).await;
        let drivers = f1.drivers(9158).await;

        assert_eq!(stints.len(), 1);
        assert_eq!(stints[0].compound, Some(Compound::Medium));
        assert_eq!(stints[0].lap_end, Some(18));
        assert!(drivers.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn a_shape_mismatch_yields_no_records() {
        let (f1, log) = client(|_| json(serde_json::json!([{"unexpected": true}])));

        assert!(f1.race_control(9158).await.is_empty());
        assert_eq!(log.lock().unwrap().len(), 1);
    }
}
