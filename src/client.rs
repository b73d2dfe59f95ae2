use std::fmt::Display;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use log::{debug, error, warn};
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use crate::auth::{self, TokenResponse};
use crate::config::{ClientOptions, Credentials, RefreshFailurePolicy};
use crate::error::{Error, Result};
use crate::events::{ClientEvent, EventBus, EventKind, Payload};
use crate::request::{self, clamp_limit, normalize_timestamp, normalize_types, require, Params};
use crate::session::{Release, Session, TokenOrWait};
use crate::types::{
    is_blank, CameraPictureOptions, DateEnd, Device, DeviceFilter, EventsUntilOptions,
    HomeDataOptions, LastEventOfOptions, MeasureOptions, NextEventsOptions, StationsDataOptions,
    SyncScheduleOptions, ThermpointOptions,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Placement {
    Form,
    Query,
}

/// One outgoing endpoint request, built fresh per call.
#[derive(Debug)]
struct Call {
    operation: &'static str,
    method: Method,
    path: &'static str,
    placement: Placement,
    params: Params,
}

impl Call {
    fn post(operation: &'static str, path: &'static str, params: Params) -> Self {
        Self {
            operation,
            method: Method::POST,
            path,
            placement: Placement::Form,
            params,
        }
    }

    fn get(operation: &'static str, path: &'static str, params: Params) -> Self {
        Self {
            operation,
            method: Method::GET,
            path,
            placement: Placement::Query,
            params,
        }
    }
}

/// Client for the Netatmo REST API.
///
/// Cloning is cheap and every clone shares one session, one event channel
/// and one refresh timer. Calls made before a token exists wait for
/// `authenticate()` and are released in the order they were made.
#[derive(Clone)]
pub struct NetatmoClient {
    inner: Arc<Inner>,
}

struct Inner {
    http: reqwest::Client,
    options: ClientOptions,
    session: Mutex<Session>,
    events: EventBus,
    refresh_task: Mutex<Option<JoinHandle<()>>>,
}

impl Inner {
    fn session(&self) -> MutexGuard<'_, Session> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn replace_refresh_task(&self, task: Option<JoinHandle<()>>) {
        let mut slot = self
            .refresh_task
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(previous) = std::mem::replace(&mut *slot, task) {
            previous.abort();
        }
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        let slot = self
            .refresh_task
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(task) = slot.take() {
            task.abort();
        }
    }
}

impl NetatmoClient {
    pub fn new(credentials: Credentials) -> Self {
        Self::with_options(credentials, ClientOptions::default())
    }

    pub fn with_options(credentials: Credentials, options: ClientOptions) -> Self {
        Self {
            inner: Arc::new(Inner {
                http: reqwest::Client::new(),
                events: EventBus::new(options.event_capacity),
                options,
                session: Mutex::new(Session::new(credentials)),
                refresh_task: Mutex::new(None),
            }),
        }
    }

    pub fn new_with_base_url(credentials: Credentials, base_url: String) -> Self {
        Self::with_options(
            credentials,
            ClientOptions {
                base_url,
                ..Default::default()
            },
        )
    }

    pub fn base_url(&self) -> &str {
        &self.inner.options.base_url
    }

    pub fn access_token(&self) -> Option<String> {
        self.inner.session().access_token().map(str::to_owned)
    }

    pub fn is_authenticated(&self) -> bool {
        self.inner.session().access_token().is_some()
    }

    /// Whether a token refresh is currently pending on the timer.
    pub fn has_scheduled_refresh(&self) -> bool {
        self.inner
            .refresh_task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(|task| !task.is_finished())
            .unwrap_or(false)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ClientEvent> {
        self.inner.events.subscribe()
    }

    /// Obtains an access token and releases any deferred calls.
    ///
    /// A pre-issued access token is used as-is without contacting the server.
    /// Otherwise a password grant is performed and, when the server reports an
    /// expiry, a refresh is scheduled for exactly that many seconds later.
    pub async fn authenticate(&self) -> Result<()> {
        let credentials = self.inner.session().credentials.clone();

        if let Err(err) = credentials.validate() {
            error!("{}", err);
            return Err(self.inner.events.error(err));
        }

        if let Some(token) = credentials.preissued_token() {
            debug!("Using pre-issued access token");
            self.inner.replace_refresh_task(None);
            self.inner.session().set_tokens(token.to_string(), None);
            self.inner.events.emit(ClientEvent::Authenticated);
            return Ok(());
        }

        let token =
            match auth::password_grant(&self.inner.http, self.base_url(), &credentials).await {
                Ok(token) => token,
                Err(err) => {
                    error!("{}", err);
                    return Err(self.inner.events.error(err));
                }
            };

        self.install(token);
        debug!("Authentication successful");
        self.inner.events.emit(ClientEvent::Authenticated);
        Ok(())
    }

    /// Exchanges `refresh_token` for a new access token and reschedules the
    /// next refresh the same way `authenticate()` does.
    pub async fn refresh(&self, refresh_token: &str) -> Result<()> {
        let token = self.refresh_grant(refresh_token).await?;
        debug!("Access token refreshed");
        self.install(token);
        Ok(())
    }

    /// Stops the refresh timer and abandons calls still waiting for a token.
    pub fn shutdown(&self) {
        self.inner.replace_refresh_task(None);
        let abandoned = self.inner.session().abandon_deferred();
        if abandoned > 0 {
            debug!("Abandoned {} deferred call(s) on shutdown", abandoned);
        }
    }

    fn install(&self, token: TokenResponse) {
        let delay = token.refresh_delay();
        let refresh_token = token.refresh_token.clone();
        self.inner
            .session()
            .set_tokens(token.access_token, token.refresh_token);

        match (delay, refresh_token) {
            (Some(delay), Some(refresh_token)) => self.schedule_refresh(delay, refresh_token),
            _ => self.inner.replace_refresh_task(None),
        }
    }

    fn schedule_refresh(&self, delay: Duration, refresh_token: String) {
        debug!("Scheduling token refresh in {}s", delay.as_secs());
        let task = tokio::spawn(refresh_loop(
            Arc::downgrade(&self.inner),
            delay,
            refresh_token,
        ));
        self.inner.replace_refresh_task(Some(task));
    }

    async fn refresh_grant(&self, refresh_token: &str) -> Result<TokenResponse> {
        let credentials = self.inner.session().credentials.clone();
        auth::refresh_grant(&self.inner.http, self.base_url(), &credentials, refresh_token)
            .await
            .map_err(|err| self.refresh_failed(err))
    }

    fn refresh_failed(&self, err: Error) -> Error {
        match self.inner.options.refresh_failure {
            RefreshFailurePolicy::Warn => {
                warn!("{}", err);
                self.inner.events.warning(err)
            }
            RefreshFailurePolicy::Invalidate => {
                error!("{}; dropping access token", err);
                self.inner.session().clear_access_token();
                self.inner.events.error(err)
            }
        }
    }

    /// Waits for a token, queueing behind `authenticate()` when there is none yet.
    ///
    /// A deferred call also gets a `Release`, which it holds until its request
    /// has been sent so that queued calls reach the server in arrival order.
    async fn token_for(&self, operation: &'static str) -> Result<(String, Option<Release>)> {
        let state = self.inner.session().token_or_defer();
        let receiver = match state {
            TokenOrWait::Ready(token) => return Ok((token, None)),
            TokenOrWait::Wait(receiver) => receiver,
        };

        debug!("{} deferred until authenticated", operation);
        let released = match self.inner.options.deferred_call_timeout {
            Some(limit) => tokio::time::timeout(limit, receiver).await.ok(),
            None => Some(receiver.await),
        };

        match released {
            Some(Ok(mut release)) => {
                release.wait_turn().await;
                Ok((release.token().to_string(), Some(release)))
            }
            _ => {
                let err = Error::DeferredCallAbandoned(operation.to_string());
                warn!("{}", err);
                Err(self.inner.events.warning(err))
            }
        }
    }

    fn reject(&self, err: Error) -> Error {
        error!("{}", err);
        self.inner.events.error(err)
    }

    fn validate(&self, operation: &str, fields: &[(&str, &str)]) -> Result<()> {
        for (field, value) in fields {
            require(operation, field, value).map_err(|err| self.reject(err))?;
        }
        Ok(())
    }

    fn api_warning(&self, operation: &str, reason: impl Display) -> Error {
        let err = Error::Api(format!("{} error: {}", operation, reason));
        warn!("{}", err);
        self.inner.events.warning(err)
    }

    fn publish(&self, kind: EventKind, payload: Payload) {
        self.inner.events.emit(ClientEvent::Data { kind, payload });
    }

    async fn execute(&self, call: Call) -> Result<reqwest::Response> {
        let (token, release) = self.token_for(call.operation).await?;
        let url = format!("{}{}", self.base_url(), call.path);
        let params = call.params.authorized(&token);

        debug!("{} {} ({})", call.method, call.path, call.operation);

        let builder = self.inner.http.request(call.method, &url);
        let builder = match call.placement {
            Placement::Form => builder.form(params.pairs()),
            Placement::Query => builder.query(params.pairs()),
        };

        let sent = request::send_once(builder).await;
        // The next deferred call may go now.
        drop(release);
        sent.map_err(|reason| self.api_warning(call.operation, reason))
    }

    /// Sends the call and pulls the payload found at `pointer` out of the JSON body.
    async fn fetch_json(&self, call: Call, pointer: &str) -> Result<Value> {
        let operation = call.operation;
        let response = self.execute(call).await?;

        let text = response
            .text()
            .await
            .map_err(|e| self.api_warning(operation, e))?;
        let body: Value =
            serde_json::from_str(&text).map_err(|e| self.api_warning(operation, e))?;

        match body.pointer(pointer) {
            Some(payload) => Ok(payload.clone()),
            None => Err(self.api_warning(
                operation,
                format!("response has no '{}'", pointer.trim_start_matches('/')),
            )),
        }
    }

    fn decode<T: DeserializeOwned>(&self, operation: &str, value: Value) -> Result<T> {
        serde_json::from_value(value).map_err(|e| self.api_warning(operation, e))
    }

    async fn fetch_devices(&self, call: Call, kind: EventKind) -> Result<Vec<Device>> {
        let operation = call.operation;
        let devices = self.fetch_json(call, "/body/devices").await?;
        let parsed: Vec<Device> = self.decode(operation, devices.clone())?;

        debug!("{}: found {} device(s)", operation, parsed.len());
        self.publish(kind, Payload::Json(devices));
        Ok(parsed)
    }

    async fn fetch_body(&self, call: Call, kind: EventKind) -> Result<Value> {
        let body = self.fetch_json(call, "/body").await?;
        self.publish(kind, Payload::Json(body.clone()));
        Ok(body)
    }

    async fn fetch_status(&self, call: Call, kind: EventKind) -> Result<String> {
        let operation = call.operation;
        let status = self.fetch_json(call, "/status").await?;
        let parsed: String = self.decode(operation, status.clone())?;
        self.publish(kind, Payload::Json(status));
        Ok(parsed)
    }

    /// Weather stations of the account, plus favourites when asked for.
    pub async fn get_stations_data(&self, options: StationsDataOptions) -> Result<Vec<Device>> {
        let params = Params::new()
            .with_non_empty("device_id", options.device_id.as_deref())
            .with_opt("get_favorites", options.get_favorites.filter(|f| *f));

        self.fetch_devices(
            Call::post("getStationsData", "/api/getstationsdata", params),
            EventKind::StationsData,
        )
        .await
    }

    pub async fn get_thermostats_data(&self, filter: DeviceFilter) -> Result<Vec<Device>> {
        let params = Params::new().with_non_empty("device_id", filter.device_id.as_deref());

        self.fetch_devices(
            Call::get("getThermostatsData", "/api/getthermostatsdata", params),
            EventKind::ThermostatsData,
        )
        .await
    }

    /// Historical measurements of a device or module.
    ///
    /// Types are comma-joined, stripped of whitespace and lower-cased; dates
    /// may be given in seconds or milliseconds; `limit` is capped at 1024.
    pub async fn get_measure(&self, options: MeasureOptions) -> Result<Value> {
        const OPERATION: &str = "getMeasure";

        self.validate(
            OPERATION,
            &[("device_id", options.device_id.as_str()), ("scale", options.scale.as_str())],
        )?;
        if options.types.is_empty() {
            return Err(self.reject(Error::Config(format!(
                "{} 'type' not set.",
                OPERATION
            ))));
        }

        let params = measure_params(&options).map_err(|err| self.reject(err))?;

        self.fetch_body(
            Call::post(OPERATION, "/api/getmeasure", params),
            EventKind::Measure,
        )
        .await
    }

    /// Replaces the weekly schedule of a thermostat. Returns the API status.
    pub async fn set_sync_schedule(&self, options: SyncScheduleOptions) -> Result<String> {
        const OPERATION: &str = "setSyncSchedule";

        self.validate(
            OPERATION,
            &[
                ("device_id", options.device_id.as_str()),
                ("module_id", options.module_id.as_str()),
            ],
        )?;
        for (field, value) in [("zones", &options.zones), ("timetable", &options.timetable)] {
            if is_blank(value) {
                return Err(self.reject(Error::Config(format!(
                    "{} '{}' not set.",
                    OPERATION, field
                ))));
            }
        }

        let params = Params::new()
            .with("device_id", options.device_id.as_str())
            .with("module_id", options.module_id.as_str())
            .with("zones", &options.zones)
            .with("timetable", &options.timetable);

        self.fetch_status(
            Call::post(OPERATION, "/api/syncschedule", params),
            EventKind::SyncSchedule,
        )
        .await
    }

    /// Changes the set-point mode of a thermostat. Returns the API status.
    pub async fn set_thermpoint(&self, options: ThermpointOptions) -> Result<String> {
        const OPERATION: &str = "setThermpoint";

        self.validate(
            OPERATION,
            &[
                ("device_id", options.device_id.as_str()),
                ("module_id", options.module_id.as_str()),
                ("setpoint_mode", options.setpoint_mode.as_str()),
            ],
        )?;

        let params = Params::new()
            .with("device_id", options.device_id.as_str())
            .with("module_id", options.module_id.as_str())
            .with("setpoint_mode", options.setpoint_mode.as_str())
            .with_opt("setpoint_endtime", options.setpoint_endtime.filter(|t| *t != 0))
            .with_opt("setpoint_temp", options.setpoint_temp.filter(|t| *t != 0.0));

        self.fetch_status(
            Call::post(OPERATION, "/api/setthermpoint", params),
            EventKind::Thermpoint,
        )
        .await
    }

    pub async fn get_home_data(&self, options: HomeDataOptions) -> Result<Value> {
        let params = Params::new()
            .with_non_empty("home_id", options.home_id.as_deref())
            .with_opt("size", options.size.filter(|s| *s > 0));

        self.fetch_body(
            Call::post("getHomeData", "/api/gethomedata", params),
            EventKind::HomeData,
        )
        .await
    }

    pub async fn get_next_events(&self, options: NextEventsOptions) -> Result<Value> {
        const OPERATION: &str = "getNextEvents";

        self.validate(
            OPERATION,
            &[
                ("home_id", options.home_id.as_str()),
                ("event_id", options.event_id.as_str()),
            ],
        )?;

        let params = Params::new()
            .with("home_id", options.home_id.as_str())
            .with("event_id", options.event_id.as_str())
            .with_opt("size", options.size.filter(|s| *s > 0));

        self.fetch_body(
            Call::post(OPERATION, "/api/getnextevents", params),
            EventKind::NextEvents,
        )
        .await
    }

    pub async fn get_last_event_of(&self, options: LastEventOfOptions) -> Result<Value> {
        const OPERATION: &str = "getLastEventOf";

        self.validate(
            OPERATION,
            &[
                ("home_id", options.home_id.as_str()),
                ("person_id", options.person_id.as_str()),
            ],
        )?;

        let params = Params::new()
            .with("home_id", options.home_id.as_str())
            .with("person_id", options.person_id.as_str())
            .with_opt("offset", options.offset.filter(|o| *o > 0));

        self.fetch_body(
            Call::post(OPERATION, "/api/getlasteventof", params),
            EventKind::LastEventOf,
        )
        .await
    }

    pub async fn get_events_until(&self, options: EventsUntilOptions) -> Result<Value> {
        const OPERATION: &str = "getEventsUntil";

        self.validate(
            OPERATION,
            &[
                ("home_id", options.home_id.as_str()),
                ("event_id", options.event_id.as_str()),
            ],
        )?;

        let params = Params::new()
            .with("home_id", options.home_id.as_str())
            .with("event_id", options.event_id.as_str());

        self.fetch_body(
            Call::post(OPERATION, "/api/geteventsuntil", params),
            EventKind::EventsUntil,
        )
        .await
    }

    /// Raw image bytes of a camera snapshot.
    pub async fn get_camera_picture(&self, options: CameraPictureOptions) -> Result<Vec<u8>> {
        const OPERATION: &str = "getCameraPicture";

        self.validate(
            OPERATION,
            &[("image_id", options.image_id.as_str()), ("key", options.key.as_str())],
        )?;

        let params = Params::new()
            .with("image_id", options.image_id.as_str())
            .with("key", options.key.as_str());

        let response = self
            .execute(Call::get(OPERATION, "/api/getcamerapicture", params))
            .await?;
        let picture = response
            .bytes()
            .await
            .map_err(|e| self.api_warning(OPERATION, e))?
            .to_vec();

        debug!("{}: received {} bytes", OPERATION, picture.len());
        self.publish(EventKind::CameraPicture, Payload::Bytes(picture.clone()));
        Ok(picture)
    }

    pub async fn get_healthy_home_coach_data(&self, filter: DeviceFilter) -> Result<Vec<Device>> {
        let params = Params::new().with_non_empty("device_id", filter.device_id.as_deref());

        self.fetch_devices(
            Call::get(
                "getHealthyHomeCoachData",
                "/api/gethomecoachsdata",
                params,
            ),
            EventKind::HomeCoachsData,
        )
        .await
    }
}

/// Keeps the token fresh until a refresh fails, the server stops sending an
/// expiry, or the client is gone.
async fn refresh_loop(inner: Weak<Inner>, mut delay: Duration, mut refresh_token: String) {
    loop {
        tokio::time::sleep(delay).await;

        // The client may have been dropped while we slept.
        let Some(strong) = inner.upgrade() else {
            break;
        };
        let client = NetatmoClient { inner: strong };

        let token = match client.refresh_grant(&refresh_token).await {
            Ok(token) => token,
            Err(_) => break,
        };
        debug!("Access token refreshed");

        let next_delay = token.refresh_delay();
        let next_refresh_token = token.refresh_token.clone();
        client
            .inner
            .session()
            .set_tokens(token.access_token, token.refresh_token);

        match (next_delay, next_refresh_token) {
            (Some(next_delay), Some(next_refresh_token)) => {
                delay = next_delay;
                refresh_token = next_refresh_token;
            }
            _ => break,
        }
    }
}

fn measure_params(options: &MeasureOptions) -> Result<Params> {
    let mut params = Params::new()
        .with("device_id", options.device_id.as_str())
        .with("scale", options.scale.as_str())
        .with("type", normalize_types(&options.types.0))
        .with_non_empty("module_id", options.module_id.as_deref());

    if let Some(begin) = options.date_begin.filter(|b| *b != 0) {
        params = params.with("date_begin", normalize_timestamp(begin)?);
    }

    match options.date_end {
        Some(DateEnd::Last) => params = params.with("date_end", "last"),
        Some(DateEnd::At(end)) if end != 0 => {
            params = params.with("date_end", normalize_timestamp(end)?)
        }
        _ => {}
    }

    if let Some(limit) = options.limit.filter(|l| *l > 0) {
        params = params.with("limit", clamp_limit(limit));
    }

    Ok(params
        .with_opt("optimize", options.optimize)
        .with_opt("real_time", options.real_time))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_BASE_URL;

    // Nothing listens here; tests using it must never reach the network.
    const UNREACHABLE: &str = "http://127.0.0.1:9";

    #[test]
    fn test_client_creation() {
        let client = NetatmoClient::new(Credentials::default());
        assert_eq!(client.base_url(), DEFAULT_BASE_URL);
        assert!(client.access_token().is_none());
        assert!(!client.is_authenticated());
        assert!(!client.has_scheduled_refresh());
    }

    #[test]
    fn test_client_with_custom_base_url() {
        let custom_url = "https://test.example.com".to_string();
        let client = NetatmoClient::new_with_base_url(Credentials::default(), custom_url.clone());
        assert_eq!(client.base_url(), custom_url);
    }

    #[test]
    fn test_measure_params_normalization() {
        let options = MeasureOptions {
            date_begin: Some(1_500_000_000_000),
            date_end: Some(DateEnd::Last),
            limit: Some(5000),
            optimize: Some(false),
            ..MeasureOptions::new("70:ee:50:00:02:20", "max", ["Temperature", "CO2"])
        };

        let params = measure_params(&options).unwrap();
        assert_eq!(params.get("type"), Some("temperature,co2"));
        assert_eq!(params.get("date_begin"), Some("1500000000"));
        assert_eq!(params.get("date_end"), Some("last"));
        assert_eq!(params.get("limit"), Some("1024"));
        assert_eq!(params.get("optimize"), Some("false"));
        assert_eq!(params.get("real_time"), None);
        assert_eq!(params.get("module_id"), None);
    }

    #[test]
    fn test_measure_params_date_end_in_seconds() {
        let options = MeasureOptions {
            date_end: Some(DateEnd::At(1_500_003_600)),
            limit: Some(0),
            ..MeasureOptions::new("70:ee:50:00:02:20", "1hour", "Humidity")
        };

        let params = measure_params(&options).unwrap();
        assert_eq!(params.get("date_end"), Some("1500003600"));
        assert_eq!(params.get("limit"), None);
    }

    #[tokio::test]
    async fn test_missing_required_field_fails_before_gate() {
        let client =
            NetatmoClient::new_with_base_url(Credentials::default(), UNREACHABLE.to_string());
        let mut events = client.subscribe();

        let result = client
            .get_next_events(NextEventsOptions {
                home_id: "home".to_string(),
                ..Default::default()
            })
            .await;

        match result {
            Err(Error::Config(msg)) => assert_eq!(msg, "getNextEvents 'event_id' not set."),
            other => panic!("unexpected result: {:?}", other),
        }
        match events.try_recv().unwrap() {
            ClientEvent::Error(err) => assert!(err.to_string().contains("'event_id'")),
            other => panic!("unexpected event: {}", other.name()),
        }
    }

    #[tokio::test]
    async fn test_authenticate_rejects_incomplete_credentials() {
        let client = NetatmoClient::new_with_base_url(
            Credentials::new("id", "secret", "", "hunter2"),
            UNREACHABLE.to_string(),
        );

        let err = client.authenticate().await.unwrap_err();
        assert!(err.to_string().contains("'username'"));
        assert!(!client.is_authenticated());
    }

    #[tokio::test]
    async fn test_preissued_token_skips_grant() {
        let client = NetatmoClient::new_with_base_url(
            Credentials::with_access_token("abc|def"),
            UNREACHABLE.to_string(),
        );
        let mut events = client.subscribe();

        client.authenticate().await.unwrap();
        assert_eq!(client.access_token().as_deref(), Some("abc|def"));
        assert!(!client.has_scheduled_refresh());
        assert!(matches!(
            events.try_recv().unwrap(),
            ClientEvent::Authenticated
        ));
    }

    #[tokio::test]
    async fn test_deferred_call_times_out() {
        let client = NetatmoClient::with_options(
            Credentials::default(),
            ClientOptions {
                base_url: UNREACHABLE.to_string(),
                deferred_call_timeout: Some(Duration::from_millis(20)),
                ..Default::default()
            },
        );

        let result = client.get_home_data(HomeDataOptions::default()).await;
        assert!(matches!(result, Err(Error::DeferredCallAbandoned(op)) if op == "getHomeData"));
    }

    #[tokio::test]
    async fn test_shutdown_abandons_deferred_calls() {
        let client =
            NetatmoClient::new_with_base_url(Credentials::default(), UNREACHABLE.to_string());

        let pending = {
            let client = client.clone();
            tokio::spawn(async move { client.get_stations_data(Default::default()).await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!pending.is_finished());

        client.shutdown();
        let result = pending.await.unwrap();
        assert!(matches!(result, Err(Error::DeferredCallAbandoned(_))));
    }
}
