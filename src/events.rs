use std::fmt;

use serde_json::Value;
use tokio::sync::broadcast;

use crate::error::Error;

/// Names the data event each endpoint publishes on success.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    StationsData,
    ThermostatsData,
    Measure,
    SyncSchedule,
    Thermpoint,
    HomeData,
    NextEvents,
    LastEventOf,
    EventsUntil,
    CameraPicture,
    HomeCoachsData,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::StationsData => "get-stationsdata",
            EventKind::ThermostatsData => "get-thermostatsdata",
            EventKind::Measure => "get-measure",
            EventKind::SyncSchedule => "set-syncschedule",
            EventKind::Thermpoint => "set-thermpoint",
            EventKind::HomeData => "get-homedata",
            EventKind::NextEvents => "get-nextevents",
            EventKind::LastEventOf => "get-lasteventof",
            EventKind::EventsUntil => "get-eventsuntil",
            EventKind::CameraPicture => "get-camerapicture",
            EventKind::HomeCoachsData => "get-healthhomecoaches-data",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Json(Value),
    Bytes(Vec<u8>),
}

impl Payload {
    pub fn as_json(&self) -> Option<&Value> {
        match self {
            Payload::Json(value) => Some(value),
            Payload::Bytes(_) => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Payload::Bytes(bytes) => Some(bytes),
            Payload::Json(_) => None,
        }
    }
}

/// Everything a passive listener can observe on a client.
#[derive(Debug, Clone)]
pub enum ClientEvent {
    Authenticated,
    /// Configuration problems and failed password grants.
    Error(Error),
    /// Endpoint failures and failed token refreshes.
    Warning(Error),
    Data { kind: EventKind, payload: Payload },
}

impl ClientEvent {
    pub fn name(&self) -> &'static str {
        match self {
            ClientEvent::Authenticated => "authenticated",
            ClientEvent::Error(_) => "error",
            ClientEvent::Warning(_) => "warning",
            ClientEvent::Data { kind, .. } => kind.as_str(),
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) struct EventBus {
    sender: broadcast::Sender<ClientEvent>,
}

impl EventBus {
    pub(crate) fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub(crate) fn subscribe(&self) -> broadcast::Receiver<ClientEvent> {
        self.sender.subscribe()
    }

    pub(crate) fn emit(&self, event: ClientEvent) {
        // No subscribers is fine; results still reach the caller directly.
        let _ = self.sender.send(event);
    }

    pub(crate) fn error(&self, error: Error) -> Error {
        self.emit(ClientEvent::Error(error.clone()));
        error
    }

    pub(crate) fn warning(&self, error: Error) -> Error {
        self.emit(ClientEvent::Warning(error.clone()));
        error
    }
}
