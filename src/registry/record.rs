//! Service record types
//!
//! This module defines the record stored for each live service instance and
//! the status values it moves through.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Availability of a registered service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Status {
    /// Service is connected and accepting traffic
    Up,
    /// Service is gone or disconnected
    Down,
    /// Service is connected but asked to be taken out of rotation
    OutOfService,
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Status::Up => write!(f, "UP"),
            Status::Down => write!(f, "DOWN"),
            Status::OutOfService => write!(f, "OUT_OF_SERVICE"),
        }
    }
}

/// How to reach a service (host + port + root path)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    /// Host name or address
    pub host: String,
    /// TCP port
    pub port: u16,
    /// Root path, always starts with `/`
    pub root: String,
}

impl Location {
    /// Create a new location
    pub fn new(host: impl Into<String>, port: u16, root: impl Into<String>) -> Self {
        let root = root.into();
        let root = if root.starts_with('/') {
            root
        } else {
            format!("/{}", root)
        };

        Self {
            host: host.into(),
            port,
            root,
        }
    }

    /// Full HTTP endpoint for display
    pub fn endpoint(&self) -> String {
        format!("http://{}:{}{}", self.host, self.port, self.root)
    }
}

impl std::fmt::Display for Location {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}{}", self.host, self.port, self.root)
    }
}

/// Stored description of one live service instance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceRecord {
    /// Id of the connection that currently owns this record
    pub registration_id: String,
    /// Logical service name
    pub name: String,
    /// Where the service can be reached
    #[serde(with = "location_json")]
    pub location: Location,
    /// Current status
    pub status: Status,
    /// Last registration or status change
    pub last_updated: DateTime<Utc>,
}

impl ServiceRecord {
    /// Create a new `UP` record for an HTTP endpoint rooted at `/{name}`
    pub fn http_endpoint(
        registration_id: impl Into<String>,
        name: impl Into<String>,
        host: impl Into<String>,
        port: u16,
    ) -> Self {
        let name = name.into();
        let location = Location::new(host, port, format!("/{}", name));

        Self {
            registration_id: registration_id.into(),
            name,
            location,
            status: Status::Up,
            last_updated: Utc::now(),
        }
    }

    /// Set the status and bump `last_updated`
    pub fn set_status(&mut self, status: Status) {
        self.status = status;
        self.touch();
    }

    /// Bump `last_updated` to now
    pub fn touch(&mut self) {
        self.last_updated = Utc::now();
    }

    /// Whether the record is currently `UP`
    pub fn is_up(&self) -> bool {
        self.status == Status::Up
    }
}

/// Location serialization adds the derived `endpoint` field for UIs
mod location_json {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    use super::Location;

    #[derive(Serialize, Deserialize)]
    struct Wire {
        host: String,
        port: u16,
        root: String,
        #[serde(default, skip_deserializing)]
        endpoint: String,
    }

    pub fn serialize<S: Serializer>(location: &Location, serializer: S) -> Result<S::Ok, S::Error> {
        Wire {
            host: location.host.clone(),
            port: location.port,
            root: location.root.clone(),
            endpoint: location.endpoint(),
        }
        .serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Location, D::Error> {
        let wire = Wire::deserialize(deserializer)?;
        Ok(Location::new(wire.host, wire.port, wire.root))
    }
}
