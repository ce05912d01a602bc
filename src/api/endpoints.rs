//! Service catalogue and URL construction.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// A backend microservice of the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Service {
    Auth,
    Staff,
    Timetable,
    Applicants,
    Events,
    Library,
    Certificates,
}

impl Service {
    pub const ALL: [Service; 7] = [
        Service::Auth,
        Service::Staff,
        Service::Timetable,
        Service::Applicants,
        Service::Events,
        Service::Library,
        Service::Certificates,
    ];

    /// Services that expose a `statistics` endpoint, in dashboard order.
    pub const WITH_STATISTICS: [Service; 5] = [
        Service::Staff,
        Service::Applicants,
        Service::Events,
        Service::Certificates,
        Service::Library,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Service::Auth => "auth",
            Service::Staff => "staff",
            Service::Timetable => "timetable",
            Service::Applicants => "applicants",
            Service::Events => "events",
            Service::Library => "library",
            Service::Certificates => "certificates",
        }
    }

    /// Port the service listens on in the default deployment.
    pub fn default_port(&self) -> u16 {
        match self {
            Service::Auth => 8001,
            Service::Staff => 8002,
            Service::Timetable => 8003,
            Service::Applicants => 8004,
            Service::Events => 8005,
            Service::Library => 8006,
            Service::Certificates => 8007,
        }
    }

    /// Path of the statistics endpoint below the service's `/api` root.
    pub fn statistics_path(&self) -> Option<&'static str> {
        match self {
            Service::Staff => Some("/staff/statistics"),
            Service::Applicants => Some("/applicants/statistics"),
            Service::Events => Some("/events/statistics"),
            Service::Library | Service::Certificates => Some("/statistics"),
            Service::Auth | Service::Timetable => None,
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.name() == name)
    }
}

impl fmt::Display for Service {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Resolved root URLs (`.../api`) for every service.
#[derive(Debug, Clone)]
pub struct Endpoints {
    roots: BTreeMap<Service, String>,
}

impl Endpoints {
    /// Default deployment layout: `{base_url}:{port}/api`, with per-service
    /// overrides taking precedence.
    pub fn from_base(base_url: &str, overrides: &BTreeMap<String, String>) -> Self {
        let base = base_url.trim_end_matches('/');
        let roots = Service::ALL
            .into_iter()
            .map(|service| {
                let root = overrides
                    .get(service.name())
                    .map(|url| url.trim_end_matches('/').to_string())
                    .unwrap_or_else(|| format!("{}:{}/api", base, service.default_port()));
                (service, root)
            })
            .collect();
        Self { roots }
    }

    /// Every service behind one host, e.g. a gateway or a mock server.
    pub fn single_host(base_url: &str) -> Self {
        let base = base_url.trim_end_matches('/');
        let roots = Service::ALL
            .into_iter()
            .map(|service| (service, format!("{}/api", base)))
            .collect();
        Self { roots }
    }

    /// `.../api` root of a service.
    pub fn root(&self, service: Service) -> &str {
        self.roots.get(&service).map(String::as_str).unwrap_or("")
    }

    /// Full URL of `path` (starting with `/`) below the service root.
    pub fn url(&self, service: Service, path: &str) -> String {
        format!("{}{}", self.root(service), path)
    }

    /// Health endpoint, which lives beside the `/api` root.
    pub fn health_url(&self, service: Service) -> String {
        let root = self.root(service);
        let origin = root.strip_suffix("/api").unwrap_or(root);
        format!("{}/health", origin)
    }
}
