//! Configuration for the seat-reservation core.
//!
//! Loads configuration from environment variables with sensible defaults.

use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// Booking core configuration loaded from environment variables.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookingConfig {
    /// Inventory backend configuration
    pub api: ApiConfig,
    /// Availability cache configuration
    pub availability: AvailabilityConfig,
    /// Polling loop configuration
    pub polling: PollingConfig,
    /// Seat selection limits
    pub selection: SelectionConfig,
    /// Cleanup registry persistence
    pub registry: RegistryConfig,
}

/// Inventory backend configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Base URL of the booking backend
    pub base_url: String,
    /// Request timeout in seconds
    pub request_timeout: u64,
}

/// Availability cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AvailabilityConfig {
    /// Snapshot time-to-live in seconds for ordinary refreshes
    pub ttl: u64,
    /// Snapshot time-to-live in seconds for forced refreshes (after the
    /// shopper's own lock/release)
    pub forced_ttl: u64,
    /// Global suppression window in seconds after a 429
    pub backoff_window: u64,
}

impl AvailabilityConfig {
    /// Ordinary-refresh TTL as a `Duration`
    #[must_use]
    pub const fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl)
    }

    /// Forced-refresh TTL as a `Duration`
    #[must_use]
    pub const fn forced_ttl(&self) -> Duration {
        Duration::from_secs(self.forced_ttl)
    }

    /// Backoff window as a `Duration`
    #[must_use]
    pub const fn backoff_window(&self) -> Duration {
        Duration::from_secs(self.backoff_window)
    }
}

/// Polling loop configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollingConfig {
    /// Tick interval in seconds
    pub interval: u64,
    /// Maximum number of visible trips refreshed per tick, excluding the
    /// expanded one
    pub visible_cap: usize,
}

impl PollingConfig {
    /// Tick interval as a `Duration`
    #[must_use]
    pub const fn interval(&self) -> Duration {
        Duration::from_secs(self.interval)
    }
}

/// Seat selection limits
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectionConfig {
    /// Maximum seats one shopper may hold per trip
    pub max_seats: usize,
}

/// Cleanup registry persistence
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryConfig {
    /// Path of the persisted registry file; `None` keeps the registry
    /// in memory only
    pub file_path: Option<PathBuf>,
}

impl BookingConfig {
    /// Load configuration from environment variables.
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            api: ApiConfig {
                base_url: env::var("SEATHOLD_API_BASE_URL")
                    .unwrap_or_else(|_| "http://localhost:5000/api".to_string()),
                request_timeout: env::var("SEATHOLD_API_TIMEOUT")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(20),
            },
            availability: AvailabilityConfig {
                ttl: env::var("SEATHOLD_AVAILABILITY_TTL")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(8),
                forced_ttl: env::var("SEATHOLD_AVAILABILITY_FORCED_TTL")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(2),
                backoff_window: env::var("SEATHOLD_AVAILABILITY_BACKOFF")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(15),
            },
            polling: PollingConfig {
                interval: env::var("SEATHOLD_POLL_INTERVAL")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(6),
                visible_cap: env::var("SEATHOLD_POLL_VISIBLE_CAP")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(10),
            },
            selection: SelectionConfig {
                max_seats: env::var("SEATHOLD_MAX_SEATS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(4),
            },
            registry: RegistryConfig {
                file_path: env::var("SEATHOLD_REGISTRY_FILE").ok().map(PathBuf::from),
            },
        }
    }
}

impl Default for BookingConfig {
    fn default() -> Self {
        Self::from_env()
    }
}
