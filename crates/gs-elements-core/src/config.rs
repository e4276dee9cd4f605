//! Engine configuration.
//!
//! Configuration is plain data with serde support so it can be loaded from
//! TOML:
//!
//! ```toml
//! base_url = "https://example.com/app/"
//! id_prefix = "w-"
//!
//! [environment]
//! device = "mobile"
//! os = "android"
//! browser = "chrome"
//! protocol = "https"
//! orientation = "portrait"
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::identity::DEFAULT_ID_PREFIX;

/// Default tag for proxy wrapper elements.
pub const DEFAULT_PROXY_TAG: &str = "gs-proxy";

/// Default bound on ticks per `settle` call.
pub const DEFAULT_MAX_SETTLE_ITERATIONS: usize = 64;

/// Device class of the rendering environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Device {
    #[default]
    Desktop,
    Mobile,
    Tablet,
}

impl Device {
    /// Lowercase name as used in `environment` attributes.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Desktop => "desktop",
            Self::Mobile => "mobile",
            Self::Tablet => "tablet",
        }
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Screen orientation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Orientation {
    #[default]
    Landscape,
    Portrait,
}

impl Orientation {
    /// Parse `portrait` / `landscape` (case-insensitive).
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "portrait" => Some(Self::Portrait),
            "landscape" => Some(Self::Landscape),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Landscape => "landscape",
            Self::Portrait => "portrait",
        }
    }
}

impl fmt::Display for Orientation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The simulated host a component is rendered in.
///
/// `os`, `browser` and `protocol` are lowercase names (`"windows"`,
/// `"firefox"`, `"https"`); the protocol carries no trailing `:`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Environment {
    pub device: Device,
    pub os: String,
    pub browser: String,
    pub protocol: String,
    pub orientation: Orientation,
}

impl Default for Environment {
    fn default() -> Self {
        Self {
            device: Device::Desktop,
            os: "linux".to_string(),
            browser: "chrome".to_string(),
            protocol: "https".to_string(),
            orientation: Orientation::Landscape,
        }
    }
}

impl Environment {
    /// Derive device, OS and browser from a user-agent string.
    ///
    /// Protocol and orientation keep their defaults.
    pub fn from_user_agent(user_agent: &str) -> Self {
        let ua = user_agent;
        let device = if ua.contains("iPad")
            || ua.contains("Tablet")
            || (ua.contains("Android") && !ua.contains("Mobile"))
        {
            Device::Tablet
        } else if ua.contains("Mobi") || ua.contains("iPhone") || ua.contains("Android") {
            Device::Mobile
        } else {
            Device::Desktop
        };

        let os = if ua.contains("Windows") {
            "windows"
        } else if ua.contains("Android") {
            "android"
        } else if ua.contains("iPhone") || ua.contains("iPad") || ua.contains("iPod") {
            "ios"
        } else if ua.contains("Mac OS X") || ua.contains("Macintosh") {
            "macos"
        } else if ua.contains("CrOS") {
            "chromeos"
        } else if ua.contains("Linux") {
            "linux"
        } else {
            "unknown"
        };

        let browser = if ua.contains("Edg/") {
            "edge"
        } else if ua.contains("OPR/") || ua.contains("Opera") {
            "opera"
        } else if ua.contains("Firefox/") || ua.contains("FxiOS") {
            "firefox"
        } else if ua.contains("Chrome/") || ua.contains("CriOS") {
            "chrome"
        } else if ua.contains("Safari/") {
            "safari"
        } else {
            "unknown"
        };

        Self {
            device,
            os: os.to_string(),
            browser: browser.to_string(),
            ..Self::default()
        }
    }

    /// Builder-style device override.
    pub fn with_device(mut self, device: Device) -> Self {
        self.device = device;
        self
    }

    /// Builder-style protocol override. A trailing `:` is dropped.
    pub fn with_protocol(mut self, protocol: &str) -> Self {
        self.protocol = protocol.trim_end_matches(':').to_ascii_lowercase();
        self
    }

    /// Builder-style orientation override.
    pub fn with_orientation(mut self, orientation: Orientation) -> Self {
        self.orientation = orientation;
        self
    }
}

/// Lifecycle engine configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// The host the engine pretends to run in.
    pub environment: Environment,
    /// Base URL for relative template URLs.
    pub base_url: Option<String>,
    /// Prefix for auto-assigned element ids.
    pub id_prefix: String,
    /// Tag of proxy wrapper elements.
    pub proxy_tag: String,
    /// Maximum ticks a single `settle` may run.
    pub max_settle_iterations: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            environment: Environment::default(),
            base_url: None,
            id_prefix: DEFAULT_ID_PREFIX.to_string(),
            proxy_tag: DEFAULT_PROXY_TAG.to_string(),
            max_settle_iterations: DEFAULT_MAX_SETTLE_ITERATIONS,
        }
    }
}

impl EngineConfig {
    /// Parse configuration from TOML. Missing keys take their defaults.
    pub fn from_toml_str(source: &str) -> Result<Self> {
        Ok(toml::from_str(source)?)
    }

    /// Builder-style environment override.
    pub fn with_environment(mut self, environment: Environment) -> Self {
        self.environment = environment;
        self
    }

    /// Builder-style base URL override.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }
}
