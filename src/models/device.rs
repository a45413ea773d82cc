//! Device profile model
//!
//! Coarse descriptor of the client derived from request metadata. Used for
//! conflict comparison only, never for security enforcement.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Coarse device class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum DeviceClass {
    /// Phone or tablet
    Mobile,
    /// Everything else (default)
    #[default]
    Desktop,
}

impl fmt::Display for DeviceClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceClass::Mobile => write!(f, "Mobile"),
            DeviceClass::Desktop => write!(f, "Desktop"),
        }
    }
}

impl FromStr for DeviceClass {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "mobile" => Ok(DeviceClass::Mobile),
            "desktop" => Ok(DeviceClass::Desktop),
            _ => Err(anyhow::anyhow!("Invalid device class: {}", s)),
        }
    }
}

/// Derived device profile.
///
/// Not persisted independently; embedded into the session row at creation
/// time and reconstructed from it for conflict comparison.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceProfile {
    /// Browser name or "Unknown"
    pub browser: String,
    /// Operating system name or "Unknown"
    pub os: String,
    /// Coarse device class
    pub device_class: DeviceClass,
    /// Mobile flag (mirrors the class plus UA mobile tokens)
    pub is_mobile: bool,
    /// When this profile was captured
    pub captured_at: DateTime<Utc>,
    /// Client IP, when a forwarding header provided one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ip_address: Option<String>,
}

impl DeviceProfile {
    /// A fully-degraded profile for requests with no usable metadata.
    pub fn unknown() -> Self {
        Self {
            browser: "Unknown".to_string(),
            os: "Unknown".to_string(),
            device_class: DeviceClass::Desktop,
            is_mobile: false,
            captured_at: Utc::now(),
            ip_address: None,
        }
    }

    /// Conflict-comparison equality: the (browser, os, device_class)
    /// triplet. Any field mismatch counts as a different device.
    pub fn same_device(&self, other: &DeviceProfile) -> bool {
        self.browser == other.browser
            && self.os == other.os
            && self.device_class == other.device_class
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile(browser: &str, os: &str, class: DeviceClass) -> DeviceProfile {
        DeviceProfile {
            browser: browser.to_string(),
            os: os.to_string(),
            device_class: class,
            is_mobile: class == DeviceClass::Mobile,
            captured_at: Utc::now(),
            ip_address: None,
        }
    }

    #[test]
    fn test_same_device_matches_triplet() {
        let a = profile("Chrome", "macOS", DeviceClass::Desktop);
        let b = profile("Chrome", "macOS", DeviceClass::Desktop);
        assert!(a.same_device(&b));
    }

    #[test]
    fn test_any_field_mismatch_is_different_device() {
        let base = profile("Chrome", "macOS", DeviceClass::Desktop);
        assert!(!base.same_device(&profile("Safari", "macOS", DeviceClass::Desktop)));
        assert!(!base.same_device(&profile("Chrome", "Windows", DeviceClass::Desktop)));
        assert!(!base.same_device(&profile("Chrome", "macOS", DeviceClass::Mobile)));
    }

    #[test]
    fn test_ip_does_not_affect_comparison() {
        let mut a = profile("Firefox", "Linux", DeviceClass::Desktop);
        let b = profile("Firefox", "Linux", DeviceClass::Desktop);
        a.ip_address = Some("203.0.113.9".to_string());
        assert!(a.same_device(&b));
    }

    #[test]
    fn test_unknown_profile_defaults() {
        let p = DeviceProfile::unknown();
        assert_eq!(p.browser, "Unknown");
        assert_eq!(p.os, "Unknown");
        assert_eq!(p.device_class, DeviceClass::Desktop);
        assert!(!p.is_mobile);
    }
}
