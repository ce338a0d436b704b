//! Device platform identifiers and their transport/driver mappings.

use serde::{Deserialize, Serialize};

/// Network device family, as stored on [`crate::domain::Device`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Ios,
    Nxos,
    Eos,
    DellOs10,
    PanOs,
    FortiOs,
}

impl Platform {
    /// Netmiko-style driver identifier used by the CLI Backup Worker.
    pub fn netmiko_platform(self) -> &'static str {
        match self {
            Platform::Ios => "cisco_ios",
            Platform::Nxos => "cisco_nxos",
            Platform::Eos => "arista_eos",
            Platform::DellOs10 => "dell_os10",
            Platform::PanOs => "paloaltonetworks_panos",
            Platform::FortiOs => "fortinet_fortios",
        }
    }

    /// True iff this platform is backed up over an HTTPS management API
    /// rather than SSH CLI.
    pub fn is_api_device(self) -> bool {
        matches!(self, Platform::PanOs | Platform::FortiOs)
    }

    /// The "show running config" command issued by the CLI Backup Worker.
    ///
    /// `dellos10` alone uses the long-form `show running-configuration`; the
    /// rest use `show running-config`.
    pub fn show_running_command(self) -> &'static str {
        match self {
            Platform::DellOs10 => "show running-configuration",
            _ => "show running-config",
        }
    }

    /// Short wire identifier, matching the data model's `{ios, nxos, eos,
    /// dellos10, panos, fortios}` enumeration.
    pub fn as_str(self) -> &'static str {
        match self {
            Platform::Ios => "ios",
            Platform::Nxos => "nxos",
            Platform::Eos => "eos",
            Platform::DellOs10 => "dellos10",
            Platform::PanOs => "panos",
            Platform::FortiOs => "fortios",
        }
    }
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Platform {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ios" => Ok(Platform::Ios),
            "nxos" => Ok(Platform::Nxos),
            "eos" => Ok(Platform::Eos),
            "dellos10" => Ok(Platform::DellOs10),
            "panos" => Ok(Platform::PanOs),
            "fortios" => Ok(Platform::FortiOs),
            other => Err(format!("unknown platform: {other}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_devices_are_panos_and_fortios() {
        assert!(Platform::PanOs.is_api_device());
        assert!(Platform::FortiOs.is_api_device());
        assert!(!Platform::Ios.is_api_device());
        assert!(!Platform::DellOs10.is_api_device());
    }

    #[test]
    fn netmiko_mapping_matches_inventory_snapshotter_contract() {
        assert_eq!(Platform::Ios.netmiko_platform(), "cisco_ios");
        assert_eq!(Platform::Nxos.netmiko_platform(), "cisco_nxos");
        assert_eq!(Platform::Eos.netmiko_platform(), "arista_eos");
        assert_eq!(Platform::DellOs10.netmiko_platform(), "dell_os10");
        assert_eq!(Platform::PanOs.netmiko_platform(), "paloaltonetworks_panos");
        assert_eq!(Platform::FortiOs.netmiko_platform(), "fortinet_fortios");
    }

    #[test]
    fn dellos10_uses_long_form_show_command() {
        assert_eq!(
            Platform::DellOs10.show_running_command(),
            "show running-configuration"
        );
        assert_eq!(Platform::Ios.show_running_command(), "show running-config");
        assert_eq!(Platform::Nxos.show_running_command(), "show running-config");
        assert_eq!(Platform::Eos.show_running_command(), "show running-config");
    }

    #[test]
    fn round_trips_through_str() {
        for p in [
            Platform::Ios,
            Platform::Nxos,
            Platform::Eos,
            Platform::DellOs10,
            Platform::PanOs,
            Platform::FortiOs,
        ] {
            let parsed: Platform = p.as_str().parse().unwrap();
            assert_eq!(parsed, p);
        }
    }
}
