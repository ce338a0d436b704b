//! Platform-aware regex normalization of device configuration text (§4.A).
//!
//! `scrub` is a pure, stateless function: the same input and platform always
//! produce the same output, and scrubbing an already-scrubbed config is a
//! no-op (idempotence, invariant 1). Patterns are compiled once into
//! `Lazy<Regex>` statics and never touch IP addresses — unlike the system
//! this was modeled on, IPs are part of the reviewable diff here.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::domain::Platform;

struct Pattern {
    regex: &'static Lazy<Regex>,
    replacement: &'static str,
}

static IOS_UPTIME: Lazy<Regex> = Lazy::new(|| Regex::new(r"uptime is .+").unwrap());
static IOS_LAST_CONFIG: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"Last configuration change at .+").unwrap());
static IOS_NTP: Lazy<Regex> = Lazy::new(|| Regex::new(r"ntp clock-period \d+").unwrap());
static IOS_CURRENT_CONFIG: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"Current configuration : .+").unwrap());

static NXOS_UPTIME: Lazy<Regex> = Lazy::new(|| Regex::new(r"System uptime: .+").unwrap());
static NXOS_SERIAL: Lazy<Regex> = Lazy::new(|| Regex::new(r"serial-number: \S+").unwrap());
static NXOS_MODULE: Lazy<Regex> = Lazy::new(|| Regex::new(r"module-number: \d+").unwrap());

static EOS_UPTIME: Lazy<Regex> = Lazy::new(|| Regex::new(r"System uptime: .+").unwrap());
static EOS_HOSTNAME: Lazy<Regex> = Lazy::new(|| Regex::new(r"Management Hostname: .+").unwrap());

static DELLOS10_DATETIME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"Current date/time is .+").unwrap());
static DELLOS10_UPTIME: Lazy<Regex> = Lazy::new(|| Regex::new(r"System uptime is .+").unwrap());
static DELLOS10_LAST_CONFIG: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"Last configuration change on .+").unwrap());

static PANOS_SERIAL: Lazy<Regex> = Lazy::new(|| Regex::new(r"<serial>.*?</serial>").unwrap());
static PANOS_UPTIME: Lazy<Regex> = Lazy::new(|| Regex::new(r"<uptime>.*?</uptime>").unwrap());
static PANOS_TIME: Lazy<Regex> = Lazy::new(|| Regex::new(r"<time>.*?</time>").unwrap());
static PANOS_APP_VERSION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<app-version>.*?</app-version>").unwrap());
static PANOS_THREAT_VERSION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<threat-version>.*?</threat-version>").unwrap());
static PANOS_ANTIVIRUS_VERSION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<antivirus-version>.*?</antivirus-version>").unwrap());
static PANOS_WILDFIRE_VERSION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<wildfire-version>.*?</wildfire-version>").unwrap());

static FORTIOS_UUID: Lazy<Regex> = Lazy::new(|| Regex::new("uuid = \"[^\"]*\"").unwrap());
static FORTIOS_TIMESTAMP: Lazy<Regex> = Lazy::new(|| Regex::new(r"timestamp = \d+").unwrap());
static FORTIOS_LASTUPDATE: Lazy<Regex> = Lazy::new(|| Regex::new(r"lastupdate = \d+").unwrap());
static FORTIOS_BUILD: Lazy<Regex> = Lazy::new(|| Regex::new(r"build = \d+").unwrap());

/// `YYYY-MM-DD[T ]HH:MM:SS[.fff][Z|±HH:MM]`, applied after every
/// platform-specific pass.
static TIMESTAMP: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\d{4}-\d{2}-\d{2}[T ]\d{2}:\d{2}:\d{2}(\.\d+)?(Z|[+-]\d{2}:\d{2})?").unwrap()
});

fn ios_patterns() -> Vec<Pattern> {
    vec![
        Pattern {
            regex: &IOS_UPTIME,
            replacement: "uptime is <removed>",
        },
        Pattern {
            regex: &IOS_LAST_CONFIG,
            replacement: "Last configuration change at <removed>",
        },
        Pattern {
            regex: &IOS_NTP,
            replacement: "ntp clock-period <removed>",
        },
        Pattern {
            regex: &IOS_CURRENT_CONFIG,
            replacement: "Current configuration : <removed>",
        },
    ]
}

fn nxos_patterns() -> Vec<Pattern> {
    vec![
        Pattern {
            regex: &NXOS_UPTIME,
            replacement: "System uptime: <removed>",
        },
        Pattern {
            regex: &IOS_LAST_CONFIG,
            replacement: "Last configuration change at <removed>",
        },
        Pattern {
            regex: &NXOS_SERIAL,
            replacement: "serial-number: <removed>",
        },
        Pattern {
            regex: &NXOS_MODULE,
            replacement: "module-number: <removed>",
        },
    ]
}

fn eos_patterns() -> Vec<Pattern> {
    vec![
        Pattern {
            regex: &EOS_UPTIME,
            replacement: "System uptime: <removed>",
        },
        Pattern {
            regex: &IOS_LAST_CONFIG,
            replacement: "Last configuration change at <removed>",
        },
        Pattern {
            regex: &EOS_HOSTNAME,
            replacement: "Management Hostname: <removed>",
        },
    ]
}

fn dellos10_patterns() -> Vec<Pattern> {
    vec![
        Pattern {
            regex: &DELLOS10_DATETIME,
            replacement: "Current date/time is <removed>",
        },
        Pattern {
            regex: &DELLOS10_UPTIME,
            replacement: "System uptime is <removed>",
        },
        Pattern {
            regex: &DELLOS10_LAST_CONFIG,
            replacement: "Last configuration change on <removed>",
        },
    ]
}

fn panos_patterns() -> Vec<Pattern> {
    vec![
        Pattern {
            regex: &PANOS_SERIAL,
            replacement: "<serial><removed></serial>",
        },
        Pattern {
            regex: &PANOS_UPTIME,
            replacement: "<uptime><removed></uptime>",
        },
        Pattern {
            regex: &PANOS_TIME,
            replacement: "<time><removed></time>",
        },
        Pattern {
            regex: &PANOS_APP_VERSION,
            replacement: "<app-version><removed></app-version>",
        },
        Pattern {
            regex: &PANOS_THREAT_VERSION,
            replacement: "<threat-version><removed></threat-version>",
        },
        Pattern {
            regex: &PANOS_ANTIVIRUS_VERSION,
            replacement: "<antivirus-version><removed></antivirus-version>",
        },
        Pattern {
            regex: &PANOS_WILDFIRE_VERSION,
            replacement: "<wildfire-version><removed></wildfire-version>",
        },
    ]
}

fn fortios_patterns() -> Vec<Pattern> {
    vec![
        Pattern {
            regex: &FORTIOS_UUID,
            replacement: "uuid = \"<removed>\"",
        },
        Pattern {
            regex: &FORTIOS_TIMESTAMP,
            replacement: "timestamp = <removed>",
        },
        Pattern {
            regex: &FORTIOS_LASTUPDATE,
            replacement: "lastupdate = <removed>",
        },
        Pattern {
            regex: &FORTIOS_BUILD,
            replacement: "build = <removed>",
        },
    ]
}

/// Replace every `crypto pki certificate` block with a single token,
/// extending from the match to the next non-indented line (or end of
/// text). Written as an explicit line scan rather than a lookahead regex —
/// the `regex` crate has no lookahead, and the original's eager `.*?`
/// paired with a greedy sibling pattern on the same line would otherwise
/// devour the remainder of the config.
fn strip_crypto_cert_blocks(mut text: String) -> String {
    const NEEDLE: &str = "crypto pki certificate";
    const TOKEN: &str = "<crypto-cert-removed>";

    let mut search_from = 0;
    while let Some(rel_start) = text[search_from..].find(NEEDLE) {
        let start = search_from + rel_start;
        let mut end = text.len();
        for line_start in line_starts_after(&text, start) {
            if text[line_start..].starts_with(|c: char| !c.is_whitespace()) {
                end = line_start;
                break;
            }
        }
        text.replace_range(start..end, TOKEN);
        search_from = start + TOKEN.len();
    }
    text
}

/// Byte offsets of the start of every line strictly after `from`.
fn line_starts_after(text: &str, from: usize) -> impl Iterator<Item = usize> + '_ {
    text[from..]
        .match_indices('\n')
        .map(move |(i, _)| from + i + 1)
}

fn platform_patterns(platform: Platform) -> Vec<Pattern> {
    match platform {
        Platform::Ios => ios_patterns(),
        Platform::Nxos => nxos_patterns(),
        Platform::Eos => eos_patterns(),
        Platform::DellOs10 => dellos10_patterns(),
        Platform::PanOs => panos_patterns(),
        Platform::FortiOs => fortios_patterns(),
    }
}

/// Scrub volatile fields from `raw` for the given `platform`, then trim.
///
/// `scrub("", p) == ""`; applying `scrub` to its own output is a no-op.
pub fn scrub(raw: &str, platform: Platform) -> String {
    let mut text = raw.to_string();

    if matches!(platform, Platform::Ios | Platform::Nxos) {
        text = strip_crypto_cert_blocks(text);
    }

    for pattern in platform_patterns(platform) {
        text = pattern.regex.replace_all(&text, pattern.replacement).into_owned();
    }

    text = TIMESTAMP.replace_all(&text, "<timestamp>").into_owned();

    text.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_input_scrubs_to_empty() {
        assert_eq!(scrub("", Platform::Ios), "");
    }

    #[test]
    fn s1_scrubber_ios() {
        let input = "hostname r1\nuptime is 5 days, 1 hour\nntp clock-period 36621\n";
        let out = scrub(input, Platform::Ios);
        assert!(out.contains("hostname r1"));
        assert!(out.contains("<removed>"));
        assert!(!out.contains("5 days"));
        assert!(!out.contains("36621"));
    }

    #[test]
    fn s2_scrubber_panos() {
        let input = "<serial>PA-123</serial><uptime>9d</uptime>";
        let out = scrub(input, Platform::PanOs);
        assert_eq!(out, "<serial><removed></serial><uptime><removed></uptime>");
    }

    #[test]
    fn idempotence_holds_for_every_platform() {
        let samples = [
            (Platform::Ios, "hostname r1\nuptime is 5 days\ninterface Gi0/1\n"),
            (Platform::Nxos, "System uptime: 10 days\nserial-number: ABC123\n"),
            (Platform::Eos, "System uptime: 3 days\nManagement Hostname: sw1\n"),
            (
                Platform::DellOs10,
                "Current date/time is Mon Jan 1\nSystem uptime is 2 days\n",
            ),
            (
                Platform::PanOs,
                "<serial>PA-1</serial><app-version>9.1.0</app-version>",
            ),
            (
                Platform::FortiOs,
                "uuid = \"abc-123\"\ntimestamp = 1700000000\nbuild = 1234\n",
            ),
        ];
        for (platform, input) in samples {
            let once = scrub(input, platform);
            let twice = scrub(&once, platform);
            assert_eq!(once, twice, "not idempotent for {platform:?}");
        }
    }

    #[test]
    fn non_volatile_lines_and_ips_are_preserved() {
        let input = "interface GigabitEthernet0/1\n ip address 10.0.0.1 255.255.255.0\n!\nhostname r1\n";
        let out = scrub(input, Platform::Ios);
        assert!(out.contains("ip address 10.0.0.1 255.255.255.0"));
        assert!(out.contains("hostname r1"));
    }

    #[test]
    fn common_timestamp_pass_applies_to_unknown_platforms() {
        // Unrecognised platform identifiers never reach `scrub` (Platform is
        // a closed enum), but the common pass must still run standalone —
        // exercised here directly against a platform with no matching
        // platform-specific pattern for this text.
        let input = "created 2024-03-01T12:00:00Z by operator\n";
        let out = scrub(input, Platform::Eos);
        assert_eq!(out, "created <timestamp> by operator");
    }

    #[test]
    fn crypto_cert_block_is_collapsed_until_next_unindented_line() {
        let input = "hostname r1\ncrypto pki certificate CA\n certificate\n  30 82 01\ninterface Gi0/1\n";
        let out = scrub(input, Platform::Ios);
        assert!(out.contains("<crypto-cert-removed>"));
        assert!(out.contains("interface Gi0/1"));
        assert!(!out.contains("30 82 01"));
    }

    #[test]
    fn ip_addresses_are_never_scrubbed() {
        let input = "neighbor 192.0.2.1 remote-as 65000\n";
        let out = scrub(input, Platform::Ios);
        assert_eq!(out, input.trim());
    }
}
