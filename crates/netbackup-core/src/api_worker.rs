//! Async HTTPS API backup worker for firewall platforms (§4.F).
//!
//! TLS verification is disabled throughout — these devices are reached over
//! air-gapped management networks with self-signed certificates.

use std::time::Duration;

use quick_xml::events::Event as XmlEvent;
use quick_xml::reader::Reader;
use sha2::{Digest, Sha256};
use tracing::instrument;

use crate::domain::{NetBackupError, Platform, RawBackup};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// One device's API backup input.
pub struct ApiBackupRequest {
    pub device_id: String,
    pub hostname: String,
    pub ip: String,
    pub platform: Platform,
    pub username: String,
    pub password: String,
}

fn client() -> Result<reqwest::Client, NetBackupError> {
    reqwest::Client::builder()
        .danger_accept_invalid_certs(true)
        .timeout(REQUEST_TIMEOUT)
        .build()
        .map_err(|e| NetBackupError::Transport(format!("failed to build HTTP client: {e}")))
}

/// Dispatch to the platform-specific flow, returning the same record shape
/// as the CLI worker.
#[instrument(skip(request), fields(hostname = %request.hostname, platform = %request.platform))]
pub async fn run_api_backup(request: &ApiBackupRequest) -> Result<RawBackup, NetBackupError> {
    let config_text = match request.platform {
        Platform::PanOs => backup_panos(request).await?,
        Platform::FortiOs => backup_fortios(request).await?,
        other => {
            return Err(NetBackupError::Protocol(format!(
                "{other} is not an API-backed platform"
            )))
        }
    };

    let raw_sha256 = hex::encode(Sha256::digest(config_text.as_bytes()));
    Ok(RawBackup {
        hostname: request.hostname.clone(),
        device_id: request.device_id.clone(),
        platform: request.platform,
        config_text,
        raw_sha256,
    })
}

async fn backup_panos(request: &ApiBackupRequest) -> Result<String, NetBackupError> {
    let http = client()?;
    let base = format!("https://{}", request.ip);

    let keygen_url = format!(
        "{base}/api/?type=keygen&user={}&passwd={}",
        urlencode(&request.username),
        urlencode(&request.password)
    );
    let response = http
        .get(&keygen_url)
        .send()
        .await
        .map_err(|e| NetBackupError::Transport(e.to_string()))?;
    let body = response
        .text()
        .await
        .map_err(|e| NetBackupError::Transport(e.to_string()))?;
    let key = extract_xml_key(&body)?;

    let export_url = format!(
        "{base}/api/?type=export&category=configuration&key={}",
        urlencode(&key)
    );
    let response = http
        .get(&export_url)
        .send()
        .await
        .map_err(|e| NetBackupError::Transport(e.to_string()))?;
    response
        .text()
        .await
        .map_err(|e| NetBackupError::Transport(e.to_string()))
}

/// Pull-parse the PAN-OS keygen response for `.//key`; fails if absent or
/// empty, matching the spec's XML contract.
fn extract_xml_key(body: &str) -> Result<String, NetBackupError> {
    let mut reader = Reader::from_str(body);
    reader.config_mut().trim_text_start = true;
    reader.config_mut().trim_text_end = true;

    let mut in_key = false;
    let mut buf = Vec::new();
    loop {
        match reader
            .read_event_into(&mut buf)
            .map_err(|e| NetBackupError::Protocol(format!("malformed keygen XML: {e}")))?
        {
            XmlEvent::Start(tag) if tag.name().as_ref() == b"key" => in_key = true,
            XmlEvent::Text(text) if in_key => {
                let key = text
                    .unescape()
                    .map_err(|e| NetBackupError::Protocol(e.to_string()))?
                    .into_owned();
                if key.is_empty() {
                    return Err(NetBackupError::Protocol(
                        "PAN-OS keygen response has an empty key".to_string(),
                    ));
                }
                return Ok(key);
            }
            XmlEvent::End(tag) if tag.name().as_ref() == b"key" => in_key = false,
            XmlEvent::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Err(NetBackupError::Protocol(
        "PAN-OS keygen response missing <key>".to_string(),
    ))
}

async fn backup_fortios(request: &ApiBackupRequest) -> Result<String, NetBackupError> {
    let http = client()?;
    let base = format!("https://{}", request.ip);

    let login = http
        .post(format!("{base}/logincheck"))
        .form(&[
            ("username", request.username.as_str()),
            ("secretkey", request.password.as_str()),
        ])
        .send()
        .await
        .map_err(|e| NetBackupError::Transport(e.to_string()))?;

    let csrf_token = extract_csrf_token(&login);

    let mut backup_request = http.get(format!(
        "{base}/api/v2/monitor/system/config/backup?scope=global"
    ));
    backup_request = match &csrf_token {
        Some(token) => backup_request.header("X-CSRFTOKEN", token),
        // No `ccsrftoken` cookie was set: per the source system's dead-code
        // fallback, this is an explicit no-CSRF-header path, not a retry.
        None => backup_request,
    };

    let response = backup_request
        .send()
        .await
        .map_err(|e| NetBackupError::Transport(e.to_string()))?;
    let config_text = response
        .text()
        .await
        .map_err(|e| NetBackupError::Transport(e.to_string()))?;

    let _ = http.post(format!("{base}/logout")).send().await;

    Ok(config_text)
}

/// Extract and unquote the `ccsrftoken` cookie from a `Set-Cookie` header.
/// reqwest's built-in cookie jar normalizes values away from the raw quoted
/// form this flow needs, so the header is read directly.
fn extract_csrf_token(response: &reqwest::Response) -> Option<String> {
    response
        .headers()
        .get_all(reqwest::header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .find_map(|cookie| {
            let (name, value) = cookie.split_once('=')?;
            if name.trim() != "ccsrftoken" {
                return None;
            }
            let value = value.split(';').next().unwrap_or(value);
            Some(value.trim_matches('"').to_string())
        })
}

fn urlencode(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for byte in raw.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(byte as char)
            }
            _ => out.push_str(&format!("%{byte:02X}")),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_key_from_panos_keygen_response() {
        let body = "<response status=\"success\"><result><key>LUFRPT1234</key></result></response>";
        assert_eq!(extract_xml_key(body).unwrap(), "LUFRPT1234");
    }

    #[test]
    fn rejects_missing_key_element() {
        let body = "<response status=\"success\"><result></result></response>";
        assert!(extract_xml_key(body).is_err());
    }

    #[test]
    fn rejects_empty_key_element() {
        let body = "<response status=\"success\"><result><key></key></result></response>";
        assert!(extract_xml_key(body).is_err());
    }

    #[test]
    fn urlencode_escapes_reserved_characters() {
        assert_eq!(urlencode("a b&c"), "a%20b%26c");
        assert_eq!(urlencode("simple123"), "simple123");
    }
}
