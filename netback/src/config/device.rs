//! Device descriptors (the router database).

use std::fmt;
use std::path::Path;
use std::time::Duration;

use secrecy::SecretString;
use serde::{Deserialize, Deserializer};

use crate::error::ConfigError;

/// Default SSH port.
pub const DEFAULT_PORT: u16 = 22;

/// Default per-device timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// One device to back up.
pub struct Device {
    /// Used as the output file name.
    pub name: String,

    /// Address to connect to.
    pub ip: String,

    /// Name of the model describing the device's shell.
    pub model: String,

    /// Output subdirectory.
    pub group: String,

    pub username: String,
    pub password: SecretString,

    pub port: Option<u16>,
    pub timeout: Option<Duration>,
}

impl Device {
    pub fn new(
        name: impl Into<String>,
        ip: impl Into<String>,
        model: impl Into<String>,
        group: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            ip: ip.into(),
            model: model.into(),
            group: group.into(),
            username: String::new(),
            password: SecretString::from(String::new()),
            port: None,
            timeout: None,
        }
    }

    pub fn with_credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.username = username.into();
        self.password = SecretString::from(password.into());
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// The port to use, defaulting to 22.
    pub fn effective_port(&self) -> u16 {
        self.port.unwrap_or(DEFAULT_PORT)
    }

    /// The timeout to use, falling back to `default`.
    pub fn effective_timeout(&self, default: Duration) -> Duration {
        self.timeout.unwrap_or(default)
    }
}

impl fmt::Debug for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Device")
            .field("name", &self.name)
            .field("ip", &self.ip)
            .field("model", &self.model)
            .field("group", &self.group)
            .field("username", &self.username)
            .field("port", &self.port)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

/// The full list of devices.
#[derive(Debug, Default)]
pub struct RouterDb {
    pub devices: Vec<Device>,
}

impl RouterDb {
    /// Load and validate a device file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let data = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml(&data)
    }

    /// Parse and validate device file contents.
    pub fn from_yaml(data: &str) -> Result<Self, ConfigError> {
        let file: RouterDbFile = serde_yaml::from_str(data).map_err(|source| ConfigError::Parse {
            what: "routerdb".to_string(),
            source,
        })?;

        let devices = file
            .devices
            .into_iter()
            .enumerate()
            .map(|(index, spec)| spec.validate(index))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { devices })
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }
}

#[derive(Deserialize)]
struct RouterDbFile {
    #[serde(default)]
    devices: Vec<DeviceSpec>,
}

#[derive(Deserialize)]
struct DeviceSpec {
    #[serde(default)]
    name: String,
    #[serde(default)]
    ip: String,
    #[serde(default)]
    model: String,
    #[serde(default)]
    group: String,
    #[serde(default)]
    username: String,
    #[serde(default)]
    password: String,
    port: Option<u16>,
    #[serde(default, deserialize_with = "deserialize_duration")]
    timeout: Option<Duration>,
}

impl DeviceSpec {
    fn validate(self, index: usize) -> Result<Device, ConfigError> {
        let required = [
            ("name", &self.name),
            ("ip", &self.ip),
            ("model", &self.model),
            ("group", &self.group),
            ("username", &self.username),
            ("password", &self.password),
        ];
        if let Some((field, _)) = required.into_iter().find(|(_, value)| value.is_empty()) {
            return Err(ConfigError::MissingField {
                index,
                name: self.name.clone(),
                field,
            });
        }

        Ok(Device {
            name: self.name,
            ip: self.ip,
            model: self.model,
            group: self.group,
            username: self.username,
            password: SecretString::from(self.password),
            port: self.port.filter(|p| *p != 0),
            timeout: self.timeout.filter(|t| !t.is_zero()),
        })
    }
}

/// Parse a duration such as `30s`, `1500ms`, `2m`, `1m30s`, `1h`, or a bare
/// number of seconds.
pub fn parse_duration(value: &str) -> Result<Duration, ConfigError> {
    let value = value.trim();
    let invalid = || ConfigError::InvalidDuration(value.to_string());
    if value.is_empty() {
        return Err(invalid());
    }
    if let Ok(seconds) = value.parse::<f64>() {
        return Duration::try_from_secs_f64(seconds).map_err(|_| invalid());
    }

    let mut total = Duration::ZERO;
    let mut rest = value;
    while !rest.is_empty() {
        let split = rest
            .find(|c: char| !c.is_ascii_digit() && c != '.')
            .ok_or_else(invalid)?;
        let (number, tail) = rest.split_at(split);
        let unit_len = tail.find(|c: char| c.is_ascii_digit()).unwrap_or(tail.len());
        let (unit, next) = tail.split_at(unit_len);

        let number: f64 = number.parse().map_err(|_| invalid())?;
        let seconds = match unit {
            "ms" => number / 1000.0,
            "s" => number,
            "m" => number * 60.0,
            "h" => number * 3600.0,
            _ => return Err(invalid()),
        };
        let part = Duration::try_from_secs_f64(seconds).map_err(|_| invalid())?;
        total = total.checked_add(part).ok_or_else(invalid)?;
        rest = next;
    }
    Ok(total)
}

fn deserialize_duration<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Seconds(u64),
        Text(String),
    }

    match Option::<Raw>::deserialize(deserializer)? {
        None => Ok(None),
        Some(Raw::Seconds(secs)) => Ok(Some(Duration::from_secs(secs))),
        Some(Raw::Text(text)) => parse_duration(&text)
            .map(Some)
            .map_err(serde::de::Error::custom),
    }
}

#[cfg(test)]
mod tests {
    use secrecy::ExposeSecret;

    use super::*;

    const ROUTERDB: &str = r#"
devices:
  - name: core-1
    ip: 10.0.0.1
    model: ios
    group: core
    username: backup
    password: s3cret
  - name: edge-1
    ip: 10.0.1.1
    model: junos
    group: edge
    username: backup
    password: s3cret
    port: 2222
    timeout: 45s
"#;

    #[test]
    fn test_load_routerdb() {
        let db = RouterDb::from_yaml(ROUTERDB).unwrap();
        assert_eq!(db.len(), 2);

        let core = &db.devices[0];
        assert_eq!(core.name, "core-1");
        assert_eq!(core.effective_port(), 22);
        assert_eq!(core.effective_timeout(DEFAULT_TIMEOUT), Duration::from_secs(30));
        assert_eq!(core.password.expose_secret(), "s3cret");

        let edge = &db.devices[1];
        assert_eq!(edge.effective_port(), 2222);
        assert_eq!(edge.effective_timeout(DEFAULT_TIMEOUT), Duration::from_secs(45));
    }

    #[test]
    fn test_missing_field_names_entry() {
        let yaml = "devices:\n  - name: a\n    ip: 1.1.1.1\n    model: ios\n    username: u\n    password: p\n";
        let err = RouterDb::from_yaml(yaml).unwrap_err();
        match err {
            ConfigError::MissingField { index, name, field } => {
                assert_eq!(index, 0);
                assert_eq!(name, "a");
                assert_eq!(field, "group");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_empty_routerdb() {
        let db = RouterDb::from_yaml("devices: []\n").unwrap();
        assert!(db.is_empty());
    }

    #[test]
    fn test_debug_hides_password() {
        let device = Device::new("a", "1.1.1.1", "ios", "core").with_credentials("u", "hunter2");
        assert!(!format!("{device:?}").contains("hunter2"));
    }

    #[test]
    fn test_parse_duration() {
        assert_eq!(parse_duration("30s").unwrap(), Duration::from_secs(30));
        assert_eq!(parse_duration("30").unwrap(), Duration::from_secs(30));
        assert_eq!(parse_duration("1500ms").unwrap(), Duration::from_millis(1500));
        assert_eq!(parse_duration("2m").unwrap(), Duration::from_secs(120));
        assert_eq!(parse_duration("1h").unwrap(), Duration::from_secs(3600));
        assert_eq!(parse_duration("0.5s").unwrap(), Duration::from_millis(500));
        assert!(parse_duration("soon").is_err());
        assert!(parse_duration("-5").is_err());
        assert!(parse_duration("inf").is_err());
        assert!(parse_duration("10d").is_err());
        assert!(parse_duration("").is_err());
    }

    #[test]
    fn test_parse_compound_duration() {
        assert_eq!(parse_duration("1m30s").unwrap(), Duration::from_secs(90));
        assert_eq!(parse_duration("1h30m").unwrap(), Duration::from_secs(5400));
        assert_eq!(parse_duration("2m500ms").unwrap(), Duration::from_millis(120_500));
        assert!(parse_duration("1m30").is_err());
        assert!(parse_duration("1m x").is_err());
    }

    #[test]
    fn test_compound_timeout_in_routerdb() {
        let yaml = "devices:\n  - {name: a, ip: x, model: m, group: g, username: u, password: p, timeout: 1m30s}\n";
        let db = RouterDb::from_yaml(yaml).unwrap();
        assert_eq!(db.devices[0].timeout, Some(Duration::from_secs(90)));
    }

    #[test]
    fn test_numeric_timeout_is_seconds() {
        let yaml = "devices:\n  - {name: a, ip: x, model: m, group: g, username: u, password: p, timeout: 5}\n";
        let db = RouterDb::from_yaml(yaml).unwrap();
        assert_eq!(db.devices[0].timeout, Some(Duration::from_secs(5)));
    }
}
