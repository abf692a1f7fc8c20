//! Device URIs of the form `scheme:path?key=value&key=value`
//!
//! Only `serial` is opened by the link, e.g. `serial:/dev/ttyACM0?baud=115200`.

use crate::error::{Error, Result};
use std::collections::BTreeMap;
use std::str::FromStr;

/// Baud rate used when the URI does not name one
pub const DEFAULT_BAUD: u32 = 115_200;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceUri {
    pub scheme: String,
    pub path: String,
    pub params: BTreeMap<String, String>,
}

impl DeviceUri {
    pub fn parse(src: &str) -> Result<Self> {
        let (scheme, rest) = src
            .split_once(':')
            .ok_or_else(|| Error::InvalidUri(format!("missing scheme in '{}'", src)))?;
        if scheme.is_empty() {
            return Err(Error::InvalidUri(format!("empty scheme in '{}'", src)));
        }

        let (path, query) = match rest.split_once('?') {
            Some((path, query)) => (path, query),
            None => (rest, ""),
        };
        if path.is_empty() {
            return Err(Error::InvalidUri(format!("empty path in '{}'", src)));
        }

        let mut params = BTreeMap::new();
        for pair in query.split('&').filter(|p| !p.is_empty()) {
            let (key, value) = pair
                .split_once('=')
                .ok_or_else(|| Error::InvalidUri(format!("parameter '{}' has no value", pair)))?;
            params.insert(key.to_string(), value.to_string());
        }

        Ok(Self {
            scheme: scheme.to_string(),
            path: path.to_string(),
            params,
        })
    }

    pub fn param(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }

    /// `baud` parameter, [`DEFAULT_BAUD`] when absent
    pub fn baud(&self) -> Result<u32> {
        match self.param("baud") {
            Some(raw) => raw
                .parse()
                .map_err(|_| Error::InvalidUri(format!("invalid baud rate '{}'", raw))),
            None => Ok(DEFAULT_BAUD),
        }
    }
}

impl FromStr for DeviceUri {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_serial_with_baud() {
        let uri = DeviceUri::parse("serial:/dev/ttyACM0?baud=57600").unwrap();
        assert_eq!(uri.scheme, "serial");
        assert_eq!(uri.path, "/dev/ttyACM0");
        assert_eq!(uri.baud().unwrap(), 57600);
    }

    #[test]
    fn test_default_baud() {
        let uri: DeviceUri = "serial:/dev/ttyUSB0".parse().unwrap();
        assert_eq!(uri.baud().unwrap(), DEFAULT_BAUD);
        assert!(uri.params.is_empty());
    }

    #[test]
    fn test_multiple_params() {
        let uri = DeviceUri::parse("serial:COM3?baud=9600&flow=none").unwrap();
        assert_eq!(uri.param("flow"), Some("none"));
        assert_eq!(uri.baud().unwrap(), 9600);
    }

    #[test]
    fn test_invalid_uris() {
        assert!(matches!(DeviceUri::parse("/dev/ttyUSB0"), Err(Error::InvalidUri(_))));
        assert!(matches!(DeviceUri::parse("serial:"), Err(Error::InvalidUri(_))));
        assert!(matches!(
            DeviceUri::parse("serial:/dev/tty?baud"),
            Err(Error::InvalidUri(_))
        ));

        let uri = DeviceUri::parse("serial:/dev/tty?baud=fast").unwrap();
        assert!(matches!(uri.baud(), Err(Error::InvalidUri(_))));
    }
}
