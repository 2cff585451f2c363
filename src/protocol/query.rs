//! Connect parameters
//!
//! A connection picks its role through the upgrade request's query string:
//! `isUI=true` asks for an observer slot (credential in `token`, `key` or the
//! `Token` cookie), anything else is a registrant that must supply `name`,
//! `host` and `port`.

use std::collections::HashMap;

use super::error::ValidationError;

/// Cookie carrying the observer credential
pub const TOKEN_COOKIE: &str = "Token";

/// Raw parameters captured from the upgrade request
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectParams {
    /// Decoded query parameters
    pub query: HashMap<String, String>,
    /// Parsed `Cookie` header
    pub cookies: HashMap<String, String>,
}

/// Validated registration parameters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistrantParams {
    pub name: String,
    pub host: String,
    pub port: u16,
}

/// What a connection asks to be
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectIntent {
    /// Observer with its (possibly missing) credential
    Observer { token: Option<String> },
    /// Registrant with validated parameters
    Registrant(RegistrantParams),
}

impl ConnectParams {
    /// Build from the raw query string and `Cookie` header
    pub fn from_request(query: Option<&str>, cookie: Option<&str>) -> Self {
        Self {
            query: query.map(parse_query).unwrap_or_default(),
            cookies: cookie.map(parse_cookie).unwrap_or_default(),
        }
    }

    /// Non-blank query parameter
    pub fn get(&self, key: &str) -> Option<&str> {
        self.query
            .get(key)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }

    /// Whether the connection asked for the observer role
    pub fn is_observer(&self) -> bool {
        self.get("isUI")
            .map(|v| v.eq_ignore_ascii_case("true"))
            .unwrap_or(false)
    }

    /// Observer credential: `token`, then `key`, then the `Token` cookie
    pub fn token(&self) -> Option<&str> {
        self.get("token").or_else(|| self.get("key")).or_else(|| {
            self.cookies
                .get(TOKEN_COOKIE)
                .map(|v| v.trim())
                .filter(|v| !v.is_empty())
        })
    }

    /// Classify the connection
    pub fn intent(&self) -> Result<ConnectIntent, ValidationError> {
        if self.is_observer() {
            return Ok(ConnectIntent::Observer {
                token: self.token().map(str::to_string),
            });
        }

        let name = self.get("name").ok_or(ValidationError::MissingParameter("name"))?;
        let host = self.get("host").ok_or(ValidationError::MissingParameter("host"))?;
        let port = self.get("port").ok_or(ValidationError::MissingParameter("port"))?;

        let port = match port.parse::<u16>() {
            Ok(p) if p > 0 => p,
            _ => return Err(ValidationError::InvalidPort(port.to_string())),
        };

        Ok(ConnectIntent::Registrant(RegistrantParams {
            name: name.to_string(),
            host: host.to_string(),
            port,
        }))
    }
}

/// Decode an `application/x-www-form-urlencoded` query string
///
/// Pairs with an empty key are dropped; later duplicates win.
pub fn parse_query(query: &str) -> HashMap<String, String> {
    url::form_urlencoded::parse(query.trim_start_matches('?').as_bytes())
        .filter(|(k, _)| !k.trim().is_empty())
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect()
}

/// Parse a `Cookie` header into name/value pairs
pub fn parse_cookie(header: &str) -> HashMap<String, String> {
    header
        .split(';')
        .filter_map(|pair| {
            let (name, value) = pair.trim().split_once('=')?;
            let name = name.trim();
            if name.is_empty() {
                return None;
            }
            Some((name.to_string(), value.trim().to_string()))
        })
        .collect()
}
