//! # Client Configuration
//!
//! Purpose: Turn a connection URL plus timeouts into a validated endpoint
//! description before any socket is opened.
//!
//! ## Design Principles
//! 1. **Eager Validation**: Bad URLs fail at construction, not first use.
//! 2. **Plain Options**: `ClientOptions` deserializes from config files and
//!    converts into the runtime `ClientConfig`.

use std::borrow::Cow;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use sider_common::{Backend, Utf8Policy};
use url::Url;

use crate::error::ConfigError;

pub const DEFAULT_URL: &str = "redis://localhost:6379/0";
pub const DEFAULT_PORT: u16 = 6379;
pub const DEFAULT_POOL_SIZE: usize = 4;
/// Pub/sub queue capacity when none is configured; `0` is unbounded.
pub const DEFAULT_PUBSUB_CAPACITY: usize = 0;

/// Where the server lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    Tcp { host: String, port: u16, tls: bool },
    Unix { path: PathBuf },
}

/// Parsed connection URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionInfo {
    pub endpoint: Endpoint,
    pub username: Option<String>,
    pub password: Option<String>,
    pub db: u32,
}

impl ConnectionInfo {
    /// Parses `redis://`, `rediss://` and unix socket URLs.
    ///
    /// ```text
    /// redis://[user:password@]host[:port][/db][?db=N]
    /// rediss://...                        TLS over TCP
    /// redis+unix://[:password@]/path/to/socket[?db=N&password=...]
    /// ```
    pub fn parse(url: &str) -> Result<Self, ConfigError> {
        let (scheme, _) = url.split_once("://").ok_or(ConfigError::SchemeRequired)?;
        if scheme.is_empty() {
            return Err(ConfigError::SchemeRequired);
        }
        match scheme.to_ascii_lowercase().as_str() {
            "redis" => parse_tcp(url, false),
            "rediss" => parse_tcp(url, true),
            "redis+unix" | "redis-socket" | "unix" => parse_unix(url),
            other => Err(ConfigError::UnsupportedScheme(other.to_owned())),
        }
    }

    pub fn is_tls(&self) -> bool {
        matches!(self.endpoint, Endpoint::Tcp { tls: true, .. })
    }
}

/// `host:port/db` for TCP, the socket file name for unix sockets.
impl fmt::Display for ConnectionInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.endpoint {
            Endpoint::Tcp { host, port, .. } => write!(f, "{}:{}/{}", host, port, self.db),
            Endpoint::Unix { path } => {
                let name = path
                    .file_name()
                    .map(|name| name.to_string_lossy())
                    .unwrap_or_else(|| path.to_string_lossy());
                f.write_str(&name)
            }
        }
    }
}

fn parse_tcp(raw: &str, tls: bool) -> Result<ConnectionInfo, ConfigError> {
    let url = Url::parse(raw).map_err(|err| match err {
        url::ParseError::EmptyHost => ConfigError::HostnameRequired,
        other => ConfigError::InvalidUrl(other.to_string()),
    })?;
    let host = match url.host_str() {
        Some(host) if !host.is_empty() => host.trim_start_matches('[').trim_end_matches(']'),
        _ => return Err(ConfigError::HostnameRequired),
    };

    let mut db = 0;
    let path = url.path().trim_start_matches('/');
    if !path.is_empty() {
        db = parse_db(path)?;
    }
    let (username, password, db) = credentials_and_db(&url, db)?;

    Ok(ConnectionInfo {
        endpoint: Endpoint::Tcp {
            host: host.to_owned(),
            port: url.port().unwrap_or(DEFAULT_PORT),
            tls,
        },
        username,
        password,
        db,
    })
}

fn parse_unix(raw: &str) -> Result<ConnectionInfo, ConfigError> {
    let url = Url::parse(&with_socket_host(raw))
        .map_err(|err| ConfigError::InvalidUrl(err.to_string()))?;
    let path = decode(url.path())?;
    if path.is_empty() {
        return Err(ConfigError::SocketPathRequired);
    }
    let (username, password, db) = credentials_and_db(&url, 0)?;

    Ok(ConnectionInfo {
        endpoint: Endpoint::Unix {
            path: PathBuf::from(path),
        },
        username,
        password,
        db,
    })
}

/// Socket URLs may carry userinfo with no host (`unix://:pw@/path`), which
/// `url` rejects; a placeholder host is spliced in after the `@`.
fn with_socket_host(raw: &str) -> Cow<'_, str> {
    let Some((scheme, rest)) = raw.split_once("://") else {
        return Cow::Borrowed(raw);
    };
    let end = rest.find(['/', '?', '#']).unwrap_or(rest.len());
    let (authority, tail) = rest.split_at(end);
    if authority.ends_with('@') {
        Cow::Owned(format!("{scheme}://{authority}localhost{tail}"))
    } else {
        Cow::Borrowed(raw)
    }
}

/// Userinfo plus the `db` / `password` query parameters. The query `db`
/// overrides `db`; the query password applies only without a userinfo one.
fn credentials_and_db(
    url: &Url,
    mut db: u32,
) -> Result<(Option<String>, Option<String>, u32), ConfigError> {
    let username = non_empty(decode(url.username())?);
    let mut password = non_empty(decode(url.password().unwrap_or(""))?);
    for (key, value) in url.query_pairs() {
        match key.as_ref() {
            "db" => db = parse_db(&value)?,
            "password" if password.is_none() => password = non_empty(value.into_owned()),
            _ => {}
        }
    }
    Ok((username, password, db))
}

fn parse_db(value: &str) -> Result<u32, ConfigError> {
    if value.is_empty() || !value.bytes().all(|b| b.is_ascii_digit()) {
        return Err(ConfigError::InvalidDb(value.to_owned()));
    }
    value
        .parse()
        .map_err(|_| ConfigError::InvalidDb(value.to_owned()))
}

fn non_empty(value: String) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value)
    }
}

fn decode(value: &str) -> Result<String, ConfigError> {
    urlencoding::decode(value)
        .map(Cow::into_owned)
        .map_err(|_| ConfigError::InvalidUrl(format!("{value:?} is not valid UTF-8 once decoded")))
}

/// Runtime configuration of one connection manager.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub url: String,
    /// `None` waits forever.
    pub connect_timeout: Option<Duration>,
    pub read_timeout: Option<Duration>,
    pub write_timeout: Option<Duration>,
    /// Custom TLS settings for `rediss://`; webpki roots are used otherwise.
    pub tls: Option<Arc<rustls::ClientConfig>>,
    /// Decode string replies as text under this policy.
    pub decoding: Option<Utf8Policy>,
    /// Bound of the pub/sub message queue; unbounded when `None` or `0`.
    pub pubsub_capacity: Option<usize>,
    pub backend: Backend,
}

impl Default for ClientConfig {
    fn default() -> Self {
        ClientConfig {
            url: DEFAULT_URL.to_string(),
            connect_timeout: None,
            read_timeout: None,
            write_timeout: None,
            tls: None,
            decoding: None,
            pubsub_capacity: None,
            backend: Backend::preferred(),
        }
    }
}

impl ClientConfig {
    pub fn new(url: impl Into<String>) -> Self {
        ClientConfig {
            url: url.into(),
            ..ClientConfig::default()
        }
    }

    /// Sets connect, read and write timeouts at once.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self.read_timeout = Some(timeout);
        self.write_timeout = Some(timeout);
        self
    }

    pub fn with_decoding(mut self, policy: Utf8Policy) -> Self {
        self.decoding = Some(policy);
        self
    }

    pub fn with_tls(mut self, tls: Arc<rustls::ClientConfig>) -> Self {
        self.tls = Some(tls);
        self
    }

    /// Bounds the pub/sub queue; a full queue pauses the listener.
    pub fn with_pubsub_capacity(mut self, capacity: usize) -> Self {
        self.pubsub_capacity = Some(capacity);
        self
    }

    pub fn with_backend(mut self, backend: Backend) -> Self {
        self.backend = backend;
        self
    }

    pub fn connection_info(&self) -> Result<ConnectionInfo, ConfigError> {
        ConnectionInfo::parse(&self.url)
    }
}

/// File-friendly client options.
///
/// ```json
/// { "url": "redis://cache:6379/2", "read_timeout_ms": 500, "pool_size": 8 }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ClientOptions {
    pub url: String,
    pub connect_timeout_ms: Option<u64>,
    pub read_timeout_ms: Option<u64>,
    pub write_timeout_ms: Option<u64>,
    pub pool_size: usize,
    pub decoding: Option<Utf8Policy>,
    pub pubsub_capacity: Option<usize>,
}

impl Default for ClientOptions {
    fn default() -> Self {
        ClientOptions {
            url: DEFAULT_URL.to_string(),
            connect_timeout_ms: None,
            read_timeout_ms: None,
            write_timeout_ms: None,
            pool_size: DEFAULT_POOL_SIZE,
            decoding: None,
            pubsub_capacity: None,
        }
    }
}

impl ClientOptions {
    /// Validates the URL and builds the runtime config.
    pub fn into_config(self) -> Result<ClientConfig, ConfigError> {
        ConnectionInfo::parse(&self.url)?;
        Ok(ClientConfig {
            url: self.url,
            connect_timeout: self.connect_timeout_ms.map(Duration::from_millis),
            read_timeout: self.read_timeout_ms.map(Duration::from_millis),
            write_timeout: self.write_timeout_ms.map(Duration::from_millis),
            decoding: self.decoding,
            pubsub_capacity: self.pubsub_capacity,
            ..ClientConfig::default()
        })
    }
}
