use crate::error::{Result, ServeError};
use std::{
    net::{IpAddr, Ipv4Addr},
    path::PathBuf,
};
use tiny_http::Header;

pub const DEFAULT_PORT: u16 = 8000;

/// Owned by the server per response, or dropped by tiny_http on the way out.
const RESERVED_HEADERS: [&str; 6] = [
    "Connection",
    "Content-Length",
    "Content-Type",
    "Trailer",
    "Transfer-Encoding",
    "Upgrade",
];

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub root: PathBuf,
    pub host: IpAddr,
    pub port: u16,
    pub fallback_port: Option<u16>,
    pub headers: HeaderSet,
}

impl ServerConfig {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            host: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: DEFAULT_PORT,
            fallback_port: None,
            headers: HeaderSet::default(),
        }
    }

    pub fn host(mut self, host: impl Into<IpAddr>) -> Self {
        self.host = host.into();
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn fallback_port(mut self, port: u16) -> Self {
        self.fallback_port = Some(port);
        self
    }

    pub fn with(mut self, option: HeaderOption) -> Result<Self> {
        self.headers.enable(option)?;
        Ok(self)
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Result<Self> {
        self.headers.insert(name, value)?;
        Ok(self)
    }
}

/// Response headers injected into every response, in insertion order.
/// Each name is held at most once; re-inserting a name replaces its value.
#[derive(Clone, Debug, Default)]
pub struct HeaderSet(Vec<Header>);

impl HeaderSet {
    pub fn insert(&mut self, name: &str, value: &str) -> Result<()> {
        let invalid = || ServeError::InvalidHeader { name: name.into() };

        if name.is_empty() || name.bytes().any(|byte| byte.is_ascii_whitespace() || byte == b':') {
            return Err(invalid());
        }

        if RESERVED_HEADERS
            .iter()
            .any(|reserved| reserved.eq_ignore_ascii_case(name))
        {
            return Err(invalid());
        }

        if value.bytes().any(|byte| byte == b'\r' || byte == b'\n') {
            return Err(invalid());
        }

        let header = Header::from_bytes(name, value).map_err(|_| invalid())?;

        match self.0.iter_mut().find(|existing| is_named(existing, name)) {
            Some(existing) => *existing = header,
            None => self.0.push(header),
        }

        Ok(())
    }

    pub fn enable(&mut self, option: HeaderOption) -> Result<()> {
        for (name, value) in option.headers() {
            self.insert(name, &value)?;
        }

        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|header| is_named(header, name))
            .map(|header| header.value.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = &Header> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

pub(crate) fn is_named(header: &Header, name: &str) -> bool {
    header.field.as_str().as_str().eq_ignore_ascii_case(name)
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HeaderOption {
    Cors,
    NoCache,
    Csp(String),
}

impl HeaderOption {
    pub fn headers(&self) -> Vec<(&'static str, String)> {
        match self {
            Self::Cors => vec![
                ("Access-Control-Allow-Origin", "*".into()),
                ("Access-Control-Allow-Methods", "GET, POST, OPTIONS".into()),
                ("Access-Control-Allow-Headers", "Content-Type".into()),
            ],
            Self::NoCache => vec![
                ("Cache-Control", "no-cache, no-store, must-revalidate".into()),
                ("Pragma", "no-cache".into()),
                ("Expires", "0".into()),
            ],
            Self::Csp(policy) => vec![("Content-Security-Policy", policy.clone())],
        }
    }
}
