//! Attach-time ambient context shared by the codec and the streamer.

use crate::VeneerError;
use crate::VeneerResult;
use serde::Deserialize;
use serde::Serialize;
use url::Url;

/// Scheme the proxy listener speaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProxyProtocol {
    Http,
    Https,
}

impl ProxyProtocol {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Http => "http",
            Self::Https => "https",
        }
    }

    /// Scheme used for proxied WebSocket connections on the same listener.
    pub fn websocket_scheme(self) -> &'static str {
        match self {
            Self::Http => "ws",
            Self::Https => "wss",
        }
    }

    /// Maps any listener-facing scheme (`http`, `https`, `ws`, `wss`) back to the protocol.
    pub fn from_scheme(scheme: &str) -> Option<Self> {
        match scheme {
            "http" | "ws" => Some(Self::Http),
            "https" | "wss" => Some(Self::Https),
            _ => None,
        }
    }
}

/// Proxy listener that owns the URLs the codec produces.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProxyEndpoint {
    pub hostname: String,
    pub port: u16,
    /// Listener used for destinations the page considers foreign.
    pub cross_domain_port: u16,
    pub protocol: ProxyProtocol,
}

impl Default for ProxyEndpoint {
    fn default() -> Self {
        Self {
            hostname: "localhost".to_owned(),
            port: 1337,
            cross_domain_port: 1338,
            protocol: ProxyProtocol::Http,
        }
    }
}

impl ProxyEndpoint {
    pub fn owns_port(&self, port: u16) -> bool {
        port == self.port || port == self.cross_domain_port
    }

    pub fn validate(&self) -> VeneerResult<()> {
        if self.hostname.trim().is_empty() {
            return Err(VeneerError::new(
                "config.proxy_hostname_missing",
                "proxy hostname must not be empty",
            ));
        }

        if self.port == 0 || self.cross_domain_port == 0 {
            return Err(VeneerError::new(
                "config.proxy_port_invalid",
                "proxy ports must be greater than zero",
            ));
        }

        if self.port == self.cross_domain_port {
            return Err(VeneerError::new(
                "config.proxy_ports_collide",
                format!(
                    "cross-domain port must differ from the primary port ({})",
                    self.port
                ),
            ));
        }

        Ok(())
    }
}

/// Read-only settings supplied once by the harness when it attaches to a page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProxyContext {
    pub session_id: String,
    #[serde(default)]
    pub window_id: Option<String>,
    #[serde(default)]
    pub proxy: ProxyEndpoint,
    /// Destination URL of the page the instrumentation runs in.
    pub page_url: String,
    /// Base forwarded from the owner page for frames whose own load has not started.
    #[serde(default)]
    pub owner_page_url: Option<String>,
}

impl ProxyContext {
    pub fn new(session_id: impl Into<String>, page_url: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            window_id: None,
            proxy: ProxyEndpoint::default(),
            page_url: page_url.into(),
            owner_page_url: None,
        }
    }

    pub fn with_window_id(mut self, window_id: impl Into<String>) -> Self {
        self.window_id = Some(window_id.into());
        self
    }

    pub fn with_proxy(mut self, proxy: ProxyEndpoint) -> Self {
        self.proxy = proxy;
        self
    }

    pub fn with_owner_page_url(mut self, owner_page_url: impl Into<String>) -> Self {
        self.owner_page_url = Some(owner_page_url.into());
        self
    }

    pub fn from_json(input: &str) -> VeneerResult<Self> {
        let context: Self = serde_json::from_str(input).map_err(|error| {
            VeneerError::new(
                "config.context_invalid_json",
                format!("failed to deserialize proxy context: {error}"),
            )
        })?;
        context.validate()?;
        Ok(context)
    }

    pub fn validate(&self) -> VeneerResult<()> {
        if self.session_id.is_empty() {
            return Err(VeneerError::new(
                "config.session_id_missing",
                "session id must not be empty",
            ));
        }

        if matches!(self.window_id.as_deref(), Some("")) {
            return Err(VeneerError::new(
                "config.window_id_empty",
                "window id must be omitted rather than empty",
            ));
        }

        self.proxy.validate()?;
        ensure_absolute("config.page_url_invalid", &self.page_url)?;

        if let Some(owner) = &self.owner_page_url {
            ensure_absolute("config.owner_page_url_invalid", owner)?;
        }

        Ok(())
    }
}

fn ensure_absolute(code: &'static str, input: &str) -> VeneerResult<()> {
    Url::parse(input)
        .map(|_| ())
        .map_err(|error| VeneerError::new(code, format!("`{input}` is not an absolute URL: {error}")))
}
