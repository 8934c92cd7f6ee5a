//! Proxy URL encoding and decoding.
//!
//! Layout of a proxy URL:
//!
//! ```text
//! {proto}://{proxy-host}:{port}/{session}[*{window}][!{type}[!{charset}[!{credentials}[!{origin}]]]]/{destination}
//! ```
//!
//! Session, window and origin are percent-encoded as URL components, so the
//! `*`, `!` and `/` delimiters never occur inside them. WebSocket destinations
//! are embedded with their HTTP scheme and the proxy URL itself takes the
//! `ws`/`wss` scheme of the listener.

use crate::dest::DestUrlPart;
use crate::dest::ParsedDestUrl;
use crate::dest::Scheme;
use crate::dest::is_special_page;
use crate::dest::is_supported_protocol;
use crate::dest::normalize_special_page;
use crate::dest::prepare_url;
use crate::origin::SameOriginEvaluator;
use crate::resolver::BaseDocument;
use crate::resolver::UrlResolver;
use crate::resource_type::ResourceType;
use std::sync::Arc;
use tracing::debug;
use url::Position;
use url::Url;
use vn_core::ProxyContext;
use vn_core::ProxyProtocol;
use vn_core::VeneerError;
use vn_core::VeneerResult;

const WINDOW_DELIMITER: char = '*';
const FIELD_DELIMITER: char = '!';

/// Credentials mode a request was issued with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Credentials {
    Omit,
    Include,
    SameOrigin,
}

impl Credentials {
    pub fn as_token(self) -> &'static str {
        match self {
            Self::Omit => "0",
            Self::Include => "1",
            Self::SameOrigin => "2",
        }
    }

    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "0" => Some(Self::Omit),
            "1" => Some(Self::Include),
            "2" => Some(Self::SameOrigin),
            _ => None,
        }
    }
}

/// Per-call options for [`ProxyUrlCodec::encode`]; unset fields fall back to the context.
#[derive(Debug, Clone, Copy, Default)]
pub struct EncodeOptions<'a> {
    pub resource_type: ResourceType,
    pub session_id: Option<&'a str>,
    pub window_id: Option<&'a str>,
    pub proxy_hostname: Option<&'a str>,
    pub proxy_port: Option<u16>,
    pub credentials: Option<Credentials>,
    pub charset: Option<&'a str>,
    pub req_origin: Option<&'a str>,
    pub doc: Option<&'a BaseDocument>,
}

impl<'a> EncodeOptions<'a> {
    pub fn of_type(resource_type: ResourceType) -> Self {
        Self {
            resource_type,
            ..Self::default()
        }
    }

    pub fn in_document(mut self, doc: &'a BaseDocument) -> Self {
        self.doc = Some(doc);
        self
    }
}

/// Listener a proxy URL points at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyLocation {
    pub hostname: String,
    pub port: u16,
    pub protocol: ProxyProtocol,
}

/// Decoded proxy URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedProxyUrl {
    pub proxy: ProxyLocation,
    pub session_id: String,
    pub window_id: Option<String>,
    pub resource_type: ResourceType,
    pub credentials: Option<Credentials>,
    pub charset: Option<String>,
    pub req_origin: Option<String>,
    /// Always absolute.
    pub dest_url: String,
    pub dest: ParsedDestUrl,
}

impl ParsedProxyUrl {
    /// Parses the proxy URL layout without checking which listener issued it.
    pub fn parse(input: &str) -> VeneerResult<Self> {
        let prepared = prepare_url(input);
        let url = Url::parse(&prepared).map_err(|error| malformed(input, &error.to_string()))?;

        let protocol = ProxyProtocol::from_scheme(url.scheme())
            .ok_or_else(|| malformed(input, "scheme is not a proxy listener scheme"))?;
        let websocket_proxy = matches!(url.scheme(), "ws" | "wss");
        let hostname = url
            .host_str()
            .map(bare_host)
            .ok_or_else(|| malformed(input, "missing proxy host"))?
            .to_owned();
        let port = url
            .port_or_known_default()
            .ok_or_else(|| malformed(input, "missing proxy port"))?;

        let tail = &url[Position::BeforePath..];
        let tail = tail
            .strip_prefix('/')
            .ok_or_else(|| malformed(input, "path does not start with `/`"))?;
        let (params, raw_dest) = tail
            .split_once('/')
            .ok_or_else(|| malformed(input, "missing destination"))?;

        let mut fields = params.split(FIELD_DELIMITER);
        let identity = fields.next().unwrap_or_default();
        let (session_raw, window_raw) = match identity.split_once(WINDOW_DELIMITER) {
            Some((session, window)) => (session, Some(window)),
            None => (identity, None),
        };

        let session_id = decode_component(session_raw)
            .filter(|session| !session.is_empty())
            .ok_or_else(|| malformed(input, "missing session id"))?;
        let window_id = match window_raw {
            Some(raw) => Some(
                decode_component(raw)
                    .filter(|window| !window.is_empty())
                    .ok_or_else(|| malformed(input, "invalid window id"))?,
            ),
            None => None,
        };

        let resource_type = ResourceType::parse(fields.next().unwrap_or_default());
        let charset = fields
            .next()
            .filter(|charset| !charset.is_empty())
            .map(str::to_owned);
        let credentials = fields.next().and_then(Credentials::from_token);
        let req_origin = fields
            .next()
            .filter(|origin| !origin.is_empty())
            .and_then(decode_component);

        let dest_url = restore_destination(raw_dest, websocket_proxy)
            .ok_or_else(|| malformed(input, "destination is not an absolute URL"))?;
        let dest = ParsedDestUrl::parse(&dest_url)?;

        Ok(Self {
            proxy: ProxyLocation {
                hostname,
                port,
                protocol,
            },
            session_id,
            window_id,
            resource_type,
            credentials,
            charset,
            req_origin,
            dest_url,
            dest,
        })
    }
}

/// Encodes destination URLs into proxy URLs for one attached page and back.
#[derive(Debug)]
pub struct ProxyUrlCodec {
    context: Arc<ProxyContext>,
    resolver: UrlResolver,
}

impl ProxyUrlCodec {
    pub fn new(context: Arc<ProxyContext>) -> VeneerResult<Self> {
        context.validate()?;
        let resolver = UrlResolver::new(&context)?;
        Ok(Self { context, resolver })
    }

    pub fn context(&self) -> &ProxyContext {
        &self.context
    }

    pub fn resolver(&self) -> &UrlResolver {
        &self.resolver
    }

    pub fn same_origin(&self) -> SameOriginEvaluator<'_> {
        SameOriginEvaluator::new(self)
    }

    pub fn resolve(&self, url: &str, doc: Option<&BaseDocument>) -> Option<String> {
        self.resolver.resolve(url, doc)
    }

    /// Converts `url` into a proxy URL. Never fails: inputs that cannot be
    /// proxied come back unchanged.
    pub fn encode(&self, url: &str, options: &EncodeOptions<'_>) -> String {
        match self.try_encode(url, options) {
            Ok(proxy_url) => proxy_url,
            Err(error) => {
                debug!(url, %error, "passing URL through unproxied");
                url.to_owned()
            }
        }
    }

    /// Like [`ProxyUrlCodec::encode`], but reports why a URL was not proxied.
    pub fn try_encode(&self, url: &str, options: &EncodeOptions<'_>) -> VeneerResult<String> {
        let prepared = prepare_url(url);
        let special = is_special_page(&prepared);

        if !special && !is_supported_protocol(&prepared) {
            return Err(VeneerError::new(
                "url.unsupported_scheme",
                format!("`{url}` does not use a proxied scheme"),
            ));
        }

        let resolved = if special {
            normalize_special_page(&prepared).unwrap_or(prepared)
        } else {
            self.resolver.try_resolve(&prepared, options.doc)?
        };

        if let Some(existing) = self.decode_for_target(&resolved, options) {
            if existing.resource_type == options.resource_type {
                return Ok(url.to_owned());
            }

            // Re-tag from the embedded destination so URLs are never wrapped twice.
            return Ok(self.compose(&existing.dest_url, options, Some(&existing)));
        }

        Ok(self.compose(&resolved, options, None))
    }

    /// Decodes a proxy URL issued by this page's proxy listener.
    pub fn decode(&self, proxy_url: &str) -> Option<ParsedProxyUrl> {
        let parsed = ParsedProxyUrl::parse(proxy_url).ok()?;
        let endpoint = &self.context.proxy;

        if hosts_match(&parsed.proxy.hostname, &endpoint.hostname)
            && endpoint.owns_port(parsed.proxy.port)
        {
            Some(parsed)
        } else {
            None
        }
    }

    /// Destination of `url` if it is a proxy URL, otherwise `url` itself.
    pub fn destination_url(&self, url: &str) -> String {
        match self.decode(url) {
            Some(parsed) => parsed.dest_url,
            None => url.to_owned(),
        }
    }

    /// Proxy URL for navigating a window (`is_iframe == false`) or a frame.
    pub fn page_navigation_url(&self, url: &str, is_iframe: bool) -> String {
        let resource_type = if is_iframe {
            ResourceType::iframe()
        } else {
            ResourceType::PLAIN
        };
        self.encode(url, &EncodeOptions::of_type(resource_type))
    }

    /// Rewrites one component of the destination behind `proxy_url`, keeping
    /// the proxy metadata. Non-proxy input or rejected values return the input.
    pub fn change_dest_url_part(&self, proxy_url: &str, part: DestUrlPart, value: &str) -> String {
        let Some(parsed) = self.decode(proxy_url) else {
            return proxy_url.to_owned();
        };

        let changed = match parsed.dest.with_part(part, value) {
            Ok(changed) => changed,
            Err(error) => {
                debug!(%error, "destination part rejected");
                return proxy_url.to_owned();
            }
        };

        let options = EncodeOptions {
            resource_type: parsed.resource_type,
            session_id: Some(&parsed.session_id),
            window_id: parsed.window_id.as_deref(),
            credentials: parsed.credentials,
            charset: parsed.charset.as_deref(),
            req_origin: parsed.req_origin.as_deref(),
            ..EncodeOptions::default()
        };
        self.compose(&changed.format(), &options, None)
    }

    fn decode_for_target(&self, url: &str, options: &EncodeOptions<'_>) -> Option<ParsedProxyUrl> {
        let parsed = ParsedProxyUrl::parse(url).ok()?;
        let endpoint = &self.context.proxy;
        let hostname = options.proxy_hostname.unwrap_or(&endpoint.hostname);

        let port_matches =
            endpoint.owns_port(parsed.proxy.port) || options.proxy_port == Some(parsed.proxy.port);

        if hosts_match(&parsed.proxy.hostname, hostname) && port_matches {
            Some(parsed)
        } else {
            None
        }
    }

    fn compose(
        &self,
        dest_url: &str,
        options: &EncodeOptions<'_>,
        existing: Option<&ParsedProxyUrl>,
    ) -> String {
        let endpoint = &self.context.proxy;
        let (embedded_dest, websocket) = match embed_destination(dest_url) {
            Some(value) => value,
            None => return dest_url.to_owned(),
        };

        let port = options.proxy_port.unwrap_or_else(|| {
            if is_special_page(&embedded_dest)
                || self
                    .same_origin()
                    .is_same_origin(self.resolver.page_url().as_str(), &embedded_dest)
            {
                endpoint.port
            } else {
                endpoint.cross_domain_port
            }
        });

        let scheme = if websocket {
            endpoint.protocol.websocket_scheme()
        } else {
            endpoint.protocol.as_str()
        };
        let hostname = options.proxy_hostname.unwrap_or(&endpoint.hostname);

        let session_id = options
            .session_id
            .or(existing.map(|parsed| parsed.session_id.as_str()))
            .unwrap_or(&self.context.session_id);
        let window_id = options
            .window_id
            .or(existing.and_then(|parsed| parsed.window_id.as_deref()))
            .or(self.context.window_id.as_deref());
        let credentials = options
            .credentials
            .or(existing.and_then(|parsed| parsed.credentials));
        let charset = options
            .charset
            .and_then(normalize_charset)
            .or(existing.and_then(|parsed| parsed.charset.clone()));
        let req_origin = options
            .req_origin
            .map(str::to_owned)
            .or(existing.and_then(|parsed| parsed.req_origin.clone()));

        let mut params = urlencoding::encode(session_id).into_owned();
        if let Some(window_id) = window_id.filter(|window| !window.is_empty()) {
            params.push(WINDOW_DELIMITER);
            params.push_str(&urlencoding::encode(window_id));
        }

        let mut fields = vec![
            options.resource_type.stringify(),
            charset.unwrap_or_default(),
            credentials
                .map(|credentials| credentials.as_token().to_owned())
                .unwrap_or_default(),
            req_origin
                .map(|origin| urlencoding::encode(&origin).into_owned())
                .unwrap_or_default(),
        ];
        while fields.last().is_some_and(String::is_empty) {
            fields.pop();
        }
        for field in fields {
            params.push(FIELD_DELIMITER);
            params.push_str(&field);
        }

        let authority = format_authority(hostname, port, scheme);
        format!("{scheme}://{authority}/{params}/{embedded_dest}")
    }
}

/// Canonical lowercase encoding name for a charset label, if the label is known.
pub fn normalize_charset(label: &str) -> Option<String> {
    encoding_rs::Encoding::for_label(label.trim().as_bytes())
        .map(|encoding| encoding.name().to_ascii_lowercase())
}

fn embed_destination(dest_url: &str) -> Option<(String, bool)> {
    if let Some(page) = normalize_special_page(dest_url) {
        return Some((page, false));
    }

    let mut url = Url::parse(dest_url).ok()?;
    let scheme = Scheme::parse(url.scheme())?;
    if scheme.is_web_socket() {
        url.set_scheme(scheme.to_http().as_str()).ok()?;
        return Some((url.to_string(), true));
    }

    Some((url.to_string(), false))
}

fn restore_destination(raw_dest: &str, websocket_proxy: bool) -> Option<String> {
    if raw_dest.is_empty() {
        return None;
    }

    if let Some(page) = normalize_special_page(raw_dest) {
        return Some(page);
    }

    let mut url = Url::parse(raw_dest).ok()?;
    let scheme = Scheme::parse(url.scheme())?;
    if websocket_proxy {
        url.set_scheme(scheme.to_web_socket().as_str()).ok()?;
    }

    Some(url.to_string())
}

/// Host without the brackets that wrap IPv6 literals in an authority.
fn bare_host(host: &str) -> &str {
    host.strip_prefix('[')
        .and_then(|inner| inner.strip_suffix(']'))
        .unwrap_or(host)
}

fn hosts_match(left: &str, right: &str) -> bool {
    bare_host(left).eq_ignore_ascii_case(bare_host(right))
}

fn format_authority(hostname: &str, port: u16, scheme: &str) -> String {
    let hostname = bare_host(hostname);
    let host = if hostname.contains(':') {
        format!("[{hostname}]")
    } else {
        hostname.to_owned()
    };

    let default_port = Scheme::parse(scheme).map(Scheme::default_port);
    if default_port == Some(port) {
        host
    } else {
        format!("{host}:{port}")
    }
}

fn decode_component(raw: &str) -> Option<String> {
    urlencoding::decode(raw).ok().map(|value| value.into_owned())
}

fn malformed(input: &str, reason: &str) -> VeneerError {
    VeneerError::new(
        "url.malformed_proxy_url",
        format!("`{input}` is not a proxy URL: {reason}"),
    )
}
