//! Destination URL parsing and scheme helpers.

use url::Url;
use vn_core::VeneerError;
use vn_core::VeneerResult;

/// Pseudo-pages that are proxied even though they carry no network scheme.
pub const SPECIAL_PAGES: &[&str] = &["about:blank", "about:error"];

/// Network schemes the proxy can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scheme {
    Http,
    Https,
    Ws,
    Wss,
}

impl Scheme {
    pub fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "http" => Some(Self::Http),
            "https" => Some(Self::Https),
            "ws" => Some(Self::Ws),
            "wss" => Some(Self::Wss),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Http => "http",
            Self::Https => "https",
            Self::Ws => "ws",
            Self::Wss => "wss",
        }
    }

    pub fn is_secure(self) -> bool {
        matches!(self, Self::Https | Self::Wss)
    }

    pub fn is_web_socket(self) -> bool {
        matches!(self, Self::Ws | Self::Wss)
    }

    /// The HTTP scheme a WebSocket handshake travels over.
    pub fn to_http(self) -> Self {
        match self {
            Self::Ws => Self::Http,
            Self::Wss => Self::Https,
            other => other,
        }
    }

    pub fn to_web_socket(self) -> Self {
        match self {
            Self::Http => Self::Ws,
            Self::Https => Self::Wss,
            other => other,
        }
    }

    pub fn default_port(self) -> u16 {
        match self {
            Self::Http | Self::Ws => 80,
            Self::Https | Self::Wss => 443,
        }
    }
}

/// Strips the characters browsers drop from URL attributes before parsing.
pub fn prepare_url(input: &str) -> String {
    input
        .trim()
        .chars()
        .filter(|ch| !matches!(ch, '\t' | '\n' | '\r'))
        .collect()
}

/// Scheme prefix of `input`, if it has one (`"mailto"` for `mailto:a@b`).
pub fn scheme_of(input: &str) -> Option<&str> {
    let trimmed = input.trim_start();
    let colon = trimmed.find(':')?;
    let candidate = &trimmed[..colon];
    let mut chars = candidate.chars();
    let first = chars.next()?;

    if !first.is_ascii_alphabetic() {
        return None;
    }

    if chars.all(|ch| ch.is_ascii_alphanumeric() || matches!(ch, '+' | '-' | '.')) {
        Some(candidate)
    } else {
        None
    }
}

/// True for relative URLs and for the http/https/ws/wss schemes.
pub fn is_supported_protocol(input: &str) -> bool {
    match scheme_of(input) {
        Some(scheme) => Scheme::parse(scheme).is_some(),
        None => true,
    }
}

pub fn is_special_page(input: &str) -> bool {
    let normalized = prepare_url(input).to_ascii_lowercase();
    SPECIAL_PAGES.iter().any(|page| {
        normalized == *page
            || normalized
                .strip_prefix(*page)
                .is_some_and(|rest| rest.starts_with('#') || rest.starts_with('?'))
    })
}

/// Special page with its `about:` prefix lowercased and any `?`/`#` suffix kept verbatim.
pub fn normalize_special_page(input: &str) -> Option<String> {
    let prepared = prepare_url(input);
    SPECIAL_PAGES.iter().find_map(|page| {
        let head = prepared.get(..page.len())?;
        let rest = &prepared[page.len()..];
        let matches = head.eq_ignore_ascii_case(page)
            && (rest.is_empty() || rest.starts_with('#') || rest.starts_with('?'));
        matches.then(|| format!("{page}{rest}"))
    })
}

/// True when `next` differs from `current` only in its fragment.
pub fn is_changed_only_hash(current: &str, next: &str) -> bool {
    let (Ok(mut current), Ok(mut next)) = (Url::parse(current), Url::parse(next)) else {
        return false;
    };

    if next.fragment().is_none() {
        return false;
    }

    current.set_fragment(None);
    next.set_fragment(None);
    current == next
}

/// Component of a destination URL addressed by [`ParsedDestUrl::with_part`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DestUrlPart {
    Protocol,
    Host,
    Hostname,
    Port,
    Pathname,
    Search,
    Hash,
}

/// Logical decomposition of a destination URL.
///
/// `search` and `hash` keep their leading `?`/`#` so the parts concatenate
/// back into an equivalent URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedDestUrl {
    pub protocol: String,
    pub host: String,
    pub hostname: String,
    pub port: Option<u16>,
    pub pathname: String,
    pub search: String,
    pub hash: String,
}

impl ParsedDestUrl {
    pub fn parse(input: &str) -> VeneerResult<Self> {
        let parsed = Url::parse(input).map_err(|error| {
            VeneerError::new(
                "url.invalid",
                format!("failed to parse URL `{input}`: {error}"),
            )
        })?;

        Ok(Self::from_url(&parsed))
    }

    pub fn from_url(parsed: &Url) -> Self {
        let hostname = parsed.host_str().unwrap_or_default().to_owned();
        let host = match parsed.port() {
            Some(port) => format!("{hostname}:{port}"),
            None => hostname.clone(),
        };

        Self {
            protocol: format!("{}:", parsed.scheme()),
            host,
            hostname,
            port: parsed.port(),
            pathname: parsed.path().to_owned(),
            search: parsed.query().map(|q| format!("?{q}")).unwrap_or_default(),
            hash: parsed
                .fragment()
                .map(|f| format!("#{f}"))
                .unwrap_or_default(),
        }
    }

    pub fn scheme(&self) -> &str {
        self.protocol.trim_end_matches(':')
    }

    pub fn format(&self) -> String {
        if self.hostname.is_empty() && Scheme::parse(self.scheme()).is_none() {
            return format!(
                "{}{}{}{}",
                self.protocol, self.pathname, self.search, self.hash
            );
        }

        format!(
            "{}//{}{}{}{}",
            self.protocol, self.host, self.pathname, self.search, self.hash
        )
    }

    /// Replaces one component the way a `location`/anchor setter would.
    pub fn with_part(&self, part: DestUrlPart, value: &str) -> VeneerResult<Self> {
        let mut url = Url::parse(&self.format()).map_err(|error| {
            VeneerError::new("url.invalid", format!("destination does not reparse: {error}"))
        })?;

        let applied = match part {
            DestUrlPart::Protocol => url.set_scheme(value.trim_end_matches(':')),
            DestUrlPart::Host => set_host_and_port(&mut url, value),
            DestUrlPart::Hostname => url.set_host(Some(value)).map_err(|_| ()),
            DestUrlPart::Port => {
                let port = if value.is_empty() {
                    Ok(None)
                } else {
                    value.parse::<u16>().map(Some).map_err(|_| ())
                };
                port.and_then(|port| url.set_port(port))
            }
            DestUrlPart::Pathname => {
                url.set_path(value);
                Ok(())
            }
            DestUrlPart::Search => {
                let query = value.strip_prefix('?').unwrap_or(value);
                url.set_query(if query.is_empty() { None } else { Some(query) });
                Ok(())
            }
            DestUrlPart::Hash => {
                let fragment = value.strip_prefix('#').unwrap_or(value);
                url.set_fragment(if fragment.is_empty() {
                    None
                } else {
                    Some(fragment)
                });
                Ok(())
            }
        };

        applied.map_err(|()| {
            VeneerError::new(
                "url.part_rejected",
                format!("cannot set {part:?} to `{value}`"),
            )
        })?;

        Ok(Self::from_url(&url))
    }
}

fn set_host_and_port(url: &mut Url, value: &str) -> Result<(), ()> {
    let (host, port) = match value.rsplit_once(':') {
        Some((host, port)) => match port.parse::<u16>() {
            Ok(port) => (host, Some(port)),
            Err(_) => (value, None),
        },
        None => (value, None),
    };

    url.set_host(Some(host)).map_err(|_| ())?;
    url.set_port(port)
}
