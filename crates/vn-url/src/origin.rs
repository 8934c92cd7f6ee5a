//! Same-origin decisions over proxied and plain URLs.

use crate::codec::ProxyUrlCodec;
use crate::dest::Scheme;
use url::Url;

/// Compares the destinations behind two URLs.
#[derive(Debug, Clone, Copy)]
pub struct SameOriginEvaluator<'a> {
    codec: &'a ProxyUrlCodec,
}

impl<'a> SameOriginEvaluator<'a> {
    pub fn new(codec: &'a ProxyUrlCodec) -> Self {
        Self { codec }
    }

    /// Proxy URLs are decoded first; a relative candidate is resolved
    /// against the reference. Opaque origins never match.
    pub fn is_same_origin(&self, reference: &str, candidate: &str) -> bool {
        let reference = self.codec.destination_url(reference);
        let candidate = self.codec.destination_url(candidate);

        let Some(reference) = self
            .codec
            .resolve(&reference, None)
            .and_then(|resolved| Url::parse(&resolved).ok())
        else {
            return false;
        };

        let Ok(candidate) = reference.join(&candidate) else {
            return false;
        };

        origins_match(&reference, &candidate)
    }
}

/// Scheme, host and effective port equality; default ports compare equal to none.
pub fn origins_match(left: &Url, right: &Url) -> bool {
    match (origin_tuple(left), origin_tuple(right)) {
        (Some(left), Some(right)) => left == right,
        _ => false,
    }
}

fn origin_tuple(url: &Url) -> Option<(Scheme, String, u16)> {
    let scheme = Scheme::parse(url.scheme())?;
    let host = url.host_str()?.to_ascii_lowercase();
    let port = url.port().unwrap_or(scheme.default_port());
    Some((scheme, host, port))
}

#[cfg(test)]
mod tests {
    use super::origins_match;
    use crate::codec::EncodeOptions;
    use crate::codec::ProxyUrlCodec;
    use std::sync::Arc;
    use url::Url;
    use vn_core::ProxyContext;

    fn codec() -> ProxyUrlCodec {
        match ProxyUrlCodec::new(Arc::new(ProxyContext::new("s", "https://example.com/a/"))) {
            Ok(value) => value,
            Err(error) => panic!("{error}"),
        }
    }

    #[test]
    fn default_port_is_same_origin() {
        let codec = codec();
        let evaluator = codec.same_origin();
        assert!(evaluator.is_same_origin("https://example.com/x", "https://example.com:443/y"));
        assert!(evaluator.is_same_origin("http://Example.com/", "http://example.com:80"));
        assert!(!evaluator.is_same_origin("https://example.com/", "http://example.com/"));
        assert!(!evaluator.is_same_origin("https://example.com/", "https://example.com:8443/"));
    }

    #[test]
    fn proxy_urls_compare_by_destination() {
        let codec = codec();
        let proxied = codec.encode("https://example.com/page", &EncodeOptions::default());
        let foreign = codec.encode("https://other.org/page", &EncodeOptions::default());
        let evaluator = codec.same_origin();

        assert!(evaluator.is_same_origin(&proxied, "https://example.com/other"));
        assert!(evaluator.is_same_origin("https://example.com/", &proxied));
        assert!(!evaluator.is_same_origin(&proxied, &foreign));
    }

    #[test]
    fn relative_candidate_is_same_origin() {
        let codec = codec();
        let evaluator = codec.same_origin();
        assert!(evaluator.is_same_origin("https://example.com/", "/path"));
        assert!(!evaluator.is_same_origin("https://example.com/", "//other.org/path"));
    }

    #[test]
    fn opaque_origins_never_match() {
        let codec = codec();
        let evaluator = codec.same_origin();
        assert!(!evaluator.is_same_origin("about:blank", "about:blank"));

        let data = match Url::parse("data:text/plain,x") {
            Ok(value) => value,
            Err(error) => panic!("{error}"),
        };
        assert!(!origins_match(&data, &data));
    }
}
