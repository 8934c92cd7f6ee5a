//! Resolution of relative URLs against a document's base.

use crate::dest::is_special_page;
use crate::dest::prepare_url;
use std::cell::RefCell;
use std::collections::HashMap;
use tracing::debug;
use url::Url;
use vn_core::ProxyContext;
use vn_core::VeneerError;
use vn_core::VeneerResult;

/// ID the harness assigns to each live document.
pub type DocumentId = u64;

/// What the resolver needs to know about the document a URL belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BaseDocument {
    pub id: DocumentId,
    /// Destination location of the document; `None` until its load starts.
    pub location: Option<String>,
    /// Raw `href` of the document's `<base>` element, if any.
    pub base_href: Option<String>,
}

impl BaseDocument {
    pub fn new(id: DocumentId, location: impl Into<String>) -> Self {
        Self {
            id,
            location: Some(location.into()),
            base_href: None,
        }
    }

    /// A document that has no load of its own yet (fresh same-origin frame).
    pub fn detached(id: DocumentId) -> Self {
        Self {
            id,
            location: None,
            base_href: None,
        }
    }

    pub fn with_base_href(mut self, base_href: impl Into<String>) -> Self {
        self.base_href = Some(base_href.into());
        self
    }
}

#[derive(Debug, Clone)]
struct ResolverHelper {
    location: Option<String>,
    base_href: Option<String>,
    base: Option<Url>,
}

/// Per-page resolver.
///
/// Keeps one lazily built base per document, rebuilt when the document's
/// location or `<base>` changes and dropped by [`UrlResolver::forget_document`].
#[derive(Debug)]
pub struct UrlResolver {
    page_url: Url,
    owner_base: Option<Url>,
    helpers: RefCell<HashMap<DocumentId, ResolverHelper>>,
}

impl UrlResolver {
    pub fn new(context: &ProxyContext) -> VeneerResult<Self> {
        let page_url = Url::parse(&context.page_url).map_err(|error| {
            VeneerError::new(
                "url.page_url_invalid",
                format!("page URL `{}` is not absolute: {error}", context.page_url),
            )
        })?;

        let owner_base = context
            .owner_page_url
            .as_deref()
            .and_then(|owner| Url::parse(owner).ok());

        Ok(Self {
            page_url,
            owner_base,
            helpers: RefCell::new(HashMap::new()),
        })
    }

    pub fn page_url(&self) -> &Url {
        &self.page_url
    }

    /// Resolves `input` to an absolute URL, or `None` when no usable base exists.
    pub fn resolve(&self, input: &str, doc: Option<&BaseDocument>) -> Option<String> {
        match self.try_resolve(input, doc) {
            Ok(resolved) => Some(resolved),
            Err(error) => {
                debug!(url = input, %error, "leaving URL unresolved");
                None
            }
        }
    }

    pub fn try_resolve(&self, input: &str, doc: Option<&BaseDocument>) -> VeneerResult<String> {
        let prepared = prepare_url(input);

        // Scheme-relative URLs take the page's scheme: the base document may be
        // a synthetic helper with a different one.
        if prepared.starts_with("//") {
            let absolute = format!("{}:{prepared}", self.page_url.scheme());
            return Url::parse(&absolute)
                .map(|url| url.to_string())
                .map_err(|error| unresolvable(input, &error.to_string()));
        }

        if let Ok(absolute) = Url::parse(&prepared) {
            return Ok(absolute.to_string());
        }

        let base = match doc {
            Some(doc) => self.base_for(doc),
            None => Some(self.page_url.clone()),
        };
        let Some(base) = base else {
            return Err(unresolvable(input, "document has no base"));
        };

        base.join(&prepared)
            .map(|url| url.to_string())
            .map_err(|error| unresolvable(input, &error.to_string()))
    }

    /// Base URL of `doc`, built on first use.
    pub fn base_for(&self, doc: &BaseDocument) -> Option<Url> {
        let mut helpers = self.helpers.borrow_mut();
        if let Some(helper) = helpers.get(&doc.id) {
            if helper.location == doc.location && helper.base_href == doc.base_href {
                return helper.base.clone();
            }
        }

        let base = self.compute_base(doc);
        helpers.insert(
            doc.id,
            ResolverHelper {
                location: doc.location.clone(),
                base_href: doc.base_href.clone(),
                base: base.clone(),
            },
        );
        base
    }

    /// Drops the cached base of a wiped or unloaded document.
    pub fn forget_document(&self, id: DocumentId) {
        self.helpers.borrow_mut().remove(&id);
    }

    pub fn tracked_documents(&self) -> usize {
        self.helpers.borrow().len()
    }

    fn compute_base(&self, doc: &BaseDocument) -> Option<Url> {
        let own_location = doc
            .location
            .as_deref()
            .filter(|location| !is_special_page(location))
            .and_then(|location| Url::parse(location).ok());

        let location = match own_location {
            Some(location) => location,
            None => match &self.owner_base {
                Some(owner) => owner.clone(),
                None => Url::parse(doc.location.as_deref()?).ok()?,
            },
        };

        match doc.base_href.as_deref() {
            Some(href) => location.join(&prepare_url(href)).ok().or(Some(location)),
            None => Some(location),
        }
    }
}

fn unresolvable(input: &str, reason: &str) -> VeneerError {
    VeneerError::new(
        "url.unresolvable_relative",
        format!("cannot resolve `{input}`: {reason}"),
    )
}

#[cfg(test)]
mod tests {
    use super::BaseDocument;
    use super::UrlResolver;
    use vn_core::ProxyContext;

    fn resolver(context: ProxyContext) -> UrlResolver {
        match UrlResolver::new(&context) {
            Ok(value) => value,
            Err(error) => panic!("{error}"),
        }
    }

    #[test]
    fn resolves_relative_paths_against_page() {
        let resolver = resolver(ProxyContext::new("s", "https://example.com/docs/index.html"));
        assert_eq!(
            resolver.resolve("../about", None).as_deref(),
            Some("https://example.com/about")
        );
        assert_eq!(
            resolver.resolve("#frag", None).as_deref(),
            Some("https://example.com/docs/index.html#frag")
        );
    }

    #[test]
    fn scheme_relative_uses_page_scheme_not_document_scheme() {
        let resolver = resolver(ProxyContext::new("s", "https://example.com/"));
        let helper_doc = BaseDocument::new(7, "http://helper.local/");
        assert_eq!(
            resolver.resolve("//cdn.example.com/a.js", Some(&helper_doc)).as_deref(),
            Some("https://cdn.example.com/a.js")
        );
    }

    #[test]
    fn detached_document_uses_owner_base() {
        let context = ProxyContext::new("s", "https://child.example.com/")
            .with_owner_page_url("https://owner.example.com/dir/page.html");
        let resolver = resolver(context);

        let fresh_frame = BaseDocument::detached(3);
        assert_eq!(
            resolver.resolve("img.png", Some(&fresh_frame)).as_deref(),
            Some("https://owner.example.com/dir/img.png")
        );

        let blank_frame = BaseDocument::new(4, "about:blank");
        assert_eq!(
            resolver.resolve("/x", Some(&blank_frame)).as_deref(),
            Some("https://owner.example.com/x")
        );
    }

    #[test]
    fn blank_document_without_owner_cannot_rebase() {
        let resolver = resolver(ProxyContext::new("s", "https://example.com/"));
        let blank = BaseDocument::new(1, "about:blank");
        assert_eq!(resolver.resolve("token", Some(&blank)), None);
        assert_eq!(resolver.resolve("token", Some(&BaseDocument::detached(2))), None);
    }

    #[test]
    fn base_href_is_applied_and_cache_tracks_changes() {
        let resolver = resolver(ProxyContext::new("s", "https://example.com/"));
        let doc = BaseDocument::new(9, "https://example.com/a/b.html").with_base_href("/static/");
        assert_eq!(
            resolver.resolve("app.js", Some(&doc)).as_deref(),
            Some("https://example.com/static/app.js")
        );

        let moved = BaseDocument::new(9, "https://example.com/a/b.html").with_base_href("/v2/");
        assert_eq!(
            resolver.resolve("app.js", Some(&moved)).as_deref(),
            Some("https://example.com/v2/app.js")
        );
        assert_eq!(resolver.tracked_documents(), 1);

        resolver.forget_document(9);
        assert_eq!(resolver.tracked_documents(), 0);
    }

    #[test]
    fn absolute_urls_are_normalized() {
        let resolver = resolver(ProxyContext::new("s", "https://example.com/"));
        assert_eq!(
            resolver.resolve("HTTP://Example.COM", None).as_deref(),
            Some("http://example.com/")
        );
    }
}
