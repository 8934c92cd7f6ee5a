//! Resource-type facets and their compact token form.

use core::fmt;

/// Kind of load a proxied URL represents.
///
/// Facets are independent; the all-false value is a plain resource.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct ResourceType {
    pub is_iframe: bool,
    pub is_form: bool,
    pub is_script: bool,
    pub is_event_source: bool,
    pub is_service_worker: bool,
    pub is_ajax: bool,
    pub is_web_socket: bool,
    pub is_html_import: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Facet {
    Iframe,
    Form,
    Script,
    EventSource,
    ServiceWorker,
    Ajax,
    WebSocket,
    HtmlImport,
}

// Emission order of the token; parsing accepts any order.
const FACET_LETTERS: [(Facet, char); 8] = [
    (Facet::Iframe, 'i'),
    (Facet::Form, 'f'),
    (Facet::Script, 's'),
    (Facet::EventSource, 'e'),
    (Facet::ServiceWorker, 'v'),
    (Facet::Ajax, 'x'),
    (Facet::WebSocket, 'w'),
    (Facet::HtmlImport, 'h'),
];

impl ResourceType {
    pub const PLAIN: Self = Self {
        is_iframe: false,
        is_form: false,
        is_script: false,
        is_event_source: false,
        is_service_worker: false,
        is_ajax: false,
        is_web_socket: false,
        is_html_import: false,
    };

    pub const fn iframe() -> Self {
        Self {
            is_iframe: true,
            ..Self::PLAIN
        }
    }

    pub const fn form() -> Self {
        Self {
            is_form: true,
            ..Self::PLAIN
        }
    }

    pub const fn script() -> Self {
        Self {
            is_script: true,
            ..Self::PLAIN
        }
    }

    pub const fn ajax() -> Self {
        Self {
            is_ajax: true,
            ..Self::PLAIN
        }
    }

    pub const fn web_socket() -> Self {
        Self {
            is_web_socket: true,
            ..Self::PLAIN
        }
    }

    pub const fn html_import() -> Self {
        Self {
            is_html_import: true,
            ..Self::PLAIN
        }
    }

    pub fn is_plain(&self) -> bool {
        *self == Self::PLAIN
    }

    /// Encodes the facets that are set; the plain type yields `""`.
    pub fn stringify(&self) -> String {
        FACET_LETTERS
            .iter()
            .filter(|(facet, _)| self.facet(*facet))
            .map(|(_, letter)| *letter)
            .collect()
    }

    /// Inverse of [`ResourceType::stringify`]. Unknown letters degrade to the plain type.
    pub fn parse(token: &str) -> Self {
        let mut parsed = Self::PLAIN;

        for ch in token.chars() {
            let Some((facet, _)) = FACET_LETTERS.iter().find(|(_, letter)| *letter == ch) else {
                return Self::PLAIN;
            };
            parsed.set_facet(*facet);
        }

        parsed
    }

    fn facet(&self, facet: Facet) -> bool {
        match facet {
            Facet::Iframe => self.is_iframe,
            Facet::Form => self.is_form,
            Facet::Script => self.is_script,
            Facet::EventSource => self.is_event_source,
            Facet::ServiceWorker => self.is_service_worker,
            Facet::Ajax => self.is_ajax,
            Facet::WebSocket => self.is_web_socket,
            Facet::HtmlImport => self.is_html_import,
        }
    }

    fn set_facet(&mut self, facet: Facet) {
        match facet {
            Facet::Iframe => self.is_iframe = true,
            Facet::Form => self.is_form = true,
            Facet::Script => self.is_script = true,
            Facet::EventSource => self.is_event_source = true,
            Facet::ServiceWorker => self.is_service_worker = true,
            Facet::Ajax => self.is_ajax = true,
            Facet::WebSocket => self.is_web_socket = true,
            Facet::HtmlImport => self.is_html_import = true,
        }
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.stringify())
    }
}

#[cfg(test)]
pub(crate) fn any_resource_type() -> impl proptest::strategy::Strategy<Value = ResourceType> {
    use proptest::prelude::*;

    proptest::array::uniform8(any::<bool>()).prop_map(|bits| ResourceType {
        is_iframe: bits[0],
        is_form: bits[1],
        is_script: bits[2],
        is_event_source: bits[3],
        is_service_worker: bits[4],
        is_ajax: bits[5],
        is_web_socket: bits[6],
        is_html_import: bits[7],
    })
}
