//! URL side of the proxy: resource types, resolution, the proxy URL codec
//! and same-origin checks.

pub mod codec;
pub mod dest;
pub mod origin;
pub mod resolver;
pub mod resource_type;

pub use codec::Credentials;
pub use codec::EncodeOptions;
pub use codec::ParsedProxyUrl;
pub use codec::ProxyLocation;
pub use codec::ProxyUrlCodec;
pub use dest::DestUrlPart;
pub use dest::ParsedDestUrl;
pub use dest::Scheme;
pub use origin::SameOriginEvaluator;
pub use resolver::BaseDocument;
pub use resolver::DocumentId;
pub use resolver::UrlResolver;
pub use resource_type::ResourceType;
