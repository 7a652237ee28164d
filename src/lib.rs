//! Tower middleware stages that post-process HTTP requests and responses.
//!
//! Four independent layers are provided, each wrapping the inner service's
//! response future rather than blocking on it:
//!
//! - [`ContentTypeLayer`] adds a default `Content-Type` to API responses.
//! - [`SiteUrlLayer`] seeds the persisted site URL from the first request.
//! - [`LocaleLayer`] negotiates a request-scoped locale from `Accept-Language`.
//! - [`GzipLayer`] gzips eligible `200 OK` responses.
//!
//! # Example
//!
//! ```ignore
//! use http_stage_middleware::{InMemorySettings, PipelineConfig, StageLayer};
//! use std::sync::Arc;
//! use tower::ServiceBuilder;
//!
//! let config = PipelineConfig::from_toml_str(r#"available_locales = ["en", "fr"]"#)?;
//! let service = ServiceBuilder::new()
//!     .layer(StageLayer::new(&config, Arc::new(InMemorySettings::new()))?)
//!     .service(my_service);
//! ```
//!
//! # Stage Order
//!
//! [`StageLayer`] composes the stages outermost first as locale, site URL,
//! gzip, content type. A response therefore receives its default
//! `Content-Type` before the gzip decision is made.
//!
//! All stages speak `http::Response<Body>`, where [`Body`] distinguishes
//! absent, textual, buffered and streamed payloads.

#![deny(missing_docs)]

mod body;
mod config;
mod content_type;
mod error;
mod gzip;
mod headers;
mod locale;
mod pipeline;
mod settings;
mod site_url;

pub use body::{Body, BodyKind};
pub use config::PipelineConfig;
pub use content_type::{
    ApiRequest, ContentTypeLayer, ContentTypeService, DEFAULT_API_PREFIX,
    ResponseFuture as ContentTypeFuture,
};
pub use error::{ConfigError, InvalidLocale, StageError};
pub use gzip::{
    DEFAULT_MIN_TEXT_LEN, GzipBody, GzipLayer, GzipService, ResponseFuture as GzipFuture,
    accepts_gzip,
};
pub use locale::{
    LanguageRange, Locale, LocaleCatalog, LocaleLayer, LocaleService, StaticCatalog,
    current_locale, parse_accept_language,
};
pub use pipeline::{StageLayer, StageService};
pub use settings::{InMemorySettings, SettingsStore};
pub use site_url::{ResponseFuture as SiteUrlFuture, SiteUrlLayer, SiteUrlService};

/// Boxed error type used by stages that can fail on their own.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;
