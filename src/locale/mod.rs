//! Request-scoped locale negotiation.
//!
//! The client's `Accept-Language` preferences are matched against a
//! [`LocaleCatalog`] and the winner is bound to the request's task for as long
//! as the wrapped service runs. Code anywhere below the layer reads it with
//! [`current_locale`].

mod catalog;
mod layer;
mod tag;

pub use catalog::{LocaleCatalog, StaticCatalog};
pub use layer::{LocaleLayer, LocaleService, current_locale};
pub use tag::{LanguageRange, Locale, parse_accept_language};
