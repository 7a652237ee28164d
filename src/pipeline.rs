use crate::config::PipelineConfig;
use crate::content_type::{ContentTypeLayer, ContentTypeService};
use crate::error::ConfigError;
use crate::gzip::{GzipLayer, GzipService};
use crate::locale::{LocaleCatalog, LocaleLayer, LocaleService};
use crate::settings::SettingsStore;
use crate::site_url::{SiteUrlLayer, SiteUrlService};
use std::sync::Arc;
use tower::Layer;

/// The service produced by [`StageLayer`].
pub type StageService<S> =
    LocaleService<SiteUrlService<GzipService<ContentTypeService<S>>>>;

/// All four stages in their standard order.
///
/// Outermost first: locale, site URL, gzip, content type. Requests travel in
/// that order; responses come back the other way, so the default
/// `Content-Type` is set before gzip runs, and everything, gzip included,
/// sees the negotiated locale.
#[derive(Debug, Clone)]
pub struct StageLayer {
    locale: LocaleLayer,
    site_url: SiteUrlLayer,
    gzip: GzipLayer,
    content_type: ContentTypeLayer,
}

impl StageLayer {
    /// Builds the stages from config, using the config's locale catalog.
    pub fn new(
        config: &PipelineConfig,
        store: Arc<dyn SettingsStore>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let catalog = Arc::new(config.catalog()?);
        Ok(Self::with_catalog(config, store, catalog))
    }

    /// Builds the stages from config with an externally provided catalog.
    ///
    /// The config's locale fields are ignored.
    pub fn with_catalog(
        config: &PipelineConfig,
        store: Arc<dyn SettingsStore>,
        catalog: Arc<dyn LocaleCatalog>,
    ) -> Self {
        Self {
            locale: LocaleLayer::new(catalog),
            site_url: SiteUrlLayer::new(store),
            gzip: GzipLayer::new().min_text_len(config.gzip_min_text_len),
            content_type: ContentTypeLayer::new().api_prefix(config.api_prefix.as_str()),
        }
    }
}

impl<S> Layer<S> for StageLayer {
    type Service = StageService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        let inner = self.content_type.layer(inner);
        let inner = self.gzip.layer(inner);
        let inner = self.site_url.layer(inner);
        self.locale.layer(inner)
    }
}
