//! Gzip response compression.

mod body;
mod codec;
mod future;
mod layer;
mod service;

pub use body::GzipBody;
pub use codec::accepts_gzip;
pub use future::ResponseFuture;
pub use layer::{DEFAULT_MIN_TEXT_LEN, GzipLayer};
pub use service::GzipService;
