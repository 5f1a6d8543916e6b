//! Provider adapters for external media generation back-ends.
//!
//! - [`ProviderAdapter`]: the submit/poll contract every back-end implements.
//! - [`ProviderError`]: typed failure of a provider call.
//! - [`ProviderRegistry`]: immutable map of registered adapters.
//! - Concrete adapters: [`sora`], [`kling`], [`hailuo`] (video) and
//!   [`image`] (synchronous image generation).

pub mod adapter;
pub mod error;
pub mod hailuo;
pub mod http;
pub mod image;
pub mod kling;
pub mod registry;
pub mod sora;

pub use adapter::{ProviderAdapter, SubmitRequest, SubmitResponse};
pub use error::{ProviderError, ProviderErrorCode};
pub use registry::{ProviderRegistry, ProviderSettings};
