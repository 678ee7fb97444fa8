//! # idra-media
//!
//! Time-bounded store for uploaded image artifacts.
//!
//! Uploads accept inline bytes, a remote URL, or a local path, and hand back
//! an opaque `img_…` identifier valid for one hour. Expiry is a pure
//! function of `(now, created_at, ttl)` enforced lazily at resolve time;
//! expired records are indistinguishable from ones that never existed.

pub mod cache;
pub mod fetch;

pub use cache::{ImageCache, ImagePayload, ResolvedImage, UploadReceipt};
pub use fetch::{ImageFetcher, ImageSource};
