//! Domain models for Divergent Flow.
//!
//! # Core Concepts
//!
//! - [`Capture`]: A short timestamped note, optionally classified as a
//!   note, action, or reminder. Exposed over HTTP as both a "capture" and an
//!   "item".
//! - [`Collection`]: A named, ordered list of capture ids.
//! - [`TypeInference`]: The classification suggested for a piece of text.
//! - [`TypeConfirmation`]: A user's correction of a suggested classification.
//!
//! All models serialize with camelCase field names. That JSON shape is both
//! the HTTP representation and the storage representation written to the
//! projection store.

mod capture;
mod collection;
mod inference;

pub use capture::*;
pub use collection::*;
pub use inference::*;

/// Milliseconds since the Unix epoch, used for every `created_at` field.
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// A fresh opaque identifier for a new entity.
pub fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}
