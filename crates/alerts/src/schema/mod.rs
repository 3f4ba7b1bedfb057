//! YAML schema for alert subscription documents.
//!
//! A subscription names the detectors it follows (`subscribedIds`), the
//! pipeline generation those ids belong to (`mode`), the recipients per
//! channel, an optional schedule and the committed watermarks.

mod metadata;
mod subscription;

pub use metadata::*;
pub use subscription::*;
