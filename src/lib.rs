//! Field normalization and bidirectional issue sync across heterogeneous
//! bug trackers.
//!
//! Each tracker family is wrapped in a [`platforms::TrackerPlatform`]
//! adapter that translates between the host's canonical field model
//! ([`model`]) and the tracker's wire conventions: schema discovery and
//! normalization ([`schema`]), rich-text dialects ([`richtext`]), status
//! workflows ([`status`]), attachment reconciliation ([`attachment`]) and
//! paginated sync loops ([`sync`]). Best-effort side effects run on a
//! per-adapter [`tasks::TaskQueue`] so primary writes return early.

pub mod attachment;
pub mod config;
pub mod error;
pub mod files;
pub mod model;
pub mod platforms;
pub mod richtext;
pub mod schema;
pub mod status;
pub mod sync;
pub mod tasks;
pub mod transport;

pub use config::SyncConfig;
pub use error::{Error, Result};
pub use platforms::{create_platforms, OptionKind, TrackerPlatform};
