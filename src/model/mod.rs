pub mod field;
pub mod record;

pub use field::{CanonicalField, FieldOption, FieldType, FieldValue, SearchMethod};
pub use record::{
    AttachmentRef, KnownRecord, RecordDraft, RecordHandle, StatusOption, SyncBatch, SyncOutcome,
    SyncRecord,
};
