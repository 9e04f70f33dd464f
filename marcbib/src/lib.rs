#![forbid(unsafe_code)]

//! Read-oriented tools for MARC21 bibliographic records: a lightweight
//! record model plus a streaming MARCXML reader that yields one record
//! at a time from arbitrarily large files.

pub use self::record::BibRecord;
pub use self::record::ControlField;
pub use self::record::DataField;
pub use self::record::Subfield;
pub use self::xml::MARCXML_NAMESPACE;
pub use self::xml::RecordStream;

pub mod record;
pub mod xml;
