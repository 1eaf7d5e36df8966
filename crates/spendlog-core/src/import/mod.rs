//! Tabular expense import: decode, map columns, validate rows, persist in batches.

pub mod bulk;
pub mod mapping;
pub mod tabular;
pub mod validator;

pub use bulk::{BulkImportCoordinator, ImportState};
pub use mapping::{ColumnAssignment, ColumnMapper, ColumnMapping, FieldKey};
pub use tabular::{FileKind, ParsedTable, RawRow, TabularParser};
pub use validator::{DateParsingMode, RowValidator, ValidationReport, parse_amount, parse_date};
