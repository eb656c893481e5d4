//! Reading the bulletin page: row extraction and timestamp normalization.

pub mod datetime;
pub mod table;

pub use datetime::parse_bulletin_datetime;
pub use table::{extract_rows, locate_bulletin_table, BulletinRows, BULLETIN_COLUMNS};
