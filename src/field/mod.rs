//! Typed column values over raw row buffers.
//!
//! A [`base::Field`] describes one column (type, length, flags) and where
//! its bytes and null bit live in a [`row::RowBuffer`]. Every operation takes
//! the buffer explicitly, so one field definition serves `record[0]`,
//! `record[1]` and the default-values record alike.
//!
//! Start with [`schema::TableSchema`] to lay out a table, then use the field
//! methods to store, read, compare and build sort keys.

pub mod base;
pub mod bit;
pub mod charset;
pub mod codec;
pub mod copy;
pub mod decimal;
pub mod doc_field;
pub mod document;
pub mod numeric;
pub mod replication;
pub mod row;
pub mod schema;
pub mod session;
pub mod status;
pub mod string;
pub mod temporal;
pub mod time;
pub mod types;
