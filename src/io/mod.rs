//! File-backed [`crate::writer::Writer`] implementations.

#[cfg(feature = "csv")]
pub mod csv;
