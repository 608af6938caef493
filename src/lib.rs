#![deny(missing_docs)]

//! Core library for the pdfocr text extraction service.

/// HTTP routing and REST handlers.
pub mod api;
/// Environment-driven configuration management.
pub mod config;
/// Structured logging and tracing setup.
pub mod logging;
/// Extraction metrics helpers.
pub mod metrics;
/// Job lifecycle and the extraction cascade.
pub mod processing;
/// External executables behind capability traits.
pub mod toolchain;
