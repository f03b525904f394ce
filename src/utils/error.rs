// src/utils/error.rs
#![allow(dead_code)]
use thiserror::Error;

// Define specific error types for different parts of the application
#[derive(Error, Debug)]
pub enum PdfError {
    #[error("Failed to open document: {0}")]
    Open(String),

    #[error("Failed to load page {0}: {1}")]
    Page(usize, String),

    #[error("Failed to render page {0}: {1}")]
    Render(usize, String),

    #[error("Text extraction failed on page {0}: {1}")]
    Text(usize, String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Error, Debug)]
pub enum OracleError {
    #[error("Network request failed: {0}")]
    Network(#[from] reqwest::Error), // Automatically convert reqwest errors

    #[error("HTTP error: {0}")]
    Http(reqwest::StatusCode), // e.g., 429 Too Many Requests, 403 Forbidden

    #[error("Oracle returned no candidates")]
    EmptyResponse,

    #[error("Oracle reply is not valid JSON: {0}")]
    MalformedJson(String),

    #[error("Oracle reply failed schema validation: {0}")]
    InvalidSchema(String),
}

#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("No candidate page produced a TOC mapping")]
    TocExtractionFailed,

    #[error("Section '{section}' start page {page} is outside the document (length {len})")]
    PageOutOfRange {
        section: String,
        page: i64,
        len: usize,
    },

    #[error("Failed to read content for section '{section}': {reason}")]
    ContentFailed { section: String, reason: String },
}

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Remote store request failed: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Remote store HTTP error {0} for key {1}")]
    Http(reqwest::StatusCode, String),

    #[error("Object not found: {0}")]
    NotFound(String),
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error), // Automatically convert IO errors

    #[error("PDF handling failed: {0}")]
    Pdf(#[from] PdfError),

    #[error("Oracle interaction failed: {0}")]
    Oracle(#[from] OracleError),

    #[error("Extraction failed: {0}")]
    Extraction(#[from] ExtractError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Data processing failed: {0}")]
    Processing(String),
}
