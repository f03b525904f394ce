// src/oracle/mod.rs
pub mod client;
pub mod models;
pub mod prompts;

pub use client::{GeminiClient, OraclePayload, SectionOracle};
