//! Shared test utilities for docsum integration tests.
//!
//! This module provides:
//! - `TestHarness` wiring a `DocumentService` to temp storage and a stub summarizer
//! - `RecordingStore` for observing every status change
//! - Builders producing minimal PDF, DOCX and XLSX files

pub mod builders;
pub mod harness;

pub use builders::*;
pub use harness::{RecordingStore, StubBehavior, StubSummarizer, TestHarness};
