//! Redub - Fault-tolerant video narration translation
//!
//! Turns a source video into one dubbed video per target language: the
//! narration is split into chunks, each chunk is recognized, translated and
//! voiced through pluggable services, and the new audio is muxed back under
//! the untouched picture. Every external tool and service call has a
//! fallback, so partial failures degrade the output instead of losing it.

pub mod batch;
pub mod chunking;
pub mod cli;
pub mod config;
pub mod error;
pub mod job;
pub mod media;
pub mod pipeline;
pub mod retry;
pub mod storage;
pub mod synthesize;
pub mod transcribe;
pub mod translate;
