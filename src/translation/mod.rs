//! # Translation Module
//!
//! Isolates the one external network collaborator this service depends on:
//! the text-translation endpoint. The rest of the relay only sees a total
//! `translate` call that always produces displayable text.
//!
//! ## Key Components:
//! - **Translation Client**: one HTTP request per transcript, with a hard
//!   timeout and an unconditional fallback to the original text
//!
//! ## Why the isolation matters:
//! The translation call is the only suspending step in transcript handling.
//! Keeping it behind this module guarantees it can never straddle a registry
//! lock and that its failures can never propagate past the transcript that
//! triggered them.

pub mod client;  // HTTP client with total fallback

pub use client::{TranslationClient, TranslationOutcome};
