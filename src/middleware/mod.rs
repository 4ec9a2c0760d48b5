//! Cross-cutting HTTP middleware applied to the whole router.

pub mod trace;

pub use trace::SanitizedMakeSpan;
