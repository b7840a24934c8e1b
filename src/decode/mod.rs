//! Record extraction module
//!
//! # Overview
//!
//! Turns a decoded JSON response body into the list of records it carries.
//! With a `data_selector` the records are read at that path (dotted paths,
//! `[n]` indexing, or JSONPath when the selector contains `*`); without one
//! the record array is detected from the shape of the envelope.

mod decoders;

pub use decoders::{JsonDecoder, PREFERRED_RECORD_KEYS};
