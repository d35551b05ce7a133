//! Decoding of the analysis event stream.
//!
//! Server-sent-event framing is handled by `eventsource-stream`; the
//! decoder turns each event's payload into ordered, typed `StreamUpdate`s.

pub mod decoder;

pub use decoder::{MAX_EVENT_BYTES, StreamDecoder};
