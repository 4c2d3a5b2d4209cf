//! Conversion entre enveloppes et valeurs typées, dans les deux sens.
//!
//! ```text
//! Envelope ──RequestMarshaller──▶ Option<Payload> ──provider──▶ Output ──ResponseMarshaller──▶ Envelope
//! ```

mod request;
mod response;

pub use request::RequestMarshaller;
pub use response::{Output, ResponseMarshaller};
