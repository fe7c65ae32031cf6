//! Request envelope parsing and validation.
//!
//! Requests arrive as JSON. The raw document is checked against
//! `schema/request.schema.json` before it is deserialized, so type errors are
//! reported with their JSON path instead of a bare serde message.

mod parser;
mod schema;

pub use parser::VerificationRequest;
pub use schema::validate_request_schema;
