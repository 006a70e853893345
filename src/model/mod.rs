//! Typed wire model of the document creation request.
//!
//! Values are checked when built; [`Validate`] re-checks the string fields a
//! caller can still reach through the public struct fields.

mod document;
mod inn;
mod product;
mod validation;

pub use document::{Description, Document, DocumentRequest, DocumentStatus, DocumentType};
pub use inn::TaxpayerId;
pub use product::Product;
pub use validation::{Validate, ValidationError};
