//! PDF object model: primitives, dictionaries, strings and streams.

mod date;
mod dictionary;
mod primitive;
mod stream;
mod string;

pub use date::{format_pdf_date, parse_pdf_date};
pub use dictionary::Dictionary;
pub use primitive::{Object, ObjectId};
pub use stream::{Stream, StreamKind};
pub use string::{PdfString, StringFormat};
