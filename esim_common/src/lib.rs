mod cents;
mod helpers;

pub mod op;
mod secret;

pub use cents::{Cents, CentsConversionError, DEFAULT_CURRENCY_CODE};
pub use helpers::{parse_boolean_flag, parse_list};
pub use secret::Secret;
