// No need to be as strict as in production libraries
#![allow(clippy::unwrap_used)]

#[macro_use]
mod macros;

#[doc(hidden)]
pub use paste::paste;
