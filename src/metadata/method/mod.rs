//! CIL method body layout: headers, exception clauses and their flags.
//!
//! The decoder itself only consumes raw code bytes. This module locates those bytes inside a
//! complete method body as stored in a PE image and exposes the surrounding header data.
//!
//! - [`MethodBody`] - Tiny/fat header parsing and exception section discovery
//! - [`ExceptionHandler`] - One try/handler region
//! - [`MethodBodyFlags`], [`SectionFlags`], [`ExceptionHandlerFlags`] - Raw flag sets

mod body;
mod exceptions;
mod types;

pub use body::MethodBody;
pub use exceptions::{ExceptionHandler, ExceptionHandlerFlags};
pub use types::*;
