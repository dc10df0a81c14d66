#![warn(clippy::all)]
//! Reading and writing of classified patch clouds.
//!
//! The [ascii] module reads and writes the tab separated text format, the [base] module holds the reader and
//! writer traits together with convenience functions that pick a format from the file extension.

pub mod ascii;
pub mod base;
