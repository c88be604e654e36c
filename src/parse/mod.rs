//! Readers and writers for persisted splines.

pub mod spline_xml;

pub use spline_xml::{ParseError, ParseResult, parse_str, to_string};
