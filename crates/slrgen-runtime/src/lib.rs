//! Runtime implementation for `slrgen` parse tables.

pub mod definition;
pub mod parser;

pub use crate::{
    definition::{ParseAction, ParseTable},
    parser::{Accepted, ParseError, ParseItem, Parser, Token},
};
