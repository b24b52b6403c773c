//! XMLTV guide parsing
//!
//! Contains the streaming parser and the wire timestamp codec.

mod parser;
pub mod time;

pub use parser::{parse_reader, parse_str, Channel, EpisodeNum, Programme};
