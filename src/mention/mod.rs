//! `@Name` mention resolution against the member directory.

pub mod controller;
pub mod model;
pub mod parser;

pub use model::Mention;
pub use parser::{
    format_mention_text, mention_ids, parse_mentions, render_comment_html, suggest_mentions,
};
