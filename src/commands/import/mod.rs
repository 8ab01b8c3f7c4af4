mod db;
mod fetch;
mod imaging;
mod layout;
mod markup;
mod node;
mod run;

pub use run::run;

pub(crate) use db::{count_rows, load_article_nodes, load_body_field, open_connection};
pub(crate) use layout::{ImageStyle, OutputLayout, page_base_name};
pub(crate) use markup::MarkupPatterns;
