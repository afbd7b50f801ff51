//! A set of built-in tools that models can use.

mod search;

pub use search::{SearchParameters, TavilySearchTool};
