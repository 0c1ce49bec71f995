//! Template engine: sources, variables, rendering, and deck assembly

pub mod deck;
pub mod engine;
pub mod errors;
pub mod functions;
pub mod source;
pub mod vars;

pub use deck::{merge_deck, parse_deck_spec, DeckSection};
pub use engine::{MissingKeyPolicy, TemplateEngine, NO_VALUE};
pub use errors::TemplateError;
pub use source::TemplateSource;
pub use vars::VariableMap;
