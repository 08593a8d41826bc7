pub mod catalog;
pub mod config;
pub mod error;
pub mod links;
pub mod logging;
pub mod notation;
pub mod search;

pub use catalog::model::{AdminAction, Pattern, Progression, ProgressionDraft, Status};
pub use catalog::store::Catalog;
pub use config::Config;
pub use error::{Error, Result};
pub use notation::{ChordOptions, ChordSymbol, chord_options, normalize_chord};
pub use search::{
    format_measures, normalize_chords_for_search, normalize_search_query, search_in_normalized,
};
