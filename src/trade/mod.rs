//! Trade offers between users and the matching between them.

pub mod book;
pub mod parser;

pub use book::{Offer, OfferId, ProcessedMatches, SearchHit, Selection, TradeBook, TradeMatch, Trader};
pub use parser::{clean_entity_list, CleanedList};
