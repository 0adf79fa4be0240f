pub mod encoding;
pub mod header;
pub mod index;
#[cfg(feature = "xbrl-feed")]
pub mod rss;
pub mod submission;
pub mod utils;
pub mod uue;
