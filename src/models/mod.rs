mod album;
mod output;

pub use album::{AlbumRecord, CoverRef};
pub use output::{CoverSource, Outcome, OutcomeStatus, OutputRecord};
