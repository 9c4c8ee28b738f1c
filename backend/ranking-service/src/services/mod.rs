pub mod data_access;
pub mod ranking;
pub mod selection;
pub mod sponsor;

pub use data_access::DataAccessError;
pub use ranking::{RankingError, RankingService};
pub use selection::WeightedRandomSelector;
pub use sponsor::{SponsorError, SponsorSelectionService};
