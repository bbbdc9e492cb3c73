//! capy-search: one ranked result list across desktop domains
//!
//! Each domain (windows, notifications, applications, devices, ...)
//! implements [`SearchDomain`]. The [`SearchAggregator`] fans a query out
//! to all of them and merges the hits by rank band.

pub mod aggregator;
pub mod domain;
pub mod rank;

pub use aggregator::{DEFAULT_MIN_TERM_LENGTH, SearchAggregator};
pub use domain::{BAND_WIDTH, CollectionDomain, DomainKind, Hit, RankBand, SearchDomain};
pub use rank::{KEYWORD_RANK, match_rank};
