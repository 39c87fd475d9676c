//! Unified token records built from the list and overview feeds

pub mod feeds;
pub mod merge;
pub mod record;
pub mod service;

pub use feeds::{ListFeed, MarketPage, OverviewFeed, TokenListPage};
pub use merge::{FIELD_TABLE, FieldClass, Precedence, field_class, merge, precedence};
pub use record::{DataSource, FeedSource, TokenData, TokenExtensions, UnifiedTokenRecord};
pub use service::TokenCache;
