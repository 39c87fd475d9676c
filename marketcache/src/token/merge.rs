//! Field-ownership merge of partial token updates
//!
//! Every field belongs to a class, and each `(class, source)` pair decides
//! whether the incoming or the existing value wins. The list feed owns hot
//! market fields, the overview feed owns everything else.

use super::record::{DataSource, FeedSource, TokenData, UnifiedTokenRecord};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldClass {
    /// Primary key, never replaced once set
    Identity,
    Descriptive,
    Hot,
    Cold,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Precedence {
    IncomingFirst,
    ExistingFirst,
}

/// Which side wins for a field of `class` updated from `source`
pub const fn precedence(class: FieldClass, source: FeedSource) -> Precedence {
    match (class, source) {
        (FieldClass::Identity, _) => Precedence::ExistingFirst,
        (FieldClass::Hot, FeedSource::Overview) => Precedence::ExistingFirst,
        (FieldClass::Hot, FeedSource::List) => Precedence::IncomingFirst,
        (FieldClass::Descriptive | FieldClass::Cold, _) => Precedence::IncomingFirst,
    }
}

fn pick<T: Clone>(existing: &Option<T>, incoming: &Option<T>, precedence: Precedence) -> Option<T> {
    match precedence {
        Precedence::IncomingFirst => incoming.clone().or_else(|| existing.clone()),
        Precedence::ExistingFirst => existing.clone().or_else(|| incoming.clone()),
    }
}

macro_rules! field_table {
    ($($field:ident => $class:ident),* $(,)?) => {
        /// `(TokenData field name, class)` for every token field
        pub const FIELD_TABLE: &[(&str, FieldClass)] = &[
            $((stringify!($field), FieldClass::$class)),*
        ];

        fn merge_fields(existing: &TokenData, incoming: &TokenData, source: FeedSource) -> TokenData {
            TokenData {
                $($field: pick(
                    &existing.$field,
                    &incoming.$field,
                    precedence(FieldClass::$class, source),
                ),)*
            }
        }
    };
}

field_table! {
    address => Identity,
    symbol => Descriptive,
    name => Descriptive,
    logo_uri => Descriptive,
    extensions => Descriptive,
    price => Hot,
    price_change_24h_percent => Hot,
    v24h_usd => Hot,
    market_cap => Hot,
    liquidity => Cold,
    holder => Cold,
    decimals => Cold,
    fdv => Cold,
    total_supply => Cold,
    circulating_supply => Cold,
    trade24h => Cold,
    buy24h => Cold,
    sell24h => Cold,
    unique_wallet24h => Cold,
}

/// Class of a field by its Rust name
pub fn field_class(field: &str) -> Option<FieldClass> {
    FIELD_TABLE
        .iter()
        .find(|(name, _)| *name == field)
        .map(|(_, class)| *class)
}

fn next_source(existing: DataSource, source: FeedSource) -> DataSource {
    match (existing, source) {
        (_, FeedSource::Overview) => DataSource::Merged,
        (DataSource::List, FeedSource::List) => DataSource::List,
        (DataSource::Overview | DataSource::Merged, FeedSource::List) => DataSource::Merged,
    }
}

/// Fold `incoming` from `source` into `existing`.
///
/// `last_updated` is `now_millis`, bumped past the previous stamp if the
/// clock has not moved.
pub fn merge(
    existing: Option<&UnifiedTokenRecord>,
    incoming: &TokenData,
    source: FeedSource,
    now_millis: i64,
) -> UnifiedTokenRecord {
    match existing {
        None => UnifiedTokenRecord {
            data: incoming.clone(),
            last_updated: now_millis,
            data_source: source.into(),
        },
        Some(existing) => UnifiedTokenRecord {
            data: merge_fields(&existing.data, incoming, source),
            last_updated: now_millis.max(existing.last_updated.saturating_add(1)),
            data_source: next_source(existing.data_source, source),
        },
    }
}
