//! Entity trait: identity + continuity across state changes.

/// Entity marker + minimal interface.
///
/// Accounts and journal transactions are entities: their balances and statuses
/// change over time while the identifier stays fixed.
pub trait Entity {
    /// Strongly-typed entity identifier.
    type Id: Clone + Eq + core::hash::Hash + core::fmt::Debug;

    /// Returns the entity identifier.
    fn id(&self) -> &Self::Id;
}
