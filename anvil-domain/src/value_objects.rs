//! Value Objects for the Anvil Domain
//!
//! Immutable, validated domain primitives.
//! All value objects enforce invariants at construction time.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Domain errors for value object and entity validation
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DomainError {
    /// Platform is not in the allow-list
    #[error("Invalid platform: {0}")]
    InvalidPlatform(String),

    /// Quantity must be positive
    #[error("Invalid quantity: {0}")]
    InvalidQuantity(String),

    /// Recipe definition violates its invariants
    #[error("Invalid recipe: {0}")]
    InvalidRecipe(String),

    /// Not enough stock to remove the requested units
    #[error("Insufficient quantity of item {item_id}: need {needed}, have {available}")]
    InsufficientQuantity {
        /// Item being consumed
        item_id: i64,
        /// Units requested
        needed: u64,
        /// Units held across all quality tiers
        available: u64,
    },
}

// =============================================================================
// Platform
// =============================================================================

/// Chat platform a user identity is scoped to.
///
/// The set of variants is the platform allow-list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    /// twitch.tv
    Twitch,
    /// discord.com
    Discord,
    /// youtube.com
    Youtube,
}

impl Platform {
    /// All allowed platforms.
    pub const ALL: [Platform; 3] = [Platform::Twitch, Platform::Discord, Platform::Youtube];

    /// Wire name of the platform
    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Twitch => "twitch",
            Platform::Discord => "discord",
            Platform::Youtube => "youtube",
        }
    }
}

impl FromStr for Platform {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Platform::ALL
            .into_iter()
            .find(|p| p.as_str() == s)
            .ok_or_else(|| DomainError::InvalidPlatform(s.to_string()))
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Quality Level
// =============================================================================

/// Ordinal quality tier of a stack of items.
///
/// Tiers propagate from consumed stock to produced stock by
/// quantity-weighted averaging of their ordinal values.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QualityLevel {
    /// 0
    Cursed,
    /// 1
    Junk,
    /// 2
    Poor,
    /// 3, the tier of freshly harvested stock
    #[default]
    Common,
    /// 4
    Uncommon,
    /// 5
    Rare,
    /// 6
    Epic,
    /// 7
    Legendary,
}

impl QualityLevel {
    /// Tiers ordered by ordinal value.
    pub const TIERS: [QualityLevel; 8] = [
        QualityLevel::Cursed,
        QualityLevel::Junk,
        QualityLevel::Poor,
        QualityLevel::Common,
        QualityLevel::Uncommon,
        QualityLevel::Rare,
        QualityLevel::Epic,
        QualityLevel::Legendary,
    ];

    /// Ordinal value used for averaging (Cursed = 0 ... Legendary = 7)
    pub fn ordinal(self) -> u8 {
        self as u8
    }

    /// Tier for an ordinal value, clamped to the valid range.
    pub fn from_ordinal(value: u64) -> Self {
        let max = Self::TIERS.len() - 1;
        let index = usize::try_from(value).map_or(max, |v| v.min(max));
        Self::TIERS[index]
    }
}

impl fmt::Display for QualityLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            QualityLevel::Cursed => "CURSED",
            QualityLevel::Junk => "JUNK",
            QualityLevel::Poor => "POOR",
            QualityLevel::Common => "COMMON",
            QualityLevel::Uncommon => "UNCOMMON",
            QualityLevel::Rare => "RARE",
            QualityLevel::Epic => "EPIC",
            QualityLevel::Legendary => "LEGENDARY",
        };
        f.write_str(name)
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_platform_parse_allow_list() {
        assert_eq!("twitch".parse::<Platform>().unwrap(), Platform::Twitch);
        assert_eq!("discord".parse::<Platform>().unwrap(), Platform::Discord);
        assert_eq!("youtube".parse::<Platform>().unwrap(), Platform::Youtube);
    }

    #[test]
    fn test_platform_parse_rejects_unknown() {
        let err = "myspace".parse::<Platform>().unwrap_err();
        assert_eq!(err, DomainError::InvalidPlatform("myspace".to_string()));

        // Case sensitive, like the wire format
        assert!("Twitch".parse::<Platform>().is_err());
    }

    #[test]
    fn test_quality_ordinals() {
        assert_eq!(QualityLevel::Cursed.ordinal(), 0);
        assert_eq!(QualityLevel::Common.ordinal(), 3);
        assert_eq!(QualityLevel::Legendary.ordinal(), 7);
        assert!(QualityLevel::Rare > QualityLevel::Uncommon);
    }

    #[test]
    fn test_quality_from_ordinal_clamps() {
        assert_eq!(QualityLevel::from_ordinal(5), QualityLevel::Rare);
        assert_eq!(QualityLevel::from_ordinal(42), QualityLevel::Legendary);
        assert_eq!(QualityLevel::from_ordinal(u64::MAX), QualityLevel::Legendary);
    }

    #[test]
    fn test_quality_serialization() {
        let json = serde_json::to_string(&QualityLevel::Legendary).unwrap();
        assert_eq!(json, "\"LEGENDARY\"");

        let parsed: QualityLevel = serde_json::from_str("\"UNCOMMON\"").unwrap();
        assert_eq!(parsed, QualityLevel::Uncommon);
        assert_eq!(QualityLevel::default(), QualityLevel::Common);
    }
}
