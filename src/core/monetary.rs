/// Monetary constants for the chain
///
/// Amounts are integer base units; one coin is 100,000,000 base units, so
/// every amount is an exact decimal with eight fractional digits.
///
/// Number of base units in one coin
pub const BASE_UNITS_PER_COIN: u64 = 100_000_000;

/// Fixed reward paid to the miner of every block (50 coins)
pub const MINING_REWARD: u64 = 50 * BASE_UNITS_PER_COIN;

/// Note carried by every reward transaction
pub const MINER_REWARD_DATA: &str = "Miner Reward.";

/// Utility functions for monetary conversions
pub mod conversions {
    use super::*;

    /// Format base units as an exact decimal coin amount
    ///
    /// # Examples
    /// ```
    /// use powchain_node::core::monetary::conversions::format_base_units;
    /// assert_eq!(format_base_units(100_000_000), "1.00000000 coins");
    /// assert_eq!(format_base_units(1_000), "0.00001000 coins");
    /// ```
    pub fn format_base_units(units: u64) -> String {
        format!(
            "{}.{:08} coins",
            units / BASE_UNITS_PER_COIN,
            units % BASE_UNITS_PER_COIN
        )
    }

    /// Whole coins to base units, `None` on overflow
    pub fn coins_to_base_units(coins: u64) -> Option<u64> {
        coins.checked_mul(BASE_UNITS_PER_COIN)
    }
}
