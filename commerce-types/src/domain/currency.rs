//! Currency domain model.

use serde::{Deserialize, Serialize};

/// A currency the store can price in.
///
/// Currencies are seeded by migration and only a few of their attributes are
/// mutable at runtime.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Currency {
    /// Lower-case ISO 4217 code, e.g. `usd`
    pub code: String,
    /// Symbol used internationally, e.g. `US$`
    pub symbol: String,
    /// Symbol used in the currency's home market, e.g. `$`
    pub symbol_native: String,
    /// Human-readable name
    pub name: String,
    /// Whether prices in this currency are tax inclusive
    pub includes_tax: bool,
}

impl Currency {
    /// Normalizes a currency code for lookups.
    pub fn normalize_code(code: &str) -> String {
        code.trim().to_lowercase()
    }

    /// Returns true if `q` matches this currency's code or name.
    pub fn matches(&self, q: &str) -> bool {
        let q = q.to_lowercase();
        self.code.contains(&q) || self.name.to_lowercase().contains(&q)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn usd() -> Currency {
        Currency {
            code: "usd".into(),
            symbol: "$".into(),
            symbol_native: "$".into(),
            name: "US Dollar".into(),
            includes_tax: false,
        }
    }

    #[test]
    fn test_normalize_code() {
        assert_eq!(Currency::normalize_code(" USD "), "usd");
    }

    #[test]
    fn test_matches_code_and_name() {
        let currency = usd();
        assert!(currency.matches("US"));
        assert!(currency.matches("dollar"));
        assert!(!currency.matches("euro"));
    }
}
