//! Currency of decided amounts.
//!
//! Amounts are `rust_decimal::Decimal` and carried as decided; no conversion
//! between currencies is ever performed.

use serde::{Deserialize, Serialize};

/// ISO 4217 currency codes accepted on decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    /// Norwegian krone
    Nok,
    /// Swedish krona
    Sek,
    /// Danish krone
    Dkk,
    /// Euro
    Eur,
    /// Pound sterling
    Gbp,
    /// US Dollar
    Usd,
}

impl Currency {
    /// Returns the ISO code.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::Nok => "NOK",
            Self::Sek => "SEK",
            Self::Dkk => "DKK",
            Self::Eur => "EUR",
            Self::Gbp => "GBP",
            Self::Usd => "USD",
        }
    }
}

impl std::fmt::Display for Currency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}

impl std::str::FromStr for Currency {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "NOK" => Ok(Self::Nok),
            "SEK" => Ok(Self::Sek),
            "DKK" => Ok(Self::Dkk),
            "EUR" => Ok(Self::Eur),
            "GBP" => Ok(Self::Gbp),
            "USD" => Ok(Self::Usd),
            _ => Err(format!("Unknown currency: {s}")),
        }
    }
}
