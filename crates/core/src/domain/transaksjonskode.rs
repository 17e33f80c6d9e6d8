//! Transaction codes (transaksjonskoder).
//!
//! Every originating code has a correction-code counterpart that carries the
//! opposite sign. The reconciliation export derives both its tillegg/fradrag
//! flag and its F/T sign flag from these two properties.

use serde::{Deserialize, Serialize};

/// A coded transaction type carrying sign and credit/debit semantics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Transaksjonskode {
    /// Forskudd.
    A1,
    /// Correction of A1.
    A3,
    /// Bidrag.
    B1,
    /// Correction of B1.
    B3,
    /// Bidrag over 18 years.
    D1,
    /// Correction of D1.
    D3,
    /// Ektefellebidrag.
    E1,
    /// Correction of E1.
    E3,
    /// Særbidrag.
    F1,
    /// Correction of F1.
    F3,
    /// Gebyr.
    G1,
    /// Correction of G1.
    G3,
    /// Tilbakekreving.
    H1,
    /// Correction of H1.
    H3,
    /// Motregning.
    I1,
    /// Correction of I1.
    I3,
    /// Ettergivelse.
    K1,
    /// Correction of K1.
    K3,
}

impl Transaksjonskode {
    /// All codes in a stable order.
    pub const ALL: [Self; 18] = [
        Self::A1,
        Self::A3,
        Self::B1,
        Self::B3,
        Self::D1,
        Self::D3,
        Self::E1,
        Self::E3,
        Self::F1,
        Self::F3,
        Self::G1,
        Self::G3,
        Self::H1,
        Self::H3,
        Self::I1,
        Self::I3,
        Self::K1,
        Self::K3,
    ];

    /// The correction-code counterpart, if this code has one.
    #[must_use]
    pub const fn korreksjonskode(self) -> Option<Self> {
        match self {
            Self::A1 => Some(Self::A3),
            Self::B1 => Some(Self::B3),
            Self::D1 => Some(Self::D3),
            Self::E1 => Some(Self::E3),
            Self::F1 => Some(Self::F3),
            Self::G1 => Some(Self::G3),
            Self::H1 => Some(Self::H3),
            Self::I1 => Some(Self::I3),
            Self::K1 => Some(Self::K3),
            Self::A3
            | Self::B3
            | Self::D3
            | Self::E3
            | Self::F3
            | Self::G3
            | Self::H3
            | Self::I3
            | Self::K3 => None,
        }
    }

    /// True for codes whose amounts count on the credit (fradrag) side.
    #[must_use]
    pub const fn negative_amount(self) -> bool {
        matches!(
            self,
            Self::A3
                | Self::B3
                | Self::D3
                | Self::E3
                | Self::F3
                | Self::G3
                | Self::H3
                | Self::I3
                | Self::K3
        )
    }

    /// Tillegg/fradrag flag used in the reconciliation summary.
    #[must_use]
    pub const fn tillegg_eller_fradrag(self) -> &'static str {
        if self.korreksjonskode().is_some() {
            "T"
        } else {
            "F"
        }
    }

    /// Sign flag used in the reconciliation detail file.
    #[must_use]
    pub const fn fortegn(self) -> &'static str {
        if self.negative_amount() { "F" } else { "T" }
    }

    /// The two-character code.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::A1 => "A1",
            Self::A3 => "A3",
            Self::B1 => "B1",
            Self::B3 => "B3",
            Self::D1 => "D1",
            Self::D3 => "D3",
            Self::E1 => "E1",
            Self::E3 => "E3",
            Self::F1 => "F1",
            Self::F3 => "F3",
            Self::G1 => "G1",
            Self::G3 => "G3",
            Self::H1 => "H1",
            Self::H3 => "H3",
            Self::I1 => "I1",
            Self::I3 => "I3",
            Self::K1 => "K1",
            Self::K3 => "K3",
        }
    }
}

impl std::fmt::Display for Transaksjonskode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Transaksjonskode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|code| code.as_str() == s)
            .ok_or_else(|| format!("Unknown transaksjonskode: {s}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_counterpart_has_opposite_sign() {
        for code in Transaksjonskode::ALL {
            if let Some(korreksjon) = code.korreksjonskode() {
                assert!(!code.negative_amount(), "{code} should be positive");
                assert!(korreksjon.negative_amount(), "{korreksjon} should be negative");
                assert!(korreksjon.korreksjonskode().is_none());
            }
        }
    }

    #[test]
    fn test_flags_agree() {
        for code in Transaksjonskode::ALL {
            let has_counterpart = code.korreksjonskode().is_some();
            assert_eq!(code.tillegg_eller_fradrag() == "T", has_counterpart);
        }
        assert_eq!(Transaksjonskode::I1.fortegn(), "T");
        assert_eq!(Transaksjonskode::I1.tillegg_eller_fradrag(), "T");
        assert_eq!(Transaksjonskode::B3.fortegn(), "F");
    }

    #[test]
    fn test_round_trip_str() {
        for code in Transaksjonskode::ALL {
            assert_eq!(Transaksjonskode::from_str(code.as_str()).unwrap(), code);
        }
        assert!(Transaksjonskode::from_str("Z9").is_err());
    }
}
