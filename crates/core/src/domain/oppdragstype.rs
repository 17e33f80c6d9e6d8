//! Obligation types (stønadstyper and engangsbeløpstyper).

use serde::{Deserialize, Serialize};

use super::transaksjonskode::Transaksjonskode;

/// The claim type of an obligation.
///
/// Recurring support types and one-off amounts share one enum, since both
/// become an Oppdrag keyed by type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Oppdragstype {
    /// Advance payment of child support.
    Forskudd,
    /// Child support.
    Bidrag,
    /// Child support after the child turns 18.
    #[serde(rename = "BIDRAG18AAR")]
    Bidrag18Aar,
    /// Spousal support.
    Ektefellebidrag,
    /// One-off special contribution.
    Saertilskudd,
    /// Fee charged to the recipient.
    GebyrMottaker,
    /// Fee charged to the payer.
    GebyrSkyldner,
    /// Recovery of an overpaid amount.
    Tilbakekreving,
    /// Offset against another claim.
    Motregning,
    /// Waived debt.
    Ettergivelse,
}

impl Oppdragstype {
    /// All types in a stable order.
    pub const ALL: [Self; 10] = [
        Self::Forskudd,
        Self::Bidrag,
        Self::Bidrag18Aar,
        Self::Ektefellebidrag,
        Self::Saertilskudd,
        Self::GebyrMottaker,
        Self::GebyrSkyldner,
        Self::Tilbakekreving,
        Self::Motregning,
        Self::Ettergivelse,
    ];

    /// The originating transaction code for new lines of this type.
    #[must_use]
    pub const fn transaksjonskode(self) -> Transaksjonskode {
        match self {
            Self::Forskudd => Transaksjonskode::A1,
            Self::Bidrag => Transaksjonskode::B1,
            Self::Bidrag18Aar => Transaksjonskode::D1,
            Self::Ektefellebidrag => Transaksjonskode::E1,
            Self::Saertilskudd => Transaksjonskode::F1,
            Self::GebyrMottaker | Self::GebyrSkyldner => Transaksjonskode::G1,
            Self::Tilbakekreving => Transaksjonskode::H1,
            Self::Motregning => Transaksjonskode::I1,
            Self::Ettergivelse => Transaksjonskode::K1,
        }
    }

    /// Code for a line with the given amount; negative amounts use the correction code.
    #[must_use]
    pub fn transaksjonskode_for(self, negative: bool) -> Transaksjonskode {
        let kode = self.transaksjonskode();
        if negative {
            kode.korreksjonskode().unwrap_or(kode)
        } else {
            kode
        }
    }

    /// The persisted name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Forskudd => "FORSKUDD",
            Self::Bidrag => "BIDRAG",
            Self::Bidrag18Aar => "BIDRAG18AAR",
            Self::Ektefellebidrag => "EKTEFELLEBIDRAG",
            Self::Saertilskudd => "SAERTILSKUDD",
            Self::GebyrMottaker => "GEBYR_MOTTAKER",
            Self::GebyrSkyldner => "GEBYR_SKYLDNER",
            Self::Tilbakekreving => "TILBAKEKREVING",
            Self::Motregning => "MOTREGNING",
            Self::Ettergivelse => "ETTERGIVELSE",
        }
    }
}

impl std::fmt::Display for Oppdragstype {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Oppdragstype {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| format!("Unknown oppdragstype: {s}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_fees_share_code() {
        assert_eq!(Oppdragstype::GebyrMottaker.transaksjonskode(), Transaksjonskode::G1);
        assert_eq!(Oppdragstype::GebyrSkyldner.transaksjonskode(), Transaksjonskode::G1);
    }

    #[test]
    fn test_negative_amount_uses_correction_code() {
        assert_eq!(
            Oppdragstype::Bidrag.transaksjonskode_for(true),
            Transaksjonskode::B3
        );
        assert_eq!(
            Oppdragstype::Bidrag.transaksjonskode_for(false),
            Transaksjonskode::B1
        );
    }

    #[test]
    fn test_serde_names_match_persisted_names() {
        for t in Oppdragstype::ALL {
            let json = serde_json::to_string(&t).unwrap();
            assert_eq!(json, format!("\"{}\"", t.as_str()));
            assert_eq!(Oppdragstype::from_str(t.as_str()).unwrap(), t);
        }
    }
}
