//! Claim (krav) transmission logic.
//!
//! - `types` - outbound claim records and batch references
//! - `eligibility` - which unsent lines may go out in this pass
//! - `klient` - the external ledger capabilities
//! - `sender` - grouping by case and one submission per group

pub mod eligibility;
pub mod klient;
pub mod sender;
pub mod types;

pub use eligibility::{GRACE_WINDOW, Kvalifisering, er_kvalifisert};
pub use klient::{
    Behandlingsstatus, Linjefeil, ReskontroSammenligning, SkattError, SkattKlient,
};
pub use sender::{GruppeResultat, group_by_sak, send_grupper};
pub use types::{BatchUid, Krav, KravKandidat, KravKontering, KravRequest};

#[cfg(test)]
pub use klient::MockSkattKlient;
