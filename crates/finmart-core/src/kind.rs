//! Submission kinds and the static routing table.
//!
//! Every [`Kind`] maps to exactly one destination collection and an
//! authentication requirement. The match in [`Kind::route`] is exhaustive, so
//! adding a kind without a route does not compile.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString, IntoStaticStr};

use crate::{Error, Result};

// ─── Collection names ────────────────────────────────────────────────────────

/// Collection names are part of the storage contract; renaming one orphans
/// existing data.
pub mod collections {
  pub const ADMIN_LOANS: &str = "admin_loans";
  pub const ADMIN_INSURANCE: &str = "admin_insurance";
  pub const ADMIN_MESSAGES: &str = "admin_messages";
  pub const OTHER_DATA: &str = "other_data";
  pub const LOAN_APPLICATIONS: &str = "loan_applications";
  pub const INSURANCE_APPLICATIONS: &str = "insurance_applications";
  pub const DATA_TMP: &str = "data_tmp";
  pub const CIBIL_SCORE: &str = "cibil_score";

  /// Approved-store collections.
  pub const APPROVED_LOANS: &str = "approved_loans";
  pub const APPROVED_INSURANCE: &str = "approved_insurance";

  /// Whether `name` lives in the approved store rather than the pending one.
  pub fn is_approved(name: &str) -> bool {
    matches!(name, APPROVED_LOANS | APPROVED_INSURANCE)
  }
}

// ─── Kind ────────────────────────────────────────────────────────────────────

/// The closed set of form submission categories.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Hash,
  Serialize,
  Deserialize,
  Display,
  EnumIter,
  EnumString,
  IntoStaticStr,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum Kind {
  Loan,
  Insurance,
  Contact,
  CreditCard,
  UserLoan,
  UserInsurance,
  /// Support tickets and chat transcripts share a destination.
  #[serde(alias = "chat")]
  #[strum(to_string = "ticket", serialize = "chat")]
  Ticket,
  CreditScoreCheck,
}

/// Where a submission of a given kind is written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Route {
  pub collection:    &'static str,
  pub requires_auth: bool,
}

impl Kind {
  /// Every kind, in routing-table order.
  pub const ALL: [Kind; 8] = [
    Self::Loan,
    Self::Insurance,
    Self::Contact,
    Self::CreditCard,
    Self::UserLoan,
    Self::UserInsurance,
    Self::Ticket,
    Self::CreditScoreCheck,
  ];

  /// Resolve the destination collection and auth requirement.
  pub const fn route(self) -> Route {
    use collections::*;
    let (collection, requires_auth) = match self {
      Self::Loan => (ADMIN_LOANS, false),
      Self::Insurance => (ADMIN_INSURANCE, false),
      Self::Contact => (ADMIN_MESSAGES, false),
      Self::CreditCard => (OTHER_DATA, false),
      Self::UserLoan => (LOAN_APPLICATIONS, true),
      Self::UserInsurance => (INSURANCE_APPLICATIONS, true),
      Self::Ticket => (DATA_TMP, true),
      Self::CreditScoreCheck => (CIBIL_SCORE, false),
    };
    Route { collection, requires_auth }
  }

  /// The wire name, e.g. `"credit-card"`.
  pub fn as_str(self) -> &'static str { self.into() }

  /// Parse a wire name. Anything outside the enumeration is rejected rather
  /// than routed to a fallback collection.
  pub fn parse(name: &str) -> Result<Self> {
    name
      .parse()
      .map_err(|_| Error::UnknownKind(name.to_owned()))
  }

  /// The aggregation family, for kinds that have an approved-store
  /// counterpart.
  pub fn family(self) -> Option<Family> {
    match self {
      Self::UserLoan => Some(Family::Loan),
      Self::UserInsurance => Some(Family::Insurance),
      _ => None,
    }
  }
}

/// Route a kind by its wire name in one step.
pub fn route(name: &str) -> Result<(Kind, Route)> {
  let kind = Kind::parse(name)?;
  Ok((kind, kind.route()))
}

// ─── Family ──────────────────────────────────────────────────────────────────

/// A lifecycle pairing of a pending collection with its approved counterpart.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, EnumIter,
)]
#[serde(rename_all = "lowercase")]
pub enum Family {
  Loan,
  Insurance,
}

impl Family {
  /// The user-facing kind whose submissions belong to this family.
  pub const fn kind(self) -> Kind {
    match self {
      Self::Loan => Kind::UserLoan,
      Self::Insurance => Kind::UserInsurance,
    }
  }

  pub const fn pending_collection(self) -> &'static str {
    self.kind().route().collection
  }

  pub const fn approved_collection(self) -> &'static str {
    match self {
      Self::Loan => collections::APPROVED_LOANS,
      Self::Insurance => collections::APPROVED_INSURANCE,
    }
  }
}
