//! Typed identifiers.
//!
//! Stores only ever hold copies of each other's identifiers, never live
//! references. Each entity gets its own wrapper so a member id cannot be
//! passed where a book id is expected.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{AppError, AppResult};

macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident, $entity:literal) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord,
            Serialize, Deserialize, sqlx::Type, utoipa::ToSchema,
        )]
        #[serde(transparent)]
        #[sqlx(transparent)]
        pub struct $name(#[schema(value_type = String, format = Uuid)] Uuid);

        impl $name {
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            pub fn as_uuid(&self) -> Uuid {
                self.0
            }

            /// Resolve a client-supplied identifier field.
            ///
            /// A missing or blank value is a `MissingField`; a value that is not a
            /// well-formed identifier cannot name an existing record and is reported
            /// as `NotFound`.
            pub fn parse_field(value: Option<&str>, field: &'static str) -> AppResult<Self> {
                let raw = value
                    .map(str::trim)
                    .filter(|v| !v.is_empty())
                    .ok_or(AppError::MissingField(field))?;
                raw.parse()
                    .map_err(|_| AppError::NotFound(format!("{} {} not found", $entity, raw)))
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl From<Uuid> for $name {
            fn from(id: Uuid) -> Self {
                Self(id)
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl std::str::FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Uuid::parse_str(s).map(Self)
            }
        }
    };
}

define_id!(
    /// Identity of a catalog book
    BookId,
    "Book"
);
define_id!(
    /// Identity of a library member
    MemberId,
    "Member"
);
define_id!(
    /// Identity of a credential (login) record
    UserId,
    "User"
);
define_id!(
    /// Identity of a loan ledger row
    LoanId,
    "Loan"
);
