//! Reporting aggregates

use rust_decimal::Decimal;
use serde::Serialize;
use utoipa::ToSchema;

use super::{ids::MemberId, loan::LoanRecord, member::Member};

/// Number of ledger rows recorded for one member
#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::FromRow)]
pub struct MemberLoanCount {
    pub member_id: MemberId,
    pub borrow_count: i64,
}

/// Entry of the active-members report.
///
/// `member` is null when the member record was deleted after borrowing.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ActiveMember {
    pub member_id: MemberId,
    pub borrow_count: i64,
    pub member: Option<Member>,
}

/// Open loan past its due date, with the fine a return right now would charge
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct OverdueLoan {
    pub loan: LoanRecord,
    pub days_late: i64,
    #[serde(with = "rust_decimal::serde::float")]
    #[schema(value_type = f64)]
    pub fine: Decimal,
}
