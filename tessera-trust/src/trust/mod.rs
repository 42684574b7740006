//! Trust policies for peer certificates.

mod decision;
mod mode;
mod validator;

pub use decision::{LedgerEffect, RejectReason, TrustDecision, Verdict};
pub use mode::{ModeError, Role, TrustMode};
pub use validator::{
    validator_for, CaOrRecordAllValidator, CaOrTofuValidator, CaOrWhitelistValidator, CaValidator,
    NoValidation, Presented, RecordAllValidator, TofuValidator, TrustValidator, WhitelistValidator,
};
