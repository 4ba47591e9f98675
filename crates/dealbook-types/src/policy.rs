//! Authorization vocabulary shared with the external policy gate.
//!
//! The core never branches on roles itself. It names the [`Action`] being
//! attempted and asks the gate; [`Role`] exists for the bundled
//! role-table policy and for callers that model their users the same way.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A mutating operation the policy gate is asked about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    CreateRequest,
    CloseRequest,
    OverrideRequestStatus,
    SubmitOffer,
    AcceptOffer,
    RejectOffer,
    WithdrawOffer,
    RequestWithdrawal,
    ApproveWithdrawal,
    RejectWithdrawal,
    SubmitProof,
    ConfirmRelease,
    OpenDispute,
    ResolveDispute,
}

impl Action {
    pub const ALL: [Self; 14] = [
        Self::CreateRequest,
        Self::CloseRequest,
        Self::OverrideRequestStatus,
        Self::SubmitOffer,
        Self::AcceptOffer,
        Self::RejectOffer,
        Self::WithdrawOffer,
        Self::RequestWithdrawal,
        Self::ApproveWithdrawal,
        Self::RejectWithdrawal,
        Self::SubmitProof,
        Self::ConfirmRelease,
        Self::OpenDispute,
        Self::ResolveDispute,
    ];
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::CreateRequest => "create_request",
            Self::CloseRequest => "close_request",
            Self::OverrideRequestStatus => "override_request_status",
            Self::SubmitOffer => "submit_offer",
            Self::AcceptOffer => "accept_offer",
            Self::RejectOffer => "reject_offer",
            Self::WithdrawOffer => "withdraw_offer",
            Self::RequestWithdrawal => "request_withdrawal",
            Self::ApproveWithdrawal => "approve_withdrawal",
            Self::RejectWithdrawal => "reject_withdrawal",
            Self::SubmitProof => "submit_proof",
            Self::ConfirmRelease => "confirm_release",
            Self::OpenDispute => "open_dispute",
            Self::ResolveDispute => "resolve_dispute",
        };
        f.write_str(name)
    }
}

/// Marketplace roles understood by the bundled role-table policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Admin,
    Entrepreneur,
    Supplier,
    Investor,
}

impl Role {
    /// Default action grants for the role.
    #[must_use]
    pub fn default_actions(self) -> &'static [Action] {
        match self {
            Self::Admin => &Action::ALL,
            Self::Entrepreneur => &[
                Action::CreateRequest,
                Action::CloseRequest,
                Action::AcceptOffer,
                Action::RejectOffer,
                Action::RequestWithdrawal,
                Action::SubmitProof,
                Action::OpenDispute,
            ],
            Self::Supplier | Self::Investor => &[
                Action::SubmitOffer,
                Action::WithdrawOffer,
                Action::RequestWithdrawal,
                Action::SubmitProof,
                Action::OpenDispute,
            ],
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Admin => write!(f, "admin"),
            Self::Entrepreneur => write!(f, "entrepreneur"),
            Self::Supplier => write!(f, "supplier"),
            Self::Investor => write!(f, "investor"),
        }
    }
}
