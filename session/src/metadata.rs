//! Data the widget reports to callbacks, and the data callers pass to it.
//!
//! Field names follow the widget's JSON so values can be deserialized
//! straight from what the library emits.

use serde::{Deserialize, Serialize};

/// Account category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountType {
    /// Checking, savings and similar.
    Depository,
    /// Credit cards and lines of credit.
    Credit,
    /// Loans and mortgages.
    Loan,
    /// Brokerage and retirement accounts.
    Investment,
    /// Anything else.
    Other,
}

/// A linked account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    /// Account id.
    pub id: String,
    /// Official account name.
    pub name: String,
    /// Last 2-4 characters of the account number.
    pub mask: Option<String>,
    /// Account category.
    #[serde(rename = "type")]
    pub account_type: AccountType,
    /// Account subtype.
    pub subtype: String,
    /// Micro-deposit or database verification status.
    pub verification_status: Option<String>,
    /// Business or personal, for micro-deposit verification.
    pub class_type: Option<String>,
}

/// The institution the user linked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Institution {
    /// Display name.
    pub name: String,
    /// Institution id.
    pub institution_id: String,
}

/// Metadata passed to `on_success`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuccessMetadata {
    /// `None` for same-day micro-deposit verification.
    pub institution: Option<Institution>,
    /// Linked accounts.
    #[serde(default)]
    pub accounts: Vec<Account>,
    /// Identifier of this widget session.
    pub link_session_id: String,
    /// Transfer status, when the transfer UI is in use.
    #[serde(default)]
    pub transfer_status: Option<String>,
}

/// Error the widget reports to `on_exit`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkExitError {
    /// Broad error category.
    pub error_type: String,
    /// Specific error code.
    pub error_code: String,
    /// Developer-facing message.
    pub error_message: String,
    /// User-facing message, if the error is user-facing.
    pub display_message: Option<String>,
}

/// Metadata passed to `on_exit`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExitMetadata {
    /// The institution selected, if any.
    pub institution: Option<Institution>,
    /// Where in the flow the user exited.
    pub status: String,
    /// Identifier of this widget session.
    pub link_session_id: String,
    /// Id of the widget's last request.
    pub request_id: String,
}

/// Event names with stable meaning; other names are informational.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StableEvent {
    /// Widget opened.
    Open,
    /// User exited.
    Exit,
    /// User completed the flow.
    Handoff,
    /// User picked an institution.
    SelectInstitution,
    /// An error occurred.
    Error,
    /// Income insights completed.
    BankIncomeInsightsCompleted,
    /// Identity verification passed.
    IdentityVerificationPassSession,
    /// Identity verification failed.
    IdentityVerificationFailSession,
}

impl StableEvent {
    /// Parse a stable event name; `None` for informational events.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        serde_json::from_value(serde_json::Value::String(name.to_string())).ok()
    }
}

/// Metadata passed to `on_event`.
///
/// Most fields are only emitted by specific events.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EventMetadata {
    /// Mask of a user-entered account number.
    pub account_number_mask: Option<String>,
    /// Error category.
    pub error_type: Option<String>,
    /// Error code.
    pub error_code: Option<String>,
    /// Error message.
    pub error_message: Option<String>,
    /// Where the user exited.
    pub exit_status: Option<String>,
    /// Selected institution id.
    pub institution_id: Option<String>,
    /// Selected institution name.
    pub institution_name: Option<String>,
    /// Institution search query.
    pub institution_search_query: Option<String>,
    /// Whether this is an update-mode session.
    pub is_update_mode: Option<String>,
    /// Why an institution matched.
    pub match_reason: Option<String>,
    /// Submitted routing number.
    pub routing_number: Option<String>,
    /// MFA type encountered.
    pub mfa_type: Option<String>,
    /// View being transitioned to.
    pub view_name: Option<String>,
    /// Id of the widget's last request.
    pub request_id: String,
    /// Identifier of this widget session.
    pub link_session_id: String,
    /// When the event happened (RFC 3339).
    pub timestamp: String,
    /// Selected verification method or flow type.
    pub selection: Option<String>,
}

/// Data submitted to the widget.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionData {
    /// Phone number for returning-user flows.
    pub phone_number: Option<String>,
}

/// Options for closing the widget.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExitOptions {
    /// Close immediately instead of asking the user to confirm.
    #[serde(default)]
    pub force: bool,
}

impl ExitOptions {
    /// Close without confirmation.
    #[must_use]
    pub const fn forced() -> Self {
        Self { force: true }
    }
}
