//! Error classification.
//!
//! Precedence, highest first:
//!
//! 1. nothing while the script is loading
//! 2. `script_load` once the script failed (the other inputs are not
//!    meaningful without the script)
//! 3. nothing while the token is loading
//! 4. `plaid_unavailable` / `non_browser` when the library lookup failed
//! 5. the token failure's own kind

use crate::error::{ClassifiedError, LinkError};
use crate::state::{LibraryStatus, ScriptStatus, TokenStatus};

/// Classify the session's inputs into at most one error.
#[must_use]
pub fn classify(
    script: &ScriptStatus,
    library: LibraryStatus,
    token: &TokenStatus,
) -> Option<ClassifiedError> {
    match script {
        ScriptStatus::Idle | ScriptStatus::Loading => return None,
        ScriptStatus::Failed { message, cause } => {
            return Some(ClassifiedError::new(LinkError::ScriptLoad {
                message: message.clone(),
                source: cause.clone(),
            }));
        },
        ScriptStatus::Loaded => {},
    }

    if !token.is_settled() {
        return None;
    }

    match library {
        LibraryStatus::Absent => return Some(ClassifiedError::new(LinkError::Unavailable)),
        LibraryStatus::NonBrowser => return Some(ClassifiedError::new(LinkError::NonBrowser)),
        LibraryStatus::Present | LibraryStatus::Unchecked => {},
    }

    match token {
        TokenStatus::Failed(error) => Some(ClassifiedError::from(error.clone())),
        TokenStatus::Idle | TokenStatus::Loading | TokenStatus::Ready(_) => None,
    }
}
