//! Admin authorization by static email allow-list.
//!
//! The allow-list is parsed once from configuration and shared read-only, so the check is a
//! set lookup with no I/O.

use service_core::error::AppError;
use std::collections::HashSet;
use std::sync::Arc;

use crate::services::Session;

/// Lower-cased administrator emails.
#[derive(Debug, Clone, Default)]
pub struct AdminAllowList {
    emails: HashSet<String>,
}

impl AdminAllowList {
    /// Parse a comma-separated list; entries are trimmed and lower-cased, empties dropped.
    pub fn from_csv(raw: &str) -> Self {
        raw.split(',').collect()
    }

    pub fn contains(&self, email: &str) -> bool {
        self.emails.contains(&email.trim().to_lowercase())
    }

    pub fn len(&self) -> usize {
        self.emails.len()
    }

    pub fn is_empty(&self) -> bool {
        self.emails.is_empty()
    }
}

impl<'a> FromIterator<&'a str> for AdminAllowList {
    fn from_iter<I: IntoIterator<Item = &'a str>>(iter: I) -> Self {
        let emails = iter
            .into_iter()
            .map(|e| e.trim().to_lowercase())
            .filter(|e| !e.is_empty())
            .collect();
        Self { emails }
    }
}

#[derive(Debug, Clone)]
pub struct AdminGuard {
    allow_list: Arc<AdminAllowList>,
}

impl AdminGuard {
    pub fn new(allow_list: AdminAllowList) -> Self {
        Self {
            allow_list: Arc::new(allow_list),
        }
    }

    pub fn allow_list(&self) -> &AdminAllowList {
        &self.allow_list
    }

    /// Succeeds with the session when it carries an allow-listed email.
    pub fn require_admin<'s>(&self, session: Option<&'s Session>) -> Result<&'s Session, AppError> {
        let session = session
            .ok_or_else(|| AppError::Unauthorized(anyhow::anyhow!("no session")))?;

        let email = session
            .user
            .email
            .as_deref()
            .ok_or_else(|| AppError::Unauthorized(anyhow::anyhow!("session has no email")))?;

        if self.allow_list.contains(email) {
            Ok(session)
        } else {
            Err(AppError::Unauthorized(anyhow::anyhow!(
                "email is not an administrator"
            )))
        }
    }

    /// Non-failing variant of [`AdminGuard::require_admin`].
    pub fn is_admin(&self, session: Option<&Session>) -> bool {
        self.require_admin(session).is_ok()
    }
}
