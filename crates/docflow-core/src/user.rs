//! Users referenced as creators and approvers.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

impl User {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            email: None,
        }
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    /// The address notifications go to, if one is usable.
    pub fn notify_address(&self) -> Option<&str> {
        self.email
            .as_deref()
            .map(str::trim)
            .filter(|e| !e.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_email_is_not_an_address() {
        assert_eq!(User::new("a", "A").notify_address(), None);
        assert_eq!(User::new("a", "A").with_email("  ").notify_address(), None);
        assert_eq!(
            User::new("a", "A").with_email("a@example.com").notify_address(),
            Some("a@example.com")
        );
    }
}
