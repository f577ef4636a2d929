//! Capability checks backed by the identity provider.

use store::{Group, IdentityProvider, User};

use crate::error::DomainError;

/// What a caller is allowed to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    /// Member of the Manager group.
    Manager,
    /// Member of the Delivery crew group.
    DeliveryCrew,
    /// Any resolved identity.
    Authenticated,
}

impl Capability {
    fn group(&self) -> Option<Group> {
        match self {
            Capability::Manager => Some(Group::Manager),
            Capability::DeliveryCrew => Some(Group::DeliveryCrew),
            Capability::Authenticated => None,
        }
    }
}

impl std::fmt::Display for Capability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.group() {
            Some(group) => write!(f, "{group}"),
            None => write!(f, "Authenticated"),
        }
    }
}

/// Answers capability questions with a fresh membership lookup on each call.
#[derive(Clone)]
pub struct AccessPolicy<I> {
    identity: I,
}

impl<I: IdentityProvider> AccessPolicy<I> {
    /// Creates a policy over the given identity provider.
    pub fn new(identity: I) -> Self {
        Self { identity }
    }

    /// Returns true if the user holds the capability.
    pub async fn has_capability(
        &self,
        user: &User,
        capability: Capability,
    ) -> Result<bool, DomainError> {
        match capability.group() {
            Some(group) => Ok(self.identity.has_group(user.id, group).await?),
            None => Ok(true),
        }
    }

    /// Fails with `Forbidden` unless the user holds the capability.
    pub async fn require(&self, user: &User, capability: Capability) -> Result<(), DomainError> {
        if self.has_capability(user, capability).await? {
            Ok(())
        } else {
            Err(DomainError::Forbidden(format!(
                "{} is not in the {capability} group",
                user.username
            )))
        }
    }
}
