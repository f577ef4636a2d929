//! Manager-only maintenance of the Manager and Delivery crew groups.

use common::UserId;
use store::{Group, Store, User};

use crate::access::{AccessPolicy, Capability};
use crate::error::DomainError;

pub struct GroupService<S: Store> {
    store: S,
    policy: AccessPolicy<S>,
}

impl<S: Store> GroupService<S> {
    pub fn new(store: S) -> Self {
        Self {
            policy: AccessPolicy::new(store.clone()),
            store,
        }
    }

    /// Lists the members of a group, ordered by username.
    #[tracing::instrument(skip(self, actor), fields(actor_id = %actor.id))]
    pub async fn list_members(&self, actor: &User, group: Group) -> Result<Vec<User>, DomainError> {
        self.policy.require(actor, Capability::Manager).await?;
        Ok(self.store.group_members(group).await?)
    }

    /// Adds the user with the given username to a group.
    #[tracing::instrument(skip(self, actor), fields(actor_id = %actor.id))]
    pub async fn add_member(
        &self,
        actor: &User,
        group: Group,
        username: &str,
    ) -> Result<User, DomainError> {
        self.policy.require(actor, Capability::Manager).await?;

        let username = username.trim();
        if username.is_empty() {
            return Err(DomainError::InvalidArgument(
                "username must not be blank".to_string(),
            ));
        }
        let user = self
            .store
            .find_user_by_username(username)
            .await?
            .ok_or_else(|| DomainError::not_found("user", username))?;

        self.store.add_to_group(user.id, group).await?;
        tracing::info!(user_id = %user.id, %group, "user added to group");
        Ok(user)
    }

    /// Removes a user from a group. Removing a non-member succeeds.
    #[tracing::instrument(skip(self, actor), fields(actor_id = %actor.id))]
    pub async fn remove_member(
        &self,
        actor: &User,
        group: Group,
        user_id: UserId,
    ) -> Result<(), DomainError> {
        self.policy.require(actor, Capability::Manager).await?;

        let user = self
            .store
            .find_user(user_id)
            .await?
            .ok_or_else(|| DomainError::not_found("user", user_id))?;

        self.store.remove_from_group(user.id, group).await?;
        tracing::info!(%user_id, %group, "user removed from group");
        Ok(())
    }
}
