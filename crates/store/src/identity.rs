//! Identity and group membership lookups.

use async_trait::async_trait;
use common::UserId;

use crate::Result;
use crate::model::{Group, User};

/// Source of authenticated identities and group membership.
///
/// Every call is a fresh lookup; implementations must not cache membership
/// so that group changes take effect on the next request.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Resolves an API token to the user it was issued to.
    async fn authenticate(&self, token: &str) -> Result<Option<User>>;

    async fn find_user(&self, id: UserId) -> Result<Option<User>>;

    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>>;

    /// Returns true if the user belongs to the group.
    async fn has_group(&self, user_id: UserId, group: Group) -> Result<bool>;

    /// Returns all members of the group ordered by username.
    async fn group_members(&self, group: Group) -> Result<Vec<User>>;

    /// Adds the user to the group. Adding an existing member is a no-op.
    async fn add_to_group(&self, user_id: UserId, group: Group) -> Result<()>;

    /// Removes the user from the group. Removing a non-member is a no-op.
    async fn remove_from_group(&self, user_id: UserId, group: Group) -> Result<()>;

    /// Registers a user.
    ///
    /// Fails with `Conflict` if the username is taken.
    async fn register_user(&self, username: &str, email: &str) -> Result<User>;

    /// Associates an API token with a user, replacing any previous owner of
    /// the same token.
    async fn issue_token(&self, user_id: UserId, token: &str) -> Result<()>;
}
