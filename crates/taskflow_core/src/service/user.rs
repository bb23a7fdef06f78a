//! User management service.
//!
//! # Invariants
//! - Email is unique across organizations.
//! - Users are always created inside the caller's organization.
//! - Credentials are hashed by a `CredentialHasher`; this crate never checks them.

use super::error::{ServiceError, ServiceResult};
use super::guard::{
    require, user_in_scope, CREATE_USER_DENIED, LIST_USERS_DENIED, NOT_ENOUGH_PERMISSIONS,
    UPDATE_USER_DENIED,
};
use crate::model::tenant::{looks_like_email, Identity, NewUser, Role, User};
use crate::model::UserId;
use crate::policy::{PolicyAction, ResourceContext};
use crate::repo::DomainStore;

/// Hashing seam owned by the authentication collaborator.
pub trait CredentialHasher: Send + Sync {
    fn hash(&self, secret: &str) -> Result<String, String>;
}

/// Stores a locked marker instead of a credential.
///
/// Accounts created through it cannot sign in until the authentication
/// collaborator sets a real credential.
#[derive(Debug, Default, Clone, Copy)]
pub struct LockedCredentialHasher;

pub const LOCKED_CREDENTIAL: &str = "!locked";

impl CredentialHasher for LockedCredentialHasher {
    fn hash(&self, _secret: &str) -> Result<String, String> {
        Ok(LOCKED_CREDENTIAL.to_string())
    }
}

/// Input for user creation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserDraft {
    pub email: String,
    pub full_name: String,
    pub password: String,
    pub role: Role,
}

/// Partial user update. `None` fields are left unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserPatch {
    pub full_name: Option<String>,
    pub role: Option<Role>,
    pub is_active: Option<bool>,
}

pub struct UserService<'s, S: DomainStore + ?Sized> {
    store: &'s S,
    hasher: &'s dyn CredentialHasher,
}

impl<'s, S: DomainStore + ?Sized> UserService<'s, S> {
    pub fn new(store: &'s S, hasher: &'s dyn CredentialHasher) -> Self {
        Self { store, hasher }
    }

    pub fn create(&self, identity: &Identity, draft: &UserDraft) -> ServiceResult<User> {
        require(
            identity,
            PolicyAction::CreateUser,
            &ResourceContext::actor(identity.user_id).with_target_role(Some(draft.role)),
            CREATE_USER_DENIED,
        )?;

        let email = draft.email.trim();
        if !looks_like_email(email) {
            return Err(ServiceError::invalid(format!("'{email}' is not a valid email")));
        }
        let full_name = draft.full_name.trim();
        if full_name.is_empty() {
            return Err(ServiceError::invalid("Full name is required"));
        }
        if self.store.email_exists(email)? {
            return Err(ServiceError::conflict(format!(
                "User with email '{email}' already exists"
            )));
        }

        let hashed_password = self
            .hasher
            .hash(&draft.password)
            .map_err(ServiceError::Collaborator)?;
        Ok(self.store.create_user(&NewUser {
            email: email.to_string(),
            hashed_password,
            full_name: full_name.to_string(),
            role: draft.role,
            organization_id: identity.organization_id,
        })?)
    }

    pub fn update(
        &self,
        identity: &Identity,
        user_id: UserId,
        patch: &UserPatch,
    ) -> ServiceResult<User> {
        let mut user = user_in_scope(self.store, identity, user_id)?;
        let touches_admin = user.role == Role::Admin || patch.role == Some(Role::Admin);
        require(
            identity,
            PolicyAction::UpdateUser,
            &ResourceContext::actor(identity.user_id)
                .with_target_role(Some(if touches_admin { Role::Admin } else { user.role })),
            UPDATE_USER_DENIED,
        )?;

        let mut changed = false;
        if let Some(full_name) = patch.full_name.as_deref().map(str::trim) {
            if full_name.is_empty() {
                return Err(ServiceError::invalid("Full name is required"));
            }
            user.full_name = full_name.to_string();
            changed = true;
        }
        if let Some(role) = patch.role {
            user.role = role;
            changed = true;
        }
        if let Some(is_active) = patch.is_active {
            user.is_active = is_active;
            changed = true;
        }
        if !changed {
            return Err(ServiceError::invalid("No updates provided"));
        }

        self.store.update_user(&user)?;
        user_in_scope(self.store, identity, user_id)
    }

    /// Any caller may view themselves; other profiles need Admin/Manager.
    pub fn get(&self, identity: &Identity, user_id: UserId) -> ServiceResult<User> {
        let user = user_in_scope(self.store, identity, user_id)?;
        if user.id != identity.user_id {
            require(
                identity,
                PolicyAction::ViewUser,
                &ResourceContext::actor(identity.user_id),
                NOT_ENOUGH_PERMISSIONS,
            )?;
        }
        Ok(user)
    }

    pub fn list(
        &self,
        identity: &Identity,
        role: Option<Role>,
        limit: Option<u32>,
    ) -> ServiceResult<Vec<User>> {
        require(
            identity,
            PolicyAction::ListUsers,
            &ResourceContext::actor(identity.user_id),
            LIST_USERS_DENIED,
        )?;
        Ok(self
            .store
            .list_users(identity.organization_id, role, limit)?)
    }
}
