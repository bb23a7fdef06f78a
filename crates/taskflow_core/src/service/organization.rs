//! Tenant bootstrap.
//!
//! # Invariants
//! - Organization and its first Admin are created in one transaction: a
//!   duplicate organization name or email leaves nothing behind.

use super::error::{ServiceError, ServiceResult};
use crate::model::tenant::{looks_like_email, NewUser, Organization, Role, User};
use crate::policy::{allowed, PolicyAction, ResourceContext};
use crate::repo::{OrganizationRepository, RepoError, SqliteStore, UserRepository};
use log::info;
use rusqlite::Connection;
use serde::Serialize;

/// Registration payload. The credential is already hashed by the auth collaborator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Registration {
    pub organization_name: String,
    pub email: String,
    pub credential_hash: String,
    pub full_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RegisteredOrganization {
    pub organization: Organization,
    pub admin: User,
}

/// Creates an organization together with its Admin user, atomically.
pub fn register_organization(
    conn: &mut Connection,
    registration: &Registration,
) -> ServiceResult<RegisteredOrganization> {
    debug_assert!(allowed(
        None,
        PolicyAction::RegisterOrganization,
        &ResourceContext::default(),
    ));

    let organization_name = registration.organization_name.trim();
    if organization_name.is_empty() {
        return Err(ServiceError::invalid("Organization name is required"));
    }
    let email = registration.email.trim();
    if !looks_like_email(email) {
        return Err(ServiceError::invalid("A valid email is required"));
    }
    if registration.full_name.trim().is_empty() {
        return Err(ServiceError::invalid("Full name is required"));
    }

    let tx = conn.transaction().map_err(RepoError::from)?;
    let registered = {
        let store = SqliteStore::new(&tx);
        if store.organization_name_exists(organization_name)? {
            return Err(ServiceError::conflict("Organization exists"));
        }
        if store.email_exists(email)? {
            return Err(ServiceError::conflict("User email exists"));
        }

        let organization = store.create_organization(organization_name)?;
        let admin = store.create_user(&NewUser {
            email: email.to_string(),
            hashed_password: registration.credential_hash.clone(),
            full_name: registration.full_name.trim().to_string(),
            role: Role::Admin,
            organization_id: organization.id,
        })?;
        RegisteredOrganization {
            organization,
            admin,
        }
    };
    tx.commit().map_err(RepoError::from)?;

    info!(
        "event=organization_registered module=service status=ok organization_id={} user_id={}",
        registered.organization.id, registered.admin.id
    );
    Ok(registered)
}
