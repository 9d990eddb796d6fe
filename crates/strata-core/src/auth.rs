//! Role based authorization for administrative actions.
//!
//! A permission grants one [`Action`] on every resource of a given
//! [`ResourceType`] whose name fully matches a regular expression.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};

/// Kind of resource an action targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResourceType {
    DataSource,
    Config,
    State,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Action {
    Read,
    Write,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Read => write!(f, "READ"),
            Action::Write => write!(f, "WRITE"),
        }
    }
}

/// A named resource, e.g. the `wikipedia` data source.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Resource {
    pub name: String,
    #[serde(rename = "type")]
    pub resource_type: ResourceType,
}

impl Resource {
    #[must_use]
    pub fn new(name: impl Into<String>, resource_type: ResourceType) -> Self {
        Self {
            name: name.into(),
            resource_type,
        }
    }

    #[must_use]
    pub fn data_source(name: impl Into<String>) -> Self {
        Self::new(name, ResourceType::DataSource)
    }

    #[must_use]
    pub fn config(name: impl Into<String>) -> Self {
        Self::new(name, ResourceType::Config)
    }
}

/// Outcome of an authorization check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Access {
    pub allowed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl Access {
    #[must_use]
    pub fn allow() -> Self {
        Self {
            allowed: true,
            message: None,
        }
    }

    #[must_use]
    pub fn deny(message: impl Into<String>) -> Self {
        Self {
            allowed: false,
            message: Some(message.into()),
        }
    }

    /// Converts a denial into `CoreError::Forbidden`.
    pub fn into_result(self) -> CoreResult<()> {
        if self.allowed {
            Ok(())
        } else {
            Err(CoreError::forbidden(
                self.message.unwrap_or_else(|| "access denied".to_string()),
            ))
        }
    }
}

/// Grant of one action on resources whose name matches a pattern.
#[derive(Debug, Clone)]
pub struct Permission {
    pattern: String,
    matcher: Regex,
    resource_type: ResourceType,
    action: Action,
}

impl Permission {
    /// # Errors
    ///
    /// Returns `ValidationError` when `name_pattern` is not a valid regex.
    pub fn new(
        name_pattern: impl Into<String>,
        resource_type: ResourceType,
        action: Action,
    ) -> CoreResult<Self> {
        let pattern = name_pattern.into();
        let matcher = Regex::new(&format!("^(?:{})$", pattern)).map_err(|e| {
            CoreError::ValidationError(format!("invalid resource pattern `{}`: {}", pattern, e))
        })?;
        Ok(Self {
            pattern,
            matcher,
            resource_type,
            action,
        })
    }

    #[must_use]
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    #[must_use]
    pub fn resource_type(&self) -> ResourceType {
        self.resource_type
    }

    #[must_use]
    pub fn action(&self) -> Action {
        self.action
    }

    /// True when this permission grants `action` on `resource`.
    #[must_use]
    pub fn grants(&self, resource: &Resource, action: Action) -> bool {
        self.action == action
            && self.resource_type == resource.resource_type
            && self.matcher.is_match(&resource.name)
    }
}

/// Lookup of permissions and identity mappings, typically backed by the
/// metadata store.
#[async_trait]
pub trait PermissionStore: Send + Sync {
    /// All permissions granted to `identity` through its roles.
    async fn permissions_for(&self, identity: &str) -> CoreResult<Vec<Permission>>;

    /// Authorization name for an authenticated user, `None` when unmapped.
    async fn authorization_name_for(&self, authentication_name: &str)
        -> CoreResult<Option<String>>;
}

/// Process local permission store.
#[derive(Debug, Default)]
pub struct InMemoryPermissionStore {
    permissions: RwLock<HashMap<String, Vec<Permission>>>,
    name_mappings: RwLock<HashMap<String, String>>,
}

impl InMemoryPermissionStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn grant(&self, identity: impl Into<String>, permission: Permission) {
        self.permissions
            .write()
            .entry(identity.into())
            .or_default()
            .push(permission);
    }

    /// Drops every permission of `identity`.
    pub fn revoke_all(&self, identity: &str) {
        self.permissions.write().remove(identity);
    }

    pub fn map_name(
        &self,
        authentication_name: impl Into<String>,
        authorization_name: impl Into<String>,
    ) {
        self.name_mappings
            .write()
            .insert(authentication_name.into(), authorization_name.into());
    }
}

#[async_trait]
impl PermissionStore for InMemoryPermissionStore {
    async fn permissions_for(&self, identity: &str) -> CoreResult<Vec<Permission>> {
        Ok(self
            .permissions
            .read()
            .get(identity)
            .cloned()
            .unwrap_or_default())
    }

    async fn authorization_name_for(
        &self,
        authentication_name: &str,
    ) -> CoreResult<Option<String>> {
        Ok(self.name_mappings.read().get(authentication_name).cloned())
    }
}

/// Regex based role authorizer.
#[derive(Clone)]
pub struct RbacAuthorizer {
    store: Arc<dyn PermissionStore>,
    remap_auth_names: bool,
}

impl fmt::Debug for RbacAuthorizer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RbacAuthorizer")
            .field("remap_auth_names", &self.remap_auth_names)
            .finish_non_exhaustive()
    }
}

impl RbacAuthorizer {
    #[must_use]
    pub fn new(store: Arc<dyn PermissionStore>) -> Self {
        Self {
            store,
            remap_auth_names: false,
        }
    }

    /// Resolve authentication names through the store before checking permissions.
    #[must_use]
    pub fn with_name_remapping(mut self, enabled: bool) -> Self {
        self.remap_auth_names = enabled;
        self
    }

    /// Decides whether `identity` may perform `action` on `resource`.
    ///
    /// # Errors
    ///
    /// Propagates store lookup failures; a denial is an `Ok(Access)`.
    pub async fn authorize(
        &self,
        identity: Option<&str>,
        resource: &Resource,
        action: Action,
    ) -> CoreResult<Access> {
        let Some(identity) = identity else {
            return Ok(Access::deny("no identity"));
        };

        let identity = if self.remap_auth_names {
            match self.store.authorization_name_for(identity).await? {
                Some(name) => name,
                None => {
                    tracing::debug!(identity, "No authorization name mapped");
                    return Ok(Access::deny(format!("unknown identity `{}`", identity)));
                }
            }
        } else {
            identity.to_string()
        };

        let permissions = self.store.permissions_for(&identity).await?;
        if permissions.iter().any(|p| p.grants(resource, action)) {
            Ok(Access::allow())
        } else {
            tracing::debug!(
                identity = %identity,
                resource = %resource.name,
                action = %action,
                "Authorization denied"
            );
            Ok(Access::deny(format!(
                "`{}` may not {} {:?} `{}`",
                identity, action, resource.resource_type, resource.name
            )))
        }
    }
}
