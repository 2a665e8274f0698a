//! Domain types shared by the resolver, fetcher, builder and sinks.
//!
//! Tokens for the three hierarchy levels are distinct newtypes so an org token
//! can never be passed where a project token is expected.

use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! token_type {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(token: impl Into<String>) -> Self {
                Self(token.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl From<String> for $name {
            fn from(token: String) -> Self {
                Self(token)
            }
        }

        impl From<&str> for $name {
            fn from(token: &str) -> Self {
                Self(token.to_string())
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

token_type!(
    /// Organization token.
    OrgToken
);
token_type!(
    /// Product token.
    ProductToken
);
token_type!(
    /// Project token.
    ProjectToken
);

/// A `{token, name}` entry from a vitals listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VitalsEntry {
    pub token: String,
    pub name: String,
}

/// Hierarchy level a policy was defined at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicyScope {
    Org,
    Product,
    Project,
}

impl PolicyScope {
    /// Map the remote `policyContext` value to a scope. `None` for values the
    /// remote API may add later.
    pub fn from_context(context: &str) -> Option<Self> {
        match context {
            "DOMAIN" | "ORG" | "ORGANIZATION" => Some(PolicyScope::Org),
            "PRODUCT" => Some(PolicyScope::Product),
            "PROJECT" => Some(PolicyScope::Project),
            _ => None,
        }
    }
}

/// Policy owner as returned by the remote API.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PolicyOwner {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
}

/// A single policy entry of an aggregated-policy response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Policy {
    pub name: String,
    #[serde(default)]
    pub owner: PolicyOwner,
    /// Verbatim remote timestamp.
    #[serde(default)]
    pub creation_time: String,
    #[serde(default)]
    pub enabled: bool,
    /// Raw scope marker (`DOMAIN`, `PRODUCT`, `PROJECT`).
    #[serde(default)]
    pub policy_context: String,
}

impl Policy {
    pub fn scope(&self) -> Option<PolicyScope> {
        PolicyScope::from_context(&self.policy_context)
    }

    /// `<name>(<owner>,<email>,<created>) - Status: <Enabled|Disabled>`
    pub fn display_line(&self) -> String {
        format!(
            "{}({},{},{}) - Status: {}",
            self.name,
            self.owner.name,
            self.owner.email,
            self.creation_time,
            if self.enabled { "Enabled" } else { "Disabled" }
        )
    }
}

/// Raw result of one aggregated-policy fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectPolicyBundle {
    pub project_token: ProjectToken,
    /// Remote order, not re-sorted.
    pub policies: Vec<Policy>,
}

/// One report row: a project with its policies split by scope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    pub project_name: String,
    pub product_name: String,
    pub org_name: String,
    pub org_policies: Vec<Policy>,
    pub product_policies: Vec<Policy>,
    pub project_policies: Vec<Policy>,
}

impl Record {
    pub fn policies(&self, scope: PolicyScope) -> &[Policy] {
        match scope {
            PolicyScope::Org => &self.org_policies,
            PolicyScope::Product => &self.product_policies,
            PolicyScope::Project => &self.project_policies,
        }
    }

    /// Display lines of one scope joined into a multi-line block.
    pub fn policy_block(&self, scope: PolicyScope) -> String {
        self.policies(scope)
            .iter()
            .map(Policy::display_line)
            .collect::<Vec<_>>()
            .join("\n")
    }
}
