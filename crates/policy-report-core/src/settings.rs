//! Validated run configuration.
//!
//! Built once by the binary and handed to the client, resolver and fetcher at
//! construction. There is no process-wide configuration state.

use std::fmt;

use crate::error::{PolicyReportError, Result};
use crate::model::OrgToken;

/// Bounded worker-pool width shared by both fan-out phases.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Parallelism(usize);

impl Parallelism {
    pub const MIN: usize = 1;
    pub const MAX: usize = 20;
    pub const DEFAULT: usize = 9;

    pub fn new(value: i64) -> Result<Self> {
        if (Self::MIN as i64..=Self::MAX as i64).contains(&value) {
            Ok(Self(value as usize))
        } else {
            Err(PolicyReportError::InvalidParallelism(value))
        }
    }

    pub fn get(self) -> usize {
        self.0
    }
}

impl Default for Parallelism {
    fn default() -> Self {
        Self(Self::DEFAULT)
    }
}

/// The four values the pipeline needs, already validated.
#[derive(Clone)]
pub struct Settings {
    /// Base URL of the remote API, without the `/api/v1.3` suffix.
    pub ws_url: String,
    pub user_key: String,
    pub org_token: OrgToken,
    pub parallelism: Parallelism,
}

impl Settings {
    pub fn new(
        ws_url: impl Into<String>,
        user_key: impl Into<String>,
        org_token: impl Into<String>,
        parallelism: Parallelism,
    ) -> Result<Self> {
        let ws_url = ws_url.into().trim().trim_end_matches('/').to_string();
        let user_key = user_key.into();
        let org_token = org_token.into();

        if ws_url.is_empty() {
            return Err(PolicyReportError::Config("wsUrl is missing".to_string()));
        }
        if user_key.trim().is_empty() {
            return Err(PolicyReportError::Config("userKey is missing".to_string()));
        }
        if org_token.trim().is_empty() {
            return Err(PolicyReportError::Config("orgToken is missing".to_string()));
        }

        Ok(Self {
            ws_url,
            user_key,
            org_token: OrgToken(org_token),
            parallelism,
        })
    }
}

impl fmt::Debug for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Settings")
            .field("ws_url", &self.ws_url)
            .field("user_key", &"<redacted>")
            .field("org_token", &"<redacted>")
            .field("parallelism", &self.parallelism.get())
            .finish()
    }
}
