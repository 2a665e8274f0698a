//! Aggregated policy fetch, one request per project.

use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::info;

use crate::client::{RemoteClient, RequestKind, TokenKind, AGGREGATE_POLICIES};
use crate::error::{PolicyReportError, Result};
use crate::model::{Policy, ProjectPolicyBundle, VitalsEntry};
use crate::pool::fan_out;
use crate::settings::Parallelism;

#[derive(Debug, Deserialize)]
struct PoliciesResponse {
    #[serde(default)]
    policies: Vec<Policy>,
}

/// Fetches aggregated policies for every project of an organization.
pub struct PolicyFetcher {
    client: RemoteClient,
    parallelism: Parallelism,
}

impl PolicyFetcher {
    pub fn new(client: RemoteClient, parallelism: Parallelism) -> Self {
        Self {
            client,
            parallelism,
        }
    }

    /// Fetch every project's bundle through a bounded pool.
    ///
    /// Bundles come back in completion order. Any fatal remote failure aborts
    /// the whole fetch.
    pub async fn fetch_all(&self, projects: &[VitalsEntry]) -> Result<Vec<ProjectPolicyBundle>> {
        fan_out(
            "project-policies",
            self.parallelism,
            projects.iter().cloned(),
            |project| {
                let client = self.client.clone();
                async move { fetch_project(&client, project).await }
            },
        )
        .await
    }
}

async fn fetch_project(client: &RemoteClient, project: VitalsEntry) -> Result<ProjectPolicyBundle> {
    info!(
        project_token = %project.token,
        project_name = %project.name,
        "getting aggregated policies for project"
    );

    let mut extra = Map::new();
    extra.insert(AGGREGATE_POLICIES.to_string(), Value::from("true"));

    let response = client
        .call(
            RequestKind::ProjectPolicies,
            TokenKind::Project,
            &project.token,
            Some(extra),
        )
        .await?;

    let parsed: PoliciesResponse = serde_json::from_value(response).map_err(|e| {
        PolicyReportError::Protocol(format!(
            "policies of project {} are malformed: {e}",
            project.token
        ))
    })?;

    Ok(ProjectPolicyBundle {
        project_token: project.token.into(),
        policies: parsed.policies,
    })
}
