//! Record building: one denormalized row per project.

use std::collections::HashMap;

use tracing::warn;

use crate::error::{PolicyReportError, Result};
use crate::model::{Policy, PolicyScope, ProjectPolicyBundle, ProjectToken, Record};

/// Policies of one bundle split by scope, in bundle order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScopePartition {
    pub org: Vec<Policy>,
    pub product: Vec<Policy>,
    pub project: Vec<Policy>,
    /// Policies whose `policyContext` is not a known scope.
    pub unrecognized: Vec<Policy>,
}

/// Split policies by scope, keeping their relative order.
pub fn partition_by_scope(policies: &[Policy]) -> ScopePartition {
    let mut partition = ScopePartition::default();
    for policy in policies {
        let bucket = match policy.scope() {
            Some(PolicyScope::Org) => &mut partition.org,
            Some(PolicyScope::Product) => &mut partition.product,
            Some(PolicyScope::Project) => &mut partition.project,
            None => &mut partition.unrecognized,
        };
        bucket.push(policy.clone());
    }
    partition
}

/// Join fetched bundles with the vitals maps.
///
/// Emits one record per bundle in bundle order. A bundle whose project token
/// is missing from either map is a fatal lookup inconsistency. A project
/// linked under several products never reaches this point: it was resolved
/// to one product, with a warning, by [`crate::vitals::flatten_links`].
pub fn build_records(
    org_name: &str,
    bundles: &[ProjectPolicyBundle],
    project_names: &HashMap<ProjectToken, String>,
    project_products: &HashMap<ProjectToken, String>,
) -> Result<Vec<Record>> {
    bundles
        .iter()
        .map(|bundle| build_record(org_name, bundle, project_names, project_products))
        .collect()
}

fn build_record(
    org_name: &str,
    bundle: &ProjectPolicyBundle,
    project_names: &HashMap<ProjectToken, String>,
    project_products: &HashMap<ProjectToken, String>,
) -> Result<Record> {
    let token = &bundle.project_token;
    let project_name = lookup(project_names, token, "project name map")?;
    let product_name = lookup(project_products, token, "project-to-product map")?;

    let partition = partition_by_scope(&bundle.policies);
    for policy in &partition.unrecognized {
        warn!(
            project = %project_name,
            policy = %policy.name,
            scope = %policy.policy_context,
            "dropping policy with unrecognized scope"
        );
    }

    Ok(Record {
        project_name,
        product_name,
        org_name: org_name.to_string(),
        org_policies: partition.org,
        product_policies: partition.product,
        project_policies: partition.project,
    })
}

fn lookup(
    map: &HashMap<ProjectToken, String>,
    token: &ProjectToken,
    map_name: &'static str,
) -> Result<String> {
    map.get(token)
        .cloned()
        .ok_or_else(|| PolicyReportError::LookupInconsistency {
            map: map_name,
            token: token.to_string(),
        })
}
