//! End-to-end aggregation: vitals, then policies, then records.
//!
//! Each phase completes before the next begins; a fatal error in any phase
//! aborts the run and nothing is returned.

use std::time::Instant;

use crate::client::RemoteClient;
use crate::error::Result;
use crate::model::{OrgToken, Record};
use crate::obs::{emit_phase_finished, emit_phase_started};
use crate::policies::PolicyFetcher;
use crate::records::build_records;
use crate::settings::{Parallelism, Settings};
use crate::vitals::VitalsResolver;

/// Result of a successful aggregation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicyReport {
    pub org_name: String,
    /// One record per project, in policy-fetch completion order.
    pub records: Vec<Record>,
}

/// Aggregation pipeline for one organization.
pub struct Pipeline {
    org_token: OrgToken,
    resolver: VitalsResolver,
    fetcher: PolicyFetcher,
}

impl Pipeline {
    pub fn new(client: RemoteClient, org_token: OrgToken, parallelism: Parallelism) -> Self {
        Self {
            org_token,
            resolver: VitalsResolver::new(client.clone(), parallelism),
            fetcher: PolicyFetcher::new(client, parallelism),
        }
    }

    /// Pipeline talking HTTP to the configured remote API.
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let client = RemoteClient::from_settings(settings)?;
        Ok(Self::new(
            client,
            settings.org_token.clone(),
            settings.parallelism,
        ))
    }

    pub async fn run(&self) -> Result<PolicyReport> {
        emit_phase_started("vitals");
        let started = Instant::now();
        let vitals = self.resolver.resolve(&self.org_token).await?;
        emit_phase_finished("vitals", vitals.projects.len(), elapsed_ms(started));

        emit_phase_started("policies");
        let started = Instant::now();
        let bundles = self.fetcher.fetch_all(&vitals.projects).await?;
        emit_phase_finished("policies", bundles.len(), elapsed_ms(started));

        emit_phase_started("records");
        let started = Instant::now();
        let records = build_records(
            &vitals.org_name,
            &bundles,
            &vitals.project_names,
            &vitals.project_products,
        )?;
        emit_phase_finished("records", records.len(), elapsed_ms(started));

        Ok(PolicyReport {
            org_name: vitals.org_name,
            records,
        })
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    started.elapsed().as_millis() as u64
}
