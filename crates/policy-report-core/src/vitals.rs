//! Vitals resolution: organization token to name lookup maps.
//!
//! Three organization-level listings are fetched serially, then every product's
//! project listing is fetched through a bounded pool and flattened into a
//! project token to product name map.

use std::collections::{BTreeMap, HashMap};

use serde_json::Value;
use tracing::{debug, info, warn};

use crate::client::{RemoteClient, RequestKind, TokenKind};
use crate::error::{PolicyReportError, Result};
use crate::model::{OrgToken, ProductToken, ProjectToken, VitalsEntry};
use crate::pool::fan_out;
use crate::settings::Parallelism;

/// Lookup maps built from the organization's vitals listings.
#[derive(Debug, Clone, Default)]
pub struct OrgVitals {
    pub org_name: String,
    pub product_names: HashMap<ProductToken, String>,
    pub project_names: HashMap<ProjectToken, String>,
    pub project_products: HashMap<ProjectToken, String>,
    /// Organization project listing in remote order.
    pub projects: Vec<VitalsEntry>,
}

impl OrgVitals {
    pub fn project_tokens(&self) -> Vec<ProjectToken> {
        self.projects
            .iter()
            .map(|p| ProjectToken::new(p.token.clone()))
            .collect()
    }
}

/// Resolves an organization's products, projects and their links.
pub struct VitalsResolver {
    client: RemoteClient,
    parallelism: Parallelism,
}

impl VitalsResolver {
    pub fn new(client: RemoteClient, parallelism: Parallelism) -> Self {
        Self {
            client,
            parallelism,
        }
    }

    pub async fn resolve(&self, org_token: &OrgToken) -> Result<OrgVitals> {
        let details = self
            .client
            .call(
                RequestKind::OrganizationDetails,
                TokenKind::Org,
                org_token.as_str(),
                None,
            )
            .await?;
        let org_name = details
            .get("orgName")
            .and_then(Value::as_str)
            .ok_or_else(|| {
                PolicyReportError::Protocol("organization details carry no orgName".to_string())
            })?
            .to_string();

        let product_listing = self
            .org_listing(RequestKind::OrganizationProductVitals, org_token)
            .await?;
        let product_names: HashMap<ProductToken, String> = product_listing
            .into_iter()
            .map(|e| (ProductToken(e.token), e.name))
            .collect();

        let projects = self
            .org_listing(RequestKind::OrganizationProjectVitals, org_token)
            .await?;
        let project_names: HashMap<ProjectToken, String> = projects
            .iter()
            .map(|e| (ProjectToken::new(e.token.clone()), e.name.clone()))
            .collect();

        info!(
            org = %org_name,
            products = product_names.len(),
            projects = project_names.len(),
            "organization vitals listed"
        );

        let links = self.product_links(&product_names).await?;
        let project_products = flatten_links(&product_names, links);

        Ok(OrgVitals {
            org_name,
            product_names,
            project_names,
            project_products,
            projects,
        })
    }

    async fn org_listing(&self, kind: RequestKind, org_token: &OrgToken) -> Result<Vec<VitalsEntry>> {
        let response = self
            .client
            .call(kind, TokenKind::Org, org_token.as_str(), None)
            .await?;
        extract_listing(kind, &response)
    }

    /// Fetch each product's project listing, keyed by product token.
    async fn product_links(
        &self,
        product_names: &HashMap<ProductToken, String>,
    ) -> Result<BTreeMap<ProductToken, Vec<ProjectToken>>> {
        let fetched = fan_out(
            "product-project-vitals",
            self.parallelism,
            product_names.keys().cloned(),
            |product_token| product_projects(self.client.clone(), product_token),
        )
        .await?;

        let mut links = BTreeMap::new();
        for (product_token, listing) in fetched {
            debug!(product = %product_token, projects = listing.len(), "product projects listed");
            let projects = listing.into_iter().map(|e| ProjectToken(e.token)).collect();
            links.insert(product_token, projects);
        }
        Ok(links)
    }
}

async fn product_projects(
    client: RemoteClient,
    product_token: ProductToken,
) -> Result<(ProductToken, Vec<VitalsEntry>)> {
    let kind = RequestKind::ProductProjectVitals;
    let response = client
        .call(kind, TokenKind::Product, product_token.as_str(), None)
        .await?;
    let listing = extract_listing(kind, &response)?;
    Ok((product_token, listing))
}

/// Flatten product links into project token to product name.
///
/// A project listed under more than one product is inconsistent remote data
/// but not fatal: it keeps the product with the smallest token and a warning
/// is logged. A project listed under no product is left out of the map, and
/// [`crate::records::build_records`] then fails with
/// [`PolicyReportError::LookupInconsistency`].
pub fn flatten_links(
    product_names: &HashMap<ProductToken, String>,
    links: BTreeMap<ProductToken, Vec<ProjectToken>>,
) -> HashMap<ProjectToken, String> {
    let mut project_products = HashMap::new();
    for (product_token, projects) in links {
        let Some(product_name) = product_names.get(&product_token) else {
            warn!(product = %product_token, "linked product missing from product vitals");
            continue;
        };
        for project_token in projects {
            if let Some(existing) = project_products.get(&project_token) {
                warn!(
                    project = %project_token,
                    kept = %existing,
                    ignored = %product_name,
                    "project listed under more than one product"
                );
                continue;
            }
            project_products.insert(project_token, product_name.clone());
        }
    }
    project_products
}

/// Extract `{token, name}` entries from the single listing field of a vitals
/// response.
///
/// An "occupied" reply passes [`crate::client::check_response`] but carries no
/// listing, so it is a protocol error here. The lookup maps cannot be built
/// without it, unlike a policy fetch where it yields an empty bundle.
pub fn extract_listing(kind: RequestKind, response: &Value) -> Result<Vec<VitalsEntry>> {
    let listing = response
        .as_object()
        .and_then(|obj| obj.values().find(|v| v.is_array()))
        .ok_or_else(|| {
            PolicyReportError::Protocol(format!("{kind} response carries no vitals listing"))
        })?;

    serde_json::from_value(listing.clone())
        .map_err(|e| PolicyReportError::Protocol(format!("{kind} listing is malformed: {e}")))
}
