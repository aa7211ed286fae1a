//! Maps inbound hostnames to storefront tenants.
//!
//! `acme.gestularia.com/catalogo?page=2` is served from
//! `/tienda/acme/catalogo?page=2`. The apex domain, `www` and local
//! development hosts are left untouched.

/// Path prefix under which storefront pages are mounted.
pub const STOREFRONT_PREFIX: &str = "/tienda";

/// Outcome of resolving a request host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// Serve the request as-is.
    PassThrough,
    /// Serve the request from the tenant's storefront.
    Rewrite {
        subdomain: String,
        path_and_query: String,
    },
}

/// Resolves tenants from the leading hostname label.
#[derive(Debug, Clone)]
pub struct TenantResolver {
    apex_domain: String,
    dev_hosts: Vec<String>,
}

impl TenantResolver {
    pub fn new(apex_domain: impl Into<String>, dev_hosts: Vec<String>) -> Self {
        Self {
            apex_domain: apex_domain.into(),
            dev_hosts,
        }
    }

    /// Resolves `host` for a request to `path` with an optional raw query string.
    pub fn resolve(&self, host: Option<&str>, path: &str, query: Option<&str>) -> Resolution {
        let Some(host) = host else {
            return Resolution::PassThrough;
        };

        if host == self.apex_domain || self.dev_hosts.iter().any(|dev| dev == host) {
            return Resolution::PassThrough;
        }

        // Hosts without a dot yield the whole host here; those must be listed as dev hosts.
        let subdomain = host.split('.').next().unwrap_or_default();
        if subdomain.is_empty() || subdomain == "www" {
            return Resolution::PassThrough;
        }

        let mut path_and_query = format!("{STOREFRONT_PREFIX}/{subdomain}{path}");
        if let Some(query) = query {
            path_and_query.push('?');
            path_and_query.push_str(query);
        }

        Resolution::Rewrite {
            subdomain: subdomain.to_string(),
            path_and_query,
        }
    }
}
