use std::{
    sync::Arc,
    task::{Context, Poll},
};

use axum::http::{header::HOST, uri::PathAndQuery, Request, Uri};
use metrics::counter;
use tower::{Layer, Service};
use tracing::{debug, warn};

use gestularia_core::tenant::{Resolution, TenantResolver};

/// Paths that are never rewritten to a storefront.
const EXCLUDED_PREFIXES: [&str; 5] = ["/api/", "/static/", "/favicon.ico", "/healthz", "/metrics"];

/// Rewrites `<slug>.<apex>` requests to `/tienda/<slug>` before routing.
#[derive(Clone)]
pub struct TenantRewriteLayer {
    resolver: Arc<TenantResolver>,
}

impl TenantRewriteLayer {
    pub fn new(resolver: Arc<TenantResolver>) -> Self {
        Self { resolver }
    }
}

impl<S> Layer<S> for TenantRewriteLayer {
    type Service = TenantRewrite<S>;

    fn layer(&self, inner: S) -> Self::Service {
        TenantRewrite {
            inner,
            resolver: self.resolver.clone(),
        }
    }
}

#[derive(Clone)]
pub struct TenantRewrite<S> {
    inner: S,
    resolver: Arc<TenantResolver>,
}

impl<S, B> Service<Request<B>> for TenantRewrite<S>
where
    S: Service<Request<B>>,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = S::Future;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut request: Request<B>) -> Self::Future {
        if let Some(uri) = rewritten_uri(&self.resolver, &request) {
            *request.uri_mut() = uri;
        }
        self.inner.call(request)
    }
}

fn rewritten_uri<B>(resolver: &TenantResolver, request: &Request<B>) -> Option<Uri> {
    let uri = request.uri();
    let path = uri.path();
    if EXCLUDED_PREFIXES
        .iter()
        .any(|prefix| path.starts_with(prefix))
    {
        return None;
    }

    let host = request
        .headers()
        .get(HOST)
        .and_then(|value| value.to_str().ok())
        .or_else(|| uri.authority().map(|authority| authority.as_str()))
        .map(str::to_ascii_lowercase);

    let Resolution::Rewrite {
        subdomain,
        path_and_query,
    } = resolver.resolve(host.as_deref(), path, uri.query())
    else {
        return None;
    };

    let mut parts = uri.clone().into_parts();
    parts.path_and_query = match PathAndQuery::try_from(path_and_query.as_str()) {
        Ok(value) => Some(value),
        Err(err) => {
            warn!(
                stage = "tenant",
                %subdomain,
                error = %err,
                "tenant rewrite produced an invalid path"
            );
            return None;
        }
    };
    match Uri::from_parts(parts) {
        Ok(rewritten) => {
            counter!("tenant_rewrites_total").increment(1);
            debug!(
                stage = "tenant",
                %subdomain,
                from = %path,
                to = %rewritten,
                "rewrote storefront request"
            );
            Some(rewritten)
        }
        Err(err) => {
            warn!(
                stage = "tenant",
                %subdomain,
                error = %err,
                "tenant rewrite produced an invalid uri"
            );
            None
        }
    }
}
