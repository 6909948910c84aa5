//! Target resolution.
//!
//! # Responsibilities
//! - Represent a resolved destination (scheme, host, port, path, query)
//! - Resolve it from a static value, a template over route arguments, or a
//!   caller-supplied function
//! - Join relative targets onto the configured base address
//!
//! # Design Decisions
//! - Resolution runs at most once per call, inside the build step
//! - Only `http` and `https` targets are accepted

use futures_util::future::BoxFuture;
use std::fmt;
use std::sync::Arc;
use url::Url;

use crate::error::{BoxError, TargetResolutionError};
use crate::forwarding::context::{RequestContext, RouteArgs};

/// A resolved destination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    url: Url,
}

impl Target {
    /// Resolve `raw` as an absolute URL, or relative to `base` when given.
    pub fn resolve(raw: &str, base: Option<&Url>) -> Result<Self, TargetResolutionError> {
        let parsed = match base {
            Some(base) => base.join(raw),
            None => Url::parse(raw),
        };
        let url = parsed.map_err(|source| TargetResolutionError::InvalidUrl {
            url: raw.to_string(),
            source,
        })?;
        Self::from_url(url)
    }

    pub fn from_url(url: Url) -> Result<Self, TargetResolutionError> {
        match url.scheme() {
            "http" | "https" => Ok(Self { url }),
            other => Err(TargetResolutionError::UnsupportedScheme(other.to_string())),
        }
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn scheme(&self) -> &str {
        self.url.scheme()
    }

    pub fn host(&self) -> Option<&str> {
        self.url.host_str()
    }

    /// Explicit port or the scheme default.
    pub fn port(&self) -> Option<u16> {
        self.url.port_or_known_default()
    }

    pub fn path(&self) -> &str {
        self.url.path()
    }

    pub fn query(&self) -> Option<&str> {
        self.url.query()
    }

    /// Copy of this target with `query` applied.
    pub(crate) fn with_query(&self, query: &str) -> Self {
        let mut url = self.url.clone();
        url.set_query(Some(query));
        Self { url }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.url.fmt(f)
    }
}

/// A target URL with `{name}` placeholders filled from route arguments.
///
/// A placeholder may carry the catch-all marker (`{*rest}`); it is matched
/// against the argument named `rest`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetTemplate {
    raw: String,
    params: Vec<String>,
}

impl TargetTemplate {
    pub fn parse(raw: impl Into<String>) -> Result<Self, TargetResolutionError> {
        let raw = raw.into();
        let mut params = Vec::new();
        let mut rest = raw.as_str();
        while let Some(open) = rest.find('{') {
            let after = &rest[open + 1..];
            let close = after
                .find('}')
                .ok_or_else(|| TargetResolutionError::InvalidTemplate(raw.clone()))?;
            let name = after[..close].trim_start_matches('*');
            if name.is_empty() {
                return Err(TargetResolutionError::InvalidTemplate(raw.clone()));
            }
            params.push(name.to_string());
            rest = &after[close + 1..];
        }
        Ok(Self { raw, params })
    }

    /// Names of the arguments this template needs.
    pub fn params(&self) -> &[String] {
        &self.params
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn render(&self, args: &RouteArgs) -> Result<String, TargetResolutionError> {
        let mut out = String::with_capacity(self.raw.len());
        let mut rest = self.raw.as_str();
        while let Some(open) = rest.find('{') {
            out.push_str(&rest[..open]);
            let after = &rest[open + 1..];
            // parse() guarantees the closing brace
            let close = after.find('}').unwrap_or(after.len());
            let name = after[..close].trim_start_matches('*');
            let value = args
                .get(name)
                .ok_or_else(|| TargetResolutionError::MissingArgument(name.to_string()))?;
            out.push_str(value);
            rest = after.get(close + 1..).unwrap_or("");
        }
        out.push_str(rest);
        Ok(out)
    }
}

type ArgsFn = dyn Fn(&RouteArgs) -> Result<String, BoxError> + Send + Sync;
type ContextFn =
    dyn for<'a> Fn(&'a RequestContext) -> BoxFuture<'a, Result<String, BoxError>> + Send + Sync;

/// How a route computes its target.
#[derive(Clone)]
pub enum TargetResolver {
    /// A fixed URL, absolute or relative to the base address.
    Static(String),
    /// A URL template filled from route arguments.
    Template(TargetTemplate),
    /// A function of the route arguments.
    FromArgs(Arc<ArgsFn>),
    /// An async function of the whole request context.
    FromContext(Arc<ContextFn>),
}

impl TargetResolver {
    pub fn fixed(url: impl Into<String>) -> Self {
        Self::Static(url.into())
    }

    pub fn from_args<F>(f: F) -> Self
    where
        F: Fn(&RouteArgs) -> Result<String, BoxError> + Send + Sync + 'static,
    {
        Self::FromArgs(Arc::new(f))
    }

    pub fn from_context<F>(f: F) -> Self
    where
        F: for<'a> Fn(&'a RequestContext) -> BoxFuture<'a, Result<String, BoxError>>
            + Send
            + Sync
            + 'static,
    {
        Self::FromContext(Arc::new(f))
    }

    /// Resolve the target for one call.
    pub async fn resolve(
        &self,
        ctx: &RequestContext,
        base: Option<&Url>,
    ) -> Result<Target, TargetResolutionError> {
        let raw = match self {
            Self::Static(url) => return Target::resolve(url, base),
            Self::Template(template) => template.render(ctx.route_args())?,
            Self::FromArgs(f) => f(ctx.route_args()).map_err(TargetResolutionError::Resolver)?,
            Self::FromContext(f) => f(ctx).await.map_err(TargetResolutionError::Resolver)?,
        };
        Target::resolve(&raw, base)
    }
}

impl fmt::Debug for TargetResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Static(url) => f.debug_tuple("Static").field(url).finish(),
            Self::Template(t) => f.debug_tuple("Template").field(&t.as_str()).finish(),
            Self::FromArgs(_) => f.write_str("FromArgs(..)"),
            Self::FromContext(_) => f.write_str("FromContext(..)"),
        }
    }
}

impl From<&str> for TargetResolver {
    fn from(url: &str) -> Self {
        Self::fixed(url)
    }
}

impl From<String> for TargetResolver {
    fn from(url: String) -> Self {
        Self::fixed(url)
    }
}

impl From<TargetTemplate> for TargetResolver {
    fn from(template: TargetTemplate) -> Self {
        Self::Template(template)
    }
}
