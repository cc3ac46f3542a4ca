//! Schema discovery: endpoints derived from an explicit, structurally
//! described service definition with per-method options.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use crossbar_core::{ArgValue, StateReader};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::context::CallContext;
use crate::endpoint::{Endpoint, MethodCategory};
use crate::error::RouterError;
use crate::handler::{BoundHandler, Handler};
use crate::pipeline;
use crate::router::MethodRouter;

// ---------------------------------------------------------------------------
// Service definition
// ---------------------------------------------------------------------------

/// Per-method discovery overrides. Every field is optional; absent fields
/// fall back to the defaults described on [`SchemaRouter::new`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MethodOptions {
    /// Explicit external name, overriding every derivation rule.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Explicit category, overriding the `MutatingBatched` default.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<MethodCategory>,
    /// Explicit auth requirement, overriding the category default.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auth: Option<bool>,
}

impl MethodOptions {
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    #[must_use]
    pub fn with_category(mut self, category: MethodCategory) -> Self {
        self.category = Some(category);
        self
    }

    #[must_use]
    pub fn with_auth(mut self, auth: bool) -> Self {
        self.auth = Some(auth);
        self
    }
}

/// One method descriptor: a declared name, a unary payload handler, and
/// optional overrides.
///
/// Schema-discovered handlers always take exactly one payload parameter and
/// read the verified caller from [`CallContext::caller`]; the identity is
/// never a positional parameter here, so an `auth` override can never
/// disagree with the handler signature.
#[derive(Debug)]
pub struct MethodSpec {
    name: String,
    options: MethodOptions,
    handler: BoundHandler,
}

impl MethodSpec {
    /// Describe a method with default options.
    pub fn new<A, H>(name: impl Into<String>, handler: H) -> Self
    where
        A: ArgValue,
        H: Handler<(A,)>,
    {
        Self {
            name: name.into(),
            options: MethodOptions::default(),
            handler: handler.bind(),
        }
    }

    /// Replace the method's options.
    #[must_use]
    pub fn with_options(mut self, options: MethodOptions) -> Self {
        self.options = options;
        self
    }

    /// The declared method name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// An explicit service definition: a fully-qualified service name plus an
/// ordered list of method descriptors.
#[derive(Debug, Default)]
pub struct ServiceSchema {
    service: String,
    methods: Vec<MethodSpec>,
}

impl ServiceSchema {
    /// Start a definition for the fully-qualified `service` name
    /// (e.g. `ledger.v1.Payments`).
    #[must_use]
    pub fn new(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            methods: Vec::new(),
        }
    }

    /// Append a method descriptor. Order is preserved through discovery.
    #[must_use]
    pub fn method(mut self, spec: MethodSpec) -> Self {
        self.methods.push(spec);
        self
    }

    /// The fully-qualified service name.
    #[must_use]
    pub fn service(&self) -> &str {
        &self.service
    }
}

/// Naming behavior for schema discovery.
#[derive(Debug, Clone, Copy, Default)]
pub struct SchemaConfig {
    /// Derive external names as `/{service}/{method}` instead of the
    /// lower-cased method name when no explicit override is present.
    pub url_naming: bool,
}

// ---------------------------------------------------------------------------
// SchemaRouter
// ---------------------------------------------------------------------------

enum SchemaEntry {
    Local(BoundHandler),
    Fallback,
}

/// Routes calls to endpoints discovered from a [`ServiceSchema`],
/// optionally wrapping a fallback router whose endpoints are merged in
/// first.
pub struct SchemaRouter {
    entries: HashMap<String, SchemaEntry>,
    methods: HashMap<String, Endpoint>,
    fallback: Option<Arc<dyn MethodRouter>>,
    state: Option<Arc<dyn StateReader>>,
}

impl std::fmt::Debug for SchemaRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SchemaRouter")
            .field("entry_count", &self.entries.len())
            .field("methods", &self.methods)
            .field("has_fallback", &self.fallback.is_some())
            .field("has_state", &self.state.is_some())
            .finish()
    }
}

impl SchemaRouter {
    /// Discover endpoints from a service definition.
    ///
    /// Per method: external name from the explicit option, else the
    /// URL-style `/{service}/{method}` transform when
    /// [`SchemaConfig::url_naming`] is set, else the lower-cased method
    /// name. Category defaults to `MutatingBatched`; `auth` defaults to
    /// true for `MutatingBatched` and false otherwise; `arg_count` is 2
    /// (identity + payload) when authenticated, else 1.
    ///
    /// # Errors
    ///
    /// `MethodAlreadyDefined` on any duplicate external name. Fatal: no
    /// router value is produced.
    pub fn new(schema: ServiceSchema, config: &SchemaConfig) -> Result<Self, RouterError> {
        Self::build(schema, config, None)
    }

    /// Discover endpoints from a service definition on top of a fallback
    /// router. The fallback's endpoints are merged in first; calls to them
    /// are delegated.
    ///
    /// # Errors
    ///
    /// `MethodAlreadyDefined` when a schema method collides with another
    /// schema method or with a fallback endpoint.
    pub fn with_fallback(
        schema: ServiceSchema,
        config: &SchemaConfig,
        fallback: Arc<dyn MethodRouter>,
    ) -> Result<Self, RouterError> {
        Self::build(schema, config, Some(fallback))
    }

    fn build(
        schema: ServiceSchema,
        config: &SchemaConfig,
        fallback: Option<Arc<dyn MethodRouter>>,
    ) -> Result<Self, RouterError> {
        let ServiceSchema { service, methods: specs } = schema;
        let mut entries = HashMap::new();
        let mut methods = HashMap::new();

        if let Some(fb) = &fallback {
            for (name, endpoint) in fb.methods() {
                methods.insert(name.clone(), endpoint.clone());
                entries.insert(name.clone(), SchemaEntry::Fallback);
            }
        }

        for spec in specs {
            let MethodSpec {
                name: declared,
                options,
                handler,
            } = spec;
            let name = options.name.unwrap_or_else(|| {
                if config.url_naming {
                    format!("/{service}/{declared}")
                } else {
                    declared.to_lowercase()
                }
            });
            let category = options.category.unwrap_or(MethodCategory::MutatingBatched);
            let auth_required = options
                .auth
                .unwrap_or(category == MethodCategory::MutatingBatched);
            let endpoint = Endpoint {
                name: name.clone(),
                category,
                auth_required,
                arg_count: if auth_required { 2 } else { 1 },
                returns_error: handler.returns_error(),
            };
            if methods.insert(name.clone(), endpoint).is_some() {
                return Err(RouterError::MethodAlreadyDefined { method: name });
            }
            debug!(service = %service, method = %name, ?category, "registered endpoint");
            entries.insert(name, SchemaEntry::Local(handler));
        }

        Ok(Self {
            entries,
            methods,
            fallback,
            state: None,
        })
    }

    /// Attach a state accessor for context-aware argument validation.
    #[must_use]
    pub fn with_state(mut self, state: Arc<dyn StateReader>) -> Self {
        self.state = Some(state);
        self
    }

    fn lookup(&self, method: &str) -> Result<Target<'_>, RouterError> {
        match self.entries.get(method) {
            Some(SchemaEntry::Local(handler)) => match self.methods.get(method) {
                Some(endpoint) => Ok(Target::Local(endpoint, handler)),
                None => Err(RouterError::UnsupportedMethod {
                    method: method.to_string(),
                }),
            },
            Some(SchemaEntry::Fallback) | None => match &self.fallback {
                Some(fb) => Ok(Target::Delegated(fb)),
                None => Err(RouterError::UnsupportedMethod {
                    method: method.to_string(),
                }),
            },
        }
    }
}

enum Target<'a> {
    Local(&'a Endpoint, &'a BoundHandler),
    Delegated(&'a Arc<dyn MethodRouter>),
}

#[async_trait]
impl MethodRouter for SchemaRouter {
    fn methods(&self) -> &HashMap<String, Endpoint> {
        &self.methods
    }

    fn check(&self, method: &str, args: &[Bytes]) -> Result<(), RouterError> {
        match self.lookup(method)? {
            Target::Local(endpoint, handler) => {
                pipeline::check_call(endpoint, handler, args, self.state.as_deref())
            }
            Target::Delegated(fb) => fb.check(method, args),
        }
    }

    async fn invoke(
        &self,
        ctx: CallContext,
        method: &str,
        args: &[Bytes],
    ) -> Result<Bytes, RouterError> {
        match self.lookup(method)? {
            Target::Local(endpoint, handler) => {
                pipeline::invoke_call(endpoint, handler, ctx, args).await
            }
            Target::Delegated(fb) => fb.invoke(ctx, method, args).await,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
