//! Multiplexing: compose independently built routers into one table with
//! collision detection.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;

use crate::context::CallContext;
use crate::endpoint::Endpoint;
use crate::error::RouterError;
use crate::router::MethodRouter;

/// Routes calls across several member routers through one unioned table.
///
/// Ownership is resolved once at construction; dispatch forwards to the
/// owning member by name.
pub struct MultiplexRouter {
    members: Vec<Arc<dyn MethodRouter>>,
    owners: HashMap<String, usize>,
    methods: HashMap<String, Endpoint>,
}

impl std::fmt::Debug for MultiplexRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MultiplexRouter")
            .field("member_count", &self.members.len())
            .field("owners", &self.owners)
            .field("methods", &self.methods)
            .finish()
    }
}

impl MultiplexRouter {
    /// Union every member's endpoint table.
    ///
    /// # Errors
    ///
    /// `MethodAlreadyDefined` on any cross-member name collision. The
    /// failure is total: no partially composed router is ever returned.
    pub fn new(members: Vec<Arc<dyn MethodRouter>>) -> Result<Self, RouterError> {
        let mut owners = HashMap::new();
        let mut methods = HashMap::new();
        for (index, member) in members.iter().enumerate() {
            for (name, endpoint) in member.methods() {
                if owners.insert(name.clone(), index).is_some() {
                    return Err(RouterError::MethodAlreadyDefined {
                        method: name.clone(),
                    });
                }
                methods.insert(name.clone(), endpoint.clone());
            }
        }
        Ok(Self {
            members,
            owners,
            methods,
        })
    }

    fn owner(&self, method: &str) -> Result<&Arc<dyn MethodRouter>, RouterError> {
        self.owners
            .get(method)
            .and_then(|index| self.members.get(*index))
            .ok_or_else(|| RouterError::UnsupportedMethod {
                method: method.to_string(),
            })
    }
}

#[async_trait]
impl MethodRouter for MultiplexRouter {
    fn methods(&self) -> &HashMap<String, Endpoint> {
        &self.methods
    }

    fn check(&self, method: &str, args: &[Bytes]) -> Result<(), RouterError> {
        self.owner(method)?.check(method, args)
    }

    async fn invoke(
        &self,
        ctx: CallContext,
        method: &str,
        args: &[Bytes],
    ) -> Result<Bytes, RouterError> {
        self.owner(method)?.invoke(ctx, method, args).await
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
