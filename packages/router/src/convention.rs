//! Convention discovery: endpoints derived from declared operation names.
//!
//! Declared names are classified by prefix into the three endpoint
//! categories; everything else about the endpoint comes from the bound
//! handler's compile-time signature.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use crossbar_core::StateReader;
use tracing::{debug, trace, warn};

use crate::context::CallContext;
use crate::endpoint::{Endpoint, MethodCategory};
use crate::error::RouterError;
use crate::handler::{BoundHandler, OperationDef};
use crate::pipeline;
use crate::router::MethodRouter;

/// Recognized declared-name prefixes, in classification order. None is a
/// prefix of another, so every declared name matches at most one.
const PREFIXES: [(&str, MethodCategory); 3] = [
    ("Execute", MethodCategory::MutatingBatched),
    ("Apply", MethodCategory::MutatingImmediate),
    ("Query", MethodCategory::ReadOnly),
];

/// A business object exposing its operations as a registration table.
pub trait OperationSet {
    /// The declared operations, in registration order.
    fn operations(&self) -> Vec<OperationDef>;
}

/// Routes calls to endpoints discovered by naming convention over a
/// registration table.
pub struct ConventionRouter {
    entries: HashMap<String, BoundHandler>,
    methods: HashMap<String, Endpoint>,
    state: Option<Arc<dyn StateReader>>,
}

impl std::fmt::Debug for ConventionRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConventionRouter")
            .field("entries", &self.entries)
            .field("methods", &self.methods)
            .field("has_state", &self.state.is_some())
            .finish()
    }
}

impl ConventionRouter {
    /// Discover endpoints from a registration table.
    ///
    /// Declared names are classified by prefix (`Execute` → batched
    /// mutation, `Apply` → immediate mutation, `Query` → read-only); the
    /// prefix is stripped and the first character of the remainder
    /// lower-cased to form the external name. Entries with no recognized
    /// prefix are skipped. `auth_required` is true iff the handler's first
    /// parameter is the sender identity; arity and the error-return flag
    /// also come from the handler signature.
    ///
    /// # Errors
    ///
    /// `InvalidMethodName` when stripping leaves an empty name,
    /// `MethodAlreadyDefined` when two operations map to the same external
    /// name. Either failure is fatal: no router value is produced.
    pub fn discover(table: Vec<OperationDef>) -> Result<Self, RouterError> {
        let mut entries = HashMap::new();
        let mut methods = HashMap::new();
        for def in table {
            let (declared, handler) = def.into_parts();
            let Some((category, remainder)) = classify(&declared) else {
                trace!(%declared, "skipping operation without a recognized prefix");
                continue;
            };
            if remainder.is_empty() {
                return Err(RouterError::InvalidMethodName { declared });
            }
            let name = external_name(remainder);
            let endpoint = Endpoint {
                name: name.clone(),
                category,
                auth_required: handler.takes_sender(),
                arg_count: handler.arg_count(),
                returns_error: handler.returns_error(),
            };
            if category == MethodCategory::MutatingBatched && !endpoint.auth_required {
                warn!(
                    method = %name,
                    "batched mutation without a sender parameter; the dispatcher cannot attach an identity"
                );
            }
            if methods.insert(name.clone(), endpoint).is_some() {
                return Err(RouterError::MethodAlreadyDefined { method: name });
            }
            debug!(method = %name, ?category, "registered endpoint");
            entries.insert(name, handler);
        }
        Ok(Self {
            entries,
            methods,
            state: None,
        })
    }

    /// Discover endpoints from a business object's registration table.
    ///
    /// # Errors
    ///
    /// Same as [`ConventionRouter::discover`].
    pub fn for_object<T: OperationSet>(object: &T) -> Result<Self, RouterError> {
        Self::discover(object.operations())
    }

    /// Attach a state accessor for context-aware argument validation.
    #[must_use]
    pub fn with_state(mut self, state: Arc<dyn StateReader>) -> Self {
        self.state = Some(state);
        self
    }

    fn lookup(&self, method: &str) -> Result<(&Endpoint, &BoundHandler), RouterError> {
        match (self.methods.get(method), self.entries.get(method)) {
            (Some(endpoint), Some(handler)) => Ok((endpoint, handler)),
            _ => Err(RouterError::UnsupportedMethod {
                method: method.to_string(),
            }),
        }
    }
}

#[async_trait]
impl MethodRouter for ConventionRouter {
    fn methods(&self) -> &HashMap<String, Endpoint> {
        &self.methods
    }

    fn check(&self, method: &str, args: &[Bytes]) -> Result<(), RouterError> {
        let (endpoint, handler) = self.lookup(method)?;
        pipeline::check_call(endpoint, handler, args, self.state.as_deref())
    }

    async fn invoke(
        &self,
        ctx: CallContext,
        method: &str,
        args: &[Bytes],
    ) -> Result<Bytes, RouterError> {
        let (endpoint, handler) = self.lookup(method)?;
        pipeline::invoke_call(endpoint, handler, ctx, args).await
    }
}

fn classify(declared: &str) -> Option<(MethodCategory, &str)> {
    PREFIXES
        .iter()
        .find_map(|(prefix, category)| declared.strip_prefix(prefix).map(|rest| (*category, rest)))
}

fn external_name(remainder: &str) -> String {
    let mut chars = remainder.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().chain(chars).collect(),
        None => String::new(),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use crossbar_core::{
        reply, FieldDescriptor, MessageDescriptor, Reply, ReplyError, Sender, ValidationResult,
    };
    use serde::{Deserialize, Serialize};

    use super::*;
    use crate::handler::OperationDef;

    // ----- fixtures -----

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct TransferRequest {
        to: String,
        amount: u64,
        #[serde(skip_serializing_if = "Option::is_none", default)]
        memo: Option<String>,
    }

    const TRANSFER_REQUEST: MessageDescriptor = MessageDescriptor {
        name: "TransferRequest",
        fields: &[
            FieldDescriptor {
                name: "to",
                required: true,
            },
            FieldDescriptor {
                name: "amount",
                required: true,
            },
            FieldDescriptor {
                name: "memo",
                required: false,
            },
        ],
    };

    impl crossbar_core::ArgValue for TransferRequest {
        fn shape_name() -> &'static str {
            "TransferRequest"
        }

        fn descriptor() -> Option<&'static MessageDescriptor> {
            Some(&TRANSFER_REQUEST)
        }

        fn validate(&self) -> ValidationResult {
            if self.amount == 0 {
                ValidationResult::invalid("amount must be positive")
            } else {
                ValidationResult::Valid
            }
        }

        fn validate_with(&self, state: &dyn StateReader) -> ValidationResult {
            if state.contains(&format!("accounts/{}", self.to)) {
                ValidationResult::Valid
            } else {
                ValidationResult::invalid(format!("unknown account `{}`", self.to))
            }
        }
    }

    #[derive(Debug, Serialize)]
    struct TransferReceipt {
        from: String,
        to: String,
        amount: u64,
    }

    impl Reply for TransferReceipt {
        fn encode(self) -> Result<Vec<u8>, ReplyError> {
            reply::json(&self)
        }
    }

    struct Treasury {
        balances: std::sync::Arc<HashMap<String, u64>>,
    }

    impl Treasury {
        fn new() -> Self {
            let mut balances = HashMap::new();
            balances.insert("acct:alice".to_string(), 100);
            balances.insert("acct:bob".to_string(), 5);
            Self {
                balances: std::sync::Arc::new(balances),
            }
        }
    }

    impl OperationSet for Treasury {
        fn operations(&self) -> Vec<OperationDef> {
            let balances = std::sync::Arc::clone(&self.balances);
            let transfer = move |_ctx: CallContext, sender: Sender, req: TransferRequest| {
                let balances = std::sync::Arc::clone(&balances);
                async move {
                    if req.to == "frozen" {
                        return Err(anyhow::anyhow!("account frozen"));
                    }
                    let held = balances.get(sender.id()).copied().unwrap_or(0);
                    if held < req.amount {
                        return Err(anyhow::anyhow!("insufficient funds"));
                    }
                    Ok(TransferReceipt {
                        from: sender.id().to_string(),
                        to: req.to,
                        amount: req.amount,
                    })
                }
            };

            let balances = std::sync::Arc::clone(&self.balances);
            let balance = move |_ctx: CallContext, account: String| {
                let balances = std::sync::Arc::clone(&balances);
                async move { balances.get(&account).copied().unwrap_or(0) }
            };

            vec![
                OperationDef::new("ExecuteTransfer", transfer),
                OperationDef::new(
                    "ApplyCredit",
                    |_ctx: CallContext, account: String, amount: u64| async move {
                        (account, amount)
                    },
                ),
                OperationDef::new("QueryBalance", balance),
                OperationDef::new("QueryHeight", |_ctx: CallContext| async move { 7u64 }),
                OperationDef::new("QueryEcho", |_ctx: CallContext, text: String| async move {
                    text
                }),
                OperationDef::new("RebuildIndexes", |_ctx: CallContext| async move {}),
            ]
        }
    }

    struct MemState(HashMap<String, Vec<u8>>);

    impl StateReader for MemState {
        fn get(&self, key: &str) -> Option<Vec<u8>> {
            self.0.get(key).cloned()
        }
    }

    fn known_accounts() -> std::sync::Arc<dyn StateReader> {
        let mut entries = HashMap::new();
        entries.insert("accounts/acct:bob".to_string(), vec![1]);
        std::sync::Arc::new(MemState(entries))
    }

    fn router() -> ConventionRouter {
        ConventionRouter::for_object(&Treasury::new()).unwrap()
    }

    fn arg(raw: &str) -> Bytes {
        Bytes::copy_from_slice(raw.as_bytes())
    }

    // ----- discovery -----

    #[test]
    fn discovery_is_deterministic() {
        let treasury = Treasury::new();
        let first = ConventionRouter::for_object(&treasury).unwrap();
        let second = ConventionRouter::for_object(&treasury).unwrap();
        assert_eq!(first.methods(), second.methods());
    }

    #[test]
    fn classifies_all_three_prefixes() {
        let router = router();
        assert_eq!(
            router.methods()["transfer"].category,
            MethodCategory::MutatingBatched
        );
        assert_eq!(
            router.methods()["credit"].category,
            MethodCategory::MutatingImmediate
        );
        assert_eq!(router.methods()["balance"].category, MethodCategory::ReadOnly);
    }

    #[test]
    fn skips_operations_without_a_recognized_prefix() {
        let router = router();
        assert!(!router.methods().contains_key("rebuildIndexes"));
        assert!(!router.methods().contains_key("indexes"));
        assert_eq!(router.methods().len(), 5);
    }

    #[test]
    fn empty_remainder_is_an_invalid_method_name() {
        let table = vec![OperationDef::new("Query", |_ctx: CallContext| async move {})];
        let err = ConventionRouter::discover(table).unwrap_err();
        assert!(matches!(
            err,
            RouterError::InvalidMethodName { declared } if declared == "Query"
        ));
    }

    #[test]
    fn duplicate_external_names_fail_discovery() {
        let table = vec![
            OperationDef::new("QueryBalance", |_ctx: CallContext| async move { 0u64 }),
            OperationDef::new("QueryBalance", |_ctx: CallContext| async move { 1u64 }),
        ];
        let err = ConventionRouter::discover(table).unwrap_err();
        assert!(matches!(
            err,
            RouterError::MethodAlreadyDefined { method } if method == "balance"
        ));
    }

    #[test]
    fn authenticated_operation_counts_the_identity_slot() {
        let router = router();
        let endpoint = &router.methods()["transfer"];
        assert!(endpoint.auth_required);
        assert_eq!(endpoint.arg_count, 2);
        assert!(endpoint.returns_error);
    }

    #[test]
    fn read_only_nullary_endpoint_shape() {
        let router = router();
        let endpoint = &router.methods()["height"];
        assert_eq!(endpoint.category, MethodCategory::ReadOnly);
        assert!(!endpoint.auth_required);
        assert_eq!(endpoint.arg_count, 0);
        assert!(!endpoint.returns_error);
    }

    // ----- check -----

    #[test]
    fn check_rejects_a_missing_identity_argument() {
        let router = router();
        let err = router
            .check("transfer", &[arg(r#"{"to":"acct:bob","amount":3}"#)])
            .unwrap_err();
        assert!(matches!(
            err,
            RouterError::InvalidNumberOfArguments {
                expected: 2,
                got: 1,
                ..
            }
        ));
    }

    #[test]
    fn check_decodes_and_validates_the_payload() {
        let router = router();
        router
            .check(
                "transfer",
                &[arg("acct:alice"), arg(r#"{"to":"acct:bob","amount":3}"#)],
            )
            .unwrap();

        let err = router
            .check(
                "transfer",
                &[arg("acct:alice"), arg(r#"{"to":"acct:bob","amount":0}"#)],
            )
            .unwrap_err();
        match err {
            RouterError::InvalidArgumentValue { method, index, reason } => {
                assert_eq!(method, "transfer");
                assert_eq!(index, 1);
                assert!(reason.contains("positive"), "{reason}");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn stateful_validation_runs_only_with_a_state_accessor() {
        let payload = r#"{"to":"acct:carol","amount":3}"#;

        let stateless = router();
        stateless
            .check("transfer", &[arg("acct:alice"), arg(payload)])
            .unwrap();

        let stateful = router().with_state(known_accounts());
        let err = stateful
            .check("transfer", &[arg("acct:alice"), arg(payload)])
            .unwrap_err();
        match err {
            RouterError::InvalidArgumentValue { reason, .. } => {
                assert!(reason.contains("acct:carol"), "{reason}");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn unknown_method_is_unsupported() {
        let router = router();
        let err = router.check("mint", &[]).unwrap_err();
        assert!(matches!(err, RouterError::UnsupportedMethod { method } if method == "mint"));
    }

    // ----- invoke -----

    #[tokio::test]
    async fn invoke_drops_the_identity_and_decodes_the_payload() {
        let router = router();
        let out = router
            .invoke(
                CallContext::default(),
                "transfer",
                &[arg("acct:alice"), arg(r#"{"to":"acct:bob","amount":3}"#)],
            )
            .await
            .unwrap();
        let receipt: serde_json::Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(receipt["from"], "acct:alice");
        assert_eq!(receipt["to"], "acct:bob");
        assert_eq!(receipt["amount"], 3);
    }

    #[tokio::test]
    async fn invoke_rejects_a_missing_identity_argument() {
        let router = router();
        let err = router
            .invoke(
                CallContext::default(),
                "transfer",
                &[arg(r#"{"to":"acct:bob","amount":3}"#)],
            )
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            RouterError::InvalidNumberOfArguments {
                expected: 2,
                got: 1,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn nullary_invoke_returns_the_structured_result() {
        let router = router();
        let out = router
            .invoke(CallContext::default(), "height", &[])
            .await
            .unwrap();
        assert_eq!(&out[..], b"7");
    }

    #[tokio::test]
    async fn string_argument_stays_verbatim() {
        // "123" is also valid structured data; the string shape wins.
        let router = router();
        let out = router
            .invoke(CallContext::default(), "echo", &[arg("123")])
            .await
            .unwrap();
        assert_eq!(&out[..], b"\"123\"");
    }

    #[tokio::test]
    async fn multiple_results_encode_as_an_ordered_sequence() {
        let router = router();
        let out = router
            .invoke(
                CallContext::default(),
                "credit",
                &[arg("acct:bob"), arg("40")],
            )
            .await
            .unwrap();
        let value: serde_json::Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(value, serde_json::json!(["acct:bob", 40]));
    }

    #[tokio::test]
    async fn business_error_passes_through_unwrapped() {
        let router = router();
        let err = router
            .invoke(
                CallContext::default(),
                "transfer",
                &[arg("acct:alice"), arg(r#"{"to":"frozen","amount":3}"#)],
            )
            .await
            .unwrap_err();
        match err {
            RouterError::Operation(inner) => assert_eq!(inner.to_string(), "account frozen"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn binary_payloads_decode_through_the_generic_strategy() {
        let router = router();
        let req = TransferRequest {
            to: "acct:bob".to_string(),
            amount: 2,
            memo: None,
        };
        let raw = rmp_serde::to_vec_named(&req).unwrap();
        let out = router
            .invoke(
                CallContext::default(),
                "transfer",
                &[arg("acct:alice"), Bytes::from(raw)],
            )
            .await
            .unwrap();
        let receipt: serde_json::Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(receipt["amount"], 2);
        assert_eq!(receipt["to"], "acct:bob");
    }

    #[tokio::test]
    async fn invalid_payload_names_the_argument_and_method() {
        let router = router();
        let err = router
            .invoke(
                CallContext::default(),
                "transfer",
                &[arg("acct:alice"), arg("not a transfer")],
            )
            .await
            .unwrap_err();
        match err {
            RouterError::InvalidArgumentValue { method, index, .. } => {
                assert_eq!(method, "transfer");
                assert_eq!(index, 1);
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
