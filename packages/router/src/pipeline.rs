//! Shared per-call pipeline: arity verification, identity-slot handling,
//! payload decode, and result encoding are identical for every discovery
//! flavor, so both routers funnel through these two entry points.

use bytes::Bytes;
use crossbar_core::{Sender, StateReader};

use crate::context::CallContext;
use crate::endpoint::Endpoint;
use crate::error::RouterError;
use crate::handler::BoundHandler;

/// Validate a call without invoking it.
pub(crate) fn check_call(
    endpoint: &Endpoint,
    handler: &BoundHandler,
    args: &[Bytes],
    state: Option<&dyn StateReader>,
) -> Result<(), RouterError> {
    let (_, payload) = split_identity_slot(endpoint, args)?;
    handler.check_payload(&endpoint.name, payload_base(endpoint), payload, state)
}

/// Dispatch a call to the bound operation and encode its result.
pub(crate) async fn invoke_call(
    endpoint: &Endpoint,
    handler: &BoundHandler,
    mut ctx: CallContext,
    args: &[Bytes],
) -> Result<Bytes, RouterError> {
    let (caller, payload) = split_identity_slot(endpoint, args)?;
    if caller.is_some() {
        ctx.caller = caller;
    }
    let bytes = handler
        .invoke_payload(ctx, endpoint.name.clone(), payload_base(endpoint), payload.to_vec())
        .await?;
    Ok(Bytes::from(bytes))
}

/// Position of the first payload argument in the caller-visible list.
fn payload_base(endpoint: &Endpoint) -> usize {
    usize::from(endpoint.auth_required)
}

/// Verify arity and peel the identity slot off authenticated calls.
///
/// The identity was verified by the external dispatcher; it is wrapped, not
/// decoded, and never validated here.
fn split_identity_slot<'a>(
    endpoint: &Endpoint,
    args: &'a [Bytes],
) -> Result<(Option<Sender>, &'a [Bytes]), RouterError> {
    if args.len() != endpoint.arg_count {
        return Err(RouterError::InvalidNumberOfArguments {
            method: endpoint.name.clone(),
            expected: endpoint.arg_count,
            got: args.len(),
        });
    }
    if !endpoint.auth_required {
        return Ok((None, args));
    }
    let identity =
        std::str::from_utf8(&args[0]).map_err(|_| RouterError::InvalidArgumentValue {
            method: endpoint.name.clone(),
            index: 0,
            reason: "caller identity is not valid UTF-8".to_string(),
        })?;
    Ok((Some(Sender::new(identity)), &args[1..]))
}
