//! Typed operation registration and its type-erased runtime form.
//!
//! `OperationDef` is the registration-table entry discovery works over: a
//! declared name plus a [`BoundHandler`] produced at compile time from a
//! typed async closure. Runtime dispatch is fully type-erased; typing is
//! enforced where the table is built, so a handler can never be called with
//! the wrong parameter shapes.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use bytes::Bytes;
use crossbar_core::{coerce, ArgValue, Reply, ReplyError, Sender, StateReader};

use crate::context::CallContext;
use crate::error::RouterError;

/// Boxed future returned by type-erased invoke closures.
pub type BoxFuture<T> = Pin<Box<dyn Future<Output = T> + Send>>;

type CheckFn = Arc<
    dyn Fn(&str, usize, &[Bytes], Option<&dyn StateReader>) -> Result<(), RouterError>
        + Send
        + Sync,
>;
type InvokeFn = Arc<
    dyn Fn(CallContext, String, usize, Vec<Bytes>) -> BoxFuture<Result<Vec<u8>, RouterError>>
        + Send
        + Sync,
>;

// ---------------------------------------------------------------------------
// BoundHandler
// ---------------------------------------------------------------------------

/// Type-erased handler carrying its compile-time call shape.
#[derive(Clone)]
pub struct BoundHandler {
    arg_count: usize,
    takes_sender: bool,
    returns_error: bool,
    check_fn: CheckFn,
    invoke_fn: InvokeFn,
}

impl BoundHandler {
    /// Declared arity, counting the sender slot when present.
    #[must_use]
    pub fn arg_count(&self) -> usize {
        self.arg_count
    }

    /// Whether the first declared parameter is the verified sender identity.
    #[must_use]
    pub fn takes_sender(&self) -> bool {
        self.takes_sender
    }

    /// Whether the return shape ends in an error slot.
    #[must_use]
    pub fn returns_error(&self) -> bool {
        self.returns_error
    }

    /// Decode and validate the payload arguments (identity slot already
    /// dropped). `base` is the position of the first payload argument in
    /// the caller-visible argument list.
    pub(crate) fn check_payload(
        &self,
        method: &str,
        base: usize,
        args: &[Bytes],
        state: Option<&dyn StateReader>,
    ) -> Result<(), RouterError> {
        (self.check_fn)(method, base, args, state)
    }

    /// Decode the payload arguments and run the bound operation.
    pub(crate) fn invoke_payload(
        &self,
        ctx: CallContext,
        method: String,
        base: usize,
        args: Vec<Bytes>,
    ) -> BoxFuture<Result<Vec<u8>, RouterError>> {
        (self.invoke_fn)(ctx, method, base, args)
    }
}

impl std::fmt::Debug for BoundHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoundHandler")
            .field("arg_count", &self.arg_count)
            .field("takes_sender", &self.takes_sender)
            .field("returns_error", &self.returns_error)
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// OperationDef
// ---------------------------------------------------------------------------

/// One registration-table entry: a declared operation name bound to a typed
/// handler. Convention discovery classifies entries by their declared name.
#[derive(Debug)]
pub struct OperationDef {
    declared_name: String,
    handler: BoundHandler,
}

impl OperationDef {
    /// Bind `handler` under the declared (pre-discovery) name.
    pub fn new<P, H>(declared_name: impl Into<String>, handler: H) -> Self
    where
        H: Handler<P>,
    {
        Self {
            declared_name: declared_name.into(),
            handler: handler.bind(),
        }
    }

    /// The declared name, before any convention transform.
    #[must_use]
    pub fn declared_name(&self) -> &str {
        &self.declared_name
    }

    pub(crate) fn into_parts(self) -> (String, BoundHandler) {
        (self.declared_name, self.handler)
    }
}

// ---------------------------------------------------------------------------
// ArgTuple
// ---------------------------------------------------------------------------

/// Positional parameter pack decoded from raw payload arguments.
pub trait ArgTuple: Sized + Send + 'static {
    /// Number of positional parameters in the pack.
    const COUNT: usize;

    /// Decode every element against its declared shape.
    ///
    /// # Errors
    ///
    /// `InvalidArgumentValue` naming the failing argument and method.
    fn coerce_all(method: &str, base: usize, args: &[Bytes]) -> Result<Self, RouterError>;

    /// Decode every element, then run self-validation and, when a state
    /// accessor is present, context-aware validation.
    ///
    /// # Errors
    ///
    /// `InvalidArgumentValue` naming the failing argument and method.
    fn check_all(
        method: &str,
        base: usize,
        args: &[Bytes],
        state: Option<&dyn StateReader>,
    ) -> Result<(), RouterError>;
}

fn arg_at<'a>(
    method: &str,
    expected: usize,
    args: &'a [Bytes],
    index: usize,
) -> Result<&'a Bytes, RouterError> {
    args.get(index)
        .ok_or_else(|| RouterError::InvalidNumberOfArguments {
            method: method.to_string(),
            expected,
            got: args.len(),
        })
}

fn coerce_one<T: ArgValue>(method: &str, index: usize, raw: &Bytes) -> Result<T, RouterError> {
    coerce::<T>(raw).map_err(|e| RouterError::InvalidArgumentValue {
        method: method.to_string(),
        index,
        reason: e.to_string(),
    })
}

fn check_one<T: ArgValue>(
    method: &str,
    index: usize,
    raw: &Bytes,
    state: Option<&dyn StateReader>,
) -> Result<(), RouterError> {
    let value = coerce_one::<T>(method, index, raw)?;
    if let Some(reason) = value.validate().message() {
        return Err(RouterError::InvalidArgumentValue {
            method: method.to_string(),
            index,
            reason,
        });
    }
    if let Some(state) = state {
        if let Some(reason) = value.validate_with(state).message() {
            return Err(RouterError::InvalidArgumentValue {
                method: method.to_string(),
                index,
                reason,
            });
        }
    }
    Ok(())
}

impl ArgTuple for () {
    const COUNT: usize = 0;

    fn coerce_all(_method: &str, _base: usize, _args: &[Bytes]) -> Result<Self, RouterError> {
        Ok(())
    }

    fn check_all(
        _method: &str,
        _base: usize,
        _args: &[Bytes],
        _state: Option<&dyn StateReader>,
    ) -> Result<(), RouterError> {
        Ok(())
    }
}

impl<A: ArgValue> ArgTuple for (A,) {
    const COUNT: usize = 1;

    fn coerce_all(method: &str, base: usize, args: &[Bytes]) -> Result<Self, RouterError> {
        let a = coerce_one::<A>(method, base, arg_at(method, Self::COUNT, args, 0)?)?;
        Ok((a,))
    }

    fn check_all(
        method: &str,
        base: usize,
        args: &[Bytes],
        state: Option<&dyn StateReader>,
    ) -> Result<(), RouterError> {
        check_one::<A>(method, base, arg_at(method, Self::COUNT, args, 0)?, state)
    }
}

impl<A: ArgValue, B: ArgValue> ArgTuple for (A, B) {
    const COUNT: usize = 2;

    fn coerce_all(method: &str, base: usize, args: &[Bytes]) -> Result<Self, RouterError> {
        let a = coerce_one::<A>(method, base, arg_at(method, Self::COUNT, args, 0)?)?;
        let b = coerce_one::<B>(method, base + 1, arg_at(method, Self::COUNT, args, 1)?)?;
        Ok((a, b))
    }

    fn check_all(
        method: &str,
        base: usize,
        args: &[Bytes],
        state: Option<&dyn StateReader>,
    ) -> Result<(), RouterError> {
        check_one::<A>(method, base, arg_at(method, Self::COUNT, args, 0)?, state)?;
        check_one::<B>(method, base + 1, arg_at(method, Self::COUNT, args, 1)?, state)
    }
}

impl<A: ArgValue, B: ArgValue, C: ArgValue> ArgTuple for (A, B, C) {
    const COUNT: usize = 3;

    fn coerce_all(method: &str, base: usize, args: &[Bytes]) -> Result<Self, RouterError> {
        let a = coerce_one::<A>(method, base, arg_at(method, Self::COUNT, args, 0)?)?;
        let b = coerce_one::<B>(method, base + 1, arg_at(method, Self::COUNT, args, 1)?)?;
        let c = coerce_one::<C>(method, base + 2, arg_at(method, Self::COUNT, args, 2)?)?;
        Ok((a, b, c))
    }

    fn check_all(
        method: &str,
        base: usize,
        args: &[Bytes],
        state: Option<&dyn StateReader>,
    ) -> Result<(), RouterError> {
        check_one::<A>(method, base, arg_at(method, Self::COUNT, args, 0)?, state)?;
        check_one::<B>(method, base + 1, arg_at(method, Self::COUNT, args, 1)?, state)?;
        check_one::<C>(method, base + 2, arg_at(method, Self::COUNT, args, 2)?, state)
    }
}

// ---------------------------------------------------------------------------
// Handler
// ---------------------------------------------------------------------------

/// Marker distinguishing handlers whose first parameter is the verified
/// sender identity.
pub struct Auth<P>(std::marker::PhantomData<P>);

/// A typed async closure that can be bound into the registration table.
///
/// `P` is a marker naming the parameter pack, wrapped in [`Auth`] when the
/// first parameter is [`Sender`]; it lets one [`OperationDef::new`] entry
/// point accept every supported arity without overlapping impls.
pub trait Handler<P>: Send + Sync + Sized + 'static {
    /// Erase the handler into its runtime form.
    fn bind(self) -> BoundHandler;
}

fn check_nothing(
    _method: &str,
    _base: usize,
    _args: &[Bytes],
    _state: Option<&dyn StateReader>,
) -> Result<(), RouterError> {
    Ok(())
}

fn encode_reply<R: Reply>(reply: R) -> Result<Vec<u8>, RouterError> {
    match reply.encode() {
        Ok(bytes) => Ok(bytes),
        Err(ReplyError::Operation(err)) => Err(RouterError::Operation(err)),
        Err(err @ ReplyError::Encode(_)) => Err(RouterError::Operation(anyhow::Error::new(err))),
    }
}

fn missing_caller() -> RouterError {
    RouterError::Operation(anyhow::anyhow!("caller identity missing from call context"))
}

impl<F, Fut, R> Handler<()> for F
where
    F: Fn(CallContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: Reply,
{
    fn bind(self) -> BoundHandler {
        let f = Arc::new(self);
        BoundHandler {
            arg_count: 0,
            takes_sender: false,
            returns_error: R::RETURNS_ERROR,
            check_fn: Arc::new(check_nothing),
            invoke_fn: Arc::new(move |ctx, _method, _base, _args| {
                let f = Arc::clone(&f);
                Box::pin(async move { encode_reply(f(ctx).await) })
            }),
        }
    }
}

impl<F, Fut, R, A> Handler<(A,)> for F
where
    F: Fn(CallContext, A) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: Reply,
    A: ArgValue,
{
    fn bind(self) -> BoundHandler {
        let f = Arc::new(self);
        BoundHandler {
            arg_count: 1,
            takes_sender: false,
            returns_error: R::RETURNS_ERROR,
            check_fn: Arc::new(<(A,) as ArgTuple>::check_all),
            invoke_fn: Arc::new(move |ctx, method, base, args| {
                let f = Arc::clone(&f);
                Box::pin(async move {
                    let (a,) = <(A,) as ArgTuple>::coerce_all(&method, base, &args)?;
                    encode_reply(f(ctx, a).await)
                })
            }),
        }
    }
}

impl<F, Fut, R, A, B> Handler<(A, B)> for F
where
    F: Fn(CallContext, A, B) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: Reply,
    A: ArgValue,
    B: ArgValue,
{
    fn bind(self) -> BoundHandler {
        let f = Arc::new(self);
        BoundHandler {
            arg_count: 2,
            takes_sender: false,
            returns_error: R::RETURNS_ERROR,
            check_fn: Arc::new(<(A, B) as ArgTuple>::check_all),
            invoke_fn: Arc::new(move |ctx, method, base, args| {
                let f = Arc::clone(&f);
                Box::pin(async move {
                    let (a, b) = <(A, B) as ArgTuple>::coerce_all(&method, base, &args)?;
                    encode_reply(f(ctx, a, b).await)
                })
            }),
        }
    }
}

impl<F, Fut, R, A, B, C> Handler<(A, B, C)> for F
where
    F: Fn(CallContext, A, B, C) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: Reply,
    A: ArgValue,
    B: ArgValue,
    C: ArgValue,
{
    fn bind(self) -> BoundHandler {
        let f = Arc::new(self);
        BoundHandler {
            arg_count: 3,
            takes_sender: false,
            returns_error: R::RETURNS_ERROR,
            check_fn: Arc::new(<(A, B, C) as ArgTuple>::check_all),
            invoke_fn: Arc::new(move |ctx, method, base, args| {
                let f = Arc::clone(&f);
                Box::pin(async move {
                    let (a, b, c) = <(A, B, C) as ArgTuple>::coerce_all(&method, base, &args)?;
                    encode_reply(f(ctx, a, b, c).await)
                })
            }),
        }
    }
}

impl<F, Fut, R> Handler<Auth<()>> for F
where
    F: Fn(CallContext, Sender) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: Reply,
{
    fn bind(self) -> BoundHandler {
        let f = Arc::new(self);
        BoundHandler {
            arg_count: 1,
            takes_sender: true,
            returns_error: R::RETURNS_ERROR,
            check_fn: Arc::new(check_nothing),
            invoke_fn: Arc::new(move |ctx, _method, _base, _args| {
                let f = Arc::clone(&f);
                Box::pin(async move {
                    let Some(sender) = ctx.caller.clone() else {
                        return Err(missing_caller());
                    };
                    encode_reply(f(ctx, sender).await)
                })
            }),
        }
    }
}

impl<F, Fut, R, A> Handler<Auth<(A,)>> for F
where
    F: Fn(CallContext, Sender, A) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: Reply,
    A: ArgValue,
{
    fn bind(self) -> BoundHandler {
        let f = Arc::new(self);
        BoundHandler {
            arg_count: 2,
            takes_sender: true,
            returns_error: R::RETURNS_ERROR,
            check_fn: Arc::new(<(A,) as ArgTuple>::check_all),
            invoke_fn: Arc::new(move |ctx, method, base, args| {
                let f = Arc::clone(&f);
                Box::pin(async move {
                    let Some(sender) = ctx.caller.clone() else {
                        return Err(missing_caller());
                    };
                    let (a,) = <(A,) as ArgTuple>::coerce_all(&method, base, &args)?;
                    encode_reply(f(ctx, sender, a).await)
                })
            }),
        }
    }
}

impl<F, Fut, R, A, B> Handler<Auth<(A, B)>> for F
where
    F: Fn(CallContext, Sender, A, B) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: Reply,
    A: ArgValue,
    B: ArgValue,
{
    fn bind(self) -> BoundHandler {
        let f = Arc::new(self);
        BoundHandler {
            arg_count: 3,
            takes_sender: true,
            returns_error: R::RETURNS_ERROR,
            check_fn: Arc::new(<(A, B) as ArgTuple>::check_all),
            invoke_fn: Arc::new(move |ctx, method, base, args| {
                let f = Arc::clone(&f);
                Box::pin(async move {
                    let Some(sender) = ctx.caller.clone() else {
                        return Err(missing_caller());
                    };
                    let (a, b) = <(A, B) as ArgTuple>::coerce_all(&method, base, &args)?;
                    encode_reply(f(ctx, sender, a, b).await)
                })
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
