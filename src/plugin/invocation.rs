use super::signature::{Capability, MethodId};
use crate::cache::CacheKey;
use crate::core::{MapperError, Result};
use crate::driver::DriverRequest;
use crate::executor::{
    Executor, ParameterHandler, ResultSetHandler, SharedResultHandler, StatementHandler,
};
use crate::mapping::{BoundCommand, MappedStatement, RowBounds};
use crate::result::QueryResult;
use crate::scripting::Parameter;
use std::any::type_name;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Argument of an intercepted call, owned so interceptors can replace it.
#[derive(Clone)]
pub enum Arg {
    Statement(Arc<MappedStatement>),
    Parameter(Parameter),
    RowBounds(RowBounds),
    ResultHandler(Option<SharedResultHandler>),
    CacheKey(CacheKey),
    Command(BoundCommand),
    Flag(bool),
    Request(DriverRequest),
    Result(QueryResult),
}

impl Arg {
    /// Type name as used in signatures.
    pub fn kind(&self) -> &'static str {
        match self {
            Arg::Statement(_) => "MappedStatement",
            Arg::Parameter(_) => "Parameter",
            Arg::RowBounds(_) => "RowBounds",
            Arg::ResultHandler(_) => "ResultHandler",
            Arg::CacheKey(_) => "CacheKey",
            Arg::Command(_) => "BoundCommand",
            Arg::Flag(_) => "bool",
            Arg::Request(_) => "DriverRequest",
            Arg::Result(_) => "QueryResult",
        }
    }

    pub fn as_statement(&self) -> Option<&Arc<MappedStatement>> {
        match self {
            Arg::Statement(ms) => Some(ms),
            _ => None,
        }
    }

    pub fn as_request_mut(&mut self) -> Option<&mut DriverRequest> {
        match self {
            Arg::Request(request) => Some(request),
            _ => None,
        }
    }
}

impl fmt::Debug for Arg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Arg::Statement(ms) => write!(f, "Statement({})", ms.id),
            Arg::Parameter(p) => write!(f, "Parameter({:?})", p),
            Arg::RowBounds(b) => write!(f, "RowBounds({:?})", b),
            Arg::ResultHandler(h) => write!(f, "ResultHandler({})", if h.is_some() { "Some" } else { "None" }),
            Arg::CacheKey(k) => write!(f, "CacheKey({})", k),
            Arg::Command(c) => write!(f, "Command({:?})", c.sql),
            Arg::Flag(b) => write!(f, "Flag({})", b),
            Arg::Request(r) => write!(f, "Request({:?})", r.sql),
            Arg::Result(r) => write!(f, "Result({} rows)", r.row_count()),
        }
    }
}

/// Return value of an intercepted call.
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    Count(u64),
    Result(QueryResult),
    Key(CacheKey),
    Flag(bool),
    Request(DriverRequest),
    Unit,
}

impl Reply {
    pub fn kind(&self) -> &'static str {
        match self {
            Reply::Count(_) => "u64",
            Reply::Result(_) => "QueryResult",
            Reply::Key(_) => "CacheKey",
            Reply::Flag(_) => "bool",
            Reply::Request(_) => "DriverRequest",
            Reply::Unit => "()",
        }
    }

    pub fn as_result_mut(&mut self) -> Option<&mut QueryResult> {
        match self {
            Reply::Result(result) => Some(result),
            _ => None,
        }
    }
}

/// Read-only view of the object behind an intercepted call.
#[derive(Clone, Copy)]
pub enum Target<'a> {
    Executor(&'a dyn Executor),
    StatementHandler(&'a dyn StatementHandler),
    ParameterHandler(&'a dyn ParameterHandler),
    ResultSetHandler(&'a dyn ResultSetHandler),
}

impl<'a> Target<'a> {
    pub fn capability(&self) -> Capability {
        match self {
            Target::Executor(_) => Capability::Executor,
            Target::StatementHandler(_) => Capability::StatementHandler,
            Target::ParameterHandler(_) => Capability::ParameterHandler,
            Target::ResultSetHandler(_) => Capability::ResultSetHandler,
        }
    }

    pub fn as_executor(self) -> Option<&'a dyn Executor> {
        match self {
            Target::Executor(executor) => Some(executor),
            _ => None,
        }
    }

    pub fn as_statement_handler(self) -> Option<&'a dyn StatementHandler> {
        match self {
            Target::StatementHandler(handler) => Some(handler),
            _ => None,
        }
    }

    pub fn as_parameter_handler(self) -> Option<&'a dyn ParameterHandler> {
        match self {
            Target::ParameterHandler(handler) => Some(handler),
            _ => None,
        }
    }

    pub fn as_result_set_handler(self) -> Option<&'a dyn ResultSetHandler> {
        match self {
            Target::ResultSetHandler(handler) => Some(handler),
            _ => None,
        }
    }
}

pub(crate) fn executor_view<T: Executor>(target: &T) -> Target<'_> {
    Target::Executor(target)
}

pub(crate) fn statement_view<T: StatementHandler>(target: &T) -> Target<'_> {
    Target::StatementHandler(target)
}

pub(crate) fn parameter_view<T: ParameterHandler>(target: &T) -> Target<'_> {
    Target::ParameterHandler(target)
}

pub(crate) fn result_set_view<T: ResultSetHandler>(target: &T) -> Target<'_> {
    Target::ResultSetHandler(target)
}

/// The wrapped object together with the next layer of the call.
pub trait Callee {
    fn target(&self) -> Target<'_>;

    fn target_type(&self) -> &'static str;

    fn call(&mut self, args: Vec<Arg>) -> Result<Reply>;
}

/// Callee for methods taking `&mut self`.
pub(crate) struct Exclusive<'t, T, F> {
    target: &'t mut T,
    view: fn(&T) -> Target<'_>,
    next: F,
}

impl<'t, T, F> Exclusive<'t, T, F> {
    pub(crate) fn new(target: &'t mut T, view: fn(&T) -> Target<'_>, next: F) -> Self
    where
        F: FnMut(&mut T, Vec<Arg>) -> Result<Reply>,
    {
        Self { target, view, next }
    }
}

impl<T, F> Callee for Exclusive<'_, T, F>
where
    F: FnMut(&mut T, Vec<Arg>) -> Result<Reply>,
{
    fn target(&self) -> Target<'_> {
        (self.view)(&*self.target)
    }

    fn target_type(&self) -> &'static str {
        type_name::<T>()
    }

    fn call(&mut self, args: Vec<Arg>) -> Result<Reply> {
        (self.next)(&mut *self.target, args)
    }
}

/// Callee for methods taking `&self`.
pub(crate) struct Shared<'t, T, F> {
    target: &'t T,
    view: fn(&T) -> Target<'_>,
    next: F,
}

impl<'t, T, F> Shared<'t, T, F> {
    pub(crate) fn new(target: &'t T, view: fn(&T) -> Target<'_>, next: F) -> Self
    where
        F: FnMut(&T, Vec<Arg>) -> Result<Reply>,
    {
        Self { target, view, next }
    }
}

impl<T, F> Callee for Shared<'_, T, F>
where
    F: FnMut(&T, Vec<Arg>) -> Result<Reply>,
{
    fn target(&self) -> Target<'_> {
        (self.view)(self.target)
    }

    fn target_type(&self) -> &'static str {
        type_name::<T>()
    }

    fn call(&mut self, args: Vec<Arg>) -> Result<Reply> {
        (self.next)(self.target, args)
    }
}

/// Reified call handed to [`Interceptor::intercept`].
///
/// `proceed` runs the next layer with the current arguments and may be
/// called any number of times, including not at all. `target` exposes the
/// wrapped object read-only, so an interceptor can inspect it before
/// deciding.
pub struct Invocation<'a> {
    method: MethodId,
    args: Vec<Arg>,
    callee: &'a mut dyn Callee,
}

impl<'a> Invocation<'a> {
    pub fn new(method: MethodId, args: Vec<Arg>, callee: &'a mut dyn Callee) -> Self {
        Self {
            method,
            args,
            callee,
        }
    }

    pub fn method(&self) -> MethodId {
        self.method
    }

    pub fn target(&self) -> Target<'_> {
        self.callee.target()
    }

    /// Type name of the wrapped target.
    pub fn target_type(&self) -> &'static str {
        self.callee.target_type()
    }

    pub fn args(&self) -> &[Arg] {
        &self.args
    }

    pub fn args_mut(&mut self) -> &mut Vec<Arg> {
        &mut self.args
    }

    pub fn proceed(&mut self) -> Result<Reply> {
        let args = self.args.clone();
        self.callee.call(args)
    }

    pub fn proceed_with(&mut self, args: Vec<Arg>) -> Result<Reply> {
        self.callee.call(args)
    }
}

/// Logic wrapped around matched pipeline calls.
pub trait Interceptor: Send + Sync {
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }

    fn signatures(&self) -> Vec<super::Signature>;

    fn intercept(&self, invocation: &mut Invocation<'_>) -> Result<Reply>;

    /// Called once at registration with the configured properties.
    fn set_properties(&mut self, _properties: &HashMap<String, String>) -> Result<()> {
        Ok(())
    }
}

pub trait FromArg: Sized {
    fn from_arg(arg: Arg) -> std::result::Result<Self, Arg>;
}

macro_rules! from_arg {
    ($ty:ty, $variant:ident) => {
        impl FromArg for $ty {
            fn from_arg(arg: Arg) -> std::result::Result<Self, Arg> {
                match arg {
                    Arg::$variant(value) => Ok(value),
                    other => Err(other),
                }
            }
        }
    };
}

from_arg!(Arc<MappedStatement>, Statement);
from_arg!(Parameter, Parameter);
from_arg!(RowBounds, RowBounds);
from_arg!(Option<SharedResultHandler>, ResultHandler);
from_arg!(CacheKey, CacheKey);
from_arg!(BoundCommand, Command);
from_arg!(bool, Flag);
from_arg!(DriverRequest, Request);
from_arg!(QueryResult, Result);

pub trait FromReply: Sized {
    fn from_reply(reply: Reply) -> std::result::Result<Self, Reply>;
}

macro_rules! reply_conversions {
    ($ty:ty, $variant:ident) => {
        impl FromReply for $ty {
            fn from_reply(reply: Reply) -> std::result::Result<Self, Reply> {
                match reply {
                    Reply::$variant(value) => Ok(value),
                    other => Err(other),
                }
            }
        }

        impl From<$ty> for Reply {
            fn from(value: $ty) -> Self {
                Reply::$variant(value)
            }
        }
    };
}

reply_conversions!(u64, Count);
reply_conversions!(QueryResult, Result);
reply_conversions!(CacheKey, Key);
reply_conversions!(bool, Flag);
reply_conversions!(DriverRequest, Request);

impl FromReply for () {
    fn from_reply(reply: Reply) -> std::result::Result<Self, Reply> {
        match reply {
            Reply::Unit => Ok(()),
            other => Err(other),
        }
    }
}

impl From<()> for Reply {
    fn from(_: ()) -> Self {
        Reply::Unit
    }
}

/// Pulls typed arguments back out of an argument list an interceptor may
/// have rewritten.
pub struct ArgReader {
    method: MethodId,
    args: std::vec::IntoIter<Arg>,
    position: usize,
}

impl ArgReader {
    pub fn new(method: MethodId, args: Vec<Arg>) -> Self {
        Self {
            method,
            args: args.into_iter(),
            position: 0,
        }
    }

    pub fn next<T: FromArg>(&mut self) -> Result<T> {
        let expected = self.method.params.get(self.position).copied().unwrap_or("?");
        let arg = self.args.next().ok_or_else(|| {
            MapperError::PluginConfigError(format!(
                "{} expects {} arguments, got {}",
                self.method,
                self.method.params.len(),
                self.position
            ))
        })?;
        let value = T::from_arg(arg).map_err(|arg| {
            MapperError::PluginConfigError(format!(
                "Argument {} of {} must be {}, got {}",
                self.position,
                self.method,
                expected,
                arg.kind()
            ))
        })?;
        self.position += 1;
        Ok(value)
    }

    pub fn finish(mut self) -> Result<()> {
        if self.args.next().is_some() {
            return Err(MapperError::PluginConfigError(format!(
                "{} expects {} arguments, got more",
                self.method,
                self.method.params.len()
            )));
        }
        Ok(())
    }
}

/// Route one call through `interceptor`, converting its reply back to the
/// method's return type.
pub(crate) fn invoke<R: FromReply>(
    interceptor: &dyn Interceptor,
    method: MethodId,
    args: Vec<Arg>,
    mut callee: impl Callee,
) -> Result<R> {
    let mut invocation = Invocation::new(method, args, &mut callee);
    let reply = interceptor.intercept(&mut invocation)?;
    R::from_reply(reply).map_err(|reply| {
        MapperError::PluginConfigError(format!(
            "Interceptor {} returned {} from {}",
            interceptor.name(),
            reply.kind(),
            method
        ))
    })
}
