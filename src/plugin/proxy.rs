use super::invocation::{
    executor_view, invoke, parameter_view, result_set_view, statement_view, Arg, ArgReader,
    Exclusive, Interceptor, Reply, Shared,
};
use super::signature::{methods, Capability, MethodId, ProxyBinding, Signature};
use crate::cache::CacheKey;
use crate::core::Result;
use crate::driver::DriverRequest;
use crate::executor::{
    Executor, ParameterHandler, ResultSetHandler, SharedResultHandler, StatementHandler,
};
use crate::mapping::{BoundCommand, MappedStatement, RowBounds};
use crate::result::QueryResult;
use crate::scripting::Parameter;
use std::sync::Arc;

/// Pipeline interfaces a type implements.
pub trait Capabilities {
    const CAPABILITIES: &'static [Capability];
}

/// Pipeline objects the interceptor chain can re-wrap in place.
pub trait Pluggable: Capabilities + Sized {
    fn from_proxy(proxy: Proxy<Self>) -> Self;
}

macro_rules! boxed_pluggable {
    ($tr:ident) => {
        impl Capabilities for Box<dyn $tr> {
            const CAPABILITIES: &'static [Capability] = &[Capability::$tr];
        }

        impl Pluggable for Box<dyn $tr> {
            fn from_proxy(proxy: Proxy<Self>) -> Self {
                Box::new(proxy)
            }
        }
    };
}

boxed_pluggable!(Executor);
boxed_pluggable!(StatementHandler);
boxed_pluggable!(ParameterHandler);
boxed_pluggable!(ResultSetHandler);

/// An interceptor with its signatures resolved.
#[derive(Clone)]
pub struct Plugin {
    interceptor: Arc<dyn Interceptor>,
    binding: Arc<ProxyBinding>,
}

/// Outcome of [`Plugin::wrap`].
pub enum Plugged<T> {
    /// None of the target's interfaces are intercepted.
    Unchanged(T),
    Proxied(Proxy<T>),
}

impl<T> Plugged<T> {
    pub fn is_proxied(&self) -> bool {
        matches!(self, Plugged::Proxied(_))
    }

    pub fn target(&self) -> &T {
        match self {
            Plugged::Unchanged(target) => target,
            Plugged::Proxied(proxy) => proxy.target(),
        }
    }
}

impl Plugin {
    /// Resolve the interceptor's signatures. Unknown methods fail here, not
    /// at call time.
    pub fn new(interceptor: Arc<dyn Interceptor>) -> Result<Self> {
        let binding = ProxyBinding::resolve(interceptor.name(), &interceptor.signatures())?;
        Ok(Self {
            interceptor,
            binding: Arc::new(binding),
        })
    }

    /// Resolve `signatures` directly, without asking the interceptor.
    pub fn with_signatures(interceptor: Arc<dyn Interceptor>, signatures: &[Signature]) -> Result<Self> {
        let binding = ProxyBinding::resolve(interceptor.name(), signatures)?;
        Ok(Self {
            interceptor,
            binding: Arc::new(binding),
        })
    }

    pub fn interceptor(&self) -> &Arc<dyn Interceptor> {
        &self.interceptor
    }

    pub fn binding(&self) -> &ProxyBinding {
        &self.binding
    }

    pub fn wrap<T: Capabilities>(&self, target: T) -> Plugged<T> {
        if self.binding.intersect(T::CAPABILITIES).is_empty() {
            return Plugged::Unchanged(target);
        }
        Plugged::Proxied(Proxy {
            target,
            interceptor: Arc::clone(&self.interceptor),
            binding: Arc::clone(&self.binding),
        })
    }

    /// Wrap and fold the result back into the target's own type.
    pub fn plug<T: Pluggable>(&self, target: T) -> T {
        match self.wrap(target) {
            Plugged::Unchanged(target) => target,
            Plugged::Proxied(proxy) => T::from_proxy(proxy),
        }
    }
}

/// Statically dispatched wrapper routing declared methods through an
/// interceptor.
///
/// The proxy implements every pipeline interface its target implements,
/// not only the interfaces the interceptor's signatures name. Methods
/// outside the binding, including whole interfaces the interceptor never
/// mentions, are forwarded to the target unchanged, so callers see the same
/// behavior as an unwrapped target. [`Plugin::wrap`] skips targets sharing
/// no interface with the binding.
pub struct Proxy<T> {
    target: T,
    interceptor: Arc<dyn Interceptor>,
    binding: Arc<ProxyBinding>,
}

impl<T> Proxy<T> {
    pub fn target(&self) -> &T {
        &self.target
    }

    pub fn into_target(self) -> T {
        self.target
    }

    fn intercepts(&self, method: &MethodId) -> bool {
        self.binding.intercepts(method)
    }
}

impl<T: Capabilities> Capabilities for Proxy<T> {
    const CAPABILITIES: &'static [Capability] = T::CAPABILITIES;
}

impl<T: Executor> Executor for Proxy<T> {
    fn update(&mut self, ms: &Arc<MappedStatement>, parameter: &Parameter) -> Result<u64> {
        let method = methods::EXECUTOR_UPDATE;
        if !self.intercepts(&method) {
            return self.target.update(ms, parameter);
        }
        let args = vec![Arg::Statement(Arc::clone(ms)), Arg::Parameter(parameter.clone())];
        let callee = Exclusive::new(&mut self.target, executor_view::<T>, |target, args| {
            let mut args = ArgReader::new(method, args);
            let ms: Arc<MappedStatement> = args.next()?;
            let parameter: Parameter = args.next()?;
            args.finish()?;
            target.update(&ms, &parameter).map(Reply::from)
        });
        invoke(self.interceptor.as_ref(), method, args, callee)
    }

    fn query(
        &mut self,
        ms: &Arc<MappedStatement>,
        parameter: &Parameter,
        bounds: RowBounds,
        handler: Option<SharedResultHandler>,
    ) -> Result<QueryResult> {
        let method = methods::EXECUTOR_QUERY;
        if !self.intercepts(&method) {
            return self.target.query(ms, parameter, bounds, handler);
        }
        let args = vec![
            Arg::Statement(Arc::clone(ms)),
            Arg::Parameter(parameter.clone()),
            Arg::RowBounds(bounds),
            Arg::ResultHandler(handler),
        ];
        let callee = Exclusive::new(&mut self.target, executor_view::<T>, |target, args| {
            let mut args = ArgReader::new(method, args);
            let ms: Arc<MappedStatement> = args.next()?;
            let parameter: Parameter = args.next()?;
            let bounds: RowBounds = args.next()?;
            let handler: Option<SharedResultHandler> = args.next()?;
            args.finish()?;
            target.query(&ms, &parameter, bounds, handler).map(Reply::from)
        });
        invoke(self.interceptor.as_ref(), method, args, callee)
    }

    fn query_bound(
        &mut self,
        ms: &Arc<MappedStatement>,
        parameter: &Parameter,
        bounds: RowBounds,
        handler: Option<SharedResultHandler>,
        key: &CacheKey,
        command: &BoundCommand,
    ) -> Result<QueryResult> {
        let method = methods::EXECUTOR_QUERY_BOUND;
        if !self.intercepts(&method) {
            return self
                .target
                .query_bound(ms, parameter, bounds, handler, key, command);
        }
        let args = vec![
            Arg::Statement(Arc::clone(ms)),
            Arg::Parameter(parameter.clone()),
            Arg::RowBounds(bounds),
            Arg::ResultHandler(handler),
            Arg::CacheKey(key.clone()),
            Arg::Command(command.clone()),
        ];
        let callee = Exclusive::new(&mut self.target, executor_view::<T>, |target, args| {
            let mut args = ArgReader::new(method, args);
            let ms: Arc<MappedStatement> = args.next()?;
            let parameter: Parameter = args.next()?;
            let bounds: RowBounds = args.next()?;
            let handler: Option<SharedResultHandler> = args.next()?;
            let key: CacheKey = args.next()?;
            let command: BoundCommand = args.next()?;
            args.finish()?;
            target
                .query_bound(&ms, &parameter, bounds, handler, &key, &command)
                .map(Reply::from)
        });
        invoke(self.interceptor.as_ref(), method, args, callee)
    }

    fn commit(&mut self, required: bool) -> Result<()> {
        let method = methods::EXECUTOR_COMMIT;
        if !self.intercepts(&method) {
            return self.target.commit(required);
        }
        let callee = Exclusive::new(&mut self.target, executor_view::<T>, |target, args| {
            let mut args = ArgReader::new(method, args);
            let required: bool = args.next()?;
            args.finish()?;
            target.commit(required).map(Reply::from)
        });
        invoke(self.interceptor.as_ref(), method, vec![Arg::Flag(required)], callee)
    }

    fn rollback(&mut self, required: bool) -> Result<()> {
        let method = methods::EXECUTOR_ROLLBACK;
        if !self.intercepts(&method) {
            return self.target.rollback(required);
        }
        let callee = Exclusive::new(&mut self.target, executor_view::<T>, |target, args| {
            let mut args = ArgReader::new(method, args);
            let required: bool = args.next()?;
            args.finish()?;
            target.rollback(required).map(Reply::from)
        });
        invoke(self.interceptor.as_ref(), method, vec![Arg::Flag(required)], callee)
    }

    fn create_cache_key(
        &self,
        ms: &Arc<MappedStatement>,
        parameter: &Parameter,
        bounds: RowBounds,
        command: &BoundCommand,
    ) -> Result<CacheKey> {
        let method = methods::EXECUTOR_CREATE_CACHE_KEY;
        if !self.intercepts(&method) {
            return self.target.create_cache_key(ms, parameter, bounds, command);
        }
        let args = vec![
            Arg::Statement(Arc::clone(ms)),
            Arg::Parameter(parameter.clone()),
            Arg::RowBounds(bounds),
            Arg::Command(command.clone()),
        ];
        let callee = Shared::new(&self.target, executor_view::<T>, |target, args| {
            let mut args = ArgReader::new(method, args);
            let ms: Arc<MappedStatement> = args.next()?;
            let parameter: Parameter = args.next()?;
            let bounds: RowBounds = args.next()?;
            let command: BoundCommand = args.next()?;
            args.finish()?;
            target
                .create_cache_key(&ms, &parameter, bounds, &command)
                .map(Reply::from)
        });
        invoke(self.interceptor.as_ref(), method, args, callee)
    }

    fn is_cached(&mut self, ms: &Arc<MappedStatement>, key: &CacheKey) -> Result<bool> {
        let method = methods::EXECUTOR_IS_CACHED;
        if !self.intercepts(&method) {
            return self.target.is_cached(ms, key);
        }
        let args = vec![Arg::Statement(Arc::clone(ms)), Arg::CacheKey(key.clone())];
        let callee = Exclusive::new(&mut self.target, executor_view::<T>, |target, args| {
            let mut args = ArgReader::new(method, args);
            let ms: Arc<MappedStatement> = args.next()?;
            let key: CacheKey = args.next()?;
            args.finish()?;
            target.is_cached(&ms, &key).map(Reply::from)
        });
        invoke(self.interceptor.as_ref(), method, args, callee)
    }

    fn clear_local_cache(&mut self) -> Result<()> {
        let method = methods::EXECUTOR_CLEAR_LOCAL_CACHE;
        if !self.intercepts(&method) {
            return self.target.clear_local_cache();
        }
        let callee = Exclusive::new(&mut self.target, executor_view::<T>, |target, args| {
            ArgReader::new(method, args).finish()?;
            target.clear_local_cache().map(Reply::from)
        });
        invoke(self.interceptor.as_ref(), method, Vec::new(), callee)
    }

    fn close(&mut self, force_rollback: bool) -> Result<()> {
        let method = methods::EXECUTOR_CLOSE;
        if !self.intercepts(&method) {
            return self.target.close(force_rollback);
        }
        let callee = Exclusive::new(&mut self.target, executor_view::<T>, |target, args| {
            let mut args = ArgReader::new(method, args);
            let force_rollback: bool = args.next()?;
            args.finish()?;
            target.close(force_rollback).map(Reply::from)
        });
        invoke(self.interceptor.as_ref(), method, vec![Arg::Flag(force_rollback)], callee)
    }

    fn is_closed(&self) -> bool {
        self.target.is_closed()
    }
}

impl<T: StatementHandler> StatementHandler for Proxy<T> {
    fn bound_command(&self) -> BoundCommand {
        self.target.bound_command()
    }

    fn prepare(&mut self) -> Result<DriverRequest> {
        let method = methods::STATEMENT_PREPARE;
        if !self.intercepts(&method) {
            return self.target.prepare();
        }
        let callee = Exclusive::new(&mut self.target, statement_view::<T>, |target, args| {
            ArgReader::new(method, args).finish()?;
            target.prepare().map(Reply::from)
        });
        invoke(self.interceptor.as_ref(), method, Vec::new(), callee)
    }

    fn parameterize(&mut self, request: DriverRequest) -> Result<DriverRequest> {
        let method = methods::STATEMENT_PARAMETERIZE;
        if !self.intercepts(&method) {
            return self.target.parameterize(request);
        }
        let callee = Exclusive::new(&mut self.target, statement_view::<T>, |target, args| {
            let mut args = ArgReader::new(method, args);
            let request: DriverRequest = args.next()?;
            args.finish()?;
            target.parameterize(request).map(Reply::from)
        });
        invoke(self.interceptor.as_ref(), method, vec![Arg::Request(request)], callee)
    }

    fn update(&mut self, request: DriverRequest) -> Result<u64> {
        let method = methods::STATEMENT_UPDATE;
        if !self.intercepts(&method) {
            return self.target.update(request);
        }
        let callee = Exclusive::new(&mut self.target, statement_view::<T>, |target, args| {
            let mut args = ArgReader::new(method, args);
            let request: DriverRequest = args.next()?;
            args.finish()?;
            target.update(request).map(Reply::from)
        });
        invoke(self.interceptor.as_ref(), method, vec![Arg::Request(request)], callee)
    }

    fn query(&mut self, request: DriverRequest) -> Result<QueryResult> {
        let method = methods::STATEMENT_QUERY;
        if !self.intercepts(&method) {
            return self.target.query(request);
        }
        let callee = Exclusive::new(&mut self.target, statement_view::<T>, |target, args| {
            let mut args = ArgReader::new(method, args);
            let request: DriverRequest = args.next()?;
            args.finish()?;
            target.query(request).map(Reply::from)
        });
        invoke(self.interceptor.as_ref(), method, vec![Arg::Request(request)], callee)
    }
}

impl<T: ParameterHandler> ParameterHandler for Proxy<T> {
    fn parameter_object(&self) -> Parameter {
        self.target.parameter_object()
    }

    fn set_parameters(&self, request: DriverRequest) -> Result<DriverRequest> {
        let method = methods::PARAMETER_SET_PARAMETERS;
        if !self.intercepts(&method) {
            return self.target.set_parameters(request);
        }
        let callee = Shared::new(&self.target, parameter_view::<T>, |target, args| {
            let mut args = ArgReader::new(method, args);
            let request: DriverRequest = args.next()?;
            args.finish()?;
            target.set_parameters(request).map(Reply::from)
        });
        invoke(self.interceptor.as_ref(), method, vec![Arg::Request(request)], callee)
    }
}

impl<T: ResultSetHandler> ResultSetHandler for Proxy<T> {
    fn handle_result_set(&mut self, result: QueryResult) -> Result<QueryResult> {
        let method = methods::RESULT_SET_HANDLE;
        if !self.intercepts(&method) {
            return self.target.handle_result_set(result);
        }
        let callee = Exclusive::new(&mut self.target, result_set_view::<T>, |target, args| {
            let mut args = ArgReader::new(method, args);
            let result: QueryResult = args.next()?;
            args.finish()?;
            target.handle_result_set(result).map(Reply::from)
        });
        invoke(self.interceptor.as_ref(), method, vec![Arg::Result(result)], callee)
    }
}

impl<T: Capabilities> Capabilities for Plugged<T> {
    const CAPABILITIES: &'static [Capability] = T::CAPABILITIES;
}

impl<T: ParameterHandler> ParameterHandler for Plugged<T> {
    fn parameter_object(&self) -> Parameter {
        match self {
            Plugged::Unchanged(target) => target.parameter_object(),
            Plugged::Proxied(proxy) => proxy.parameter_object(),
        }
    }

    fn set_parameters(&self, request: DriverRequest) -> Result<DriverRequest> {
        match self {
            Plugged::Unchanged(target) => target.set_parameters(request),
            Plugged::Proxied(proxy) => proxy.set_parameters(request),
        }
    }
}

impl<T: ResultSetHandler> ResultSetHandler for Plugged<T> {
    fn handle_result_set(&mut self, result: QueryResult) -> Result<QueryResult> {
        match self {
            Plugged::Unchanged(target) => target.handle_result_set(result),
            Plugged::Proxied(proxy) => proxy.handle_result_set(result),
        }
    }
}

impl<T: StatementHandler> StatementHandler for Plugged<T> {
    fn bound_command(&self) -> BoundCommand {
        match self {
            Plugged::Unchanged(target) => target.bound_command(),
            Plugged::Proxied(proxy) => proxy.bound_command(),
        }
    }

    fn prepare(&mut self) -> Result<DriverRequest> {
        match self {
            Plugged::Unchanged(target) => target.prepare(),
            Plugged::Proxied(proxy) => proxy.prepare(),
        }
    }

    fn parameterize(&mut self, request: DriverRequest) -> Result<DriverRequest> {
        match self {
            Plugged::Unchanged(target) => target.parameterize(request),
            Plugged::Proxied(proxy) => proxy.parameterize(request),
        }
    }

    fn update(&mut self, request: DriverRequest) -> Result<u64> {
        match self {
            Plugged::Unchanged(target) => target.update(request),
            Plugged::Proxied(proxy) => proxy.update(request),
        }
    }

    fn query(&mut self, request: DriverRequest) -> Result<QueryResult> {
        match self {
            Plugged::Unchanged(target) => target.query(request),
            Plugged::Proxied(proxy) => proxy.query(request),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Value;
    use crate::mapping::{KeyGeneration, StatementType};
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Target exposing two pipeline interfaces.
    struct DualHandler {
        rows_seen: usize,
    }

    impl ParameterHandler for DualHandler {
        fn parameter_object(&self) -> Parameter {
            Parameter::from(Value::Integer(7))
        }

        fn set_parameters(&self, mut request: DriverRequest) -> Result<DriverRequest> {
            request.sql.push_str(" /* set */");
            Ok(request)
        }
    }

    impl ResultSetHandler for DualHandler {
        fn handle_result_set(&mut self, result: QueryResult) -> Result<QueryResult> {
            self.rows_seen += result.row_count();
            Ok(result)
        }
    }

    impl Capabilities for DualHandler {
        const CAPABILITIES: &'static [Capability] =
            &[Capability::ParameterHandler, Capability::ResultSetHandler];
    }

    #[derive(Default)]
    struct Tagger {
        calls: AtomicUsize,
    }

    impl Interceptor for Tagger {
        fn signatures(&self) -> Vec<Signature> {
            vec![Signature::new(
                Capability::ParameterHandler,
                "set_parameters",
                &["DriverRequest"],
            )]
        }

        fn intercept(&self, invocation: &mut super::super::Invocation<'_>) -> Result<Reply> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(request) = invocation.args_mut()[0].as_request_mut() {
                request.sql.push_str(" /* tagged */");
            }
            invocation.proceed()
        }
    }

    fn request() -> DriverRequest {
        DriverRequest {
            statement_id: "t.select".into(),
            sql: "SELECT 1".into(),
            statement_type: StatementType::Prepared,
            parameters: Vec::new(),
            timeout: None,
            fetch_size: None,
            key_generation: KeyGeneration::None,
        }
    }

    #[test]
    fn test_declared_methods_are_intercepted_others_pass_through() {
        let tagger = Arc::new(Tagger::default());
        let plugin = Plugin::new(tagger.clone()).unwrap();
        let mut plugged = plugin.wrap(DualHandler { rows_seen: 0 });
        assert!(plugged.is_proxied());

        let sent = plugged.set_parameters(request()).unwrap();
        assert_eq!(sent.sql, "SELECT 1 /* tagged */ /* set */");
        assert_eq!(tagger.calls.load(Ordering::SeqCst), 1);

        let rows = QueryResult::new(vec!["n".into()], vec![vec![Value::Integer(1)]]);
        let handled = plugged.handle_result_set(rows.clone()).unwrap();
        assert_eq!(handled, rows);
        assert_eq!(plugged.parameter_object(), Parameter::from(Value::Integer(7)));
        assert_eq!(plugged.target().rows_seen, 1);
        assert_eq!(tagger.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_unrelated_target_is_returned_unchanged() {
        struct OnlyResults;
        impl ResultSetHandler for OnlyResults {
            fn handle_result_set(&mut self, result: QueryResult) -> Result<QueryResult> {
                Ok(result)
            }
        }
        impl Capabilities for OnlyResults {
            const CAPABILITIES: &'static [Capability] = &[Capability::ResultSetHandler];
        }

        let plugin = Plugin::new(Arc::new(Tagger::default())).unwrap();
        assert!(!plugin.wrap(OnlyResults).is_proxied());
    }

    #[test]
    fn test_interceptor_can_skip_the_target() {
        struct Blackhole;
        impl Interceptor for Blackhole {
            fn signatures(&self) -> Vec<Signature> {
                vec![Signature::new(Capability::ResultSetHandler, "handle_result_set", &["QueryResult"])]
            }
            fn intercept(&self, _invocation: &mut super::super::Invocation<'_>) -> Result<Reply> {
                Ok(Reply::Result(QueryResult::empty()))
            }
        }

        let plugin = Plugin::new(Arc::new(Blackhole)).unwrap();
        let mut plugged = plugin.wrap(DualHandler { rows_seen: 0 });
        let rows = QueryResult::new(vec!["n".into()], vec![vec![Value::Integer(1)]]);
        assert!(plugged.handle_result_set(rows).unwrap().is_empty());
        assert_eq!(plugged.target().rows_seen, 0);
    }
}
