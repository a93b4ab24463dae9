use super::invocation::Interceptor;
use super::proxy::{Pluggable, Plugin};
use crate::core::Result;
use log::info;
use std::collections::HashMap;
use std::sync::Arc;

/// Registered interceptors in registration order.
///
/// Each plugin re-wraps what the previous ones produced, so the last
/// registered interceptor is the outermost layer and runs first.
#[derive(Clone, Default)]
pub struct InterceptorChain {
    plugins: Vec<Plugin>,
}

impl InterceptorChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an interceptor. Signatures are resolved now.
    pub fn add_interceptor(&mut self, interceptor: Arc<dyn Interceptor>) -> Result<()> {
        let plugin = Plugin::new(interceptor)?;
        info!("Registered interceptor: {}", plugin.interceptor().name());
        self.plugins.push(plugin);
        Ok(())
    }

    /// Register an interceptor after handing it its properties.
    pub fn add_interceptor_with_properties(
        &mut self,
        mut interceptor: Box<dyn Interceptor>,
        properties: &HashMap<String, String>,
    ) -> Result<()> {
        interceptor.set_properties(properties)?;
        self.add_interceptor(Arc::from(interceptor))
    }

    pub fn plugin_all<T: Pluggable>(&self, target: T) -> T {
        self.plugins
            .iter()
            .fold(target, |target, plugin| plugin.plug(target))
    }

    pub fn interceptors(&self) -> impl Iterator<Item = &Arc<dyn Interceptor>> {
        self.plugins.iter().map(Plugin::interceptor)
    }

    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{MapperError, Value};
    use crate::executor::ResultSetHandler;
    use crate::plugin::{Capability, Invocation, Reply, Signature};
    use crate::result::QueryResult;
    use std::sync::Mutex;

    struct Recorder {
        label: &'static str,
        log: Arc<Mutex<Vec<String>>>,
    }

    impl Interceptor for Recorder {
        fn name(&self) -> &str {
            self.label
        }

        fn signatures(&self) -> Vec<Signature> {
            vec![Signature::new(Capability::ResultSetHandler, "handle_result_set", &["QueryResult"])]
        }

        fn intercept(&self, invocation: &mut Invocation<'_>) -> Result<Reply> {
            self.log.lock().unwrap().push(format!("{} in", self.label));
            let reply = invocation.proceed();
            self.log.lock().unwrap().push(format!("{} out", self.label));
            reply
        }
    }

    struct Passthrough;

    impl ResultSetHandler for Passthrough {
        fn handle_result_set(&mut self, result: QueryResult) -> Result<QueryResult> {
            Ok(result)
        }
    }

    #[test]
    fn test_later_plugins_run_first() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut chain = InterceptorChain::new();
        for label in ["first", "second"] {
            chain
                .add_interceptor(Arc::new(Recorder {
                    label,
                    log: Arc::clone(&log),
                }))
                .unwrap();
        }

        let mut handler: Box<dyn ResultSetHandler> = chain.plugin_all(Box::new(Passthrough) as Box<dyn ResultSetHandler>);
        let rows = QueryResult::new(vec!["n".into()], vec![vec![Value::Integer(1)]]);
        assert_eq!(handler.handle_result_set(rows.clone()).unwrap(), rows);

        assert_eq!(
            *log.lock().unwrap(),
            vec!["second in", "first in", "first out", "second out"]
        );
    }

    #[test]
    fn test_properties_are_applied_before_registration() {
        struct Configurable {
            limit: usize,
        }
        impl Interceptor for Configurable {
            fn signatures(&self) -> Vec<Signature> {
                Vec::new()
            }
            fn intercept(&self, invocation: &mut Invocation<'_>) -> Result<Reply> {
                invocation.proceed()
            }
            fn set_properties(&mut self, properties: &HashMap<String, String>) -> Result<()> {
                self.limit = properties
                    .get("limit")
                    .ok_or_else(|| MapperError::PluginConfigError("limit is required".into()))?
                    .parse()
                    .map_err(|_| MapperError::PluginConfigError("limit must be a number".into()))?;
                Ok(())
            }
        }

        let mut chain = InterceptorChain::new();
        let err = chain
            .add_interceptor_with_properties(Box::new(Configurable { limit: 0 }), &HashMap::new())
            .unwrap_err();
        assert!(matches!(err, MapperError::PluginConfigError(_)));
        assert!(chain.is_empty());

        let properties = HashMap::from([("limit".to_string(), "10".to_string())]);
        chain
            .add_interceptor_with_properties(Box::new(Configurable { limit: 0 }), &properties)
            .unwrap();
        assert_eq!(chain.len(), 1);
    }
}
