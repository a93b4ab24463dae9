mod common;

use common::{add_statement, factory, rows};
use rustsqlmap::plugin::{Capability, Interceptor, Invocation, Reply, Signature, Target};
use rustsqlmap::{Arg, CommandKind, Configuration, MapperError, Parameter, Result, Settings, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

fn mapper(config: &mut Configuration) {
    add_statement(
        config,
        "user.find",
        CommandKind::Select,
        "SELECT * FROM users WHERE id = #{id}",
        |ms| ms,
    );
    add_statement(
        config,
        "user.purge",
        CommandKind::Delete,
        "DELETE FROM users WHERE id = #{id}",
        |ms| ms,
    );
}

fn id(value: i64) -> Parameter {
    Parameter::from_pairs([("id", value)])
}

/// Counts top-level queries, cache hits included.
#[derive(Default)]
struct QueryCounter {
    calls: AtomicUsize,
}

impl Interceptor for QueryCounter {
    fn signatures(&self) -> Vec<Signature> {
        vec![Signature::new(
            Capability::Executor,
            "query",
            &["MappedStatement", "Parameter", "RowBounds", "ResultHandler"],
        )]
    }

    fn intercept(&self, invocation: &mut Invocation<'_>) -> Result<Reply> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        invocation.proceed()
    }
}

/// Appends a LIMIT clause to every prepared statement.
struct Paging {
    limit: u32,
}

impl Interceptor for Paging {
    fn name(&self) -> &str {
        "paging"
    }

    fn signatures(&self) -> Vec<Signature> {
        vec![Signature::new(Capability::StatementHandler, "prepare", &[])]
    }

    fn intercept(&self, invocation: &mut Invocation<'_>) -> Result<Reply> {
        match invocation.proceed()? {
            Reply::Request(mut request) => {
                request.sql = format!("{} LIMIT {}", request.sql, self.limit);
                Ok(Reply::Request(request))
            }
            other => Ok(other),
        }
    }

    fn set_properties(&mut self, properties: &HashMap<String, String>) -> Result<()> {
        if let Some(limit) = properties.get("limit") {
            self.limit = limit
                .parse()
                .map_err(|_| MapperError::PluginConfigError(format!("Invalid limit '{}'", limit)))?;
        }
        Ok(())
    }
}

struct Recorder {
    name: &'static str,
    log: Arc<Mutex<Vec<String>>>,
}

impl Interceptor for Recorder {
    fn name(&self) -> &str {
        self.name
    }

    fn signatures(&self) -> Vec<Signature> {
        vec![Signature::new(
            Capability::ParameterHandler,
            "set_parameters",
            &["DriverRequest"],
        )]
    }

    fn intercept(&self, invocation: &mut Invocation<'_>) -> Result<Reply> {
        self.log.lock().unwrap().push(format!("{} in", self.name));
        let reply = invocation.proceed();
        self.log.lock().unwrap().push(format!("{} out", self.name));
        reply
    }
}

#[test]
fn test_executor_interceptor_sees_every_query() {
    let counter = Arc::new(QueryCounter::default());
    let (factory, ds) = factory(Settings::new(), |config| {
        mapper(config);
        config.add_interceptor(counter.clone()).unwrap();
    });

    let mut session = factory.open_session().unwrap();
    for _ in 0..3 {
        session.select_list("user.find", id(1)).unwrap();
    }

    assert_eq!(counter.calls.load(Ordering::SeqCst), 3);
    assert_eq!(ds.query_count(), 1);
}

#[test]
fn test_prepare_interceptor_rewrites_sql() {
    let (factory, ds) = factory(Settings::new(), |config| {
        mapper(config);
        let properties = HashMap::from([("limit".to_string(), "10".to_string())]);
        config
            .add_interceptor_with_properties(Box::new(Paging { limit: 100 }), &properties)
            .unwrap();
    });

    let mut session = factory.open_session().unwrap();
    let result = session.select_list("user.find", id(4)).unwrap();

    let request = ds.last_query();
    assert_eq!(request.sql, "SELECT * FROM users WHERE id = ? LIMIT 10");
    assert_eq!(request.input_values(), vec![&Value::Integer(4)]);
    assert_eq!(
        result.get(0, "sql"),
        Some(&Value::from("SELECT * FROM users WHERE id = ? LIMIT 10"))
    );
}

#[test]
fn test_invalid_properties_reject_registration() {
    let mut config = Configuration::new(Settings::new()).unwrap();
    let properties = HashMap::from([("limit".to_string(), "ten".to_string())]);
    let err = config
        .add_interceptor_with_properties(Box::new(Paging { limit: 100 }), &properties)
        .unwrap_err();
    assert!(matches!(err, MapperError::PluginConfigError(_)));
    assert!(config.interceptor_chain().is_empty());
}

#[test]
fn test_later_interceptors_run_first() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let (factory, _ds) = factory(Settings::new(), |config| {
        mapper(config);
        for name in ["first", "second"] {
            config
                .add_interceptor(Arc::new(Recorder {
                    name,
                    log: Arc::clone(&log),
                }))
                .unwrap();
        }
    });

    let mut session = factory.open_session().unwrap();
    session.select_list("user.find", id(1)).unwrap();

    assert_eq!(
        *log.lock().unwrap(),
        vec!["second in", "first in", "first out", "second out"]
    );
}

#[test]
fn test_unknown_signature_fails_at_registration() {
    struct Broken;

    impl Interceptor for Broken {
        fn signatures(&self) -> Vec<Signature> {
            vec![Signature::new(Capability::Executor, "explode", &[])]
        }

        fn intercept(&self, invocation: &mut Invocation<'_>) -> Result<Reply> {
            invocation.proceed()
        }
    }

    let mut config = Configuration::new(Settings::new()).unwrap();
    let err = config.add_interceptor(Arc::new(Broken)).unwrap_err();
    assert!(matches!(err, MapperError::PluginConfigError(msg) if msg.contains("explode")));

    struct WrongArgs;

    impl Interceptor for WrongArgs {
        fn signatures(&self) -> Vec<Signature> {
            vec![Signature::new(Capability::Executor, "query", &["MappedStatement"])]
        }

        fn intercept(&self, invocation: &mut Invocation<'_>) -> Result<Reply> {
            invocation.proceed()
        }
    }

    assert!(config.add_interceptor(Arc::new(WrongArgs)).is_err());
    assert!(config.interceptor_chain().is_empty());
}

/// Declares one executor method and one result-set method; everything else
/// it could see passes through untouched.
struct FirstRowOnly {
    commits: AtomicUsize,
}

impl Interceptor for FirstRowOnly {
    fn signatures(&self) -> Vec<Signature> {
        vec![
            Signature::new(Capability::Executor, "commit", &["bool"]),
            Signature::new(Capability::ResultSetHandler, "handle_result_set", &["QueryResult"]),
        ]
    }

    fn intercept(&self, invocation: &mut Invocation<'_>) -> Result<Reply> {
        if invocation.method().capability == Capability::Executor {
            self.commits.fetch_add(1, Ordering::SeqCst);
            return invocation.proceed();
        }
        let mut reply = invocation.proceed()?;
        if let Some(result) = reply.as_result_mut() {
            result.rows.truncate(1);
        }
        Ok(reply)
    }
}

#[test]
fn test_interceptor_spanning_two_interfaces() {
    let plugin = Arc::new(FirstRowOnly {
        commits: AtomicUsize::new(0),
    });
    let (factory, ds) = factory(Settings::new(), |config| {
        mapper(config);
        config.add_interceptor(plugin.clone()).unwrap();
    });
    ds.respond("user.find", rows(&[1, 2, 3]));

    let mut session = factory.open_session().unwrap();
    let result = session.select_list("user.find", id(1)).unwrap();
    assert_eq!(result, rows(&[1]));

    session.delete("user.purge", id(1)).unwrap();
    session.commit().unwrap();
    assert_eq!(plugin.commits.load(Ordering::SeqCst), 1);
    assert_eq!(ds.commits(), 1);
}

#[test]
fn test_interceptor_can_skip_the_target() {
    struct ReadOnly;

    impl Interceptor for ReadOnly {
        fn signatures(&self) -> Vec<Signature> {
            vec![Signature::new(
                Capability::Executor,
                "update",
                &["MappedStatement", "Parameter"],
            )]
        }

        fn intercept(&self, invocation: &mut Invocation<'_>) -> Result<Reply> {
            let blocked = invocation
                .args()
                .first()
                .and_then(Arg::as_statement)
                .is_some_and(|ms| ms.id.ends_with("purge"));
            if blocked {
                return Ok(Reply::Count(0));
            }
            invocation.proceed()
        }
    }

    let (factory, ds) = factory(Settings::new(), |config| {
        mapper(config);
        config.add_interceptor(Arc::new(ReadOnly)).unwrap();
    });

    let mut session = factory.open_session().unwrap();
    assert_eq!(session.delete("user.purge", id(1)).unwrap(), 0);
    assert_eq!(ds.execute_count(), 0);
}

#[test]
fn test_interceptor_can_replace_arguments() {
    struct Redirect;

    impl Interceptor for Redirect {
        fn signatures(&self) -> Vec<Signature> {
            vec![Signature::new(
                Capability::Executor,
                "query",
                &["MappedStatement", "Parameter", "RowBounds", "ResultHandler"],
            )]
        }

        fn intercept(&self, invocation: &mut Invocation<'_>) -> Result<Reply> {
            let mut args = invocation.args().to_vec();
            args[1] = Arg::Parameter(Parameter::from_pairs([("id", 42)]));
            invocation.proceed_with(args)
        }
    }

    let (factory, ds) = factory(Settings::new(), |config| {
        mapper(config);
        config.add_interceptor(Arc::new(Redirect)).unwrap();
    });

    let mut session = factory.open_session().unwrap();
    session.select_list("user.find", id(1)).unwrap();
    assert_eq!(ds.last_query().input_values(), vec![&Value::Integer(42)]);
}

#[test]
fn test_mismatched_reply_is_plugin_error() {
    struct Liar;

    impl Interceptor for Liar {
        fn signatures(&self) -> Vec<Signature> {
            vec![Signature::new(
                Capability::Executor,
                "update",
                &["MappedStatement", "Parameter"],
            )]
        }

        fn intercept(&self, _invocation: &mut Invocation<'_>) -> Result<Reply> {
            Ok(Reply::Flag(true))
        }
    }

    let (factory, _ds) = factory(Settings::new(), |config| {
        mapper(config);
        config.add_interceptor(Arc::new(Liar)).unwrap();
    });

    let mut session = factory.open_session().unwrap();
    assert!(matches!(
        session.delete("user.purge", id(1)),
        Err(MapperError::PluginConfigError(_))
    ));
}

/// Reads the wrapped handlers before letting the call through.
#[derive(Default)]
struct Inspector {
    prepared_sql: Mutex<Vec<String>>,
    parameters: Mutex<Vec<Parameter>>,
}

impl Interceptor for Inspector {
    fn signatures(&self) -> Vec<Signature> {
        vec![
            Signature::new(Capability::StatementHandler, "prepare", &[]),
            Signature::new(Capability::ParameterHandler, "set_parameters", &["DriverRequest"]),
        ]
    }

    fn intercept(&self, invocation: &mut Invocation<'_>) -> Result<Reply> {
        match invocation.target() {
            Target::StatementHandler(handler) => {
                self.prepared_sql.lock().unwrap().push(handler.bound_command().sql);
            }
            Target::ParameterHandler(handler) => {
                self.parameters.lock().unwrap().push(handler.parameter_object());
            }
            other => {
                return Err(MapperError::PluginConfigError(format!(
                    "unexpected target {:?}",
                    other.capability()
                )));
            }
        }
        invocation.proceed()
    }
}

#[test]
fn test_interceptor_reads_target_before_proceeding() {
    let inspector = Arc::new(Inspector::default());
    let (factory, ds) = factory(Settings::new(), |config| {
        mapper(config);
        config.add_interceptor(inspector.clone()).unwrap();
    });

    let mut session = factory.open_session().unwrap();
    session.select_list("user.find", id(5)).unwrap();

    assert_eq!(
        *inspector.prepared_sql.lock().unwrap(),
        vec!["SELECT * FROM users WHERE id = ?".to_string()]
    );
    assert_eq!(*inspector.parameters.lock().unwrap(), vec![id(5)]);
    assert_eq!(ds.last_query().input_values(), vec![&Value::Integer(5)]);
}
