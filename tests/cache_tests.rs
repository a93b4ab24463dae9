mod common;

use common::{add_statement, factory};
use rustsqlmap::driver::Connection;
use rustsqlmap::{
    CacheRegion, CommandKind, Configuration, DataSource, LocalCacheScope, MapperError, Parameter,
    ResultContext, RowBounds, SessionFactory, Settings, SharedResultHandler, StatementType, Value,
};
use std::sync::{Arc, Barrier, Mutex};
use std::thread;

fn id(value: i64) -> Parameter {
    Parameter::from_pairs([("id", value)])
}

fn user_mapper(config: &mut Configuration) {
    config.add_cache(CacheRegion::lru("user")).unwrap();
    add_statement(
        config,
        "user.find",
        CommandKind::Select,
        "SELECT * FROM users WHERE id = #{id}",
        |ms| ms.cache_ref("user"),
    );
    add_statement(
        config,
        "user.rename",
        CommandKind::Update,
        "UPDATE users SET name = #{name} WHERE id = #{id}",
        |ms| ms.cache_ref("user"),
    );
    add_statement(
        config,
        "user.touch",
        CommandKind::Update,
        "UPDATE users SET seen = 1 WHERE id = #{id}",
        |ms| ms.cache_ref("user").flush_cache(false),
    );
    add_statement(
        config,
        "user.broken",
        CommandKind::Update,
        "UPDATE users SET FAIL = 1 WHERE id = #{id}",
        |ms| ms.cache_ref("user"),
    );
    add_statement(
        config,
        "user.fresh",
        CommandKind::Select,
        "SELECT * FROM users WHERE id = #{id}",
        |ms| ms.cache_ref("user").flush_cache(true),
    );
    add_statement(
        config,
        "user.locate",
        CommandKind::Select,
        "{call locate(#{id}, #{found, mode=OUT, jdbcType=BOOLEAN})}",
        |ms| ms.cache_ref("user").statement_type(StatementType::Callable),
    );
    add_statement(
        config,
        "user.locate_uncached",
        CommandKind::Select,
        "{call locate(#{id}, #{found, mode=OUT, jdbcType=BOOLEAN})}",
        |ms| {
            ms.cache_ref("user")
                .statement_type(StatementType::Callable)
                .use_cache(false)
        },
    );
    add_statement(
        config,
        "orders.find",
        CommandKind::Select,
        "SELECT * FROM orders WHERE id = #{id}",
        |ms| ms.cache_ref("orders"),
    );
    add_statement(
        config,
        "plain.find",
        CommandKind::Select,
        "SELECT * FROM plain WHERE id = #{id}",
        |ms| ms,
    );
}

fn region(factory: &SessionFactory) -> Arc<CacheRegion> {
    factory.configuration().cache("user").unwrap()
}

#[test]
fn test_local_cache_serves_repeated_queries() {
    let (factory, ds) = factory(Settings::new(), user_mapper);
    let mut session = factory.open_session().unwrap();

    let first = session.select_list("plain.find", id(1)).unwrap();
    let second = session.select_list("plain.find", id(1)).unwrap();
    assert_eq!(first, second);
    assert_eq!(ds.query_count(), 1);

    session.select_list("plain.find", id(2)).unwrap();
    assert_eq!(ds.query_count(), 2);

    session.clear_cache().unwrap();
    session.select_list("plain.find", id(1)).unwrap();
    assert_eq!(ds.query_count(), 3);
}

#[test]
fn test_statement_scope_disables_local_reuse() {
    let settings = Settings::new().local_cache_scope(LocalCacheScope::Statement);
    let (factory, ds) = factory(settings, user_mapper);
    let mut session = factory.open_session().unwrap();

    session.select_list("plain.find", id(1)).unwrap();
    session.select_list("plain.find", id(1)).unwrap();
    assert_eq!(ds.query_count(), 2);
}

#[test]
fn test_cache_key_is_deterministic() {
    let (factory, ds) = factory(Settings::new(), user_mapper);
    let config = Arc::clone(factory.configuration());
    let executor = config.new_executor(Connection::new(ds.connect().unwrap()));
    let ms = config.get_statement("user.find").unwrap();

    let key = |parameter: &Parameter, bounds: RowBounds| {
        let command = ms.sql_source.bound_command(parameter, None).unwrap();
        executor
            .create_cache_key(&ms, parameter, bounds, &command)
            .unwrap()
    };

    assert_eq!(key(&id(1), RowBounds::DEFAULT), key(&id(1), RowBounds::DEFAULT));
    assert_ne!(key(&id(1), RowBounds::DEFAULT), key(&id(2), RowBounds::DEFAULT));
    assert_ne!(key(&id(1), RowBounds::DEFAULT), key(&id(1), RowBounds::new(0, 10)));

    let other_env = {
        let (factory, ds) = common::factory(Settings::new().environment_id("replica"), user_mapper);
        let config = Arc::clone(factory.configuration());
        let executor = config.new_executor(Connection::new(ds.connect().unwrap()));
        let ms = config.get_statement("user.find").unwrap();
        let command = ms.sql_source.bound_command(&id(1), None).unwrap();
        executor
            .create_cache_key(&ms, &id(1), RowBounds::DEFAULT, &command)
            .unwrap()
    };
    assert_ne!(key(&id(1), RowBounds::DEFAULT), other_env);
}

#[test]
fn test_uncommitted_writes_are_invisible_to_other_sessions() {
    let (factory, ds) = factory(Settings::new(), user_mapper);
    let factory = Arc::new(factory);
    let barrier = Arc::new(Barrier::new(2));

    let writer = {
        let factory = Arc::clone(&factory);
        let barrier = Arc::clone(&barrier);
        thread::spawn(move || {
            let mut session = factory.open_session().unwrap();
            session.select_list("user.find", id(1)).unwrap();
            barrier.wait(); // staged, not committed
            barrier.wait(); // reader looked
            session.commit().unwrap();
            barrier.wait(); // committed
        })
    };

    let reader = {
        let factory = Arc::clone(&factory);
        let barrier = Arc::clone(&barrier);
        let ds = ds.clone();
        thread::spawn(move || {
            let region = factory.configuration().cache("user").unwrap();
            let mut session = factory.open_session().unwrap();

            barrier.wait();
            assert_eq!(region.size().unwrap(), 0);
            let before = ds.query_count();
            session.select_list("user.find", id(1)).unwrap();
            assert_eq!(ds.query_count(), before + 1);
            session.rollback_force(true).unwrap();
            barrier.wait();

            barrier.wait();
            assert_eq!(region.size().unwrap(), 1);
            let before = ds.query_count();
            session.select_list("user.find", id(1)).unwrap();
            assert_eq!(ds.query_count(), before);
        })
    };

    writer.join().unwrap();
    reader.join().unwrap();
}

#[test]
fn test_read_your_own_staged_writes() {
    let (factory, ds) = factory(Settings::new(), user_mapper);
    let mut session = factory.open_session().unwrap();

    session.select_list("user.find", id(1)).unwrap();
    session.clear_cache().unwrap();
    session.select_list("user.find", id(1)).unwrap();
    assert_eq!(ds.query_count(), 1);
    assert_eq!(region(&factory).size().unwrap(), 0);

    session.commit().unwrap();
    assert_eq!(region(&factory).size().unwrap(), 1);
}

#[test]
fn test_flush_on_write() {
    let (factory, ds) = factory(Settings::new(), user_mapper);

    let mut seed = factory.open_session().unwrap();
    seed.select_list("user.find", id(1)).unwrap();
    seed.select_list("user.find", id(2)).unwrap();
    seed.commit().unwrap();
    assert_eq!(region(&factory).size().unwrap(), 2);
    let seeded = ds.query_count();

    let mut writer = factory.open_session().unwrap();
    writer.select_list("user.find", id(1)).unwrap();
    assert_eq!(ds.query_count(), seeded);

    writer
        .update("user.rename", Parameter::from_pairs([("id", Value::from(1)), ("name", Value::from("ann"))]))
        .unwrap();
    writer.select_list("user.find", id(1)).unwrap();
    assert_eq!(ds.query_count(), seeded + 1);

    let mut other = factory.open_session().unwrap();
    other.select_list("user.find", id(2)).unwrap();
    assert_eq!(ds.query_count(), seeded + 1);

    writer.commit().unwrap();
    let region = region(&factory);
    assert_eq!(region.size().unwrap(), 1);

    other.clear_cache().unwrap();
    other.select_list("user.find", id(2)).unwrap();
    assert_eq!(ds.query_count(), seeded + 2);
}

#[test]
fn test_write_without_flush_keeps_region() {
    let (factory, _ds) = factory(Settings::new(), user_mapper);
    let mut seed = factory.open_session().unwrap();
    seed.select_list("user.find", id(1)).unwrap();
    seed.commit().unwrap();

    let mut session = factory.open_session().unwrap();
    session.update("user.touch", id(1)).unwrap();
    session.commit().unwrap();
    assert_eq!(region(&factory).size().unwrap(), 1);
}

#[test]
fn test_failed_write_does_not_commit_staged_clear() {
    let (factory, ds) = factory(Settings::new(), user_mapper);
    let mut seed = factory.open_session().unwrap();
    seed.select_list("user.find", id(2)).unwrap();
    seed.commit().unwrap();

    let mut session = factory.open_session().unwrap();
    let err = session.update("user.broken", id(1)).unwrap_err();
    assert_eq!(err, MapperError::ExecutionError("constraint violated".into()));
    assert_eq!(ds.execute_count(), 1);

    session.commit().unwrap();
    assert_eq!(region(&factory).size().unwrap(), 1);
}

#[test]
fn test_rollback_and_dirty_close_discard_staged_entries() {
    let (factory, ds) = factory(Settings::new(), user_mapper);

    let mut session = factory.open_session().unwrap();
    session.select_list("user.find", id(1)).unwrap();
    session.rollback_force(true).unwrap();
    session.commit().unwrap();
    assert_eq!(region(&factory).size().unwrap(), 0);

    let mut session = factory.open_session().unwrap();
    session.select_list("user.find", id(1)).unwrap();
    session.update("user.touch", id(1)).unwrap();
    session.close().unwrap();
    assert_eq!(region(&factory).size().unwrap(), 0);
    assert!(ds.rollbacks() >= 2);

    let mut session = factory.open_session().unwrap();
    session.select_list("user.find", id(1)).unwrap();
    drop(session);
    assert_eq!(region(&factory).size().unwrap(), 1);
}

#[test]
fn test_flush_cache_select_always_hits_driver() {
    let (factory, ds) = factory(Settings::new(), user_mapper);
    let mut session = factory.open_session().unwrap();
    session.select_list("user.fresh", id(1)).unwrap();
    session.select_list("user.fresh", id(1)).unwrap();
    assert_eq!(ds.query_count(), 2);
}

#[test]
fn test_result_handler_bypasses_both_tiers() {
    let (factory, ds) = factory(Settings::new(), user_mapper);
    let mut session = factory.open_session().unwrap();

    let seen = Arc::new(Mutex::new(0usize));
    let counter = Arc::clone(&seen);
    let handler: SharedResultHandler = Arc::new(Mutex::new(move |_: &mut ResultContext<'_>| {
        *counter.lock().unwrap() += 1;
    }));

    for _ in 0..2 {
        session
            .select_with_handler("user.find", id(1), RowBounds::DEFAULT, Arc::clone(&handler))
            .unwrap();
    }
    session.commit().unwrap();

    assert_eq!(ds.query_count(), 2);
    assert_eq!(*seen.lock().unwrap(), 2);
    assert_eq!(region(&factory).size().unwrap(), 0);
}

#[test]
fn test_callable_with_out_params_refuses_cache() {
    let (factory, ds) = factory(Settings::new(), user_mapper);
    let mut session = factory.open_session().unwrap();

    let err = session.select_list("user.locate", id(1)).unwrap_err();
    assert!(matches!(err, MapperError::CacheConfigError(msg) if msg.contains("OUT params")));
    assert_eq!(ds.query_count(), 0);

    session.select_list("user.locate_uncached", id(1)).unwrap();
    let request = ds.last_query();
    assert_eq!(request.parameters.len(), 2);
    assert_eq!(request.parameters[1].value, None);
}

#[test]
fn test_missing_region_fails_at_first_use() {
    let (factory, _ds) = factory(Settings::new(), user_mapper);
    let mut session = factory.open_session().unwrap();
    assert!(matches!(
        session.select_list("orders.find", id(1)),
        Err(MapperError::CacheConfigError(_))
    ));
    session.select_list("user.find", id(1)).unwrap();
}

#[test]
fn test_disabled_cache_never_fills_regions() {
    let (factory, _ds) = factory(Settings::new().cache_enabled(false), user_mapper);
    let mut session = factory.open_session().unwrap();
    session.select_list("user.find", id(1)).unwrap();
    session.select_list("orders.find", id(1)).unwrap();
    session.commit().unwrap();
    assert_eq!(region(&factory).size().unwrap(), 0);
}

#[test]
fn test_row_bounds_are_part_of_the_key() {
    let (factory, ds) = factory(Settings::new(), user_mapper);
    ds.respond("user.find", common::rows(&[1, 2, 3, 4]));
    let mut session = factory.open_session().unwrap();

    let page = session
        .select_list_with_bounds("user.find", id(1), RowBounds::new(1, 2))
        .unwrap();
    assert_eq!(page, common::rows(&[2, 3]));

    let all = session.select_list("user.find", id(1)).unwrap();
    assert_eq!(all.row_count(), 4);
    assert_eq!(ds.query_count(), 2);
}
