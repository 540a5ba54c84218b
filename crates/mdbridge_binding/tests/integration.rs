//! Integration tests for the database binding.

use mdbridge_binding::{
    BatchOp, BindingConfig, BindingError, Database, EngineError, HostBuffer, HostFunction,
    HostRuntime, HostValue, InMemoryEngine, KvEngine, OptionsObject,
};
use mdbridge_engine::EngineResult;
use parking_lot::Mutex;
use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;

/// An engine that records the bytes it receives before delegating.
#[derive(Default)]
struct RecordingEngine {
    inner: InMemoryEngine,
    puts: Mutex<Vec<(Vec<u8>, Vec<u8>)>>,
    syncs: Mutex<usize>,
}

impl KvEngine for RecordingEngine {
    fn get(&self, key: &[u8]) -> EngineResult<Option<Vec<u8>>> {
        self.inner.get(key)
    }

    fn put(&self, key: &[u8], value: &[u8]) -> EngineResult<()> {
        self.puts.lock().push((key.to_vec(), value.to_vec()));
        self.inner.put(key, value)
    }

    fn delete(&self, key: &[u8]) -> EngineResult<()> {
        self.inner.delete(key)
    }

    fn write_batch(&self, ops: &[BatchOp<'_>]) -> EngineResult<()> {
        self.inner.write_batch(ops)
    }

    fn sync(&self) -> EngineResult<()> {
        *self.syncs.lock() += 1;
        Ok(())
    }
}

type Calls = Rc<RefCell<Vec<Vec<HostValue>>>>;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn callback() -> (HostValue, Calls) {
    let calls: Calls = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&calls);
    let f = HostFunction::new(move |_, argv| sink.borrow_mut().push(argv.to_vec()));
    (HostValue::from(f), calls)
}

fn open_db(engine: Arc<dyn KvEngine>) -> (Rc<HostRuntime>, Database) {
    init_tracing();
    let runtime = Rc::new(HostRuntime::new(BindingConfig::default()).unwrap());
    let db = Database::new(Rc::clone(&runtime), engine);

    let (cb, calls) = callback();
    db.open(&[cb]).unwrap();
    runtime.run_until_idle();
    assert_eq!(calls.borrow()[0], vec![HostValue::Null]);
    assert!(db.is_open());

    (runtime, db)
}

fn buffer(bytes: &[u8]) -> HostValue {
    HostValue::from(HostBuffer::copy_from_slice(bytes))
}

fn entry(kind: &str, key: &str, value: Option<&str>) -> HostValue {
    let mut object = OptionsObject::new().with("type", kind).with("key", key);
    if let Some(value) = value {
        object.set("value", value);
    }
    HostValue::from(object)
}

#[test]
fn put_then_get_round_trip() {
    let (runtime, db) = open_db(Arc::new(InMemoryEngine::new()));

    let (put_cb, put_calls) = callback();
    db.put(&["hello".into(), buffer(b"world"), put_cb]).unwrap();
    runtime.run_until_idle();
    assert_eq!(put_calls.borrow()[0], vec![HostValue::Null]);

    let (get_cb, get_calls) = callback();
    db.get(&["hello".into(), get_cb]).unwrap();
    runtime.run_until_idle();
    assert_eq!(get_calls.borrow()[0], vec![HostValue::Null, buffer(b"world")]);
}

#[test]
fn empty_key_and_value_are_stored_as_sentinel() {
    let engine = Arc::new(RecordingEngine::default());
    let (runtime, db) = open_db(engine.clone());

    let (cb, calls) = callback();
    db.put(&["".into(), HostValue::from(HostBuffer::empty()), cb])
        .unwrap();
    runtime.run_until_idle();
    assert_eq!(calls.borrow()[0], vec![HostValue::Null]);
    assert_eq!(engine.puts.lock().as_slice(), &[(vec![0u8], vec![0u8])]);

    let (get_cb, get_calls) = callback();
    db.get(&["".into(), get_cb]).unwrap();
    runtime.run_until_idle();
    assert_eq!(
        get_calls.borrow()[0],
        vec![HostValue::Null, HostValue::from(HostBuffer::empty())]
    );
}

#[test]
fn null_key_is_reported_through_callback() {
    let (runtime, db) = open_db(Arc::new(InMemoryEngine::new()));
    let dispatched = runtime.stats().jobs_dispatched;

    let (cb, calls) = callback();
    let result = db.put(&[HostValue::Null, "v".into(), cb]);
    assert!(result.is_ok());

    // Delivered before the loop turns; nothing reached the worker
    assert_eq!(
        calls.borrow()[0],
        vec![HostValue::Error("key cannot be `null` or `undefined`".to_string())]
    );
    assert_eq!(runtime.stats().jobs_dispatched, dispatched);
    assert_eq!(runtime.stats().validation_failures, 1);
}

#[test]
fn missing_value_is_reported_through_callback() {
    let (_runtime, db) = open_db(Arc::new(InMemoryEngine::new()));

    let (cb, calls) = callback();
    db.put(&["k".into(), HostValue::Undefined, cb]).unwrap();
    assert_eq!(
        calls.borrow()[0],
        vec![BindingError::null_argument("value").to_host_value()]
    );
}

#[test]
fn missing_callback_is_synchronous() {
    let (runtime, db) = open_db(Arc::new(InMemoryEngine::new()));

    let err = db.get(&[]).unwrap_err();
    assert_eq!(err, BindingError::missing_callback("get"));

    let err = db.put(&["k".into(), "v".into()]).unwrap_err();
    assert!(err.is_setup());
    assert_eq!(runtime.stats().setup_failures, 2);
}

#[test]
fn get_missing_key_is_not_found() {
    let (runtime, db) = open_db(Arc::new(InMemoryEngine::new()));

    let (cb, calls) = callback();
    db.get(&["absent".into(), cb]).unwrap();
    runtime.run_until_idle();
    assert_eq!(
        calls.borrow()[0],
        vec![HostValue::Error("NotFound: ".to_string())]
    );
}

#[test]
fn get_as_text() {
    let (runtime, db) = open_db(Arc::new(InMemoryEngine::new()));

    let (cb, _) = callback();
    db.put(&["k".into(), "v".into(), cb]).unwrap();
    runtime.run_until_idle();

    let (get_cb, calls) = callback();
    let options = HostValue::from(OptionsObject::new().with("asBuffer", false));
    db.get(&["k".into(), options, get_cb]).unwrap();
    runtime.run_until_idle();
    assert_eq!(calls.borrow()[0], vec![HostValue::Null, HostValue::from("v")]);
}

#[test]
fn non_options_object_uses_default_options() {
    let (runtime, db) = open_db(Arc::new(InMemoryEngine::new()));

    let (cb, _) = callback();
    db.put(&["k".into(), "v".into(), cb]).unwrap();
    runtime.run_until_idle();

    let (get_cb, calls) = callback();
    let slot = HostValue::from(Vec::<HostValue>::new());
    db.get(&["k".into(), slot, get_cb]).unwrap();
    runtime.run_until_idle();
    assert_eq!(calls.borrow()[0], vec![HostValue::Null, buffer(b"v")]);
}

#[test]
fn del_removes_key() {
    let engine = Arc::new(InMemoryEngine::new());
    let (runtime, db) = open_db(engine.clone());
    engine.put(b"k", b"v").unwrap();

    let (cb, calls) = callback();
    db.del(&["k".into(), cb]).unwrap();
    runtime.run_until_idle();
    assert_eq!(calls.borrow()[0], vec![HostValue::Null]);
    assert_eq!(engine.get(b"k").unwrap(), None);
}

#[test]
fn batch_puts_and_deletes() {
    let engine = Arc::new(InMemoryEngine::new());
    let (runtime, db) = open_db(engine.clone());
    engine.put(b"old", b"x").unwrap();

    let ops = HostValue::from(vec![
        entry("put", "a", Some("1")),
        entry("del", "old", None),
        entry("put", "b", Some("2")),
        HostValue::from("not an op"),
        entry("merge", "c", Some("3")),
    ]);
    let (cb, calls) = callback();
    db.batch(&[ops, cb]).unwrap();
    runtime.run_until_idle();

    assert_eq!(calls.borrow()[0], vec![HostValue::Null]);
    assert_eq!(
        engine.entries(),
        vec![
            (b"a".to_vec(), b"1".to_vec()),
            (b"b".to_vec(), b"2".to_vec()),
        ]
    );
}

#[test]
fn batch_rejects_empty_value() {
    let engine = Arc::new(InMemoryEngine::new());
    let (runtime, db) = open_db(engine.clone());

    let ops = HostValue::from(vec![entry("put", "a", Some("1")), entry("put", "b", Some(""))]);
    let (cb, calls) = callback();
    db.batch(&[ops, cb]).unwrap();

    assert!(matches!(calls.borrow()[0][0], HostValue::Error(_)));
    assert!(engine.is_empty());
    assert_eq!(runtime.stats().outstanding(), 0);
}

#[test]
fn batch_requires_array() {
    let (_runtime, db) = open_db(Arc::new(InMemoryEngine::new()));

    let (cb, calls) = callback();
    db.batch(&["nope".into(), cb]).unwrap();
    assert_eq!(
        calls.borrow()[0],
        vec![HostValue::Error("batch() requires an array argument".to_string())]
    );
}

#[test]
fn engine_errors_are_forwarded_verbatim() {
    let (runtime, db) = open_db(Arc::new(InMemoryEngine::with_max_key_size(4)));

    let (cb, calls) = callback();
    db.put(&["too long".into(), "v".into(), cb]).unwrap();
    runtime.run_until_idle();

    let expected = EngineError::KeyTooLarge { len: 8, max: 4 }.to_string();
    assert_eq!(calls.borrow()[0], vec![HostValue::Error(expected)]);
    assert_eq!(runtime.stats().engine_failures, 1);
}

#[test]
fn sync_option_flushes_engine() {
    let engine = Arc::new(RecordingEngine::default());
    let (runtime, db) = open_db(engine.clone());
    let after_open = *engine.syncs.lock();

    let options = HostValue::from(OptionsObject::new().with("sync", true));
    let (cb, _) = callback();
    db.put(&["k".into(), "v".into(), options, cb]).unwrap();
    runtime.run_until_idle();

    assert_eq!(*engine.syncs.lock(), after_open + 1);
}

#[test]
fn operations_after_close_report_closed() {
    let (runtime, db) = open_db(Arc::new(InMemoryEngine::new()));

    let (close_cb, close_calls) = callback();
    db.close(&[close_cb]).unwrap();
    assert!(!db.is_open());

    let (cb, calls) = callback();
    db.get(&["k".into(), cb]).unwrap();
    runtime.run_until_idle();

    assert_eq!(close_calls.borrow()[0], vec![HostValue::Null]);
    assert_eq!(calls.borrow()[0], vec![BindingError::Closed.to_host_value()]);
    assert_eq!(db.get_sync(&["k".into()]), Err(BindingError::Closed));
}

#[test]
fn callbacks_receive_the_handle_as_receiver() {
    init_tracing();
    let runtime = Rc::new(HostRuntime::new(BindingConfig::default()).unwrap());
    let db = Database::new(Rc::clone(&runtime), Arc::new(InMemoryEngine::new()))
        .with_receiver(HostValue::from("db"));

    let seen = Rc::new(RefCell::new(None));
    let sink = Rc::clone(&seen);
    let cb = HostFunction::new(move |this, _| *sink.borrow_mut() = Some(this.clone()));
    db.open(&[cb.into()]).unwrap();
    runtime.run_until_idle();

    assert_eq!(*seen.borrow(), Some(HostValue::from("db")));
}

#[test]
fn get_sync_borrows_buffer_keys() {
    let engine = Arc::new(InMemoryEngine::new());
    let (runtime, db) = open_db(engine.clone());
    engine.put(b"key", b"value").unwrap();

    let before = runtime.stats();
    let value = db.get_sync(&[buffer(b"key")]).unwrap();
    let after = runtime.stats();

    assert_eq!(value, buffer(b"value"));
    assert_eq!(after.zero_copy_slices, before.zero_copy_slices + 1);
    assert_eq!(after.allocations, before.allocations);
}

#[test]
fn every_allocation_is_freed() {
    let (runtime, db) = open_db(Arc::new(InMemoryEngine::new()));

    for i in 0..16 {
        let key = format!("key-{i}");
        let (cb, _) = callback();
        db.put(&[key.as_str().into(), buffer(&[i as u8; 32]), cb]).unwrap();
    }
    let (cb, _) = callback();
    db.put(&[HostValue::Null, "v".into(), cb]).unwrap();
    let (cb, _) = callback();
    db.get(&["key-3".into(), cb]).unwrap();
    let (cb, _) = callback();
    db.get(&["".into(), cb]).unwrap();
    let (cb, _) = callback();
    db.del(&["key-4".into(), cb]).unwrap();
    let (cb, _) = callback();
    let ops = HostValue::from(vec![entry("put", "x", Some("y")), entry("del", "key-5", None)]);
    db.batch(&[ops, cb]).unwrap();

    runtime.run_until_idle();

    let stats = runtime.stats();
    assert!(stats.allocations > 0);
    assert_eq!(stats.outstanding(), 0);
    assert_eq!(stats.bytes_allocated, stats.bytes_freed);
    assert_eq!(stats.callbacks_invoked, stats.jobs_dispatched + stats.validation_failures);
}
