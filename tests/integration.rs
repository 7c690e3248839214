//! Integration tests for beanline.
//!
//! Each test drives a real `Connection` over loopback TCP against a
//! scripted broker: a thread that asserts the exact request bytes the
//! client writes and plays back canned responses. No live beanstalkd
//! is needed, and every byte of the wire contract is checked.

use std::io::{Read, Write};
use std::net::{SocketAddr, TcpListener};
use std::thread::JoinHandle;

use beanline::{with_connection, BeanlineError, Connection, DEFAULT_PRIORITY};

struct Step {
    expect: Vec<u8>,
    reply: Vec<u8>,
}

fn step(expect: impl Into<Vec<u8>>, reply: impl Into<Vec<u8>>) -> Step {
    Step {
        expect: expect.into(),
        reply: reply.into(),
    }
}

/// A one-connection broker that follows a fixed script.
struct ScriptedBroker {
    addr: SocketAddr,
    handle: JoinHandle<()>,
}

impl ScriptedBroker {
    fn serve(steps: Vec<Step>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind loopback");
        let addr = listener.local_addr().expect("local addr");
        let handle = std::thread::spawn(move || {
            let (mut stream, _) = listener.accept().expect("accept");
            for (i, s) in steps.into_iter().enumerate() {
                let mut got = vec![0u8; s.expect.len()];
                stream.read_exact(&mut got).expect("read request");
                assert_eq!(
                    String::from_utf8_lossy(&got),
                    String::from_utf8_lossy(&s.expect),
                    "request {i} mismatch"
                );
                stream.write_all(&s.reply).expect("write reply");
            }
        });
        Self { addr, handle }
    }

    fn connect(&self) -> Connection {
        init_logging();
        Connection::connect(self.addr).expect("connect to scripted broker")
    }

    /// Join the broker thread, propagating any assertion it hit.
    fn finish(self) {
        self.handle.join().expect("broker thread panicked");
    }
}

fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("beanline=trace")
        .with_test_writer()
        .try_init();
}

/// `OK <len>\r\n<block>\r\n` reply for a stats/list command.
fn ok_block(block: &str) -> Vec<u8> {
    let mut reply = format!("OK {}\r\n", block.len()).into_bytes();
    reply.extend_from_slice(block.as_bytes());
    reply.extend_from_slice(b"\r\n");
    reply
}

/// `<status> <id> <len>\r\n<body>\r\n` reply carrying a job.
fn job_reply(status: &str, id: u64, body: &[u8]) -> Vec<u8> {
    let mut reply = format!("{status} {id} {}\r\n", body.len()).into_bytes();
    reply.extend_from_slice(body);
    reply.extend_from_slice(b"\r\n");
    reply
}

#[test]
fn test_put_reserve_delete_round_trip() {
    let broker = ScriptedBroker::serve(vec![
        step(
            "put 2147483648 0 120 5\r\nhello\r\n",
            "INSERTED 1\r\n",
        ),
        step("reserve\r\n", job_reply("RESERVED", 1, b"hello")),
        step("delete 1\r\n", "DELETED\r\n"),
    ]);
    let conn = broker.connect();

    let id = conn.put_default(b"hello").unwrap();
    assert_eq!(id, 1);

    let job = conn.reserve().unwrap();
    assert_eq!(job.id(), 1);
    assert_eq!(job.body(), b"hello");
    assert_eq!(job.len(), 5);
    assert!(job.is_reserved());

    job.delete().unwrap();
    broker.finish();
}

#[test]
fn test_body_with_embedded_crlf_survives() {
    let body = b"a\r\nb";
    let broker = ScriptedBroker::serve(vec![
        step("put 1 0 90 4\r\na\r\nb\r\n", "INSERTED 7\r\n"),
        step("peek 7\r\n", job_reply("FOUND", 7, body)),
    ]);
    let conn = broker.connect();

    assert_eq!(conn.put(body, 1, 0, 90).unwrap(), 7);
    let job = conn.peek(7).unwrap().expect("job present");
    assert_eq!(job.body(), body);
    assert!(!job.is_reserved());
    broker.finish();
}

#[test]
fn test_reserve_with_timeout_zero_returns_none() {
    let broker = ScriptedBroker::serve(vec![step(
        "reserve-with-timeout 0\r\n",
        "TIMED_OUT\r\n",
    )]);
    let conn = broker.connect();

    assert!(conn.reserve_with_timeout(0).unwrap().is_none());
    broker.finish();
}

#[test]
fn test_reserve_deadline_soon_propagates() {
    let broker = ScriptedBroker::serve(vec![step("reserve\r\n", "DEADLINE_SOON\r\n")]);
    let conn = broker.connect();

    let err = conn.reserve().unwrap_err();
    assert!(err.is_failure("DEADLINE_SOON"));
    broker.finish();
}

#[test]
fn test_peek_family_downgrades_not_found() {
    let broker = ScriptedBroker::serve(vec![
        step("peek-ready\r\n", "NOT_FOUND\r\n"),
        step("peek-delayed\r\n", "NOT_FOUND\r\n"),
        step("peek-buried\r\n", job_reply("FOUND", 3, b"late")),
    ]);
    let conn = broker.connect();

    assert!(conn.peek_ready().unwrap().is_none());
    assert!(conn.peek_delayed().unwrap().is_none());
    let job = conn.peek_buried().unwrap().expect("buried job");
    assert_eq!(job.id(), 3);
    assert!(!job.is_reserved());
    broker.finish();
}

#[test]
fn test_use_watch_ignore_flow() {
    let broker = ScriptedBroker::serve(vec![
        step("use invoices\r\n", "USING invoices\r\n"),
        step("watch invoices\r\n", "WATCHING 2\r\n"),
        step("ignore invoices\r\n", "WATCHING 1\r\n"),
        step("ignore default\r\n", "NOT_IGNORED\r\n"),
    ]);
    let conn = broker.connect();

    assert_eq!(conn.use_tube("invoices").unwrap(), "invoices");
    assert_eq!(conn.watch("invoices").unwrap(), 2);
    assert_eq!(conn.ignore("invoices").unwrap(), 1);
    let err = conn.ignore("default").unwrap_err();
    assert!(err.is_failure("NOT_IGNORED"));
    broker.finish();
}

#[test]
fn test_put_failure_tokens_are_recognized() {
    let broker = ScriptedBroker::serve(vec![
        step("put 1 0 90 3\r\nbig\r\n", "JOB_TOO_BIG\r\n"),
        step("put 1 0 90 3\r\nbig\r\n", "DRAINING\r\n"),
        step("put 1 0 90 3\r\nbig\r\n", "BURIED 12\r\n"),
    ]);
    let conn = broker.connect();

    assert!(conn.put(b"big", 1, 0, 90).unwrap_err().is_failure("JOB_TOO_BIG"));
    assert!(conn.put(b"big", 1, 0, 90).unwrap_err().is_failure("DRAINING"));
    match conn.put(b"big", 1, 0, 90).unwrap_err() {
        BeanlineError::Command { status, args } => {
            assert_eq!(status, "BURIED");
            assert_eq!(args, vec!["12"]);
        }
        other => panic!("wrong error kind: {other:?}"),
    }
    broker.finish();
}

#[test]
fn test_stats_decode_over_the_wire() {
    let block = "---\ncurrent-jobs-ready: 2\nversion: 1.13\n";
    let broker = ScriptedBroker::serve(vec![step("stats\r\n", ok_block(block))]);
    let conn = broker.connect();

    let stats = conn.stats().unwrap();
    assert_eq!(stats.get_int("current-jobs-ready"), Some(2));
    assert_eq!(stats.get_str("version"), Some("1.13"));
    broker.finish();
}

#[test]
fn test_stats_tube_not_found() {
    let broker = ScriptedBroker::serve(vec![step("stats-tube nope\r\n", "NOT_FOUND\r\n")]);
    let conn = broker.connect();

    let err = conn.stats_tube("nope").unwrap_err();
    assert!(err.is_failure("NOT_FOUND"));
    broker.finish();
}

#[test]
fn test_tube_listings_preserve_broker_order() {
    let broker = ScriptedBroker::serve(vec![
        step("list-tubes\r\n", ok_block("---\n- zeta\n- alpha\n- default\n")),
        step("list-tubes-watched\r\n", ok_block("---\n- default\n")),
        step("list-tube-used\r\n", "USING zeta\r\n"),
    ]);
    let conn = broker.connect();

    assert_eq!(conn.list_tubes().unwrap(), vec!["zeta", "alpha", "default"]);
    assert_eq!(conn.list_tubes_watched().unwrap(), vec!["default"]);
    assert_eq!(conn.list_tube_used().unwrap(), "zeta");
    broker.finish();
}

#[test]
fn test_delete_then_stats_job_not_found() {
    let broker = ScriptedBroker::serve(vec![
        step("delete 9\r\n", "DELETED\r\n"),
        step("stats-job 9\r\n", "NOT_FOUND\r\n"),
    ]);
    let conn = broker.connect();

    conn.delete(9).unwrap();
    let err = conn.stats_job(9).unwrap_err();
    assert!(err.is_failure("NOT_FOUND"));
    broker.finish();
}

#[test]
fn test_job_shaped_calls_write_the_id_shaped_bytes() {
    let broker = ScriptedBroker::serve(vec![
        step("reserve\r\n", job_reply("RESERVED", 5, b"work")),
        step("release 5 10 0\r\n", "RELEASED\r\n"),
        step("touch 5\r\n", "TOUCHED\r\n"),
        step("kick-job 5\r\n", "KICKED\r\n"),
        step("stats-job 5\r\n", ok_block("---\nid: 5\nstate: ready\n")),
        step("kick 100\r\n", "KICKED 3\r\n"),
    ]);
    let conn = broker.connect();

    let job = conn.reserve().unwrap();
    job.release(10, 0).unwrap();
    job.touch().unwrap();
    job.kick().unwrap();
    let stats = job.stats().unwrap();
    assert_eq!(stats.get_int("id"), Some(5));
    assert_eq!(stats.get_str("state"), Some("ready"));

    assert_eq!(conn.kick(100).unwrap(), 3);
    broker.finish();
}

#[test]
fn test_bury_without_priority_reuses_current_pri() {
    let broker = ScriptedBroker::serve(vec![
        step("reserve\r\n", job_reply("RESERVED", 2, b"x")),
        step("stats-job 2\r\n", ok_block("---\nid: 2\npri: 42\n")),
        step("bury 2 42\r\n", "BURIED\r\n"),
    ]);
    let conn = broker.connect();

    let job = conn.reserve().unwrap();
    job.bury(None).unwrap();
    broker.finish();
}

#[test]
fn test_bury_falls_back_to_default_when_job_is_gone() {
    let broker = ScriptedBroker::serve(vec![
        step("reserve\r\n", job_reply("RESERVED", 2, b"x")),
        step("stats-job 2\r\n", "NOT_FOUND\r\n"),
        step(
            format!("bury 2 {DEFAULT_PRIORITY}\r\n"),
            "NOT_FOUND\r\n",
        ),
    ]);
    let conn = broker.connect();

    let job = conn.reserve().unwrap();
    let err = job.bury(None).unwrap_err();
    assert!(err.is_failure("NOT_FOUND"));
    broker.finish();
}

#[test]
fn test_bury_with_explicit_priority_skips_stats() {
    let broker = ScriptedBroker::serve(vec![
        step("reserve\r\n", job_reply("RESERVED", 4, b"x")),
        step("bury 4 7\r\n", "BURIED\r\n"),
    ]);
    let conn = broker.connect();

    let job = conn.reserve().unwrap();
    job.bury(Some(7)).unwrap();
    broker.finish();
}

#[test]
fn test_pause_tube() {
    let broker = ScriptedBroker::serve(vec![step("pause-tube emails 60\r\n", "PAUSED\r\n")]);
    let conn = broker.connect();

    conn.pause_tube("emails", 60).unwrap();
    broker.finish();
}

#[test]
fn test_unexpected_token_is_a_hard_error() {
    let broker = ScriptedBroker::serve(vec![step("touch 1\r\n", "WHAT 1\r\n")]);
    let conn = broker.connect();

    let err = conn.touch(1).unwrap_err();
    match err {
        BeanlineError::Unexpected { status, args } => {
            assert_eq!(status, "WHAT");
            assert_eq!(args, vec!["1"]);
        }
        other => panic!("wrong error kind: {other:?}"),
    }
    broker.finish();
}

#[test]
fn test_job_operations_fail_after_connection_closes() {
    let broker = ScriptedBroker::serve(vec![step(
        "reserve\r\n",
        job_reply("RESERVED", 8, b"left behind"),
    )]);
    let conn = broker.connect();

    let job = conn.reserve().unwrap();
    conn.close();

    let err = job.delete().unwrap_err();
    assert!(matches!(err, BeanlineError::ConnectionClosed));
    // The handle itself stays readable.
    assert_eq!(job.body(), b"left behind");
    broker.finish();
}

#[test]
fn test_with_connection_runs_logic_and_returns_its_value() {
    let broker = ScriptedBroker::serve(vec![step("list-tube-used\r\n", "USING default\r\n")]);

    let used = with_connection(broker.addr, |conn| conn.list_tube_used()).unwrap();
    assert_eq!(used, "default");
    broker.finish();
}

#[test]
fn test_with_connection_propagates_inner_errors() {
    let broker = ScriptedBroker::serve(vec![step("touch 3\r\n", "NOT_FOUND\r\n")]);

    let err = with_connection(broker.addr, |conn| conn.touch(3)).unwrap_err();
    assert!(err.is_failure("NOT_FOUND"));
    broker.finish();
}
