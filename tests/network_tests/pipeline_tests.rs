//! PipelineConnection tests (immediate mode)

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use kvwire::{Command, Config, FaultKind, KvError, PipelineConnection, PipelineMode};

use crate::support::{args, pipe, FailingWriter, MockServer, SharedSink};

// =============================================================================
// Ordering
// =============================================================================

#[test]
fn test_replies_resolve_in_queue_order() {
    let server = MockServer::start();
    let conn = server.connect_pipeline(PipelineMode::Immediate);

    let set_a = conn.queue_request(Command::Set, &args(&["a", "first"])).unwrap();
    let set_b = conn.queue_request(Command::Set, &args(&["b", "second"])).unwrap();
    let get_b = conn.queue_request(Command::Get, &args(&["b"])).unwrap();
    let get_a = conn.queue_request(Command::Get, &args(&["a"])).unwrap();
    let missing = conn.queue_request(Command::Get, &args(&["missing"])).unwrap();

    // Wait out of order; each handle still gets its own reply
    assert_eq!(missing.wait().unwrap().bulk().unwrap(), None);
    assert_eq!(get_a.wait().unwrap().bulk().unwrap().map(|b| &b[..]), Some(&b"first"[..]));
    assert_eq!(get_b.wait().unwrap().bulk().unwrap().map(|b| &b[..]), Some(&b"second"[..]));
    assert!(!set_a.wait().unwrap().is_error());
    assert!(!set_b.wait().unwrap().is_error());
}

#[test]
fn test_incr_sequence_is_consecutive() {
    let server = MockServer::start();
    let conn = server.connect_pipeline(PipelineMode::Immediate);

    let handles: Vec<_> = (0..1000)
        .map(|_| conn.queue_request(Command::Incr, &args(&["x"])).unwrap())
        .collect();

    for (i, handle) in handles.into_iter().enumerate() {
        assert_eq!(handle.wait().unwrap().number().unwrap(), i as i64 + 1);
    }
    assert_eq!(conn.pending(), 0);
}

#[test]
fn test_concurrent_callers_share_one_connection() {
    let server = MockServer::start();
    let conn = Arc::new(server.connect_pipeline(PipelineMode::Immediate));

    let workers: Vec<_> = (0..8)
        .map(|t| {
            let conn = Arc::clone(&conn);
            thread::spawn(move || {
                let key = format!("worker:{}", t);
                let handles: Vec<_> = (0..100)
                    .map(|_| conn.queue_request(Command::Incr, &args(&[key.as_str()])).unwrap())
                    .collect();
                let values: Vec<i64> = handles
                    .into_iter()
                    .map(|h| h.wait().unwrap().number().unwrap())
                    .collect();
                assert_eq!(values, (1..=100).collect::<Vec<i64>>());
            })
        })
        .collect();

    for worker in workers {
        worker.join().unwrap();
    }

    // Shared counter: every caller sees a distinct value
    let shared: Vec<_> = (0..4)
        .map(|_| {
            let conn = Arc::clone(&conn);
            thread::spawn(move || {
                (0..50)
                    .map(|_| conn.service_request(Command::Incr, &args(&["shared"])).unwrap().number().unwrap())
                    .collect::<Vec<i64>>()
            })
        })
        .collect();

    let mut all: Vec<i64> = shared.into_iter().flat_map(|h| h.join().unwrap()).collect();
    all.sort_unstable();
    assert_eq!(all, (1..=200).collect::<Vec<i64>>());
}

#[test]
fn test_dropped_handle_reply_is_drained() {
    let server = MockServer::start();
    let conn = server.connect_pipeline(PipelineMode::Immediate);

    conn.service_request(Command::Set, &args(&["a", "alpha"])).unwrap();
    conn.service_request(Command::Set, &args(&["b", "beta"])).unwrap();

    drop(conn.queue_request(Command::Get, &args(&["a"])).unwrap());
    let response = conn.service_request(Command::Get, &args(&["b"])).unwrap();
    assert_eq!(response.bulk().unwrap().map(|b| &b[..]), Some(&b"beta"[..]));
}

#[test]
fn test_server_error_does_not_fault_pipeline() {
    let server = MockServer::start();
    let conn = server.connect_pipeline(PipelineMode::Immediate);

    conn.service_request(Command::Set, &args(&["text", "abc"])).unwrap();
    let bad = conn.queue_request(Command::Incr, &args(&["text"])).unwrap();
    let good = conn.queue_request(Command::Incr, &args(&["n"])).unwrap();

    assert!(bad.wait().unwrap().is_error());
    assert_eq!(good.wait().unwrap().number().unwrap(), 1);
    assert!(!conn.is_faulted());
}

#[test]
fn test_argument_error_is_not_queued() {
    let (_feeder, reader) = pipe();
    let sink = SharedSink::default();
    let conn = PipelineConnection::new(reader, sink.clone(), &Config::default()).unwrap();

    let err = conn.queue_request(Command::Get, &args(&["two words"])).err().unwrap();
    assert!(matches!(err, KvError::Argument(_)));
    assert_eq!(conn.pending(), 0);
    assert!(sink.contents().is_empty());
    assert!(!conn.is_faulted());
}

// =============================================================================
// Faults
// =============================================================================

#[test]
fn test_protocol_error_fails_every_outstanding_call() {
    let (feeder, reader) = pipe();
    let conn = PipelineConnection::new(reader, SharedSink::default(), &Config::default()).unwrap();

    let first = conn.queue_request(Command::Ping, &[]).unwrap();
    let second = conn.queue_request(Command::Ping, &[]).unwrap();
    let third = conn.queue_request(Command::Ping, &[]).unwrap();
    feeder.feed(b"+PONG\r\n?garbage\r\n");

    assert!(!first.wait().unwrap().is_error());
    assert!(matches!(second.wait(), Err(KvError::Protocol(_))));
    match third.wait() {
        Err(KvError::Faulted(fault)) => assert_eq!(fault.kind, FaultKind::Protocol),
        other => panic!("expected Faulted, got {:?}", other.map(|r| r.command())),
    }

    assert!(conn.is_faulted());
    assert_eq!(conn.pending(), 0);
    match conn.queue_request(Command::Ping, &[]) {
        Err(KvError::Faulted(fault)) => assert_eq!(fault.kind, FaultKind::Protocol),
        other => panic!("expected Faulted, got {:?}", other.map(|h| h.command())),
    }
}

#[test]
fn test_end_of_stream_fails_outstanding_calls() {
    let (feeder, reader) = pipe();
    let conn = PipelineConnection::new(reader, SharedSink::default(), &Config::default()).unwrap();

    let first = conn.queue_request(Command::Get, &args(&["k"])).unwrap();
    let second = conn.queue_request(Command::Get, &args(&["k"])).unwrap();
    feeder.feed(b"$5\r\nab");
    drop(feeder);

    assert!(matches!(first.wait(), Err(KvError::EndOfStream { .. })));
    match second.wait() {
        Err(KvError::Faulted(fault)) => assert_eq!(fault.kind, FaultKind::EndOfStream),
        other => panic!("expected Faulted, got {:?}", other.map(|r| r.command())),
    }
}

#[test]
fn test_write_failure_faults_atomically() {
    let (feeder, reader) = pipe();
    let writer = FailingWriter::new(SharedSink::default(), 2);
    let conn = PipelineConnection::new(reader, writer, &Config::default()).unwrap();

    let first = conn.queue_request(Command::Ping, &[]).unwrap();
    let second = conn.queue_request(Command::Ping, &[]).unwrap();

    let err = conn.queue_request(Command::Ping, &[]).err().unwrap();
    assert!(matches!(err, KvError::Io(_)));

    // Calls already written are failed with the same cause
    for handle in [first, second] {
        match handle.wait() {
            Err(KvError::Faulted(fault)) => assert_eq!(fault.kind, FaultKind::Io),
            other => panic!("expected Faulted, got {:?}", other.map(|r| r.command())),
        }
    }
    assert_eq!(conn.pending(), 0);
    assert!(matches!(
        conn.queue_request(Command::Ping, &[]),
        Err(KvError::Faulted(_))
    ));

    // Lets the reader observe EOF and exit
    drop(feeder);
}

#[test]
fn test_quit_closes_pipeline() {
    let server = MockServer::start();
    let conn = server.connect_pipeline(PipelineMode::Immediate);

    let response = conn.service_request(Command::Quit, &[]).unwrap();
    assert!(response.status().unwrap().is_terminal());

    match conn.queue_request(Command::Ping, &[]) {
        Err(KvError::Faulted(fault)) => assert_eq!(fault.kind, FaultKind::Closed),
        other => panic!("expected Faulted, got {:?}", other.map(|h| h.command())),
    }
}

#[test]
fn test_wait_timeout_keeps_handle_usable() {
    let (feeder, reader) = pipe();
    let conn = PipelineConnection::new(reader, SharedSink::default(), &Config::default()).unwrap();

    let mut handle = conn.queue_request(Command::Incr, &args(&["n"])).unwrap();
    assert!(matches!(handle.wait_timeout(Duration::from_millis(20)), Err(KvError::Timeout)));
    assert!(handle.try_take().is_none());
    assert_eq!(conn.pending(), 1);

    feeder.feed(b":42\r\n");
    let response = handle.wait_timeout(Duration::from_secs(5)).unwrap();
    assert_eq!(response.number().unwrap(), 42);

    // The result is handed out once
    assert!(matches!(handle.try_take(), Some(Err(KvError::ResponseState(_)))));
}

#[test]
fn test_close_drains_outstanding_replies() {
    let (feeder, reader) = pipe();
    let conn = PipelineConnection::new(reader, SharedSink::default(), &Config::default()).unwrap();

    let handle = conn.queue_request(Command::Ping, &[]).unwrap();
    feeder.feed(b"+PONG\r\n");
    conn.close().unwrap();

    assert!(!handle.wait().unwrap().is_error());
    match conn.queue_request(Command::Ping, &[]) {
        Err(KvError::Faulted(fault)) => assert_eq!(fault.kind, FaultKind::Closed),
        other => panic!("expected Faulted, got {:?}", other.map(|h| h.command())),
    }
}
