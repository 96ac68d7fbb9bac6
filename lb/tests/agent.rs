//! End-to-end behavior of the diagnostics agent

use std::fs;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use chrono::Utc;
use logbus::listeners::request_listener;
use logbus::{
    Agent, Config, DispatchConfig, EventFlag, EventFlagSet, FileConfig, FileSink, LineFormat, Payload, RequestEvent,
    RollPolicy, StreamSink,
};
use tempfile::TempDir;

fn quiet_sink() -> StreamSink {
    StreamSink::from_writer(std::io::sink()).with_format(LineFormat::plain())
}

#[test]
fn test_synchronous_dispatch_preserves_emission_order() {
    let agent = Agent::with_sink(EventFlagSet::all(), quiet_sink()).unwrap();
    let counter = Arc::new(AtomicUsize::new(0));
    let seen = Arc::new(Mutex::new(Vec::new()));

    for flag in ["e1", "e2", "e3"] {
        let counter = Arc::clone(&counter);
        let seen = Arc::clone(&seen);
        agent.add_event_listener(flag, move |_, event| {
            let tick = counter.fetch_add(1, Ordering::SeqCst);
            seen.lock().unwrap().push((tick, event.flag.to_string()));
            Ok(())
        });
    }

    for _ in 0..50 {
        agent.on_event("e1", ());
        agent.on_event("e2", ());
        agent.on_event("e3", ());
    }
    agent.close().unwrap();

    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 150);
    for (i, (tick, flag)) in seen.iter().enumerate() {
        assert_eq!(*tick, i);
        assert_eq!(flag, ["e1", "e2", "e3"][i % 3]);
    }
}

#[test]
fn test_events_without_listeners_are_not_queued() {
    let agent = Agent::with_sink(EventFlagSet::all(), quiet_sink()).unwrap();
    let (started_tx, started_rx) = mpsc::channel();
    let (release_tx, release_rx) = mpsc::channel::<()>();
    let release_rx = Mutex::new(release_rx);

    agent.add_event_listener("blocker", move |_, _| {
        started_tx.send(()).unwrap();
        release_rx.lock().unwrap().recv().unwrap();
        Ok(())
    });
    agent.on_event("blocker", ());
    started_rx.recv_timeout(Duration::from_secs(5)).unwrap();

    for _ in 0..1000 {
        agent.on_event(EventFlag::INFO, "nobody listens");
    }
    assert!(agent.is_enabled(EventFlag::INFO));
    assert_eq!(agent.queue().len(), 0);

    release_tx.send(()).unwrap();
    agent.close().unwrap();
}

#[test]
fn test_disabled_events_never_reach_listeners() {
    let agent = Agent::with_sink("all,-debug".parse().unwrap(), quiet_sink()).unwrap();
    let hits = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&hits);
    agent.add_event_listener(EventFlag::DEBUG, move |_, _| {
        counter.fetch_add(1, Ordering::SeqCst);
        Ok(())
    });

    agent.on_event(EventFlag::DEBUG, "dropped");
    agent.debugf("also dropped");
    agent.enable_event(EventFlag::DEBUG);
    agent.on_event(EventFlag::DEBUG, "kept");
    agent.close().unwrap();

    assert_eq!(hits.load(Ordering::SeqCst), 1);
}

#[test]
fn test_timestamp_is_captured_at_emission() {
    let agent = Agent::with_sink(EventFlagSet::all(), quiet_sink()).unwrap();
    let (started_tx, started_rx) = mpsc::channel();
    let (release_tx, release_rx) = mpsc::channel::<()>();
    let release_rx = Mutex::new(release_rx);
    agent.add_event_listener("blocker", move |_, _| {
        started_tx.send(()).unwrap();
        release_rx.lock().unwrap().recv().unwrap();
        Ok(())
    });

    let observed = Arc::new(Mutex::new(None));
    let slot = Arc::clone(&observed);
    agent.add_event_listener("timed", move |_, event| {
        *slot.lock().unwrap() = Some((event.timestamp, Utc::now()));
        Ok(())
    });

    agent.on_event("blocker", ());
    started_rx.recv_timeout(Duration::from_secs(5)).unwrap();

    let before = Utc::now();
    agent.on_event("timed", ());
    let after = Utc::now();
    thread::sleep(Duration::from_millis(50));
    release_tx.send(()).unwrap();
    agent.close().unwrap();

    let (stamped, handled) = observed.lock().unwrap().take().unwrap();
    assert!(stamped >= before && stamped <= after);
    assert!(handled - stamped >= chrono::Duration::milliseconds(50));
}

#[test]
fn test_asynchronous_dispatch_delivers_everything() {
    let agent = Agent::with_dispatch(EventFlagSet::all(), quiet_sink(), DispatchConfig::asynchronous(4)).unwrap();
    assert_eq!(agent.queue().num_workers(), 4);

    let hits = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&hits);
    agent.add_event_listener("work", move |_, _| {
        counter.fetch_add(1, Ordering::SeqCst);
        Ok(())
    });

    let agent = Arc::new(agent);
    let producers: Vec<_> = (0..4)
        .map(|_| {
            let agent = Arc::clone(&agent);
            thread::spawn(move || {
                for _ in 0..250 {
                    agent.on_event("work", ());
                }
            })
        })
        .collect();
    for producer in producers {
        producer.join().unwrap();
    }
    agent.close().unwrap();

    assert_eq!(hits.load(Ordering::SeqCst), 1000);
}

#[test]
fn test_panicking_listener_is_isolated_and_reported() {
    let agent = Agent::with_sink(EventFlagSet::all(), quiet_sink()).unwrap();
    let failures = Arc::new(Mutex::new(Vec::new()));
    let sink_failures = Arc::clone(&failures);
    agent.add_error_listener(move |failure| {
        sink_failures.lock().unwrap().push(failure.flag().to_string());
    });

    let after = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&after);
    agent.add_event_listener("fragile", |_, _| panic!("listener bug"));
    agent.add_event_listener("fragile", move |_, _| {
        counter.fetch_add(1, Ordering::SeqCst);
        Ok(())
    });

    agent.on_event("fragile", ());
    agent.on_event("fragile", ());
    agent.close().unwrap();

    assert_eq!(after.load(Ordering::SeqCst), 2);
    assert_eq!(*failures.lock().unwrap(), vec!["fragile".to_string(), "fragile".to_string()]);
}

#[test]
fn test_typed_listener_and_sink_output() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("access.log");
    let sink = FileSink::open(&path, RollPolicy::unbounded()).unwrap();
    let agent = Agent::with_sink(EventFlagSet::from_flags([EventFlag::WEB_REQUEST_START]), sink).unwrap();

    agent.add_event_listener(
        EventFlag::WEB_REQUEST_START,
        request_listener(|sink, at, request| {
            sink.printf_at(at, format_args!("{} {}", request.method, request.path))?;
            Ok(())
        }),
    );

    agent.on_event(EventFlag::WEB_REQUEST_START, RequestEvent::new("GET", "/health"));
    agent.on_event(EventFlag::WEB_REQUEST_START, Payload::Message("ignored".to_string()));
    agent.close().unwrap();

    let text = fs::read_to_string(&path).unwrap();
    assert_eq!(text.lines().count(), 1);
    assert!(text.trim_end().ends_with("GET /health"));
}

#[test]
fn test_agent_from_config_writes_rolling_file() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("app.log");

    let mut file = FileConfig::new(&path);
    file.max_size = "1kb".to_string();
    file.max_archives = 2;
    let config = Config {
        events: "all".parse().unwrap(),
        file: Some(file),
        ..Config::default()
    };

    let agent = Agent::from_config(&config).unwrap();
    for i in 0..200 {
        agent.infof(format_args!("request {} handled", i));
    }
    agent.close().unwrap();

    let archives = agent_archives(&path);
    assert_eq!(archives, vec!["app.log.1".to_string(), "app.log.2".to_string()]);

    let text = fs::read_to_string(&path).unwrap();
    assert!(text.lines().all(|l| l.contains(" Info request ")));
    assert!(!text.contains('\u{1b}'));
}

fn agent_archives(path: &std::path::Path) -> Vec<String> {
    let mut names: Vec<String> = fs::read_dir(path.parent().unwrap())
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .filter(|n| n.starts_with("app.log."))
        .collect();
    names.sort();
    names
}

#[test]
fn test_sink_failures_reach_error_listeners() {
    let temp = TempDir::new().unwrap();
    let sink = FileSink::open(temp.path().join("app.log"), RollPolicy::unbounded()).unwrap();
    let agent = Agent::with_sink(EventFlagSet::all(), sink).unwrap();

    let failures = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&failures);
    agent.add_error_listener(move |failure| {
        if !failure.is_listener_failure() {
            counter.fetch_add(1, Ordering::SeqCst);
        }
    });

    agent.sink().close().unwrap();
    agent.infof("nowhere to go");
    assert_eq!(failures.load(Ordering::SeqCst), 1);
}

#[test]
fn test_default_agent_queue_is_unbounded() {
    let agent = Agent::with_sink(EventFlagSet::all(), quiet_sink()).unwrap();
    assert!(agent.queue().is_synchronous());
    assert_eq!(agent.queue().num_workers(), 1);
    assert_eq!(agent.queue().max_work_items(), None);
    agent.close().unwrap();
}
