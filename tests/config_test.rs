//! Tests for configuration-driven queue construction and stats export

use workqueue::builders::build_queues;
use workqueue::config::SchedulerConfig;
use workqueue::{Priority, QueueMode, TeardownMode, WorkQueueError};

#[test]
fn test_build_queues_from_json() {
    let cfg = SchedulerConfig::from_json_str(
        r#"{
            "defaults": { "hardware_concurrency": 8, "thread_name_prefix": "app" },
            "queues": {
                "decode": { "priority": "high", "mode": "concurrent" },
                "index": { "priority": "background", "mode": "concurrent",
                           "config": { "hardware_concurrency": 8, "background_divisor": 4 } },
                "journal": { "mode": "serial" }
            }
        }"#,
    )
    .unwrap();

    let queues = build_queues(&cfg).unwrap();
    assert_eq!(queues["decode"].max_width(), 16);
    assert_eq!(queues["index"].max_width(), 2);
    assert_eq!(queues["journal"].max_width(), 1);
    assert_eq!(queues["journal"].priority(), Priority::Default);
    assert_eq!(queues["journal"].mode(), QueueMode::Serial);

    let name = queues["decode"]
        .perform_synchronous(|| std::thread::current().name().map(str::to_owned))
        .unwrap();
    assert_eq!(name.as_deref(), Some("app-decode-0"));

    for queue in queues.values() {
        queue.shutdown(TeardownMode::Drain);
    }
}

#[test]
fn test_invalid_queue_config_is_reported() {
    let cfg = SchedulerConfig::from_json_str(
        r#"{ "queues": { "bad": { "config": { "idle_timeout_ms": 0 } } } }"#,
    );
    let err = cfg.unwrap_err();
    assert!(err.contains("bad"), "{err}");

    let mut cfg = SchedulerConfig::from_json_str(r#"{ "queues": { "ok": {} } }"#).unwrap();
    cfg.defaults.high_burst_factor = 0;
    assert!(matches!(build_queues(&cfg), Err(WorkQueueError::InvalidConfig(_))));
}

#[test]
fn test_stats_serialize_to_json() {
    let cfg = SchedulerConfig::from_json_str(r#"{ "queues": { "stats": {} } }"#).unwrap();
    let queues = build_queues(&cfg).unwrap();
    let queue = &queues["stats"];
    queue.perform_synchronous(|| ()).unwrap();

    let json = serde_json::to_value(queue.stats()).unwrap();
    assert_eq!(json["identifier"], "stats");
    assert_eq!(json["priority"], "default");
    assert_eq!(json["mode"], "serial");
    assert_eq!(json["main"], false);
    assert_eq!(json["max_width"], 1);
    queue.shutdown(TeardownMode::Drain);
}
