//! Default-mode logging to a rotating main file and an access file.

use homeserver_logging::observability::{self, context};

mod common;

#[test]
fn test_default_mode_writes_stamped_main_line() {
    let dir = tempfile::tempdir().unwrap();
    let settings = common::file_settings(dir.path());
    let pipeline = observability::init(&settings).unwrap();

    {
        let _guard = context::push("req-42");
        tracing::info!("hello");
        // Below the default thresholds.
        tracing::debug!("not written");
        tracing::debug!(target: "homeserver::storage", "not written either");
    }
    pipeline.flush().unwrap();

    let lines = common::main_lines(&dir.path().join("homeserver.log"));
    assert_eq!(lines.len(), 1, "{lines:?}");
    let line = &lines[0];
    assert!(common::is_timestamp(&line.timestamp), "{line:?}");
    assert_eq!(line.name, "end_to_end");
    assert!(line.line.parse::<u32>().is_ok());
    assert_eq!(line.level, "INFO");
    assert_eq!(line.request, "req-42");
    assert_eq!(line.message, "hello");

    assert!(common::read_lines(&dir.path().join("access.log")).is_empty());
    assert_eq!(pipeline.write_failures(), 0);
}
