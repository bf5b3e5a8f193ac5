// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn write_line_tags_stream_and_appends() {
    let dir = tempfile::tempdir().unwrap();
    let sink = LocalFileLogSink::new(dir.path());

    sink.write_line(LogStream::Stdout, "hello");
    sink.write_line(LogStream::Stderr, "uh oh");

    let contents = std::fs::read_to_string(dir.path().join("session-output.log")).unwrap();
    assert_eq!(contents, "[stdout] hello\n[stderr] uh oh\n");
}

#[test]
fn write_line_creates_logs_dir_if_missing() {
    let dir = tempfile::tempdir().unwrap();
    let nested = dir.path().join("nested");
    let sink = LocalFileLogSink::new(&nested);

    sink.write_line(LogStream::Stdout, "line");

    assert!(nested.join("session-output.log").exists());
}
