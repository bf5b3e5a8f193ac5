// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The `local_session_logs` option (spec §6): writes session output to a
//! local file in addition to whatever the out-of-scope log shipper does
//! with it. `wa_openjd::SessionLogSink` already tags every line with
//! `{session_id, session_action_id}` and forwards to `tracing`
//! unconditionally; this is the inner sink underneath that, so the local
//! file carries the same per-action lines.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Mutex;

use wa_openjd::{LogSink, LogStream};

pub struct LocalFileLogSink {
    path: PathBuf,
    file: Mutex<Option<std::fs::File>>,
}

impl LocalFileLogSink {
    pub fn new(logs_dir: &std::path::Path) -> Self {
        Self { path: logs_dir.join("session-output.log"), file: Mutex::new(None) }
    }

    fn with_file(&self, f: impl FnOnce(&mut std::fs::File)) {
        let mut guard = self.file.lock().unwrap_or_else(|e| e.into_inner());
        if guard.is_none() {
            if let Some(parent) = self.path.parent() {
                let _ = std::fs::create_dir_all(parent);
            }
            *guard = OpenOptions::new().create(true).append(true).open(&self.path).ok();
        }
        if let Some(file) = guard.as_mut() {
            f(file);
        }
    }
}

impl LogSink for LocalFileLogSink {
    fn write_line(&self, stream: LogStream, line: &str) {
        let prefix = match stream {
            LogStream::Stdout => "stdout",
            LogStream::Stderr => "stderr",
        };
        self.with_file(|file| {
            let _ = writeln!(file, "[{prefix}] {line}");
        });
    }
}

#[cfg(test)]
#[path = "session_log_tests.rs"]
mod tests;
