// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Common helpers for integration tests

#![allow(dead_code)]

use std::sync::{Arc, Once};

use memfs_core::{FsConfig, Volume};
use parking_lot::Mutex;
use serde_json::Value;

static TRACING: Once = Once::new();

pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

/// Volume built from a JSON tree, e.g. `{"folder": {"file": "test"}, "empty-folder": null}`
pub fn volume(tree: Value) -> Volume {
    init_tracing();
    Volume::from_json(&tree, FsConfig::default()).expect("fixture tree should load")
}

pub fn shared_volume(tree: Value) -> Arc<Volume> {
    Arc::new(volume(tree))
}

/// Slot a callback can fill once the event loop runs it
pub struct Outcome<T>(Arc<Mutex<Option<T>>>);

impl<T: Send + 'static> Outcome<T> {
    pub fn new() -> Self {
        Self(Arc::new(Mutex::new(None)))
    }

    pub fn callback(&self) -> impl FnOnce(T) + Send + 'static {
        let slot = self.0.clone();
        move |value| *slot.lock() = Some(value)
    }

    pub fn is_settled(&self) -> bool {
        self.0.lock().is_some()
    }

    pub fn take(&self) -> T {
        self.0.lock().take().expect("callback has not run")
    }
}
