// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Test-only helpers shared by the unit tests

use std::sync::Once;

use serde_json::Value;

use crate::config::FsConfig;
use crate::volume::Volume;

static TRACING: Once = Once::new();

/// Route `tracing` output through the test harness; `RUST_LOG` filters it
pub(crate) fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

/// Volume pre-populated from a JSON tree
pub(crate) fn volume_from(tree: Value) -> Volume {
    init_tracing();
    Volume::from_json(&tree, FsConfig::default()).expect("fixture tree should load")
}
