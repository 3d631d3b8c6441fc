// Copyright (c) Anza Technology, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Logging setup for binaries and tests.

use logforth::color::LevelColor;
use logforth::filter::EnvFilter;
use logforth::{Layout, append};

#[derive(Debug, Clone, Copy)]
struct CompactLayout;

impl Layout for CompactLayout {
    fn format(
        &self,
        record: &log::Record,
        _: &[Box<dyn logforth::Diagnostic>],
    ) -> anyhow::Result<Vec<u8>> {
        let colors = LevelColor::default();
        let level = colors.colorize_record_level(false, record.level());
        let target = record.target();
        let message = record.args();
        Ok(format!("{level:>5} {target} {message}").into_bytes())
    }
}

/// Enables stderr logging with a compact layout.
///
/// The log level is controlled via the `RUST_LOG` environment variable.
pub fn enable_logforth() {
    __enable_logforth(append::Stderr::default().with_layout(CompactLayout));
}

/// Enables stderr logging with the default logforth layout.
pub fn enable_logforth_stderr() {
    __enable_logforth(append::Stderr::default());
}

fn __enable_logforth<T: logforth::Append>(layout: T) {
    logforth::builder()
        .dispatch(|d| d.filter(EnvFilter::from_default_env()).append(layout))
        .apply();
}
