// SPDX-FileCopyrightText: Copyright (c) 2024 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
// SPDX-License-Identifier: Apache-2.0

//! Error and warning types shared by the SPEF and SDF readers.

use std::fmt;

use thiserror::Error;

/// Hard parse failures. The readers fail fast: the first structural problem
/// in a required section aborts the read and marks the model invalid.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("lexical error at {line}:{col}: {msg}")]
    Lexical { msg: String, line: u32, col: u32 },

    #[error("{context}: expected {expected}, found `{found}` at {line}:{col}")]
    UnexpectedToken {
        expected: String,
        found: String,
        context: &'static str,
        line: u32,
        col: u32,
    },

    #[error("unknown name-map index *{index} at {line}:{col}")]
    UnknownIndex { index: u64, line: u32, col: u32 },

    #[error("structural error: {0}")]
    Structural(String),

    #[error("unsupported feature: {0}")]
    Unsupported(&'static str),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// A non-fatal diagnostic emitted during a read. Duplicates, skipped `*SC`
/// payloads, and unrecognized optional keywords land here; they never abort
/// the parse.
#[derive(Debug, Clone)]
pub struct Warning {
    pub msg: String,
    pub line: u32,
    pub col: u32,
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}: {}", self.line, self.col, self.msg)
    }
}

/// Collector for warnings. The sink is invoked for every new warning; the
/// default sink forwards to `log::warn!`. Warnings at the same source
/// position as the previous one are dropped so a single bad token does not
/// cascade into a wall of diagnostics.
pub struct Warnings {
    list: Vec<Warning>,
    sink: Option<Box<dyn FnMut(&Warning)>>,
    last_pos: Option<(u32, u32)>,
}

impl Default for Warnings {
    fn default() -> Self {
        Warnings {
            list: Vec::new(),
            sink: None,
            last_pos: None,
        }
    }
}

impl Warnings {
    pub fn set_sink(&mut self, sink: Box<dyn FnMut(&Warning)>) {
        self.sink = Some(sink);
    }

    pub fn emit(&mut self, line: u32, col: u32, msg: impl Into<String>) {
        if self.last_pos == Some((line, col)) {
            return;
        }
        self.last_pos = Some((line, col));
        let w = Warning {
            msg: msg.into(),
            line,
            col,
        };
        match &mut self.sink {
            Some(sink) => sink(&w),
            None => log::warn!("{}", w),
        }
        self.list.push(w);
    }

    pub fn list(&self) -> &[Warning] {
        &self.list
    }
}

impl fmt::Debug for Warnings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Warnings").field("list", &self.list).finish()
    }
}
