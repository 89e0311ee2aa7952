//! Non-fatal findings collected while decoding a box tree.
//!
//! Every warning is also emitted as a `tracing` event so a subscriber sees
//! them as they happen; the collected list lets callers inspect them after
//! the parse returns.

use crate::boxes::{FourCC, Mp4Box};
use crate::parser::Error;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WarningKind {
    /// Type not recognized; kept as opaque bytes.
    UnknownType,
    /// Recognized type whose payload failed to decode.
    DecodeFailed,
    /// A container's payload did not split cleanly into child boxes.
    ChildScanAborted,
    /// Nesting exceeded `ParseOptions::max_depth`.
    DepthLimit,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Warning {
    pub path: String,
    pub box_type: FourCC,
    pub kind: WarningKind,
    pub message: String,
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}: {}", self.path, self.box_type, self.message)
    }
}

#[derive(Debug, Default)]
pub struct Diagnostics {
    warnings: Vec<Warning>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&mut self, b: &Mp4Box, kind: WarningKind, message: String) {
        let path = b.tag.to_string();
        tracing::warn!(path = %path, box_type = %b.box_type, kind = ?kind, "{message}");
        self.warnings.push(Warning { path, box_type: b.box_type, kind, message });
    }

    pub fn unknown_type(&mut self, b: &Mp4Box) {
        let path = b.tag.to_string();
        tracing::debug!(path = %path, box_type = %b.box_type, "type not decoded");
        self.warnings.push(Warning {
            path,
            box_type: b.box_type,
            kind: WarningKind::UnknownType,
            message: "type not decoded".into(),
        });
    }

    pub fn decode_failed(&mut self, b: &Mp4Box, err: &Error) {
        self.push(b, WarningKind::DecodeFailed, err.to_string());
    }

    pub fn child_scan_aborted(&mut self, b: &Mp4Box, err: &Error) {
        self.push(b, WarningKind::ChildScanAborted, format!("children kept as raw bytes: {err}"));
    }

    pub fn depth_limit(&mut self, b: &Mp4Box, depth: usize) {
        self.push(b, WarningKind::DepthLimit, format!("nesting depth {depth} reached, not descending"));
    }

    pub fn warnings(&self) -> &[Warning] {
        &self.warnings
    }

    pub fn of_kind(&self, kind: WarningKind) -> impl Iterator<Item = &Warning> {
        self.warnings.iter().filter(move |w| w.kind == kind)
    }

    /// First decode failure or aborted child scan, in stream order.
    pub fn first_failure(&self) -> Option<&Warning> {
        self.warnings.iter().find(|w| {
            matches!(w.kind, WarningKind::DecodeFailed | WarningKind::ChildScanAborted)
        })
    }

    /// No failures recorded (unknown types don't count).
    pub fn is_clean(&self) -> bool {
        self.first_failure().is_none()
    }
}
