use crate::{
    boxes::{BoxKind, Mp4Box},
    diag::{Diagnostics, Warning},
    dispatch::ParseOptions,
    file::Mp4File,
    known_boxes::KnownBox,
};
use serde::Serialize;
use serde_json::Value;
use std::{fs::File, path::Path};

/// A JSON-serializable view of one box.
///
/// Used for `mp4dump --json`; offsets are absolute positions in the stream
/// the tree was parsed from.
#[derive(Debug, Serialize)]
pub struct JsonBox {
    pub path: String,
    pub offset: u64,
    pub size: u64,
    pub header_size: usize,
    pub payload_size: usize,

    pub typ: String,
    pub uuid: Option<String>,
    pub version: Option<u8>,
    pub flags: Option<u32>,
    pub kind: &'static str,
    pub full_name: &'static str,
    pub summary: Option<String>,
    pub decoded: Option<Value>,
    pub children: Option<Vec<JsonBox>>,
}

/// Decoded fields of a box as JSON, `None` for types without any.
pub fn decoded_value(kind: &BoxKind) -> Option<Value> {
    let v = match kind {
        BoxKind::FileType(b) => serde_json::to_value(b),
        BoxKind::MovieHeader(b) => serde_json::to_value(b),
        BoxKind::TrackHeader(b) => serde_json::to_value(b),
        BoxKind::MediaHeader(b) => serde_json::to_value(b),
        BoxKind::Handler(b) => serde_json::to_value(b),
        BoxKind::VideoMediaHeader(b) => serde_json::to_value(b),
        BoxKind::SoundMediaHeader(b) => serde_json::to_value(b),
        BoxKind::HintMediaHeader(b) => serde_json::to_value(b),
        BoxKind::Copyright(b) => serde_json::to_value(b),
        BoxKind::TrackReferenceType(b) => serde_json::to_value(b),
        BoxKind::SegmentIndex(b) => serde_json::to_value(b),
        BoxKind::MovieFragmentHeader(b) => serde_json::to_value(b),
        BoxKind::TrackFragmentHeader(b) => serde_json::to_value(b),
        BoxKind::TrackRun(b) => serde_json::to_value(b),
        BoxKind::TrackFragmentDecodeTime(b) => serde_json::to_value(b),
        BoxKind::EventMessage(b) => serde_json::to_value(b),
        BoxKind::Container | BoxKind::NullMediaHeader | BoxKind::Data | BoxKind::Opaque => {
            return None;
        }
    };
    v.ok()
}

fn kind_name(b: &Mp4Box) -> &'static str {
    match b.kind {
        BoxKind::Container => "container",
        BoxKind::Opaque => "unknown",
        BoxKind::Data => "leaf",
        _ if b.full_box.is_some() => "full",
        _ => "leaf",
    }
}

/// Build the JSON node for `b` placed at `offset`, descending `max_depth` levels.
pub fn box_to_json(b: &Mp4Box, offset: u64, max_depth: usize) -> JsonBox {
    let header_size = b.size_header();
    let children = if b.is_container() && max_depth > 0 {
        let mut at = offset + header_size as u64;
        let nodes = b
            .children
            .iter()
            .map(|c| {
                let node = box_to_json(c, at, max_depth - 1);
                at += c.effective_size();
                node
            })
            .collect();
        Some(nodes)
    } else {
        None
    };
    let summary = b.kind.to_string();

    JsonBox {
        path: b.tag.to_string(),
        offset,
        size: b.effective_size(),
        header_size,
        payload_size: b.raw.len(),
        typ: b.box_type.to_string(),
        uuid: b.user_type.map(hex::encode),
        version: b.version(),
        flags: b.flags(),
        kind: kind_name(b),
        full_name: KnownBox::from(b.box_type).full_name(),
        summary: (!summary.is_empty()).then_some(summary),
        decoded: decoded_value(&b.kind),
        children,
    }
}

pub fn to_json_tree(file: &Mp4File, max_depth: usize) -> Vec<JsonBox> {
    let mut offset = 0;
    file.boxes()
        .iter()
        .map(|b| {
            let node = box_to_json(b, offset, max_depth);
            offset += b.effective_size();
            node
        })
        .collect()
}

/// Parse a file from disk and return its JSON tree plus any warnings.
pub fn analyze_file(
    path: impl AsRef<Path>,
    opts: &ParseOptions,
) -> anyhow::Result<(Vec<JsonBox>, Vec<Warning>)> {
    let f = File::open(&path)?;
    let mut diag = Diagnostics::new();
    let file = Mp4File::parse_with(f, &mut diag, opts)?;
    Ok((to_json_tree(&file, opts.max_depth), diag.warnings().to_vec()))
}
