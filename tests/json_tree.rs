mod common;

use common::*;
use mp4tree::{Diagnostics, Mp4File, ParseOptions, UNBOUNDED, WarningKind, analyze_file, to_json_tree};
use serde_json::Value;

#[test]
fn json_tree_offsets_and_sizes() {
    let data = movie();
    let file = Mp4File::from_bytes(&data, &mut Diagnostics::new()).unwrap();
    let tree = to_json_tree(&file, UNBOUNDED);

    assert_eq!(tree.len(), 4);
    let types: Vec<_> = tree.iter().map(|n| n.typ.as_str()).collect();
    assert_eq!(types, ["ftyp", "moov", "moof", "mdat"]);

    let mut offset = 0;
    for node in &tree {
        assert_eq!(node.offset, offset);
        offset += node.size;
    }
    assert_eq!(offset, data.len() as u64);

    let moov = &tree[1];
    assert_eq!(moov.kind, "container");
    assert_eq!(moov.full_name, "Movie Box");
    let children = moov.children.as_ref().expect("moov children");
    assert_eq!(children[0].typ, "mvhd");
    assert_eq!(children[0].offset, moov.offset + 8);
    assert_eq!(children[0].version, Some(0));
    assert_eq!(children[1].offset, children[0].offset + children[0].size);

    assert_eq!(tree[3].kind, "leaf");
    assert_eq!(tree[3].payload_size, 8);
    assert!(tree[3].children.is_none());
}

#[test]
fn json_tree_carries_decoded_fields() {
    let file = Mp4File::from_bytes(&movie(), &mut Diagnostics::new()).unwrap();
    let tree = to_json_tree(&file, UNBOUNDED);
    let v = serde_json::to_value(&tree).unwrap();

    let mvhd = &v[1]["children"][0]["decoded"];
    assert_eq!(mvhd["timescale"], 1000);
    assert_eq!(mvhd["rate"], "1.000");
    assert_eq!(mvhd["volume"], "1.00");

    let ftyp = &v[0]["decoded"];
    assert_eq!(ftyp["major_brand"], "iso6");
    assert_eq!(ftyp["compatible_brands"], serde_json::json!(["iso6", "dash"]));

    let trak = &v[1]["children"][1];
    let unknown = &trak["children"][3];
    assert_eq!(unknown["typ"], "zzzz");
    assert_eq!(unknown["kind"], "unknown");
    assert_eq!(unknown["decoded"], Value::Null);

    let trun = &v[2]["children"][1]["children"][2]["decoded"];
    assert_eq!(trun["data_offset"], 100);
    assert_eq!(trun["samples"][1]["size"], 800);
}

#[test]
fn json_depth_limit_drops_children() {
    let file = Mp4File::from_bytes(&movie(), &mut Diagnostics::new()).unwrap();
    let tree = to_json_tree(&file, 1);
    let moov_children = tree[1].children.as_ref().unwrap();
    assert!(moov_children.iter().all(|c| c.children.is_none()));
}

#[test]
fn json_uuid_is_hex() {
    let mut payload = (0u8..16).collect::<Vec<_>>();
    payload.extend_from_slice(b"data");
    let uuid = bx(b"uuid", &payload);
    let file = Mp4File::from_bytes(&uuid, &mut Diagnostics::new()).unwrap();
    let tree = to_json_tree(&file, UNBOUNDED);
    assert_eq!(tree[0].uuid.as_deref(), Some("000102030405060708090a0b0c0d0e0f"));
    assert_eq!(tree[0].header_size, 24);
    assert_eq!(tree[0].payload_size, 4);
}

#[test]
fn analyze_file_reads_from_disk() {
    let path = std::env::temp_dir().join(format!("mp4tree-analyze-{}.mp4", std::process::id()));
    std::fs::write(&path, movie()).unwrap();

    let (tree, warnings) = analyze_file(&path, &ParseOptions::default()).unwrap();
    std::fs::remove_file(&path).ok();

    assert_eq!(tree.len(), 4);
    assert_eq!(warnings.len(), 1);
    assert_eq!(warnings[0].kind, WarningKind::UnknownType);
    assert_eq!(warnings[0].path, "1.1.3");
}

#[test]
fn analyze_missing_file_is_an_error() {
    let path = std::env::temp_dir().join("mp4tree-does-not-exist.mp4");
    assert!(analyze_file(&path, &ParseOptions::default()).is_err());
}
