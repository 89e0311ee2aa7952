mod common;

use common::*;
use mp4tree::boxes::{BoxKind, FourCC, Mp4Box};
use mp4tree::fragment::TfhdBox;
use mp4tree::parser::read_box;
use mp4tree::{
    Diagnostics, EmsgBox, Error, EventTime, Mp4File, ParseOptions, Tag, UNBOUNDED, WarningKind,
    decode_box,
};

fn read(data: &[u8]) -> Mp4Box {
    let mut src = data;
    read_box(&mut src, &Tag::root()).unwrap().unwrap()
}

fn decode(data: &[u8]) -> (Mp4Box, mp4tree::Result<()>, Diagnostics) {
    let mut b = read(data);
    let mut diag = Diagnostics::new();
    let res = decode_box(&mut b, &mut diag, &ParseOptions::default(), 0);
    (b, res, diag)
}

fn emsg_of(b: &Mp4Box) -> &EmsgBox {
    match &b.kind {
        BoxKind::EventMessage(e) => e,
        other => panic!("not an emsg: {other:?}"),
    }
}

#[test]
fn emsg_v0_sizes() {
    let data = emsg_v0();
    let b = read(&data);
    assert_eq!(b.size as usize, data.len());
    assert_eq!(b.raw.len(), data.len() - 8);
    assert_eq!(b.box_type, FourCC::EMSG);
}

#[test]
fn emsg_v0_fields() {
    let (b, res, _) = decode(&emsg_v0());
    res.expect("decode");
    let e = emsg_of(&b);
    assert_eq!(e.version, 0);
    assert_eq!(e.scheme_id_uri, "uri");
    assert_eq!(e.value, "value");
    assert_eq!(e.timescale, 1);
    assert_eq!(e.presentation, EventTime::Delta(2));
    assert_eq!(e.event_duration, 3);
    assert_eq!(e.id, 4);
    assert_eq!(e.message_data, b"xyz");
}

#[test]
fn emsg_decode_encode_output_matches_input() {
    let data = emsg_v0();
    let (mut b, res, _) = decode(&data);
    res.expect("decode");
    b.encode().expect("encode");

    let mut out = Vec::new();
    let n = b.output(&mut out, 0).expect("output");
    assert_eq!(n, data.len());
    assert_eq!(out, data);

    let (again, res, _) = decode(&out);
    res.expect("re-decode");
    assert_eq!(emsg_of(&again), emsg_of(&b));
}

#[test]
fn emsg_edit_resizes_box() {
    let (mut b, _, _) = decode(&emsg_v0());
    if let BoxKind::EventMessage(e) = &mut b.kind {
        e.value = "longer-value".into();
        e.id = 99;
    }
    b.encode().unwrap();
    assert_eq!(b.effective_size(), 41 + 7);

    let out = b.to_bytes().unwrap();
    assert_eq!(out.len(), 48);
    let (again, res, _) = decode(&out);
    res.unwrap();
    assert_eq!(emsg_of(&again).value, "longer-value");
    assert_eq!(emsg_of(&again).id, 99);
}

#[test]
fn emsg_built_from_fields() {
    let e = EmsgBox {
        version: 0,
        flags: 0,
        scheme_id_uri: "uri".into(),
        value: "value".into(),
        timescale: 1,
        presentation: EventTime::Delta(2),
        event_duration: 3,
        id: 4,
        message_data: b"xyz".to_vec(),
    };
    let b = e.into_box().unwrap();
    assert_eq!(b.to_bytes().unwrap(), emsg_v0());
}

#[test]
fn emsg_v1_round_trip() {
    let e = EmsgBox {
        version: 1,
        flags: 0,
        scheme_id_uri: "urn:scte:scte35:2013:bin".into(),
        value: "1".into(),
        timescale: 90_000,
        presentation: EventTime::Absolute(1 << 40),
        event_duration: 0xffff_ffff,
        id: 12,
        message_data: vec![0xfc, 0x30, 0x11],
    };
    let bytes = e.clone().into_box().unwrap().to_bytes().unwrap();
    assert_eq!(bytes[8], 1, "version byte");
    // timescale follows the FullBox prefix directly in version 1
    assert_eq!(bytes[12..16], 90_000u32.to_be_bytes());

    let (b, res, _) = decode(&bytes);
    res.unwrap();
    assert_eq!(emsg_of(&b), &e);
}

#[test]
fn emsg_without_terminator() {
    let data = full(b"emsg", 0, 0, b"uri");
    let (b, res, diag) = decode(&data);
    assert!(matches!(
        res,
        Err(Error::UnterminatedString { field: "scheme_id_uri", offset: 4, .. })
    ));
    assert!(b.is_type_not_decoded());
    assert_eq!(diag.of_kind(WarningKind::DecodeFailed).count(), 1);
    assert_eq!(b.to_bytes().unwrap(), data);
}

#[test]
fn emsg_non_utf8_string_stays_raw() {
    let mut body = b"u\xffri\0value\0".to_vec();
    for v in [1u32, 2, 3, 4] {
        body.extend_from_slice(&v.to_be_bytes());
    }
    let data = full(b"emsg", 0, 0, &body);
    let (mut b, res, _) = decode(&data);
    assert!(matches!(
        res,
        Err(Error::InvalidString { field: "scheme_id_uri", offset: 4, .. })
    ));
    assert!(b.is_type_not_decoded());
    b.encode().unwrap();
    assert_eq!(b.to_bytes().unwrap(), data);
}

#[test]
fn emsg_keeps_higher_versions() {
    let mut body = 1000u32.to_be_bytes().to_vec();
    body.extend_from_slice(&5u64.to_be_bytes());
    body.extend_from_slice(&6u32.to_be_bytes());
    body.extend_from_slice(&7u32.to_be_bytes());
    body.extend_from_slice(b"s\0v\0body");
    let data = full(b"emsg", 2, 0, &body);

    let (mut b, res, _) = decode(&data);
    res.unwrap();
    assert_eq!(emsg_of(&b).version, 2);
    assert_eq!(emsg_of(&b).presentation, EventTime::Absolute(5));
    b.encode().unwrap();
    let out = b.to_bytes().unwrap();
    assert_eq!(out[8], 2);
    assert_eq!(out, data);
}

#[test]
fn emsg_version_must_match_time_form() {
    let e = EmsgBox {
        version: 0,
        flags: 0,
        scheme_id_uri: "uri".into(),
        value: String::new(),
        timescale: 1,
        presentation: EventTime::Absolute(9),
        event_duration: 0,
        id: 0,
        message_data: Vec::new(),
    };
    assert!(matches!(e.into_box(), Err(Error::EventTimeMismatch { version: 0 })));
}

#[test]
fn tfhd_truncated_optional_field() {
    let mut body = 1u32.to_be_bytes().to_vec();
    body.extend_from_slice(&[0, 0, 0, 9]);
    let data = full(b"tfhd", 0, 0x01, &body);
    let (b, res, _) = decode(&data);
    assert!(matches!(
        res,
        Err(Error::TruncatedPayload { field: "base_data_offset", offset: 8, needed: 8, available: 4, .. })
    ));
    assert_eq!(b.to_bytes().unwrap(), data);
}

#[test]
fn tfhd_truncated_default_fields() {
    let cases = [
        (TfhdBox::SAMPLE_DESCRIPTION_INDEX, "sample_description_index"),
        (TfhdBox::DEFAULT_SAMPLE_DURATION, "default_sample_duration"),
        (TfhdBox::DEFAULT_SAMPLE_SIZE, "default_sample_size"),
        (TfhdBox::DEFAULT_SAMPLE_FLAGS, "default_sample_flags"),
    ];
    for (mask, name) in cases {
        // track_id only, the flagged field is missing
        let data = full(b"tfhd", 0, mask, &7u32.to_be_bytes());
        let (b, res, _) = decode(&data);
        match res {
            Err(Error::TruncatedPayload { field, offset, needed, available, .. }) => {
                assert_eq!(field, name);
                assert_eq!((offset, needed, available), (8, 4, 0), "{name}");
            }
            other => panic!("{name}: unexpected {other:?}"),
        }
        assert!(b.is_type_not_decoded());
        assert_eq!(b.to_bytes().unwrap(), data);
    }

    // the last of several flagged fields is the one reported
    let mut body = 7u32.to_be_bytes().to_vec();
    body.extend_from_slice(&1u32.to_be_bytes());
    body.extend_from_slice(&512u32.to_be_bytes());
    let mask = TfhdBox::SAMPLE_DESCRIPTION_INDEX | TfhdBox::DEFAULT_SAMPLE_DURATION | TfhdBox::DEFAULT_SAMPLE_SIZE;
    let (_, res, _) = decode(&full(b"tfhd", 0, mask, &body));
    assert!(matches!(
        res,
        Err(Error::TruncatedPayload { field: "default_sample_size", offset: 16, .. })
    ));
}

#[test]
fn tfhd_flag_helpers() {
    let mut body = 3u32.to_be_bytes().to_vec();
    body.extend_from_slice(&77u32.to_be_bytes());
    let (b, res, _) = decode(&full(b"tfhd", 0, 0x01_0010, &body));
    res.unwrap();
    match &b.kind {
        BoxKind::TrackFragmentHeader(t) => {
            assert!(t.duration_is_empty());
            assert!(!t.default_base_is_moof());
            assert_eq!(t.default_sample_size, Some(77));
            assert_eq!(t.default_sample_duration, None);
        }
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn trun_truncated_sample_table() {
    let mut body = 3u32.to_be_bytes().to_vec(); // claims 3 samples
    body.extend_from_slice(&0i32.to_be_bytes());
    for _ in 0..2 {
        body.extend_from_slice(&512u32.to_be_bytes());
        body.extend_from_slice(&1000u32.to_be_bytes());
    }
    let data = full(b"trun", 0, 0x00_0301, &body);
    let (b, res, diag) = decode(&data);
    assert!(matches!(
        res,
        Err(Error::TruncatedPayload { field: "sample_duration", needed: 4, available: 0, .. })
    ));
    assert!(b.is_type_not_decoded());
    assert_eq!(diag.first_failure().unwrap().kind, WarningKind::DecodeFailed);
    assert_eq!(b.to_bytes().unwrap(), data);
}

#[test]
fn trun_first_sample_flags_replace_column() {
    let mut body = 2u32.to_be_bytes().to_vec();
    body.extend_from_slice(&0x0200_0000u32.to_be_bytes());
    let (b, res, _) = decode(&full(b"trun", 0, 0x00_0404, &body));
    res.unwrap();
    let BoxKind::TrackRun(t) = &b.kind else { panic!("not a trun") };
    assert_eq!(t.first_sample_flags, Some(0x0200_0000));
    assert!(t.samples.is_empty());
    let samples: Vec<_> = t.iter_samples().collect();
    assert_eq!(samples.len(), 2);
    assert_eq!(samples[0].flags, 0x0200_0000);
    assert_eq!(samples[1].flags, 0);
}

#[test]
fn trun_count_without_columns_stores_nothing() {
    let data = full(b"trun", 0, 0, &u32::MAX.to_be_bytes());
    assert_eq!(data.len(), 16);
    let (b, res, _) = decode(&data);
    res.unwrap();
    let BoxKind::TrackRun(t) = &b.kind else { panic!("not a trun") };
    assert_eq!(t.sample_count, u32::MAX);
    assert!(t.samples.is_empty());
    assert_eq!(t.total_duration(), 0);
    assert_eq!(t.sample(u32::MAX - 1), Some(Default::default()));
    assert_eq!(t.sample(u32::MAX), None);
    assert_eq!(t.iter_samples().take(3).count(), 3);
    assert_eq!(b.to_bytes().unwrap(), data);
}

#[test]
fn trun_table_sample_lookup() {
    let mut body = 2u32.to_be_bytes().to_vec();
    body.extend_from_slice(&0x0200_0000u32.to_be_bytes()); // first_sample_flags
    body.extend_from_slice(&400u32.to_be_bytes());
    body.extend_from_slice(&300u32.to_be_bytes());
    let (b, res, _) = decode(&full(b"trun", 0, 0x00_0204, &body));
    res.unwrap();
    let BoxKind::TrackRun(t) = &b.kind else { panic!("not a trun") };
    assert_eq!(t.samples.len(), 2);
    assert_eq!(t.sample(0).unwrap().flags, 0x0200_0000);
    assert_eq!(t.sample(1).unwrap().size, 300);
    assert_eq!(t.sample(2), None);
}

#[test]
fn trun_composition_offset_sign_depends_on_version() {
    let mut body = 1u32.to_be_bytes().to_vec();
    body.extend_from_slice(&(-512i32).to_be_bytes());

    let (v1, res, _) = decode(&full(b"trun", 1, 0x00_0800, &body));
    res.unwrap();
    let BoxKind::TrackRun(t) = &v1.kind else { panic!("not a trun") };
    assert_eq!(t.samples[0].composition_time_offset, -512);

    let (v0, res, _) = decode(&full(b"trun", 0, 0x00_0800, &body));
    res.unwrap();
    let BoxKind::TrackRun(t) = &v0.kind else { panic!("not a trun") };
    assert_eq!(t.samples[0].composition_time_offset, 0xffff_fe00);
}

#[test]
fn tfdt_versions() {
    let (b, res, _) = decode(&full(b"tfdt", 0, 0, &1234u32.to_be_bytes()));
    res.unwrap();
    assert!(matches!(&b.kind, BoxKind::TrackFragmentDecodeTime(t) if t.base_media_decode_time == 1234));

    let (b, res, _) = decode(&full(b"tfdt", 1, 0, &(1u64 << 33).to_be_bytes()));
    res.unwrap();
    assert!(matches!(&b.kind, BoxKind::TrackFragmentDecodeTime(t) if t.base_media_decode_time == 1 << 33));
}

#[test]
fn sidx_references() {
    let mut body = Vec::new();
    body.extend_from_slice(&1u32.to_be_bytes()); // reference_id
    body.extend_from_slice(&90_000u32.to_be_bytes());
    body.extend_from_slice(&0u32.to_be_bytes()); // ept
    body.extend_from_slice(&16u32.to_be_bytes()); // first_offset
    body.extend_from_slice(&0u16.to_be_bytes());
    body.extend_from_slice(&2u16.to_be_bytes());
    for size in [4000u32, 5000] {
        body.extend_from_slice(&size.to_be_bytes());
        body.extend_from_slice(&180_000u32.to_be_bytes());
        body.extend_from_slice(&0x9000_0000u32.to_be_bytes());
    }
    let data = full(b"sidx", 0, 0, &body);
    let mut file_bytes = data.clone();
    file_bytes.extend_from_slice(&moof(1));

    let mut diag = Diagnostics::new();
    let file = Mp4File::from_bytes(&file_bytes, &mut diag).unwrap();
    let sidx = file.sidx().expect("sidx");
    assert_eq!(sidx.timescale, 90_000);
    assert_eq!(sidx.first_offset, 16);
    assert_eq!(sidx.references.len(), 2);
    assert_eq!(sidx.references[1].referenced_size(), 5000);
    assert!(!sidx.references[0].reference_type());
    assert!(sidx.references[0].starts_with_sap());
    assert_eq!(sidx.references[0].sap_type(), 1);
    assert_eq!(file.to_bytes().unwrap(), file_bytes);
}

#[test]
fn insert_emsg_before_first_moof() {
    let data = concat(&[ftyp(), moov(), moof(1), mdat(), moof(2), mdat()]);
    let mut diag = Diagnostics::new();
    let mut file = Mp4File::from_bytes(&data, &mut diag).unwrap();
    assert_eq!(file.moof_index(), Some(2));

    let emsg = read(&emsg_v0());
    let at = file.insert_emsg(emsg).expect("insert");
    assert_eq!(at, 2);
    assert_eq!(file.emsg_index(), Some(2));
    assert_eq!(file.moof_index(), Some(3));

    let out = file.to_bytes().unwrap();
    assert_eq!(out.len(), data.len() + 41);
    let split = ftyp().len() + moov().len();
    assert_eq!(out[split..split + 41], emsg_v0()[..]);

    let again = Mp4File::from_bytes(&out, &mut Diagnostics::new()).unwrap();
    assert_eq!(again.emsg().unwrap().scheme_id_uri, "uri");
    let mut written = Vec::new();
    again.output(&mut written, UNBOUNDED).unwrap();
    assert_eq!(written, out);
}

#[test]
fn insert_emsg_without_moof() {
    let data = concat(&[ftyp(), moov()]);
    let mut file = Mp4File::from_bytes(&data, &mut Diagnostics::new()).unwrap();
    let err = file.insert_emsg(read(&emsg_v0())).unwrap_err();
    assert!(matches!(err, Error::NotFound(cc) if cc == FourCC::MOOF));
    assert_eq!(file.len(), 2);
}
