#![allow(dead_code)]

/// Plain box: size + type + payload.
pub fn bx(typ: &[u8; 4], payload: &[u8]) -> Vec<u8> {
    let mut v = ((8 + payload.len()) as u32).to_be_bytes().to_vec();
    v.extend_from_slice(typ);
    v.extend_from_slice(payload);
    v
}

/// FullBox: version + 24-bit flags in front of `body`.
pub fn full(typ: &[u8; 4], version: u8, flags: u32, body: &[u8]) -> Vec<u8> {
    let mut p = vec![version];
    p.extend_from_slice(&flags.to_be_bytes()[1..]);
    p.extend_from_slice(body);
    bx(typ, &p)
}

pub fn concat(parts: &[Vec<u8>]) -> Vec<u8> {
    parts.concat()
}

fn push_u32(v: &mut Vec<u8>, x: u32) {
    v.extend_from_slice(&x.to_be_bytes());
}

const IDENTITY: [i32; 9] = [0x1_0000, 0, 0, 0, 0x1_0000, 0, 0, 0, 0x4000_0000];

pub fn ftyp() -> Vec<u8> {
    let mut p = b"iso6".to_vec();
    push_u32(&mut p, 512);
    p.extend_from_slice(b"iso6dash");
    bx(b"ftyp", &p)
}

pub fn mvhd() -> Vec<u8> {
    let mut b = Vec::new();
    push_u32(&mut b, 1); // creation
    push_u32(&mut b, 2); // modification
    push_u32(&mut b, 1000); // timescale
    push_u32(&mut b, 5000); // duration
    push_u32(&mut b, 0x0001_0000); // rate 1.0
    b.extend_from_slice(&0x0100u16.to_be_bytes()); // volume 1.0
    b.extend_from_slice(&[0; 10]);
    for m in IDENTITY {
        b.extend_from_slice(&m.to_be_bytes());
    }
    b.extend_from_slice(&[0; 24]);
    push_u32(&mut b, 3); // next_track_id
    full(b"mvhd", 0, 0, &b)
}

pub fn tkhd(track_id: u32) -> Vec<u8> {
    let mut b = Vec::new();
    push_u32(&mut b, 1);
    push_u32(&mut b, 2);
    push_u32(&mut b, track_id);
    push_u32(&mut b, 0); // reserved
    push_u32(&mut b, 5000); // duration
    b.extend_from_slice(&[0; 8]);
    b.extend_from_slice(&0i16.to_be_bytes()); // layer
    b.extend_from_slice(&0i16.to_be_bytes()); // alternate group
    b.extend_from_slice(&0u16.to_be_bytes()); // volume
    b.extend_from_slice(&[0; 2]);
    for m in IDENTITY {
        b.extend_from_slice(&m.to_be_bytes());
    }
    push_u32(&mut b, 320 << 16); // width
    push_u32(&mut b, 180 << 16); // height
    full(b"tkhd", 0, 0x000003, &b)
}

pub fn mdhd() -> Vec<u8> {
    let mut b = Vec::new();
    push_u32(&mut b, 1);
    push_u32(&mut b, 2);
    push_u32(&mut b, 90_000);
    push_u32(&mut b, 450_000);
    // 'und'
    b.extend_from_slice(&(((21u16) << 10) | (14 << 5) | 4).to_be_bytes());
    b.extend_from_slice(&[0; 2]);
    full(b"mdhd", 0, 0, &b)
}

pub fn hdlr() -> Vec<u8> {
    let mut b = vec![0; 4];
    b.extend_from_slice(b"vide");
    b.extend_from_slice(&[0; 12]);
    b.extend_from_slice(b"VideoHandler\0");
    full(b"hdlr", 0, 0, &b)
}

pub fn minf() -> Vec<u8> {
    let vmhd = full(b"vmhd", 0, 1, &[0; 8]);
    let dinf = bx(b"dinf", &full(b"dref", 0, 0, &[0, 0, 0, 0]));
    bx(b"minf", &concat(&[vmhd, dinf]))
}

pub fn trak() -> Vec<u8> {
    let tref = bx(b"tref", &bx(b"hint", &2u32.to_be_bytes()));
    let mdia = bx(b"mdia", &concat(&[mdhd(), hdlr(), minf()]));
    let unknown = bx(b"zzzz", b"opaque!");
    bx(b"trak", &concat(&[tkhd(1), tref, mdia, unknown]))
}

pub fn moov() -> Vec<u8> {
    let mut notice = ((21u16 << 10) | (14 << 5) | 4).to_be_bytes().to_vec();
    notice.extend_from_slice(b"(c) nobody\0");
    let udta = bx(b"udta", &full(b"cprt", 0, 0, &notice));
    bx(b"moov", &concat(&[mvhd(), trak(), udta]))
}

pub fn moof(sequence: u32) -> Vec<u8> {
    let mfhd = full(b"mfhd", 0, 0, &sequence.to_be_bytes());

    // default-base-is-moof + default sample duration
    let mut tfhd_body = Vec::new();
    push_u32(&mut tfhd_body, 1);
    push_u32(&mut tfhd_body, 512);
    let tfhd = full(b"tfhd", 0, 0x02_0008, &tfhd_body);

    let tfdt = full(b"tfdt", 1, 0, &90_000u64.to_be_bytes());

    // data offset + per-sample duration and size, 2 samples
    let mut trun_body = Vec::new();
    push_u32(&mut trun_body, 2);
    trun_body.extend_from_slice(&100i32.to_be_bytes());
    for (d, s) in [(512u32, 1000u32), (512, 800)] {
        push_u32(&mut trun_body, d);
        push_u32(&mut trun_body, s);
    }
    let trun = full(b"trun", 0, 0x00_0301, &trun_body);

    let traf = bx(b"traf", &concat(&[tfhd, tfdt, trun]));
    bx(b"moof", &concat(&[mfhd, traf]))
}

pub fn mdat() -> Vec<u8> {
    bx(b"mdat", &[1, 2, 3, 4, 5, 6, 7, 8])
}

/// ftyp, moov, moof, mdat
pub fn movie() -> Vec<u8> {
    concat(&[ftyp(), moov(), moof(7), mdat()])
}

/// The 41-byte version 0 `emsg`.
pub fn emsg_v0() -> Vec<u8> {
    vec![
        0, 0, 0, 41, b'e', b'm', b's', b'g', 0, 0, 0, 0, b'u', b'r', b'i', 0, b'v', b'a', b'l',
        b'u', b'e', 0, 0, 0, 0, 1, 0, 0, 0, 2, 0, 0, 0, 3, 0, 0, 0, 4, b'x', b'y', b'z',
    ]
}
