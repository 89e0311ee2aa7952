use crate::boxes::FourCC;

/// Box types the dispatcher has an opinion about.
///
/// Anything not in this list becomes `KnownBox::Unknown(fourcc)` and is kept
/// as opaque bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KnownBox {
    // File-level / top-level
    Ftyp,
    Styp,
    Moov,
    Moof,
    Mdat,
    Free,
    Skip,
    Meta,
    Sidx,
    Emsg,

    // moov / trak
    Mvhd,
    Iods,
    Trak,
    Tkhd,
    Tref,
    Edts,
    Mvex,
    Udta,
    Cprt,

    // mdia
    Mdia,
    Mdhd,
    Hdlr,
    Minf,

    // minf
    Vmhd,
    Smhd,
    Hmhd,
    Nmhd,
    Dinf,
    Stbl,

    // moof / traf
    Mfhd,
    Traf,
    Tfhd,
    Tfdt,
    Trun,

    Uuid,
    Unknown(FourCC),
}

impl From<FourCC> for KnownBox {
    fn from(cc: FourCC) -> Self {
        match &cc.0 {
            b"ftyp" => KnownBox::Ftyp,
            b"styp" => KnownBox::Styp,
            b"moov" => KnownBox::Moov,
            b"moof" => KnownBox::Moof,
            b"mdat" => KnownBox::Mdat,
            b"free" => KnownBox::Free,
            b"skip" => KnownBox::Skip,
            b"meta" => KnownBox::Meta,
            b"sidx" => KnownBox::Sidx,
            b"emsg" => KnownBox::Emsg,

            b"mvhd" => KnownBox::Mvhd,
            b"iods" => KnownBox::Iods,
            b"trak" => KnownBox::Trak,
            b"tkhd" => KnownBox::Tkhd,
            b"tref" => KnownBox::Tref,
            b"edts" => KnownBox::Edts,
            b"mvex" => KnownBox::Mvex,
            b"udta" => KnownBox::Udta,
            b"cprt" => KnownBox::Cprt,

            b"mdia" => KnownBox::Mdia,
            b"mdhd" => KnownBox::Mdhd,
            b"hdlr" => KnownBox::Hdlr,
            b"minf" => KnownBox::Minf,

            b"vmhd" => KnownBox::Vmhd,
            b"smhd" => KnownBox::Smhd,
            b"hmhd" => KnownBox::Hmhd,
            b"nmhd" => KnownBox::Nmhd,
            b"dinf" => KnownBox::Dinf,
            b"stbl" => KnownBox::Stbl,

            b"mfhd" => KnownBox::Mfhd,
            b"traf" => KnownBox::Traf,
            b"tfhd" => KnownBox::Tfhd,
            b"tfdt" => KnownBox::Tfdt,
            b"trun" => KnownBox::Trun,

            b"uuid" => KnownBox::Uuid,

            _ => KnownBox::Unknown(cc),
        }
    }
}

impl KnownBox {
    /// Payload is re-scanned as a sequence of child boxes.
    pub fn is_container(&self) -> bool {
        matches!(
            self,
            KnownBox::Moov
                | KnownBox::Trak
                | KnownBox::Mdia
                | KnownBox::Minf
                | KnownBox::Udta
                | KnownBox::Moof
                | KnownBox::Traf
                | KnownBox::Tref
        )
    }

    /// Recognized, but the payload is carried through without decoding.
    pub fn is_data(&self) -> bool {
        matches!(
            self,
            KnownBox::Mdat
                | KnownBox::Free
                | KnownBox::Skip
                | KnownBox::Meta
                | KnownBox::Iods
                | KnownBox::Edts
                | KnownBox::Mvex
                | KnownBox::Dinf
                | KnownBox::Stbl
        )
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, KnownBox::Unknown(_) | KnownBox::Uuid)
    }

    pub fn full_name(&self) -> &'static str {
        match self {
            KnownBox::Ftyp => "File Type Box",
            KnownBox::Styp => "Segment Type Box",
            KnownBox::Moov => "Movie Box",
            KnownBox::Moof => "Movie Fragment Box",
            KnownBox::Mdat => "Media Data Box",
            KnownBox::Free => "Free Space Box",
            KnownBox::Skip => "Free Space Box",
            KnownBox::Meta => "Meta Box",
            KnownBox::Sidx => "Segment Index Box",
            KnownBox::Emsg => "Event Message Box",
            KnownBox::Mvhd => "Movie Header Box",
            KnownBox::Iods => "Object Descriptor Box",
            KnownBox::Trak => "Track Box",
            KnownBox::Tkhd => "Track Header Box",
            KnownBox::Tref => "Track Reference Box",
            KnownBox::Edts => "Edit Box",
            KnownBox::Mvex => "Movie Extends Box",
            KnownBox::Udta => "User Data Box",
            KnownBox::Cprt => "Copyright Box",
            KnownBox::Mdia => "Media Box",
            KnownBox::Mdhd => "Media Header Box",
            KnownBox::Hdlr => "Handler Reference Box",
            KnownBox::Minf => "Media Information Box",
            KnownBox::Vmhd => "Video Media Header Box",
            KnownBox::Smhd => "Sound Media Header Box",
            KnownBox::Hmhd => "Hint Media Header Box",
            KnownBox::Nmhd => "Null Media Header Box",
            KnownBox::Dinf => "Data Information Box",
            KnownBox::Stbl => "Sample Table Box",
            KnownBox::Mfhd => "Movie Fragment Header Box",
            KnownBox::Traf => "Track Fragment Box",
            KnownBox::Tfhd => "Track Fragment Header Box",
            KnownBox::Tfdt => "Track Fragment Decode Time Box",
            KnownBox::Trun => "Track Run Box",
            KnownBox::Uuid => "User Extension Box",
            KnownBox::Unknown(_) => "",
        }
    }
}
