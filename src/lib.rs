pub mod boxes;
pub mod decoders;
pub mod diag;
pub mod dispatch;
pub mod file;
pub mod fixed;
pub mod fragment;
pub mod json_api;
pub mod known_boxes;
pub mod parser;
pub mod tag;
pub mod util;
pub mod writer;

pub use boxes::{BoxKind, FourCC, FullBoxExt, Mp4Box};
pub use diag::{Diagnostics, Warning, WarningKind};
pub use dispatch::{ParseOptions, decode_box};
pub use file::Mp4File;
pub use fixed::{Fixed8_8, Fixed16_16, UFixed8_8, UFixed16_16};
pub use fragment::{EmsgBox, EventTime};
pub use json_api::{JsonBox, analyze_file, to_json_tree};
pub use parser::{BoxReader, Error, Result, read_box, read_boxes};
pub use tag::Tag;
pub use writer::UNBOUNDED;
