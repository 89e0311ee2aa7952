use anyhow::Context;
use clap::{ArgAction, Parser};
use mp4tree::{
    Diagnostics, FourCC, Mp4Box, Mp4File, ParseOptions,
    json_api::box_to_json,
    util::hex_dump,
};
use std::fs::File;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(version, about = "MP4/ISOBMFF box tree explorer")]
struct Args {
    /// MP4/ISOBMFF file or segment path
    path: String,

    /// Only print subtree(s) matching a dotted path (e.g. moov.trak[0].mdia)
    #[arg(long = "filter")]
    filter: Option<String>,

    /// Dump raw payload of every box with this 4CC (e.g. --raw emsg)
    #[arg(long = "raw")]
    raw: Option<String>,

    /// Bytes to show when dumping raw (0 means entire payload)
    #[arg(long, default_value_t = 0)]
    bytes: usize,

    /// Limit container recursion depth
    #[arg(long, default_value_t = 32)]
    max_depth: usize,

    /// Fail on the first box that does not decode
    #[arg(long, action = ArgAction::SetTrue)]
    strict: bool,

    /// Emit JSON instead of human-readable tree
    #[arg(long, action = ArgAction::SetTrue)]
    json: bool,

    /// More logging (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_tracing(args.verbose);

    let f = File::open(&args.path).with_context(|| format!("opening {}", args.path))?;
    let opts = ParseOptions::default()
        .with_max_depth(args.max_depth)
        .strict(args.strict);
    let mut diag = Diagnostics::new();
    let file = Mp4File::parse_with(f, &mut diag, &opts)
        .with_context(|| format!("parsing {}", args.path))?;

    // Target roots for printing/JSON, paired with their stream offsets
    let targets: Vec<(u64, &Mp4Box)> = match &args.filter {
        Some(path) => select_by_path(&file, path),
        None => top_level_offsets(&file),
    };

    // JSON mode: output JSON and exit (no tree or raw to keep output clean)
    if args.json {
        let json_boxes: Vec<_> = targets
            .iter()
            .map(|(off, b)| box_to_json(b, *off, args.max_depth))
            .collect();
        println!("{}", serde_json::to_string_pretty(&json_boxes)?);
        return Ok(());
    }

    for (_, b) in &targets {
        print_box(b, args.max_depth);
    }

    if let Some(w) = diag.first_failure() {
        eprintln!("partial decode: {w} ({} warning(s) total)", diag.warnings().len());
    }

    if let Some(sel) = args.raw.as_ref() {
        let fourcc: FourCC = sel.parse().map_err(anyhow::Error::msg)?;
        dump_raw(&file, fourcc, args.bytes);
    }

    Ok(())
}

// ---------- Human-readable tree ----------

fn print_box(b: &Mp4Box, depth: usize) {
    let children = if b.children.is_empty() {
        "   ".to_string()
    } else {
        format!("{:2} ", b.children.len())
    };
    let star = if b.is_type_not_decoded() { "*" } else { " " };
    let version = match b.full_box {
        Some(ext) => format!(" v{} flags={:#08x}", ext.version, ext.flags_u32()),
        None => String::new(),
    };
    println!(
        "{:<16} {}{}{} {} {:>7}{} {}",
        b.tag.to_string(),
        b.tag.indent(),
        children,
        b.box_type,
        star,
        b.effective_size(),
        version,
        b.kind
    );
    if depth > 0 {
        for c in &b.children {
            print_box(c, depth - 1);
        }
    }
}

// ---------- Raw dump ----------

fn dump_raw(file: &Mp4File, fourcc: FourCC, limit: usize) {
    let mut matches = Vec::new();
    for (off, b) in top_level_offsets(file) {
        select_boxes(b, off, fourcc, &mut matches);
    }
    for (i, (off, b)) in matches.into_iter().enumerate() {
        let payload_off = off + b.size_header() as u64;
        let data = if limit == 0 || limit > b.raw.len() { &b.raw[..] } else { &b.raw[..limit] };
        println!(
            "\n== Dump {} ({} at {}) payload: offset={:#x}, len={} ==",
            i,
            b.box_type,
            b.tag,
            payload_off,
            data.len()
        );
        print!("{}", hex_dump(data, payload_off));
    }
}

fn select_boxes<'a>(b: &'a Mp4Box, offset: u64, fourcc: FourCC, out: &mut Vec<(u64, &'a Mp4Box)>) {
    if b.box_type == fourcc {
        out.push((offset, b));
    }
    let mut at = offset + b.size_header() as u64;
    for c in &b.children {
        select_boxes(c, at, fourcc, out);
        at += c.effective_size();
    }
}

fn top_level_offsets(file: &Mp4File) -> Vec<(u64, &Mp4Box)> {
    let mut off = 0;
    file.boxes()
        .iter()
        .map(|b| {
            let here = off;
            off += b.effective_size();
            (here, b)
        })
        .collect()
}

// ---------- Filter path: moov.trak[0].mdia.minf ----------

fn select_by_path<'a>(file: &'a Mp4File, path: &str) -> Vec<(u64, &'a Mp4Box)> {
    let mut current = top_level_offsets(file);

    for (depth, seg) in path.split('.').enumerate() {
        let (name, idx) = parse_segment(seg);
        let fourcc = name.parse::<FourCC>().unwrap_or(FourCC(*b"????"));
        let candidates: Vec<(u64, &Mp4Box)> = if depth == 0 {
            current
        } else {
            current
                .iter()
                .flat_map(|&(off, b)| {
                    let mut at = off + b.size_header() as u64;
                    b.children.iter().map(move |c| {
                        let here = at;
                        at += c.effective_size();
                        (here, c)
                    })
                })
                .collect()
        };
        let matches: Vec<_> = candidates.into_iter().filter(|(_, b)| b.box_type == fourcc).collect();
        current = match idx {
            Some(i) => matches.into_iter().nth(i).into_iter().collect(),
            None => matches,
        };
        if current.is_empty() {
            break;
        }
    }

    current
}

fn parse_segment(seg: &str) -> (&str, Option<usize>) {
    if let Some(l) = seg.find('[') {
        let name = &seg[..l];
        if let Some(r) = seg[l + 1..].find(']') {
            let idx = seg[l + 1..l + 1 + r].parse::<usize>().ok();
            return (name, idx);
        }
        (name, None)
    } else {
        (seg, None)
    }
}
