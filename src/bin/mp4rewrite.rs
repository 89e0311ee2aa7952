use anyhow::{Context, bail};
use clap::{ArgAction, Parser};
use mp4tree::{Diagnostics, EmsgBox, EventTime, Mp4File, ParseOptions};
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(version, about = "Parse an MP4/CMAF segment and write its box tree back out")]
struct Args {
    /// Input file
    input: String,

    /// Output file
    output: String,

    /// Re-encode depth (default: unbounded)
    #[arg(long)]
    depth: Option<usize>,

    /// Insert an emsg with this scheme_id_uri before the first moof
    #[arg(long)]
    emsg_scheme: Option<String>,

    #[arg(long, default_value = "")]
    emsg_value: String,

    #[arg(long, default_value_t = 0)]
    emsg_id: u32,

    #[arg(long, default_value_t = 1000)]
    emsg_timescale: u32,

    #[arg(long, default_value_t = 0)]
    emsg_delta: u32,

    #[arg(long, default_value_t = 0)]
    emsg_duration: u32,

    /// Message body (UTF-8)
    #[arg(long, default_value = "")]
    emsg_data: String,

    /// Fail on the first box that does not decode
    #[arg(long, action = ArgAction::SetTrue)]
    strict: bool,

    /// Check that the output matches the input byte for byte (no edits only)
    #[arg(long, action = ArgAction::SetTrue)]
    verify: bool,

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

    let input = fs::read(&args.input).with_context(|| format!("reading {}", args.input))?;
    let opts = ParseOptions::default().strict(args.strict);
    let mut diag = Diagnostics::new();
    let mut file = Mp4File::parse_with(input.as_slice(), &mut diag, &opts)
        .with_context(|| format!("parsing {}", args.input))?;
    if let Some(w) = diag.first_failure() {
        tracing::warn!(warning = %w, "input decoded partially; affected boxes are copied verbatim");
    }

    let mut edited = false;
    if let Some(scheme) = args.emsg_scheme.clone() {
        let emsg = EmsgBox {
            version: 0,
            flags: 0,
            scheme_id_uri: scheme,
            value: args.emsg_value.clone(),
            timescale: args.emsg_timescale,
            presentation: EventTime::Delta(args.emsg_delta),
            event_duration: args.emsg_duration,
            id: args.emsg_id,
            message_data: args.emsg_data.clone().into_bytes(),
        };
        let at = file
            .insert_emsg(emsg.into_box()?)
            .context("inserting emsg")?;
        tracing::info!(index = at, "inserted emsg");
        edited = true;
    }

    let depth = args.depth.unwrap_or(mp4tree::UNBOUNDED);
    let out = File::create(&args.output).with_context(|| format!("creating {}", args.output))?;
    let mut w = BufWriter::new(out);
    let written = file.output(&mut w, depth)?;
    w.flush()?;
    tracing::debug!(bytes = written, path = %args.output, "wrote output");

    if args.verify {
        if edited {
            bail!("--verify only applies to unmodified rewrites");
        }
        let rewritten = fs::read(&args.output)?;
        if let Some(pos) = input.iter().zip(&rewritten).position(|(a, b)| a != b) {
            bail!("output differs from input at byte {pos:#x}");
        }
        if input.len() != rewritten.len() {
            bail!("output length {} differs from input length {}", rewritten.len(), input.len());
        }
        println!("verified: {} bytes identical", input.len());
    }

    Ok(())
}
