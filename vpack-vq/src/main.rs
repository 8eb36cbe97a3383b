mod parser;

use anyhow::{bail, Context, Result};
use std::io::{self, Read, Write};
use std::str::from_utf8;
use structopt::StructOpt;
use tracing::debug;
use tracing_subscriber::EnvFilter;
use vpack::{Encoder, Options, Slice};

/// Decode and print VelocyPack buffers, or encode the text notation into one
#[derive(StructOpt)]
#[structopt(name = "vq", author = "Liv Fischer")]
struct Opt {
    /// parse a textual representation and encode it into a binary VelocyPack buffer instead
    #[structopt(short, long)]
    encode: bool,
    /// read and write hex digits instead of raw bytes
    #[structopt(short = "x", long)]
    hex: bool,
    /// only print the value at this dot separated path, e.g. `users.0.name`
    #[structopt(short, long)]
    path: Option<String>,
    /// print everything on a single line
    #[structopt(short, long)]
    compact: bool,
    /// encode arrays without index tables
    #[structopt(long)]
    compact_arrays: bool,
    /// objects with at least this many members get a sorted index table
    #[structopt(long, default_value = "5")]
    index_threshold: usize,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(io::stderr)
        .init();
    let opt = Opt::from_args();
    let mut buffer = Vec::new();
    io::stdin().read_to_end(&mut buffer).context("Failed to read stdin")?;
    if opt.encode {
        encode(&opt, &buffer)
    } else {
        print(&opt, &buffer)
    }
}

/// Follows `path` one segment at a time. Numeric segments index into arrays, everything else is
/// an object key.
fn lookup<'a>(slice: Slice<'a>, path: &str) -> Result<Slice<'a>> {
    let mut current = slice;
    for segment in path.split('.').filter(|s| !s.is_empty()) {
        current = match segment.parse::<usize>() {
            Ok(index) if current.is_array() => current.at(index),
            _ => current.get(segment),
        }.with_context(|| format!("Failed to look up `{}` in `{}`", segment, path))?;
        if current.is_null() {
            break;
        }
    }
    Ok(current)
}

fn print(opt: &Opt, input: &[u8]) -> Result<()> {
    let bytes = if opt.hex {
        let digits: String = from_utf8(input).context("input is not utf-8")?.split_whitespace().collect();
        hex::decode(digits).context("input is not valid hex")?
    } else {
        input.to_vec()
    };
    let slice = Slice::new(&bytes);
    let size = slice.byte_size().context("Decoding error")?;
    if size != bytes.len() {
        bail!("Decoding error: {} trailing bytes after the value", bytes.len() - size);
    }
    let slice = match &opt.path {
        Some(path) => lookup(slice, path)?,
        None => slice,
    };
    debug!(offset = slice.offset(), variant = %slice.type_of(), "printing");
    let value = slice.to_value().context("Decoding error")?;
    if opt.compact {
        println!("{}", value);
    } else {
        println!("{:#}", value);
    }
    Ok(())
}

fn encode(opt: &Opt, input: &[u8]) -> Result<()> {
    let string = from_utf8(input).context("input is not utf-8")?;
    let value = parser::parse(string)?;
    let options = Options { object_index_threshold: opt.index_threshold, compact_arrays: opt.compact_arrays };
    let buffer = Encoder::with_options(options).encode(&value);
    debug!(bytes = buffer.len(), "encoded");
    let mut stdout = io::stdout();
    if opt.hex {
        writeln!(stdout, "{}", hex::encode(buffer.as_bytes()))?;
    } else {
        stdout.write_all(buffer.as_bytes())?;
    }
    stdout.flush().context("Failed to write stdout")
}
