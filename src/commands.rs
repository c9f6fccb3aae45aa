use std::{
    collections::BTreeMap,
    fs,
    io::{stdout, Write},
    path::Path,
};

use anyhow::{bail, Context};
use zinflate::{gzip, huffman::HuffmanTree, inflate_with_policy, png, zlib, SafetyPolicy};

fn read(file: &Path) -> anyhow::Result<Vec<u8>> {
    fs::read(file).context(format!("reading from {}", file.display()))
}

fn write_out(bytes: &[u8]) -> anyhow::Result<()> {
    let mut stdout = stdout();
    stdout.write_all(bytes).context("writing to stdout")?;
    stdout.flush().context("flushing stdout")
}

pub fn inflate(file: &Path, policy: SafetyPolicy) -> anyhow::Result<()> {
    let bytes = read(file)?;
    let inflated =
        inflate_with_policy(&bytes, policy).context(format!("inflating {}", file.display()))?;
    if inflated.consumed() < bytes.len() {
        tracing::warn!(
            trailing = bytes.len() - inflated.consumed(),
            "ignoring bytes after the final block"
        );
    }
    write_out(inflated.data())
}

pub fn zlib_metadata(file: &Path, policy: SafetyPolicy) -> anyhow::Result<()> {
    let bytes = read(file)?;
    let mut stream = zlib::Stream::try_from(bytes.as_slice())
        .context("decoding read bytes")?
        .with_policy(policy);
    stream.inflate().context("inflating zlib stream")?;
    print!("{stream}");
    Ok(())
}

pub fn zlib_inflate(file: &Path, policy: SafetyPolicy) -> anyhow::Result<()> {
    let bytes = read(file)?;
    let mut stream = zlib::Stream::try_from(bytes.as_slice())
        .context("decoding read bytes")?
        .with_policy(policy);
    write_out(stream.inflate().context("inflating zlib stream")?)
}

pub fn gzip_metadata(file: &Path, policy: SafetyPolicy) -> anyhow::Result<()> {
    let bytes = read(file)?;
    let mut member = gzip::Member::try_from(bytes.as_slice())
        .context("decoding read bytes")?
        .with_policy(policy);
    member.inflate().context("inflating gzip member")?;
    print!("{member}");
    Ok(())
}

pub fn gzip_inflate(file: &Path, policy: SafetyPolicy) -> anyhow::Result<()> {
    let bytes = read(file)?;
    write_out(&gzip::decompress(&bytes, policy).context(format!("gunzipping {}", file.display()))?)
}

pub fn png_idat(file: &Path, policy: SafetyPolicy) -> anyhow::Result<()> {
    let bytes = read(file)?;
    write_out(
        &png::decompress_image_data(&bytes, policy)
            .context(format!("extracting image data from {}", file.display()))?,
    )
}

/// Prints canonical codes for a list of code lengths, or the codes a
/// frequency-built tree gives the bytes of a file.
pub fn huffman_codes(lengths: &[u8], file: Option<&Path>) -> anyhow::Result<()> {
    let tree = match (lengths, file) {
        ([], Some(file)) => {
            let mut frequencies: BTreeMap<u16, u64> = BTreeMap::new();
            for byte in read(file)? {
                *frequencies.entry(u16::from(byte)).or_default() += 1;
            }
            HuffmanTree::from_frequencies(frequencies)
                .context(format!("building a tree from the bytes of {}", file.display()))?
        }
        ([], None) => bail!("either code lengths or a file is required"),
        (lengths, _) => {
            HuffmanTree::from_lengths(lengths).context("building a tree from code lengths")?
        }
    };
    let mut stdout = stdout();
    for (symbol, code) in tree.codes() {
        writeln!(stdout, "{symbol:>5} {:>2} {code}", code.len())?;
    }
    stdout.flush().context("flushing stdout")
}
