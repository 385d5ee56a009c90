//! Raw memory access command handlers
//!
//! Handlers for reading bytes, walking pointer chains and decoding
//! collections by hand.

use super::parse_number;

use anyhow::{bail, Context, Result};
use byteorder::{ByteOrder, LE};
use farsight::{
    is_valid, BufferPool, CollectionReader, LayoutTable, MemoryChannel, MemorySource,
};
use std::fmt::Write as _;
use std::sync::Arc;
use std::time::Duration;

/// Handle the Read command
///
/// Reads bytes from memory and displays them as a hex dump.
pub fn handle_read(source: &dyn MemorySource, address: &str, size: usize) -> Result<()> {
    let addr = parse_number(address)?;
    let data = source
        .read_bytes(addr, size)
        .with_context(|| format!("Failed to read {} bytes at {:#x}", size, addr))?;

    println!("Reading {} bytes at {:#x}:", size, addr);
    print!("{}", hexdump(addr, &data));

    if data.len() >= 8 {
        println!();
        println!("  u64: {:#x}", LE::read_u64(&data));
        println!("  i32: {} {}", LE::read_i32(&data), LE::read_i32(&data[4..]));
        println!("  f32: {} {}", LE::read_f32(&data), LE::read_f32(&data[4..]));
    }

    Ok(())
}

/// Classic 16-bytes-per-line hex dump with an ASCII column
fn hexdump(base: u64, data: &[u8]) -> String {
    let mut out = String::new();
    for (i, chunk) in data.chunks(16).enumerate() {
        let _ = write!(out, "{:012x}  ", base + i as u64 * 16);
        for j in 0..16 {
            match chunk.get(j) {
                Some(byte) => {
                    let _ = write!(out, "{:02x} ", byte);
                }
                None => out.push_str("   "),
            }
            if j == 7 {
                out.push(' ');
            }
        }
        out.push_str(" |");
        for byte in chunk {
            let c = *byte as char;
            out.push(if c.is_ascii_graphic() || c == ' ' { c } else { '.' });
        }
        out.push_str("|\n");
    }
    out
}

/// Resolve a base argument: a number, or the name of a mapped module
fn resolve_base(source: &dyn MemorySource, base: &str) -> Result<u64> {
    if let Ok(address) = parse_number(base) {
        return Ok(address);
    }
    source
        .find_module(base)
        .map(|m| m.start)
        .with_context(|| format!("'{}' is neither an address nor a mapped module", base))
}

/// Handle the Chain command
///
/// Walks the chain one hop at a time so a broken link shows exactly where.
pub fn handle_chain(
    source: Arc<dyn MemorySource>,
    layout: &LayoutTable,
    base: &str,
    offsets: &[String],
    name: Option<&str>,
) -> Result<()> {
    let offsets: Vec<u64> = match name {
        Some(name) => {
            if !offsets.is_empty() {
                bail!("Pass either --name or explicit offsets, not both");
            }
            layout.chain(name)?.to_vec()
        }
        None => offsets
            .iter()
            .map(|o| parse_number(o))
            .collect::<Result<_>>()?,
    };
    if offsets.is_empty() {
        bail!("No offsets to follow");
    }

    let start = resolve_base(source.as_ref(), base)?;
    let channel = MemoryChannel::new(source, Duration::ZERO);

    println!("Base: {:#x}", start);
    let mut address = start;
    for (hop, offset) in offsets.iter().enumerate() {
        let slot = hop_slot(address, *offset, hop)?;
        let next = channel
            .read_ptr(slot, false)
            .with_context(|| format!("Hop {} failed reading {:#x}", hop, slot))?;
        let marker = if is_valid(next) { "" } else { "  <- invalid" };
        println!("  [{}] {:#x} + {:#x} -> {:#x}{}", hop, address, offset, next, marker);
        if !is_valid(next) {
            bail!("Chain broken at hop {}", hop);
        }
        address = next;
    }
    println!("Result: {:#x}", address);

    Ok(())
}

/// Address read at `hop`: the current pointer plus its offset
fn hop_slot(address: u64, offset: u64, hop: usize) -> Result<u64> {
    address
        .checked_add(offset)
        .with_context(|| format!("Hop {} offset {:#x} overflows {:#x}", hop, offset, address))
}

/// Handle the Collection command
///
/// Decodes a named layout collection as pointer-sized values.
pub fn handle_collection(
    source: Arc<dyn MemorySource>,
    layout: &LayoutTable,
    name: &str,
    address: &str,
    limit: usize,
) -> Result<()> {
    let base = parse_number(address)?;
    let shape = layout.collection(name)?;
    let channel = MemoryChannel::new(source, Duration::ZERO);
    let pool = Arc::new(BufferPool::default());
    let reader = CollectionReader::new(&channel, &pool, layout.max_collection_count);

    let snapshot = reader
        .read::<u64>(shape, base, false)
        .with_context(|| format!("Failed to decode {} at {:#x}", name, base))?;

    println!(
        "{} ({:?}) at {:#x}: {} entries",
        name,
        shape.kind,
        base,
        snapshot.len()
    );
    for (i, value) in snapshot.iter().take(limit).enumerate() {
        let marker = if is_valid(value) { "" } else { "  (not an address)" };
        println!("  [{:4}] {:#018x}{}", i, value, marker);
    }
    if snapshot.len() > limit {
        println!("  ... and {} more", snapshot.len() - limit);
    }

    Ok(())
}
