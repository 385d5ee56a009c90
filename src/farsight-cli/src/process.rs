//! Live Process Memory Source
//!
//! Memory source implementation for reading from a running target process
//! through `/proc` and `process_vm_readv`.

use farsight::{ChannelError, MemoryRegion, MemorySource, ReadError};

use anyhow::{bail, Context, Result};
use parking_lot::RwLock;
use process_memory::{CopyAddress, ProcessHandle, TryIntoProcessHandle};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::PathBuf;
use sysinfo::System;

/// An attached target process
pub struct ProcessSource {
    pub pid: u32,
    pub exe_path: PathBuf,
    handle: ProcessHandle,
    maps: RwLock<Vec<MemoryRegion>>,
}

// SAFETY: the handle is a plain pid on Linux and a process-wide HANDLE on
// Windows; both can be used from any thread.
unsafe impl Send for ProcessSource {}
unsafe impl Sync for ProcessSource {}

impl MemorySource for ProcessSource {
    fn read_into(&self, address: u64, buf: &mut [u8]) -> farsight::Result<()> {
        self.handle
            .copy_address(address as usize, buf)
            .map_err(|err| {
                if self.is_alive() {
                    ReadError::access(address, err.to_string())
                } else {
                    ChannelError::ProcessGone.into()
                }
            })
    }

    fn is_alive(&self) -> bool {
        is_running(self.pid)
    }

    fn regions(&self) -> Vec<MemoryRegion> {
        self.maps.read().clone()
    }
}

impl ProcessSource {
    /// Attach to the first running process matching `name`
    pub fn attach(name: &str) -> Result<Self> {
        let pid = find_process(name)?;
        Self::attach_pid(pid)
    }

    pub fn attach_pid(pid: u32) -> Result<Self> {
        let handle = (pid as process_memory::Pid)
            .try_into_process_handle()
            .context("Failed to attach to process. Try running with sudo.")?;

        let maps = parse_maps(pid)?;

        let exe_path = std::fs::read_link(format!("/proc/{}/exe", pid))
            .unwrap_or_else(|_| PathBuf::from("unknown"));

        Ok(ProcessSource {
            pid,
            exe_path,
            handle,
            maps: RwLock::new(maps),
        })
    }

    /// Re-read the region list; modules load lazily after startup
    pub fn refresh_maps(&self) -> Result<usize> {
        let maps = parse_maps(self.pid)?;
        let count = maps.len();
        *self.maps.write() = maps;
        Ok(count)
    }

    /// Get process info summary
    pub fn info(&self, module: &str) -> String {
        let module_info = self
            .find_module(module)
            .map(|m| format!("Base: {:#x}, Size: {:#x}", m.start, m.size()))
            .unwrap_or_else(|| "Not found".to_string());

        format!(
            "PID: {}\nExecutable: {}\nModule {}: {}\nMemory Regions: {}",
            self.pid,
            self.exe_path.display(),
            module,
            module_info,
            self.maps.read().len()
        )
    }
}

/// Whether `pid` exists and has not exited
pub fn is_running(pid: u32) -> bool {
    match std::fs::read_to_string(format!("/proc/{}/stat", pid)) {
        Ok(stat) => process_state(&stat).map(|s| s != 'Z' && s != 'X').unwrap_or(false),
        Err(_) => false,
    }
}

/// State letter from a `/proc/<pid>/stat` line. The command name may contain
/// spaces and parentheses, so scan from the last `)`.
fn process_state(stat: &str) -> Option<char> {
    let rest = &stat[stat.rfind(')')? + 1..];
    rest.split_whitespace().next()?.chars().next()
}

/// Find a running process by executable name, preferring the largest
pub fn find_process(name: &str) -> Result<u32> {
    let mut system = System::new_all();
    system.refresh_all();

    let needle = name.to_ascii_lowercase();
    let mut candidates: Vec<(u32, u64)> = Vec::new();

    for process in system.processes().values() {
        let pid = process.pid().as_u32();
        let memory = process.memory();

        // Wine/Proton processes show up under the loader; the cmdline keeps
        // the Windows executable name
        let cmdline_matches = std::fs::read_to_string(format!("/proc/{}/cmdline", pid))
            .map(|c| c.to_ascii_lowercase().contains(&needle))
            .unwrap_or(false);
        let name_matches = process
            .name()
            .to_string_lossy()
            .to_ascii_lowercase()
            .contains(&needle);

        if cmdline_matches || name_matches {
            let tgid = get_tgid(pid).unwrap_or(pid);
            candidates.push((tgid, memory));
        }
    }

    candidates.sort_by(|a, b| b.1.cmp(&a.1));
    candidates.dedup_by(|a, b| a.0 == b.0);

    if let Some((pid, memory)) = candidates.first() {
        tracing::info!(pid, memory_mb = memory / 1_000_000, "found target process");
        return Ok(*pid);
    }

    bail!("Process '{}' not found. Is it running?", name)
}

/// Get the thread group ID (main process) for a given PID/TID
pub fn get_tgid(pid: u32) -> Option<u32> {
    let status = std::fs::read_to_string(format!("/proc/{}/status", pid)).ok()?;
    parse_tgid(&status)
}

fn parse_tgid(status: &str) -> Option<u32> {
    status
        .lines()
        .find(|line| line.starts_with("Tgid:"))?
        .split_whitespace()
        .nth(1)?
        .parse()
        .ok()
}

/// Parse /proc/pid/maps to get memory regions
pub fn parse_maps(pid: u32) -> Result<Vec<MemoryRegion>> {
    let maps_path = format!("/proc/{}/maps", pid);
    let file = File::open(&maps_path)
        .with_context(|| format!("Failed to open {}. Do you have permission?", maps_path))?;
    parse_maps_from(BufReader::new(file))
}

fn parse_maps_from(reader: impl BufRead) -> Result<Vec<MemoryRegion>> {
    let mut regions = Vec::new();

    for line in reader.lines() {
        let line = line?;
        let parts: Vec<&str> = line.split_whitespace().collect();
        let Some((start, end)) = parts.first().and_then(|range| range.split_once('-')) else {
            continue;
        };
        let (Ok(start), Ok(end)) = (u64::from_str_radix(start, 16), u64::from_str_radix(end, 16))
        else {
            continue;
        };

        let perms = parts.get(1).unwrap_or(&"").to_string();
        let offset = parts
            .get(2)
            .and_then(|s| u64::from_str_radix(s, 16).ok())
            .unwrap_or(0);
        // Paths under Wine prefixes often contain spaces
        let path = (parts.len() > 5).then(|| parts[5..].join(" "));

        regions.push(MemoryRegion {
            start,
            end,
            perms,
            offset,
            path,
        });
    }

    Ok(regions)
}
