//! Memory Region Types
//!
//! Descriptors for mapped regions of the foreign address space.

use serde::Serialize;

/// A mapped region of the target process
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MemoryRegion {
    pub start: u64,
    pub end: u64,
    pub perms: String,
    pub offset: u64,
    pub path: Option<String>,
}

impl MemoryRegion {
    pub fn size(&self) -> u64 {
        self.end - self.start
    }

    pub fn contains(&self, address: u64) -> bool {
        address >= self.start && address < self.end
    }

    pub fn is_readable(&self) -> bool {
        self.perms.starts_with('r')
    }

    pub fn is_executable(&self) -> bool {
        self.perms.chars().nth(2) == Some('x')
    }

    /// File name component of the backing path, if any
    pub fn file_name(&self) -> Option<&str> {
        let path = self.path.as_deref()?;
        path.rsplit(['/', '\\']).next()
    }

    /// Case-insensitive match of the backing file name against a module name
    pub fn is_module(&self, name: &str) -> bool {
        self.file_name()
            .map(|f| f.eq_ignore_ascii_case(name))
            .unwrap_or(false)
    }
}
