use std::collections::BTreeMap;

use thiserror::Error;

use crate::multiregister::MultiRegister;

pub const DEFAULT_REGISTER_WIDTH: usize = 8192;

#[derive(Debug, Error)]
#[error("copy of unallocated register `{0}`")]
pub struct UnallocatedRead(pub String);

/// Named register file with lazy allocation. Registers referenced before
/// they are written spring into existence zero-filled at the file's width.
#[derive(Clone, Debug, Default)]
pub struct RegisterFile {
    registers: BTreeMap<String, MultiRegister>,
    width: usize,
}

impl RegisterFile {
    pub fn new(width: usize) -> Self {
        Self {
            registers: BTreeMap::new(),
            width,
        }
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.width
    }

    /// Shared access; allocates a zeroed width-`W` register if absent.
    pub fn read(&mut self, name: &str) -> &MultiRegister {
        self.ensure(name);
        &self.registers[name]
    }

    /// Mutable access; allocates if absent and resizes to the file width if
    /// the register's current size differs.
    pub fn entry(&mut self, name: &str) -> &mut MultiRegister {
        self.ensure(name);
        let width = self.width;
        let register = self.registers.get_mut(name).expect("just ensured");
        if register.len() != width {
            register.resize(width);
        }
        register
    }

    pub fn write(&mut self, name: &str, value: MultiRegister) {
        self.registers.insert(name.to_string(), value);
    }

    /// Shared access without lazy allocation.
    pub fn get(&self, name: &str) -> Option<&MultiRegister> {
        self.registers.get(name)
    }

    /// Deep copy; unlike `read`, an absent name is an error.
    pub fn copy(&self, name: &str) -> Result<MultiRegister, UnallocatedRead> {
        self.registers
            .get(name)
            .cloned()
            .ok_or_else(|| UnallocatedRead(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.registers.contains_key(name)
    }

    pub fn registers(&self) -> impl Iterator<Item = (&str, &MultiRegister)> {
        self.registers
            .iter()
            .map(|(name, register)| (name.as_str(), register))
    }

    fn ensure(&mut self, name: &str) {
        if !self.registers.contains_key(name) {
            self.registers
                .insert(name.to_string(), MultiRegister::zeroed(self.width));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_allocates_lazily_at_width() {
        let mut file = RegisterFile::new(8);
        assert!(!file.contains("a"));
        assert_eq!(file.read("a").len(), 8);
        assert!(file.contains("a"));
    }

    #[test]
    fn entry_resizes_to_width() {
        let mut file = RegisterFile::new(8);
        file.write("imm", MultiRegister::from_lanes(vec![5]));
        assert_eq!(file.read("imm").len(), 1);
        assert_eq!(file.entry("imm").len(), 8);
        assert_eq!(file.entry("imm").lanes()[0], 5);
    }

    #[test]
    fn copy_of_absent_name_fails() {
        let file = RegisterFile::new(8);
        assert!(file.copy("ghost").is_err());
    }

    #[test]
    fn registers_iterate_in_name_order() {
        let mut file = RegisterFile::new(2);
        file.write("b", MultiRegister::zeroed(2));
        file.write("a", MultiRegister::zeroed(2));
        let names: Vec<&str> = file.registers().map(|(name, _)| name).collect();
        assert_eq!(names, ["a", "b"]);
    }
}
