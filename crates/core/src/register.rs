//! Memory-mapped 8-bit registers.
//!
//! A register is a raw byte plus a static table of named bit-fields. Fields
//! are either *writable* (live views over the byte that rewrite it when
//! assigned) or *read-only* (snapshotted every time the value is replaced via
//! [`RegisterCell::set_value`]).
//!
//! Concrete registers wrap a [`RegisterCell`] and implement
//! [`MappedRegister`] to attach their hardware side effects to bus reads and
//! writes. A [`RegisterMap`] maps bus addresses to register identifiers so a
//! component can expose a uniform `read(address)` / `write(address, value)`.
//!
//! # Example
//!
//! ```rust
//! use edunes_core::register::{FieldDescriptor, FieldLayout, RegisterCell};
//!
//! const MODE: FieldDescriptor = FieldDescriptor::writable("mode", 0, 2);
//! const BUSY: FieldDescriptor = FieldDescriptor::read_only("busy", 7, 1);
//! static LAYOUT: FieldLayout = FieldLayout::new(&[MODE, BUSY]);
//!
//! let mut reg = RegisterCell::new(&LAYOUT);
//! reg.set_value(0x83);
//! assert_eq!(reg.get(&MODE), 3);
//! assert_eq!(reg.get(&BUSY), 1);
//! ```

use crate::bits;
use std::fmt;
use thiserror::Error;

/// Static description of one bit-field inside an 8-bit register.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldDescriptor {
    pub name: &'static str,
    pub offset: u8,
    pub width: u8,
    pub writable: bool,
}

impl FieldDescriptor {
    pub const fn read_only(name: &'static str, offset: u8, width: u8) -> Self {
        Self {
            name,
            offset,
            width,
            writable: false,
        }
    }

    pub const fn writable(name: &'static str, offset: u8, width: u8) -> Self {
        Self {
            name,
            offset,
            width,
            writable: true,
        }
    }

    /// Bits covered by this field, in register position.
    pub fn mask(&self) -> u8 {
        bits::set_bits(0, self.offset, self.width, 0xFF)
    }
}

/// Rejected field or address tables. These indicate a bug in the emulation
/// core itself, never bad guest input.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LayoutError {
    #[error("field `{0}` has zero width")]
    ZeroWidth(&'static str),
    #[error("field `{name}` (offset {offset}, width {width}) does not fit in 8 bits")]
    OutOfRange {
        name: &'static str,
        offset: u8,
        width: u8,
    },
    #[error("fields `{first}` and `{second}` overlap")]
    Overlap {
        first: &'static str,
        second: &'static str,
    },
    #[error("field name `{0}` declared twice")]
    DuplicateName(&'static str),
    #[error("address ${0:04X} mapped twice")]
    DuplicateAddress(u16),
}

/// Runtime misuse of the by-name field API.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegisterError {
    #[error("no field named `{0}`")]
    UnknownField(String),
    #[error("field `{0}` is read-only")]
    ReadOnlyField(&'static str),
}

/// An ordered, static set of field descriptors.
#[derive(Debug)]
pub struct FieldLayout {
    fields: &'static [FieldDescriptor],
}

impl FieldLayout {
    pub const EMPTY: FieldLayout = FieldLayout { fields: &[] };

    pub const fn new(fields: &'static [FieldDescriptor]) -> Self {
        Self { fields }
    }

    pub fn fields(&self) -> &'static [FieldDescriptor] {
        self.fields
    }

    pub fn find(&self, name: &str) -> Option<&'static FieldDescriptor> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Checks that every field fits in the byte and that no two fields share
    /// a bit or a name.
    pub fn validate(&self) -> Result<(), LayoutError> {
        let mut claimed = 0u8;
        let mut owners: [&'static str; 8] = [""; 8];

        for (i, field) in self.fields.iter().enumerate() {
            if field.width == 0 {
                return Err(LayoutError::ZeroWidth(field.name));
            }
            if field.offset as u16 + field.width as u16 > 8 {
                return Err(LayoutError::OutOfRange {
                    name: field.name,
                    offset: field.offset,
                    width: field.width,
                });
            }
            if self.fields[..i].iter().any(|f| f.name == field.name) {
                return Err(LayoutError::DuplicateName(field.name));
            }

            let mask = field.mask();
            if claimed & mask != 0 {
                let bit = (claimed & mask).trailing_zeros() as usize;
                return Err(LayoutError::Overlap {
                    first: owners[bit],
                    second: field.name,
                });
            }
            claimed |= mask;
            for bit in field.offset..field.offset + field.width {
                owners[bit as usize] = field.name;
            }
        }
        Ok(())
    }
}

/// Raw register storage plus its field view.
///
/// The value is private, so every replacement goes through
/// [`set_value`](Self::set_value) and read-only snapshots cannot go stale.
/// Writable fields never share bits with read-only ones, so assigning a
/// writable field keeps the snapshots consistent too.
#[derive(Clone)]
pub struct RegisterCell {
    value: u8,
    layout: &'static FieldLayout,
    // read-only field values, indexed by field offset
    snapshot: [u8; 8],
}

impl RegisterCell {
    /// Creates a zeroed register.
    ///
    /// # Panics
    ///
    /// Panics if `layout` is invalid. Layouts are static tables, so this
    /// fires the first time the register type is constructed.
    pub fn new(layout: &'static FieldLayout) -> Self {
        if let Err(e) = layout.validate() {
            panic!("invalid register layout: {e}");
        }
        Self {
            value: 0,
            layout,
            snapshot: [0; 8],
        }
    }

    /// A register with no declared fields.
    pub fn plain() -> Self {
        Self::new(&FieldLayout::EMPTY)
    }

    #[inline]
    pub fn value(&self) -> u8 {
        self.value
    }

    /// Replaces the raw value and refreshes every read-only field.
    pub fn set_value(&mut self, value: u8) {
        self.value = value;
        for field in self.layout.fields.iter().filter(|f| !f.writable) {
            self.snapshot[field.offset as usize] =
                bits::get_bits(value, field.offset, field.width);
        }
    }

    pub fn layout(&self) -> &'static FieldLayout {
        self.layout
    }

    /// Reads a field. Writable fields are live, read-only fields return the
    /// value captured by the last `set_value`.
    #[inline]
    pub fn get(&self, field: &FieldDescriptor) -> u8 {
        if field.writable {
            bits::get_bits(self.value, field.offset, field.width)
        } else {
            self.snapshot[(field.offset & 7) as usize]
        }
    }

    #[inline]
    pub fn flag(&self, field: &FieldDescriptor) -> bool {
        self.get(field) != 0
    }

    /// Assigns a writable field, rewriting the matching bits of the value.
    /// Bits of `value` beyond the field width are dropped.
    ///
    /// Debug builds assert the field is writable; release builds ignore the
    /// assignment for read-only fields.
    #[inline]
    pub fn set(&mut self, field: &FieldDescriptor, value: u8) {
        debug_assert!(field.writable, "field `{}` is read-only", field.name);
        if field.writable {
            self.value = bits::set_bits(self.value, field.offset, field.width, value);
        }
    }

    #[inline]
    pub fn set_flag(&mut self, field: &FieldDescriptor, on: bool) {
        self.set(field, on as u8);
    }

    /// By-name read, for tooling and tests.
    pub fn field(&self, name: &str) -> Result<u8, RegisterError> {
        self.layout
            .find(name)
            .map(|f| self.get(f))
            .ok_or_else(|| RegisterError::UnknownField(name.to_string()))
    }

    /// By-name write, for tooling and tests.
    pub fn set_field(&mut self, name: &str, value: u8) -> Result<(), RegisterError> {
        let field = self
            .layout
            .find(name)
            .ok_or_else(|| RegisterError::UnknownField(name.to_string()))?;
        if !field.writable {
            return Err(RegisterError::ReadOnlyField(field.name));
        }
        self.set(field, value);
        Ok(())
    }
}

impl fmt::Debug for RegisterCell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct("RegisterCell");
        s.field("value", &format_args!("{:#04X}", self.value));
        for field in self.layout.fields {
            s.field(field.name, &self.get(field));
        }
        s.finish()
    }
}

/// Bus-facing behavior of a concrete register.
///
/// `C` is the state of the owning component that side effects may touch
/// (memory, latches, sibling counters).
pub trait MappedRegister<C: ?Sized> {
    /// Called once when the owning component is built.
    fn on_load(&mut self) {}

    /// A read from the register's bus address. Write-only registers keep the
    /// default, which reads as 0.
    fn on_read(&mut self, ctx: &mut C) -> u8 {
        let _ = ctx;
        0
    }

    /// A write to the register's bus address.
    fn on_write(&mut self, value: u8, ctx: &mut C) {
        let _ = (value, ctx);
    }
}

/// Fixed address to register-id dispatch table.
#[derive(Debug, Clone, Copy)]
pub struct RegisterMap<Id: 'static> {
    entries: &'static [(u16, Id)],
}

impl<Id: Copy + 'static> RegisterMap<Id> {
    /// Builds a map, rejecting tables that bind one address twice.
    pub fn try_new(entries: &'static [(u16, Id)]) -> Result<Self, LayoutError> {
        for (i, (addr, _)) in entries.iter().enumerate() {
            if entries[..i].iter().any(|(a, _)| a == addr) {
                return Err(LayoutError::DuplicateAddress(*addr));
            }
        }
        Ok(Self { entries })
    }

    /// # Panics
    ///
    /// Panics on a duplicate address (see [`try_new`](Self::try_new)).
    pub fn new(entries: &'static [(u16, Id)]) -> Self {
        match Self::try_new(entries) {
            Ok(map) => map,
            Err(e) => panic!("invalid register map: {e}"),
        }
    }

    #[inline]
    pub fn lookup(&self, address: u16) -> Option<Id> {
        self.entries
            .iter()
            .find(|(a, _)| *a == address)
            .map(|(_, id)| *id)
    }

    pub fn addresses(&self) -> impl Iterator<Item = u16> + '_ {
        self.entries.iter().map(|(a, _)| *a)
    }
}
