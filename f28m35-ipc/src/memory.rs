//! Memory the IPC handlers act on
//!
//! The receiving side of every command reads or writes memory at an
//! address chosen by the peer. [`AddressSpace`] abstracts that memory, in
//! the receiving core's own address units, so handlers never cast raw
//! addresses to pointers themselves.

use crate::error::{Error, Result};

/// Width of a single data element
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Width {
    /// 16-bit element, length tag 1
    Bits16 = 1,
    /// 32-bit element, length tag 2
    Bits32 = 2,
}

impl Width {
    /// Tag stored in the length field of a message
    pub const fn tag(self) -> u16 {
        self as u16
    }

    /// Decode a length tag
    pub const fn from_tag(tag: u16) -> Result<Self> {
        match tag {
            1 => Ok(Width::Bits16),
            2 => Ok(Width::Bits32),
            other => Err(Error::InvalidLength(other)),
        }
    }

    /// Mask that truncates a value to this width
    pub const fn mask(self) -> u32 {
        match self {
            Width::Bits16 => 0xFFFF,
            Width::Bits32 => 0xFFFF_FFFF,
        }
    }

    /// Number of 16-bit words in one element
    pub const fn halfwords(self) -> u32 {
        self as u32
    }
}

/// Memory addressable by one core
///
/// Accesses take `&self`: implementations are volatile hardware accesses or
/// interior-mutable models, and the same memory is reached from thread
/// mode and from the IPC interrupt handler.
pub trait AddressSpace {
    /// Address units spanned by one 16-bit word.
    ///
    /// 1 on the word-addressed control core, 2 on the byte-addressed master
    /// core.
    const UNITS_PER_HALFWORD: u32;

    /// Read the 16-bit word at `address`
    fn read16(&self, address: u32) -> u16;
    /// Write the 16-bit word at `address`
    fn write16(&self, address: u32, value: u16);
    /// Read the 32-bit word at `address`
    fn read32(&self, address: u32) -> u32;
    /// Write the 32-bit word at `address`
    fn write32(&self, address: u32, value: u32);

    /// Read an element of the given width, zero extended
    fn read(&self, address: u32, width: Width) -> u32 {
        match width {
            Width::Bits16 => u32::from(self.read16(address)),
            Width::Bits32 => self.read32(address),
        }
    }

    /// Write an element of the given width, truncating `value`
    fn write(&self, address: u32, width: Width, value: u32) {
        match width {
            Width::Bits16 => self.write16(address, value as u16),
            Width::Bits32 => self.write32(address, value),
        }
    }

    /// Copy `count` elements of `width` from `from` to `to`, lowest address
    /// first.
    fn copy(&self, from: u32, to: u32, count: u16, width: Width) {
        let stride = Self::UNITS_PER_HALFWORD * width.halfwords();
        for i in 0..u32::from(count) {
            let offset = i * stride;
            let value = self.read(from.wrapping_add(offset), width);
            self.write(to.wrapping_add(offset), width, value);
        }
    }
}

/// Direct volatile access to the master core's memory map
///
/// Addresses are byte addresses. 16-bit accesses must be 2-byte aligned and
/// 32-bit accesses 4-byte aligned.
#[derive(Debug)]
pub struct RawMemory {
    _private: (),
}

impl RawMemory {
    /// Access memory through raw pointers.
    ///
    /// # Safety
    ///
    /// Every address later passed to this object, including the ones chosen
    /// by the peer core in messages, must be valid for the access made.
    pub const unsafe fn new() -> Self {
        Self { _private: () }
    }
}

impl AddressSpace for RawMemory {
    const UNITS_PER_HALFWORD: u32 = 2;

    fn read16(&self, address: u32) -> u16 {
        // Safety: the caller of `RawMemory::new` vouched for the address
        unsafe { core::ptr::read_volatile(address as usize as *const u16) }
    }

    fn write16(&self, address: u32, value: u16) {
        // Safety: the caller of `RawMemory::new` vouched for the address
        unsafe { core::ptr::write_volatile(address as usize as *mut u16, value) }
    }

    fn read32(&self, address: u32) -> u32 {
        // Safety: the caller of `RawMemory::new` vouched for the address
        unsafe { core::ptr::read_volatile(address as usize as *const u32) }
    }

    fn write32(&self, address: u32, value: u32) {
        // Safety: the caller of `RawMemory::new` vouched for the address
        unsafe { core::ptr::write_volatile(address as usize as *mut u32, value) }
    }
}

/// Register write protection
///
/// Some registers, among them the shared RAM master-select register, only
/// accept writes while protection is lifted.
pub trait WriteProtect {
    /// Lift write protection
    fn allow_writes(&self);
    /// Restore write protection
    fn protect_writes(&self);
    /// Is write protection currently lifted?
    fn writes_allowed(&self) -> bool;
}

/// Memory without write protection
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProtection;

impl WriteProtect for NoProtection {
    fn allow_writes(&self) {}
    fn protect_writes(&self) {}
    fn writes_allowed(&self) -> bool {
        true
    }
}

/// Write protection lifted for as long as this guard lives
///
/// Protection is restored on drop unless it was already lifted when the
/// guard was created, so guards nest.
#[must_use = "protection is restored as soon as the guard is dropped"]
pub struct WriteAllowed<'a, P: WriteProtect + ?Sized> {
    protect: &'a P,
    was_allowed: bool,
}

impl<'a, P: WriteProtect + ?Sized> WriteAllowed<'a, P> {
    /// Lift protection until the returned guard is dropped.
    pub fn new(protect: &'a P) -> Self {
        let was_allowed = protect.writes_allowed();
        protect.allow_writes();
        Self {
            protect,
            was_allowed,
        }
    }
}

impl<P: WriteProtect + ?Sized> Drop for WriteAllowed<'_, P> {
    fn drop(&mut self) {
        if !self.was_allowed {
            self.protect.protect_writes();
        }
    }
}

/// Run `f` with write protection lifted when `protected` is set.
pub fn with_protection<P, R, F>(protect: &P, protected: bool, f: F) -> R
where
    P: WriteProtect + ?Sized,
    F: FnOnce() -> R,
{
    if protected {
        let _allowed = WriteAllowed::new(protect);
        f()
    } else {
        f()
    }
}

/// Functions the peer may call by address
pub trait FunctionTable {
    /// Call the function at `address` with `param`.
    ///
    /// Returns `None` when no function lives at `address`.
    fn call(&self, address: u32, param: u32) -> Option<u32>;
}

/// A table that refuses every call
#[derive(Debug, Default, Clone, Copy)]
pub struct NoFunctions;

impl FunctionTable for NoFunctions {
    fn call(&self, _address: u32, _param: u32) -> Option<u32> {
        None
    }
}

/// A fixed list of callable functions, each registered under the address
/// the peer will use for it.
#[derive(Debug, Clone, Copy)]
pub struct FunctionRegistry<'a> {
    entries: &'a [(u32, fn(u32) -> u32)],
}

impl<'a> FunctionRegistry<'a> {
    /// Create a registry from `(address, function)` pairs
    pub const fn new(entries: &'a [(u32, fn(u32) -> u32)]) -> Self {
        Self { entries }
    }
}

impl FunctionTable for FunctionRegistry<'_> {
    fn call(&self, address: u32, param: u32) -> Option<u32> {
        self.entries
            .iter()
            .find(|(addr, _)| *addr == address)
            .map(|(_, f)| f(param))
    }
}

/// Calls whatever code lives at the given address
#[derive(Debug)]
pub struct RawFunctions {
    _private: (),
}

impl RawFunctions {
    /// Treat every non-zero address as an `extern "C" fn(u32) -> u32`.
    ///
    /// # Safety
    ///
    /// Every address the peer sends in a function call must be the address
    /// of a function with that signature (with the Thumb bit set on
    /// Cortex-M).
    pub const unsafe fn new() -> Self {
        Self { _private: () }
    }
}

impl FunctionTable for RawFunctions {
    fn call(&self, address: u32, param: u32) -> Option<u32> {
        if address == 0 {
            return None;
        }
        // Safety: the caller of `RawFunctions::new` vouched for the address
        let f: extern "C" fn(u32) -> u32 =
            unsafe { core::mem::transmute::<usize, extern "C" fn(u32) -> u32>(address as usize) };
        Some(f(param))
    }
}
