//! Portable in-line assembly
//!
//! The Cortex-M3 master core gets the real `cortex_m::asm` instructions.
//! Everywhere else (the host, where [`crate::sim`] runs one thread per
//! core) the placeholders keep the same ordering guarantees with std-free
//! primitives.

#[cfg(all(target_arch = "arm", target_os = "none"))]
mod inner {
    #[doc(inline)]
    pub use cortex_m::asm::{dsb, nop};
}

#[cfg(not(all(target_arch = "arm", target_os = "none")))]
mod inner {
    /// Placeholder for `nop`: a spin-loop hint
    pub fn nop() {
        core::hint::spin_loop();
    }

    /// Placeholder for the data synchronisation barrier: a full fence
    pub fn dsb() {
        core::sync::atomic::fence(core::sync::atomic::Ordering::SeqCst);
    }
}

#[doc(inline)]
pub use inner::{dsb, nop};

/// Stop making progress.
///
/// Used when a protocol fault is treated as unrecoverable.
pub fn halt() -> ! {
    // Spin, so you can attach a debugger if you get stuck here.
    loop {
        nop();
    }
}
