//! ARM Thumb semihosting trap.

use core::arch::asm;
use core::ffi::c_void;

use crate::hostcall::HostCall;

/// Host call through the Thumb `bkpt 0xAB` semihosting breakpoint.
pub struct MachineHost;

impl HostCall for MachineHost {
    unsafe fn call(&self, op: usize, arg: *mut c_void) -> isize {
        let ret: isize;
        asm!(
            "bkpt 0xab",
            inout("r0") op => ret,
            in("r1") arg,
            options(nostack),
        );
        ret
    }
}
