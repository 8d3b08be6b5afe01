//! Target-specific host-call implementations.

#[cfg(all(target_arch = "riscv64", target_os = "none"))]
pub mod riscv64;

#[cfg(all(target_arch = "arm", target_os = "none"))]
pub mod thumb;
