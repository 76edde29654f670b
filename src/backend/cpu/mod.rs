mod cpu;

pub use cpu::CpuBackend;
