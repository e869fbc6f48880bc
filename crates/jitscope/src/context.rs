use jitscope_core::{CpuThread, JitInterface, SymbolDb};

/// The emulator-side collaborators an inspector operation works against.
///
/// Passed explicitly so several independent cores (or test doubles) can coexist.
pub struct CoreContext<'a> {
    pub jit: &'a mut dyn JitInterface,
    pub symbols: &'a dyn SymbolDb,
    pub cpu: &'a CpuThread,
}

impl<'a> CoreContext<'a> {
    pub fn new(
        jit: &'a mut dyn JitInterface,
        symbols: &'a dyn SymbolDb,
        cpu: &'a CpuThread,
    ) -> Self {
        Self { jit, symbols, cpu }
    }
}
