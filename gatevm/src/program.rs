//! An immutable, linked bytecode unit: four constant pools, two
//! native-symbol tables, and a list of owned handlers.

use crate::error::{LinkError, ProgramError};
use crate::handler::Handler;
use crate::pool::{IntegerPool, ModuleImport, ModulePool, RegexPool, StringPool};
use crate::runner::Runner;
use crate::runtime::{Callback, Runtime};
use crate::signature::Signature;
use gatevm_asm::Instruction;
use std::io;

/// The outcome of [`Program::link`], with one entry per failure. `link`
/// itself still returns a plain `bool` per the embedding API; `LinkReport`
/// is the detail behind that boolean for hosts that want it (`spec.md` §4.2
/// requires unresolved symbols and failed imports each be reported).
#[derive(Debug, Default, Clone)]
pub struct LinkReport {
    pub failures: Vec<LinkError>,
}

impl LinkReport {
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }
}

/// An immutable bytecode unit: constant pools, native-symbol tables, and the
/// handlers that reference them. Generic over `'rt`, the lifetime of the
/// [`Runtime`] it is linked against — the native-symbol callback tables
/// below hold `&'rt Callback` references once `link` succeeds, and are all
/// `None` before that.
pub struct Program<'rt> {
    integers: IntegerPool,
    strings: StringPool,
    regexes: RegexPool,
    modules: ModulePool,
    handler_signatures: Vec<Signature>,
    function_signatures: Vec<Signature>,
    native_handlers: Vec<Option<&'rt Callback>>,
    native_functions: Vec<Option<&'rt Callback>>,
    handlers: Vec<Handler>,
    linked: bool,
}

impl<'rt> Program<'rt> {
    /// Build an unlinked program from its four constant pools, module
    /// imports, and the two native-symbol signature-string lists. Handler
    /// creation is a separate step ([`Program::create_handler`]).
    pub fn new(
        integers: IntegerPool,
        strings: StringPool,
        regexes: RegexPool,
        modules: ModulePool,
        handler_signatures: Vec<String>,
        function_signatures: Vec<String>,
    ) -> Result<Self, ProgramError> {
        let handler_signatures = handler_signatures
            .iter()
            .map(|s| Signature::parse(s))
            .collect::<Result<Vec<_>, _>>()?;
        let function_signatures = function_signatures
            .iter()
            .map(|s| Signature::parse(s))
            .collect::<Result<Vec<_>, _>>()?;

        let native_handlers = handler_signatures.iter().map(|_| None).collect();
        let native_functions = function_signatures.iter().map(|_| None).collect();

        Ok(Program {
            integers,
            strings,
            regexes,
            modules,
            handler_signatures,
            function_signatures,
            native_handlers,
            native_functions,
            handlers: Vec::new(),
            linked: false,
        })
    }

    pub fn integers(&self) -> &IntegerPool {
        &self.integers
    }

    pub fn strings(&self) -> &StringPool {
        &self.strings
    }

    pub fn regexes(&self) -> &RegexPool {
        &self.regexes
    }

    pub fn modules(&self) -> &ModulePool {
        &self.modules
    }

    pub fn is_linked(&self) -> bool {
        self.linked
    }

    /// Append a new handler owned by this program. Duplicate names are
    /// rejected (`spec.md` §9 Open Question (a): the reference
    /// implementation allows them and `findHandler` silently returns the
    /// first match; this implementation rejects instead).
    pub fn create_handler(
        &mut self,
        name: impl Into<String>,
        code: Vec<Instruction>,
    ) -> Result<&Handler, ProgramError> {
        let name = name.into();
        if self.handlers.iter().any(|h| h.name() == name) {
            return Err(ProgramError::DuplicateHandler(name));
        }
        self.handlers.push(Handler::new(name, code));
        Ok(self.handlers.last().expect("just pushed"))
    }

    pub fn find_handler(&self, name: &str) -> Option<&Handler> {
        self.handlers.iter().find(|h| h.name() == name)
    }

    /// Indexed handler access, used by `IMOV`-loaded handler references.
    pub fn handler(&self, index: usize) -> Option<&Handler> {
        self.handlers.get(index)
    }

    pub fn handlers(&self) -> &[Handler] {
        &self.handlers
    }

    pub(crate) fn native_handler(&self, index: usize) -> Option<&Callback> {
        self.native_handlers.get(index).copied().flatten()
    }

    pub(crate) fn native_function(&self, index: usize) -> Option<&Callback> {
        self.native_functions.get(index).copied().flatten()
    }

    /// Link against a runtime, exactly once. Steps (per `spec.md` §4.2):
    ///
    /// 1. Call `runtime.import` for each module-pool entry, in order.
    /// 2. Resolve every handler signature against the runtime's registry.
    /// 3. Resolve every function signature against the runtime's registry.
    /// 4. Compile every regex-pool entry.
    ///
    /// Returns `true` iff there were zero failures across all four steps.
    /// Partial linking never happens: a `false` return leaves every
    /// native-symbol slot that failed to resolve as `None`, and the caller
    /// must not spawn a `Runner` from this program (`spec.md` §4.2:
    /// "invoking a Runner on the Program is a programmer error").
    pub fn link(&mut self, runtime: &'rt mut dyn Runtime) -> bool {
        self.link_report(runtime).is_success()
    }

    /// As [`Program::link`], but returns the full per-failure detail.
    pub fn link_report(&mut self, runtime: &'rt mut dyn Runtime) -> LinkReport {
        let mut failures = Vec::new();

        for module in self.modules.iter() {
            if !runtime.import(&module.name, &module.path) {
                tracing::error!(module = %module.name, "module import failed");
                failures.push(LinkError::ImportFailed(module.name.clone()));
            }
        }

        // Freeze the mutable borrow into a shared one for the remainder of
        // `'rt`: every remaining step only needs `Runtime::find`, and the
        // callback references we store below must live as long as `'rt`.
        let runtime: &'rt dyn Runtime = &*runtime;

        self.native_handlers = self
            .handler_signatures
            .iter()
            .map(|sig| {
                let key = sig.to_string();
                let found = runtime.find(&key);
                if found.is_none() {
                    tracing::warn!(signature = %key, "unresolved native handler");
                    failures.push(LinkError::UnresolvedNativeSymbol(key));
                }
                found
            })
            .collect();

        self.native_functions = self
            .function_signatures
            .iter()
            .map(|sig| {
                let key = sig.to_string();
                let found = runtime.find(&key);
                if found.is_none() {
                    tracing::warn!(signature = %key, "unresolved native function");
                    failures.push(LinkError::UnresolvedNativeSymbol(key));
                }
                found
            })
            .collect();

        failures.extend(self.regexes.compile_all());

        self.linked = failures.is_empty();
        LinkReport { failures }
    }

    /// Create a runner for the named handler, or `None` if no such handler
    /// exists.
    pub fn create_runner(&self, handler_name: &str) -> Option<Runner<'_, 'rt>> {
        self.find_handler(handler_name).map(|h| h.create_runner(self))
    }

    /// Diagnostic dump of all pools and handlers.
    pub fn dump(&self, out: &mut dyn io::Write) -> io::Result<()> {
        use itertools::Itertools;

        writeln!(out, "; integers: {}", self.integers.len())?;
        writeln!(out, "; strings: {}", self.strings.len())?;
        writeln!(out, "; regexes: {}", self.regexes.len())?;
        writeln!(out, "; modules: {}", self.modules.len())?;
        writeln!(out, "; handlers: {}", self.handlers.iter().map(Handler::name).join(", "))?;
        for handler in &self.handlers {
            writeln!(out, ".handler {} ({} registers)", handler.name(), handler.register_count())?;
            write!(out, "{}", handler.disassemble())?;
        }
        Ok(())
    }
}

/// Build a [`ModulePool`] from `(name, path)` pairs; a thin convenience over
/// `ModulePool::new` that most callers reach for since the pool otherwise
/// requires constructing `ModuleImport` values by hand.
pub fn modules_from_pairs(pairs: impl IntoIterator<Item = (String, String)>) -> ModulePool {
    ModulePool::new(pairs.into_iter().map(|(name, path)| ModuleImport { name, path }).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::CallbackRegistry;
    use crate::signature::Type;
    use gatevm_asm::{instr_imm, Opcode};

    fn empty_pools() -> (IntegerPool, StringPool, RegexPool, ModulePool) {
        (IntegerPool::new(vec![]), StringPool::new(vec![]), RegexPool::new(vec![]), ModulePool::new(vec![]))
    }

    #[test]
    fn duplicate_handler_names_are_rejected() {
        let (ints, strs, regexes, modules) = empty_pools();
        let mut program = Program::new(ints, strs, regexes, modules, vec![], vec![]).unwrap();
        program.create_handler("h", vec![instr_imm(Opcode::Exit, 1)]).unwrap();
        let err = program.create_handler("h", vec![instr_imm(Opcode::Exit, 0)]).unwrap_err();
        assert!(matches!(err, ProgramError::DuplicateHandler(name) if name == "h"));
    }

    #[test]
    fn link_reports_every_unresolved_symbol() {
        let (ints, strs, regexes, modules) = empty_pools();
        let mut program =
            Program::new(ints, strs, regexes, modules, vec!["assert(BS)B".into()], vec!["print(S)I".into()])
                .unwrap();
        let mut runtime = CallbackRegistry::new();
        let report = program.link_report(&mut runtime);
        assert_eq!(report.failures.len(), 2);
        assert!(!program.is_linked());
    }

    #[test]
    fn link_succeeds_when_every_symbol_resolves() {
        let (ints, strs, regexes, modules) = empty_pools();
        let mut program =
            Program::new(ints, strs, regexes, modules, vec![], vec!["print(S)I".into()]).unwrap();
        let mut runtime = CallbackRegistry::new();
        runtime.register_function("print", vec![Type::String], Type::Number, |_, argv, _| {
            argv[0] = 1;
        });
        assert!(program.link(&mut runtime));
        assert!(program.is_linked());
    }
}
