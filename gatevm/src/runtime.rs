//! The host-provided collaborator a [`crate::program::Program`] links
//! against: module imports plus a registry of native callbacks keyed by
//! signature string.

use crate::runner::Runner;
use crate::signature::{Signature, Type};
use std::collections::HashMap;
use std::fmt;

/// Whether a [`Callback`] is a native function (returns a value into
/// `argv[0]`) or a native handler (whose `argv[0]` is interpreted as an
/// accept/decline flag after the call).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallbackKind {
    Function,
    Handler,
}

/// The native implementation behind a [`Callback`]: `(argc, argv, runner)`.
/// `argv` is the argc/argv window described in `spec.md` §3 — `argv[0]` is
/// the return/accept slot, `argv[1..]` are arguments.
pub type NativeImpl = Box<dyn Fn(i32, &mut [u64], &mut Runner) + Send + Sync>;

/// A registered native function or handler, identified by its
/// [`Signature`].
pub struct Callback {
    signature: Signature,
    kind: CallbackKind,
    implementation: NativeImpl,
}

impl fmt::Debug for Callback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Callback")
            .field("signature", &self.signature.to_string())
            .field("kind", &self.kind)
            .finish()
    }
}

impl Callback {
    pub fn signature(&self) -> &Signature {
        &self.signature
    }

    pub fn kind(&self) -> CallbackKind {
        self.kind
    }

    /// Invoke the callback. `argv[0]` is the return/accept slot.
    pub fn invoke(&self, argc: i32, argv: &mut [u64], runner: &mut Runner) {
        (self.implementation)(argc, argv, runner)
    }
}

/// The interface the core consumes: module imports plus callback lookup by
/// signature string.
///
/// `find` is documented in `spec.md` §4.5 as `O(n)` in the source;
/// implementations should back it with a hash table, as [`CallbackRegistry`]
/// does.
pub trait Runtime {
    /// Called once per module-pool entry during linking. A host with no
    /// module concept may simply return `true` unconditionally.
    fn import(&mut self, module_name: &str, module_path: &str) -> bool;

    /// Look up the callback whose signature string equals `signature`.
    fn find(&self, signature: &str) -> Option<&Callback>;
}

/// A hash-table-backed registry of native callbacks, with a fluent builder
/// for registration. Implements [`Runtime`] directly (import always
/// succeeds) so it doubles as the minimal reference host used by this
/// crate's own tests — grounded in `fuel-vm`'s `MemoryStorage`, a minimal
/// in-memory reference implementation of a host-provided storage trait.
#[derive(Default)]
pub struct CallbackRegistry {
    callbacks: HashMap<String, Callback>,
}

impl CallbackRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a native function: `argc` includes the return slot at
    /// `argv[0]`.
    pub fn register_function(
        &mut self,
        name: impl Into<String>,
        args: Vec<Type>,
        return_type: Type,
        implementation: impl Fn(i32, &mut [u64], &mut Runner) + Send + Sync + 'static,
    ) -> &mut Self {
        let signature = Signature::from_parts(name.into(), args, return_type);
        self.insert(signature, CallbackKind::Function, implementation)
    }

    /// Register a native handler: the signature's return type is always
    /// `B` (the accept/decline flag written into `argv[0]` after the call).
    pub fn register_handler(
        &mut self,
        name: impl Into<String>,
        args: Vec<Type>,
        implementation: impl Fn(i32, &mut [u64], &mut Runner) + Send + Sync + 'static,
    ) -> &mut Self {
        let signature = Signature::from_parts(name.into(), args, Type::Boolean);
        self.insert(signature, CallbackKind::Handler, implementation)
    }

    fn insert(
        &mut self,
        signature: Signature,
        kind: CallbackKind,
        implementation: impl Fn(i32, &mut [u64], &mut Runner) + Send + Sync + 'static,
    ) -> &mut Self {
        let key = signature.to_string();
        self.callbacks.insert(
            key,
            Callback { signature, kind, implementation: Box::new(implementation) },
        );
        self
    }

    pub fn len(&self) -> usize {
        self.callbacks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.callbacks.is_empty()
    }
}

impl Runtime for CallbackRegistry {
    fn import(&mut self, _module_name: &str, _module_path: &str) -> bool {
        true
    }

    fn find(&self, signature: &str) -> Option<&Callback> {
        self.callbacks.get(signature)
    }
}

/// Convenience alias: `CallbackRegistry` already is the minimal reference
/// runtime. Named separately so host code can write `SimpleRuntime::new()`
/// without caring that it's the same type as the registration API.
pub type SimpleRuntime = CallbackRegistry;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn find_matches_by_exact_signature_string() {
        let mut reg = CallbackRegistry::new();
        reg.register_function("getcwd", vec![], Type::String, |_, argv, runner| {
            argv[0] = runner.create_string("/tmp".to_string());
        });
        assert!(reg.find("getcwd()S").is_some());
        assert!(reg.find("getcwd(I)S").is_none());
    }

    #[test]
    fn handler_signature_return_type_is_always_boolean() {
        let mut reg = CallbackRegistry::new();
        reg.register_handler("assert", vec![Type::Boolean, Type::String], |_, _, _| {});
        assert!(reg.find("assert(BS)B").is_some());
    }
}
