//! The process-wide prototype registry.
//!
//! Every REPL entry compiles into a fresh, empty IR module (see
//! [crate::jit]), so a function defined three entries ago is no longer
//! *present* in the module the JIT is about to add. The registry is what
//! lets later modules see it anyway: it remembers every prototype that has
//! ever been declared or defined, and [crate::codegen]'s `get_function`
//! re-materializes a declaration for it in the new module on demand.

use std::collections::{HashMap, HashSet};

use crate::ast::Prototype;

/// Maps function name to the [Prototype] most recently declared or defined
/// for it.
///
/// Grows monotonically for the life of the process: `extern` and `def`
/// insert entries, and nothing ever removes one. A name is never rebound to
/// a prototype of different arity without going through a `def`/`extern` of
/// that name again (the parser doesn't offer any other way to get a
/// [Prototype] in the first place).
#[derive(Debug, Default)]
pub struct PrototypeRegistry {
    protos: HashMap<String, Prototype>,
    /// Names with a function body that has already been lowered and
    /// verified. Tracked separately from `protos`, since the IR declaration
    /// itself lives in whichever module is current and gets replaced by an
    /// empty one on every new module — `count_basic_blocks() != 0` can't be
    /// used to detect "already defined" once the defining module has moved
    /// on.
    defined: HashSet<String>,
}

impl PrototypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a prototype, overwriting any previous entry for the same
    /// name. Used by both `def` (who moves the prototype in before lowering
    /// the body, so recursive calls resolve) and `extern`.
    pub fn insert(&mut self, proto: Prototype) {
        self.protos.insert(proto.name.clone(), proto);
    }

    /// Look up a previously declared or defined prototype by name.
    pub fn get(&self, name: &str) -> Option<&Prototype> {
        self.protos.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.protos.contains_key(name)
    }

    /// Record that `name` now has a verified body. Called once lowering a
    /// `def`'s body succeeds; never unset.
    pub fn mark_defined(&mut self, name: &str) {
        self.defined.insert(name.to_string());
    }

    /// Whether `name` already has a verified body from an earlier `def`.
    pub fn is_defined(&self, name: &str) -> bool {
        self.defined.contains(name)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn proto(name: &str, arity: usize) -> Prototype {
        Prototype {
            name: name.to_string(),
            params: (0..arity).map(|i| format!("p{i}")).collect(),
            is_operator: false,
            precedence: 0,
        }
    }

    #[test]
    fn registry_starts_empty() {
        let reg = PrototypeRegistry::new();
        assert!(!reg.contains("foo"));
        assert_eq!(None, reg.get("foo"));
    }

    #[test]
    fn insert_then_get_round_trips() {
        let mut reg = PrototypeRegistry::new();
        reg.insert(proto("foo", 2));
        assert!(reg.contains("foo"));
        assert_eq!(2, reg.get("foo").unwrap().arity());
    }

    #[test]
    fn later_insert_of_same_name_replaces_entry() {
        let mut reg = PrototypeRegistry::new();
        reg.insert(proto("foo", 1));
        reg.insert(proto("foo", 3));
        assert_eq!(3, reg.get("foo").unwrap().arity());
    }

    #[test]
    fn other_names_are_unaffected() {
        let mut reg = PrototypeRegistry::new();
        reg.insert(proto("foo", 1));
        reg.insert(proto("bar", 2));
        assert_eq!(1, reg.get("foo").unwrap().arity());
        assert_eq!(2, reg.get("bar").unwrap().arity());
    }

    #[test]
    fn defined_tracking_is_independent_of_prototype_storage_and_survives_reinsertion() {
        let mut reg = PrototypeRegistry::new();
        assert!(!reg.is_defined("foo"));

        reg.insert(proto("foo", 1));
        assert!(!reg.is_defined("foo"), "inserting a prototype alone isn't a definition");

        reg.mark_defined("foo");
        assert!(reg.is_defined("foo"));

        // A later re-insert (e.g. a rejected redefinition attempt with a
        // different arity) must not clear the "already defined" marker.
        reg.insert(proto("foo", 2));
        assert!(reg.is_defined("foo"));
    }
}
