//! Lookup tables the root slicer/unslicer stacks consult to find the
//! right handler for a value (encode side) or an opentype (decode
//! side), and the unsafe-mode class table.

use std::collections::HashMap;

use crate::value::Instance;

/// Whether a connection accepts/emits unsafe-mode values: arbitrary
/// class instances, modules, functions, methods, and classes named by
/// string, reconstructed via the reduction protocol. Safe mode — the
/// default — rejects all of them with
/// [`crate::error::Violation::CannotSerialize`] on encode and a
/// schema-mismatch [`crate::error::Violation`] on decode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    /// Reject `instance`/`module`/`class`/`function`/`method` values
    /// and opentypes entirely.
    #[default]
    Safe,
    /// Accept them, consulting [`ClassRegistry`] to decide which class
    /// names are reconstructible on decode.
    Unsafe,
}

/// A class known to this endpoint's unsafe-mode `ClassRegistry`.
///
/// `Unsafe` mode lets the peer name arbitrary classes by string and
/// have them reconstructed via the reduction protocol. That
/// is only safe when the receiving application has explicitly opted a
/// class into this registry; unregistered class names fail unslicing
/// with `BananaError::UnknownPickleProtocol`-adjacent rejection at the
/// `Instance` unslicer rather than being constructed blind.
pub struct ClassRegistry {
    constructors: HashMap<String, Box<dyn Fn(&Instance) -> Instance>>,
}

impl std::fmt::Debug for ClassRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClassRegistry")
            .field("classes", &self.constructors.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl Default for ClassRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ClassRegistry {
    /// An empty registry: no class names are accepted in unsafe mode
    /// until registered.
    #[must_use]
    pub fn new() -> Self {
        Self { constructors: HashMap::new() }
    }

    /// Register a class name as acceptable for unsafe-mode unslicing.
    /// `rebuild` is given the raw reduction-protocol pieces and may
    /// normalize or validate them; the registry does not itself
    /// instantiate a live Rust type, since that is the caller's
    /// domain-specific concern.
    pub fn register(&mut self, class_name: impl Into<String>, rebuild: impl Fn(&Instance) -> Instance + 'static) {
        self.constructors.insert(class_name.into(), Box::new(rebuild));
    }

    /// Whether `class_name` has been registered.
    #[must_use]
    pub fn is_registered(&self, class_name: &str) -> bool {
        self.constructors.contains_key(class_name)
    }

    /// Apply the registered rebuild hook for `class_name`, if any.
    #[must_use]
    pub fn rebuild(&self, class_name: &str, instance: &Instance) -> Option<Instance> {
        self.constructors.get(class_name).map(|f| f(instance))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{cell::RefCell, rc::Rc};

    use crate::value::ReduceProtocol;

    fn sample_instance() -> Instance {
        Instance {
            protocol: ReduceProtocol::Two,
            class_name: "demo.Widget".to_string(),
            args: Rc::new(RefCell::new(Vec::new())),
            kwargs: None,
            state: Rc::new(RefCell::new(Vec::new())),
            list_items: Rc::new(RefCell::new(Vec::new())),
            dict_items: Rc::new(RefCell::new(Vec::new())),
        }
    }

    #[test]
    fn unregistered_class_is_rejected() {
        let registry = ClassRegistry::new();
        assert!(!registry.is_registered("demo.Widget"));
        assert!(registry.rebuild("demo.Widget", &sample_instance()).is_none());
    }

    #[test]
    fn registered_class_rebuilds() {
        let mut registry = ClassRegistry::new();
        registry.register("demo.Widget", |inst| inst.clone());
        assert!(registry.is_registered("demo.Widget"));
        assert!(registry.rebuild("demo.Widget", &sample_instance()).is_some());
    }
}
