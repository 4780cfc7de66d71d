//! Name resolution for references recorded by the extractors.
//!
//! Type names are looked up in the declaring file first, then through
//! single-type and on-demand imports, then the file's package, and finally
//! by a globally unique simple name. Anything still ambiguous stays
//! unresolved.

use std::collections::{BTreeSet, HashSet, VecDeque};

use crate::model::{
    CallLink, EntityId, FileExtraction, RawCall, RawSupertype, Receiver,
    SupertypeLink,
};

/// Read access to the committed index needed during resolution.
pub trait SymbolIndex {
    fn has_class(&self, qualified: &str) -> bool;
    /// Classes whose simple name is `simple`, sorted.
    fn classes_named(&self, simple: &str) -> Vec<EntityId>;
    /// Every overload of `name` declared directly in `class`, sorted.
    fn methods_of(&self, class: &EntityId, name: &str) -> Vec<EntityId>;
    /// Resolved direct supertypes of `class`, sorted.
    fn supertypes(&self, class: &EntityId) -> Vec<EntityId>;
    /// Classes declaring at least one method called `method_name`, sorted.
    fn classes_declaring(&self, method_name: &str) -> Vec<EntityId>;
    fn package_of(&self, class: &EntityId) -> Option<String>;
}

/// Strips generic arguments, array brackets and varargs from a written type.
pub fn normalize_type_name(raw: &str) -> &str {
    let raw = raw.trim();
    let end = raw.find(['<', '[']).unwrap_or(raw.len());
    raw[..end].trim().trim_end_matches("...")
}

pub struct LinkResolver<'a, I: SymbolIndex> {
    index: &'a I,
    file: &'a FileExtraction,
}

impl<'a, I: SymbolIndex> LinkResolver<'a, I> {
    pub fn new(index: &'a I, file: &'a FileExtraction) -> Self {
        Self { index, file }
    }

    pub fn link_supertypes(&self) -> Vec<SupertypeLink> {
        self.file
            .supertypes
            .iter()
            .map(|reference| SupertypeLink {
                reference: reference.clone(),
                target: self.resolve_supertype(reference),
            })
            .collect()
    }

    pub fn link_calls(&self) -> Vec<CallLink> {
        self.file
            .calls
            .iter()
            .map(|call| CallLink {
                call: call.clone(),
                targets: self.resolve_call(call),
            })
            .collect()
    }

    pub fn resolve_supertype(&self, reference: &RawSupertype) -> Option<EntityId> {
        // The class's own nested types are not in scope for its extends clause,
        // so resolution starts from the enclosing class.
        let scope = self
            .file
            .class(&reference.class)
            .and_then(|c| c.enclosing.as_ref());
        self.resolve_type(&reference.name, scope)
            .filter(|target| target != &reference.class)
    }

    /// Resolves a type name as written inside `scope` (a class of this file).
    pub fn resolve_type(&self, raw: &str, scope: Option<&EntityId>) -> Option<EntityId> {
        let name = normalize_type_name(raw);
        if name.is_empty() {
            return None;
        }

        if let Some((head, rest)) = name.split_once('.') {
            if self.index.has_class(name) {
                return Some(EntityId::class(name));
            }
            let outer = self.resolve_simple(head, scope)?;
            let qualified = format!("{}.{}", outer.name, rest);
            return self
                .index
                .has_class(&qualified)
                .then(|| EntityId::class(qualified));
        }

        self.resolve_simple(name, scope)
    }

    fn resolve_simple(&self, name: &str, scope: Option<&EntityId>) -> Option<EntityId> {
        if let Some(local) = self.resolve_in_file(name, scope) {
            return Some(local);
        }

        let explicit: Vec<&str> = self
            .file
            .imports
            .iter()
            .filter(|i| !i.is_static && !i.on_demand && i.simple_name() == name)
            .map(|i| i.path.as_str())
            .collect();
        if let Some(path) = explicit.first() {
            // An import of a type outside the index still shadows everything below.
            return self.index.has_class(path).then(|| EntityId::class(*path));
        }

        let wildcard: BTreeSet<String> = self
            .file
            .imports
            .iter()
            .filter(|i| !i.is_static && i.on_demand)
            .map(|i| format!("{}.{}", i.path, name))
            .filter(|qualified| self.index.has_class(qualified))
            .collect();
        if wildcard.len() == 1 {
            return wildcard.into_iter().next().map(EntityId::class);
        }
        if wildcard.len() > 1 {
            return None;
        }

        if let Some(package) = &self.file.package {
            let qualified = format!("{package}.{name}");
            if self.index.has_class(&qualified) {
                return Some(EntityId::class(qualified));
            }
        } else if self.index.has_class(name) {
            return Some(EntityId::class(name));
        }

        match self.index.classes_named(name).as_slice() {
            [only] => Some(only.clone()),
            _ => None,
        }
    }

    /// Types declared in this file: the scope chain and its member types,
    /// then the file's other classes.
    fn resolve_in_file(&self, name: &str, scope: Option<&EntityId>) -> Option<EntityId> {
        let mut current = scope.and_then(|id| self.file.class(id));
        while let Some(class) = current {
            if class.name == name {
                return Some(class.id.clone());
            }
            if let Some(member) = self
                .file
                .classes
                .iter()
                .find(|c| c.enclosing.as_ref() == Some(&class.id) && c.name == name)
            {
                return Some(member.id.clone());
            }
            current = class.enclosing.as_ref().and_then(|id| self.file.class(id));
        }

        self.file
            .classes
            .iter()
            .filter(|c| c.enclosing.is_none())
            .find(|c| c.name == name)
            .map(|c| c.id.clone())
    }

    /// Candidate targets for a call site. Overloads are not disambiguated:
    /// every method of the chosen class with a matching name is a target.
    pub fn resolve_call(&self, call: &RawCall) -> Vec<EntityId> {
        match &call.receiver {
            Receiver::Enclosing => {
                let mut current = Some(call.scope.clone());
                while let Some(class) = current {
                    let found = self.lookup_in_hierarchy(&class, &call.name);
                    if !found.is_empty() {
                        return found;
                    }
                    current = self
                        .file
                        .class(&class)
                        .and_then(|c| c.enclosing.clone());
                }
                Vec::new()
            }
            Receiver::Super => {
                let mut found = BTreeSet::new();
                for parent in self.index.supertypes(&call.scope) {
                    found.extend(self.lookup_in_hierarchy(&parent, &call.name));
                }
                found.into_iter().collect()
            }
            Receiver::Type(raw) => match self.resolve_type(raw, Some(&call.scope)) {
                Some(class) => self.lookup_in_hierarchy(&class, &call.name),
                None => Vec::new(),
            },
            Receiver::Unknown => self.resolve_unknown_receiver(call),
        }
    }

    fn resolve_unknown_receiver(&self, call: &RawCall) -> Vec<EntityId> {
        let declaring = self.index.classes_declaring(&call.name);
        let visible: Vec<&EntityId> = declaring.iter().filter(|c| self.is_visible(c)).collect();

        let chosen: Vec<&EntityId> = if !visible.is_empty() {
            visible
        } else if declaring.len() == 1 {
            declaring.iter().collect()
        } else {
            return Vec::new();
        };

        let targets: BTreeSet<EntityId> = chosen
            .into_iter()
            .flat_map(|class| self.index.methods_of(class, &call.name))
            .collect();
        targets.into_iter().collect()
    }

    fn is_visible(&self, class: &EntityId) -> bool {
        self.file.class(class).is_some()
            || self
                .file
                .imports
                .iter()
                .any(|i| !i.is_static && !i.on_demand && i.path == class.name)
            || self.index.package_of(class) == self.file.package
    }

    /// Walks `class` and its resolved supertypes breadth-first. The nearest
    /// level declaring `name` wins; cycles are cut by the visited set.
    fn lookup_in_hierarchy(&self, class: &EntityId, name: &str) -> Vec<EntityId> {
        let mut visited: HashSet<EntityId> = HashSet::new();
        let mut level: VecDeque<EntityId> = VecDeque::from([class.clone()]);
        visited.insert(class.clone());

        while !level.is_empty() {
            let mut found = BTreeSet::new();
            let mut next = VecDeque::new();
            for current in level.drain(..) {
                found.extend(self.index.methods_of(&current, name));
                for parent in self.index.supertypes(&current) {
                    if visited.insert(parent.clone()) {
                        next.push_back(parent);
                    }
                }
            }
            if !found.is_empty() {
                return found.into_iter().collect();
            }
            level = next;
        }
        Vec::new()
    }
}
