use std::collections::{HashMap, HashSet};

use jindex_core::model::{EntityId, RawCall, Receiver};
use tree_sitter::Node;

use super::declarations::type_parameter_names;
use super::{Extractor, PendingBody, range_of};
use crate::naming::{erase_type, looks_like_type};

/// What one method body knows about the names it can invoke methods on.
struct CallContext {
    class: EntityId,
    /// Parameters and locals; `None` when declared without a usable type
    /// (`var`, untyped lambda parameters, multi-catch).
    locals: HashMap<String, Option<String>>,
    /// Type variables in scope; a receiver typed by one is unknown.
    type_parameters: HashSet<String>,
}

impl<'t> Extractor<'t> {
    pub(super) fn collect_calls(&mut self, body: &PendingBody<'t>) {
        let mut context = CallContext {
            class: body.class.clone(),
            locals: HashMap::new(),
            type_parameters: self.type_parameters_in_scope(body),
        };
        for param in self.parameters(body.declaration.child_by_field_name("parameters")) {
            context.locals.insert(param.name, Some(param.declared));
        }
        let Some(block) = body.declaration.child_by_field_name("body") else {
            return;
        };
        for node in descendants(block) {
            self.declare_locals(node, &mut context);
        }

        let mut seen = HashSet::new();
        for node in descendants(block) {
            if node.kind() != "method_invocation" {
                continue;
            }
            let Some(name) = self.field_text(node, "name") else {
                continue;
            };
            let arguments = node
                .child_by_field_name("arguments")
                .map(|args| {
                    let mut cursor = args.walk();
                    args.named_children(&mut cursor)
                        .filter(|a| !a.kind().ends_with("comment"))
                        .count()
                })
                .unwrap_or(0);
            let receiver = self.receiver(node.child_by_field_name("object"), &context);
            if !seen.insert((name, arguments, receiver.clone())) {
                continue;
            }
            self.out.calls.push(RawCall {
                caller: body.caller.clone(),
                scope: body.class.clone(),
                name: name.to_string(),
                arguments,
                receiver,
                span: range_of(node),
            });
        }
    }

    fn type_parameters_in_scope(&self, body: &PendingBody<'t>) -> HashSet<String> {
        let mut names: HashSet<String> = body
            .declaration
            .child_by_field_name("type_parameters")
            .map(|p| type_parameter_names(p, self.source))
            .unwrap_or_default()
            .into_iter()
            .collect();
        let mut class = Some(&body.class);
        while let Some(id) = class {
            let Some(entity) = self.out.class(id) else {
                break;
            };
            names.extend(entity.type_parameters.iter().cloned());
            class = entity.enclosing.as_ref();
        }
        names
    }

    fn declare_locals(&self, node: Node<'t>, context: &mut CallContext) {
        let mut declare = |name: &str, ty: Option<String>| {
            context.locals.entry(name.to_string()).or_insert(ty);
        };
        match node.kind() {
            "local_variable_declaration" => {
                let declared = self.field_text(node, "type");
                let declarators: Vec<Node<'t>> = node
                    .children_by_field_name("declarator", &mut node.walk())
                    .collect();
                for declarator in declarators {
                    let Some(name) = self.field_text(declarator, "name") else {
                        continue;
                    };
                    let ty = match declared {
                        Some("var") => declarator
                            .child_by_field_name("value")
                            .filter(|v| v.kind() == "object_creation_expression")
                            .and_then(|v| self.field_text(v, "type"))
                            .map(str::to_string),
                        Some(ty) => {
                            let dims = self.field_text(declarator, "dimensions").unwrap_or_default();
                            Some(format!("{ty}{dims}"))
                        }
                        None => None,
                    };
                    declare(name, ty);
                }
            }
            "enhanced_for_statement" | "resource" => {
                if let Some(name) = self.field_text(node, "name") {
                    let ty = self.field_text(node, "type").filter(|t| *t != "var");
                    declare(name, ty.map(str::to_string));
                }
            }
            "catch_formal_parameter" => {
                let Some(name) = self.field_text(node, "name") else {
                    return;
                };
                let ty = node
                    .named_children(&mut node.walk())
                    .find(|c| c.kind() == "catch_type")
                    .filter(|c| c.named_child_count() == 1)
                    .map(|c| self.text(c).to_string());
                declare(name, ty);
            }
            "instanceof_expression" => {
                if let (Some(ty), Some(name)) =
                    (self.field_text(node, "right"), self.field_text(node, "name"))
                {
                    declare(name, Some(ty.to_string()));
                } else if let Some(pattern) = node
                    .child_by_field_name("pattern")
                    .filter(|p| p.kind() == "type_pattern")
                {
                    let mut cursor = pattern.walk();
                    let parts: Vec<Node<'t>> = pattern.named_children(&mut cursor).collect();
                    if let [ty, name] = parts.as_slice() {
                        declare(self.text(*name), Some(self.text(*ty).to_string()));
                    }
                }
            }
            "lambda_expression" => {
                let Some(params) = node.child_by_field_name("parameters") else {
                    return;
                };
                match params.kind() {
                    "identifier" => declare(self.text(params), None),
                    "inferred_parameters" => {
                        let mut cursor = params.walk();
                        for ident in params.named_children(&mut cursor) {
                            declare(self.text(ident), None);
                        }
                    }
                    _ => {
                        for param in self.parameters(Some(params)) {
                            declare(&param.name, Some(param.declared));
                        }
                    }
                }
            }
            _ => {}
        }
    }

    fn receiver(&self, object: Option<Node<'t>>, context: &CallContext) -> Receiver {
        let Some(object) = object else {
            return Receiver::Enclosing;
        };
        match object.kind() {
            "this" => Receiver::Enclosing,
            "super" => Receiver::Super,
            "identifier" => {
                let name = self.text(object);
                match context.locals.get(name) {
                    Some(Some(ty)) => typed(ty, context),
                    Some(None) => Receiver::Unknown,
                    None => match self.field_type(name, &context.class) {
                        Some(ty) => typed(ty, context),
                        None if looks_like_type(name) => Receiver::Type(name.to_string()),
                        None => Receiver::Unknown,
                    },
                }
            }
            "field_access" => {
                let on_this = object
                    .child_by_field_name("object")
                    .is_some_and(|o| o.kind() == "this");
                if on_this {
                    return self
                        .field_text(object, "field")
                        .and_then(|f| self.field_type(f, &context.class))
                        .map(|ty| typed(ty, context))
                        .unwrap_or(Receiver::Unknown);
                }
                let text = self.text(object);
                if looks_like_type(text) {
                    Receiver::Type(text.to_string())
                } else {
                    Receiver::Unknown
                }
            }
            "scoped_identifier" | "type_identifier" => Receiver::Type(self.text(object).to_string()),
            "object_creation_expression" | "cast_expression" => self
                .field_text(object, "type")
                .map(|ty| typed(ty, context))
                .unwrap_or(Receiver::Unknown),
            "parenthesized_expression" => self.receiver(object.named_child(0), context),
            _ => Receiver::Unknown,
        }
    }

    /// Declared type of a field on the enclosing class chain.
    fn field_type(&self, name: &str, class: &EntityId) -> Option<&str> {
        let mut current = Some(class);
        while let Some(id) = current {
            if let Some(field) = self
                .out
                .fields
                .iter()
                .find(|f| &f.class == id && f.name == name)
            {
                return Some(&field.type_name);
            }
            current = self.out.class(id).and_then(|c| c.enclosing.as_ref());
        }
        None
    }
}

/// Receiver for a value of declared type `ty`. Arrays, primitives and type
/// variables have no indexed methods.
fn typed(ty: &str, context: &CallContext) -> Receiver {
    let erased = erase_type(ty);
    let primitive = !erased.contains('.') && erased.starts_with(|c: char| c.is_lowercase());
    if erased.is_empty()
        || erased.contains('[')
        || erased.ends_with("...")
        || primitive
        || context.type_parameters.contains(&erased)
    {
        return Receiver::Unknown;
    }
    Receiver::Type(erased)
}

/// Every node under `root` in document order, iteratively so long call
/// chains cannot exhaust the stack.
fn descendants(root: Node<'_>) -> Vec<Node<'_>> {
    let mut out = Vec::new();
    let mut stack = vec![root];
    while let Some(node) = stack.pop() {
        out.push(node);
        let mut cursor = node.walk();
        let children: Vec<Node<'_>> = node.named_children(&mut cursor).collect();
        stack.extend(children.into_iter().rev());
    }
    out
}

#[cfg(test)]
mod tests {
    use super::super::test_support::extract;
    use jindex_core::model::{FileExtraction, Receiver};

    fn calls(x: &FileExtraction) -> Vec<(&str, &str, Receiver)> {
        x.calls
            .iter()
            .map(|c| (c.caller.name.as_str(), c.name.as_str(), c.receiver.clone()))
            .collect()
    }

    fn ty(name: &str) -> Receiver {
        Receiver::Type(name.to_string())
    }

    #[test]
    fn receivers_from_this_super_and_implicit_calls() {
        let x = extract(
            "class A extends Base {\n\
               void run() { helper(); this.helper(); super.run(); }\n\
               void helper() {}\n\
             }\n",
        );
        assert_eq!(
            calls(&x),
            vec![
                ("A.run()", "helper", Receiver::Enclosing),
                ("A.run()", "run", Receiver::Super),
            ]
        );
    }

    #[test]
    fn receivers_from_declared_types() {
        let x = extract(
            "import java.util.List;\n\
             class Service {\n\
               private Repo repo;\n\
               void handle(Request req, List<String> names, int count) {\n\
                 Cache cache = Cache.create();\n\
                 var fresh = new Builder<String>();\n\
                 repo.save(req.body());\n\
                 this.repo.flush();\n\
                 cache.put(count);\n\
                 names.add(\"x\");\n\
                 fresh.build();\n\
                 new Mailer().send();\n\
                 util.Strings.trim();\n\
               }\n\
             }\n",
        );
        let got = calls(&x);
        let receivers: Vec<(&str, Receiver)> = got.iter().map(|(_, n, r)| (*n, r.clone())).collect();
        assert_eq!(
            receivers,
            vec![
                ("create", ty("Cache")),
                ("save", ty("Repo")),
                ("body", ty("Request")),
                ("flush", ty("Repo")),
                ("put", ty("Cache")),
                ("add", ty("List")),
                ("build", ty("Builder")),
                ("send", ty("Mailer")),
                ("trim", ty("util.Strings")),
            ]
        );
    }

    #[test]
    fn unknown_receivers() {
        let x = extract(
            "class A<T> {\n\
               <E> void run(T item, E other, int[] xs, String... rest) {\n\
                 item.go();\n\
                 other.go();\n\
                 xs.clone();\n\
                 rest.clone();\n\
                 make().chain();\n\
                 list.forEach(v -> v.accept());\n\
               }\n\
             }\n",
        );
        let unknown: Vec<&str> = x
            .calls
            .iter()
            .filter(|c| c.receiver == Receiver::Unknown)
            .map(|c| c.name.as_str())
            .collect();
        assert_eq!(unknown, vec!["go", "clone", "chain", "forEach", "accept"]);
    }

    #[test]
    fn lambdas_and_anonymous_classes_belong_to_the_enclosing_method() {
        let x = extract(
            "class A {\n\
               void run() {\n\
                 Runnable r = new Runnable() { public void run() { audit(); } };\n\
                 items.forEach((Item i) -> i.close());\n\
               }\n\
             }\n",
        );
        let got = calls(&x);
        assert!(got.iter().all(|(caller, _, _)| *caller == "A.run()"));
        assert!(got.contains(&("A.run()", "audit", Receiver::Enclosing)));
        assert!(got.contains(&("A.run()", "close", ty("Item"))));
    }

    #[test]
    fn repeated_calls_are_recorded_once_with_argument_count() {
        let x = extract(
            "class A { void run() { log(1); log(2); log(1, 2); } void log(int a) {} void log(int a, int b) {} }",
        );
        let logs: Vec<usize> = x
            .calls
            .iter()
            .filter(|c| c.name == "log")
            .map(|c| c.arguments)
            .collect();
        assert_eq!(logs, vec![1, 2]);
    }

    #[test]
    fn calls_outside_method_bodies_are_skipped() {
        let x = extract("class A { static int n = compute(); static { init(); } }");
        assert!(x.calls.is_empty());
    }

    #[test]
    fn outer_class_fields_type_nested_receivers() {
        let x = extract(
            "class Outer { Repo repo; class Inner { void go() { repo.save(); } } }",
        );
        assert_eq!(x.calls[0].receiver, ty("Repo"));
        assert_eq!(x.calls[0].scope.name, "Outer.Inner");
    }
}
