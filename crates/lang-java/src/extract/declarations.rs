use jindex_core::model::{
    ClassEntity, ClassFlavor, EntityId, FieldEntity, MethodEntity, RawSupertype, SuperRelation,
};
use tree_sitter::Node;

use super::{Extractor, PendingBody, range_of};
use crate::naming::{compact_type, erase_type, method_name, qualify};

pub(super) fn is_type_declaration(kind: &str) -> bool {
    flavor_of(kind).is_some()
}

fn flavor_of(kind: &str) -> Option<ClassFlavor> {
    match kind {
        "class_declaration" => Some(ClassFlavor::Class),
        "interface_declaration" => Some(ClassFlavor::Interface),
        "enum_declaration" => Some(ClassFlavor::Enum),
        "record_declaration" => Some(ClassFlavor::Record),
        "annotation_type_declaration" => Some(ClassFlavor::Annotation),
        _ => None,
    }
}

/// A declared parameter or record component.
pub(super) struct Parameter {
    /// Erased type, as it appears in the method id.
    pub erased: String,
    /// Type as written, generics kept.
    pub declared: String,
    pub name: String,
}

impl<'t> Extractor<'t> {
    pub(super) fn declare_type(&mut self, node: Node<'t>, enclosing: Option<&EntityId>) {
        let Some(flavor) = flavor_of(node.kind()) else {
            return;
        };
        let Some(name) = self.field_text(node, "name") else {
            return;
        };
        let scope = match enclosing {
            Some(outer) => Some(outer.name.clone()),
            None => self.out.package.clone(),
        };
        let id = EntityId::class(qualify(scope.as_deref(), name));
        if !self.declare(&id) {
            return;
        }

        let (modifiers, annotations) = self.modifiers(node, &id);
        let type_parameters = self.type_parameters(node);

        let superclass = node
            .child_by_field_name("superclass")
            .and_then(|s| s.named_child(0))
            .map(|t| compact_type(self.text(t)));
        let interfaces = match flavor {
            ClassFlavor::Interface => self.type_list(
                node.children(&mut node.walk())
                    .find(|c| c.kind() == "extends_interfaces"),
            ),
            _ => self.type_list(node.child_by_field_name("interfaces")),
        };

        if let Some(superclass) = &superclass {
            self.out.supertypes.push(RawSupertype {
                class: id.clone(),
                name: superclass.clone(),
                relation: SuperRelation::Extends,
            });
        }
        let relation = match flavor {
            ClassFlavor::Interface => SuperRelation::Extends,
            _ => SuperRelation::Implements,
        };
        for name in &interfaces {
            self.out.supertypes.push(RawSupertype {
                class: id.clone(),
                name: name.clone(),
                relation,
            });
        }

        self.out.classes.push(ClassEntity {
            id: id.clone(),
            name: name.to_string(),
            flavor,
            file: self.out.path.clone(),
            span: range_of(node),
            modifiers,
            annotations,
            type_parameters,
            superclass,
            interfaces,
            enclosing: enclosing.cloned(),
        });

        if flavor == ClassFlavor::Record {
            let components = self.parameters(node.child_by_field_name("parameters"));
            for component in components {
                self.push_field(&id, component.name, component.declared, node, Vec::new());
            }
        }
        if let Some(body) = node.child_by_field_name("body") {
            self.declare_members(body, &id);
        }
    }

    fn declare_members(&mut self, body: Node<'t>, class: &EntityId) {
        let mut cursor = body.walk();
        let members: Vec<Node<'t>> = body.named_children(&mut cursor).collect();
        for member in members {
            match member.kind() {
                "field_declaration" | "constant_declaration" => self.declare_fields(member, class),
                "method_declaration" | "annotation_type_element_declaration" => {
                    self.declare_method(member, class, false)
                }
                "constructor_declaration" | "compact_constructor_declaration" => {
                    self.declare_method(member, class, true)
                }
                "enum_constant" => self.declare_enum_constant(member, class),
                "enum_body_declarations" => self.declare_members(member, class),
                kind if is_type_declaration(kind) => self.declare_type(member, Some(class)),
                _ => {}
            }
        }
    }

    fn declare_fields(&mut self, node: Node<'t>, class: &EntityId) {
        let Some(type_node) = node.child_by_field_name("type") else {
            return;
        };
        let declared = compact_type(self.text(type_node));
        let declarators: Vec<Node<'t>> = node
            .children_by_field_name("declarator", &mut node.walk())
            .collect();
        for declarator in declarators {
            let Some(name) = self.field_text(declarator, "name") else {
                continue;
            };
            let dims = self.field_text(declarator, "dimensions").unwrap_or_default();
            let id = EntityId::field(qualify(Some(&class.name), name));
            if !self.declare(&id) {
                continue;
            }
            let (modifiers, annotations) = self.modifiers(node, &id);
            self.out.fields.push(FieldEntity {
                id,
                name: name.to_string(),
                class: class.clone(),
                file: self.out.path.clone(),
                span: range_of(declarator),
                modifiers,
                annotations,
                type_name: format!("{declared}{}", erase_type(dims)),
            });
        }
    }

    fn declare_enum_constant(&mut self, node: Node<'t>, class: &EntityId) {
        let Some(name) = self.field_text(node, "name") else {
            return;
        };
        let (_, annotations) = self.modifiers(node, &EntityId::field(qualify(Some(&class.name), name)));
        self.push_field(
            class,
            name.to_string(),
            class.simple_name().to_string(),
            node,
            annotations,
        );
    }

    fn push_field(
        &mut self,
        class: &EntityId,
        name: String,
        type_name: String,
        node: Node<'t>,
        annotations: Vec<jindex_core::model::Annotation>,
    ) {
        let id = EntityId::field(qualify(Some(&class.name), &name));
        if !self.declare(&id) {
            return;
        }
        self.out.fields.push(FieldEntity {
            id,
            name,
            class: class.clone(),
            file: self.out.path.clone(),
            span: range_of(node),
            modifiers: Vec::new(),
            annotations,
            type_name,
        });
    }

    fn declare_method(&mut self, node: Node<'t>, class: &EntityId, is_constructor: bool) {
        let name = if is_constructor {
            class.simple_name()
        } else {
            match self.field_text(node, "name") {
                Some(name) => name,
                None => return,
            }
        };
        let parameters = match node.kind() {
            // Compact constructors take the record's components.
            "compact_constructor_declaration" => self.parameters(
                node.parent()
                    .and_then(|body| body.parent())
                    .and_then(|record| record.child_by_field_name("parameters")),
            ),
            _ => self.parameters(node.child_by_field_name("parameters")),
        };
        let erased: Vec<String> = parameters.iter().map(|p| p.erased.clone()).collect();
        let id = EntityId::method(method_name(&class.name, name, &erased));
        if !self.declare(&id) {
            return;
        }

        let (modifiers, annotations) = self.modifiers(node, &id);
        let return_type = if is_constructor {
            None
        } else {
            node.child_by_field_name("type").map(|t| {
                let dims = self.field_text(node, "dimensions").unwrap_or_default();
                format!("{}{}", compact_type(self.text(t)), erase_type(dims))
            })
        };

        self.out.methods.push(MethodEntity {
            id: id.clone(),
            name: name.to_string(),
            class: class.clone(),
            file: self.out.path.clone(),
            span: range_of(node),
            modifiers,
            annotations,
            return_type,
            parameters: parameters.into_iter().map(|p| p.declared).collect(),
            is_constructor,
        });

        if node.child_by_field_name("body").is_some() {
            self.bodies.push(PendingBody {
                caller: id,
                class: class.clone(),
                declaration: node,
            });
        }
    }

    /// Parameters of a `formal_parameters` node, in order. Receiver
    /// parameters (`Foo this`) are not parameters.
    pub(super) fn parameters(&self, node: Option<Node<'t>>) -> Vec<Parameter> {
        let Some(node) = node else {
            return Vec::new();
        };
        let mut cursor = node.walk();
        let mut out = Vec::new();
        for param in node.named_children(&mut cursor) {
            match param.kind() {
                "formal_parameter" => {
                    let (Some(ty), Some(name)) =
                        (self.field_text(param, "type"), self.field_text(param, "name"))
                    else {
                        continue;
                    };
                    let dims = self.field_text(param, "dimensions").unwrap_or_default();
                    out.push(Parameter {
                        erased: format!("{}{}", erase_type(ty), erase_type(dims)),
                        declared: format!("{}{}", compact_type(ty), erase_type(dims)),
                        name: name.to_string(),
                    });
                }
                "spread_parameter" => {
                    let mut inner = param.walk();
                    let children: Vec<Node<'t>> = param.named_children(&mut inner).collect();
                    let ty = children
                        .iter()
                        .find(|c| !matches!(c.kind(), "modifiers" | "variable_declarator"));
                    let name = children
                        .iter()
                        .find(|c| c.kind() == "variable_declarator")
                        .and_then(|d| self.field_text(*d, "name"));
                    let (Some(ty), Some(name)) = (ty, name) else {
                        continue;
                    };
                    let ty = self.text(*ty);
                    out.push(Parameter {
                        erased: format!("{}...", erase_type(ty)),
                        declared: format!("{}...", compact_type(ty)),
                        name: name.to_string(),
                    });
                }
                _ => {}
            }
        }
        out
    }

    fn type_parameters(&self, node: Node<'t>) -> Vec<String> {
        let Some(params) = node.child_by_field_name("type_parameters") else {
            return Vec::new();
        };
        type_parameter_names(params, self.source)
    }

    fn type_list(&self, node: Option<Node<'t>>) -> Vec<String> {
        let Some(node) = node else {
            return Vec::new();
        };
        let list = if node.kind() == "type_list" {
            Some(node)
        } else {
            node.named_children(&mut node.walk())
                .find(|c| c.kind() == "type_list")
        };
        let Some(list) = list else {
            return Vec::new();
        };
        let mut cursor = list.walk();
        list.named_children(&mut cursor)
            .map(|t| compact_type(self.text(t)))
            .collect()
    }
}

/// Names declared by a `type_parameters` node (`<K, V extends Foo>` -> `K`, `V`).
pub(super) fn type_parameter_names(params: Node<'_>, source: &str) -> Vec<String> {
    let mut cursor = params.walk();
    params
        .named_children(&mut cursor)
        .filter(|p| p.kind() == "type_parameter")
        .filter_map(|p| {
            p.named_children(&mut p.walk())
                .find(|c| matches!(c.kind(), "type_identifier" | "identifier"))
                .and_then(|c| c.utf8_text(source.as_bytes()).ok())
                .map(str::to_string)
        })
        .collect()
}
