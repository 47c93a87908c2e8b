//! Descriptor to node compilation.
//!
//! Compiles into the arena of one context. Type variables already compiled by
//! an enclosing context are shared instead of recompiled, so a method and its
//! generic owner agree on what `T` is. Forward references are memoized by
//! name before their target is compiled, which is what makes recursive
//! shapes terminate.

use std::sync::Arc;

use vet_ir::{ensure_sufficient_stack, well_known, DefinitionError, Descriptor, TypeVar};
use vet_types::{canonicalize, Hierarchy, Variance};

use crate::context::ContextState;
use crate::generic::bind_params;
use crate::node::{CollectionKind, Node, NodeFlags, NodeId, NodeKind, NodeRef};

pub(crate) struct Compiler<'a> {
    state: &'a mut ContextState,
    /// Enclosing contexts, innermost first.
    ancestors: &'a [&'a ContextState],
    hierarchy: &'a Hierarchy,
}

impl<'a> Compiler<'a> {
    pub(crate) fn new(
        state: &'a mut ContextState,
        ancestors: &'a [&'a ContextState],
        hierarchy: &'a Hierarchy,
    ) -> Self {
        Compiler {
            state,
            ancestors,
            hierarchy,
        }
    }

    pub(crate) fn compile(&mut self, descriptor: &Descriptor) -> Result<NodeRef, DefinitionError> {
        ensure_sufficient_stack(|| self.compile_inner(descriptor))
    }

    fn compile_inner(&mut self, descriptor: &Descriptor) -> Result<NodeRef, DefinitionError> {
        match descriptor {
            // Integers and floats stand in for complex numbers.
            Descriptor::Primitive(name) if name == well_known::COMPLEX => Ok(self.widened(
                descriptor,
                &[well_known::COMPLEX, well_known::INT, well_known::FLOAT],
            )),
            Descriptor::Primitive(name) if name == well_known::BYTES => {
                Ok(self.widened(descriptor, &[well_known::BYTES, well_known::BYTEARRAY]))
            }
            Descriptor::Any | Descriptor::NoneType | Descriptor::Primitive(_) => {
                Ok(self.push(Node::new(
                    NodeKind::Leaf,
                    NodeFlags::empty(),
                    canonicalize(descriptor),
                )))
            }
            Descriptor::Union(members) => {
                let mut distinct: Vec<&Descriptor> = Vec::with_capacity(members.len());
                for member in members {
                    if !distinct.contains(&member) {
                        distinct.push(member);
                    }
                }
                if distinct.len() < 2 {
                    return Err(DefinitionError::DegenerateUnion {
                        found: distinct.len(),
                    });
                }
                let union = self.push(Node::new(
                    NodeKind::Union,
                    NodeFlags::CONTAINER | NodeFlags::CHOICE,
                    canonicalize(descriptor),
                ));
                for member in distinct {
                    let child = self.compile(member)?;
                    self.attach(union, child);
                }
                Ok(union)
            }
            Descriptor::TypeVar(var) => self.type_var(var),
            Descriptor::Tuple { elements, variadic } => {
                if *variadic && elements.len() != 1 {
                    return Err(DefinitionError::VariadicTupleArity {
                        found: elements.len(),
                    });
                }
                let tuple = self.push(Node::new(
                    NodeKind::Tuple {
                        variadic: *variadic,
                    },
                    NodeFlags::CONTAINER,
                    canonicalize(descriptor),
                ));
                for element in elements {
                    let child = self.compile(element)?;
                    self.attach(tuple, child);
                }
                Ok(tuple)
            }
            Descriptor::Record(record) => {
                let node = self.push(Node::new(
                    NodeKind::Record {
                        record: Arc::clone(record),
                    },
                    NodeFlags::CONTAINER,
                    descriptor.clone(),
                ));
                for (_, field) in record.fields() {
                    let child = self.compile(field)?;
                    self.attach(node, child);
                }
                Ok(node)
            }
            Descriptor::Sequence(element) => {
                self.collection(CollectionKind::List, descriptor, element)
            }
            Descriptor::SetOf(element) => self.collection(CollectionKind::Set, descriptor, element),
            Descriptor::Mapping { key, value } => {
                let mapping = self.push(Node::new(
                    NodeKind::Mapping,
                    NodeFlags::empty(),
                    canonicalize(descriptor),
                ));
                let key = self.compile(key)?;
                self.attach(mapping, key);
                let value = self.compile(value)?;
                self.attach(mapping, value);
                Ok(mapping)
            }
            Descriptor::Callable { .. } => Ok(self.push(Node::new(
                NodeKind::Callable,
                NodeFlags::empty(),
                canonicalize(descriptor),
            ))),
            Descriptor::Generic(app) => {
                let hints = bind_params(app, self.hierarchy)?;
                Ok(self.push(Node::new(
                    NodeKind::Generic {
                        expected: Arc::clone(app),
                        hints,
                    },
                    NodeFlags::CONTAINER,
                    descriptor.clone(),
                )))
            }
            Descriptor::ForwardRef(forward) => {
                if let Some(&existing) = self.state.forward_refs.get(&forward.name) {
                    return Ok(existing);
                }
                let node = self.push(Node::new(
                    NodeKind::ForwardRef {
                        name: forward.name.clone(),
                    },
                    NodeFlags::CONTAINER,
                    Descriptor::forward(forward.name.clone()),
                ));
                self.state.forward_refs.insert(forward.name.clone(), node);
                if let Some(target) = &forward.resolved {
                    let child = self.compile(target)?;
                    self.attach(node, child);
                }
                Ok(node)
            }
        }
    }

    /// A nominal type that also admits the listed stand-ins.
    fn widened(&mut self, descriptor: &Descriptor, names: &[&str]) -> NodeRef {
        let union = self.push(Node::new(
            NodeKind::Union,
            NodeFlags::CONTAINER | NodeFlags::CHOICE,
            descriptor.clone(),
        ));
        for name in names {
            let leaf = self.push(Node::new(
                NodeKind::Leaf,
                NodeFlags::empty(),
                Descriptor::named(*name),
            ));
            self.attach(union, leaf);
        }
        union
    }

    fn collection(
        &mut self,
        kind: CollectionKind,
        descriptor: &Descriptor,
        element: &Descriptor,
    ) -> Result<NodeRef, DefinitionError> {
        let node = self.push(Node::new(
            NodeKind::Collection(kind),
            NodeFlags::empty(),
            canonicalize(descriptor),
        ));
        let child = self.compile(element)?;
        self.attach(node, child);
        Ok(node)
    }

    /// One node per type variable name, shared with enclosing contexts.
    fn type_var(&mut self, var: &Arc<TypeVar>) -> Result<NodeRef, DefinitionError> {
        for (depth, ancestor) in self.ancestors.iter().enumerate() {
            if let Some(&shared) = ancestor.type_vars.get(var.name()) {
                let levels = u32::try_from(depth + 1).unwrap_or(u32::MAX);
                return Ok(shared.lifted(levels));
            }
        }
        if let Some(&existing) = self.state.type_vars.get(var.name()) {
            return Ok(existing);
        }

        let variance = Variance {
            covariant: var.is_covariant(),
            contravariant: var.is_contravariant(),
        };
        let mut node = Node::new(
            NodeKind::TypeVar {
                name: var.name().clone(),
            },
            NodeFlags::CONTAINER | NodeFlags::CHOICE | NodeFlags::FIRST_MATCH,
            canonicalize(&Descriptor::TypeVar(Arc::clone(var))),
        );
        node.variance = variance;
        let type_var = self.push(node);
        self.state.type_vars.insert(var.name().clone(), type_var);

        let alternatives: Vec<Descriptor> = match var.bound() {
            Some(bound) => vec![bound.clone()],
            None if var.constraints().is_empty() => vec![Descriptor::Any],
            None => var.constraints().to_vec(),
        };
        for alternative in &alternatives {
            let child = self.compile(alternative)?;
            if child.up == 0 {
                self.state.arena[child.id.index()].variance = variance;
            }
            self.attach(type_var, child);
        }
        Ok(type_var)
    }

    fn push(&mut self, node: Node) -> NodeRef {
        let id = NodeId::new(self.state.arena.len());
        self.state.arena.push(node);
        NodeRef::local(id)
    }

    /// `parent` is always local: it was just pushed by this compiler.
    fn attach(&mut self, parent: NodeRef, child: NodeRef) {
        self.state.arena[parent.id.index()].add_child(child);
    }
}
