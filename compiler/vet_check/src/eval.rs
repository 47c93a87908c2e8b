//! The evaluator: drives nodes through their stages without recursion.
//!
//! Each node visit is a `Frame` on an explicit stack. Entering a node runs
//! its own check and plans the child work; the loop then feeds children one
//! at a time and delivers each result back to the waiting parent. Deeply
//! nested values and recursive shapes therefore never grow the native stack.
//!
//! Nodes can live in any context along the parent chain. `levels[0]` is the
//! context being validated; a child reference with `up = n` seen from a frame
//! at level `l` lives at level `l + n`.

use vet_ir::Name;
use vet_types::canonicalize;

use crate::compile::Compiler;
use crate::context::ContextState;
use crate::node::{Job, Node, NodeId, NodeKind, NodeRef, PassEnv, SelfCheck, ValidationResult};
use crate::{ContractError, Value};

pub(crate) struct Evaluator<'l, 's, 'e> {
    levels: &'l mut [&'s mut ContextState],
    env: &'e PassEnv<'e>,
}

struct Frame {
    level: usize,
    node: NodeId,
    input: Value,
    own: SelfCheck,
    jobs: std::vec::IntoIter<Job>,
    results: Vec<ValidationResult>,
    /// Child whose result is awaited.
    pending: Option<NodeRef>,
}

enum Step {
    /// The node finished without needing its children.
    Done(ValidationResult),
    /// The node is waiting on child work.
    Suspended(Frame),
}

impl<'l, 's, 'e> Evaluator<'l, 's, 'e> {
    pub(crate) fn new(levels: &'l mut [&'s mut ContextState], env: &'e PassEnv<'e>) -> Self {
        Evaluator { levels, env }
    }

    /// Evaluate `value` against `root`, seen from level 0.
    pub(crate) fn run(&mut self, root: NodeRef, value: Value) -> Result<ValidationResult, ContractError> {
        let mut stack: Vec<Frame> = Vec::new();
        let mut step = self.enter(root.up as usize, root.id, value)?;
        loop {
            match step {
                Step::Done(result) => {
                    let Some(parent) = stack.last_mut() else {
                        return Ok(result);
                    };
                    self.deliver(parent, result);
                }
                Step::Suspended(frame) => stack.push(frame),
            }
            let top = stack.len() - 1;
            step = match next_child(&mut stack[top]) {
                Some((level, id, value)) => self.enter(level, id, value)?,
                None => {
                    let frame = stack.swap_remove(top);
                    Step::Done(self.finish(frame))
                }
            };
        }
    }

    #[inline]
    fn node(&self, level: usize, id: NodeId) -> &Node {
        &self.levels[level].arena[id.index()]
    }

    #[inline]
    fn node_mut(&mut self, level: usize, id: NodeId) -> &mut Node {
        &mut self.levels[level].arena[id.index()]
    }

    /// Stages 1 to 3: preprocess, own check, and planning.
    fn enter(&mut self, level: usize, id: NodeId, value: Value) -> Result<Step, ContractError> {
        if let NodeKind::ForwardRef { name } = &self.node(level, id).kind {
            if self.node(level, id).children.is_empty() {
                let name = name.clone();
                self.resolve_forward(level, id, &name)?;
            }
        }

        let node = self.node(level, id);
        let value = node.preprocess(value, self.env)?;
        let own = node.self_check(&value, self.env)?;
        tracing::trace!(
            expected = %node.descriptor,
            valid = own.valid,
            shape = %own.shape,
            "node self check"
        );
        if !own.valid && !node.is_container() {
            return Ok(Step::Done(ValidationResult::failed(value, own.shape)));
        }
        let jobs = node.plan(&value, own.valid);
        Ok(Step::Suspended(Frame {
            level,
            node: id,
            input: value,
            own,
            jobs: jobs.into_iter(),
            results: Vec::new(),
            pending: None,
        }))
    }

    /// Hand a child's result to its parent frame.
    ///
    /// A first-match node (a type variable) commits to the first child that
    /// passes and drops the rest of its work.
    fn deliver(&mut self, frame: &mut Frame, result: ValidationResult) {
        let child = frame.pending.take();
        if result.valid && self.node(frame.level, frame.node).is_first_match() {
            if let Some(child) = child {
                self.commit(frame, child, &result);
            }
            frame.jobs = Vec::new().into_iter();
        }
        frame.results.push(result);
    }

    fn commit(&mut self, frame: &Frame, child: NodeRef, result: &ValidationResult) {
        let child_level = frame.level + child.up as usize;
        let (child_is_any, child_descriptor) = {
            let node = self.node(child_level, child.id);
            (node.is_any_leaf(), node.descriptor.clone())
        };

        let type_var = self.node_mut(frame.level, frame.node);
        if !type_var.bound {
            type_var.bound = true;
            type_var.children.clear();
            type_var.children.push(child);
        }
        let NodeKind::TypeVar { name } = &type_var.kind else {
            return;
        };
        let name = name.clone();
        if child_is_any {
            self.node_mut(child_level, child.id).bound = true;
        }

        let binding = if child_is_any {
            canonicalize(&result.value.nominal())
        } else {
            child_descriptor
        };
        tracing::debug!(type_var = %name, binding = %binding, "type variable committed");
        self.levels[frame.level].bindings.insert(name, binding);
    }

    /// Stages 4 and 5: combine child results, describe, and reduce.
    fn finish(&mut self, frame: Frame) -> ValidationResult {
        let Frame {
            level,
            node: id,
            input,
            own,
            results,
            ..
        } = frame;
        let node = self.node(level, id);
        let children_valid = if node.is_choice() {
            results.iter().any(|result| result.valid)
        } else {
            results.iter().all(|result| result.valid)
        };
        let valid = own.valid && children_valid;
        let actual_shape = node.describe(&input, &own, &results, valid);
        let in_shape = (valid && matches!(node.kind, NodeKind::Leaf) && !node.bound)
            .then(|| canonicalize(&input.nominal()));
        let value = if valid {
            node.reduce(input, results)
        } else {
            input
        };
        tracing::trace!(valid, shape = %actual_shape, "node finished");

        if in_shape.is_some() {
            self.node_mut(level, id).in_shape = in_shape;
        }
        ValidationResult {
            valid,
            value,
            actual_shape,
        }
    }

    /// Resolve a forward reference against the validated context's scope,
    /// then the scope of the context that owns it, and compile the target
    /// into the owner.
    fn resolve_forward(&mut self, level: usize, id: NodeId, name: &Name) -> Result<(), ContractError> {
        let target = self.levels[0]
            .scope
            .lookup(name.as_str())
            .or_else(|| self.levels[level].scope.lookup(name.as_str()))
            .cloned()
            .ok_or_else(|| ContractError::UnresolvableForwardReference { name: name.clone() })?;

        let env = self.env;
        let hierarchy = env.settings.hierarchy();
        let (_, rest) = self.levels.split_at_mut(level);
        let Some((owner, above)) = rest.split_first_mut() else {
            return Err(ContractError::UnresolvableForwardReference { name: name.clone() });
        };
        let ancestors: Vec<&ContextState> = above.iter().map(|state| &**state).collect();
        let child = Compiler::new(owner, &ancestors, hierarchy).compile(&target)?;
        owner.arena[id.index()].add_child(child);
        tracing::debug!(%name, %target, "resolved forward reference");
        Ok(())
    }
}

/// Pop the next child job, turning extras into failures on the way.
fn next_child(frame: &mut Frame) -> Option<(usize, NodeId, Value)> {
    for job in frame.jobs.by_ref() {
        match job {
            Job::Eval { child, value } => {
                frame.pending = Some(child);
                return Some((frame.level + child.up as usize, child.id, value));
            }
            Job::Extra { value } => {
                let shape = value.shape_name();
                frame.results.push(ValidationResult::failed(value, shape));
            }
        }
    }
    None
}

#[cfg(test)]
#[expect(clippy::unwrap_used, reason = "Tests use unwrap for brevity")]
mod tests;
