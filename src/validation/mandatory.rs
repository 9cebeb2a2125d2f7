//! Presence checks: mandatory nodes and element counts.
//!
//! Unlike the per-node checks these look at what is *missing*, so they run
//! once over the finished tree.

use std::sync::Arc;

use crate::data::{DataTree, NodeId};
use crate::error::{Error, ErrorCode, ValidationError};
use crate::path::DataPath;
use crate::resolver::Resolver;
use crate::schema::{NodeKind, Schema, SchemaId};

use super::options::{ValidationMode, ValidationOptions};

struct Presence<'a> {
    tree: &'a DataTree,
    schema: Arc<Schema>,
    options: &'a ValidationOptions,
    resolver: &'a dyn Resolver,
    errors: Vec<ValidationError>,
}

/// Reports absent mandatory nodes and violated min/max-elements.
pub(crate) fn check_presence(
    tree: &DataTree,
    options: &ValidationOptions,
    resolver: &dyn Resolver,
) -> Result<Vec<ValidationError>, Error> {
    if !options.checks_presence() {
        return Ok(Vec::new());
    }
    let mut presence = Presence {
        tree,
        schema: Arc::clone(tree.schema()),
        options,
        resolver,
        errors: Vec::new(),
    };

    if options.is_operation() {
        // only the payload of operations present in the tree is checked
        for root in tree.roots() {
            presence.visit_operations(*root)?;
        }
    } else {
        presence.check_children(None, None)?;
    }
    Ok(presence.errors)
}

impl Presence<'_> {
    fn visit_operations(&mut self, node: NodeId) -> Result<(), Error> {
        let sid = self.tree.node(node)?.schema();
        if self.schema.node(sid).kind().is_operation() {
            return self.check_children(Some(node), Some(sid));
        }
        let tree = self.tree;
        for child in tree.children(Some(node)) {
            self.visit_operations(*child)?;
        }
        Ok(())
    }

    fn child_path(&self, parent: Option<NodeId>, child: SchemaId) -> Result<DataPath, Error> {
        let child_node = self.schema.node(child);
        let (base, parent_module) = match parent {
            Some(p) => (self.tree.path(p)?, Some(self.tree.schema_node(p)?.module().name())),
            None => (DataPath::root(), None),
        };
        let module = child_node.module().name();
        let qualifier = (parent_module != Some(module)).then_some(module);
        Ok(base.push_node(qualifier, child_node.name()))
    }

    /// Whether `id` is disabled, conditional, or on the wrong side of an
    /// operation for the current mode.
    fn exempt(&self, id: SchemaId) -> bool {
        let schema = &self.schema;
        let own = std::iter::once(id).chain(
            schema
                .ancestors(id)
                .take_while(|a| !schema.node(*a).kind().is_instantiable()),
        );
        for s in own {
            let node = schema.node(s);
            if node.when().is_some()
                || !node
                    .if_features()
                    .iter()
                    .all(|f| self.resolver.resolve_if_feature(f))
            {
                return true;
            }
            match (node.kind(), self.options.mode) {
                (NodeKind::Output, ValidationMode::Rpc) => return true,
                (NodeKind::Input, ValidationMode::RpcReply) => return true,
                _ => {}
            }
        }

        let node = schema.node(id);
        node.kind().is_operation()
            || (self.options.is_config_only() && !node.is_config())
    }

    /// Whether `id` sits in a case none of whose data is present under `parent`.
    fn in_unselected_case(&self, parent: Option<NodeId>, id: SchemaId) -> bool {
        let mut current = id;
        while let Some((choice, case)) = self.schema.choice_context(current) {
            let selected = self.tree.children(parent).iter().any(|c| {
                self.tree
                    .get(*c)
                    .and_then(|n| self.schema.case_within(n.schema(), choice))
                    == Some(case)
            });
            if !selected {
                return true;
            }
            current = choice;
        }
        false
    }

    fn missing(&mut self, parent: Option<NodeId>, id: SchemaId, what: &str) -> Result<(), Error> {
        let path = self.child_path(parent, id)?;
        self.errors.push(ValidationError::new(
            path,
            ErrorCode::MissingMandatory,
            format!("missing mandatory {} '{}'", what, self.schema.node(id).name()),
        ));
        Ok(())
    }

    fn check_children(
        &mut self,
        parent: Option<NodeId>,
        parent_schema: Option<SchemaId>,
    ) -> Result<(), Error> {
        self.check_choices(parent, parent_schema)?;

        let schema = Arc::clone(&self.schema);
        for id in schema.data_children(parent_schema) {
            if self.exempt(id) || self.in_unselected_case(parent, id) {
                continue;
            }
            let node = schema.node(id);
            let instances = self.tree.instances_of(parent, id);

            match node.kind() {
                NodeKind::Leaf | NodeKind::AnyData | NodeKind::AnyXml => {
                    if node.is_mandatory() && instances.is_empty() {
                        let what = if node.kind() == NodeKind::Leaf { "leaf" } else { "node" };
                        self.missing(parent, id, what)?;
                    }
                }
                NodeKind::List | NodeKind::LeafList => {
                    self.check_count(parent, id, &instances)?;
                    if node.kind() == NodeKind::List {
                        for entry in &instances {
                            self.check_children(Some(*entry), Some(id))?;
                        }
                    }
                }
                NodeKind::Container => match instances.first() {
                    Some(container) => self.check_children(Some(*container), Some(id))?,
                    None if !node.is_presence() => self.check_absent(parent, id)?,
                    None => {}
                },
                _ => {}
            }
        }
        Ok(())
    }

    fn check_count(
        &mut self,
        parent: Option<NodeId>,
        id: SchemaId,
        instances: &[NodeId],
    ) -> Result<(), Error> {
        let schema = Arc::clone(&self.schema);
        let Some((min, max)) = schema.node(id).cardinality() else {
            return Ok(());
        };
        let count = instances.len();
        let name = schema.node(id).name();

        if count < min as usize {
            let path = match instances.first() {
                Some(first) => self.tree.path(*first)?,
                None => self.child_path(parent, id)?,
            };
            self.errors.push(
                ValidationError::new(
                    path,
                    ErrorCode::TooFewInstances,
                    format!("too few instances of '{}'", name),
                )
                .with_expected(format!("at least {min}"))
                .with_got(count.to_string()),
            );
        }
        if let Some(max) = max {
            if count > max as usize {
                self.errors.push(
                    ValidationError::new(
                        self.tree.path(instances[max as usize])?,
                        ErrorCode::TooManyInstances,
                        format!("too many instances of '{}'", name),
                    )
                    .with_expected(format!("at most {max}"))
                    .with_got(count.to_string()),
                );
            }
        }
        Ok(())
    }

    /// Mandatory choices directly under `parent_schema`, looking through
    /// cases of enclosing choices.
    fn check_choices(
        &mut self,
        parent: Option<NodeId>,
        parent_schema: Option<SchemaId>,
    ) -> Result<(), Error> {
        let schema = Arc::clone(&self.schema);
        let mut stack = match parent_schema {
            Some(p) => schema.node(p).children().to_vec(),
            None => schema.roots().to_vec(),
        };
        while let Some(id) = stack.pop() {
            let node = schema.node(id);
            match node.kind() {
                NodeKind::Choice => {
                    stack.extend(node.children());
                    if !node.is_mandatory() || self.exempt(id) || self.in_unselected_case(parent, id)
                    {
                        continue;
                    }
                    let present = self.tree.children(parent).iter().any(|c| {
                        self.tree
                            .get(*c)
                            .is_some_and(|n| schema.case_within(n.schema(), id).is_some())
                    });
                    if !present {
                        self.missing(parent, id, "choice")?;
                    }
                }
                NodeKind::Case | NodeKind::Uses => stack.extend(node.children()),
                NodeKind::Input if self.options.mode != ValidationMode::RpcReply => {
                    stack.extend(node.children())
                }
                NodeKind::Output if self.options.mode == ValidationMode::RpcReply => {
                    stack.extend(node.children())
                }
                _ => {}
            }
        }
        Ok(())
    }

    /// Everything mandatory below an absent non-presence container is missing.
    fn check_absent(&mut self, parent: Option<NodeId>, container: SchemaId) -> Result<(), Error> {
        let schema = Arc::clone(&self.schema);
        let base = self.child_path(parent, container)?;
        let mut stack = vec![(container, base)];

        while let Some((schema_parent, path)) = stack.pop() {
            for id in schema.data_children(Some(schema_parent)) {
                if self.exempt(id) || schema.choice_context(id).is_some() {
                    continue;
                }
                let node = schema.node(id);
                let module = node.module().name();
                let qualifier = (schema.node(schema_parent).module().name() != module)
                    .then_some(module);
                let child = path.push_node(qualifier, node.name());

                match node.kind() {
                    NodeKind::Leaf | NodeKind::AnyData | NodeKind::AnyXml if node.is_mandatory() => {
                        self.errors.push(ValidationError::new(
                            child,
                            ErrorCode::MissingMandatory,
                            format!("missing mandatory node '{}'", node.name()),
                        ));
                    }
                    NodeKind::List | NodeKind::LeafList => {
                        if let Some((min, _)) = node.cardinality().filter(|(min, _)| *min > 0) {
                            self.errors.push(
                                ValidationError::new(
                                    child,
                                    ErrorCode::TooFewInstances,
                                    format!("too few instances of '{}'", node.name()),
                                )
                                .with_expected(format!("at least {min}"))
                                .with_got("0"),
                            );
                        }
                    }
                    NodeKind::Container if !node.is_presence() => stack.push((id, child)),
                    _ => {}
                }
            }
        }
        Ok(())
    }
}
