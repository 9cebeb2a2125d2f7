//! Tests for deferred checks: leafrefs, instance-identifiers, `must` and `when`.

use std::sync::Arc;
use yangcheck::data::{DataTree, NodeId};
use yangcheck::resolver::{PathResolver, XPathEvaluator};
use yangcheck::schema::{Module, Must, NodeDef, Schema, SchemaId, TypeDef, When, YangVersion};
use yangcheck::{
    Error, ErrorCode, UnresKind, ValidationErrors, ValidationMode, ValidationOptions, Validator,
    Validity, WorkList,
};

/// Understands just enough XPath for these tests:
/// `. >= N`, `../name = 'value'` and `unknown()`.
struct TinyXPath;

impl XPathEvaluator for TinyXPath {
    fn evaluate(&self, tree: &DataTree, ctx: NodeId, expr: &str) -> Result<Option<bool>, Error> {
        if let Some(min) = expr.strip_prefix(". >= ") {
            let min: u64 = min.parse().map_err(|_| Error::Internal(expr.to_string()))?;
            let value = tree
                .value(ctx)
                .and_then(|v| v.canonical.parse::<u64>().ok())
                .unwrap_or(0);
            return Ok(Some(value >= min));
        }
        if let Some(rest) = expr.strip_prefix("../") {
            let (name, expected) = rest
                .split_once(" = ")
                .ok_or_else(|| Error::Internal(expr.to_string()))?;
            let expected = expected.trim_matches('\'');
            let parent = tree.node(ctx)?.parent();
            let found = tree.children(parent).iter().any(|c| {
                tree.schema_node(*c).is_ok_and(|s| s.name() == name)
                    && tree.value(*c).is_some_and(|v| v.canonical == expected)
            });
            return Ok(Some(found));
        }
        Ok(None)
    }
}

struct Users {
    tree: DataTree,
    user: SchemaId,
    admin: SchemaId,
    fallback: SchemaId,
    pointer: SchemaId,
}

fn users() -> Users {
    let ex = Module::new("ex", YangVersion::V1_1).into_shared();
    let mut b = Schema::builder();
    let user = b.add(None, &ex, NodeDef::leaf_list("user", Arc::new(TypeDef::string())));
    let admin = b.add(None, &ex, NodeDef::leaf("admin", Arc::new(TypeDef::leafref("/ex:user"))));
    let fallback = b.add(
        None,
        &ex,
        NodeDef::leaf(
            "fallback",
            Arc::new(TypeDef::union(vec![
                Arc::new(TypeDef::uint()),
                Arc::new(TypeDef::leafref("/ex:user")),
            ])),
        ),
    );
    let pointer = b.add(
        None,
        &ex,
        NodeDef::leaf("pointer", Arc::new(TypeDef::instance_identifier())),
    );
    Users {
        tree: DataTree::new(Arc::new(b.build().unwrap())),
        user,
        admin,
        fallback,
        pointer,
    }
}

fn errors_of(validator: &Validator, tree: &mut DataTree) -> Option<ValidationErrors> {
    validator.validate_tree(tree).unwrap().into_result().err()
}

#[test]
fn test_leafref_resolves_to_its_target() {
    let mut u = users();
    let alice = u.tree.insert_leaf(None, u.user, "alice").unwrap();
    let admin = u.tree.insert_leaf(None, u.admin, "alice").unwrap();

    assert!(errors_of(&Validator::new(ValidationOptions::default()), &mut u.tree).is_none());
    assert_eq!(u.tree.node(admin).unwrap().leafref_target(), Some(alice));
    assert!(!u.tree.validity(admin).unwrap().contains(Validity::LEAFREF));
}

#[test]
fn test_dangling_leafref_is_promoted_after_the_drain() {
    let mut u = users();
    u.tree.insert_leaf(None, u.user, "alice").unwrap();
    u.tree.insert_leaf(None, u.admin, "alice").unwrap();
    u.tree.insert_leaf(None, u.fallback, "bob").unwrap();

    let errors = errors_of(&Validator::new(ValidationOptions::default()), &mut u.tree).unwrap();
    assert_eq!(errors.len(), 1);
    let error = errors.first();
    assert_eq!(error.code, ErrorCode::LeafrefUnresolved);
    assert_eq!(error.path.to_string(), "/ex:fallback");
    assert_eq!(error.got.as_deref(), Some("bob"));
}

#[test]
fn test_union_member_without_pointer_needs_no_target() {
    let mut u = users();
    u.tree.insert_leaf(None, u.fallback, "7").unwrap();

    assert!(errors_of(&Validator::new(ValidationOptions::default()), &mut u.tree).is_none());
}

#[test]
fn test_targets_may_arrive_after_the_reference() {
    let mut u = users();
    let validator = Validator::new(ValidationOptions::default());
    let mut work = WorkList::new();

    let admin = u.tree.insert_leaf(None, u.admin, "carol").unwrap();
    validator.validate_node(&mut u.tree, admin, &mut work).unwrap();
    validator.validate_node(&mut u.tree, admin, &mut work).unwrap();
    assert_eq!(work.count(UnresKind::Leafref), 1);

    let carol = u.tree.insert_leaf(None, u.user, "carol").unwrap();
    validator.validate_node(&mut u.tree, carol, &mut work).unwrap();

    let result = validator.resolve_deferred(&mut u.tree, &mut work).unwrap();
    assert!(result.is_success());
    assert!(work.is_empty());
    assert_eq!(u.tree.node(admin).unwrap().leafref_target(), Some(carol));
}

#[test]
fn test_instance_identifier_targets() {
    let mut u = users();
    u.tree.insert_leaf(None, u.user, "alice").unwrap();
    let pointer = u
        .tree
        .insert_leaf(None, u.pointer, "/ex:user[.='alice']")
        .unwrap();
    let validator = Validator::new(ValidationOptions::default());
    assert!(errors_of(&validator, &mut u.tree).is_none());

    u.tree.remove(pointer).unwrap();
    u.tree
        .insert_leaf(None, u.pointer, "/ex:user[.='mallory']")
        .unwrap();
    let errors = errors_of(&validator, &mut u.tree).unwrap();
    assert_eq!(errors.first().code, ErrorCode::InstanceIdUnresolved);
}

#[test]
fn test_read_only_views_skip_references() {
    let mut u = users();
    let admin = u.tree.insert_leaf(None, u.admin, "nobody").unwrap();

    let validator = Validator::new(ValidationOptions::new(ValidationMode::Get));
    assert!(errors_of(&validator, &mut u.tree).is_none());
    assert!(u.tree.validity(admin).unwrap().is_ok());
}

#[test]
fn test_trusted_data_schedules_nothing() {
    let mut u = users();
    let admin = u.tree.insert_leaf(None, u.admin, "nobody").unwrap();
    let validator = Validator::new(ValidationOptions::default().with_trusted(true));
    let mut work = WorkList::new();

    validator.validate_node(&mut u.tree, admin, &mut work).unwrap();
    assert!(work.is_empty());
}

struct Link {
    tree: DataTree,
    top: NodeId,
    enabled: SchemaId,
    mtu: SchemaId,
    speed: SchemaId,
    probe: SchemaId,
}

fn link() -> Link {
    let ex = Module::new("ex", YangVersion::V1_1).into_shared();
    let mut b = Schema::builder();
    let top = b.add(None, &ex, NodeDef::container("link"));
    let enabled = b.add(Some(top), &ex, NodeDef::leaf("enabled", Arc::new(TypeDef::boolean())));
    let mtu = b.add(
        Some(top),
        &ex,
        NodeDef::leaf("mtu", Arc::new(TypeDef::uint()))
            .must(Must::new(". >= 68").with_error_message("mtu too small")),
    );
    let speed = b.add(
        Some(top),
        &ex,
        NodeDef::leaf("speed", Arc::new(TypeDef::uint())).when(When::new("../enabled = 'true'")),
    );
    let probe = b.add(
        Some(top),
        &ex,
        NodeDef::leaf("probe", Arc::new(TypeDef::string())).must(Must::new("unknown()")),
    );
    let mut tree = DataTree::new(Arc::new(b.build().unwrap()));
    let top = tree.insert_inner(None, top).unwrap();
    Link {
        tree,
        top,
        enabled,
        mtu,
        speed,
        probe,
    }
}

fn with_xpath() -> Validator {
    let resolver = PathResolver::new().with_xpath(Arc::new(TinyXPath));
    Validator::new(ValidationOptions::default()).with_resolver(Arc::new(resolver))
}

#[test]
fn test_must_violation_uses_error_message() {
    let mut l = link();
    l.tree.insert_leaf(Some(l.top), l.mtu, "40").unwrap();

    let errors = errors_of(&with_xpath(), &mut l.tree).unwrap();
    let error = errors.first();
    assert_eq!(error.code, ErrorCode::MustViolation);
    assert_eq!(error.message, "mtu too small");
    assert_eq!(error.expected.as_deref(), Some(". >= 68"));
    assert_eq!(error.path.to_string(), "/ex:link/mtu");
}

#[test]
fn test_when_gates_existing_nodes() {
    let mut l = link();
    l.tree.insert_leaf(Some(l.top), l.enabled, "false").unwrap();
    l.tree.insert_leaf(Some(l.top), l.speed, "1000").unwrap();
    l.tree.insert_leaf(Some(l.top), l.mtu, "1500").unwrap();

    let errors = errors_of(&with_xpath(), &mut l.tree).unwrap();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors.first().code, ErrorCode::WhenViolation);
    assert_eq!(errors.first().path.to_string(), "/ex:link/speed");

    let mut l = link();
    l.tree.insert_leaf(Some(l.top), l.enabled, "true").unwrap();
    l.tree.insert_leaf(Some(l.top), l.speed, "1000").unwrap();
    assert!(errors_of(&with_xpath(), &mut l.tree).is_none());
}

#[test]
fn test_undecidable_checks_become_unresolved() {
    let mut l = link();
    l.tree.insert_leaf(Some(l.top), l.probe, "x").unwrap();

    let errors = errors_of(&with_xpath(), &mut l.tree).unwrap();
    assert_eq!(errors.first().code, ErrorCode::Unresolved);
}

#[test]
fn test_missing_evaluator_is_an_internal_error() {
    let mut l = link();
    l.tree.insert_leaf(Some(l.top), l.mtu, "1500").unwrap();

    let err = Validator::new(ValidationOptions::default())
        .validate_tree(&mut l.tree)
        .unwrap_err();
    assert!(matches!(err, Error::Internal(_)));
}

/// Records every context it is asked about and fails every expression.
#[derive(Default)]
struct Recording {
    contexts: parking_lot::Mutex<Vec<NodeId>>,
}

impl XPathEvaluator for Recording {
    fn evaluate(&self, _tree: &DataTree, ctx: NodeId, _expr: &str) -> Result<Option<bool>, Error> {
        self.contexts.lock().push(ctx);
        Ok(Some(false))
    }
}

#[test]
fn test_input_must_is_checked_once_on_the_operation() {
    let ex = Module::new("ex", YangVersion::V1_1).into_shared();
    let string = Arc::new(TypeDef::string());
    let mut b = Schema::builder();
    let reboot = b.add(None, &ex, NodeDef::rpc("reboot"));
    let input = b.add(Some(reboot), &ex, NodeDef::input().must(Must::new("delay > 0")));
    let leaves: Vec<SchemaId> = ["delay", "reason", "who"]
        .into_iter()
        .map(|name| b.add(Some(input), &ex, NodeDef::leaf(name, Arc::clone(&string))))
        .collect();
    let mut tree = DataTree::new(Arc::new(b.build().unwrap()));
    let operation = tree.insert_inner(None, reboot).unwrap();
    for leaf in &leaves {
        tree.insert_leaf(Some(operation), *leaf, "x").unwrap();
    }

    let evaluator = Arc::new(Recording::default());
    let resolver = PathResolver::new().with_xpath(Arc::clone(&evaluator) as Arc<dyn XPathEvaluator>);
    let validator =
        Validator::new(ValidationOptions::new(ValidationMode::Rpc)).with_resolver(Arc::new(resolver));

    let errors = errors_of(&validator, &mut tree).unwrap();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors.first().code, ErrorCode::MustViolation);
    assert_eq!(errors.first().path.to_string(), "/ex:reboot");
    assert_eq!(*evaluator.contexts.lock(), vec![operation]);
}
