//! Tests for how the validation mode selects checks.

use rstest::rstest;
use std::sync::Arc;
use yangcheck::data::DataTree;
use yangcheck::schema::{IfFeature, Module, NodeDef, Schema, SchemaId, TypeDef, YangVersion};
use yangcheck::{ErrorCode, ValidationMode, ValidationOptions, Validator};

struct Device {
    schema: Arc<Schema>,
    module: Arc<Module>,
    system: SchemaId,
    hostname: SchemaId,
    uptime: SchemaId,
    turbo: SchemaId,
    reboot: SchemaId,
    delay: SchemaId,
    reason: SchemaId,
    alarm: SchemaId,
}

// system { leaf hostname (mandatory); leaf turbo (if-feature turbo) }
// leaf uptime (config false)
// rpc reboot { input { leaf delay (mandatory); leaf reason } output { leaf result (mandatory) } }
// notification alarm { leaf severity (mandatory) }
fn device() -> Device {
    let ex = Module::new("ex", YangVersion::V1_1)
        .with_feature("turbo", false)
        .into_shared();
    let string = Arc::new(TypeDef::string());
    let mut b = Schema::builder();
    let system = b.add(None, &ex, NodeDef::container("system"));
    let hostname = b.add(
        Some(system),
        &ex,
        NodeDef::leaf("hostname", Arc::clone(&string)).mandatory(true),
    );
    let turbo = b.add(
        Some(system),
        &ex,
        NodeDef::leaf("turbo", Arc::new(TypeDef::boolean()))
            .if_feature(IfFeature::feature(&ex, "turbo")),
    );
    let uptime = b.add(
        None,
        &ex,
        NodeDef::leaf("uptime", Arc::new(TypeDef::uint())).config(false),
    );
    let reboot = b.add(None, &ex, NodeDef::rpc("reboot"));
    let input = b.add(Some(reboot), &ex, NodeDef::input());
    let delay = b.add(
        Some(input),
        &ex,
        NodeDef::leaf("delay", Arc::new(TypeDef::uint())).mandatory(true),
    );
    let reason = b.add(Some(input), &ex, NodeDef::leaf("reason", Arc::clone(&string)));
    let output = b.add(Some(reboot), &ex, NodeDef::output());
    b.add(
        Some(output),
        &ex,
        NodeDef::leaf("result", Arc::clone(&string)).mandatory(true),
    );
    let alarm = b.add(None, &ex, NodeDef::notification("alarm"));
    b.add(
        Some(alarm),
        &ex,
        NodeDef::leaf("severity", string).mandatory(true),
    );

    Device {
        schema: Arc::new(b.build().unwrap()),
        module: ex,
        system,
        hostname,
        uptime,
        turbo,
        reboot,
        delay,
        reason,
        alarm,
    }
}

fn codes(mode: ValidationMode, tree: &mut DataTree) -> Vec<ErrorCode> {
    Validator::new(ValidationOptions::new(mode))
        .validate_tree(tree)
        .unwrap()
        .into_result()
        .err()
        .map(|errors| errors.iter().map(|e| e.code).collect())
        .unwrap_or_default()
}

#[rstest]
#[case::data(ValidationMode::Data, false)]
#[case::config(ValidationMode::Config, true)]
#[case::get_config(ValidationMode::GetConfig, true)]
#[case::edit(ValidationMode::Edit, true)]
#[case::get(ValidationMode::Get, false)]
#[case::filter(ValidationMode::Filter, false)]
fn test_state_data_by_mode(#[case] mode: ValidationMode, #[case] rejected: bool) {
    let d = device();
    let mut tree = DataTree::new(Arc::clone(&d.schema));
    let system = tree.insert_inner(None, d.system).unwrap();
    tree.insert_leaf(Some(system), d.hostname, "core1").unwrap();
    tree.insert_leaf(None, d.uptime, "3600").unwrap();

    let expected = if rejected {
        vec![ErrorCode::ReadOnlyInEditableContext]
    } else {
        Vec::new()
    };
    assert_eq!(codes(mode, &mut tree), expected);
}

#[rstest]
#[case::data(ValidationMode::Data, true)]
#[case::config(ValidationMode::Config, true)]
#[case::get_config(ValidationMode::GetConfig, false)]
#[case::edit(ValidationMode::Edit, false)]
#[case::get(ValidationMode::Get, false)]
#[case::filter(ValidationMode::Filter, false)]
fn test_mandatory_by_mode(#[case] mode: ValidationMode, #[case] reported: bool) {
    let d = device();
    let mut tree = DataTree::new(Arc::clone(&d.schema));
    tree.insert_inner(None, d.system).unwrap();

    assert_eq!(
        codes(mode, &mut tree).contains(&ErrorCode::MissingMandatory),
        reported
    );
}

#[test]
fn test_absent_non_presence_container_still_needs_its_mandatory_leaf() {
    let d = device();
    let mut tree = DataTree::new(Arc::clone(&d.schema));

    let errors = Validator::new(ValidationOptions::default())
        .validate_tree(&mut tree)
        .unwrap()
        .into_result()
        .unwrap_err();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors.first().path.to_string(), "/ex:system/hostname");
}

#[rstest]
#[case::request(ValidationMode::Rpc, "/ex:reboot/delay")]
#[case::reply(ValidationMode::RpcReply, "/ex:reboot/result")]
fn test_operation_side_selects_mandatory_payload(
    #[case] mode: ValidationMode,
    #[case] missing: &str,
) {
    let d = device();
    let mut tree = DataTree::new(Arc::clone(&d.schema));
    tree.insert_inner(None, d.reboot).unwrap();

    let errors = Validator::new(ValidationOptions::new(mode))
        .validate_tree(&mut tree)
        .unwrap()
        .into_result()
        .unwrap_err();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors.first().code, ErrorCode::MissingMandatory);
    assert_eq!(errors.first().path.to_string(), missing);
}

#[test]
fn test_rpc_payload_must_follow_schema_order() {
    let d = device();
    let mut tree = DataTree::new(Arc::clone(&d.schema));
    let reboot = tree.insert_inner(None, d.reboot).unwrap();
    tree.insert_leaf(Some(reboot), d.reason, "upgrade").unwrap();
    tree.insert_leaf(Some(reboot), d.delay, "10").unwrap();

    assert_eq!(
        codes(ValidationMode::Rpc, &mut tree),
        vec![ErrorCode::OutOfOrderElement]
    );

    let mut ordered = DataTree::new(Arc::clone(&d.schema));
    let reboot = ordered.insert_inner(None, d.reboot).unwrap();
    ordered.insert_leaf(Some(reboot), d.delay, "10").unwrap();
    ordered.insert_leaf(Some(reboot), d.reason, "upgrade").unwrap();
    assert!(codes(ValidationMode::Rpc, &mut ordered).is_empty());
}

#[test]
fn test_notification_payload() {
    let d = device();
    let mut tree = DataTree::new(Arc::clone(&d.schema));
    tree.insert_inner(None, d.alarm).unwrap();

    assert_eq!(
        codes(ValidationMode::Notification, &mut tree),
        vec![ErrorCode::MissingMandatory]
    );
}

#[test]
fn test_feature_toggle_applies_to_next_validation() {
    let d = device();
    let mut tree = DataTree::new(Arc::clone(&d.schema));
    let system = tree.insert_inner(None, d.system).unwrap();
    tree.insert_leaf(Some(system), d.hostname, "core1").unwrap();
    tree.insert_leaf(Some(system), d.turbo, "true").unwrap();

    assert_eq!(
        codes(ValidationMode::Data, &mut tree),
        vec![ErrorCode::DisabledNode]
    );

    d.module.set_feature("turbo", true).unwrap();
    assert!(codes(ValidationMode::Data, &mut tree).is_empty());
}

#[test]
fn test_mandatory_anydata() {
    let ex = Module::new("ex", YangVersion::V1_1).into_shared();
    let mut b = Schema::builder();
    let blob = b.add(None, &ex, NodeDef::anydata("vendor-data").mandatory(true));
    let mut tree = DataTree::new(Arc::new(b.build().unwrap()));

    assert_eq!(
        codes(ValidationMode::Config, &mut tree),
        vec![ErrorCode::MissingMandatory]
    );

    tree.insert_any(None, blob, serde_json::json!({ "acme:fan": { "rpm": 4200 } }))
        .unwrap();
    assert!(codes(ValidationMode::Config, &mut tree).is_empty());
}
