//! Command Catalog Tests

use std::collections::HashSet;

use kvwire::protocol::{Command, RequestShape, ResponseShape, ValueKind};
use kvwire::KvError;

// =============================================================================
// Lookup
// =============================================================================

#[test]
fn test_lookup_every_command_by_name() {
    for &cmd in Command::ALL {
        assert_eq!(Command::from_name(cmd.name()), Some(cmd));
    }
}

#[test]
fn test_lookup_is_idempotent() {
    for &cmd in Command::ALL {
        let first = Command::from_name(cmd.name()).unwrap();
        for _ in 0..3 {
            let again = Command::from_name(cmd.name()).unwrap();
            assert_eq!(again, first);
            assert_eq!(again.spec(), first.spec());
            assert_eq!(again.request_shape(), first.request_shape());
            assert_eq!(again.response_shape(), first.response_shape());
        }
    }
}

#[test]
fn test_lookup_is_case_insensitive() {
    assert_eq!(Command::from_name("get"), Some(Command::Get));
    assert_eq!(Command::from_name("mSeT"), Some(Command::MSet));
}

#[test]
fn test_unknown_command() {
    assert_eq!(Command::from_name("NOSUCHCMD"), None);

    let err = "NOSUCHCMD".parse::<Command>().unwrap_err();
    assert!(matches!(err, KvError::UnknownCommand(ref name) if name == "NOSUCHCMD"));
}

#[test]
fn test_names_are_unique() {
    let names: HashSet<&str> = Command::ALL.iter().map(|c| c.name()).collect();
    assert_eq!(names.len(), Command::ALL.len());
}

// =============================================================================
// Shapes
// =============================================================================

#[test]
fn test_known_shapes() {
    assert_eq!(Command::Set.request_shape(), RequestShape::KeyValue);
    assert_eq!(Command::Set.response_shape(), ResponseShape::Status);

    assert_eq!(Command::Get.request_shape(), RequestShape::Key);
    assert_eq!(Command::Get.response_shape(), ResponseShape::Bulk);

    assert_eq!(Command::MSet.request_shape(), RequestShape::BulkSet);
    assert_eq!(Command::MGet.response_shape(), ResponseShape::MultiBulk);

    assert_eq!(
        Command::Incr.response_shape(),
        ResponseShape::Value(ValueKind::Number)
    );
    assert_eq!(
        Command::Exists.response_shape(),
        ResponseShape::Value(ValueKind::Boolean)
    );
    assert_eq!(
        Command::Type.response_shape(),
        ResponseShape::Value(ValueKind::String)
    );
    assert_eq!(Command::Exec.response_shape(), ResponseShape::Aggregate);
    assert_eq!(Command::LRange.request_shape(), RequestShape::KeyNumNum);
    assert_eq!(Command::ZAdd.request_shape(), RequestShape::KeyScoreValue);
}

#[test]
fn test_terminal_commands() {
    let terminal: Vec<Command> = Command::ALL
        .iter()
        .copied()
        .filter(|c| c.is_terminal())
        .collect();
    assert_eq!(terminal, vec![Command::Quit, Command::Shutdown]);
}

#[test]
fn test_arity_matches_bulk_layout() {
    for &cmd in Command::ALL {
        let shape = cmd.request_shape();
        if shape.has_bulk_value() {
            assert!(shape.arity().unwrap() >= 1, "{} has no room for a value", cmd);
        }
    }
}

#[test]
fn test_display_uses_wire_name() {
    assert_eq!(Command::RPopLPush.to_string(), "RPOPLPUSH");
}
