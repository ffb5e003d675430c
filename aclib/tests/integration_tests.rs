//! Integration tests for aclib
//!
//! These exercise the completion protocol end to end: a registry of options,
//! a simulated shell completion request (`COMP_LINE` / `COMP_POINT`), and
//! assertions on the candidate and diagnostic streams.

use serde_json::json;
use serial_test::serial;

use aclib::{
    autocomplete, autocomplete_from_env,
    cli::{build_command, collect_values, values_to_tree},
    parse_option_root, CompletionOutcome, CompletionRequest, OptionSet, OptionSpec,
};

fn complete(set: &OptionSet, line: &str) -> (Vec<u8>, String) {
    let req = CompletionRequest::new(line);
    let mut out = Vec::new();
    let mut err = Vec::new();
    autocomplete(set, &req, &mut out, &mut err).unwrap();
    (out, String::from_utf8(err).unwrap())
}

// ==================== Nested dotted option groups ====================

#[test]
fn test_complete_nested_one_option() {
    let set = OptionSet::with([OptionSpec::new("group1.op")]).unwrap();

    let (out, _) = complete(&set, "tool --group1");
    assert_eq!(out, b"--group1.op");
}

#[test]
fn test_complete_nested_two_options() {
    let set = OptionSet::with([
        OptionSpec::new("group2.op1"),
        OptionSpec::new("group2.op2"),
    ])
    .unwrap();

    let (out, _) = complete(&set, "tool --group2");
    assert_eq!(out, b"--group2.op1\x0b--group2.op2");
}

// ==================== Yes/no toggle flags ====================

#[test]
fn test_toggle_completion() {
    let set = OptionSet::with([
        OptionSpec::toggle("op1"),
        OptionSpec::toggle("op2").with_optional_value(),
        OptionSpec::toggle_with_prefixes("op3", "with-", "without-"),
    ])
    .unwrap();

    let cases: [(&str, &[u8]); 7] = [
        ("--op1", b"--op1"),
        ("--no_op1", b"--no_op1"),
        ("--op2", b"--op2"),
        ("--no_op2", b"--no_op2"),
        ("--op2=", b"true\x0bfalse\x0byes\x0bno"),
        ("--with-op3", b"--with-op3"),
        ("--without-op3", b"--without-op3"),
    ];
    for (arg, expected) in cases {
        let line = format!("tool {}", arg);
        let (out, _) = complete(&set, &line);
        assert_eq!(out, expected, "completing {:?}", line);
    }
}

// ==================== Enum options ====================

#[test]
fn test_complete_enum_by_prefix() {
    let set = OptionSet::with([OptionSpec::enumerated("enum", &["abc", "xyz", "abd"])]).unwrap();

    let (out, _) = complete(&set, "tool --enum=ab");
    assert_eq!(out, b"abc\x0babd");
}

#[test]
fn test_complete_enum_all_choices() {
    let set = OptionSet::with([OptionSpec::enumerated("enum", &["abc", "xyz", "abd"])]).unwrap();

    let (out, _) = complete(&set, "tool --enum=");
    assert_eq!(out, b"abc\x0bxyz\x0babd");
}

// ==================== Nullable types ====================

#[test]
fn test_complete_nullable_types() {
    let set = OptionSet::with([
        OptionSpec::enumerated("enum", &["A", "B"]).nullable(),
        OptionSpec::typed("bool", "bool").nullable(),
    ])
    .unwrap();

    let cases: [(&str, &[u8]); 2] = [
        ("--enum=", b"A\x0bB\x0bnull"),
        ("--bool=", b"true\x0bfalse\x0bnull"),
    ];
    for (arg, expected) in cases {
        let line = format!("tool {}", arg);
        let (out, _) = complete(&set, &line);
        assert_eq!(out, expected, "completing {:?}", line);
    }
}

// ==================== Schema-validated JSON options ====================

#[test]
fn test_json_and_list_options_validate_partial_values() {
    let set = OptionSet::with([
        OptionSpec::json_schema("json", json!({"type": "object"})),
        OptionSpec::list_of("list", "int"),
        OptionSpec::typed("bool", "bool"),
    ])
    .unwrap();

    let cases = [
        ("--json=1", "value not yet valid"),
        ("--json='{\"a\": 1}'", "value already valid"),
        (
            "--list='[1, 2, 3]'",
            "value already valid, expected type list[int]",
        ),
    ];
    for (arg, expected) in cases {
        let line = format!("tool {}", arg);
        let (out, err) = complete(&set, &line);
        assert_eq!(out, b"", "no candidates expected for {:?}", line);
        assert!(
            err.contains(expected),
            "stderr for {:?} should contain {:?}, got {:?}",
            line,
            expected,
            err
        );
    }

    // A plain bool option in the same registry still enumerates values.
    let (out, _) = complete(&set, "tool --bool=");
    assert_eq!(out, b"true\x0bfalse");
}

#[test]
fn test_unbalanced_quote_does_not_break_validation() {
    let set =
        OptionSet::with([OptionSpec::json_schema("json", json!({"type": "object"}))]).unwrap();

    // The closing quote has not been typed yet.
    let (out, err) = complete(&set, "tool --json='{\"a\": 1");
    assert_eq!(out, b"");
    assert!(err.contains("value not yet valid"));
}

#[test]
fn test_unbalanced_quote_falls_back_gracefully() {
    let set = OptionSet::with([OptionSpec::new("group1.op")]).unwrap();

    // The cursor sits inside a quoted word that is not a flag; the engine
    // must answer with an empty candidate list rather than abort.
    let (out, _) = complete(&set, "tool 'oops --group1");
    assert_eq!(out, b"");
}

// ==================== Completion outcome ====================

#[test]
fn test_outcome_reports_candidate_count() {
    let set = OptionSet::with([
        OptionSpec::new("group2.op1"),
        OptionSpec::new("group2.op2"),
    ])
    .unwrap();

    let req = CompletionRequest::new("tool --group2");
    let mut out = Vec::new();
    let mut err = Vec::new();
    let outcome = autocomplete(&set, &req, &mut out, &mut err).unwrap();
    assert_eq!(outcome, CompletionOutcome::Completed { candidates: 2 });
}

// ==================== Environment protocol ====================

const PROTOCOL_VARS: [&str; 7] = [
    "_ARGCOMPLETE",
    "_ARGCOMPLETE_SUPPRESS_SPACE",
    "_ARGCOMPLETE_COMP_WORDBREAKS",
    "_ARGCOMPLETE_IFS",
    "COMP_LINE",
    "COMP_POINT",
    "COMP_TYPE",
];

fn clear_protocol_env() {
    for var in PROTOCOL_VARS {
        std::env::remove_var(var);
    }
}

fn set_protocol_env(line: &str) {
    clear_protocol_env();
    std::env::set_var("_ARGCOMPLETE", "1");
    std::env::set_var("_ARGCOMPLETE_SUPPRESS_SPACE", "1");
    std::env::set_var("_ARGCOMPLETE_COMP_WORDBREAKS", " \t\n\"'><=;|&(:");
    std::env::set_var("COMP_TYPE", "63");
    std::env::set_var("COMP_LINE", line);
    std::env::set_var("COMP_POINT", line.len().to_string());
}

#[test]
#[serial]
fn test_env_request_completes_nested_option() {
    let set = OptionSet::with([OptionSpec::new("group1.op")]).unwrap();

    set_protocol_env("tool --group1");
    let req = CompletionRequest::from_env().unwrap();
    clear_protocol_env();

    assert_eq!(req.line, "tool --group1");
    assert_eq!(req.point, 13);
    assert_eq!(req.comp_type, Some(63));
    assert!(req.suppress_space);

    let mut out = Vec::new();
    let mut err = Vec::new();
    autocomplete(&set, &req, &mut out, &mut err).unwrap();
    assert_eq!(out, b"--group1.op");
}

#[test]
#[serial]
fn test_env_comp_point_truncates_line() {
    let set = OptionSet::with([OptionSpec::new("group1.op")]).unwrap();

    set_protocol_env("tool --group1 --unrelated");
    // Cursor right after "--group1".
    std::env::set_var("COMP_POINT", "13");
    let req = CompletionRequest::from_env().unwrap();
    clear_protocol_env();

    let mut out = Vec::new();
    let mut err = Vec::new();
    autocomplete(&set, &req, &mut out, &mut err).unwrap();
    assert_eq!(out, b"--group1.op");
}

#[test]
#[serial]
fn test_env_garbled_comp_point_falls_back_to_line_end() {
    set_protocol_env("tool --op");
    std::env::set_var("COMP_POINT", "not-a-number");
    let req = CompletionRequest::from_env().unwrap();
    clear_protocol_env();

    assert_eq!(req.point, 9);
}

#[test]
#[serial]
fn test_no_activation_means_not_requested() {
    clear_protocol_env();
    assert!(CompletionRequest::from_env().is_none());

    let set = OptionSet::with([OptionSpec::new("op")]).unwrap();
    let outcome = autocomplete_from_env(&set).unwrap();
    assert_eq!(outcome, CompletionOutcome::NotRequested);
}

// ==================== Mapping → completion → parse workflow ====================

#[test]
fn test_full_workflow_from_yaml_mapping() {
    // 1. Parse a hierarchical YAML mapping
    let yaml = r#"
groups:
  - name: server
    help: "Server settings"
    options:
      - name: host
        default: localhost
      - name: port
        type: int
        default: "8080"
"#;
    let set = parse_option_root(yaml).unwrap();

    // 2. Completion sees the dotted flags
    let (out, _) = complete(&set, "tool --server");
    assert_eq!(out, b"--server.host\x0b--server.port");

    // 3. The same registry drives clap parsing
    let matches = build_command("tool", &set)
        .try_get_matches_from(["tool", "--server.port", "9000"])
        .unwrap();
    let values = collect_values(&set, &matches).unwrap();
    assert_eq!(values.get("server.host"), Some(&json!("localhost")));
    assert_eq!(values.get("server.port"), Some(&json!(9000)));

    // 4. Dotted names fold back into a tree
    let tree = values_to_tree(&values);
    assert_eq!(tree, json!({"server": {"host": "localhost", "port": 9000}}));
}

#[test]
fn test_toggle_workflow_matches_completion() {
    // The flag spellings offered by completion parse back as booleans.
    let set = OptionSet::with([OptionSpec::toggle_with_prefixes(
        "cache", "with-", "without-",
    )])
    .unwrap();

    let (out, _) = complete(&set, "tool --with");
    assert_eq!(out, b"--with-cache\x0b--without-cache");

    let matches = build_command("tool", &set)
        .try_get_matches_from(["tool", "--without-cache"])
        .unwrap();
    let values = collect_values(&set, &matches).unwrap();
    assert_eq!(values.get("cache"), Some(&json!(false)));
}
