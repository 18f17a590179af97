// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

#![allow(clippy::unwrap_used)]
#![allow(clippy::panic)]

use super::*;
use yare::parameterized;

fn parse(args: &[&str]) -> Cli {
    Cli::try_parse_from(std::iter::once("skiff").chain(args.iter().copied())).unwrap()
}

fn rejects(args: &[&str]) -> bool {
    Cli::try_parse_from(std::iter::once("skiff").chain(args.iter().copied())).is_err()
}

#[test]
fn global_options_apply_after_the_subcommand() {
    let cli = parse(&["status", "--db", "/tmp/x.db", "-o", "json"]);
    assert_eq!(cli.global.db, Some(PathBuf::from("/tmp/x.db")));
    assert_eq!(cli.global.output, OutputFormat::Json);
    assert!(matches!(cli.command, Command::Status));
}

#[test]
fn output_defaults_to_text() {
    assert_eq!(parse(&["pending"]).global.output, OutputFormat::Text);
}

#[test]
fn enqueue_parses_kind_and_target() {
    let cli = parse(&[
        "enqueue", "UPDATE", "tasks", "--id", "42", "--payload", r#"{"a":1}"#,
    ]);
    match cli.command {
        Command::Enqueue {
            kind,
            collection,
            id,
            payload,
            max_attempts,
        } => {
            assert_eq!(kind, OpKind::Update);
            assert_eq!(collection, "tasks");
            assert_eq!(id, Some(42));
            assert_eq!(payload, r#"{"a":1}"#);
            assert_eq!(max_attempts, None);
        }
        other => panic!("unexpected command: {other:?}"),
    }
}

#[test]
fn enqueue_accepts_temporary_ids() {
    match parse(&["enqueue", "update", "tasks", "--id", "-3"]).command {
        Command::Enqueue { id, payload, .. } => {
            assert_eq!(id, Some(-3));
            assert_eq!(payload, "{}");
        }
        other => panic!("unexpected command: {other:?}"),
    }
}

#[parameterized(
    prefer_local = { "prefer-local", Resolution::PreferLocal },
    short_server = { "server", Resolution::PreferServer },
    merge = { "Merge", Resolution::Merge },
)]
fn resolve_strategies(arg: &str, expected: Resolution) {
    match parse(&["resolve", "c1", arg]).command {
        Command::Resolve { id, strategy } => {
            assert_eq!(id, "c1");
            assert_eq!(strategy, expected);
        }
        other => panic!("unexpected command: {other:?}"),
    }
}

#[test]
fn conflicts_status_filter() {
    match parse(&["conflicts", "--status", "pending"]).command {
        Command::Conflicts { status } => assert_eq!(status, Some(ConflictStatus::Pending)),
        other => panic!("unexpected command: {other:?}"),
    }
}

#[parameterized(
    bad_kind = { &["enqueue", "upsert", "tasks"] },
    empty_collection = { &["enqueue", "create", " "] },
    zero_attempts = { &["enqueue", "create", "tasks", "--max-attempts", "0"] },
    bad_strategy = { &["resolve", "c1", "coin-flip"] },
    reconcile_without_ids = { &["reconcile", "tasks"] },
    reconcile_bad_id = { &["reconcile", "tasks", "x"] },
    bad_output = { &["status", "-o", "yaml"] },
    match_without_value = { &["refresh", "channels", "--match", "active"] },
    match_without_field = { &["refresh", "channels", "--match", "=1"] },
)]
fn invalid_arguments_are_rejected(args: &[&str]) {
    assert!(rejects(args));
}

#[test]
fn clear_false_positives_is_kebab_case() {
    assert!(matches!(
        parse(&["clear-false-positives"]).command,
        Command::ClearFalsePositives
    ));
}

#[test]
fn refresh_matches_parse_json_values() {
    match parse(&[
        "refresh", "channels", "--match", "active=true", "--match", "name=General", "--match",
        "member_count=3",
    ])
    .command
    {
        Command::Refresh {
            collection,
            matches,
        } => {
            assert_eq!(collection, "channels");
            assert_eq!(
                matches,
                vec![
                    ("active".to_string(), Value::Bool(true)),
                    ("name".to_string(), Value::String("General".into())),
                    ("member_count".to_string(), Value::Number(3.0)),
                ]
            );
        }
        other => panic!("unexpected command: {other:?}"),
    }
}

#[test]
fn refresh_without_matches_fetches_everything() {
    match parse(&["refresh", "channels"]).command {
        Command::Refresh { matches, .. } => assert!(matches.is_empty()),
        other => panic!("unexpected command: {other:?}"),
    }
    assert!(matches!(
        parse(&["clear-cache", "channels"]).command,
        Command::ClearCache { .. }
    ));
}
