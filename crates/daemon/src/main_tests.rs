// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

fn args(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

#[test]
fn no_args_runs_with_the_default_config() {
    assert_eq!(
        parse_args(&[]),
        Args::Run {
            config_path: "config.yaml".to_string()
        }
    );
}

#[test]
fn config_flag_overrides_the_path() {
    for flag in ["-c", "--config"] {
        assert_eq!(
            parse_args(&args(&[flag, "/etc/stargate.yaml"])),
            Args::Run {
                config_path: "/etc/stargate.yaml".to_string()
            }
        );
    }
}

#[test]
fn config_flag_without_a_path_is_invalid() {
    assert!(matches!(parse_args(&args(&["-c"])), Args::Invalid(_)));
}

#[test]
fn help_and_version_flags_win() {
    assert_eq!(parse_args(&args(&["--help"])), Args::Help);
    assert_eq!(parse_args(&args(&["-h"])), Args::Help);
    assert_eq!(parse_args(&args(&["--version"])), Args::Version);
    assert_eq!(parse_args(&args(&["-v"])), Args::Version);
}

#[test]
fn unknown_arguments_are_rejected() {
    assert!(matches!(
        parse_args(&args(&["--verbose"])),
        Args::Invalid(_)
    ));
}

#[tokio::test]
async fn notifier_without_email_config_uses_noop() {
    let config: Config = serde_yaml_from(
        r#"
database:
  datafile: sg.sqlite
notifications:
  recipients:
    admin:
      - [email, admin@example.com]
"#,
    );
    let notifier = build_notifier(&config);
    assert!(notifier.can_notify("admin"));
    // NoOp adapter accepts everything quietly.
    assert!(notifier.notify("admin", None, "hello").await);
}

fn serde_yaml_from(yaml: &str) -> Config {
    serde_yaml::from_str(yaml).unwrap()
}
