//! Flag parsing and selection validation through the public CLI types.

use clap::Parser;
use zviewer_launcher::cli::{Cli, CliError};
use zviewer_launcher::domain::models::{Microservice, RunMode};
use zviewer_launcher::services::StackBuilder;
use zviewer_launcher::Config;

fn parse(args: &[&str]) -> Cli {
    Cli::try_parse_from(std::iter::once("zviewer-launcher").chain(args.iter().copied())).unwrap()
}

#[test]
fn test_client_only_plan_has_no_server_side() {
    let selection = parse(&["--client-only"]).selection().unwrap();
    assert_eq!(selection.mode, RunMode::ClientOnly);

    let plan = StackBuilder::new(&Config::default(), &selection).build().unwrap();
    let names: Vec<_> = plan.descriptors().map(|d| d.name.as_str()).collect();
    assert_eq!(names, vec!["client"]);
    assert!(plan.gates().is_empty());
}

#[test]
fn test_server_only_with_all_services() {
    let selection = parse(&["--server-only", "--all"]).selection().unwrap();
    let plan = StackBuilder::new(&Config::default(), &selection).build().unwrap();

    assert!(!plan.contains("client"));
    for service in Microservice::ALL {
        assert!(plan.contains(service.service_name()), "{service} missing");
    }
}

#[test]
fn test_invalid_combinations_are_rejected_with_messages() {
    let cases: [(&[&str], &str); 4] = [
        (&["--client-only", "--server-only"], "cannot be used together"),
        (&["--media", "--comments"], "only one of"),
        (&["--all", "--admin"], "--admin cannot be combined with --all"),
        (&["--client-only", "--media"], "--media cannot be used with it"),
    ];
    for (args, message) in cases {
        let err = parse(args).selection().unwrap_err();
        assert!(err.to_string().contains(message), "{args:?}: {err}");
    }
}

#[test]
fn test_no_db_keeps_api_but_drops_storage() {
    let selection = parse(&["--no-db"]).selection().unwrap();
    let plan = StackBuilder::new(&Config::default(), &selection).build().unwrap();

    assert!(!plan.contains("storage"));
    assert!(plan.contains("primary-api"));
    assert!(plan.requirements().iter().all(|r| r.label != "Docker"));
}

#[test]
fn test_cli_error_is_comparable() {
    assert_eq!(
        parse(&["--client-only", "--server-only"]).selection(),
        Err(CliError::ConflictingModes)
    );
}
