use super::*;

use chrono::NaiveDate;

#[test]
fn parses_harvest_defaults() {
    let cli = Cli::try_parse_from(["pricewatch", "harvest"]).expect("expected valid cli args");

    assert!(matches!(
        cli.command,
        Some(Commands::Harvest {
            date: None,
            shard_index: None,
            dry_run: false,
        })
    ));
}

#[test]
fn parses_harvest_with_date() {
    let cli = Cli::try_parse_from(["pricewatch", "harvest", "--date", "2026-08-25"]).unwrap();

    if let Some(Commands::Harvest { date, .. }) = cli.command {
        assert_eq!(date, NaiveDate::from_ymd_opt(2026, 8, 25));
    } else {
        panic!("unexpected command variant");
    }
}

#[test]
fn rejects_an_unparseable_date() {
    let result = Cli::try_parse_from(["pricewatch", "harvest", "--date", "yesterday"]);
    assert!(result.is_err(), "non-ISO dates must be rejected at parse time");
}

#[test]
fn parses_harvest_with_shard_override() {
    let cli = Cli::try_parse_from(["pricewatch", "harvest", "--shard-index", "2"]).unwrap();

    assert!(matches!(
        cli.command,
        Some(Commands::Harvest {
            shard_index: Some(2),
            ..
        })
    ));
}

#[test]
fn parses_harvest_dry_run() {
    let cli = Cli::try_parse_from(["pricewatch", "harvest", "--dry-run"]).unwrap();

    assert!(matches!(
        cli.command,
        Some(Commands::Harvest { dry_run: true, .. })
    ));
}

/// Verifies that date + dry-run flags combine correctly when both are present.
#[test]
fn harvest_date_and_dry_run_together() {
    let cli = Cli::try_parse_from([
        "pricewatch",
        "harvest",
        "--date",
        "2026-08-25",
        "--dry-run",
    ])
    .unwrap();

    assert!(matches!(
        cli.command,
        Some(Commands::Harvest {
            date: Some(_),
            dry_run: true,
            ..
        })
    ));
}

#[test]
fn parses_db_ping_command() {
    let cli = Cli::try_parse_from(["pricewatch", "db", "ping"]).expect("expected valid cli args");

    assert!(matches!(
        cli.command,
        Some(Commands::Db {
            command: DbCommands::Ping
        })
    ));
}

#[test]
fn parses_db_migrate_command() {
    let cli =
        Cli::try_parse_from(["pricewatch", "db", "migrate"]).expect("expected valid cli args");

    assert!(matches!(
        cli.command,
        Some(Commands::Db {
            command: DbCommands::Migrate
        })
    ));
}

#[test]
fn parses_auth_check_command() {
    let cli = Cli::try_parse_from(["pricewatch", "auth", "check"]).expect("expected valid cli args");

    assert!(matches!(
        cli.command,
        Some(Commands::Auth {
            command: AuthCommands::Check
        })
    ));
}

#[test]
fn no_command_is_none() {
    let cli = Cli::try_parse_from(["pricewatch"]).expect("expected valid cli args");
    assert!(cli.command.is_none());
}
