//! Command-line front end for the TaskFlow core.
//!
//! # Responsibility
//! - Load settings, initialize logging and open the database.
//! - Dispatch one assistant message, bootstrap an organization, or rebuild
//!   the search index.
//!
//! Output is one JSON envelope on stdout; diagnostics go to stderr.

use chrono::Utc;
use std::path::PathBuf;
use std::process::ExitCode;
use taskflow_core::search::rebuild_search_index;
use taskflow_core::service::{register_organization, Registration, LOCKED_CREDENTIAL};
use taskflow_core::{init_from_settings, open_db, Dispatcher, Identity, Role, Settings};

#[derive(Debug, Clone, PartialEq, Eq)]
enum Command {
    Dispatch {
        identity: Identity,
        message: String,
    },
    Register {
        organization_name: String,
        email: String,
        full_name: String,
    },
    SyncIndex,
    Help,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Invocation {
    config: Option<PathBuf>,
    command: Command,
}

fn help_text() -> String {
    [
        "Usage: taskflow [--config <settings.yaml>] <command>",
        "",
        "Commands:",
        "  dispatch --user <id> --org <id> --role <admin|manager|member> <message...>",
        "                                       Run one assistant message as the given identity",
        "  register <organization> <email> <full name...>",
        "                                       Create an organization and its admin user",
        "  sync-index                           Rebuild the task search index",
        "  help                                 Show this help",
    ]
    .join("\n")
}

fn parse_args(args: &[String]) -> Result<Invocation, String> {
    let mut config = None;
    let mut rest = args;
    while let Some((flag, tail)) = rest.split_first() {
        if flag != "--config" {
            break;
        }
        let (path, tail) = tail
            .split_first()
            .ok_or_else(|| "--config requires a path".to_string())?;
        config = Some(PathBuf::from(path));
        rest = tail;
    }

    let Some((verb, tail)) = rest.split_first() else {
        return Ok(Invocation {
            config,
            command: Command::Help,
        });
    };
    let command = match verb.as_str() {
        "dispatch" => parse_dispatch(tail)?,
        "register" => {
            if tail.len() < 3 {
                return Err("register requires <organization> <email> <full name>".to_string());
            }
            Command::Register {
                organization_name: tail[0].clone(),
                email: tail[1].clone(),
                full_name: tail[2..].join(" "),
            }
        }
        "sync-index" => Command::SyncIndex,
        "help" | "--help" | "-h" => Command::Help,
        other => return Err(format!("unknown command `{other}`")),
    };
    Ok(Invocation { config, command })
}

fn parse_dispatch(args: &[String]) -> Result<Command, String> {
    let mut user_id = None;
    let mut organization_id = None;
    let mut role = None;
    let mut words = Vec::new();

    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--user" | "--org" | "--role" => {
                let value = iter
                    .next()
                    .ok_or_else(|| format!("{arg} requires a value"))?;
                match arg.as_str() {
                    "--user" => user_id = Some(parse_id(arg, value)?),
                    "--org" => organization_id = Some(parse_id(arg, value)?),
                    _ => {
                        role = Some(
                            Role::parse(value)
                                .ok_or_else(|| format!("invalid role `{value}`"))?,
                        )
                    }
                }
            }
            _ => words.push(arg.as_str()),
        }
    }

    let message = words.join(" ");
    if message.trim().is_empty() {
        return Err("dispatch requires a message".to_string());
    }
    Ok(Command::Dispatch {
        identity: Identity::new(
            user_id.ok_or("dispatch requires --user")?,
            organization_id.ok_or("dispatch requires --org")?,
            role.ok_or("dispatch requires --role")?,
        ),
        message,
    })
}

fn parse_id(flag: &str, value: &str) -> Result<i64, String> {
    value
        .parse::<i64>()
        .map_err(|_| format!("{flag} expects a numeric id, got `{value}`"))
}

fn run(invocation: Invocation) -> Result<String, String> {
    if invocation.command == Command::Help {
        return Ok(help_text());
    }

    let settings = Settings::load(invocation.config.as_deref()).map_err(|err| err.to_string())?;
    init_from_settings(&settings.logging)?;
    let mut conn = open_db(&settings.database.path).map_err(|err| err.to_string())?;

    match invocation.command {
        Command::Dispatch { identity, message } => {
            let dispatcher = Dispatcher::from_settings(&settings);
            let response = dispatcher.dispatch(&mut conn, &message, &identity);
            let envelope = response.into_envelope(Utc::now());
            serde_json::to_string_pretty(&envelope).map_err(|err| err.to_string())
        }
        Command::Register {
            organization_name,
            email,
            full_name,
        } => {
            let registered = register_organization(
                &mut conn,
                &Registration {
                    organization_name,
                    email,
                    credential_hash: LOCKED_CREDENTIAL.to_string(),
                    full_name,
                },
            )
            .map_err(|err| err.user_message())?;
            serde_json::to_string_pretty(&registered).map_err(|err| err.to_string())
        }
        Command::SyncIndex => {
            let indexed = rebuild_search_index(&conn).map_err(|err| err.to_string())?;
            Ok(format!("{{\"indexed\": {indexed}}}"))
        }
        Command::Help => Ok(help_text()),
    }
}

fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let invocation = match parse_args(&args) {
        Ok(invocation) => invocation,
        Err(err) => {
            eprintln!("error: {err}\n\n{}", help_text());
            return ExitCode::from(2);
        }
    };

    match run(invocation) {
        Ok(output) => {
            println!("{output}");
            ExitCode::SUCCESS
        }
        Err(err) => {
            log::error!("event=cli_failed module=cli status=error");
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{parse_args, Command};
    use taskflow_core::{Identity, Role};

    fn args(values: &[&str]) -> Vec<String> {
        values.iter().map(|value| value.to_string()).collect()
    }

    #[test]
    fn dispatch_collects_identity_and_message() {
        let invocation = parse_args(&args(&[
            "--config", "cfg.yaml", "dispatch", "--user", "2", "--org", "1", "--role", "member",
            "list", "my", "tasks",
        ]))
        .expect("parse");
        assert_eq!(invocation.config.as_deref(), Some(std::path::Path::new("cfg.yaml")));
        assert_eq!(
            invocation.command,
            Command::Dispatch {
                identity: Identity::new(2, 1, Role::Member),
                message: "list my tasks".to_string(),
            }
        );
    }

    #[test]
    fn dispatch_without_role_is_rejected() {
        let err = parse_args(&args(&["dispatch", "--user", "2", "--org", "1", "hi"]))
            .expect_err("role required");
        assert!(err.contains("--role"));
    }

    #[test]
    fn register_joins_full_name() {
        let invocation =
            parse_args(&args(&["register", "Acme", "ada@acme.com", "Ada", "Lovelace"])).expect("parse");
        assert_eq!(
            invocation.command,
            Command::Register {
                organization_name: "Acme".to_string(),
                email: "ada@acme.com".to_string(),
                full_name: "Ada Lovelace".to_string(),
            }
        );
    }

    #[test]
    fn no_arguments_means_help() {
        assert_eq!(parse_args(&[]).expect("parse").command, Command::Help);
        assert!(parse_args(&args(&["frobnicate"])).is_err());
    }
}
