use super::*;
use crate::cli::continue_file::{interrupt_action, InterruptAction};
use crate::cli::prompt_commands::apply_prompt_command;
use crate::core::config::{ModelFilter, Settings};
use crate::utils::test_utils::{spawn_mock_ollama, MockStep};
use std::fs;
use tempfile::TempDir;

mod test_helpers {
    use super::*;

    pub(super) fn parse_args(argv: &[&str]) -> Args {
        Args::try_parse_from(argv)
            .unwrap_or_else(|err| panic!("argv={argv:?} should parse successfully: {err}"))
    }

    pub(super) fn temp_store(temp_dir: &TempDir) -> SettingsStore {
        SettingsStore::new(temp_dir.path().join("settings.json"))
    }
}

use test_helpers::{parse_args, temp_store};

#[test]
fn continue_parses_generation_options() {
    let argv = [
        "ai-writer",
        "continue",
        "story.txt",
        "-m",
        "llama2",
        "-t",
        "0.9",
        "--tokens",
        "200",
        "--cursor",
        "12",
        "--dry-run",
    ];
    match parse_args(&argv).command {
        Commands::Continue(args) => {
            assert_eq!(args.file, PathBuf::from("story.txt"));
            assert_eq!(args.model.as_deref(), Some("llama2"));
            assert_eq!(args.temperature, Some(0.9));
            assert_eq!(args.token_limit, Some(200));
            assert_eq!(args.cursor, Some(12));
            assert!(args.dry_run);
            assert!(!args.quiet);
        }
        _ => panic!("expected continue subcommand for argv={argv:?}"),
    }
}

#[test]
fn template_flags_conflict() {
    let result = Args::try_parse_from([
        "ai-writer",
        "continue",
        "story.txt",
        "--template",
        "a",
        "--no-template",
    ]);
    assert!(result.is_err());
}

#[test]
fn global_flags_work_after_subcommand() {
    let args = parse_args(&["ai-writer", "models", "-vv", "--config", "/tmp/s.json"]);
    assert_eq!(args.verbose, 2);
    assert_eq!(args.config, Some(PathBuf::from("/tmp/s.json")));
    assert!(matches!(args.command, Commands::Models));
}

#[test]
fn set_joins_multi_word_values() {
    match parse_args(&["ai-writer", "set", "system-instruction", "Keep", "going."]).command {
        Commands::Set { key, value } => {
            assert_eq!(key, "system-instruction");
            assert_eq!(value.map(|v| v.join(" ")).as_deref(), Some("Keep going."));
        }
        _ => panic!("expected set subcommand"),
    }
}

#[test]
fn set_and_unset_persist_through_store() {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let store = temp_store(&temp_dir);

    run_set(&store, "temperature", Some(vec!["1.3".to_string()])).expect("set");
    assert_eq!(store.load().expect("load").generation.default_temperature, 1.3);

    assert!(run_set(&store, "bogus", Some(vec!["x".to_string()])).is_err());

    run_unset(&store, "temperature").expect("unset");
    assert_eq!(store.load().expect("load").generation.default_temperature, 0.7);
}

#[test]
fn prompt_commands_manage_templates() {
    let mut settings = Settings::default();
    let message = apply_prompt_command(
        &mut settings,
        PromptCommands::Add {
            name: "Noir".to_string(),
            body: "Continue in a hard-boiled voice:".to_string(),
            model: "llama2".to_string(),
            description: String::new(),
        },
    )
    .expect("add");
    assert!(message.contains("Noir"));
    let id = settings.prompts.templates[0].id.clone();
    assert_eq!(
        settings.prompts.templates[0].applies_to,
        ModelFilter::Model("llama2".to_string())
    );

    apply_prompt_command(
        &mut settings,
        PromptCommands::Edit {
            id: id.clone(),
            name: None,
            body: None,
            model: Some("all".to_string()),
            description: None,
        },
    )
    .expect("edit");
    assert_eq!(settings.prompts.templates[0].applies_to, ModelFilter::All);

    apply_prompt_command(&mut settings, PromptCommands::Select { id: id.clone() }).expect("select");
    assert_eq!(settings.prompts.selected_template_id.as_deref(), Some(id.as_str()));

    assert!(apply_prompt_command(
        &mut settings,
        PromptCommands::Select {
            id: "missing".to_string()
        }
    )
    .is_err());

    apply_prompt_command(&mut settings, PromptCommands::Remove { id }).expect("remove");
    assert!(settings.prompts.templates.is_empty());
    assert!(settings.prompts.selected_template_id.is_none());
}

#[test]
fn prompt_commands_persist_through_store() {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let store = temp_store(&temp_dir);

    run_prompt_command(&store, PromptCommands::Defaults).expect("defaults");
    assert_eq!(store.load().expect("load").prompts.templates.len(), 4);

    let err = run_prompt_command(
        &store,
        PromptCommands::Remove {
            id: "missing".to_string(),
        },
    );
    assert!(err.is_err());
    assert_eq!(store.load().expect("load").prompts.templates.len(), 4);
}

#[test]
fn second_interrupt_exits_instead_of_waiting() {
    assert_eq!(interrupt_action(1), InterruptAction::Cancel);
    assert_eq!(interrupt_action(2), InterruptAction::Exit);
    assert_eq!(interrupt_action(5), InterruptAction::Exit);
}

#[test]
fn continue_appends_generated_text_to_file() {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let server = spawn_mock_ollama(
        200,
        vec![
            MockStep::line(r#"{"response":"there","done":false}"#),
            MockStep::line(r#"{"response":" was a dragon.","done":true}"#),
        ],
    );

    let store = temp_store(&temp_dir);
    run_set(&store, "url", Some(vec![server.base_url.clone()])).expect("set url");

    let story = temp_dir.path().join("story.txt");
    fs::write(&story, "Once upon a time").expect("write story");
    let output = temp_dir.path().join("out.txt");

    let runtime = tokio::runtime::Runtime::new().expect("runtime");
    run_continue(
        &store,
        &runtime,
        ContinueArgs {
            file: story.clone(),
            model: Some("test-model".to_string()),
            output: Some(output.clone()),
            quiet: true,
            ..Default::default()
        },
    )
    .expect("continue");

    assert_eq!(
        fs::read_to_string(&output).expect("read output"),
        "Once upon a time there was a dragon."
    );
    assert_eq!(
        fs::read_to_string(&story).expect("read story"),
        "Once upon a time"
    );
    server.finish();
}

#[test]
fn continue_surfaces_server_errors_and_keeps_file() {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let server = spawn_mock_ollama(
        404,
        vec![MockStep::line(r#"{"error":"model 'ghost' not found"}"#)],
    );

    let store = temp_store(&temp_dir);
    run_set(&store, "url", Some(vec![server.base_url.clone()])).expect("set url");
    let story = temp_dir.path().join("story.txt");
    fs::write(&story, "Once upon a time").expect("write story");

    let runtime = tokio::runtime::Runtime::new().expect("runtime");
    let err = run_continue(
        &store,
        &runtime,
        ContinueArgs {
            file: story.clone(),
            model: Some("ghost".to_string()),
            quiet: true,
            ..Default::default()
        },
    )
    .expect_err("404 fails");
    assert!(err.to_string().contains("ghost"));
    assert_eq!(
        fs::read_to_string(&story).expect("read story"),
        "Once upon a time"
    );
    server.finish();
}
