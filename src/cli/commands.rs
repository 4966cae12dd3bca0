//! Command dispatch

use std::io;
use std::path::Path;

use clap::CommandFactory;
use clap_complete::generate;
use termtree::Tree;
use tracing::{debug, instrument};

use crate::application::Registry;
use crate::cli::args::{Cli, Commands, ConfigCommands};
use crate::cli::error::{CliError, CliResult};
use crate::cli::output;
use crate::config::{global_config_path, Settings};
use crate::domain::{Configuration, DomainResult, Interpolation, NodeId, Value};
use crate::infrastructure::di::ServiceContainer;

pub fn execute_command(cli: &Cli) -> CliResult<()> {
    match &cli.command {
        Some(Commands::Show { file, raw, tree }) => {
            let container = container(cli)?;
            cmd_show(&container, file, defines(&cli.defines)?, *raw, *tree)
        }
        Some(Commands::Get { file, path }) => {
            let container = container(cli)?;
            cmd_get(&container, file, defines(&cli.defines)?, path)
        }
        Some(Commands::Config { command }) => cmd_config(cli, command),
        Some(Commands::Completion { shell }) => {
            let mut cmd = Cli::command();
            let name = cmd.get_name().to_string();
            generate(*shell, &mut cmd, name, &mut io::stdout());
            Ok(())
        }
        None => Ok(()),
    }
}

fn container(cli: &Cli) -> CliResult<ServiceContainer> {
    let settings = Settings::load(cli.settings.as_deref())?;
    Ok(ServiceContainer::new(settings, Registry::new()))
}

/// Parse `KEY=VALUE` pairs into interpolation values.
pub fn defines(raw: &[String]) -> CliResult<Interpolation> {
    raw.iter()
        .map(|pair| match pair.split_once('=') {
            Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
            _ => Err(CliError::Usage(format!("expected KEY=VALUE, got '{}'", pair))),
        })
        .collect()
}

#[instrument(skip(container, context))]
fn cmd_show(
    container: &ServiceContainer,
    file: &Path,
    context: Interpolation,
    raw: bool,
    tree: bool,
) -> CliResult<()> {
    let cfg = if raw {
        container.loader.load_from_file(file, context)?
    } else {
        container.configure_file(file, context)?
    };
    debug!("show: {} top-level keys", cfg.len(cfg.root())?);

    if tree {
        output::info(&to_tree(&cfg, cfg.root(), file.display().to_string())?);
    } else {
        output::info(cfg.format()?.trim_end());
    }
    Ok(())
}

#[instrument(skip(container, context))]
fn cmd_get(container: &ServiceContainer, file: &Path, context: Interpolation, path: &str) -> CliResult<()> {
    let cfg = container.configure_file(file, context)?;
    match cfg.lookup(path)? {
        Value::Node(id) => output::info(cfg.format_node(id)?.trim_end()),
        other => output::info(&other),
    }
    Ok(())
}

fn cmd_config(cli: &Cli, command: &ConfigCommands) -> CliResult<()> {
    match command {
        ConfigCommands::Show => {
            let settings = Settings::load(cli.settings.as_deref())?;
            output::info(settings.to_toml()?.trim_end());
        }
        ConfigCommands::Template => output::info(Settings::template().trim_end()),
        ConfigCommands::Path => {
            output::header("Settings files");
            match global_config_path() {
                Some(path) => output::entry("global", &path.display()),
                None => output::entry("global", "<no home directory>"),
            }
            if let Some(path) = &cli.settings {
                output::entry("explicit", &path.display());
            }
        }
    }
    Ok(())
}

/// Box-drawing view of a node; keys sorted, scalars shown inline.
pub fn to_tree(cfg: &Configuration, id: NodeId, label: String) -> DomainResult<Tree<String>> {
    let mut tree = Tree::new(label);
    let mut keys = cfg.keys(id)?;
    keys.sort();
    for key in keys {
        match cfg.get(id, &key)? {
            Value::Node(child) if !cfg.is_ancestor_or_self(child, id) => {
                tree.push(to_tree(cfg, child, key)?);
            }
            Value::Node(_) => {
                tree.push(Tree::new(format!("{key}: <cycle>")));
            }
            value => {
                tree.push(Tree::new(format!("{key}: {value}")));
            }
        }
    }
    Ok(tree)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::mapping;

    #[test]
    fn given_defines_when_parsed_then_interpolation_built() {
        let parsed = defines(&["env=prod".to_string(), "empty=".to_string()]).unwrap();

        assert_eq!(parsed.get("env").map(String::as_str), Some("prod"));
        assert_eq!(parsed.get("empty").map(String::as_str), Some(""));
    }

    #[test]
    fn given_malformed_define_when_parsed_then_usage_error() {
        let result = defines(&["novalue".to_string()]);

        assert!(matches!(result, Err(CliError::Usage(_))));
    }

    #[test]
    fn given_nested_tree_when_rendered_then_keys_sorted() {
        let cfg = Configuration::from_mapping(mapping([
            ("b", Value::Int(1)),
            ("a", Value::Map(mapping([("c", Value::from("x"))]))),
        ]));

        let rendered = to_tree(&cfg, cfg.root(), "root".to_string()).unwrap().to_string();

        let a = rendered.find("a").unwrap();
        let b = rendered.find("b: 1").unwrap();
        assert!(a < b);
        assert!(rendered.contains("c: x"));
    }
}
