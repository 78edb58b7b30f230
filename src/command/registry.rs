use std::collections::BTreeMap;
use std::fmt;

use clap::Parser;
use log::{debug, warn};

use super::abbrev::Abbreviations;
use crate::error::{ArgError, CommandError, HandlerError};

type Handler<C, T> = Box<dyn Fn(&mut C, Vec<String>) -> Result<T, HandlerError>>;

struct Command<C, T> {
    help: String,
    handler: Handler<C, T>,
}

/// Command table dispatching abbreviated names to handlers
///
/// Handlers receive a mutable context `C` and the command's arguments, and
/// produce a `T`. Execution is synchronous, one command at a time.
pub struct CommandRegistry<C, T> {
    commands: BTreeMap<String, Command<C, T>>,
    abbreviations: Abbreviations,
}

impl<C, T> CommandRegistry<C, T> {
    pub fn new() -> Self {
        Self {
            commands: BTreeMap::new(),
            abbreviations: Abbreviations::default(),
        }
    }

    /// Register a handler, replacing any previous one with the same name
    pub fn register<F>(&mut self, name: &str, handler: F, help: &str)
    where
        F: Fn(&mut C, Vec<String>) -> Result<T, HandlerError> + 'static,
    {
        if self.commands.contains_key(name) {
            warn!("command \"{}\" already registered - replacing", name);
        }

        self.commands.insert(
            name.to_string(),
            Command {
                help: help.to_string(),
                handler: Box::new(handler),
            },
        );
        self.abbreviations = Abbreviations::new(self.commands.keys().cloned());
    }

    /// Full name of the command `name` abbreviates, if any
    pub fn resolve(&self, name: &str) -> Option<&str> {
        self.abbreviations
            .resolve(name)
            .filter(|full| self.commands.contains_key(*full))
    }

    /// Help text of a (possibly abbreviated) command
    pub fn help(&self, name: &str) -> Option<&str> {
        let full = self.resolve(name)?;
        self.commands.get(full).map(|c| c.help.as_str())
    }

    /// Registered command names in sorted order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.commands.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Run the command `name` abbreviates with the given arguments
    pub fn execute<I, S>(&self, context: &mut C, name: &str, args: I) -> Result<T, CommandError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let full = self
            .resolve(name)
            .ok_or_else(|| CommandError::UnknownCommand(name.to_string()))?;
        let Some(command) = self.commands.get(full) else {
            return Err(CommandError::UnknownCommand(name.to_string()));
        };

        debug!("executing command {} (as '{}')", full, name);

        let args = args.into_iter().map(Into::into).collect();
        (command.handler)(context, args).map_err(|e| match e {
            HandlerError::Args(source) => CommandError::Syntax {
                command: full.to_string(),
                source,
            },
            HandlerError::Manager(source) => CommandError::Failed {
                command: full.to_string(),
                source,
            },
        })
    }
}

/// Parse a handler's arguments with clap
///
/// `P` should set `no_binary_name`, since the command name is not part of
/// the arguments a handler receives.
pub fn parse_args<P: Parser>(args: Vec<String>) -> Result<P, ArgError> {
    P::try_parse_from(args).map_err(ArgError::from)
}

impl<C, T> Default for CommandRegistry<C, T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C, T> fmt::Display for CommandRegistry<C, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.names().collect();
        write!(f, "CommandRegistry ({} commands: {})", names.len(), names.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ManagerError;

    #[derive(Parser, Debug)]
    #[command(name = "number", no_binary_name = true)]
    struct Number {
        n: i64,
    }

    fn arithmetic(factor: i64) -> impl Fn(&mut (), Vec<String>) -> Result<i64, HandlerError> {
        move |_, args| {
            let Number { n } = parse_args(args)?;
            Ok(n * factor)
        }
    }

    fn registry() -> CommandRegistry<(), i64> {
        let mut registry = CommandRegistry::new();
        registry.register("double", arithmetic(2), "Doubles a number");
        registry.register("triple", arithmetic(3), "Triples a number");
        registry.register(
            "decrement",
            |_, args| {
                let Number { n } = parse_args(args)?;
                Ok(n - 1)
            },
            "Takes 1 from a number",
        );
        registry
    }

    #[test]
    fn registered_command_executes() {
        let registry = registry();
        assert_eq!(registry.execute(&mut (), "double", ["4"]).unwrap(), 8);
    }

    #[test]
    fn abbreviated_command_executes() {
        let registry = registry();
        assert_eq!(registry.execute(&mut (), "do", ["4"]).unwrap(), 8);
        assert_eq!(registry.execute(&mut (), "t", ["4"]).unwrap(), 12);
        assert_eq!(registry.execute(&mut (), "de", ["4"]).unwrap(), 3);
    }

    #[test]
    fn registering_adds_a_command() {
        let mut registry = registry();
        let before = registry.len();
        registry.register("increment", arithmetic(1), "Adds nothing");
        assert_eq!(registry.len(), before + 1);
        assert_eq!(registry.execute(&mut (), "increment", ["4"]).unwrap(), 4);
    }

    #[test]
    fn reregistering_replaces_the_handler() {
        let mut registry = registry();
        let before = registry.len();
        registry.register("double", arithmetic(20), "Multiplies by twenty");
        assert_eq!(registry.len(), before);
        assert_eq!(registry.execute(&mut (), "double", ["4"]).unwrap(), 80);
        assert_eq!(registry.help("double"), Some("Multiplies by twenty"));
    }

    #[test]
    fn missing_command_is_unknown() {
        let registry = registry();
        let err = registry.execute(&mut (), "nonexisting", ["4"]).unwrap_err();
        assert!(matches!(err, CommandError::UnknownCommand(name) if name == "nonexisting"));
    }

    #[test]
    fn wrong_arity_is_a_syntax_error() {
        let registry = registry();

        let err = registry
            .execute(&mut (), "double", Vec::<String>::new())
            .unwrap_err();
        assert!(matches!(
            err,
            CommandError::Syntax { ref command, source: ArgError::Missing(_) } if command == "double"
        ));

        let err = registry.execute(&mut (), "triple", ["2", "3"]).unwrap_err();
        assert!(matches!(
            err,
            CommandError::Syntax { source: ArgError::Unexpected(_), .. }
        ));

        let err = registry.execute(&mut (), "double", ["nonint"]).unwrap_err();
        assert!(matches!(
            err,
            CommandError::Syntax { source: ArgError::Invalid(_), .. }
        ));
    }

    #[test]
    fn handler_failures_are_not_syntax_errors() {
        let mut registry: CommandRegistry<(), i64> = CommandRegistry::new();
        registry.register(
            "rename",
            |_, _| {
                Err(ManagerError::AmbiguousFilter {
                    filter: "*".to_string(),
                    matches: 3,
                }
                .into())
            },
            "Always ambiguous",
        );

        let err = registry.execute(&mut (), "ren", Vec::<String>::new()).unwrap_err();
        assert!(matches!(err, CommandError::Failed { ref command, .. } if command == "rename"));
    }

    #[test]
    fn handlers_can_mutate_the_context() {
        let mut registry: CommandRegistry<Vec<String>, usize> = CommandRegistry::new();
        #[derive(Parser)]
        #[command(name = "push", no_binary_name = true)]
        struct Push {
            item: String,
        }

        registry.register(
            "push",
            |items, args| {
                let Push { item } = parse_args(args)?;
                items.push(item);
                Ok(items.len())
            },
            "Push an item",
        );

        let mut items = Vec::new();
        assert_eq!(registry.execute(&mut items, "p", ["a"]).unwrap(), 1);
        assert_eq!(registry.execute(&mut items, "push", ["b"]).unwrap(), 2);
        assert_eq!(items, vec!["a", "b"]);
    }

    #[test]
    fn display_lists_commands() {
        let registry = registry();
        assert_eq!(
            registry.to_string(),
            "CommandRegistry (3 commands: decrement, double, triple)"
        );
    }
}
