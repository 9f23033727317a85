//! Command abstractions and the command dispatcher.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::error;
use uuid::Uuid;

use crate::error::DomainError;
use crate::registry::HandlerRegistry;
use crate::repository::StoredEvent;

/// Trait that all commands implement.
pub trait Command: Send + Sync + std::fmt::Debug + 'static {
    /// The type name for this command (for logging/routing).
    fn command_type(&self) -> &'static str;

    /// Correlation ID to trace this command through the system.
    fn correlation_id(&self) -> Uuid;
}

/// Handles exactly one command type.
#[async_trait]
pub trait CommandHandler<C: Command>: Send + Sync {
    /// Executes the command and returns the events it committed.
    async fn handle(&self, command: C) -> Result<Vec<StoredEvent>, DomainError>;
}

type SharedCommandHandler<C> = Arc<dyn CommandHandler<C>>;

/// Collects command handler registrations during startup.
#[derive(Debug)]
pub struct CommandDispatcherBuilder {
    registry: HandlerRegistry,
}

impl Default for CommandDispatcherBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandDispatcherBuilder {
    /// Creates an empty builder.
    #[must_use]
    pub fn new() -> Self {
        Self {
            registry: HandlerRegistry::new("command"),
        }
    }

    /// Registers the handler for command type `C`.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Routing` if a handler for `C` is already
    /// registered.
    pub fn register<C, H>(&mut self, handler: Arc<H>) -> Result<&mut Self, DomainError>
    where
        C: Command,
        H: CommandHandler<C> + 'static,
    {
        let handler: SharedCommandHandler<C> = handler;
        self.registry.insert::<C, _>(handler)?;
        Ok(self)
    }

    /// Freezes the registrations into a read-only dispatcher.
    #[must_use]
    pub fn build(self) -> CommandDispatcher {
        CommandDispatcher {
            registry: self.registry,
        }
    }
}

/// Routes each command to its single registered handler.
///
/// Built once at startup through [`CommandDispatcherBuilder`] and read-only
/// afterwards; share it behind an `Arc`.
#[derive(Debug)]
pub struct CommandDispatcher {
    registry: HandlerRegistry,
}

impl CommandDispatcher {
    /// Starts a new registration phase.
    #[must_use]
    pub fn builder() -> CommandDispatcherBuilder {
        CommandDispatcherBuilder::new()
    }

    /// Sends `command` to its handler and waits for the outcome.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Routing` if no handler is registered for the
    /// command type, otherwise whatever the handler returns.
    pub async fn dispatch<C: Command>(&self, command: C) -> Result<Vec<StoredEvent>, DomainError> {
        let Some(handler) = self.registry.get::<C, SharedCommandHandler<C>>() else {
            error!(
                alert = true,
                command_type = command.command_type(),
                "no command handler registered"
            );
            return Err(DomainError::Routing(format!(
                "no handler registered for command {}",
                command.command_type()
            )));
        };
        let handler = Arc::clone(handler);
        handler.handle(command).await
    }

    /// Returns the type names of every registered command, sorted.
    #[must_use]
    pub fn registered_commands(&self) -> Vec<&'static str> {
        self.registry.names()
    }
}
