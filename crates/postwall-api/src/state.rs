//! Shared application state.

use std::sync::Arc;

use postwall_core::clock::Clock;
use postwall_core::command::CommandDispatcher;
use postwall_core::error::DomainError;
use postwall_core::handler::EventSourcingHandler;
use postwall_core::messaging::EventProducer;
use postwall_core::query::QueryDispatcher;
use postwall_core::repository::EventRepository;
use postwall_post_cmd::application::command_handlers::{
    PostCommandHandler, register_post_command_handlers,
};
use postwall_post_query::application::query_handlers::{
    PostQueryHandler, register_post_query_handlers,
};
use postwall_post_query::domain::entities::PostEntity;
use postwall_post_query::domain::repositories::PostRepository;

/// Application state shared across all request handlers.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Routes commands to the post command handler.
    pub commands: Arc<CommandDispatcher>,
    /// Routes queries to the post read model.
    pub queries: Arc<QueryDispatcher<PostEntity>>,
}

impl AppState {
    /// Create new application state from built dispatchers.
    #[must_use]
    pub fn new(
        commands: Arc<CommandDispatcher>,
        queries: Arc<QueryDispatcher<PostEntity>>,
    ) -> Self {
        Self { commands, queries }
    }

    /// Wires the post command and query handlers onto fresh dispatchers.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Routing` if a command or query is registered
    /// twice.
    pub fn wire(
        event_repository: Arc<dyn EventRepository>,
        producer: Arc<dyn EventProducer>,
        topic: &str,
        clock: Arc<dyn Clock>,
        posts: Arc<dyn PostRepository>,
    ) -> Result<Self, DomainError> {
        let handler = Arc::new(PostCommandHandler::new(
            EventSourcingHandler::new(event_repository, producer, topic),
            clock,
        ));
        let mut commands = CommandDispatcher::builder();
        register_post_command_handlers(&mut commands, &handler)?;

        let lookup = Arc::new(PostQueryHandler::new(posts));
        let mut queries = QueryDispatcher::builder();
        register_post_query_handlers(&mut queries, &lookup)?;

        Ok(Self::new(
            Arc::new(commands.build()),
            Arc::new(queries.build()),
        ))
    }
}
