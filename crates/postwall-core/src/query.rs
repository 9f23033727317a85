//! Query abstractions and the query dispatcher.

use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::error;

use crate::error::DomainError;
use crate::registry::HandlerRegistry;

/// Trait that all queries implement. Queries are stateless filters over the
/// read model and never have write effects.
pub trait Query: Send + Sync + std::fmt::Debug + 'static {
    /// The type name for this query (for logging/routing).
    fn query_type(&self) -> &'static str;
}

/// Handles exactly one query type, returning read-model entities of type `T`.
#[async_trait]
pub trait QueryHandler<Q: Query, T>: Send + Sync {
    /// Runs the query against the read model.
    async fn handle(&self, query: Q) -> Result<Vec<T>, DomainError>;
}

type SharedQueryHandler<Q, T> = Arc<dyn QueryHandler<Q, T>>;

/// Collects query handler registrations during startup.
pub struct QueryDispatcherBuilder<T> {
    registry: HandlerRegistry,
    _entity: PhantomData<fn() -> T>,
}

impl<T> std::fmt::Debug for QueryDispatcherBuilder<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryDispatcherBuilder")
            .field("registry", &self.registry)
            .finish()
    }
}

impl<T: 'static> Default for QueryDispatcherBuilder<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: 'static> QueryDispatcherBuilder<T> {
    /// Creates an empty builder.
    #[must_use]
    pub fn new() -> Self {
        Self {
            registry: HandlerRegistry::new("query"),
            _entity: PhantomData,
        }
    }

    /// Registers the handler for query type `Q`.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Routing` if a handler for `Q` is already
    /// registered.
    pub fn register<Q, H>(&mut self, handler: Arc<H>) -> Result<&mut Self, DomainError>
    where
        Q: Query,
        H: QueryHandler<Q, T> + 'static,
    {
        let handler: SharedQueryHandler<Q, T> = handler;
        self.registry.insert::<Q, _>(handler)?;
        Ok(self)
    }

    /// Freezes the registrations into a read-only dispatcher.
    #[must_use]
    pub fn build(self) -> QueryDispatcher<T> {
        QueryDispatcher {
            registry: self.registry,
            _entity: PhantomData,
        }
    }
}

/// Routes each query to its single registered handler.
pub struct QueryDispatcher<T> {
    registry: HandlerRegistry,
    _entity: PhantomData<fn() -> T>,
}

impl<T> std::fmt::Debug for QueryDispatcher<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryDispatcher")
            .field("registry", &self.registry)
            .finish()
    }
}

impl<T: 'static> QueryDispatcher<T> {
    /// Starts a new registration phase.
    #[must_use]
    pub fn builder() -> QueryDispatcherBuilder<T> {
        QueryDispatcherBuilder::new()
    }

    /// Sends `query` to its handler.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Routing` if no handler is registered for the
    /// query type, otherwise whatever the handler returns.
    pub async fn dispatch<Q: Query>(&self, query: Q) -> Result<Vec<T>, DomainError> {
        let Some(handler) = self.registry.get::<Q, SharedQueryHandler<Q, T>>() else {
            error!(
                alert = true,
                query_type = query.query_type(),
                "no query handler registered"
            );
            return Err(DomainError::Routing(format!(
                "no handler registered for query {}",
                query.query_type()
            )));
        };
        let handler = Arc::clone(handler);
        handler.handle(query).await
    }

    /// Returns the type names of every registered query, sorted.
    #[must_use]
    pub fn registered_queries(&self) -> Vec<&'static str> {
        self.registry.names()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct FindEven;

    impl Query for FindEven {
        fn query_type(&self) -> &'static str {
            "FindEven"
        }
    }

    #[derive(Debug)]
    struct FindOdd;

    impl Query for FindOdd {
        fn query_type(&self) -> &'static str {
            "FindOdd"
        }
    }

    struct NumberHandler(Vec<u32>);

    #[async_trait]
    impl QueryHandler<FindEven, u32> for NumberHandler {
        async fn handle(&self, _query: FindEven) -> Result<Vec<u32>, DomainError> {
            Ok(self.0.iter().copied().filter(|n| n % 2 == 0).collect())
        }
    }

    #[tokio::test]
    async fn test_dispatch_returns_handler_results() {
        // Arrange
        let mut builder = QueryDispatcher::<u32>::builder();
        builder
            .register::<FindEven, _>(Arc::new(NumberHandler(vec![1, 2, 3, 4])))
            .unwrap();
        let dispatcher = builder.build();

        // Act
        let result = dispatcher.dispatch(FindEven).await.unwrap();

        // Assert
        assert_eq!(result, vec![2, 4]);
    }

    #[tokio::test]
    async fn test_unregistered_query_is_routing_error() {
        let dispatcher = QueryDispatcher::<u32>::builder().build();

        let result = dispatcher.dispatch(FindOdd).await;

        match result {
            Err(DomainError::Routing(msg)) => assert!(msg.contains("FindOdd")),
            other => panic!("expected Routing, got {other:?}"),
        }
    }

    #[test]
    fn test_duplicate_registration_fails() {
        let mut builder = QueryDispatcher::<u32>::builder();
        builder
            .register::<FindEven, _>(Arc::new(NumberHandler(vec![])))
            .unwrap();

        let result = builder.register::<FindEven, _>(Arc::new(NumberHandler(vec![2])));

        assert!(matches!(result, Err(DomainError::Routing(_))));
    }
}
