use std::sync::Arc;

use marketeer_model::ModelProvider;

use super::{DEFAULT_MAX_CORRECTION_CYCLES, Engine, Event, Inner};
use crate::model_client::ModelClient;
use crate::role::RoleSet;

/// A builder for creating an [`Engine`].
pub struct EngineBuilder {
    model_client: ModelClient,
    roles: RoleSet,
    max_correction_cycles: usize,
    on_event: Option<Arc<dyn Fn(Event) + Send + Sync>>,
}

impl EngineBuilder {
    /// Creates a builder with the given model provider and roles.
    #[inline]
    pub fn with_model_provider<P: ModelProvider + 'static>(
        model_provider: P,
        roles: RoleSet,
    ) -> Self {
        Self::with_model_client(ModelClient::new(model_provider), roles)
    }

    /// Creates a builder with an existing model client and roles.
    ///
    /// Useful when the same client also backs the generation tools.
    #[inline]
    pub fn with_model_client(
        model_client: ModelClient,
        roles: RoleSet,
    ) -> Self {
        Self {
            model_client,
            roles,
            max_correction_cycles: DEFAULT_MAX_CORRECTION_CYCLES,
            on_event: None,
        }
    }

    /// Sets how many invalid tool calls in a row the backend may correct
    /// before the run fails.
    ///
    /// With `0`, the first violation fails the run with its own error.
    #[inline]
    pub fn with_max_correction_cycles(mut self, max: usize) -> Self {
        self.max_correction_cycles = max;
        self
    }

    /// Sets a callback for progress events.
    #[inline]
    pub fn on_event<F>(mut self, f: F) -> Self
    where
        F: Fn(Event) + Send + Sync + 'static,
    {
        self.on_event = Some(Arc::new(f));
        self
    }

    /// Builds the engine.
    pub fn build(self) -> Engine {
        debug!(
            "engine built with {} roles over {}",
            self.roles.iter().count(),
            self.model_client.provider_name()
        );
        Engine {
            inner: Arc::new(Inner {
                model_client: self.model_client,
                roles: self.roles,
                max_correction_cycles: self.max_correction_cycles,
                on_event: self.on_event,
            }),
        }
    }
}
