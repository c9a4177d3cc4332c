use crate::di::Services;
use crate::report::{IdentityProvider, ReportSink};
use crate::render::views::ViewEngine;
use std::sync::Arc;

/// Builder for the service registry handed to the exception handler.
///
/// # Example
/// ```
/// use faultline::di::ServicesBuilder;
/// use faultline::report::TracingSink;
/// use std::sync::Arc;
///
/// let services = ServicesBuilder::new()
///     .sink(Arc::new(TracingSink))
///     .build();
///
/// assert!(services.contains::<dyn faultline::report::ReportSink>());
/// ```
pub struct ServicesBuilder {
    services: Services,
}

impl ServicesBuilder {
    pub fn new() -> Self {
        Self {
            services: Services::new(),
        }
    }

    pub fn sink(mut self, sink: Arc<dyn ReportSink>) -> Self {
        self.services.provide::<dyn ReportSink>(sink);
        self
    }

    pub fn identity(mut self, identity: Arc<dyn IdentityProvider>) -> Self {
        self.services.provide::<dyn IdentityProvider>(identity);
        self
    }

    pub fn views(mut self, views: Arc<dyn ViewEngine>) -> Self {
        self.services.provide::<dyn ViewEngine>(views);
        self
    }

    /// Register any other service an application callback wants to resolve.
    pub fn provide<T>(mut self, service: Arc<T>) -> Self
    where
        T: ?Sized + Send + Sync + 'static,
    {
        self.services.provide(service);
        self
    }

    pub fn build(self) -> Services {
        self.services
    }
}

impl Default for ServicesBuilder {
    fn default() -> Self {
        Self::new()
    }
}
