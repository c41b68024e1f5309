//! Shared HTTP adapter state.
//!
//! Handlers receive this through `actix_web::web::Data` so they depend only
//! on domain ports and stay testable without I/O.

use std::sync::Arc;

use crate::domain::ports::{IsolationRecordCommand, IsolationRecordQuery};

/// Dependency bundle for HTTP handlers.
#[derive(Clone)]
pub struct HttpState {
    /// Record mutations.
    pub isolations: Arc<dyn IsolationRecordCommand>,
    /// Record reads.
    pub isolations_query: Arc<dyn IsolationRecordQuery>,
}

impl HttpState {
    /// Construct state from the command and query ports.
    ///
    /// # Examples
    /// ```
    /// use std::sync::Arc;
    ///
    /// use isolation_backend::domain::IsolationRecordService;
    /// use isolation_backend::inbound::http::state::HttpState;
    /// use isolation_backend::outbound::memory::InMemoryIsolationRecordRepository;
    /// use mockable::DefaultClock;
    ///
    /// let service = Arc::new(IsolationRecordService::new(
    ///     Arc::new(InMemoryIsolationRecordRepository::new()),
    ///     Arc::new(DefaultClock),
    /// ));
    /// let state = HttpState::new(service.clone(), service);
    /// let _query = state.isolations_query.clone();
    /// ```
    pub fn new(
        isolations: Arc<dyn IsolationRecordCommand>,
        isolations_query: Arc<dyn IsolationRecordQuery>,
    ) -> Self {
        Self {
            isolations,
            isolations_query,
        }
    }
}
