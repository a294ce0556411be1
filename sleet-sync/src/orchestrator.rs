//! Drives one planned operation through every index service.
//!
//! Services run strictly in registration order: the catalog first because it
//! is the audit log later services can be reconciled against, the package
//! index last because its success is the commit signal. There is no
//! multi-document transaction underneath, so a failure halts the remaining
//! services and recovery is re-running the same idempotent operation, never
//! an automatic rollback.

use crate::services::{
    AutoCompleteService, CatalogService, FlatContainerService, IndexService, PackageIndexService,
    RegistrationsService, SearchService,
};
use crate::{ChangeContext, PerfScope, PerfTracker, SyncError, SyncResult};
use sleet_storage::StorageFileSystem;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Applies a ChangeContext to an ordered list of index services.
pub struct ServiceOrchestrator {
    services: Vec<Arc<dyn IndexService>>,
    tracker: Arc<dyn PerfTracker>,
    cancel: CancellationToken,
}

impl ServiceOrchestrator {
    /// Creates an orchestrator over an explicit service list, in apply order.
    pub fn new(
        services: Vec<Arc<dyn IndexService>>,
        tracker: Arc<dyn PerfTracker>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            services,
            tracker,
            cancel,
        }
    }

    /// Creates the standard six services for a feed, in the required order:
    /// Catalog, Registrations, FlatContainer, Search, AutoComplete,
    /// PackageIndex.
    pub fn for_feed(
        file_system: Arc<dyn StorageFileSystem>,
        tracker: Arc<dyn PerfTracker>,
        cancel: CancellationToken,
    ) -> Self {
        let services: Vec<Arc<dyn IndexService>> = vec![
            Arc::new(CatalogService::new(file_system.clone(), tracker.clone())),
            Arc::new(RegistrationsService::new(
                file_system.clone(),
                tracker.clone(),
            )),
            Arc::new(FlatContainerService::new(
                file_system.clone(),
                tracker.clone(),
            )),
            Arc::new(SearchService::new(file_system.clone(), tracker.clone())),
            Arc::new(AutoCompleteService::new(
                file_system.clone(),
                tracker.clone(),
            )),
            Arc::new(PackageIndexService::new(file_system, tracker.clone())),
        ];
        Self::new(services, tracker, cancel)
    }

    /// Registered services, in apply order.
    #[must_use]
    pub fn services(&self) -> &[Arc<dyn IndexService>] {
        &self.services
    }

    /// Warm-up pass: lets every service fetch documents it will need.
    /// An optimization hook, not a correctness requirement. A failure here
    /// propagates as-is: nothing has been written yet, so it is not a
    /// partial application.
    pub async fn pre_load(&self, ctx: &ChangeContext) -> SyncResult<()> {
        for service in &self.services {
            if self.cancel.is_cancelled() {
                return Err(SyncError::Cancelled);
            }
            debug!("pre-loading {}", service.name());
            service.pre_load(ctx).await?;
        }
        Ok(())
    }

    /// Applies the operation to every service in order. Stops at the first
    /// failure; work already written by earlier services stays in place.
    pub async fn apply(&self, ctx: &ChangeContext) -> SyncResult<()> {
        self.pre_load(ctx).await?;

        for service in &self.services {
            if self.cancel.is_cancelled() {
                return Err(SyncError::Cancelled);
            }
            info!(
                "applying operation to {} (+{} -{})",
                service.name(),
                ctx.to_add().len(),
                ctx.to_remove().len()
            );
            let _scope = PerfScope::summary(
                self.tracker.clone(),
                format!("{} applied in {{time}}", service.name()),
            );
            service
                .apply_operation(ctx)
                .await
                .map_err(|e| wrap(service.name(), e))?;
        }
        Ok(())
    }
}

fn wrap(service: &'static str, source: SyncError) -> SyncError {
    match source {
        // Cancellation is not a service failure.
        SyncError::Cancelled => SyncError::Cancelled,
        other => SyncError::PartialApplication {
            service,
            source: Box::new(other),
        },
    }
}
