//! Area service — use-cases for managing areas.

use minihub_domain::area::Area;
use minihub_domain::error::{MiniHubError, NotFoundError};
use minihub_domain::id::AreaId;

use crate::ports::AreaRepository;

/// Application service for area CRUD operations.
pub struct AreaService<R> {
    repo: R,
}

impl<R: AreaRepository> AreaService<R> {
    /// Create a new service backed by the given repository.
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    /// Create a new area after validating domain invariants.
    ///
    /// # Errors
    ///
    /// Returns [`MiniHubError::Validation`] if invariants fail, or a
    /// storage error propagated from the repository.
    pub async fn create_area(&self, area: Area) -> Result<Area, MiniHubError> {
        area.validate()?;
        self.repo.create(area).await
    }

    /// Look up an area by id, returning an error if not found.
    ///
    /// # Errors
    ///
    /// Returns [`MiniHubError::NotFound`] when no area with `id` exists,
    /// or a storage error from the repository.
    pub async fn get_area(&self, id: AreaId) -> Result<Area, MiniHubError> {
        self.repo.get_by_id(id).await?.ok_or_else(|| {
            NotFoundError {
                entity: "Area",
                id: id.to_string(),
            }
            .into()
        })
    }

    /// List all areas.
    ///
    /// # Errors
    ///
    /// Returns a storage error propagated from the repository.
    pub async fn list_areas(&self) -> Result<Vec<Area>, MiniHubError> {
        self.repo.get_all().await
    }

    /// Update an existing area.
    ///
    /// # Errors
    ///
    /// Returns [`MiniHubError::Validation`] if invariants fail, or a
    /// storage error from the repository.
    pub async fn update_area(&self, area: Area) -> Result<Area, MiniHubError> {
        area.validate()?;
        self.repo.update(area).await
    }

    /// Delete an area by id.
    ///
    /// # Errors
    ///
    /// Returns a storage error propagated from the repository.
    pub async fn delete_area(&self, id: AreaId) -> Result<(), MiniHubError> {
        self.repo.delete(id).await
    }
}
