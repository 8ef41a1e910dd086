//! Project storage.

use std::collections::HashMap;
use std::sync::RwLock;

use crate::project::{Project, ProjectId};

#[derive(Debug, Clone, thiserror::Error)]
pub enum ProjectStoreError {
    #[error("project not found")]
    NotFound,
    #[error("storage error: {0}")]
    Storage(String),
}

pub trait ProjectStore: Send + Sync {
    fn create(&self, project: Project) -> Result<(), ProjectStoreError>;

    fn find_by_id(&self, id: ProjectId) -> Result<Option<Project>, ProjectStoreError>;

    /// Whole-record replace of an existing project.
    fn update(&self, project: Project) -> Result<(), ProjectStoreError>;
}

impl<T: ProjectStore + ?Sized> ProjectStore for std::sync::Arc<T> {
    fn create(&self, project: Project) -> Result<(), ProjectStoreError> {
        (**self).create(project)
    }

    fn find_by_id(&self, id: ProjectId) -> Result<Option<Project>, ProjectStoreError> {
        (**self).find_by_id(id)
    }

    fn update(&self, project: Project) -> Result<(), ProjectStoreError> {
        (**self).update(project)
    }
}

/// In-memory project store for tests/dev.
#[derive(Debug, Default)]
pub struct InMemoryProjectStore {
    rows: RwLock<HashMap<ProjectId, Project>>,
}

impl InMemoryProjectStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ProjectStore for InMemoryProjectStore {
    fn create(&self, project: Project) -> Result<(), ProjectStoreError> {
        self.rows.write().unwrap().insert(project.id, project);
        Ok(())
    }

    fn find_by_id(&self, id: ProjectId) -> Result<Option<Project>, ProjectStoreError> {
        Ok(self.rows.read().unwrap().get(&id).cloned())
    }

    fn update(&self, project: Project) -> Result<(), ProjectStoreError> {
        let mut rows = self.rows.write().unwrap();
        if !rows.contains_key(&project.id) {
            return Err(ProjectStoreError::NotFound);
        }
        rows.insert(project.id, project);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use jobhub_core::UserId;

    #[test]
    fn create_find_update_round_trip() {
        let store = InMemoryProjectStore::new();
        let mut project = Project::new("p".into(), None, UserId::new(), Utc::now());
        let id = project.id;

        store.create(project.clone()).unwrap();
        assert_eq!(store.find_by_id(id).unwrap().unwrap().name, "p");

        project.name = "renamed".into();
        store.update(project).unwrap();
        assert_eq!(store.find_by_id(id).unwrap().unwrap().name, "renamed");
    }

    #[test]
    fn update_of_unknown_project_fails() {
        let store = InMemoryProjectStore::new();
        let project = Project::new("p".into(), None, UserId::new(), Utc::now());
        assert!(matches!(
            store.update(project),
            Err(ProjectStoreError::NotFound)
        ));
    }
}
