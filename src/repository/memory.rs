//! In-process repository.

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use super::{ModelDraft, ModelRepository, RepoResult, StoredModel, TrainingExample};
use crate::error::RepositoryError;

#[derive(Default)]
pub struct InMemoryModelRepository {
    models: RwLock<Vec<StoredModel>>,
    examples: RwLock<Vec<TrainingExample>>,
}

impl InMemoryModelRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn model_count(&self) -> usize {
        self.models.read().await.len()
    }
}

fn latest<'a>(models: &'a [StoredModel], name: &str) -> Option<&'a StoredModel> {
    models
        .iter()
        .filter(|m| m.name == name)
        .max_by(|a, b| (a.version, a.created_at).cmp(&(b.version, b.created_at)))
}

#[async_trait]
impl ModelRepository for InMemoryModelRepository {
    async fn save_model(&self, model: StoredModel) -> RepoResult<()> {
        let mut models = self.models.write().await;
        if models
            .iter()
            .any(|m| m.name == model.name && m.version == model.version)
        {
            return Err(RepositoryError::VersionConflict {
                name: model.name,
                version: model.version,
            });
        }
        models.push(model);
        Ok(())
    }

    async fn commit_model(&self, draft: ModelDraft) -> RepoResult<StoredModel> {
        let mut models = self.models.write().await;
        let version = latest(&models, &draft.name).map_or(1, |m| m.version + 1);
        let stored = StoredModel {
            name: draft.name,
            version,
            created_at: Utc::now(),
            model: draft.model,
            metrics: draft.metrics,
            training_count: draft.training_count,
        };
        models.push(stored.clone());
        Ok(stored)
    }

    async fn get_latest_model(&self, name: &str) -> RepoResult<Option<StoredModel>> {
        Ok(latest(&self.models.read().await, name).cloned())
    }

    async fn add_example(&self, example: TrainingExample) -> RepoResult<()> {
        self.examples.write().await.push(example);
        Ok(())
    }

    async fn get_all_examples(&self) -> RepoResult<Vec<TrainingExample>> {
        Ok(self.examples.read().await.clone())
    }

    async fn count_examples(&self) -> RepoResult<usize> {
        Ok(self.examples.read().await.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::fixtures::{draft, stored};

    #[tokio::test]
    async fn test_next_version_sequence() {
        let repo = InMemoryModelRepository::new();
        assert_eq!(repo.next_version("credits").await.unwrap(), 1);

        repo.save_model(stored("credits", 1)).await.unwrap();
        repo.save_model(stored("credits", 2)).await.unwrap();
        assert_eq!(repo.next_version("credits").await.unwrap(), 3);

        assert!(matches!(
            repo.save_model(stored("credits", 2)).await,
            Err(RepositoryError::VersionConflict { version: 2, .. })
        ));
        assert_eq!(repo.model_count().await, 2);
    }

    #[tokio::test]
    async fn test_commit_assigns_versions_per_name() {
        let repo = InMemoryModelRepository::new();
        assert_eq!(repo.commit_model(draft("a")).await.unwrap().version, 1);
        assert_eq!(repo.commit_model(draft("a")).await.unwrap().version, 2);
        assert_eq!(repo.commit_model(draft("b")).await.unwrap().version, 1);

        let latest = repo.get_latest_model("a").await.unwrap().unwrap();
        assert_eq!(latest.version, 2);
    }
}
