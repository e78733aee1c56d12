use std::future::Future;

use crate::api::ApiError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveStatus {
    Clean,
    Saved,
    Failed(String),
}

/// Read-modify-write copy of a server record. `T` is the record as the
/// server returned it, `D` the editable form built from it. No conflict
/// detection: the last save wins.
#[derive(Debug, Clone)]
pub struct EditableRecord<T, D> {
    saved: T,
    draft: D,
    status: SaveStatus,
}

impl<T, D> EditableRecord<T, D>
where
    D: for<'a> From<&'a T> + Clone,
{
    pub fn new(saved: T) -> Self {
        let draft = D::from(&saved);
        Self { saved, draft, status: SaveStatus::Clean }
    }

    pub fn saved(&self) -> &T {
        &self.saved
    }

    pub fn draft(&self) -> &D {
        &self.draft
    }

    pub fn draft_mut(&mut self) -> &mut D {
        &mut self.draft
    }

    pub fn status(&self) -> &SaveStatus {
        &self.status
    }

    /// Discards local edits.
    pub fn reset(&mut self) {
        self.draft = D::from(&self.saved);
        self.status = SaveStatus::Clean;
    }

    /// Sends the draft. On success the server's response replaces both the
    /// saved copy and the draft; on failure the draft is kept for another try.
    pub async fn save<F, Fut>(&mut self, submit: F) -> Result<&T, ApiError>
    where
        F: FnOnce(D) -> Fut,
        Fut: Future<Output = Result<T, ApiError>>,
    {
        match submit(self.draft.clone()).await {
            Ok(saved) => {
                self.draft = D::from(&saved);
                self.saved = saved;
                self.status = SaveStatus::Saved;
                Ok(&self.saved)
            }
            Err(err) => {
                tracing::warn!(error = %err, "Failed to save record");
                self.status = SaveStatus::Failed(err.to_string());
                Err(err)
            }
        }
    }
}
