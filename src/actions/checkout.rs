//! Checkout action
//!
//! The workspace manager materializes the checkout target before the first
//! step runs; this action confirms it is in place.

use crate::actions::{Action, ActionError, ActionOutput, ActionParams};
use crate::workspace::Workspace;
use async_trait::async_trait;

#[derive(Debug, Clone, Copy, Default)]
pub struct CheckoutAction;

#[async_trait]
impl Action for CheckoutAction {
    async fn execute(
        &self,
        params: &ActionParams,
        workspace: &Workspace,
    ) -> Result<ActionOutput, ActionError> {
        let path = match params.input("path") {
            Some(p) => workspace.path().join(p),
            None => workspace.path().to_path_buf(),
        };

        let mut entries = tokio::fs::read_dir(&path)
            .await
            .map_err(|e| ActionError::InvalidInput(format!("{}: {}", path.display(), e)))?;

        let mut count = 0usize;
        while entries
            .next_entry()
            .await
            .map_err(|e| ActionError::Internal(e.to_string()))?
            .is_some()
        {
            count += 1;
        }

        Ok(ActionOutput::success(format!(
            "Checked out {} entries in {}",
            count,
            path.display()
        )))
    }
}
