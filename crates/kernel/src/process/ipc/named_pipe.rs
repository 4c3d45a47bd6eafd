//! Named pipes: a registry enforcing name uniqueness over [`Pipe`].

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;

use crate::error::IpcError;
use crate::process::ipc::pipe::Pipe;

fn validate_name(name: &str) -> Result<(), IpcError> {
    if name.is_empty() || name.contains('/') || name.contains('\0') {
        return Err(IpcError::InvalidPipeName(name.to_string()));
    }
    Ok(())
}

/// Thread-safe registry mapping pipe names to shared [`Pipe`] handles.
#[derive(Default)]
pub struct NamedPipeRegistry {
    pipes: RwLock<HashMap<String, Arc<Pipe>>>,
}

impl NamedPipeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn create(&self, name: &str, capacity: usize) -> Result<Arc<Pipe>, IpcError> {
        validate_name(name)?;
        let mut pipes = self.pipes.write().await;
        if pipes.contains_key(name) {
            return Err(IpcError::PipeExists(name.to_string()));
        }
        let pipe = Arc::new(Pipe::new(capacity));
        pipes.insert(name.to_string(), pipe.clone());
        Ok(pipe)
    }

    pub async fn open(&self, name: &str) -> Result<Arc<Pipe>, IpcError> {
        self.pipes
            .read()
            .await
            .get(name)
            .cloned()
            .ok_or_else(|| IpcError::PipeNotFound(name.to_string()))
    }

    /// Remove the pipe from the registry, forcing closure of all current
    /// readers/writers attached to it.
    pub async fn remove(&self, name: &str) -> Result<(), IpcError> {
        let pipe = self
            .pipes
            .write()
            .await
            .remove(name)
            .ok_or_else(|| IpcError::PipeNotFound(name.to_string()))?;
        pipe.close().await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn duplicate_name_is_rejected() {
        let reg = NamedPipeRegistry::new();
        reg.create("/mypipe", 16).await.unwrap();
        assert!(matches!(
            reg.create("/mypipe", 16).await,
            Err(IpcError::PipeExists(_))
        ));
    }

    #[tokio::test]
    async fn remove_closes_the_pipe() {
        let reg = NamedPipeRegistry::new();
        let pipe = reg.create("/mypipe", 16).await.unwrap();
        reg.remove("/mypipe").await.unwrap();
        assert!(pipe.is_closed().await);
        assert!(matches!(
            reg.open("/mypipe").await,
            Err(IpcError::PipeNotFound(_))
        ));
    }

    #[tokio::test]
    async fn rejects_invalid_names() {
        let reg = NamedPipeRegistry::new();
        assert!(reg.create("", 16).await.is_err());
        assert!(reg.create("has/slash", 16).await.is_err());
    }
}
