//! PYTHON_CALLABLE dispatch table.
//!
//! There is no `dlopen`/dynamic import of any kind: callables are registered
//! by the process that builds the composition root, and dispatch resolves
//! an `Arc`-held callable rather than a string naming one at runtime.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::ExecError;

#[async_trait]
pub trait RegisteredCallable: Send + Sync {
    async fn call(&self, args: Value) -> Result<Value, ExecError>;
}

#[derive(Default)]
pub struct PythonCallableRegistry {
    callables: HashMap<String, Arc<dyn RegisteredCallable>>,
}

impl PythonCallableRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, module_path: impl Into<String>, callable: Arc<dyn RegisteredCallable>) {
        self.callables.insert(module_path.into(), callable);
    }

    pub fn get(&self, module_path: &str) -> Option<Arc<dyn RegisteredCallable>> {
        self.callables.get(module_path).cloned()
    }

    pub fn contains(&self, module_path: &str) -> bool {
        self.callables.contains_key(module_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Echo;

    #[async_trait]
    impl RegisteredCallable for Echo {
        async fn call(&self, args: Value) -> Result<Value, ExecError> {
            Ok(args)
        }
    }

    #[tokio::test]
    async fn registered_callable_is_invoked() {
        let mut registry = PythonCallableRegistry::new();
        registry.register("toolgate_tools.echo.run", Arc::new(Echo));

        let callable = registry.get("toolgate_tools.echo.run").unwrap();
        let out = callable.call(serde_json::json!({"x": 1})).await.unwrap();
        assert_eq!(out, serde_json::json!({"x": 1}));
    }
}
