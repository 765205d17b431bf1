//! # Test Doubles
//!
//! In-memory fakes for the registry contract: the same async calling
//! convention as the real call side, with no envelopes and no transport in
//! between. Exists because the real transport needs a live host bus that
//! unit tests don't have; production and test code share call sites.

use std::collections::HashMap;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use rpc_types::{codec, RpcError, SenderInfo};

use crate::registry::{FunctionRegistry, Handler};

/// A fake call side backed directly by a [`FunctionRegistry`].
pub struct FakeRemoteFunctions {
    registry: Arc<FunctionRegistry>,
}

/// Build a fake call side from a name→handler map.
#[must_use]
pub fn fake_remote_functions<I>(handlers: I) -> FakeRemoteFunctions
where
    I: IntoIterator<Item = (String, Handler)>,
{
    let registry = Arc::new(FunctionRegistry::new());
    for (name, handler) in handlers {
        registry.register(name, handler);
    }
    FakeRemoteFunctions { registry }
}

impl FakeRemoteFunctions {
    /// Build from an already-prepared registry.
    #[must_use]
    pub fn from_registry(registry: Arc<FunctionRegistry>) -> Self {
        Self { registry }
    }

    /// Callable handle with the same convention as
    /// [`crate::RpcConnection::remote_function`].
    #[must_use]
    pub fn remote_function(&self, name: &str) -> FakeRemoteFunction {
        FakeRemoteFunction {
            registry: self.registry.clone(),
            function: name.to_owned(),
        }
    }
}

/// A callable fake for one named function.
#[derive(Clone)]
pub struct FakeRemoteFunction {
    registry: Arc<FunctionRegistry>,
    function: String,
}

impl FakeRemoteFunction {
    /// Invoke with a typed argument pack, as [`crate::RemoteFunction::call`].
    pub async fn call<A, R>(&self, args: A) -> Result<R, RpcError>
    where
        A: Serialize,
        R: DeserializeOwned,
    {
        let args = codec::to_args(&self.function, &args)?;
        let value = self.call_raw(args).await?;
        serde_json::from_value(value).map_err(|source| RpcError::Deserialize {
            function: self.function.clone(),
            source,
        })
    }

    /// Invoke with pre-encoded JSON arguments.
    pub async fn call_raw(&self, args: Vec<Value>) -> Result<Value, RpcError> {
        let Some(handler) = self.registry.lookup(&self.function) else {
            return Err(RpcError::NoSuchFunction {
                function: self.function.clone(),
            });
        };
        handler(args, SenderInfo::default())
            .await
            .map_err(|error| RpcError::Remote {
                function: self.function.clone(),
                message: error.to_string(),
            })
    }
}
