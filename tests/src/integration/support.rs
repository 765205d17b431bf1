//! Shared fixtures: a browser-extension-shaped world of realms wired over
//! the in-memory hub.

use std::sync::Arc;

use rpc_core::{setup_rpc_connection, RpcConfig, RpcConnection, RpcRole};
use rpc_transport::MemoryHub;
use rpc_types::TabId;

/// One hub plus an attached background realm; tabs and popups are opened
/// on demand.
pub struct ExtensionWorld {
    pub hub: MemoryHub,
    pub background: RpcConnection,
}

impl ExtensionWorld {
    /// A world with a live background realm.
    pub fn new() -> Self {
        Self::with_background_config(RpcConfig::new("background", RpcRole::Background))
    }

    /// A world whose background starts with the given config (e.g. paused).
    pub fn with_background_config(config: RpcConfig) -> Self {
        let hub = MemoryHub::new();
        let background = setup_rpc_connection(Arc::new(hub.attach_background()), config)
            .expect("background subscribes once");
        Self { hub, background }
    }

    /// Attach a tab's content-script realm.
    pub fn open_tab(&self, tab: TabId) -> RpcConnection {
        setup_rpc_connection(
            Arc::new(self.hub.attach_tab(tab)),
            RpcConfig::new(format!("content-script|{tab}"), RpcRole::Content),
        )
        .expect("tab subscribes once")
    }

    /// Attach a popup realm (tab-less, not addressable by name).
    pub fn open_popup(&self) -> RpcConnection {
        setup_rpc_connection(
            Arc::new(self.hub.attach_auxiliary("popup")),
            RpcConfig::new("popup", RpcRole::Content),
        )
        .expect("popup subscribes once")
    }
}

/// Opt into log output for a test run via `RUST_LOG`.
#[allow(dead_code)]
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}
