//! Popup-to-tab relays: realms without a route to tabs reach them through
//! the background, which forwards the request and relays the response.

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use serde_json::json;
    use tokio::time::timeout;

    use rpc_core::{RpcConfig, RpcRole};
    use rpc_types::{RpcError, TabId};

    use crate::integration::support::ExtensionWorld;

    #[tokio::test]
    async fn popup_calls_tab_via_background() {
        let world = ExtensionWorld::new();
        let tab = world.open_tab(TabId(1));
        tab.registry()
            .register_fn("getPageTitle", |_args, _sender| async {
                Ok(json!("Example Domain"))
            });
        let popup = world.open_popup();

        let title: String = timeout(
            Duration::from_secs(1),
            popup
                .remote_function_via_background("getPageTitle", TabId(1))
                .call(()),
        )
        .await
        .expect("timeout")
        .expect("relayed call resolves");
        assert_eq!(title, "Example Domain");
    }

    #[tokio::test]
    async fn proxied_handler_failure_relays_the_rejection() {
        let world = ExtensionWorld::new();
        let tab = world.open_tab(TabId(1));
        tab.registry()
            .register_fn("explode", |_args, _sender| async {
                Err(anyhow::anyhow!("boom"))
            });
        let popup = world.open_popup();

        let err = timeout(
            Duration::from_secs(1),
            popup
                .remote_function_via_background("explode", TabId(1))
                .call_raw(vec![]),
        )
        .await
        .expect("timeout")
        .expect_err("relayed call rejects");

        match err {
            RpcError::Remote { function, message } => {
                assert_eq!(function, "explode");
                assert_eq!(message, "boom");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn proxied_call_to_a_closed_tab_hits_the_deadline() {
        let world = ExtensionWorld::new();
        let popup = world.open_popup();

        // Tab 9 never attached; the background's forward goes nowhere.
        let err = popup
            .remote_function_via_background("getPageTitle", TabId(9))
            .with_timeout(Duration::from_millis(100))
            .call_raw(vec![])
            .await
            .expect_err("rejects at the deadline");

        assert!(matches!(err, RpcError::DeadlineExceeded { .. }));
        assert_eq!(popup.pending_calls(), 0);
    }

    #[tokio::test]
    async fn unanswered_forward_is_evicted_from_the_proxy_table() {
        let world = ExtensionWorld::with_background_config(
            RpcConfig::new("background", RpcRole::Background)
                .proxy_ttl(Duration::from_millis(200)),
        );
        let popup = world.open_popup();

        // Tab 9 never attached: the forward goes nowhere and no response
        // will ever remove the relay entry.
        let err = popup
            .remote_function_via_background("getPageTitle", TabId(9))
            .with_timeout(Duration::from_millis(100))
            .call_raw(vec![])
            .await
            .expect_err("rejects at the deadline");
        assert!(matches!(err, RpcError::DeadlineExceeded { .. }));

        // The caller's own table is clean; the relay entry lingers until
        // its TTL elapses, then is evicted.
        assert_eq!(popup.pending_calls(), 0);
        assert_eq!(world.background.proxied_calls(), 1);

        tokio::time::sleep(Duration::from_millis(300)).await;
        assert_eq!(world.background.proxied_calls(), 0);
    }

    #[tokio::test]
    async fn answered_forward_clears_its_proxy_entry() {
        let world = ExtensionWorld::new();
        let tab = world.open_tab(TabId(1));
        tab.registry()
            .register_fn("getPageTitle", |_args, _sender| async {
                Ok(json!("Example Domain"))
            });
        let popup = world.open_popup();

        let _: String = popup
            .remote_function_via_background("getPageTitle", TabId(1))
            .call(())
            .await
            .expect("relayed call resolves");
        assert_eq!(world.background.proxied_calls(), 0);
    }

    #[tokio::test]
    async fn direct_tab_sends_from_a_popup_go_nowhere() {
        let world = ExtensionWorld::new();
        let tab = world.open_tab(TabId(1));
        tab.registry()
            .register_fn("getPageTitle", |_args, _sender| async {
                Ok(json!("Example Domain"))
            });
        let popup = world.open_popup();

        // Without the relay, only the background can reach a tab; the hub
        // drops the send and the call never settles.
        let err = popup
            .remote_function_in_tab("getPageTitle", TabId(1))
            .with_timeout(Duration::from_millis(100))
            .call_raw(vec![])
            .await
            .expect_err("rejects at the deadline");

        assert!(matches!(err, RpcError::DeadlineExceeded { .. }));
    }
}
