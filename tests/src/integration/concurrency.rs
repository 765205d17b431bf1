//! In-flight call independence: response reordering, many concurrent
//! calls, channel noise, and pending-table hygiene.

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use serde_json::{json, Value};
    use tokio::time::timeout;

    use rpc_transport::Transport;
    use rpc_types::{codec, CallEnvelope, ResponseEnvelope, TabId};

    use crate::integration::support::ExtensionWorld;

    #[tokio::test]
    async fn responses_arriving_out_of_order_settle_their_own_calls() {
        let world = ExtensionWorld::new();
        world
            .background
            .registry()
            .register_fn("slow", |_args, _sender| async {
                tokio::time::sleep(Duration::from_millis(100)).await;
                Ok(json!("slow"))
            });
        world
            .background
            .registry()
            .register_fn("fast", |_args, _sender| async { Ok(json!("fast")) });
        let tab = world.open_tab(TabId(1));

        // Dispatch the slow call first; its response arrives second.
        let slow = tab.remote_function("slow");
        let fast = tab.remote_function("fast");
        let (slow_result, fast_result) = timeout(Duration::from_secs(2), async {
            tokio::join!(slow.call_raw(vec![]), fast.call_raw(vec![]))
        })
        .await
        .expect("timeout");

        assert_eq!(slow_result.expect("slow resolves"), json!("slow"));
        assert_eq!(fast_result.expect("fast resolves"), json!("fast"));
    }

    #[tokio::test]
    async fn many_concurrent_calls_each_get_their_own_result() {
        let world = ExtensionWorld::new();
        world
            .background
            .registry()
            .register_fn("echo", |args, _sender| async move {
                // Variable latency shuffles response order.
                let n = args.first().and_then(Value::as_u64).unwrap_or_default();
                tokio::time::sleep(Duration::from_millis((n % 7) * 5)).await;
                Ok(args.into_iter().next().unwrap_or(Value::Null))
            });
        let tab = world.open_tab(TabId(1));

        let mut handles = Vec::new();
        for n in 0..20u64 {
            let echo = tab.remote_function("echo");
            handles.push(tokio::spawn(async move { echo.call::<_, u64>((n,)).await }));
        }
        for (n, handle) in handles.into_iter().enumerate() {
            let result = timeout(Duration::from_secs(2), handle)
                .await
                .expect("timeout")
                .expect("task joins")
                .expect("call resolves");
            assert_eq!(result, n as u64);
        }
    }

    #[tokio::test]
    async fn stale_and_foreign_payloads_are_ignored() {
        let world = ExtensionWorld::new();
        world
            .background
            .registry()
            .register_fn("double", |args, _sender| async move {
                let x = args.first().and_then(Value::as_i64).unwrap_or_default();
                Ok(json!(x * 2))
            });

        // A realm that speaks onto the bus without being an RPC endpoint.
        let interferer = world.hub.attach_auxiliary("interferer");

        // A response nobody asked for: unknown call id, must not settle
        // anything or crash the background's dispatch task.
        let phantom_request = CallEnvelope::new("phantom", vec![]);
        let stale = ResponseEnvelope::success(&phantom_request, json!("stale"));
        interferer
            .send_to_background(codec::encode_response(&stale).expect("encodes"))
            .await
            .expect("send is fire-and-forget");

        // Arbitrary foreign traffic on the same channel.
        interferer
            .send_to_background(json!({ "totally": "unrelated" }))
            .await
            .expect("send is fire-and-forget");

        // The layer keeps working.
        let tab = world.open_tab(TabId(1));
        let result: i64 = timeout(
            Duration::from_secs(1),
            tab.remote_function("double").call((21,)),
        )
        .await
        .expect("timeout")
        .expect("call resolves");
        assert_eq!(result, 42);
    }

    #[tokio::test]
    async fn pending_table_is_empty_after_settlement() {
        let world = ExtensionWorld::new();
        world
            .background
            .registry()
            .register_fn("ping", |_args, _sender| async { Ok(json!("pong")) });
        let tab = world.open_tab(TabId(1));

        let _: String = tab.remote_function("ping").call(()).await.expect("resolves");
        assert_eq!(tab.pending_calls(), 0);

        let _ = tab
            .remote_function("doesNotExist")
            .call_raw(vec![])
            .await
            .expect_err("rejects");
        assert_eq!(tab.pending_calls(), 0);
    }
}
