//! Communicator Module Tests
//!
//! Runs the communicator against an in-memory transport that records every
//! request and answers according to a per-address behavior.
//!
//! ## Test Scopes
//! - **Wire shape**: Method names, parameter signatures and payload contents.
//! - **Outcomes**: Success, transport failure, refused connection, timeout, stale activation.
//! - **Independence**: A failing or hanging node never delays another node's completion.
//! - **Reconfiguration**: `propagate_options` affects only subsequent calls.

#[cfg(test)]
mod tests {
    use crate::codec::{BundleCodec, CompressionType};
    use crate::communicator::protocol::{
        ACTIVATE_CLUSTER_STATE_VERSION_METHOD, SET_DISTRIBUTION_STATES_METHOD,
    };
    use crate::communicator::{
        CommunicatorOptions, NodeCommunicator, NodeTarget, RpcRequest, RpcResponse, RpcSession,
        RpcTransport, RpcValue,
    };
    use crate::error::RpcError;
    use crate::state::{ClusterState, FeedBlock, NodeType, State, StateBundle};
    use crate::timeout::{ManualClock, TimeoutConfig};

    use async_trait::async_trait;
    use dashmap::DashMap;
    use parking_lot::Mutex;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tokio::sync::oneshot::error::TryRecvError;

    // ============================================================
    // FAKE TRANSPORT
    // ============================================================

    #[derive(Debug, Clone, Copy)]
    enum Behavior {
        /// Publish: empty reply. Activate: echo the requested version.
        Ack,
        /// Activate replies with this version regardless of the request.
        ActiveVersion(i32),
        Fail,
        Hang,
        RefuseConnect,
        HangConnect,
    }

    #[derive(Default)]
    struct FakeCluster {
        behaviors: DashMap<String, Behavior>,
        calls: Mutex<Vec<(String, RpcRequest, Duration)>>,
        connects: AtomicUsize,
        clock: Option<Arc<ManualClock>>,
        call_latency: Duration,
    }

    impl FakeCluster {
        fn behavior(&self, address: &str) -> Behavior {
            self.behaviors
                .get(address)
                .map(|entry| *entry.value())
                .unwrap_or(Behavior::Ack)
        }

        fn calls_to(&self, address: &str) -> Vec<(RpcRequest, Duration)> {
            self.calls
                .lock()
                .iter()
                .filter(|(addr, _, _)| addr == address)
                .map(|(_, request, timeout)| (request.clone(), *timeout))
                .collect()
        }
    }

    struct FakeTransport(Arc<FakeCluster>);

    struct FakeSession {
        address: String,
        cluster: Arc<FakeCluster>,
    }

    #[async_trait]
    impl RpcTransport for FakeTransport {
        async fn connect(&self, target: &NodeTarget) -> Result<Arc<dyn RpcSession>, RpcError> {
            self.0.connects.fetch_add(1, Ordering::SeqCst);
            match self.0.behavior(&target.address) {
                Behavior::RefuseConnect => {
                    return Err(RpcError::Transport("connection refused".to_string()));
                }
                Behavior::HangConnect => return std::future::pending().await,
                _ => {}
            }
            Ok(Arc::new(FakeSession {
                address: target.address.clone(),
                cluster: self.0.clone(),
            }))
        }
    }

    #[async_trait]
    impl RpcSession for FakeSession {
        async fn invoke(&self, request: RpcRequest, timeout: Duration) -> Result<RpcResponse, RpcError> {
            self.cluster
                .calls
                .lock()
                .push((self.address.clone(), request.clone(), timeout));
            if let Some(clock) = &self.cluster.clock {
                clock.advance(self.cluster.call_latency);
            }

            match self.cluster.behavior(&self.address) {
                Behavior::Ack | Behavior::RefuseConnect | Behavior::HangConnect => {
                    if request.method == ACTIVATE_CLUSTER_STATE_VERSION_METHOD {
                        Ok(RpcResponse::int32(request.activate_params()?))
                    } else {
                        Ok(RpcResponse::empty())
                    }
                }
                Behavior::ActiveVersion(version) => Ok(RpcResponse::int32(version)),
                Behavior::Fail => Err(RpcError::Transport("connection reset by peer".to_string())),
                Behavior::Hang => std::future::pending().await,
            }
        }
    }

    fn fixed_options(max_ms: u64) -> CommunicatorOptions {
        CommunicatorOptions {
            timeout: TimeoutConfig::new(Duration::from_millis(max_ms), 100, 100).unwrap(),
            ..CommunicatorOptions::default()
        }
    }

    fn setup(options: CommunicatorOptions) -> (Arc<FakeCluster>, Arc<NodeCommunicator>) {
        let cluster = Arc::new(FakeCluster::default());
        let communicator =
            NodeCommunicator::new(Arc::new(FakeTransport(cluster.clone())), options, Duration::ZERO)
                .unwrap();
        (cluster, communicator)
    }

    fn storage(key: u16) -> NodeTarget {
        NodeTarget::new(NodeType::Storage, key, format!("node-{}", key))
    }

    fn sample_bundle(version: u32) -> StateBundle {
        let baseline = ClusterState::new(version, 3, 3)
            .with_node_state(NodeType::Storage, 1, State::Down)
            .unwrap();
        StateBundle::builder(baseline.clone())
            .spaced_state("default", baseline)
            .deferred_activation(true)
            .feed_block(FeedBlock::blocked("disk full on storage.2"))
            .build()
    }

    // ============================================================
    // WIRE SHAPE
    // ============================================================

    #[tokio::test]
    async fn test_publish_sends_one_bix_request_with_decodable_payload() {
        let (cluster, communicator) = setup(CommunicatorOptions::default());
        let bundle = sample_bundle(17);

        let reply = communicator
            .publish_state(&bundle, storage(0))
            .await
            .expect("completion dropped");

        assert!(reply.is_success());
        assert_eq!(reply.version, 17);
        let calls = cluster.calls_to("node-0");
        assert_eq!(calls.len(), 1);
        let request = &calls[0].0;
        assert_eq!(request.method, SET_DISTRIBUTION_STATES_METHOD);
        assert_eq!(request.signature(), "bix");

        let (compression, size, payload) = request.publish_params().unwrap();
        let decoded = BundleCodec::default()
            .decode_parts(compression, size, payload)
            .unwrap();
        assert_eq!(decoded, bundle);
    }

    #[tokio::test]
    async fn test_activate_sends_single_int32_version() {
        let (cluster, communicator) = setup(CommunicatorOptions::default());

        let reply = communicator
            .activate_version(12345, storage(1))
            .await
            .expect("completion dropped");

        assert_eq!(reply.result.unwrap(), 12345);
        let calls = cluster.calls_to("node-1");
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0.method, ACTIVATE_CLUSTER_STATE_VERSION_METHOD);
        assert_eq!(calls[0].0.signature(), "i");
        assert_eq!(calls[0].0.params, vec![RpcValue::Int32(12345)]);
    }

    #[tokio::test]
    async fn test_encoded_bundle_is_shared_across_nodes() {
        let (cluster, communicator) = setup(CommunicatorOptions::default());
        let bundle = sample_bundle(3);
        let encoded = Arc::new(communicator.codec().encode(&bundle).unwrap());

        let completions: Vec<_> = (0..3)
            .map(|key| communicator.publish_encoded(encoded.clone(), bundle.version(), storage(key)))
            .collect();
        for completion in completions {
            assert!(completion.await.unwrap().is_success());
        }

        for key in 0..3 {
            let calls = cluster.calls_to(&format!("node-{}", key));
            assert_eq!(calls.len(), 1);
            assert_eq!(
                calls[0].0.params[2],
                RpcValue::Data(encoded.payload.clone())
            );
        }
    }

    // ============================================================
    // OUTCOMES
    // ============================================================

    #[tokio::test]
    async fn test_stale_activation_is_reported() {
        let (cluster, communicator) = setup(CommunicatorOptions::default());
        cluster
            .behaviors
            .insert("node-2".to_string(), Behavior::ActiveVersion(7));

        let reply = communicator.activate_version(8, storage(2)).await.unwrap();

        match reply.result {
            Err(RpcError::StaleActivation { requested, actual }) => {
                assert_eq!(requested, 8);
                assert_eq!(actual, 7);
            }
            other => panic!("expected stale activation, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_activation_with_version_beyond_int32_fails_without_dispatch() {
        let (cluster, communicator) = setup(CommunicatorOptions::default());

        let reply = communicator
            .activate_version(u32::MAX, storage(0))
            .await
            .unwrap();

        assert!(matches!(reply.result, Err(RpcError::Codec(_))));
        assert!(cluster.calls.lock().is_empty());
    }

    #[tokio::test]
    async fn test_transport_error_is_delivered_and_session_evicted() {
        let (cluster, communicator) = setup(CommunicatorOptions::default());
        cluster.behaviors.insert("node-0".to_string(), Behavior::Fail);

        let reply = communicator
            .publish_state(&sample_bundle(1), storage(0))
            .await
            .unwrap();

        assert!(matches!(reply.result, Err(RpcError::Transport(_))));
        assert_eq!(communicator.cached_session_count(), 0);

        cluster.behaviors.insert("node-0".to_string(), Behavior::Ack);
        let reply = communicator
            .publish_state(&sample_bundle(2), storage(0))
            .await
            .unwrap();

        assert!(reply.is_success());
        assert_eq!(cluster.connects.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_sessions_are_reused_between_calls() {
        let (cluster, communicator) = setup(CommunicatorOptions::default());

        communicator
            .publish_state(&sample_bundle(1), storage(0))
            .await
            .unwrap();
        communicator.activate_version(1, storage(0)).await.unwrap();

        assert_eq!(cluster.connects.load(Ordering::SeqCst), 1);
        assert_eq!(communicator.cached_session_count(), 1);
    }

    #[tokio::test]
    async fn test_refused_connection_is_a_failure_outcome() {
        let (cluster, communicator) = setup(CommunicatorOptions::default());
        cluster
            .behaviors
            .insert("node-4".to_string(), Behavior::RefuseConnect);

        let reply = communicator
            .publish_state(&sample_bundle(1), storage(4))
            .await
            .unwrap();

        assert!(matches!(reply.result, Err(RpcError::Transport(_))));
        assert!(cluster.calls_to("node-4").is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_unresponsive_node_times_out() {
        let (cluster, communicator) = setup(fixed_options(2_000));
        cluster.behaviors.insert("node-0".to_string(), Behavior::Hang);

        let reply = communicator
            .publish_state(&sample_bundle(1), storage(0))
            .await
            .unwrap();

        match reply.result {
            Err(RpcError::Timeout(timeout)) => assert_eq!(timeout, Duration::from_millis(2_000)),
            other => panic!("expected timeout, got {:?}", other),
        }
        // A timed out session stays usable; only transport errors evict it.
        assert_eq!(communicator.cached_session_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_hanging_connect_is_bounded_by_call_timeout() {
        let (cluster, communicator) = setup(fixed_options(1_000));
        cluster
            .behaviors
            .insert("node-5".to_string(), Behavior::HangConnect);

        let reply = tokio::time::timeout(
            Duration::from_secs(3_600),
            communicator.activate_version(1, storage(5)),
        )
        .await
        .expect("call never completed")
        .unwrap();

        match reply.result {
            Err(RpcError::Timeout(timeout)) => assert_eq!(timeout, Duration::from_millis(1_000)),
            other => panic!("expected timeout, got {:?}", other),
        }
        assert!(cluster.calls_to("node-5").is_empty());
        assert_eq!(communicator.cached_session_count(), 0);
    }

    #[tokio::test]
    async fn test_session_is_replaced_when_node_address_changes() {
        let (cluster, communicator) = setup(CommunicatorOptions::default());
        communicator.activate_version(1, storage(0)).await.unwrap();

        let moved = NodeTarget::new(NodeType::Storage, 0, "node-0-moved");
        let reply = communicator.activate_version(2, moved).await.unwrap();

        assert!(reply.is_success());
        assert_eq!(cluster.connects.load(Ordering::SeqCst), 2);
        assert_eq!(cluster.calls_to("node-0").len(), 1);
        assert_eq!(cluster.calls_to("node-0-moved").len(), 1);
        assert_eq!(communicator.cached_session_count(), 1);
    }

    #[tokio::test]
    async fn test_round_trip_measured_with_injected_clock() {
        let clock = Arc::new(ManualClock::new());
        let cluster = Arc::new(FakeCluster {
            clock: Some(clock.clone()),
            call_latency: Duration::from_millis(25),
            ..FakeCluster::default()
        });
        let communicator = NodeCommunicator::with_clock(
            Arc::new(FakeTransport(cluster.clone())),
            CommunicatorOptions::default(),
            Duration::ZERO,
            clock,
        )
        .unwrap();

        let reply = communicator.activate_version(4, storage(0)).await.unwrap();

        assert_eq!(reply.round_trip, Duration::from_millis(25));
    }

    #[tokio::test]
    async fn test_dropped_completion_does_not_disturb_other_calls() {
        let (cluster, communicator) = setup(CommunicatorOptions::default());

        drop(communicator.publish_state(&sample_bundle(1), storage(0)));
        let reply = communicator
            .publish_state(&sample_bundle(1), storage(1))
            .await
            .unwrap();

        assert!(reply.is_success());
        assert_eq!(cluster.calls_to("node-1").len(), 1);
    }

    // ============================================================
    // INDEPENDENCE
    // ============================================================

    #[tokio::test(start_paused = true)]
    async fn test_failing_and_hanging_nodes_do_not_delay_others() {
        let (cluster, communicator) = setup(fixed_options(30_000));
        cluster.behaviors.insert("node-0".to_string(), Behavior::Fail);
        cluster.behaviors.insert("node-1".to_string(), Behavior::Hang);
        let bundle = sample_bundle(5);

        let failing = communicator.publish_state(&bundle, storage(0));
        let mut hanging = communicator.publish_state(&bundle, storage(1));
        let healthy = communicator.publish_state(&bundle, storage(2));

        let started = tokio::time::Instant::now();
        let healthy = healthy.await.unwrap();
        let failing = failing.await.unwrap();

        assert!(healthy.is_success());
        assert!(matches!(failing.result, Err(RpcError::Transport(_))));
        assert!(started.elapsed() < Duration::from_millis(30_000));
        assert!(matches!(hanging.try_recv(), Err(TryRecvError::Empty)));

        let hanging = hanging.await.unwrap();
        assert!(matches!(hanging.result, Err(RpcError::Timeout(_))));
    }

    // ============================================================
    // RECONFIGURATION
    // ============================================================

    #[tokio::test]
    async fn test_propagated_options_apply_to_subsequent_calls() {
        let (cluster, communicator) = setup(fixed_options(5_000));

        communicator.activate_version(1, storage(0)).await.unwrap();
        communicator.propagate_options(fixed_options(1_234)).unwrap();
        communicator.activate_version(2, storage(0)).await.unwrap();

        let timeouts: Vec<Duration> = cluster
            .calls_to("node-0")
            .into_iter()
            .map(|(_, timeout)| timeout)
            .collect();
        assert_eq!(
            timeouts,
            vec![Duration::from_millis(5_000), Duration::from_millis(1_234)]
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_publishes_never_mix_options() {
        let plain = CommunicatorOptions {
            compression: CompressionType::None,
            ..fixed_options(1_000)
        };
        let compact = CommunicatorOptions {
            compression: CompressionType::HighRatio,
            ..fixed_options(250)
        };
        let (cluster, communicator) = setup(plain.clone());
        let mut baseline = ClusterState::new(1, 100, 100);
        for index in 0..100 {
            baseline
                .set_node_state(NodeType::Storage, index, State::Down)
                .unwrap();
        }
        let bundle = Arc::new(StateBundle::of_baseline_only(baseline));

        let publishers: Vec<_> = (0..4)
            .map(|key| {
                let communicator = communicator.clone();
                let bundle = bundle.clone();
                tokio::spawn(async move {
                    for _ in 0..200 {
                        communicator
                            .publish_state(&bundle, storage(key))
                            .await
                            .unwrap();
                    }
                })
            })
            .collect();

        for i in 0..400 {
            let next = if i % 2 == 0 { compact.clone() } else { plain.clone() };
            communicator.propagate_options(next).unwrap();
            tokio::task::yield_now().await;
        }
        for publisher in publishers {
            publisher.await.unwrap();
        }

        let calls = cluster.calls.lock();
        assert_eq!(calls.len(), 800);
        for (_, request, timeout) in calls.iter() {
            let (compression, _, _) = request.publish_params().unwrap();
            let expected = if *timeout == Duration::from_millis(1_000) {
                CompressionType::None.id()
            } else {
                assert_eq!(*timeout, Duration::from_millis(250));
                CompressionType::HighRatio.id()
            };
            assert_eq!(
                compression, expected,
                "timeout {:?} sent with compression id {}",
                timeout, compression
            );
        }
    }

    #[tokio::test]
    async fn test_invalid_options_are_rejected_and_previous_kept() {
        let (_cluster, communicator) = setup(fixed_options(5_000));
        let mut invalid = fixed_options(1_000);
        invalid.timeout.start_percent = 99;
        invalid.timeout.stop_percent = 10;

        assert!(communicator.propagate_options(invalid).is_err());
        assert_eq!(communicator.options().timeout.max_timeout_ms, 5_000);
        assert_eq!(communicator.timeouts().config().max_timeout_ms, 5_000);
    }

    #[tokio::test]
    async fn test_latency_hint_extends_timeout() {
        let (cluster, communicator) = setup(fixed_options(1_000));
        let target = storage(0).with_latency_hint(Duration::from_millis(300));

        communicator.activate_version(1, target).await.unwrap();

        assert_eq!(cluster.calls_to("node-0")[0].1, Duration::from_millis(1_300));
    }

    #[tokio::test]
    async fn test_distribution_bits_mismatch_is_diagnostic_only() {
        let (cluster, communicator) = setup(CommunicatorOptions::default());
        let bundle = StateBundle::of_baseline_only(ClusterState::new(9, 1, 1).with_distribution_bits(8).unwrap());

        let reply = communicator.publish_state(&bundle, storage(0)).await.unwrap();

        assert!(reply.is_success());
        assert_eq!(cluster.calls_to("node-0").len(), 1);
    }

    #[test]
    fn test_options_deserialize_from_partial_json() {
        let options: CommunicatorOptions = serde_json::from_str(
            r#"{"timeout": {"max_timeout_ms": 10000}, "compression": "HighRatio"}"#,
        )
        .unwrap();

        assert_eq!(options.timeout.max_timeout_ms, 10_000);
        assert_eq!(options.timeout.start_percent, 80);
        assert_eq!(options.distribution_bits, 16);
        assert_eq!(options.compression, crate::codec::CompressionType::HighRatio);
    }
}
