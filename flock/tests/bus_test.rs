#[cfg(test)]
mod tests {
    use serde_json::json;

    use flock::bus::{
        CONTROL_TOPIC, ControlBus, ControlFrame, ControlSignal, MIGRATE_EVENT, REPLACE_EVENT,
    };
    use flock::job::JobRequest;
    use flock::{BusError, JobPayload, WorkerId};

    #[test]
    fn test_migrate_frame_wire_form() {
        let (request, _handle) = JobRequest::new(JobPayload::new("add", json!({ "one": 1, "two": 2 })));
        let signal = ControlSignal::Migrate {
            worker_id: WorkerId::from("9b1d3f0a"),
            jobs: vec![request],
        };

        let frame = serde_json::to_value(signal.to_frame()).unwrap();
        assert_eq!(
            frame,
            json!({
                "event": 1,
                "workerId": "9b1d3f0a",
                "data": [{ "name": "add", "args": { "one": 1, "two": 2 } }]
            })
        );
    }

    #[test]
    fn test_replace_frame_wire_form() {
        let signal = ControlSignal::Replace {
            worker_id: WorkerId::from("9b1d3f0a"),
        };
        assert_eq!(signal.event(), REPLACE_EVENT);

        let frame = serde_json::to_value(signal.to_frame()).unwrap();
        assert_eq!(frame, json!({ "event": 2, "workerId": "9b1d3f0a" }));
    }

    #[test]
    fn test_frame_decoding() {
        let frame = ControlFrame::from_json(json!({
            "event": 1,
            "workerId": "w1",
            "data": [{ "name": "add", "args": [1, 2] }, { "name": "ping" }]
        }))
        .unwrap();

        match ControlSignal::from_frame(frame).unwrap() {
            ControlSignal::Migrate { worker_id, jobs } => {
                assert_eq!(worker_id, WorkerId::from("w1"));
                assert_eq!(jobs.len(), 2);
                assert_eq!(jobs[0].payload, JobPayload::new("add", json!([1, 2])));
                assert_eq!(jobs[1].payload.args, json!(null));
                assert!(!jobs[0].sink.is_resolved());
            }
            other => panic!("expected migrate, got {:?}", other),
        }
    }

    #[test]
    fn test_unknown_event_is_an_error() {
        let frame = ControlFrame::from_json(json!({ "event": 7, "workerId": "w1" })).unwrap();
        assert_eq!(
            ControlSignal::from_frame(frame).unwrap_err(),
            BusError::UnknownEvent {
                event: 7,
                worker_id: "w1".to_string()
            }
        );

        let malformed = ControlFrame::from_json(json!({ "event": "one" }));
        assert!(matches!(malformed, Err(BusError::Malformed(_))));
    }

    #[tokio::test]
    async fn test_publish_reaches_every_subscriber() {
        let bus = ControlBus::new();
        assert_eq!(bus.topic(), CONTROL_TOPIC);

        let mut first = bus.subscribe();
        let mut second = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 2);

        let delivered = bus.publish(ControlSignal::Replace {
            worker_id: WorkerId::from("w1"),
        });
        assert_eq!(delivered, 2);

        for subscription in [&mut first, &mut second] {
            match subscription.recv().await {
                Some(ControlSignal::Replace { worker_id }) => assert_eq!(worker_id.as_str(), "w1"),
                other => panic!("expected replace, got {:?}", other),
            }
        }
    }

    #[test]
    fn test_publish_without_subscribers() {
        let bus = ControlBus::with_topic("elsewhere");
        assert_eq!(bus.topic(), "elsewhere");
        let delivered = bus.publish(ControlSignal::Replace {
            worker_id: WorkerId::from("w1"),
        });
        assert_eq!(delivered, 0);
    }

    #[test]
    fn test_publish_frame_drops_unknown_events() {
        let bus = ControlBus::new();
        let mut subscription = bus.subscribe();

        let unknown = ControlFrame {
            event: 9,
            worker_id: WorkerId::from("w1"),
            data: None,
        };
        assert_eq!(bus.publish_frame(unknown), 0);
        assert!(subscription.try_recv().is_none());

        let migrate = ControlFrame {
            event: MIGRATE_EVENT,
            worker_id: WorkerId::from("w1"),
            data: Some(vec![JobPayload::new("add", json!([1, 2]))]),
        };
        assert_eq!(bus.publish_frame(migrate), 1);
        assert!(matches!(
            subscription.try_recv(),
            Some(ControlSignal::Migrate { .. })
        ));
    }

    #[test]
    fn test_burst_is_delivered_in_order() {
        let bus = ControlBus::new();
        let mut subscription = bus.subscribe();

        let (request, _handle) = JobRequest::new(JobPayload::new("add", json!([1, 2])));
        bus.publish(ControlSignal::Migrate {
            worker_id: WorkerId::from("w0"),
            jobs: vec![request],
        });
        for n in 1..5000 {
            bus.publish(ControlSignal::Replace {
                worker_id: WorkerId::from(format!("w{}", n)),
            });
        }
        assert_eq!(subscription.pending(), 5000);

        match subscription.try_recv() {
            Some(ControlSignal::Migrate { worker_id, jobs }) => {
                assert_eq!(worker_id.as_str(), "w0");
                assert_eq!(jobs.len(), 1);
            }
            other => panic!("expected migrate, got {:?}", other),
        }
        for n in 1..5000 {
            let signal = subscription.try_recv().unwrap();
            assert_eq!(signal.worker_id().as_str(), format!("w{}", n));
        }
        assert!(subscription.try_recv().is_none());
    }

    #[test]
    fn test_dropped_subscriber_is_pruned() {
        let bus = ControlBus::new();
        let kept = bus.subscribe();
        let dropped = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 2);

        drop(dropped);
        assert_eq!(bus.subscriber_count(), 1);
        assert_eq!(
            bus.publish(ControlSignal::Replace {
                worker_id: WorkerId::from("w1"),
            }),
            1
        );
        assert_eq!(kept.pending(), 1);
    }

    #[tokio::test]
    async fn test_recv_ends_when_bus_is_dropped() {
        let bus = ControlBus::new();
        let mut subscription = bus.subscribe();
        drop(bus);
        assert!(subscription.recv().await.is_none());
    }
}
