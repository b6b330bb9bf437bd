
#[cfg(test)]
mod tests {
    use std::time::Duration;

    use serde_json::json;
    use tokio::sync::mpsc;
    use tokio::time::timeout;

    use flock::{
        ExecutionUnit, JobId, JobPayload, ReplyKind, ThreadUnitFactory, UnitError, UnitFactory,
        UnitRequest, WorkerId,
    };

    use crate::test_helpers::test_registry;

    fn request(id: &str, name: &str, args: serde_json::Value) -> UnitRequest {
        UnitRequest {
            id: JobId::from(id),
            data: JobPayload::new(name, args),
        }
    }

    #[tokio::test]
    async fn test_unit_runs_requests_in_order() {
        let factory = ThreadUnitFactory::new(test_registry());
        let (tx, mut rx) = mpsc::unbounded_channel();
        let unit = factory.spawn(&WorkerId::from("w1"), tx).unwrap();
        assert!(unit.is_alive());

        unit.post(request("a", "stall", json!(50))).unwrap();
        unit.post(request("b", "add", json!([1, 2]))).unwrap();
        unit.post(request("c", "missing", json!(null))).unwrap();

        let mut replies = Vec::new();
        for _ in 0..3 {
            replies.push(timeout(Duration::from_secs(2), rx.recv()).await.unwrap().unwrap());
        }

        let ids: Vec<_> = replies.iter().map(|reply| reply.id.as_str().to_string()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
        assert_eq!(replies[0].data, json!(50));
        assert_eq!(replies[1].kind, ReplyKind::Success);
        assert_eq!(replies[1].data, json!(3));
        assert_eq!(replies[2].kind, ReplyKind::NotFound);
    }

    #[tokio::test]
    async fn test_invalid_arguments_reply_failure() {
        let factory = ThreadUnitFactory::new(test_registry());
        let (tx, mut rx) = mpsc::unbounded_channel();
        let unit = factory.spawn(&WorkerId::from("w1"), tx).unwrap();

        unit.post(request("a", "add", json!("not a pair"))).unwrap();
        let reply = timeout(Duration::from_secs(2), rx.recv()).await.unwrap().unwrap();

        assert_eq!(reply.kind, ReplyKind::Failure);
        assert!(reply.data.as_str().unwrap().starts_with("invalid arguments for add"));
    }

    #[tokio::test]
    async fn test_terminated_unit_refuses_requests() {
        let factory = ThreadUnitFactory::new(test_registry());
        let (tx, mut rx) = mpsc::unbounded_channel();
        let unit = factory.spawn(&WorkerId::from("w1"), tx).unwrap();

        unit.terminate();
        assert!(!unit.is_alive());
        assert_eq!(
            unit.post(request("a", "add", json!([1, 2]))),
            Err(UnitError::Closed)
        );

        // The thread drops its reply sender on the way out
        let closed = timeout(Duration::from_secs(2), rx.recv()).await.unwrap();
        assert!(closed.is_none());
    }

    #[test]
    fn test_factory_exposes_registry() {
        let factory = ThreadUnitFactory::new(test_registry());
        assert_eq!(factory.registry().names(), vec!["add", "count", "fail", "stall"]);
    }
}
