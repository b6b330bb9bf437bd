#[cfg(test)]
mod tests {
    use serde_json::{Value, json};

    use flock_api::errors::{ErrorKind, JobError};
    use flock_api::protocol::{JobPayload, ReplyKind, UnitReply, UnitRequest};
    use flock_api::types::{JobId, WorkerId};

    #[test]
    fn test_request_wire_form() {
        let request = UnitRequest {
            id: JobId::from("1f0c9a3e"),
            data: JobPayload::new("add", json!({ "one": 1, "two": 2 })),
        };

        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            json!({ "id": "1f0c9a3e", "data": { "name": "add", "args": { "one": 1, "two": 2 } } })
        );
    }

    #[test]
    fn test_reply_type_codes() {
        let reply: UnitReply =
            serde_json::from_value(json!({ "id": "a", "type": 1, "data": 3 })).unwrap();
        assert_eq!(reply.kind, ReplyKind::Success);
        assert_eq!(reply.into_result("add"), Ok(json!(3)));

        let reply: UnitReply = serde_json::from_value(json!({ "id": "a", "type": 0 })).unwrap();
        assert_eq!(reply.kind, ReplyKind::NotFound);
        assert_eq!(reply.data, Value::Null);

        let encoded = serde_json::to_value(UnitReply::failure(JobId::from("a"), "bad")).unwrap();
        assert_eq!(encoded, json!({ "id": "a", "type": 2, "data": "bad" }));
    }

    #[test]
    fn test_unknown_reply_type_is_rejected() {
        let result = serde_json::from_value::<UnitReply>(json!({ "id": "a", "type": 3 }));
        assert!(result.is_err());
        assert_eq!(ReplyKind::try_from(3), Err("unknown reply type 3".to_string()));
    }

    #[test]
    fn test_reply_into_result() {
        let id = JobId::from("a");

        assert_eq!(
            UnitReply::not_found(id.clone()).into_result("add"),
            Err(JobError::FunctionNotFound("add".to_string()))
        );
        assert_eq!(
            UnitReply::failure(id.clone(), "division by zero").into_result("divide"),
            Err(JobError::Application("division by zero".to_string()))
        );

        // Non-string failure data is passed through as JSON text
        let reply = UnitReply {
            id,
            kind: ReplyKind::Failure,
            data: json!({ "code": 7 }),
        };
        assert_eq!(
            reply.into_result("divide"),
            Err(JobError::Application("{\"code\":7}".to_string()))
        );
    }

    #[test]
    fn test_error_kinds() {
        assert_eq!(JobError::FunctionNotFound("f".into()).kind(), ErrorKind::Job);
        assert_eq!(JobError::Application("e".into()).kind(), ErrorKind::Job);
        assert_eq!(JobError::PoolShutdown.kind(), ErrorKind::Pool);
        assert_eq!(JobError::Lost.kind(), ErrorKind::Pool);
        assert_eq!(
            JobError::PoolSaturated { workers: 5, max_jobs: 2 }.to_string(),
            "Worker pool is saturated (5 workers at 2 jobs each)"
        );
        assert_eq!(JobError::Application("boom".into()).to_string(), "boom");
    }

    #[test]
    fn test_generated_ids() {
        let a = JobId::generate();
        let b = JobId::generate();
        assert_eq!(a.as_str().len(), 8);
        assert_ne!(a, b);

        let worker = WorkerId::generate();
        assert!(worker.as_str().chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(serde_json::to_value(&worker).unwrap(), json!(worker.as_str()));
    }
}
