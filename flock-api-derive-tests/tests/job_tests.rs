use flock_api::{job, JobFunction};
use serde::{Deserialize, Serialize};
use serde_json::json;

#[derive(Debug, Deserialize)]
struct Pair {
    one: i64,
    two: i64,
}

#[derive(Debug, Serialize, PartialEq)]
struct Stats {
    count: usize,
    total: i64,
}

#[derive(Debug, thiserror::Error)]
enum DivideError {
    #[error("division by zero")]
    ByZero,
}

// Test basic job without any attributes
#[job]
fn add(args: Pair) -> i64 {
    args.one + args.two
}

// Test async job
#[job]
async fn add_later(args: Pair) -> i64 {
    tokio::task::yield_now().await;
    args.one + args.two
}

// Test fallible job
#[job]
fn divide(args: Pair) -> Result<i64, DivideError> {
    if args.two == 0 {
        return Err(DivideError::ByZero);
    }
    Ok(args.one / args.two)
}

// Test job without arguments
#[job]
fn ping() -> String {
    "pong".to_string()
}

// Test custom name and handler
#[job(name = "sum", handler = "Summation")]
fn add_all(values: Vec<i64>) -> Stats {
    Stats {
        count: values.len(),
        total: values.iter().sum(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_basic_job() {
        assert_eq!(AddJob.name(), "add");
        let result = AddJob.call(json!({ "one": 2, "two": 3 })).await;
        assert_eq!(result, Ok(json!(5)));

        // The annotated function stays callable
        assert_eq!(add(Pair { one: 1, two: 1 }), 2);
    }

    #[tokio::test]
    async fn test_async_job() {
        assert_eq!(AddLaterJob.name(), "add_later");
        let result = AddLaterJob.call(json!({ "one": 40, "two": 2 })).await;
        assert_eq!(result, Ok(json!(42)));
    }

    #[tokio::test]
    async fn test_fallible_job() {
        let ok = DivideJob.call(json!({ "one": 9, "two": 3 })).await;
        assert_eq!(ok, Ok(json!(3)));

        let err = DivideJob.call(json!({ "one": 9, "two": 0 })).await;
        assert_eq!(err, Err("division by zero".to_string()));
    }

    #[tokio::test]
    async fn test_job_without_arguments() {
        let result = PingJob.call(serde_json::Value::Null).await;
        assert_eq!(result, Ok(json!("pong")));
    }

    #[tokio::test]
    async fn test_custom_name_and_handler() {
        assert_eq!(Summation.name(), "sum");
        let result = Summation.call(json!([1, 2, 3, 4])).await;
        assert_eq!(result, Ok(json!({ "count": 4, "total": 10 })));
    }

    #[tokio::test]
    async fn test_invalid_arguments() {
        let result = AddJob.call(json!({ "one": "not a number" })).await;
        let message = result.unwrap_err();
        assert!(message.starts_with("invalid arguments for add"), "{}", message);
    }

    #[test]
    fn test_handler_is_object_safe() {
        let handlers: Vec<Box<dyn JobFunction>> = vec![
            Box::new(AddJob),
            Box::new(DivideJob),
            Box::new(Summation),
        ];
        let names: Vec<&str> = handlers.iter().map(|h| h.name()).collect();
        assert_eq!(names, vec!["add", "divide", "sum"]);
    }
}
