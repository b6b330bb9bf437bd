// Integration tests for flock::config

use std::time::Duration;

use flock::PoolError;
use flock::config::*;

#[test]
fn test_pool_config_defaults() {
    let config = PoolConfig::default();

    assert_eq!(config.min_workers, 3);
    assert_eq!(config.max_workers, 10);
    assert_eq!(config.max_idle_time, Duration::from_millis(30_000));
    assert_eq!(config.switch_queue_time, Duration::from_millis(10_000));
    assert_eq!(config.max_jobs_per_worker, 150);
    assert_eq!(config.max_jobs_per_worker, DEFAULT_MAX_JOBS_PER_WORKER);
    assert!(config.validate().is_ok());
}

#[test]
fn test_builders_and_agent_slice() {
    let config = PoolConfig::default()
        .with_min_workers(1)
        .with_max_workers(4)
        .with_max_idle_time(Duration::from_secs(5))
        .with_switch_queue_time(Duration::from_millis(250))
        .with_max_jobs_per_worker(8);

    assert_eq!(config.min_workers, 1);
    assert_eq!(config.max_workers, 4);

    let agent = config.agent_config();
    assert_eq!(agent.max_jobs, 8);
    assert_eq!(agent.switch_queue_time, Duration::from_millis(250));
    assert_eq!(agent.max_idle_time, Duration::from_secs(5));
    assert_eq!(AgentConfig::default(), PoolConfig::default().agent_config());
}

#[test]
fn test_validate_rejects_unusable_values() {
    let invalid = [
        PoolConfig::default().with_max_workers(0).with_min_workers(0),
        PoolConfig::default().with_min_workers(4).with_max_workers(3),
        PoolConfig::default().with_max_jobs_per_worker(0),
        PoolConfig::default().with_max_idle_time(Duration::ZERO),
        PoolConfig::default().with_switch_queue_time(Duration::ZERO),
    ];

    for config in invalid {
        match config.validate() {
            Err(PoolError::InvalidConfig(_)) => {}
            other => panic!("expected invalid config for {:?}, got {:?}", config, other),
        }
    }
}

#[test]
fn test_min_workers_may_be_zero() {
    let config = PoolConfig::default().with_min_workers(0);
    assert!(config.validate().is_ok());
}

#[test]
fn test_config_for_available_cpus() {
    let config = PoolConfig::for_available_cpus();
    assert_eq!(config.max_workers, num_cpus::get().max(1));
    assert!(config.min_workers <= config.max_workers);
    assert!(config.validate().is_ok());
}
