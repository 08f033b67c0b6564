//! Builds a named set of work queues from a [`SchedulerConfig`].

use std::collections::HashMap;

use tracing::info;

use crate::config::SchedulerConfig;
use crate::core::{WorkQueue, WorkQueueError};

/// Build one queue per entry of `cfg.queues`, keyed by its name.
///
/// Queues without their own `config` use `cfg.defaults`.
///
/// # Errors
///
/// [`WorkQueueError::InvalidConfig`] if `cfg` does not validate.
pub fn build_queues(cfg: &SchedulerConfig) -> Result<HashMap<String, WorkQueue>, WorkQueueError> {
    cfg.validate()
        .map_err(|e| WorkQueueError::InvalidConfig(format!("config invalid: {e}")))?;

    let mut queues = HashMap::with_capacity(cfg.queues.len());
    for (name, spec) in &cfg.queues {
        let queue = WorkQueue::with_config(
            spec.priority,
            spec.mode,
            name.clone(),
            cfg.resolve(spec).clone(),
        )?;
        queues.insert(name.clone(), queue);
    }

    info!(count = queues.len(), "work queues built from configuration");
    Ok(queues)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{QueueSpec, WorkQueueConfig};
    use crate::core::{Priority, QueueMode, TeardownMode};

    #[test]
    fn test_build_queues_applies_specs() {
        let mut cfg = SchedulerConfig {
            defaults: WorkQueueConfig::new().with_hardware_concurrency(4),
            queues: HashMap::new(),
        };
        cfg.queues.insert(
            "io".into(),
            QueueSpec {
                priority: Priority::Background,
                mode: QueueMode::Concurrent,
                config: None,
            },
        );
        cfg.queues.insert(
            "ui".into(),
            QueueSpec {
                priority: Priority::High,
                mode: QueueMode::Serial,
                config: Some(WorkQueueConfig::new().with_thread_name_prefix("ui")),
            },
        );

        let queues = build_queues(&cfg).unwrap();
        assert_eq!(queues.len(), 2);

        let io = &queues["io"];
        assert_eq!(io.identifier(), "io");
        assert_eq!(io.mode(), QueueMode::Concurrent);
        assert_eq!(io.max_width(), 2);

        let ui = &queues["ui"];
        assert_eq!(ui.priority(), Priority::High);
        assert_eq!(ui.max_width(), 1);

        for queue in queues.values() {
            queue.shutdown(TeardownMode::Drain);
        }
    }

    #[test]
    fn test_build_queues_rejects_empty_config() {
        let cfg = SchedulerConfig::default();
        assert!(matches!(
            build_queues(&cfg),
            Err(WorkQueueError::InvalidConfig(_))
        ));
    }
}
