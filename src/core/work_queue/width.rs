//! Concurrency width heuristic.

use crate::config::WorkQueueConfig;
use crate::core::policy::{Priority, QueueKind, QueueMode};

/// Upper bound on simultaneously running items for a queue.
pub(crate) fn max_width(kind: QueueKind, priority: Priority, config: &WorkQueueConfig) -> usize {
    match kind {
        QueueKind::Main | QueueKind::Threaded(QueueMode::Serial) => 1,
        QueueKind::Threaded(QueueMode::Concurrent) => {
            let hw = config.hardware_concurrency();
            let cap = match priority {
                Priority::High => hw.saturating_mul(config.high_burst_factor),
                Priority::Default => hw,
                Priority::Background => hw / config.background_divisor,
            };
            config.max_width.map_or(cap, |limit| cap.min(limit)).max(1)
        }
    }
}

/// Width to use right now given `outstanding` (queued plus running) items.
///
/// Never below 1 and never above `cap`; never below `outstanding` while that
/// fits under the cap, so `running <= width` holds after every recomputation.
pub(crate) fn target_width(cap: usize, outstanding: usize) -> usize {
    outstanding.clamp(1, cap.max(1))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg(hw: usize) -> WorkQueueConfig {
        WorkQueueConfig::new().with_hardware_concurrency(hw)
    }

    const CONCURRENT: QueueKind = QueueKind::Threaded(QueueMode::Concurrent);

    #[test]
    fn test_serial_and_main_pinned() {
        let config = cfg(8);
        assert_eq!(max_width(QueueKind::Threaded(QueueMode::Serial), Priority::High, &config), 1);
        assert_eq!(max_width(QueueKind::Main, Priority::Default, &config), 1);
    }

    #[test]
    fn test_priority_caps() {
        let config = cfg(8);
        assert_eq!(max_width(CONCURRENT, Priority::High, &config), 16);
        assert_eq!(max_width(CONCURRENT, Priority::Default, &config), 8);
        assert_eq!(max_width(CONCURRENT, Priority::Background, &config), 4);
        assert_eq!(max_width(CONCURRENT, Priority::Background, &cfg(1)), 1);
    }

    #[test]
    fn test_explicit_cap_wins() {
        let config = cfg(8).with_max_width(3);
        assert_eq!(max_width(CONCURRENT, Priority::High, &config), 3);
    }

    #[test]
    fn test_target_tracks_outstanding() {
        assert_eq!(target_width(8, 0), 1);
        assert_eq!(target_width(8, 5), 5);
        assert_eq!(target_width(8, 50), 8);
    }
}
