// Notifications - audio thread → control thread, best effort
// Timestamps are in samples since the transport last started

/// Severity of a notification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationLevel {
    Info,
    Warning,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Notification {
    /// One pass over the loop finished
    LoopCompleted { sample_time: u64 },
    /// The queue switched the active sequence
    SequenceAdvanced {
        from: usize,
        to: usize,
        sample_time: u64,
    },
    /// A non-looping pass reached the end and the transport stopped
    TransportStopped { sample_time: u64 },
    /// Events were dropped because a block produced more than fit
    EventsDropped { count: u32, sample_time: u64 },
}

impl Notification {
    pub fn level(&self) -> NotificationLevel {
        match self {
            Notification::EventsDropped { .. } => NotificationLevel::Warning,
            _ => NotificationLevel::Info,
        }
    }

    pub fn sample_time(&self) -> u64 {
        match *self {
            Notification::LoopCompleted { sample_time }
            | Notification::SequenceAdvanced { sample_time, .. }
            | Notification::TransportStopped { sample_time }
            | Notification::EventsDropped { sample_time, .. } => sample_time,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_notification_levels() {
        let advanced = Notification::SequenceAdvanced {
            from: 0,
            to: 3,
            sample_time: 512,
        };
        assert_eq!(advanced.level(), NotificationLevel::Info);
        assert_eq!(advanced.sample_time(), 512);

        let dropped = Notification::EventsDropped {
            count: 4,
            sample_time: 0,
        };
        assert_eq!(dropped.level(), NotificationLevel::Warning);
    }
}
