//! Time-stamped FIFO queue releasing its head once the scheduled time is reached.

use crate::error::SimulationError;

use std::collections::VecDeque;

/// Value waiting in a [`DelayLine`] until `time`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DelayedItem<T> {
    pub time: f64,
    pub value: T,
}

/// Queue of values ordered by non-decreasing scheduled time.
#[derive(Clone, Debug)]
pub struct DelayLine<T> {
    items: VecDeque<DelayedItem<T>>,
}

impl<T> Default for DelayLine<T> {
    fn default() -> Self {
        DelayLine {
            items: VecDeque::new(),
        }
    }
}

impl<T> DelayLine<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a queue from a schedule, checking that times never decrease.
    pub fn from_schedule<I>(schedule: I) -> Result<Self, SimulationError>
    where
        I: IntoIterator<Item = (f64, T)>,
    {
        let mut line = DelayLine::new();
        for (time, value) in schedule {
            line.enqueue(time, value)?;
        }
        Ok(line)
    }

    /// Appends `value` scheduled at `time`.
    pub fn enqueue(&mut self, time: f64, value: T) -> Result<(), SimulationError> {
        if time.is_nan() {
            return Err(SimulationError::InvalidInput(
                "scheduled time is NaN".to_string(),
            ));
        }
        if let Some(last) = self.items.back() {
            if time < last.time {
                return Err(SimulationError::Configuration(format!(
                    "item scheduled at {} is enqueued after one scheduled at {}",
                    time, last.time
                )));
            }
        }
        self.items.push_back(DelayedItem { time, value });
        Ok(())
    }

    /// Returns the head if it is due at `now`.
    pub fn peek_due(&self, now: f64) -> Option<&DelayedItem<T>> {
        self.items.front().filter(|item| item.time <= now)
    }

    pub fn peek(&self) -> Option<&DelayedItem<T>> {
        self.items.front()
    }

    pub fn dequeue(&mut self) -> Option<DelayedItem<T>> {
        self.items.pop_front()
    }

    /// Removes and returns the head if it is due at `now`.
    pub fn pop_due(&mut self, now: f64) -> Option<DelayedItem<T>> {
        if self.peek_due(now).is_some() {
            self.items.pop_front()
        } else {
            None
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn releases_head_only_when_due() {
        let mut line = DelayLine::new();
        line.enqueue(1.0, 'a').unwrap();
        line.enqueue(2.0, 'b').unwrap();
        assert!(line.peek_due(0.5).is_none());
        assert!(line.pop_due(0.99).is_none());
        assert_eq!(line.pop_due(1.0).unwrap().value, 'a');
        assert_eq!(line.peek().unwrap().time, 2.0);
        assert_eq!(line.pop_due(5.0).unwrap().value, 'b');
        assert!(line.is_empty());
        assert!(line.dequeue().is_none());
    }

    #[test]
    fn equal_times_keep_fifo_order() {
        let mut line = DelayLine::from_schedule(vec![(1.0, 1), (1.0, 2)]).unwrap();
        assert_eq!(line.dequeue().unwrap().value, 1);
        assert_eq!(line.dequeue().unwrap().value, 2);
    }

    #[test]
    fn out_of_order_schedule_is_rejected() {
        let res = DelayLine::from_schedule(vec![(2.0, 0.5), (1.0, 0.7)]);
        assert!(matches!(res, Err(SimulationError::Configuration(_))));
    }
}
