//! Training hooks, called after every batch and epoch.

use std::sync::Mutex;
use tracing::info;

/// Per-epoch summary handed to hooks.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EpochSummary {
    pub epoch: u32,
    pub mean_loss: f64,
    pub exact_match: Option<f64>,
    pub f1: Option<f64>,
}

pub trait TrainingHook: Send + Sync {
    fn at_iteration_end(&self, epoch: u32, iteration: usize, loss: f64);

    fn at_epoch_end(&self, summary: &EpochSummary);
}

/// Logs a running mean of the batch loss every `interval` iterations.
pub struct LossHook {
    interval: usize,
    state: Mutex<(f64, u64)>,
}

impl LossHook {
    #[must_use]
    pub fn new(interval: usize) -> Self {
        Self { interval: interval.max(1), state: Mutex::new((0.0, 0)) }
    }
}

impl TrainingHook for LossHook {
    fn at_iteration_end(&self, epoch: u32, iteration: usize, loss: f64) {
        if let Ok(mut state) = self.state.lock() {
            state.0 += loss;
            state.1 += 1;
            if (iteration + 1) % self.interval == 0 {
                let mean = state.0 / state.1 as f64;
                info!(epoch, iteration, mean_loss = mean, "training");
            }
        }
    }

    fn at_epoch_end(&self, summary: &EpochSummary) {
        info!(
            epoch = summary.epoch,
            mean_loss = summary.mean_loss,
            exact_match = summary.exact_match,
            f1 = summary.f1,
            "epoch finished"
        );
        if let Ok(mut state) = self.state.lock() {
            *state = (0.0, 0);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_loss_hook_accumulates_and_resets() {
        let hook = LossHook::new(2);
        hook.at_iteration_end(1, 0, 1.0);
        hook.at_iteration_end(1, 1, 0.0);
        {
            let state = hook.state.lock().unwrap();
            assert_eq!(state.1, 2);
        }
        hook.at_epoch_end(&EpochSummary {
            epoch: 1,
            mean_loss: 0.5,
            exact_match: None,
            f1: None,
        });
        let state = hook.state.lock().unwrap();
        assert_eq!(state.1, 0);
    }
}
