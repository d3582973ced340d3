//! Scripted policy that answers from a fixed queue and records every call.
//!
//! Used to drive the search deterministically when testing the driver
//! contract: which callbacks fire, in which order, and at what depth.

use std::collections::VecDeque;

use crate::{Result, error::AggregateError, network::Network};

use super::{AggregationPolicy, SearchState, SelectRequest, Selection};

/// One callback observed by a [`ReplayPolicy`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ReplayRecord {
    /// `step` was consulted.
    Step {
        /// Step counter passed by the driver.
        steps: usize,
        /// Whether the policy allowed the search to continue.
        proceed: bool,
    },
    /// `select` was consulted.
    Select {
        /// The unmet connector.
        request: SelectRequest,
        /// Search depth at the time of the request.
        depth: usize,
        /// The scripted answer.
        answer: Option<Selection>,
    },
    /// A frame was pushed; `frames` is the depth after the push.
    Push {
        /// Frames held after the push.
        frames: usize,
    },
    /// A frame was popped; `frames` is the depth after the pop.
    Pop {
        /// Frames held after the pop.
        frames: usize,
    },
    /// A network was accepted.
    Solution {
        /// Instances in the accepted network.
        instances: usize,
        /// Edges in the accepted network.
        edges: usize,
    },
}

/// Policy replaying a prepared sequence of selections.
///
/// Once the script is exhausted every further `select` returns `None`.
///
/// # Examples
/// ```
/// use kumiko_core::{ReplayPolicy, Selection, TemplateId};
///
/// let policy = ReplayPolicy::new([Some(Selection::Fresh(TemplateId::new(0))), None]);
/// assert_eq!(policy.remaining(), 2);
/// assert!(policy.records().is_empty());
/// ```
#[derive(Clone, Debug)]
pub struct ReplayPolicy {
    script: VecDeque<Option<Selection>>,
    records: Vec<ReplayRecord>,
    frames: usize,
    max_solutions: usize,
    max_steps: usize,
    solutions: Vec<Network>,
}

impl ReplayPolicy {
    /// Creates a policy answering with `script`, accepting one solution and
    /// imposing no step budget.
    #[must_use]
    pub fn new(script: impl IntoIterator<Item = Option<Selection>>) -> Self {
        Self {
            script: script.into_iter().collect(),
            records: Vec::new(),
            frames: 0,
            max_solutions: 1,
            max_steps: usize::MAX,
            solutions: Vec::new(),
        }
    }

    /// Stops the search after `max_solutions` accepted networks.
    #[must_use]
    pub fn with_max_solutions(mut self, max_solutions: usize) -> Self {
        self.max_solutions = max_solutions;
        self
    }

    /// Halts each seed point once its step counter exceeds `max_steps`.
    #[must_use]
    pub fn with_max_steps(mut self, max_steps: usize) -> Self {
        self.max_steps = max_steps;
        self
    }

    /// Callbacks observed so far, in call order.
    #[must_use]
    pub fn records(&self) -> &[ReplayRecord] {
        &self.records
    }

    /// Scripted answers not yet consumed.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.script.len()
    }

    /// Frames currently pushed.
    #[must_use]
    pub fn frame_depth(&self) -> usize {
        self.frames
    }
}

impl AggregationPolicy for ReplayPolicy {
    fn select(&mut self, state: &SearchState<'_>, request: SelectRequest) -> Option<Selection> {
        let answer = self.script.pop_front().flatten();
        self.records.push(ReplayRecord::Select {
            request,
            depth: state.depth,
            answer,
        });
        answer
    }

    fn push_frame(&mut self, _state: &SearchState<'_>) {
        self.frames += 1;
        self.records.push(ReplayRecord::Push {
            frames: self.frames,
        });
    }

    fn pop_frame(&mut self, _state: &SearchState<'_>) -> Result<()> {
        self.frames = self
            .frames
            .checked_sub(1)
            .ok_or(AggregateError::FrameUnderflow)?;
        self.records.push(ReplayRecord::Pop {
            frames: self.frames,
        });
        Ok(())
    }

    fn step(&mut self, state: &SearchState<'_>) -> bool {
        let proceed = self.solutions.len() < self.max_solutions && state.steps <= self.max_steps;
        self.records.push(ReplayRecord::Step {
            steps: state.steps,
            proceed,
        });
        proceed
    }

    fn solution(&mut self, state: &SearchState<'_>) {
        self.records.push(ReplayRecord::Solution {
            instances: state.network.len(),
            edges: state.network.edges().len(),
        });
        self.solutions.push(state.network.clone());
    }

    fn solutions(&self) -> &[Network] {
        &self.solutions
    }
}
