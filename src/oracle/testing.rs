use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use super::{CallOptions, GenerationOracle, OracleError};

#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub model: String,
    pub prompt: String,
    pub temperature: f32,
    pub max_tokens: usize,
}

/// Replays queued responses in order and records every call it receives.
/// Once the queue is drained every call fails with a transport error.
#[derive(Clone, Default)]
pub struct ScriptedOracle {
    responses: Rc<RefCell<VecDeque<Result<String, OracleError>>>>,
    calls: Rc<RefCell<Vec<RecordedCall>>>,
}

impl ScriptedOracle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_ok(&self, text: impl Into<String>) -> &Self {
        self.responses.borrow_mut().push_back(Ok(text.into()));
        self
    }

    pub fn push_err(&self, err: OracleError) -> &Self {
        self.responses.borrow_mut().push_back(Err(err));
        self
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.borrow().clone()
    }

    pub fn remaining(&self) -> usize {
        self.responses.borrow().len()
    }
}

impl GenerationOracle for ScriptedOracle {
    fn backend(&self) -> &'static str {
        "scripted"
    }

    fn call(&self, prompt: &str, options: &CallOptions<'_>) -> Result<String, OracleError> {
        self.calls.borrow_mut().push(RecordedCall {
            model: options.model.to_string(),
            prompt: prompt.to_string(),
            temperature: options.temperature,
            max_tokens: options.max_tokens,
        });

        self.responses
            .borrow_mut()
            .pop_front()
            .unwrap_or_else(|| Err(OracleError::Transport("script exhausted".to_string())))
    }
}
