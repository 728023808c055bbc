//! A scripted [`Executor`] for unit tests, so harness logic can be exercised without a cluster.

use crate::cli::{Executor, Invocation, Output};
use crate::error::Result;
use async_trait::async_trait;
use std::sync::{Arc, Mutex};

struct Rule {
    needles: Vec<String>,
    responses: Vec<Output>,
    served: usize,
}

#[derive(Default)]
struct Inner {
    rules: Vec<Rule>,
    calls: Vec<Invocation>,
}

/// Answers invocations from a list of rules. A rule matches when every one of its needles is a
/// substring of the command line. Rules are tried in registration order; a matching rule serves
/// its responses in order and keeps repeating the last one. Unmatched invocations fail with exit
/// code 1.
#[derive(Clone, Default)]
pub(crate) struct ScriptedExecutor {
    inner: Arc<Mutex<Inner>>,
}

impl ScriptedExecutor {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn on(&self, needles: &[&str], responses: Vec<Output>) {
        assert!(!responses.is_empty(), "a rule needs at least one response");
        self.inner.lock().unwrap().rules.push(Rule {
            needles: needles.iter().map(|n| n.to_string()).collect(),
            responses,
            served: 0,
        });
    }

    pub(crate) fn stdout(stdout: &str) -> Output {
        Output {
            code: Some(0),
            stdout: stdout.to_string(),
            stderr: String::new(),
        }
    }

    pub(crate) fn failure(stderr: &str) -> Output {
        Output {
            code: Some(1),
            stdout: String::new(),
            stderr: stderr.to_string(),
        }
    }

    /// Every invocation received so far.
    pub(crate) fn calls(&self) -> Vec<Invocation> {
        self.inner.lock().unwrap().calls.clone()
    }

    /// The number of invocations whose command line contains every needle.
    pub(crate) fn count(&self, needles: &[&str]) -> usize {
        self.calls()
            .iter()
            .filter(|call| {
                let line = call.to_string();
                needles.iter().all(|needle| line.contains(needle))
            })
            .count()
    }
}

#[async_trait]
impl Executor for ScriptedExecutor {
    async fn execute(&self, invocation: &Invocation) -> Result<Output> {
        let line = invocation.to_string();
        let mut inner = self.inner.lock().unwrap();
        inner.calls.push(invocation.clone());
        for rule in inner.rules.iter_mut() {
            if rule.needles.iter().all(|needle| line.contains(needle)) {
                let index = rule.served.min(rule.responses.len() - 1);
                rule.served += 1;
                return Ok(rule.responses[index].clone());
            }
        }
        Ok(Self::failure(&format!("no scripted response for '{}'", line)))
    }
}
