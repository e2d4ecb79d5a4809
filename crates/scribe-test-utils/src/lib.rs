//! Test doubles for the generation service, plus config fixtures.

use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::Mutex;

use futures::future::BoxFuture;
use tempfile::TempDir;

use scribe_core::error::{Result, ScribeError};
use scribe_core::traits::GenerationService;
use scribe_core::types::CompletionRequest;

/// A generation service with canned replies.
///
/// Replies are picked in this order: the first rule whose needle appears in
/// the system or user prompt, then the next queued reply, then the default.
/// Every request is recorded for later assertions.
pub struct ScriptedGeneration {
    rules: Vec<(String, std::result::Result<String, String>)>,
    queue: Mutex<VecDeque<Result<String>>>,
    default_reply: String,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl ScriptedGeneration {
    pub fn new() -> Self {
        Self {
            rules: vec![],
            queue: Mutex::new(VecDeque::new()),
            default_reply: "ok".to_string(),
            requests: Mutex::new(vec![]),
        }
    }

    /// Reply with `reply` whenever a prompt contains `needle`.
    pub fn when(mut self, needle: impl Into<String>, reply: impl Into<String>) -> Self {
        self.rules.push((needle.into(), Ok(reply.into())));
        self
    }

    /// Fail whenever a prompt contains `needle`.
    pub fn fail_when(mut self, needle: impl Into<String>, message: impl Into<String>) -> Self {
        self.rules.push((needle.into(), Err(message.into())));
        self
    }

    /// Queue a reply for the next request no rule matches.
    pub fn then(self, reply: impl Into<String>) -> Self {
        self.push(Ok(reply.into()));
        self
    }

    /// Queue a failure for the next request no rule matches.
    pub fn then_fail(self, message: impl Into<String>) -> Self {
        self.push(Err(ScribeError::Generation(message.into())));
        self
    }

    pub fn with_default(mut self, reply: impl Into<String>) -> Self {
        self.default_reply = reply.into();
        self
    }

    fn push(&self, reply: Result<String>) {
        if let Ok(mut queue) = self.queue.lock() {
            queue.push_back(reply);
        }
    }

    /// All requests seen so far.
    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().map(|r| r.clone()).unwrap_or_default()
    }

    /// Requests whose prompts contain `needle`.
    pub fn requests_matching(&self, needle: &str) -> Vec<CompletionRequest> {
        self.requests()
            .into_iter()
            .filter(|r| r.system.contains(needle) || r.user.contains(needle))
            .collect()
    }

    fn reply_for(&self, request: &CompletionRequest) -> Result<String> {
        if let Some((_, reply)) = self
            .rules
            .iter()
            .find(|(needle, _)| request.system.contains(needle) || request.user.contains(needle))
        {
            return reply.clone().map_err(ScribeError::Generation);
        }
        let queued = self.queue.lock().ok().and_then(|mut q| q.pop_front());
        queued.unwrap_or_else(|| Ok(self.default_reply.clone()))
    }
}

impl Default for ScriptedGeneration {
    fn default() -> Self {
        Self::new()
    }
}

impl GenerationService for ScriptedGeneration {
    fn complete(&self, request: CompletionRequest) -> BoxFuture<'_, Result<String>> {
        let reply = self.reply_for(&request);
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request);
        }
        Box::pin(async move { reply })
    }
}

/// A generation service that always fails.
pub struct FailingGeneration {
    message: String,
}

impl FailingGeneration {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl GenerationService for FailingGeneration {
    fn complete(&self, _request: CompletionRequest) -> BoxFuture<'_, Result<String>> {
        let message = self.message.clone();
        Box::pin(async move { Err(ScribeError::Generation(message)) })
    }
}

/// Write `contents` to `scribe.toml` in a fresh temp dir. Keep the `TempDir`
/// alive for as long as the file is needed.
pub fn temp_config(contents: &str) -> std::io::Result<(TempDir, PathBuf)> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("scribe.toml");
    std::fs::write(&path, contents)?;
    Ok((dir, path))
}
