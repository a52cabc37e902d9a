//! Scripted providers shared by the integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use aura_core::protocol::{CanonicalRequest, Completion, Usage};
use aura_core::providers::{
    AdapterError, AdapterResult, FailureKind, InvokeContext, Provider, ProviderCapabilities,
    ProviderKind,
};
use aura_core::registry::{HealthPolicy, ProviderRegistry};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// What a scripted provider does on one call
#[derive(Debug, Clone)]
pub enum Step {
    Reply(&'static str),
    Fail(FailureKind),
    /// Reply after a delay, unless cancelled first
    ReplyAfter(Duration, &'static str),
    /// Block the worker thread for the duration, then fail; never sees cancellation
    StallThenFail(Duration, FailureKind),
}

/// Provider that plays back a fixed script; the last step repeats
pub struct ScriptedProvider {
    capabilities: ProviderCapabilities,
    script: Mutex<VecDeque<Step>>,
    calls: AtomicUsize,
    saw_cancel: AtomicBool,
}

impl ScriptedProvider {
    pub fn new(id: &str, models: &[&str], script: Vec<Step>) -> Arc<Self> {
        Arc::new(Self {
            capabilities: ProviderCapabilities::new(
                id,
                ProviderKind::OpenAI,
                models.iter().copied(),
            ),
            script: Mutex::new(script.into()),
            calls: AtomicUsize::new(0),
            saw_cancel: AtomicBool::new(false),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn saw_cancel(&self) -> bool {
        self.saw_cancel.load(Ordering::SeqCst)
    }

    fn next_step(&self) -> Step {
        let mut script = self.script.lock();
        if script.len() > 1 {
            script.pop_front().unwrap()
        } else {
            script.front().cloned().unwrap()
        }
    }
}

#[async_trait]
impl Provider for ScriptedProvider {
    fn describe(&self) -> &ProviderCapabilities {
        &self.capabilities
    }

    async fn invoke(
        &self,
        _request: &CanonicalRequest,
        context: &InvokeContext,
    ) -> AdapterResult<Completion> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let reply = |text: &str| Completion {
            text: text.to_string(),
            model: context.model.clone(),
            usage: Some(Usage::new(3, 1)),
            finish_reason: Some("stop".to_string()),
            tool_call: None,
        };

        match self.next_step() {
            Step::Reply(text) => Ok(reply(text)),
            Step::Fail(kind) => Err(AdapterError::new(kind, format!("scripted {}", kind))),
            Step::ReplyAfter(delay, text) => {
                tokio::select! {
                    _ = context.cancel.cancelled() => {
                        self.saw_cancel.store(true, Ordering::SeqCst);
                        Err(AdapterError::timeout("cancelled"))
                    }
                    _ = tokio::time::sleep(delay) => Ok(reply(text)),
                }
            }
            Step::StallThenFail(stall, kind) => {
                std::thread::sleep(stall);
                Err(AdapterError::new(kind, format!("scripted {} after stall", kind)))
            }
        }
    }
}

/// Registry over the given providers, registered in order
pub fn registry(
    degrade_after: u32,
    providers: &[(Arc<ScriptedProvider>, i32)],
) -> Arc<ProviderRegistry> {
    registry_with_cooldown(degrade_after, Duration::from_secs(60), providers)
}

pub fn registry_with_cooldown(
    degrade_after: u32,
    cooldown: Duration,
    providers: &[(Arc<ScriptedProvider>, i32)],
) -> Arc<ProviderRegistry> {
    let mut registry = ProviderRegistry::new(HealthPolicy::new(degrade_after, cooldown));
    for (provider, priority) in providers {
        registry
            .register(provider.clone(), *priority)
            .expect("unique provider ids");
    }
    Arc::new(registry)
}
