#![allow(dead_code)]

//! In-memory stand-ins for the host collaborators.

use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::{broadcast, Notify};

use steprunner::discovery::StepSource;
use steprunner::errors::{Result, StepRunnerError};
use steprunner::host::{
    DebugConfiguration, DebugSession, DebuggerHost, ExecutionId, PickItem, Picker, Task, TaskEnded,
    TaskEventBus, TaskHost, TaskStarted,
};
use steprunner::types::StepDescriptor;

/// What [`FakeTaskHost`] publishes on its own while `submit` runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AutoReport {
    /// Nothing; the test calls `start`/`finish`.
    Manual,
    /// `Started` before `submit` returns.
    Start,
    /// `Started` and `Ended` with this exit code before `submit` returns.
    StartAndEnd(Option<i32>),
}

/// Task host driven by the test.
///
/// Every submitted task gets the next execution id. Events can be emitted by
/// hand, or automatically from inside `submit` to exercise the window between
/// submission and the caller receiving the id.
pub struct FakeTaskHost {
    bus: TaskEventBus,
    next_id: AtomicU64,
    submitted: Mutex<Vec<(ExecutionId, Task)>>,
    fail_next: Mutex<Option<String>>,
    auto: Mutex<AutoReport>,
    noise: AtomicBool,
    cancel_calls: AtomicUsize,
}

impl FakeTaskHost {
    pub fn new() -> Self {
        Self {
            bus: TaskEventBus::default(),
            next_id: AtomicU64::new(1),
            submitted: Mutex::new(Vec::new()),
            fail_next: Mutex::new(None),
            auto: Mutex::new(AutoReport::Manual),
            noise: AtomicBool::new(false),
            cancel_calls: AtomicUsize::new(0),
        }
    }

    pub fn with_auto(self, auto: AutoReport) -> Self {
        *self.auto.lock().unwrap() = auto;
        self
    }

    pub fn set_auto(&self, auto: AutoReport) {
        *self.auto.lock().unwrap() = auto;
    }

    /// Before reporting a submitted task, emit start and end of an unrelated
    /// task with a foreign execution id.
    pub fn with_noise(self) -> Self {
        self.noise.store(true, Ordering::SeqCst);
        self
    }

    /// Make the next `submit` fail with `message`.
    pub fn fail_next_submit(&self, message: &str) {
        *self.fail_next.lock().unwrap() = Some(message.to_string());
    }

    pub fn events(&self) -> &TaskEventBus {
        &self.bus
    }

    pub fn submitted(&self) -> Vec<(ExecutionId, Task)> {
        self.submitted.lock().unwrap().clone()
    }

    pub fn last_task(&self) -> Option<Task> {
        self.submitted.lock().unwrap().last().map(|(_, t)| t.clone())
    }

    pub fn cancel_calls(&self) -> usize {
        self.cancel_calls.load(Ordering::SeqCst)
    }

    pub fn start(&self, execution: ExecutionId) {
        let name = self.name_of(execution);
        self.bus.emit_started(TaskStarted { execution, name });
    }

    pub fn finish(&self, execution: ExecutionId, exit_code: Option<i32>) {
        let name = self.name_of(execution);
        self.bus.emit_ended(TaskEnded {
            execution,
            name,
            exit_code,
        });
    }

    fn name_of(&self, execution: ExecutionId) -> String {
        self.submitted
            .lock()
            .unwrap()
            .iter()
            .find(|(id, _)| *id == execution)
            .map(|(_, t)| t.name.clone())
            .unwrap_or_else(|| format!("task {execution}"))
    }

    fn emit_noise(&self) {
        let execution = ExecutionId(10_000 + self.next_id.load(Ordering::SeqCst));
        let name = "unrelated".to_string();
        self.bus.emit_started(TaskStarted {
            execution,
            name: name.clone(),
        });
        self.bus.emit_ended(TaskEnded {
            execution,
            name,
            exit_code: Some(1),
        });
    }
}

impl Default for FakeTaskHost {
    fn default() -> Self {
        Self::new()
    }
}

impl TaskHost for FakeTaskHost {
    fn subscribe_started(&self) -> broadcast::Receiver<TaskStarted> {
        self.bus.subscribe_started()
    }

    fn subscribe_ended(&self) -> broadcast::Receiver<TaskEnded> {
        self.bus.subscribe_ended()
    }

    fn submit(&self, task: Task) -> Pin<Box<dyn Future<Output = Result<ExecutionId>> + Send + '_>> {
        Box::pin(async move {
            if let Some(message) = self.fail_next.lock().unwrap().take() {
                return Err(StepRunnerError::Other(anyhow::anyhow!(message)));
            }

            let execution = ExecutionId(self.next_id.fetch_add(1, Ordering::SeqCst));
            self.submitted.lock().unwrap().push((execution, task));

            if self.noise.load(Ordering::SeqCst) {
                self.emit_noise();
            }

            let auto = *self.auto.lock().unwrap();
            match auto {
                AutoReport::Manual => {}
                AutoReport::Start => self.start(execution),
                AutoReport::StartAndEnd(code) => {
                    self.start(execution);
                    self.finish(execution, code);
                }
            }

            Ok(execution)
        })
    }

    fn cancel_all(&self) -> usize {
        self.cancel_calls.fetch_add(1, Ordering::SeqCst);
        0
    }
}

/// Pauses the first discovery call until released.
#[derive(Debug, Clone, Default)]
pub struct DiscoveryGate {
    pub entered: Arc<Notify>,
    pub release: Arc<Notify>,
}

/// Step source with scripted results and a call counter.
///
/// Scripted results are consumed first; after that every call returns the
/// current default steps.
pub struct FakeStepSource {
    steps: Mutex<Vec<StepDescriptor>>,
    scripted: Mutex<VecDeque<std::result::Result<Vec<StepDescriptor>, String>>>,
    calls: AtomicUsize,
    gate: Mutex<Option<DiscoveryGate>>,
}

impl FakeStepSource {
    pub fn new(steps: Vec<StepDescriptor>) -> Self {
        Self {
            steps: Mutex::new(steps),
            scripted: Mutex::new(VecDeque::new()),
            calls: AtomicUsize::new(0),
            gate: Mutex::new(None),
        }
    }

    pub fn set_steps(&self, steps: Vec<StepDescriptor>) {
        *self.steps.lock().unwrap() = steps;
    }

    pub fn push_ok(&self, steps: Vec<StepDescriptor>) {
        self.scripted.lock().unwrap().push_back(Ok(steps));
    }

    pub fn push_err(&self, message: &str) {
        self.scripted
            .lock()
            .unwrap()
            .push_back(Err(message.to_string()));
    }

    /// Block the next call after it has started, until `gate.release` fires.
    pub fn pause_next_call(&self) -> DiscoveryGate {
        let gate = DiscoveryGate::default();
        *self.gate.lock().unwrap() = Some(gate.clone());
        gate
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl StepSource for FakeStepSource {
    fn discover(&self) -> Pin<Box<dyn Future<Output = Result<Vec<StepDescriptor>>> + Send + '_>> {
        Box::pin(async move {
            self.calls.fetch_add(1, Ordering::SeqCst);

            let gate = self.gate.lock().unwrap().take();
            if let Some(gate) = gate {
                gate.entered.notify_one();
                gate.release.notified().await;
            }

            let scripted = self.scripted.lock().unwrap().pop_front();
            match scripted {
                Some(Ok(steps)) => Ok(steps),
                Some(Err(message)) => Err(StepRunnerError::DiscoveryParse {
                    message,
                    detail: None,
                }),
                None => Ok(self.steps.lock().unwrap().clone()),
            }
        })
    }
}

type PickHook = Box<dyn FnOnce() + Send>;

/// Picker that answers from a script and records what it was shown.
///
/// With an empty script every prompt is dismissed.
pub struct ScriptedPicker {
    answers: Mutex<VecDeque<Option<usize>>>,
    shown: Mutex<Vec<Vec<PickItem>>>,
    before_answer: Mutex<Option<PickHook>>,
}

impl ScriptedPicker {
    pub fn new() -> Self {
        Self {
            answers: Mutex::new(VecDeque::new()),
            shown: Mutex::new(Vec::new()),
            before_answer: Mutex::new(None),
        }
    }

    pub fn answering(answers: &[Option<usize>]) -> Self {
        let picker = Self::new();
        picker.answers.lock().unwrap().extend(answers.iter().copied());
        picker
    }

    pub fn push_answer(&self, answer: Option<usize>) {
        self.answers.lock().unwrap().push_back(answer);
    }

    /// Run `hook` once while the next prompt is open.
    pub fn before_answer(&self, hook: impl FnOnce() + Send + 'static) {
        *self.before_answer.lock().unwrap() = Some(Box::new(hook));
    }

    pub fn prompts(&self) -> usize {
        self.shown.lock().unwrap().len()
    }

    pub fn last_shown(&self) -> Option<Vec<PickItem>> {
        self.shown.lock().unwrap().last().cloned()
    }
}

impl Default for ScriptedPicker {
    fn default() -> Self {
        Self::new()
    }
}

impl Picker for ScriptedPicker {
    fn pick(&self, items: Vec<PickItem>) -> Pin<Box<dyn Future<Output = Result<Option<usize>>> + Send + '_>> {
        Box::pin(async move {
            self.shown.lock().unwrap().push(items);
            let hook = self.before_answer.lock().unwrap().take();
            if let Some(hook) = hook {
                hook();
            }
            Ok(self.answers.lock().unwrap().pop_front().flatten())
        })
    }
}

/// Debugger that records launches and ends immediately.
pub struct FakeDebugger {
    available: AtomicBool,
    exit_code: Option<i32>,
    launches: Mutex<Vec<DebugConfiguration>>,
}

impl FakeDebugger {
    pub fn available() -> Self {
        Self {
            available: AtomicBool::new(true),
            exit_code: Some(0),
            launches: Mutex::new(Vec::new()),
        }
    }

    pub fn unavailable() -> Self {
        let debugger = Self::available();
        debugger.available.store(false, Ordering::SeqCst);
        debugger
    }

    pub fn with_exit_code(mut self, code: Option<i32>) -> Self {
        self.exit_code = code;
        self
    }

    pub fn launches(&self) -> Vec<DebugConfiguration> {
        self.launches.lock().unwrap().clone()
    }
}

impl DebuggerHost for FakeDebugger {
    fn is_available(&self) -> bool {
        self.available.load(Ordering::SeqCst)
    }

    fn launch(
        &self,
        config: DebugConfiguration,
    ) -> Pin<Box<dyn Future<Output = Result<DebugSession>> + Send + '_>> {
        Box::pin(async move {
            let name = config.name.clone();
            self.launches.lock().unwrap().push(config);
            Ok(DebugSession::finished(name, self.exit_code))
        })
    }
}
