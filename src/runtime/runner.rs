//! Task Runner - resolve, bind, then run steps strictly in order

use std::borrow::Cow;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use rustc_hash::FxHashMap;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use super::invoker::{InvokeError, Invocation, ProcessInvoker, SystemInvoker};
use super::output::{ExecutionResult, StepFailure, TaskResult};
use crate::ast::{Step, Tool};
use crate::binding::template::{self, TemplateContext};
use crate::binding::{ParamBindings, Params};
use crate::error::Result;
use crate::event::{EventKind, EventLog};
use crate::registry::TaskRegistry;
use crate::util::jsonpath;

/// Runs named tasks from a [`TaskRegistry`]
///
/// Step values live only for the duration of one `run`. Two things are
/// shared by every run on the same runner:
/// - the [`EventLog`]: events of all runs accumulate there, each tagged
///   with its task name
/// - the cancellation token: it is a shutdown signal for the runner.
///   Once cancelled, in-flight runs stop and later runs return a cancelled
///   result without starting a process. Use
///   [`run_with_cancellation`](Self::run_with_cancellation) to abort a
///   single run without affecting the others.
pub struct TaskRunner {
    registry: Arc<TaskRegistry>,
    invoker: Arc<dyn ProcessInvoker>,
    /// Tool overrides from configuration, consulted before the task file
    tools: BTreeMap<String, Tool>,
    event_log: EventLog,
    cancel: CancellationToken,
    default_timeout: Option<Duration>,
}

impl TaskRunner {
    pub fn new(registry: Arc<TaskRegistry>) -> Self {
        Self {
            registry,
            invoker: Arc::new(SystemInvoker::new()),
            tools: BTreeMap::new(),
            event_log: EventLog::new(),
            cancel: CancellationToken::new(),
            default_timeout: None,
        }
    }

    pub fn with_invoker(mut self, invoker: Arc<dyn ProcessInvoker>) -> Self {
        self.invoker = invoker;
        self
    }

    pub fn with_tools(mut self, tools: BTreeMap<String, Tool>) -> Self {
        self.tools = tools;
        self
    }

    pub fn with_event_log(mut self, event_log: EventLog) -> Self {
        self.event_log = event_log;
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Timeout for steps that do not set `timeout_secs`
    pub fn with_default_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.default_timeout = timeout;
        self
    }

    pub fn registry(&self) -> &TaskRegistry {
        &self.registry
    }

    pub fn event_log(&self) -> &EventLog {
        &self.event_log
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Executable and leading arguments for a step's `program`: config
    /// override, then task file alias, then the name as written
    pub fn resolve_tool<'a>(&'a self, program: &'a str) -> (&'a str, &'a [String]) {
        match self.registry.tool(program, &self.tools) {
            Some(tool) => (tool.program(), tool.prefix_args()),
            None => (program, &[]),
        }
    }

    /// Run `name` with caller-supplied `params`
    ///
    /// Lookup and parameter errors are returned before any process starts.
    /// Everything that goes wrong afterwards is recorded in the returned
    /// [`TaskResult`].
    pub async fn run(&self, name: &str, params: &Params) -> Result<TaskResult> {
        self.run_with_cancellation(name, params, &self.cancel).await
    }

    /// Like [`run`](Self::run), but aborted by `cancel` instead of the
    /// runner's own token. Pass a `child_token()` of
    /// [`cancellation_token`](Self::cancellation_token) to also stop on
    /// runner shutdown.
    #[instrument(skip(self, params, cancel), fields(task = %name))]
    pub async fn run_with_cancellation(
        &self,
        name: &str,
        params: &Params,
        cancel: &CancellationToken,
    ) -> Result<TaskResult> {
        let def = self.registry.resolve(name)?;
        let bindings = ParamBindings::bind(&def, params)?;

        let task: Arc<str> = Arc::from(def.name.as_str());
        let started = Instant::now();
        self.event_log.emit(EventKind::TaskStarted {
            task: Arc::clone(&task),
            step_count: def.steps.len(),
        });
        info!(steps = def.steps.len(), "task started");

        let mut values: FxHashMap<String, Value> = FxHashMap::default();
        let mut results = Vec::with_capacity(def.steps.len());
        let mut success = true;
        let mut cancelled = false;

        for step in &def.steps {
            if cancel.is_cancelled() {
                cancelled = true;
                self.event_log.emit(EventKind::TaskCancelled {
                    task: Arc::clone(&task),
                    step: None,
                });
                break;
            }

            let result = {
                let ctx = TemplateContext::new(&bindings, &values);
                self.run_step(&task, step, &ctx, cancel).await
            };

            match &result.failure {
                None => {
                    if let Some(value) = &result.value {
                        values.insert(step.id.clone(), value.clone());
                    }
                }
                Some(failure) => {
                    warn!(step = %step.id, error = %failure, abort = step.abort_on_failure, "step failed");
                    self.event_log.emit(EventKind::StepFailed {
                        task: Arc::clone(&task),
                        step: step.id.as_str().into(),
                        error: failure.to_string(),
                        abort: step.abort_on_failure,
                    });

                    if *failure == StepFailure::Cancelled {
                        cancelled = true;
                        self.event_log.emit(EventKind::TaskCancelled {
                            task: Arc::clone(&task),
                            step: Some(step.id.as_str().into()),
                        });
                    } else if step.abort_on_failure {
                        success = false;
                    }
                }
            }

            let stop = cancelled || (!result.succeeded() && step.abort_on_failure);
            results.push(result);
            if stop {
                break;
            }
        }

        if cancelled {
            success = false;
        }

        self.event_log.emit(EventKind::TaskCompleted {
            task: Arc::clone(&task),
            success,
            duration_ms: started.elapsed().as_millis() as u64,
        });
        info!(success, cancelled, "task finished");

        Ok(TaskResult::new(
            def.name.clone(),
            def.result.as_deref(),
            results,
            success,
            cancelled,
        ))
    }

    async fn run_step(
        &self,
        task: &Arc<str>,
        step: &Step,
        ctx: &TemplateContext<'_>,
        cancel: &CancellationToken,
    ) -> ExecutionResult {
        let started = Instant::now();
        let (program, prefix) = self.resolve_tool(&step.program);
        let mut result = ExecutionResult {
            step_id: step.id.clone(),
            program: program.to_string(),
            args: Vec::new(),
            exit_code: None,
            stdout: String::new(),
            stderr: String::new(),
            value: None,
            failure: None,
            duration_ms: 0,
        };

        let invoked = self
            .execute(task, step, ctx, prefix, cancel, &mut result)
            .await;
        if let Err(failure) = invoked {
            result.failure = Some(failure);
        }
        result.duration_ms = started.elapsed().as_millis() as u64;
        result
    }

    async fn execute(
        &self,
        task: &Arc<str>,
        step: &Step,
        ctx: &TemplateContext<'_>,
        prefix: &[String],
        cancel: &CancellationToken,
        result: &mut ExecutionResult,
    ) -> std::result::Result<(), StepFailure> {
        let started = Instant::now();
        let invocation = self.invocation(step, ctx, &result.program, prefix)?;
        let read_output = step
            .read_output
            .as_deref()
            .map(|path| render(path, ctx))
            .transpose()?;
        result.args = invocation.args.clone();

        self.event_log.emit(EventKind::StepStarted {
            task: Arc::clone(task),
            step: step.id.as_str().into(),
            program: invocation.program.clone(),
            args: invocation.args.clone(),
        });
        debug!(step = %step.id, program = %invocation.program, "step started");

        let output = self
            .invoker
            .invoke(&invocation, cancel)
            .await
            .map_err(|e| match e {
                InvokeError::Spawn { reason, .. } => StepFailure::Spawn { reason },
                InvokeError::Timeout { timeout } => StepFailure::Timeout {
                    secs: timeout.as_secs(),
                },
                InvokeError::Cancelled => StepFailure::Cancelled,
            })?;

        let exit_code = output.exit_code;
        let succeeded = output.success();
        result.exit_code = exit_code;
        result.stdout = output.stdout;
        result.stderr = output.stderr;

        self.event_log.emit(EventKind::StepCompleted {
            task: Arc::clone(task),
            step: step.id.as_str().into(),
            exit_code,
            duration_ms: started.elapsed().as_millis() as u64,
        });

        if !succeeded {
            return Err(StepFailure::ExitStatus { exit_code });
        }

        let text: Cow<'_, str> = match read_output {
            Some(path) => {
                let path = match &invocation.cwd {
                    Some(cwd) => cwd.join(path),
                    None => PathBuf::from(path),
                };
                let text = tokio::fs::read_to_string(&path)
                    .await
                    .map_err(|e| StepFailure::ReadOutput {
                        path: path.display().to_string(),
                        reason: e.to_string(),
                    })?;
                Cow::Owned(text)
            }
            None => Cow::Borrowed(&result.stdout),
        };

        let value = match &step.query {
            Some(query) => {
                let value = jsonpath::extract(&text, query).map_err(StepFailure::from_extract)?;
                self.event_log.emit(EventKind::ValueExtracted {
                    task: Arc::clone(task),
                    step: step.id.as_str().into(),
                    query: query.clone(),
                    value: value.clone(),
                });
                value
            }
            None => Value::String(text.trim().to_string()),
        };

        result.value = Some(value);
        Ok(())
    }

    fn invocation(
        &self,
        step: &Step,
        ctx: &TemplateContext<'_>,
        program: &str,
        prefix: &[String],
    ) -> std::result::Result<Invocation, StepFailure> {
        let mut args = prefix.to_vec();
        for arg in &step.args {
            args.push(render(arg, ctx)?);
        }

        let mut invocation = Invocation::new(program, args);
        invocation.inherit_env = step.inherit_env;
        for (key, value) in &step.env {
            invocation.env.insert(key.clone(), render(value, ctx)?);
        }
        if let Some(cwd) = &step.cwd {
            invocation.cwd = Some(PathBuf::from(render(cwd, ctx)?));
        }
        invocation.timeout = step
            .timeout_secs
            .map(Duration::from_secs)
            .or(self.default_timeout);

        Ok(invocation)
    }
}

fn render(text: &str, ctx: &TemplateContext<'_>) -> std::result::Result<String, StepFailure> {
    template::resolve(text, ctx)
        .map(Cow::into_owned)
        .map_err(|e| StepFailure::Template {
            reason: e.to_string(),
        })
}

impl std::fmt::Debug for TaskRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskRunner")
            .field("tasks", &self.registry.len())
            .field("tools", &self.tools)
            .field("default_timeout", &self.default_timeout)
            .finish_non_exhaustive()
    }
}
