//! Scripted in-memory [`AssistantApi`] used by unit tests.

use std::collections::{HashMap, VecDeque};
use std::sync::LazyLock;
use std::sync::Mutex;

use regex::Regex;

use crate::assistant::types::{ListResponse, MessageContent, RunError, TextContent, Thread};
use crate::assistant::{
    Assistant, AssistantApi, AssistantError, AssistantRequest, CreateMessageRequest,
    CreateRunRequest, Role, Run, RunStatus, ThreadMessage,
};

static QUESTION_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^(\d+)\. ").unwrap());

/// One status the fake reports when a run is polled.
#[derive(Debug, Clone)]
pub enum Step {
    Status(RunStatus),
    Fault(RunStatus, &'static str, &'static str),
    PollFailure(u16, &'static str),
}

/// Behavior of the next `create_run` call.
#[derive(Debug, Clone)]
pub enum Script {
    /// `create_run` itself fails; 429 maps to `RateLimited`.
    Reject(u16, &'static str),
    /// The run reports `steps` in order (the last one repeats forever) and,
    /// once it completes, leaves `reply` on the thread.
    Run {
        steps: Vec<Step>,
        reply: Option<String>,
    },
}

impl Script {
    pub fn completes_with(reply: &str) -> Self {
        Script::Run {
            steps: vec![Step::Status(RunStatus::InProgress), Step::Status(RunStatus::Completed)],
            reply: Some(reply.to_string()),
        }
    }

    pub fn rate_limited(message: &'static str) -> Self {
        Script::Run {
            steps: vec![Step::Fault(RunStatus::Failed, "rate_limit_exceeded", message)],
            reply: None,
        }
    }

    pub fn never_finishes() -> Self {
        Script::Run {
            steps: vec![Step::Status(RunStatus::InProgress)],
            reply: None,
        }
    }
}

struct ActiveRun {
    id: String,
    thread_id: String,
    steps: VecDeque<Step>,
    reply: Option<String>,
}

#[derive(Default)]
struct State {
    assistants: Vec<Assistant>,
    threads: usize,
    messages: Vec<(String, ThreadMessage)>,
    scripts: VecDeque<Script>,
    runs: Vec<ActiveRun>,
    create_run_calls: usize,
    create_message_calls: usize,
    /// `create_message` call number (1-based) to the HTTP status it fails with.
    message_failures: HashMap<usize, u16>,
    cancel_calls: usize,
    assistant_writes: usize,
}

/// Fake assistant service. Runs without a script complete immediately and
/// answer every numbered question of the latest user message.
#[derive(Default)]
pub struct FakeAssistant {
    state: Mutex<State>,
}

impl FakeAssistant {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_scripts(scripts: Vec<Script>) -> Self {
        let fake = Self::default();
        fake.state.lock().unwrap().scripts = scripts.into();
        fake
    }

    pub fn with_assistants(assistants: Vec<Assistant>) -> Self {
        let fake = Self::default();
        fake.state.lock().unwrap().assistants = assistants;
        fake
    }

    /// Makes the `call`-th `create_message` fail with `status`; 429 maps to
    /// `RateLimited`. A failed call stores nothing.
    pub fn fail_message_call(self, call: usize, status: u16) -> Self {
        self.state.lock().unwrap().message_failures.insert(call, status);
        self
    }

    pub fn create_run_calls(&self) -> usize {
        self.state.lock().unwrap().create_run_calls
    }

    pub fn cancel_calls(&self) -> usize {
        self.state.lock().unwrap().cancel_calls
    }

    pub fn assistant_writes(&self) -> usize {
        self.state.lock().unwrap().assistant_writes
    }

    pub fn assistants(&self) -> Vec<Assistant> {
        self.state.lock().unwrap().assistants.clone()
    }

    /// Messages of a thread in append order as `(role, text)`.
    pub fn transcript(&self, thread_id: &str) -> Vec<(Role, String)> {
        self.state
            .lock()
            .unwrap()
            .messages
            .iter()
            .filter(|(t, _)| t == thread_id)
            .map(|(_, m)| (m.role, m.text().unwrap_or_default().to_string()))
            .collect()
    }

    fn auto_reply(prompt: &str) -> String {
        QUESTION_LINE
            .captures_iter(prompt)
            .map(|c| format!("{}. respuesta {}", &c[1], &c[1]))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

fn text_message(id: String, role: Role, text: &str, run_id: Option<String>) -> ThreadMessage {
    ThreadMessage {
        id,
        role,
        content: vec![MessageContent::Text {
            text: TextContent {
                value: text.to_string(),
            },
        }],
        run_id,
    }
}

impl AssistantApi for FakeAssistant {
    async fn list_assistants(
        &self,
        after: Option<&str>,
    ) -> Result<ListResponse<Assistant>, AssistantError> {
        // One assistant per page so pagination is exercised.
        let state = self.state.lock().unwrap();
        let start = match after {
            Some(cursor) => state
                .assistants
                .iter()
                .position(|a| a.id == cursor)
                .map_or(state.assistants.len(), |i| i + 1),
            None => 0,
        };
        let data: Vec<Assistant> = state.assistants.iter().skip(start).take(1).cloned().collect();
        Ok(ListResponse {
            has_more: start + 1 < state.assistants.len(),
            first_id: data.first().map(|a| a.id.clone()),
            last_id: data.last().map(|a| a.id.clone()),
            data,
        })
    }

    async fn create_assistant(&self, req: &AssistantRequest) -> Result<Assistant, AssistantError> {
        let mut state = self.state.lock().unwrap();
        state.assistant_writes += 1;
        let assistant = Assistant {
            id: format!("asst_{}", state.assistants.len() + 1),
            name: Some(req.name.clone()),
            instructions: Some(req.instructions.clone()),
            model: req.model.clone(),
            tools: req.tools.clone(),
            temperature: Some(req.temperature),
            top_p: Some(req.top_p),
        };
        state.assistants.push(assistant.clone());
        Ok(assistant)
    }

    async fn update_assistant(
        &self,
        assistant_id: &str,
        req: &AssistantRequest,
    ) -> Result<Assistant, AssistantError> {
        let mut state = self.state.lock().unwrap();
        state.assistant_writes += 1;
        let existing = state
            .assistants
            .iter_mut()
            .find(|a| a.id == assistant_id)
            .ok_or_else(|| AssistantError::ApiError {
                status: 404,
                message: format!("no assistant {assistant_id}"),
            })?;
        existing.name = Some(req.name.clone());
        existing.instructions = Some(req.instructions.clone());
        existing.model = req.model.clone();
        existing.tools = req.tools.clone();
        existing.temperature = Some(req.temperature);
        existing.top_p = Some(req.top_p);
        Ok(existing.clone())
    }

    async fn create_thread(&self) -> Result<Thread, AssistantError> {
        let mut state = self.state.lock().unwrap();
        state.threads += 1;
        Ok(Thread {
            id: format!("thread_{}", state.threads),
        })
    }

    async fn create_message(
        &self,
        thread_id: &str,
        req: &CreateMessageRequest,
    ) -> Result<ThreadMessage, AssistantError> {
        let mut state = self.state.lock().unwrap();
        state.create_message_calls += 1;
        match state.message_failures.get(&state.create_message_calls) {
            Some(429) => {
                return Err(AssistantError::RateLimited {
                    retry_after_secs: None,
                    message: "rate_limit_exceeded".to_string(),
                });
            }
            Some(&status) => {
                return Err(AssistantError::ApiError {
                    status,
                    message: "message rejected".to_string(),
                });
            }
            None => {}
        }
        let id = format!("msg_{}", state.messages.len() + 1);
        let message = text_message(id, req.role, &req.content, None);
        state.messages.push((thread_id.to_string(), message.clone()));
        Ok(message)
    }

    async fn list_messages(
        &self,
        thread_id: &str,
        limit: u32,
    ) -> Result<ListResponse<ThreadMessage>, AssistantError> {
        let state = self.state.lock().unwrap();
        let data: Vec<ThreadMessage> = state
            .messages
            .iter()
            .rev()
            .filter(|(t, _)| t == thread_id)
            .take(limit as usize)
            .map(|(_, m)| m.clone())
            .collect();
        Ok(ListResponse {
            data,
            first_id: None,
            last_id: None,
            has_more: false,
        })
    }

    async fn create_run(
        &self,
        thread_id: &str,
        _req: &CreateRunRequest,
    ) -> Result<Run, AssistantError> {
        let mut guard = self.state.lock().unwrap();
        let state = &mut *guard;
        state.create_run_calls += 1;
        let script = state.scripts.pop_front().unwrap_or_else(|| {
            let prompt = state
                .messages
                .iter()
                .rev()
                .find(|(t, m)| t == thread_id && m.role == Role::User)
                .and_then(|(_, m)| m.text().map(str::to_string))
                .unwrap_or_default();
            Script::Run {
                steps: vec![Step::Status(RunStatus::Completed)],
                reply: Some(Self::auto_reply(&prompt)),
            }
        });
        match script {
            Script::Reject(429, message) => Err(AssistantError::RateLimited {
                retry_after_secs: None,
                message: message.to_string(),
            }),
            Script::Reject(status, message) => Err(AssistantError::ApiError {
                status,
                message: message.to_string(),
            }),
            Script::Run { steps, reply } => {
                let id = format!("run_{}", state.create_run_calls);
                state.runs.push(ActiveRun {
                    id: id.clone(),
                    thread_id: thread_id.to_string(),
                    steps: steps.into(),
                    reply,
                });
                Ok(Run {
                    id,
                    thread_id: thread_id.to_string(),
                    status: RunStatus::Queued,
                    last_error: None,
                })
            }
        }
    }

    async fn retrieve_run(&self, thread_id: &str, run_id: &str) -> Result<Run, AssistantError> {
        let mut guard = self.state.lock().unwrap();
        let state = &mut *guard;
        let run = state
            .runs
            .iter_mut()
            .find(|r| r.id == run_id && r.thread_id == thread_id)
            .ok_or_else(|| AssistantError::ApiError {
                status: 404,
                message: format!("no run {run_id}"),
            })?;
        let step = if run.steps.len() > 1 {
            run.steps.pop_front()
        } else {
            run.steps.front().cloned()
        }
        .unwrap_or(Step::Status(RunStatus::Completed));

        let (status, last_error) = match step {
            Step::Status(status) => (status, None),
            Step::Fault(status, code, message) => (
                status,
                Some(RunError {
                    code: code.to_string(),
                    message: message.to_string(),
                }),
            ),
            Step::PollFailure(429, message) => {
                return Err(AssistantError::RateLimited {
                    retry_after_secs: None,
                    message: message.to_string(),
                });
            }
            Step::PollFailure(status, message) => {
                return Err(AssistantError::ApiError {
                    status,
                    message: message.to_string(),
                });
            }
        };

        if status == RunStatus::Completed {
            if let Some(reply) = run.reply.take() {
                let run_id = run.id.clone();
                let id = format!("msg_{}", state.messages.len() + 1);
                let message = text_message(id, Role::Assistant, &reply, Some(run_id));
                state.messages.push((thread_id.to_string(), message));
            }
        }

        Ok(Run {
            id: run_id.to_string(),
            thread_id: thread_id.to_string(),
            status,
            last_error,
        })
    }

    async fn cancel_run(&self, thread_id: &str, run_id: &str) -> Result<Run, AssistantError> {
        let mut state = self.state.lock().unwrap();
        state.cancel_calls += 1;
        Ok(Run {
            id: run_id.to_string(),
            thread_id: thread_id.to_string(),
            status: RunStatus::Cancelling,
            last_error: None,
        })
    }
}
