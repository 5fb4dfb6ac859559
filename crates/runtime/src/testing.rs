//! In-memory backend and bridge for unit tests.

use crate::error::SessionInitError;
use crate::model::{
    Backend, ChunkStream, Message, ModelError, ModelRequest, StreamChunk, ToolCall, ToolSpec,
};
use crate::tools::{SessionBridge, ToolError, ToolHost};
use futures::{StreamExt, stream};
use serde_json::{Value, json};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

/// What the backend does for one model round.
pub enum Round {
    Chunks(Vec<Result<StreamChunk, ModelError>>),
    /// Never yields.
    Hang,
    Refuse(ModelError),
}

impl Round {
    pub fn texts(fragments: &[&str]) -> Self {
        Self::Chunks(fragments.iter().map(|t| Ok(StreamChunk::text(*t))).collect())
    }
}

#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub messages: Vec<Message>,
    pub tools: Vec<String>,
    pub system: Option<String>,
    pub temperature: f32,
}

/// Plays back a fixed list of rounds; further rounds are empty.
#[derive(Clone, Default)]
pub struct ScriptedBackend {
    rounds: Arc<Mutex<VecDeque<Round>>>,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
}

impl ScriptedBackend {
    pub fn new(rounds: impl IntoIterator<Item = Round>) -> Self {
        Self {
            rounds: Arc::new(Mutex::new(rounds.into_iter().collect())),
            requests: Arc::default(),
        }
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }
}

impl Backend for ScriptedBackend {
    async fn stream(&self, request: ModelRequest<'_>) -> Result<ChunkStream, ModelError> {
        self.requests.lock().unwrap().push(RecordedRequest {
            messages: request.messages.to_vec(),
            tools: request.tools.iter().map(|t| t.name.clone()).collect(),
            system: request.system.map(str::to_string),
            temperature: request.temperature,
        });
        let round = self.rounds.lock().unwrap().pop_front();
        match round {
            Some(Round::Chunks(items)) => Ok(stream::iter(items).boxed()),
            Some(Round::Hang) => Ok(stream::pending::<Result<StreamChunk, ModelError>>().boxed()),
            Some(Round::Refuse(e)) => Err(e),
            None => Ok(stream::empty::<Result<StreamChunk, ModelError>>().boxed()),
        }
    }
}

/// A host exposing `get_car_value`, answering every call with a fixed value.
pub struct FakeHost {
    specs: Vec<ToolSpec>,
    calls: Mutex<Vec<ToolCall>>,
}

impl FakeHost {
    pub fn car_value() -> Self {
        Self {
            specs: vec![ToolSpec {
                name: "get_car_value".into(),
                description: "Estimate a car's value".into(),
                schema: json!({
                    "type": "object",
                    "properties": {
                        "model": { "type": "string" },
                        "year": { "type": "integer" }
                    },
                    "required": ["model", "year"]
                }),
            }],
            calls: Mutex::default(),
        }
    }

    pub fn calls(&self) -> Vec<ToolCall> {
        self.calls.lock().unwrap().clone()
    }
}

impl ToolHost for FakeHost {
    fn specs(&self) -> &[ToolSpec] {
        &self.specs
    }

    async fn execute(&self, call: &ToolCall) -> Result<Value, ToolError> {
        self.calls.lock().unwrap().push(call.clone());
        match call.name.as_str() {
            "get_car_value" => Ok(json!({ "result": 8874 })),
            other => Err(ToolError::NotFound(other.to_string())),
        }
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Counts {
    pub opened: usize,
    pub released: usize,
    pub abandoned: usize,
}

/// Counts session lifecycle events instead of spawning anything.
#[derive(Clone, Default)]
pub struct FakeBridge {
    counts: Arc<Mutex<Counts>>,
    refuse: bool,
}

impl FakeBridge {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every open fails as a handshake error would.
    pub fn failing() -> Self {
        Self {
            refuse: true,
            ..Self::default()
        }
    }

    pub fn counts(&self) -> Counts {
        *self.counts.lock().unwrap()
    }
}

impl SessionBridge for FakeBridge {
    type Session = FakeHost;

    async fn open(&self) -> Result<FakeHost, SessionInitError> {
        if self.refuse {
            return Err(SessionInitError::new("handshake refused"));
        }
        self.counts.lock().unwrap().opened += 1;
        Ok(FakeHost::car_value())
    }

    async fn release(&self, _session: FakeHost) {
        self.counts.lock().unwrap().released += 1;
    }

    fn abandon(&self, _session: FakeHost) {
        self.counts.lock().unwrap().abandoned += 1;
    }
}
