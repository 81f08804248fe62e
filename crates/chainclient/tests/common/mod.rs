//! A scripted in-memory node.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;
use chainclient::rpc::{JsonRpcError, JsonRpcRequest, JsonRpcResponse, RpcTransport, TransportError};
use serde_json::Value;

#[derive(Clone)]
pub enum Answer {
    Result(Value),
    Error(i64, &'static str),
}

/// Answers each method from its own queue. The last queued answer of a
/// method is repeated once the others are used up.
#[derive(Default)]
pub struct ScriptedNode {
    answers: Mutex<HashMap<String, VecDeque<Answer>>>,
    requests: Mutex<Vec<JsonRpcRequest>>,
}

impl ScriptedNode {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn answer(self, method: &str, result: Value) -> Self {
        self.push(method, Answer::Result(result));
        self
    }

    pub fn fail(self, method: &str, code: i64, message: &'static str) -> Self {
        self.push(method, Answer::Error(code, message));
        self
    }

    fn push(&self, method: &str, answer: Answer) {
        self.answers
            .lock()
            .unwrap()
            .entry(method.to_string())
            .or_default()
            .push_back(answer);
    }

    pub fn requests(&self, method: &str) -> Vec<JsonRpcRequest> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.method == method)
            .cloned()
            .collect()
    }

    pub fn count(&self, method: &str) -> usize {
        self.requests(method).len()
    }
}

#[async_trait]
impl RpcTransport for ScriptedNode {
    async fn send(&self, req: JsonRpcRequest) -> Result<JsonRpcResponse, TransportError> {
        self.requests.lock().unwrap().push(req.clone());
        let answer = {
            let mut answers = self.answers.lock().unwrap();
            let queue = answers
                .get_mut(&req.method)
                .ok_or_else(|| TransportError::Other(format!("unscripted method {}", req.method)))?;
            if queue.len() > 1 {
                queue.pop_front()
            } else {
                queue.front().cloned()
            }
        };
        match answer {
            Some(Answer::Result(value)) => Ok(JsonRpcResponse::success(req.id, value)),
            Some(Answer::Error(code, message)) => Ok(JsonRpcResponse::failure(
                req.id,
                JsonRpcError {
                    code,
                    message: message.to_string(),
                    data: None,
                },
            )),
            None => Err(TransportError::Other(format!("no answer for {}", req.method))),
        }
    }

    fn url(&self) -> &str {
        "scripted"
    }
}
