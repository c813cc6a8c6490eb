//! Mock 后端（用于测试，无需 API）
//!
//! 按脚本依次返回预设结果；脚本用尽后重复最后一条。记录调用次数与收到的请求，便于断言重试行为与 prompt 内容。

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::llm::{GenerationBackend, ImagePayload, ImageRequest, LlmError};
use crate::prompt::Message;

type TextReply = Result<String, LlmError>;
type ImageReply = Result<Option<ImagePayload>, LlmError>;

/// Mock 后端：脚本化的文本 / 图片回复
#[derive(Debug, Default)]
pub struct MockBackend {
    text_replies: Mutex<VecDeque<TextReply>>,
    image_replies: Mutex<VecDeque<ImageReply>>,
    text_calls: AtomicUsize,
    image_calls: AtomicUsize,
    last_messages: Mutex<Vec<Message>>,
    last_image_prompt: Mutex<Option<String>>,
}

impl MockBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_text(self, reply: TextReply) -> Self {
        self.text_replies.lock().unwrap().push_back(reply);
        self
    }

    pub fn with_image(self, reply: ImageReply) -> Self {
        self.image_replies.lock().unwrap().push_back(reply);
        self
    }

    pub fn text_calls(&self) -> usize {
        self.text_calls.load(Ordering::SeqCst)
    }

    pub fn image_calls(&self) -> usize {
        self.image_calls.load(Ordering::SeqCst)
    }

    pub fn last_messages(&self) -> Vec<Message> {
        self.last_messages.lock().unwrap().clone()
    }

    pub fn last_image_prompt(&self) -> Option<String> {
        self.last_image_prompt.lock().unwrap().clone()
    }

    fn next<T: Clone>(queue: &Mutex<VecDeque<T>>, fallback: T) -> T {
        let mut q = queue.lock().unwrap();
        if q.len() > 1 {
            q.pop_front().unwrap_or(fallback)
        } else {
            q.front().cloned().unwrap_or(fallback)
        }
    }
}

#[async_trait]
impl GenerationBackend for MockBackend {
    async fn generate_text(&self, messages: &[Message]) -> Result<String, LlmError> {
        self.text_calls.fetch_add(1, Ordering::SeqCst);
        *self.last_messages.lock().unwrap() = messages.to_vec();
        Self::next(
            &self.text_replies,
            Err(LlmError::InvalidResponse("mock: no text reply scripted".into())),
        )
    }

    async fn generate_image(&self, request: &ImageRequest) -> Result<Option<ImagePayload>, LlmError> {
        self.image_calls.fetch_add(1, Ordering::SeqCst);
        *self.last_image_prompt.lock().unwrap() = Some(request.prompt.clone());
        Self::next(&self.image_replies, Ok(None))
    }
}
