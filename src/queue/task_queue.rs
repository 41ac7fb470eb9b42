// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::task::ScrapingTask;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{Mutex, Notify};

/// 队列错误类型
#[derive(Error, Debug)]
pub enum QueueError {
    /// 队列已关闭
    #[error("queue closed")]
    Closed,
}

/// 任务队列特质
#[async_trait]
pub trait TaskQueue: Send + Sync {
    /// 入队任务
    async fn enqueue(&self, task: ScrapingTask) -> Result<(), QueueError>;

    /// 出队任务
    ///
    /// 队列为空时挂起等待，直到有任务入队或队列关闭；
    /// 队列关闭且排空后返回 `None`，消费者据此退出
    async fn dequeue(&self) -> Option<ScrapingTask>;

    /// 非阻塞出队
    async fn try_dequeue(&self) -> Option<ScrapingTask>;

    /// 关闭队列，唤醒所有等待的消费者
    async fn close(&self);

    /// 当前排队任务数
    async fn len(&self) -> usize;
}

/// 内存任务队列实现
///
/// FIFO缓冲，支持并发生产者与并发消费者。任务恰好被消费一次。
pub struct InMemoryTaskQueue {
    inner: Mutex<VecDeque<ScrapingTask>>,
    notify: Notify,
    closed: AtomicBool,
}

impl InMemoryTaskQueue {
    /// 创建新的内存任务队列实例
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(VecDeque::new()),
            notify: Notify::new(),
            closed: AtomicBool::new(false),
        }
    }
}

impl Default for InMemoryTaskQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TaskQueue for InMemoryTaskQueue {
    async fn enqueue(&self, task: ScrapingTask) -> Result<(), QueueError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(QueueError::Closed);
        }
        self.inner.lock().await.push_back(task);
        self.notify.notify_waiters();
        Ok(())
    }

    async fn dequeue(&self) -> Option<ScrapingTask> {
        loop {
            let notified = self.notify.notified();
            tokio::pin!(notified);
            // register for notifications before re-checking the queue so a
            // concurrent enqueue or close cannot be missed
            notified.as_mut().enable();

            if let Some(task) = self.try_dequeue().await {
                return Some(task);
            }
            if self.closed.load(Ordering::Acquire) {
                // one more pass: a task may have landed between the checks
                return self.try_dequeue().await;
            }
            notified.await;
        }
    }

    async fn try_dequeue(&self) -> Option<ScrapingTask> {
        self.inner.lock().await.pop_front()
    }

    async fn close(&self) {
        self.closed.store(true, Ordering::Release);
        self.notify.notify_waiters();
    }

    async fn len(&self) -> usize {
        self.inner.lock().await.len()
    }
}

#[async_trait]
impl<T: TaskQueue + ?Sized> TaskQueue for Arc<T> {
    async fn enqueue(&self, task: ScrapingTask) -> Result<(), QueueError> {
        (**self).enqueue(task).await
    }

    async fn dequeue(&self) -> Option<ScrapingTask> {
        (**self).dequeue().await
    }

    async fn try_dequeue(&self) -> Option<ScrapingTask> {
        (**self).try_dequeue().await
    }

    async fn close(&self) {
        (**self).close().await
    }

    async fn len(&self) -> usize {
        (**self).len().await
    }
}
