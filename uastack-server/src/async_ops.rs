// Part of uastack, an OPC UA stack in Rust
// SPDX-License-Identifier: MPL-2.0

//! The asynchronous operation queue for method calls marked async.
//!
//! Operations move through three states: queued as `New`, picked up by a
//! worker as `Dispatched`, and finally a result. Results are collected into
//! an [`AsyncResponse`] per request; when its countdown reaches zero the
//! aggregated CallResponse is handed back to the connection. Workers never
//! touch the node store: the operation carries everything the handler needs,
//! and this queue has its own lock, separate from the service state.

use std::sync::Arc;
use std::time::{Duration, Instant};

use hashbrown::HashMap;
use log::{debug, warn};
use parking_lot::Mutex;

use uastack_types::{
    CallMethodRequest, CallMethodResult, CallResponse, IntegerId, NodeId, ResponseHeader,
    StatusCode, Variant,
};

/// Handler invoked by workers for async method calls:
/// `(object id, method id, inputs) -> outputs`.
pub type AsyncMethodHandler =
    Arc<dyn Fn(&NodeId, &NodeId, &[Variant]) -> Result<Vec<Variant>, StatusCode> + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OpState {
    New,
    Dispatched,
}

/// One pending async operation: a single method call of a Call request.
pub struct AsyncOperation {
    response_key: u64,
    /// Index of this operation within its request.
    index: usize,
    /// The call to perform.
    pub request: CallMethodRequest,
    state: OpState,
    deadline: Option<Instant>,
    /// The request handle, for cancellation.
    request_handle: IntegerId,
    session_id: NodeId,
}

/// Aggregates operation results for one Call request. The response is
/// sendable when `pending` reaches zero.
struct AsyncResponse {
    request_id: u32,
    request_handle: IntegerId,
    secure_channel_id: u32,
    results: Vec<Option<CallMethodResult>>,
    pending: usize,
}

/// A finished response ready to be encoded and sent on its channel.
pub struct CompletedAsyncResponse {
    /// The transport request id of the original request.
    pub request_id: u32,
    /// The channel to send on.
    pub secure_channel_id: u32,
    /// The aggregated response.
    pub response: CallResponse,
}

/// The queue of async operations and partially completed responses.
pub struct AsyncOperationQueue {
    inner: Mutex<QueueInner>,
    /// Maximum operations queued at once.
    max_queue_size: usize,
    /// Operation timeout; `None` disables the sweep.
    timeout: Option<Duration>,
}

struct QueueInner {
    next_key: u64,
    operations: Vec<AsyncOperation>,
    responses: HashMap<u64, AsyncResponse>,
    completed: Vec<CompletedAsyncResponse>,
}

impl AsyncOperationQueue {
    /// Create a queue with the given limits.
    pub fn new(max_queue_size: usize, timeout_ms: u64) -> AsyncOperationQueue {
        AsyncOperationQueue {
            inner: Mutex::new(QueueInner {
                next_key: 1,
                operations: Vec::new(),
                responses: HashMap::new(),
                completed: Vec::new(),
            }),
            max_queue_size,
            timeout: if timeout_ms == 0 {
                None
            } else {
                Some(Duration::from_millis(timeout_ms))
            },
        }
    }

    /// Queue the async operations of one Call request together with the
    /// inline results of its synchronous operations. `calls` holds an entry
    /// per operation: `Ok(result)` for already-finished synchronous calls,
    /// `Err(request)` for the asynchronous ones.
    #[allow(clippy::too_many_arguments)]
    pub fn enqueue_call(
        &self,
        request_id: u32,
        request_handle: IntegerId,
        secure_channel_id: u32,
        session_id: &NodeId,
        calls: Vec<Result<CallMethodResult, CallMethodRequest>>,
    ) -> Result<(), StatusCode> {
        let mut inner = self.inner.lock();
        let async_count = calls.iter().filter(|c| c.is_err()).count();
        if inner.operations.len() + async_count > self.max_queue_size {
            warn!("Async operation queue is full");
            return Err(StatusCode::BadTooManyOperations);
        }

        let key = inner.next_key;
        inner.next_key += 1;

        let mut results = Vec::with_capacity(calls.len());
        let deadline = self.timeout.map(|t| Instant::now() + t);
        let mut pending = 0;
        for (index, call) in calls.into_iter().enumerate() {
            match call {
                Ok(result) => results.push(Some(result)),
                Err(request) => {
                    results.push(None);
                    pending += 1;
                    inner.operations.push(AsyncOperation {
                        response_key: key,
                        index,
                        request,
                        state: OpState::New,
                        deadline,
                        request_handle,
                        session_id: session_id.clone(),
                    });
                }
            }
        }

        let response = AsyncResponse {
            request_id,
            request_handle,
            secure_channel_id,
            results,
            pending,
        };
        if pending == 0 {
            // Nothing async after all; complete immediately.
            inner.completed.push(Self::finish(response));
        } else {
            inner.responses.insert(key, response);
        }
        Ok(())
    }

    /// Take the next `New` operation for processing, marking it dispatched.
    /// Returns the operation key pair to pass to [`Self::set_result`].
    pub fn dispatch(&self) -> Option<(u64, usize, CallMethodRequest)> {
        let mut inner = self.inner.lock();
        let op = inner
            .operations
            .iter_mut()
            .find(|op| op.state == OpState::New)?;
        op.state = OpState::Dispatched;
        Some((op.response_key, op.index, op.request.clone()))
    }

    /// Post the result of a dispatched operation.
    pub fn set_result(&self, key: u64, index: usize, result: CallMethodResult) {
        let mut inner = self.inner.lock();
        inner
            .operations
            .retain(|op| !(op.response_key == key && op.index == index));
        let finished = {
            let Some(response) = inner.responses.get_mut(&key) else {
                // Response already sent, e.g. the operation timed out first
                debug!("Dropping result for completed async response {key}");
                return;
            };
            if response.results[index].is_none() {
                response.results[index] = Some(result);
                response.pending -= 1;
            }
            response.pending == 0
        };
        if finished {
            if let Some(response) = inner.responses.remove(&key) {
                inner.completed.push(Self::finish(response));
            }
        }
    }

    /// Sweep expired operations into results with `BadTimeout`. Called
    /// periodically from the server loop.
    pub fn check_timeouts(&self, now: Instant) {
        if self.timeout.is_none() {
            return;
        }
        let expired: Vec<(u64, usize)> = {
            let inner = self.inner.lock();
            inner
                .operations
                .iter()
                .filter(|op| op.deadline.is_some_and(|d| d <= now))
                .map(|op| (op.response_key, op.index))
                .collect()
        };
        for (key, index) in expired {
            self.set_result(
                key,
                index,
                CallMethodResult {
                    status_code: StatusCode::BadTimeout,
                    ..Default::default()
                },
            );
        }
    }

    /// Cancel queued operations matching the request handle of a session.
    /// Returns how many were cancelled, for the Cancel response.
    pub fn cancel(&self, session_id: &NodeId, request_handle: IntegerId) -> u32 {
        let matching: Vec<(u64, usize)> = {
            let inner = self.inner.lock();
            inner
                .operations
                .iter()
                .filter(|op| op.request_handle == request_handle && &op.session_id == session_id)
                .map(|op| (op.response_key, op.index))
                .collect()
        };
        let count = matching.len() as u32;
        for (key, index) in matching {
            self.set_result(
                key,
                index,
                CallMethodResult {
                    status_code: StatusCode::BadRequestCancelledByClient,
                    ..Default::default()
                },
            );
        }
        count
    }

    /// Cancel everything belonging to a session, e.g. on session close.
    pub fn cancel_session(&self, session_id: &NodeId, status: StatusCode) {
        let matching: Vec<(u64, usize)> = {
            let inner = self.inner.lock();
            inner
                .operations
                .iter()
                .filter(|op| &op.session_id == session_id)
                .map(|op| (op.response_key, op.index))
                .collect()
        };
        for (key, index) in matching {
            self.set_result(
                key,
                index,
                CallMethodResult {
                    status_code: status,
                    ..Default::default()
                },
            );
        }
    }

    /// Drain responses whose countdown reached zero.
    pub fn take_completed(&self) -> Vec<CompletedAsyncResponse> {
        std::mem::take(&mut self.inner.lock().completed)
    }

    fn finish(response: AsyncResponse) -> CompletedAsyncResponse {
        let results = response
            .results
            .into_iter()
            .map(|r| {
                r.unwrap_or(CallMethodResult {
                    status_code: StatusCode::BadInternalError,
                    ..Default::default()
                })
            })
            .collect();
        CompletedAsyncResponse {
            request_id: response.request_id,
            secure_channel_id: response.secure_channel_id,
            response: CallResponse {
                response_header: ResponseHeader::new_service_result(
                    response.request_handle,
                    StatusCode::Good,
                ),
                results: Some(results),
                diagnostic_infos: None,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn call(method: u32) -> CallMethodRequest {
        CallMethodRequest {
            object_id: NodeId::new(1, 100u32),
            method_id: NodeId::new(1, method),
            input_arguments: None,
        }
    }

    fn queue() -> AsyncOperationQueue {
        AsyncOperationQueue::new(16, 60_000)
    }

    #[test]
    fn response_completes_when_countdown_reaches_zero() {
        let queue = queue();
        let session = NodeId::new(1, 1u32);
        queue
            .enqueue_call(
                7,
                70,
                1,
                &session,
                vec![
                    Ok(CallMethodResult::default()),
                    Err(call(1)),
                    Err(call(2)),
                ],
            )
            .unwrap();
        assert!(queue.take_completed().is_empty());

        let (key, index, _) = queue.dispatch().unwrap();
        queue.set_result(key, index, CallMethodResult::default());
        assert!(queue.take_completed().is_empty());

        let (key, index, _) = queue.dispatch().unwrap();
        queue.set_result(key, index, CallMethodResult::default());
        let completed = queue.take_completed();
        assert_eq!(completed.len(), 1);
        assert_eq!(completed[0].request_id, 7);
        assert_eq!(completed[0].response.results.as_ref().unwrap().len(), 3);
    }

    #[test]
    fn cancel_marks_operations_cancelled() {
        let queue = queue();
        let session = NodeId::new(1, 1u32);
        queue
            .enqueue_call(8, 80, 1, &session, vec![Err(call(1))])
            .unwrap();
        assert_eq!(queue.cancel(&session, 80), 1);
        let completed = queue.take_completed();
        assert_eq!(
            completed[0].response.results.as_ref().unwrap()[0].status_code,
            StatusCode::BadRequestCancelledByClient
        );
        // Nothing left to dispatch
        assert!(queue.dispatch().is_none());
    }

    #[test]
    fn timeout_sweep_expires_operations() {
        let queue = AsyncOperationQueue::new(16, 10);
        let session = NodeId::new(1, 1u32);
        queue
            .enqueue_call(9, 90, 1, &session, vec![Err(call(1))])
            .unwrap();
        queue.check_timeouts(Instant::now() + Duration::from_millis(50));
        let completed = queue.take_completed();
        assert_eq!(
            completed[0].response.results.as_ref().unwrap()[0].status_code,
            StatusCode::BadTimeout
        );
    }
}
