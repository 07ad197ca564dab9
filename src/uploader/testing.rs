//! In-memory transport for exercising the worker pool

use crate::uploader::error::{UploadError, UploadResult};
use crate::uploader::transport::{ChunkRequest, ChunkTransport, RemoteIdentity};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

/// What the mock saw of one request
#[derive(Debug, Clone)]
pub struct SeenRequest {
    pub filename: String,
    pub part: usize,
    pub data_len: usize,
    pub total_part: usize,
    pub folder_id: Option<String>,
    pub remote: Option<RemoteIdentity>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Start,
    End,
}

pub struct MockTransport {
    requests: Mutex<Vec<SeenRequest>>,
    /// (filename, part) -> attempts so far
    attempts: Mutex<HashMap<(String, usize), u32>>,
    /// (filename or any file, part) -> attempts that fail before one succeeds
    failures: Mutex<HashMap<(Option<String>, usize), u32>>,
    /// Start and end of every attempt, in wall-clock order
    timeline: Mutex<Vec<(String, Phase, usize)>>,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
    first_contact_active: AtomicBool,
    overlapped: AtomicBool,
    omit_identity: bool,
    authenticated: bool,
    delay: Duration,
}

impl MockTransport {
    pub fn new() -> Self {
        Self {
            requests: Mutex::new(Vec::new()),
            attempts: Mutex::new(HashMap::new()),
            failures: Mutex::new(HashMap::new()),
            timeline: Mutex::new(Vec::new()),
            in_flight: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
            first_contact_active: AtomicBool::new(false),
            overlapped: AtomicBool::new(false),
            omit_identity: false,
            authenticated: true,
            delay: Duration::from_millis(5),
        }
    }

    /// Answer the first chunk without an identity
    pub fn omit_identity(mut self) -> Self {
        self.omit_identity = true;
        self
    }

    pub fn unauthenticated(mut self) -> Self {
        self.authenticated = false;
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Fail the first `times` attempts of chunk `index` of every file
    pub fn fail_chunk(self, index: usize, times: u32) -> Self {
        self.failures.lock().unwrap().insert((None, index), times);
        self
    }

    /// Fail the first `times` attempts of chunk `index` of `filename` only
    pub fn fail_file_chunk(self, filename: &str, index: usize, times: u32) -> Self {
        self.failures
            .lock()
            .unwrap()
            .insert((Some(filename.to_string()), index), times);
        self
    }

    pub fn clear_failures(&self) {
        self.failures.lock().unwrap().clear();
    }

    pub fn clear_requests(&self) {
        self.requests.lock().unwrap().clear();
        self.attempts.lock().unwrap().clear();
        self.timeline.lock().unwrap().clear();
    }

    /// Successful requests in completion order
    pub fn requests(&self) -> Vec<SeenRequest> {
        self.requests.lock().unwrap().clone()
    }

    /// Attempts for chunk `index`, summed over all files
    pub fn attempts_for(&self, index: usize) -> u32 {
        self.attempts
            .lock()
            .unwrap()
            .iter()
            .filter(|((_, part), _)| *part == index)
            .map(|(_, n)| *n)
            .sum()
    }

    /// Start and end of each attempt of `filename`'s chunks
    pub fn timeline_for(&self, filename: &str) -> Vec<(Phase, usize)> {
        self.timeline
            .lock()
            .unwrap()
            .iter()
            .filter(|(name, _, _)| name == filename)
            .map(|(_, phase, part)| (*phase, *part))
            .collect()
    }

    pub fn peak_in_flight(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    /// Whether any request ran alongside a first-contact request
    pub fn first_contact_overlapped(&self) -> bool {
        self.overlapped.load(Ordering::SeqCst)
    }

    fn failures_for(&self, filename: &str, part: usize) -> u32 {
        let failures = self.failures.lock().unwrap();
        failures
            .get(&(Some(filename.to_string()), part))
            .or_else(|| failures.get(&(None, part)))
            .copied()
            .unwrap_or(0)
    }

    fn mark(&self, filename: &str, phase: Phase, part: usize) {
        self.timeline
            .lock()
            .unwrap()
            .push((filename.to_string(), phase, part));
    }
}

#[async_trait]
impl ChunkTransport for MockTransport {
    async fn send_chunk(&self, request: ChunkRequest) -> UploadResult<Option<RemoteIdentity>> {
        let first_contact = request.remote.is_none();
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        if self.first_contact_active.load(Ordering::SeqCst) || (first_contact && now > 1) {
            self.overlapped.store(true, Ordering::SeqCst);
        }
        if first_contact {
            self.first_contact_active.store(true, Ordering::SeqCst);
        }
        self.mark(&request.filename, Phase::Start, request.part);

        let attempt = {
            let mut attempts = self.attempts.lock().unwrap();
            let n = attempts
                .entry((request.filename.clone(), request.part))
                .or_insert(0);
            *n += 1;
            *n
        };
        tokio::time::sleep(self.delay).await;

        self.mark(&request.filename, Phase::End, request.part);
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        if first_contact {
            self.first_contact_active.store(false, Ordering::SeqCst);
        }

        if attempt <= self.failures_for(&request.filename, request.part) {
            return Err(UploadError::chunk_failed(request.part, "HTTP 500"));
        }

        self.requests.lock().unwrap().push(SeenRequest {
            filename: request.filename.clone(),
            part: request.part,
            data_len: request.data.len(),
            total_part: request.total_part,
            folder_id: request.folder_id.clone(),
            remote: request.remote.clone(),
        });

        if self.omit_identity {
            return Ok(None);
        }
        Ok(Some(
            request
                .remote
                .unwrap_or_else(|| RemoteIdentity::new("rec-1", "file-1")),
        ))
    }

    async fn has_credentials(&self) -> bool {
        self.authenticated
    }
}
