// Scriptable in-memory authority.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use game_sync::authority::{ActionReceipt, ActionRequest, Authority, QueuedAction};
use game_sync::domain::{ActionId, GameSnapshot};
use game_sync::error::AuthorityError;

#[derive(Default)]
struct Script {
    snapshot: Option<GameSnapshot>,
    fetch_failing: bool,
    fetch_calls: u32,
    queue: Option<Vec<QueuedAction>>,
    submit_replies: VecDeque<Result<ActionReceipt, AuthorityError>>,
    submitted: Vec<ActionRequest>,
}

#[derive(Default)]
pub struct FakeAuthority {
    script: Mutex<Script>,
}

impl FakeAuthority {
    pub fn serving(snapshot: GameSnapshot) -> Self {
        let authority = Self::default();
        authority.set_snapshot(snapshot);
        authority
    }

    pub fn set_snapshot(&self, snapshot: GameSnapshot) {
        self.script.lock().unwrap().snapshot = Some(snapshot);
    }

    pub fn set_fetch_failing(&self, failing: bool) {
        self.script.lock().unwrap().fetch_failing = failing;
    }

    pub fn set_queue(&self, queue: Option<Vec<QueuedAction>>) {
        self.script.lock().unwrap().queue = queue;
    }

    /// Queue a reply for the next submission; unscripted submissions are accepted.
    pub fn reply_next(&self, reply: Result<ActionReceipt, AuthorityError>) {
        self.script.lock().unwrap().submit_replies.push_back(reply);
    }

    pub fn fetch_calls(&self) -> u32 {
        self.script.lock().unwrap().fetch_calls
    }

    pub fn submitted(&self) -> Vec<ActionRequest> {
        self.script.lock().unwrap().submitted.clone()
    }
}

#[async_trait]
impl Authority for FakeAuthority {
    async fn fetch_snapshot(&self, _game_code: &str) -> Result<GameSnapshot, AuthorityError> {
        let mut script = self.script.lock().unwrap();
        script.fetch_calls += 1;
        if script.fetch_failing {
            return Err(AuthorityError::network("connection refused"));
        }
        script
            .snapshot
            .clone()
            .ok_or_else(|| AuthorityError::network("no snapshot scripted"))
    }

    async fn submit_action(&self, request: &ActionRequest) -> Result<ActionReceipt, AuthorityError> {
        let mut script = self.script.lock().unwrap();
        script.submitted.push(request.clone());
        let n = script.submitted.len();
        script.submit_replies.pop_front().unwrap_or_else(|| {
            Ok(ActionReceipt {
                action_id: ActionId::from(format!("srv-{n}")),
            })
        })
    }

    async fn fetch_action_queue(
        &self,
        _game_code: &str,
    ) -> Result<Option<Vec<QueuedAction>>, AuthorityError> {
        Ok(self.script.lock().unwrap().queue.clone())
    }
}
