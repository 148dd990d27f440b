//! Election channels: a voting state machine over the base channel.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use tokio::sync::Mutex;

use crate::core_channel::attendees::Attendees;
use crate::core_channel::base::{BaseChannel, Channel};
use crate::core_channel::errors::ChannelError;
use crate::core_crypto::PublicKey;
use crate::core_protocol::messagedata::{CastVote, ElectionSetup, VotingMethod};
use crate::core_protocol::{ClientSession, ProtocolMessage, SessionId};

/// A sub-channel of a LAO holding one election.
pub struct ElectionChannel {
    base: BaseChannel,
    start_time: i64,
    end_time: i64,
    /// Set once the election ends. The `end` transition is not implemented
    /// yet, so this never flips in the current protocol surface.
    terminated: AtomicBool,
    questions: HashMap<String, Question>,
    /// Shared with the parent LAO: attendees added by later roll-calls are
    /// immediately eligible to vote.
    attendees: Arc<Attendees>,
}

/// One question of the election, with its own vote lock so concurrent votes
/// on different questions never contend.
struct Question {
    ballot_options: Vec<String>,
    method: VotingMethod,
    /// Sender identity → the vote currently held for that sender.
    valid_votes: Mutex<HashMap<String, Vote>>,
}

/// A recorded vote.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Vote {
    pub created_at: i64,
    pub indexes: Vec<usize>,
}

impl ElectionChannel {
    pub fn new(base: BaseChannel, setup: &ElectionSetup, attendees: Arc<Attendees>) -> Self {
        let questions = setup
            .questions
            .iter()
            .map(|q| {
                (
                    q.id.clone(),
                    Question {
                        ballot_options: q.ballot_options.clone(),
                        method: q.voting_method,
                        valid_votes: Mutex::new(HashMap::new()),
                    },
                )
            })
            .collect();

        Self {
            base,
            start_time: setup.start_time,
            end_time: setup.end_time,
            terminated: AtomicBool::new(false),
            questions,
            attendees,
        }
    }

    pub fn base(&self) -> &BaseChannel {
        &self.base
    }

    pub fn start_time(&self) -> i64 {
        self.start_time
    }

    pub fn end_time(&self) -> i64 {
        self.end_time
    }

    pub fn is_terminated(&self) -> bool {
        self.terminated.load(Ordering::Acquire)
    }

    /// The ballot options of a question, in setup order.
    pub fn ballot_options(&self, question_id: &str) -> Option<&[String]> {
        self.questions
            .get(question_id)
            .map(|q| q.ballot_options.as_slice())
    }

    /// Snapshot of the vote currently held for `sender` on a question.
    pub async fn vote(&self, question_id: &str, sender: &str) -> Option<Vote> {
        let question = self.questions.get(question_id)?;
        question.valid_votes.lock().await.get(sender).cloned()
    }

    /// Number of senders with a recorded vote on a question.
    pub async fn vote_count(&self, question_id: &str) -> usize {
        match self.questions.get(question_id) {
            Some(q) => q.valid_votes.lock().await.len(),
            None => 0,
        }
    }

    /// Apply a cast-vote payload.
    ///
    /// Per-question updates are independent: a failure on one question does
    /// not roll back updates already applied to earlier questions in the
    /// same message.
    async fn cast_vote(
        &self,
        message: &ProtocolMessage,
        payload: &CastVote,
    ) -> Result<(), ChannelError> {
        if payload.created_at > self.end_time {
            return Err(ChannelError::VoteTooLate {
                cast_at: payload.created_at,
                ended_at: self.end_time,
            });
        }

        let sender =
            PublicKey::from_base64(&message.sender).map_err(|_| ChannelError::InvalidSenderKey)?;
        let authorized = self.attendees.is_present(&message.sender).await
            || sender == *self.base.ctx().organizer();
        if !authorized {
            return Err(ChannelError::UnauthorizedVoter);
        }

        for entry in &payload.votes {
            let question = self
                .questions
                .get(&entry.id)
                .ok_or_else(|| ChannelError::UnknownQuestion(entry.id.clone()))?;

            let selected = entry.vote.len();
            let shape_ok = match question.method {
                VotingMethod::Plurality => selected >= 1,
                VotingMethod::Approval => selected == 1,
            };
            if !shape_ok {
                return Err(ChannelError::InvalidVoteShape {
                    method: question.method,
                    got: selected,
                });
            }

            let mut votes = question.valid_votes.lock().await;
            match votes.get(&message.sender) {
                // Of two votes by the same sender, the one with the earlier
                // creation time is kept, independent of processing order.
                Some(stored) if stored.created_at <= payload.created_at => {
                    debug!(
                        question = %entry.id,
                        sender = %message.sender,
                        "keeping earlier vote"
                    );
                }
                _ => {
                    votes.insert(
                        message.sender.clone(),
                        Vote {
                            created_at: payload.created_at,
                            indexes: entry.vote.clone(),
                        },
                    );
                }
            }
        }

        Ok(())
    }
}

#[async_trait]
impl Channel for ElectionChannel {
    async fn subscribe(&self, session: Arc<dyn ClientSession>) {
        self.base.subscribe(session).await;
    }

    async fn unsubscribe(&self, session: &SessionId) -> Result<(), ChannelError> {
        self.base.unsubscribe(session).await
    }

    async fn publish(&self, message: ProtocolMessage) -> Result<(), ChannelError> {
        let (raw, object_action) = self.base.verify_publish(&message).await?;

        match (object_action.object.as_str(), object_action.action.as_str()) {
            ("election", "cast_vote") => {
                let payload: CastVote = serde_json::from_slice(&raw)
                    .map_err(|e| ChannelError::InvalidData(format!("cast vote: {e}")))?;
                self.cast_vote(&message, &payload).await?;
                self.base.inbox().store(message.clone()).await;
                self.base.broadcast(&message).await;
                Ok(())
            }
            ("election", "end") => Err(ChannelError::NotImplemented("election#end")),
            ("election", "result") => Err(ChannelError::NotImplemented("election#result")),
            (object, action) => Err(ChannelError::InvalidAction(format!("{object}#{action}"))),
        }
    }

    async fn catchup(&self) -> Vec<ProtocolMessage> {
        self.base.catchup().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_crypto::Keypair;
    use crate::core_hub::registry::HubContext;
    use crate::core_protocol::messagedata::ElectionSetupQuestion;
    use crate::core_protocol::StructuralValidator;
    use crate::test_utils::signed_message;
    use std::time::Duration;

    const END: i64 = 1_000;

    fn setup(questions: Vec<ElectionSetupQuestion>) -> ElectionSetup {
        ElectionSetup {
            id: "el1".to_string(),
            lao: "lao1".to_string(),
            name: "board".to_string(),
            created_at: 1,
            start_time: 2,
            end_time: END,
            questions,
        }
    }

    fn question(id: &str, method: VotingMethod) -> ElectionSetupQuestion {
        ElectionSetupQuestion {
            id: id.to_string(),
            question: "?".to_string(),
            voting_method: method,
            ballot_options: vec!["a".to_string(), "b".to_string(), "c".to_string()],
            write_in: false,
        }
    }

    struct Fixture {
        organizer: Keypair,
        election: Arc<ElectionChannel>,
    }

    fn fixture(questions: Vec<ElectionSetupQuestion>) -> Fixture {
        let organizer = Keypair::generate();
        let ctx = Arc::new(HubContext::new(
            organizer.public(),
            Arc::new(StructuralValidator),
        ));
        let election = Arc::new(ElectionChannel::new(
            BaseChannel::new(Arc::clone(&ctx), "/root/lao1/el1"),
            &setup(questions),
            Arc::new(Attendees::new()),
        ));
        Fixture {
            organizer,
            election,
        }
    }

    fn cast_payload(question_id: &str, created_at: i64, vote: Vec<usize>) -> serde_json::Value {
        serde_json::json!({
            "object": "election", "action": "cast_vote",
            "lao": "lao1", "election": "el1",
            "created_at": created_at,
            "votes": [{"id": question_id, "vote": vote}]
        })
    }

    async fn attend(fx: &Fixture, kp: &Keypair) {
        fx.election.attendees.add(&kp.public().to_base64()).await;
    }

    #[tokio::test]
    async fn attendee_vote_is_recorded_and_broadcast() {
        let fx = fixture(vec![question("q1", VotingMethod::Plurality)]);
        let voter = Keypair::generate();
        attend(&fx, &voter).await;

        let msg = signed_message(&voter, &cast_payload("q1", 10, vec![0, 2]));
        fx.election.publish(msg.clone()).await.unwrap();

        let vote = fx
            .election
            .vote("q1", &voter.public().to_base64())
            .await
            .unwrap();
        assert_eq!(vote.indexes, vec![0, 2]);
        assert!(fx.election.base().inbox().contains(&msg.message_id).await);
    }

    #[tokio::test]
    async fn organizer_may_always_vote() {
        let fx = fixture(vec![question("q1", VotingMethod::Plurality)]);
        let msg = signed_message(&fx.organizer, &cast_payload("q1", 10, vec![1]));
        fx.election.publish(msg).await.unwrap();
        assert_eq!(fx.election.vote_count("q1").await, 1);
    }

    #[tokio::test]
    async fn non_attendee_is_rejected_without_storing() {
        let fx = fixture(vec![question("q1", VotingMethod::Plurality)]);
        let outsider = Keypair::generate();

        let msg = signed_message(&outsider, &cast_payload("q1", 10, vec![0]));
        let err = fx.election.publish(msg.clone()).await.unwrap_err();
        assert!(matches!(err, ChannelError::UnauthorizedVoter));
        assert_eq!(err.error_code(), -4);
        assert!(!fx.election.base().inbox().contains(&msg.message_id).await);
        assert_eq!(fx.election.vote_count("q1").await, 0);
    }

    #[tokio::test]
    async fn late_vote_is_rejected() {
        let fx = fixture(vec![question("q1", VotingMethod::Plurality)]);
        let voter = Keypair::generate();
        attend(&fx, &voter).await;

        let msg = signed_message(&voter, &cast_payload("q1", END + 1, vec![0]));
        let err = fx.election.publish(msg).await.unwrap_err();
        assert!(matches!(err, ChannelError::VoteTooLate { .. }));
    }

    // The tie-break deliberately keeps the vote with the earlier creation
    // time, not the latest one. This matches the upstream behavior exactly;
    // tests pin it so a silent "fix" to last-write-wins gets caught.
    #[tokio::test]
    async fn earlier_timestamp_wins_over_later_revote() {
        let fx = fixture(vec![question("q1", VotingMethod::Plurality)]);
        let voter = Keypair::generate();
        attend(&fx, &voter).await;
        let sender = voter.public().to_base64();

        // V1(t=10) then V2(t=5): V2 replaces V1.
        let v1 = signed_message(&voter, &cast_payload("q1", 10, vec![0]));
        fx.election.publish(v1).await.unwrap();
        let v2 = signed_message(&voter, &cast_payload("q1", 5, vec![1]));
        fx.election.publish(v2).await.unwrap();
        let vote = fx.election.vote("q1", &sender).await.unwrap();
        assert_eq!((vote.created_at, vote.indexes.clone()), (5, vec![1]));

        // V3(t=10) arrives after V2(t=5): V2 is kept.
        let v3 = signed_message(&voter, &cast_payload("q1", 10, vec![2]));
        fx.election.publish(v3).await.unwrap();
        let vote = fx.election.vote("q1", &sender).await.unwrap();
        assert_eq!((vote.created_at, vote.indexes), (5, vec![1]));
    }

    #[tokio::test]
    async fn voting_method_shapes() {
        let fx = fixture(vec![
            question("plu", VotingMethod::Plurality),
            question("app", VotingMethod::Approval),
        ]);
        let voter = Keypair::generate();
        attend(&fx, &voter).await;

        // Plurality with three indexes and Approval with one both succeed.
        let ok = signed_message(&voter, &cast_payload("plu", 10, vec![0, 1, 2]));
        fx.election.publish(ok).await.unwrap();
        let ok = signed_message(&voter, &cast_payload("app", 11, vec![1]));
        fx.election.publish(ok).await.unwrap();

        // Plurality with zero selections fails.
        let bad = signed_message(&voter, &cast_payload("plu", 12, vec![]));
        let err = fx.election.publish(bad).await.unwrap_err();
        assert!(matches!(err, ChannelError::InvalidVoteShape { got: 0, .. }));

        // Approval with two selections fails.
        let bad = signed_message(&voter, &cast_payload("app", 13, vec![0, 1]));
        let err = fx.election.publish(bad).await.unwrap_err();
        assert!(matches!(err, ChannelError::InvalidVoteShape { got: 2, .. }));
    }

    #[tokio::test]
    async fn unknown_question_fails_but_keeps_earlier_updates() {
        let fx = fixture(vec![question("q1", VotingMethod::Plurality)]);
        let voter = Keypair::generate();
        attend(&fx, &voter).await;

        let payload = serde_json::json!({
            "object": "election", "action": "cast_vote",
            "lao": "lao1", "election": "el1",
            "created_at": 10,
            "votes": [
                {"id": "q1", "vote": [0]},
                {"id": "ghost", "vote": [1]}
            ]
        });
        let msg = signed_message(&voter, &payload);
        let err = fx.election.publish(msg).await.unwrap_err();
        assert!(matches!(err, ChannelError::UnknownQuestion(_)));

        // No atomicity across questions: q1's update survives even though
        // the message itself was rejected and never stored.
        assert_eq!(fx.election.vote_count("q1").await, 1);
    }

    #[tokio::test]
    async fn end_and_result_are_explicitly_unimplemented() {
        let fx = fixture(vec![question("q1", VotingMethod::Plurality)]);
        let voter = Keypair::generate();
        attend(&fx, &voter).await;

        for action in ["end", "result"] {
            let msg = signed_message(
                &voter,
                &serde_json::json!({"object": "election", "action": action}),
            );
            let err = fx.election.publish(msg).await.unwrap_err();
            assert!(matches!(err, ChannelError::NotImplemented(_)));
        }
        assert!(!fx.election.is_terminated());
    }

    #[tokio::test]
    async fn concurrent_senders_all_land_on_one_question() {
        let fx = fixture(vec![question("q1", VotingMethod::Plurality)]);
        let mut handles = Vec::new();
        for _ in 0..16 {
            let voter = Keypair::generate();
            attend(&fx, &voter).await;
            let election = Arc::clone(&fx.election);
            handles.push(tokio::spawn(async move {
                let msg = signed_message(&voter, &cast_payload("q1", 10, vec![0]));
                election.publish(msg).await.unwrap();
            }));
        }
        for h in handles {
            h.await.unwrap();
        }
        assert_eq!(fx.election.vote_count("q1").await, 16);
    }

    #[tokio::test]
    async fn distinct_questions_do_not_share_a_lock() {
        let fx = fixture(vec![
            question("q1", VotingMethod::Plurality),
            question("q2", VotingMethod::Plurality),
        ]);
        let voter = Keypair::generate();
        attend(&fx, &voter).await;

        // Park q1's vote lock and show a q2 vote still completes.
        let q1_guard = fx.election.questions["q1"].valid_votes.lock().await;

        let msg = signed_message(&voter, &cast_payload("q2", 10, vec![0]));
        tokio::time::timeout(Duration::from_secs(1), fx.election.publish(msg))
            .await
            .expect("vote on q2 must not wait on q1's lock")
            .unwrap();

        drop(q1_guard);
        assert_eq!(fx.election.vote_count("q2").await, 1);
    }
}
