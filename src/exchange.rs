//! The request/acknowledge/result exchange on one connection.

use core::fmt;
use std::time::Duration;

use crate::error::{Error, Result};
use crate::protocol::{CommandId, RequestEnvelope, ResultEnvelope, parse_ack};
use crate::transport::FrameTransport;

/// Default bound on each of the two waits.
pub const DEFAULT_REPLY_TIMEOUT: Duration = Duration::from_secs(5);

/// Bounds on the acknowledgment and result waits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    /// Wait for the acknowledgment frame.
    pub ack: Duration,
    /// Wait for the result frame, starting once the acknowledgment is accepted.
    pub result: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            ack: DEFAULT_REPLY_TIMEOUT,
            result: DEFAULT_REPLY_TIMEOUT,
        }
    }
}

/// Progress of an exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExchangeState {
    /// Nothing sent yet.
    Idle,
    /// Request frame written.
    Sent,
    /// Waiting for the acknowledgment.
    AwaitingAck,
    /// Acknowledgment accepted.
    Acked,
    /// Waiting for the result.
    AwaitingResult,
    /// Result received.
    Completed,
    /// The exchange ended with an error.
    Failed,
}

impl ExchangeState {
    fn is_terminal(self) -> bool {
        matches!(self, ExchangeState::Completed | ExchangeState::Failed)
    }
}

impl fmt::Display for ExchangeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// One request and its two replies over a transport the exchange owns.
///
/// The transport is closed when the exchange finishes, whatever the outcome, and is
/// never handed back.
pub struct Exchange<T: FrameTransport> {
    transport: T,
    timeouts: Timeouts,
    state: ExchangeState,
}

impl<T: FrameTransport> Exchange<T> {
    /// Start an exchange on `transport`.
    pub fn new(transport: T, timeouts: Timeouts) -> Self {
        Self {
            transport,
            timeouts,
            state: ExchangeState::Idle,
        }
    }

    /// Current state.
    pub fn state(&self) -> ExchangeState {
        self.state
    }

    /// Send `envelope`, wait for the accepted acknowledgment, then wait for the result.
    ///
    /// The connection is closed afterwards; a failure to close is logged and does not
    /// change the outcome.
    pub async fn run(mut self, envelope: &RequestEnvelope) -> Result<ResultEnvelope> {
        let outcome = self.drive(envelope).await;
        if outcome.is_err() {
            self.advance(ExchangeState::Failed);
        }

        if let Err(e) = self.transport.close().await {
            crate::debug::note("exchange", &format!("close failed: {e}"));
        }

        outcome
    }

    async fn drive(&mut self, envelope: &RequestEnvelope) -> Result<ResultEnvelope> {
        let expected_id = envelope.command_id();
        let frame = envelope.to_json()?;

        crate::debug::dump_frame("request", &frame);
        self.transport.send_text(&frame).await?;
        self.advance(ExchangeState::Sent);

        self.advance(ExchangeState::AwaitingAck);
        let ack_frame = self
            .next_frame(self.timeouts.ack, Error::AckTimeout(self.timeouts.ack))
            .await?;
        crate::debug::dump_frame("ack", &ack_frame);
        let ack = parse_ack(&ack_frame)?;
        check_correlation(expected_id, ack.command_id.as_deref());
        self.advance(ExchangeState::Acked);

        self.advance(ExchangeState::AwaitingResult);
        let result_frame = self
            .next_frame(
                self.timeouts.result,
                Error::ResultTimeout(self.timeouts.result),
            )
            .await?;
        crate::debug::dump_frame("result", &result_frame);
        let result = ResultEnvelope::from_json(&result_frame)?;
        check_correlation(expected_id, result.command_id());
        self.advance(ExchangeState::Completed);

        Ok(result)
    }

    async fn next_frame(&mut self, limit: Duration, on_timeout: Error) -> Result<String> {
        match tokio::time::timeout(limit, self.transport.recv_text()).await {
            Ok(frame) => frame,
            Err(_elapsed) => Err(on_timeout),
        }
    }

    fn advance(&mut self, next: ExchangeState) {
        debug_assert!(
            !self.state.is_terminal(),
            "exchange already finished in {}",
            self.state
        );
        crate::debug::note("exchange", &format!("{} -> {}", self.state, next));
        self.state = next;
    }
}

/// Replies are matched by order alone; an echoed id that differs is only reported.
fn check_correlation(expected: CommandId, echoed: Option<&str>) {
    let Some(echoed) = echoed else {
        return;
    };
    if echoed.parse::<CommandId>().ok() != Some(expected) {
        crate::observe::correlation_mismatch(&expected.to_string(), echoed);
    }
}

#[cfg(test)]
mod tests {
    use core::num::NonZeroU32;
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    use uuid::Uuid;

    use super::*;
    use crate::format::result_pairs;
    use crate::protocol::build_envelope_at;
    use crate::transport::TransportFuture;
    use crate::types::{Command, Target};

    #[derive(Debug, Default)]
    struct Script {
        replies: VecDeque<Reply>,
        sent: Vec<String>,
        recv_calls: usize,
        closed: bool,
    }

    #[derive(Debug)]
    enum Reply {
        Frame(&'static str),
        Closed,
        Silence,
    }

    #[derive(Debug, Clone, Default)]
    struct MockTransport(Arc<Mutex<Script>>);

    impl MockTransport {
        fn with_replies(replies: impl IntoIterator<Item = Reply>) -> Self {
            let mock = Self::default();
            mock.0.lock().expect("lock").replies.extend(replies);
            mock
        }

        fn script(&self) -> std::sync::MutexGuard<'_, Script> {
            self.0.lock().expect("lock")
        }
    }

    impl FrameTransport for MockTransport {
        fn send_text<'a>(&'a mut self, frame: &'a str) -> TransportFuture<'a, ()> {
            self.script().sent.push(frame.to_string());
            Box::pin(async { Ok(()) })
        }

        fn recv_text(&mut self) -> TransportFuture<'_, String> {
            let reply = {
                let mut script = self.script();
                script.recv_calls += 1;
                script.replies.pop_front().unwrap_or(Reply::Silence)
            };
            Box::pin(async move {
                match reply {
                    Reply::Frame(text) => Ok(text.to_string()),
                    Reply::Closed => Err(Error::ConnectionClosed),
                    Reply::Silence => std::future::pending().await,
                }
            })
        }

        fn close(&mut self) -> TransportFuture<'_, ()> {
            self.script().closed = true;
            Box::pin(async { Ok(()) })
        }
    }

    fn envelope() -> RequestEnvelope {
        build_envelope_at(
            &Target::new("bdc88ee7-f98b-46e9-9ea4-7fe3c69775a8", "IPBased_NXODMDEMO2"),
            Command::new("getDeviceInfo"),
            NonZeroU32::MIN,
            Uuid::new_v4(),
            1_700_000_000,
        )
    }

    #[tokio::test]
    async fn accepted_then_result_completes() {
        let mock = MockTransport::with_replies([
            Reply::Frame(r#"{"params":{"commandState":"ACCEPTED"}}"#),
            Reply::Frame(r#"{"params":{"commandAcks":[{"result":{"fwVersion":"1.0.1"}}]}}"#),
        ]);

        let request = envelope();
        let result = Exchange::new(mock.clone(), Timeouts::default())
            .run(&request)
            .await
            .expect("exchange");

        assert_eq!(
            result_pairs(&result),
            vec![("fwVersion".to_string(), "1.0.1".to_string())]
        );

        let script = mock.script();
        assert_eq!(script.sent.len(), 1);
        assert_eq!(script.sent[0], request.to_json().expect("json"));
        assert!(script.closed);
    }

    #[tokio::test]
    async fn mismatched_or_odd_command_ids_do_not_change_outcome() {
        let mock = MockTransport::with_replies([
            Reply::Frame(r#"{"params":{"commandState":"ACCEPTED","commandId":7}}"#),
            Reply::Frame(
                r#"{"params":{"commandId":"other|9","commandAcks":[{"result":{"fwVersion":"1.0.1"}}]}}"#,
            ),
        ]);

        let result = Exchange::new(mock.clone(), Timeouts::default())
            .run(&envelope())
            .await
            .expect("exchange");

        assert_eq!(
            result_pairs(&result),
            vec![("fwVersion".to_string(), "1.0.1".to_string())]
        );
        assert!(mock.script().closed);
    }

    #[tokio::test]
    async fn missing_command_state_stops_before_second_read() {
        let mock = MockTransport::with_replies([
            Reply::Frame(r#"{"params":{}}"#),
            Reply::Frame(r#"{"params":{"commandAcks":[]}}"#),
        ]);

        let mut exchange = Exchange::new(mock.clone(), Timeouts::default());
        let err = exchange.drive(&envelope()).await.expect_err("not accepted");
        assert!(matches!(err, Error::NotAccepted { ref payload } if payload == r#"{"params":{}}"#));
        assert_eq!(exchange.state(), ExchangeState::AwaitingAck);
        let script = mock.script();
        assert_eq!(script.recv_calls, 1);
        assert_eq!(script.replies.len(), 1);
    }

    #[tokio::test]
    async fn rejected_ack_closes_connection() {
        let mock = MockTransport::with_replies([Reply::Frame(
            r#"{"params":{"commandState":"REJECTED"}}"#,
        )]);

        let err = Exchange::new(mock.clone(), Timeouts::default())
            .run(&envelope())
            .await
            .expect_err("rejected");
        assert!(matches!(err, Error::NotAccepted { .. }));

        let script = mock.script();
        assert_eq!(script.recv_calls, 1);
        assert!(script.closed);
    }

    #[tokio::test(start_paused = true)]
    async fn silent_module_times_out_waiting_for_ack() {
        let mock = MockTransport::with_replies([Reply::Silence]);

        let started = tokio::time::Instant::now();
        let err = Exchange::new(mock.clone(), Timeouts::default())
            .run(&envelope())
            .await
            .expect_err("timeout");

        assert!(matches!(err, Error::AckTimeout(d) if d == Duration::from_secs(5)));
        assert!(started.elapsed() >= Duration::from_secs(5));
        assert!(mock.script().closed);
    }

    #[tokio::test(start_paused = true)]
    async fn silent_after_ack_times_out_waiting_for_result() {
        let mock = MockTransport::with_replies([
            Reply::Frame(r#"{"params":{"commandState":"ACCEPTED"}}"#),
            Reply::Silence,
        ]);

        let timeouts = Timeouts {
            ack: Duration::from_secs(5),
            result: Duration::from_secs(2),
        };
        let err = Exchange::new(mock.clone(), timeouts)
            .run(&envelope())
            .await
            .expect_err("timeout");

        assert!(matches!(err, Error::ResultTimeout(d) if d == Duration::from_secs(2)));
        assert_eq!(mock.script().recv_calls, 2);
    }

    #[tokio::test]
    async fn undecodable_result_is_a_protocol_error() {
        let mock = MockTransport::with_replies([
            Reply::Frame(r#"{"params":{"commandState":"ACCEPTED"}}"#),
            Reply::Frame("garbage"),
        ]);

        let err = Exchange::new(mock, Timeouts::default())
            .run(&envelope())
            .await
            .expect_err("decode");
        assert!(matches!(err, Error::ProtocolDecode(_)));
    }

    #[tokio::test]
    async fn peer_close_before_ack() {
        let mock = MockTransport::with_replies([Reply::Closed]);

        let mut exchange = Exchange::new(mock, Timeouts::default());
        let err = exchange.drive(&envelope()).await.expect_err("closed");
        assert!(matches!(err, Error::ConnectionClosed));
    }

    #[tokio::test]
    async fn state_walks_the_happy_path() {
        let mock = MockTransport::with_replies([
            Reply::Frame(r#"{"params":{"commandState":"ACCEPTED"}}"#),
            Reply::Frame(r#"{"params":{}}"#),
        ]);

        let mut exchange = Exchange::new(mock, Timeouts::default());
        assert_eq!(exchange.state(), ExchangeState::Idle);
        exchange.drive(&envelope()).await.expect("exchange");
        assert_eq!(exchange.state(), ExchangeState::Completed);
    }
}
