use crate::mock::*;
use crate::*;
use callbridge::{CallBridge, CallError, CallOptions, Code, Status};
use futures::StreamExt;
use rstest::*;
use std::time::Duration;

fn msgs(n: usize) -> Vec<String> {
    (1..=n).map(|i| format!("m{}", i)).collect()
}

#[logfn]
#[rstest]
fn test_stream_complete(runner: TestRunner) {
    runner.block_on(async move {
        let channel = MockChannel::new();
        let bridge = CallBridge::new(channel.clone());
        let mut stream = bridge
            .server_streaming(&LIST_FEATURES, "rect".to_string(), CallOptions::default())
            .expect("open");
        let call = channel.last_call::<String, String>();
        assert_eq!(*call.sent.lock().unwrap(), vec!["rect".to_string()]);
        assert_eq!(call.half_closes(), 1);
        assert_eq!(call.requested(), 1);

        let _th = call.serve(msgs(3), Status::ok());
        let mut received = Vec::new();
        while let Some(msg) = stream.message().await.expect("recv") {
            received.push(msg);
        }
        assert_eq!(received, msgs(3));
        // ended streams stay ended
        assert_eq!(stream.message().await, Ok(None));
        assert!(call.cancels().is_empty());
        assert!(call.requested() <= 1 + 3);
    });
}

#[logfn]
#[rstest]
fn test_stream_credit_after_consume(runner: TestRunner) {
    runner.block_on(async move {
        let channel = MockChannel::new();
        let bridge = CallBridge::new(channel.clone());
        let mut stream = bridge
            .server_streaming(&LIST_FEATURES, "rect".to_string(), CallOptions::default())
            .unwrap();
        let call = channel.last_call::<String, String>();
        assert_eq!(call.requested(), 1);
        call.emit("m1".to_string());
        assert_eq!(stream.buffered_len(), 1);
        assert_eq!(stream.message().await, Ok(Some("m1".to_string())));
        // credit comes back only when the consumer asks for the next one
        assert_eq!(call.requested(), 1);
        assert!(RT::timeout(Duration::from_millis(20), stream.message()).await.is_err());
        assert_eq!(call.requested(), 2);
        call.emit("m2".to_string());
        assert_eq!(stream.message().await, Ok(Some("m2".to_string())));
        assert_eq!(call.requested(), 2);
        call.close(Status::ok());
        assert_eq!(stream.message().await, Ok(None));
        assert!(call.cancels().is_empty());
    });
}

#[logfn]
#[rstest]
fn test_stream_backpressure(runner: TestRunner) {
    runner.block_on(async move {
        let channel = MockChannel::new();
        let bridge = CallBridge::new(channel.clone());
        let options = CallOptions::default().with_initial_credit(4);
        let mut stream =
            bridge.server_streaming(&LIST_FEATURES, "rect".to_string(), options).unwrap();
        let call = channel.last_call::<String, String>();
        let _th = call.serve(msgs(20), Status::ok());
        // the server never runs ahead of the credit
        wait_until("initial credit used", || call.delivered() == 4).await;
        RT::sleep(Duration::from_millis(20)).await;
        assert_eq!(call.delivered(), 4);
        assert_eq!(stream.buffered_len(), 4);

        let received: Vec<String> = (&mut stream).map(|r| r.expect("recv")).collect().await;
        assert_eq!(received, msgs(20));
        assert!(call.cancels().is_empty());
    });
}

#[logfn]
#[rstest]
fn test_stream_zero_initial_credit(runner: TestRunner) {
    runner.block_on(async move {
        let channel = MockChannel::new();
        let bridge = CallBridge::new(channel.clone());
        let mut options = CallOptions::default();
        options.initial_credit = 0;
        let mut stream =
            bridge.server_streaming(&LIST_FEATURES, "rect".to_string(), options).unwrap();
        let call = channel.last_call::<String, String>();
        // a zero credit would never let the server deliver anything
        assert_eq!(call.requested(), 1);
        let _th = call.serve(msgs(2), Status::ok());
        let received = RT::timeout(Duration::from_secs(5), async move {
            let mut received = Vec::new();
            while let Some(msg) = stream.message().await.expect("recv") {
                received.push(msg);
            }
            received
        })
        .await
        .expect("stalled");
        assert_eq!(received, msgs(2));
        assert!(call.cancels().is_empty());
    });
}

#[logfn]
#[rstest]
fn test_stream_consumer_stops(runner: TestRunner) {
    runner.block_on(async move {
        let channel = MockChannel::new();
        let bridge = CallBridge::new(channel.clone());
        let options = CallOptions::default().with_initial_credit(2);
        let mut stream =
            bridge.server_streaming(&LIST_FEATURES, "rect".to_string(), options).unwrap();
        let call = channel.last_call::<String, String>();
        call.emit("m1".to_string());
        call.emit("m2".to_string());
        assert_eq!(stream.next().await, Some(Ok("m1".to_string())));
        drop(stream);
        assert_eq!(
            call.cancels(),
            vec![("client cancelled".to_string(), Some("client cancelled".to_string()))]
        );
        wait_until("cancel echo", || call.is_closed()).await;
        call.emit("m3".to_string());
        assert_eq!(call.delivered(), 2);
        assert_eq!(call.cancels().len(), 1);
    });
}

#[logfn]
#[rstest]
fn test_stream_error_after_messages(runner: TestRunner) {
    runner.block_on(async move {
        let channel = MockChannel::new();
        let bridge = CallBridge::new(channel.clone());
        let mut stream = bridge
            .server_streaming(&LIST_FEATURES, "rect".to_string(), CallOptions::default())
            .unwrap();
        let call = channel.last_call::<String, String>();
        let _th = call.serve(msgs(2), Status::internal("disk failure"));
        assert_eq!(stream.message().await, Ok(Some("m1".to_string())));
        assert_eq!(stream.message().await, Ok(Some("m2".to_string())));
        let e = stream.message().await.expect_err("error");
        assert_eq!(e, CallError::Transport(Status::internal("disk failure")));
        assert_eq!(stream.next().await, None);
        // already terminal, no cancel on drop
        drop(stream);
        assert!(call.cancels().is_empty());
    });
}

#[logfn]
#[rstest]
fn test_stream_cancel_through_handle(runner: TestRunner) {
    runner.block_on(async move {
        let channel = MockChannel::new();
        let bridge = CallBridge::new(channel.clone());
        let options = CallOptions::default().with_initial_credit(3);
        let mut stream =
            bridge.server_streaming(&LIST_FEATURES, "rect".to_string(), options).unwrap();
        let call = channel.last_call::<String, String>();
        call.emit("m1".to_string());
        call.emit("m2".to_string());
        assert!(stream.canceller().cancel("enough"));
        // what arrived before the cancel is still delivered, in order
        assert_eq!(stream.message().await, Ok(Some("m1".to_string())));
        assert_eq!(stream.message().await, Ok(Some("m2".to_string())));
        assert_eq!(stream.message().await, Err(CallError::Cancelled("enough".to_string())));
        assert_eq!(stream.message().await, Ok(None));
        assert_eq!(
            call.cancels(),
            vec![("client cancelled".to_string(), Some("enough".to_string()))]
        );
    });
}

#[logfn]
#[rstest]
fn test_stream_buffer_overflow(runner: TestRunner) {
    runner.block_on(async move {
        let channel = MockChannel::new();
        let bridge = CallBridge::new(channel.clone());
        let options = CallOptions::default().with_initial_credit(10).with_buffer_limit(2);
        let mut stream =
            bridge.server_streaming(&LIST_FEATURES, "rect".to_string(), options).unwrap();
        let call = channel.last_call::<String, String>();
        for msg in msgs(3) {
            call.emit(msg);
        }
        assert_eq!(call.cancels(), vec![("inbound buffer overflow".to_string(), None)]);
        // nothing is dropped, the failure comes after the buffered messages
        for msg in msgs(3) {
            assert_eq!(stream.message().await, Ok(Some(msg)));
        }
        let e = stream.message().await.expect_err("overflow");
        assert_eq!(e, Code::ResourceExhausted);
        assert_eq!(stream.message().await, Ok(None));
    });
}
