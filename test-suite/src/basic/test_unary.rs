use crate::mock::*;
use crate::*;
use callbridge::{CallBridge, CallError, CallOptions, CallState, Code, Metadata, Status};
use rstest::*;
use std::thread;
use std::time::Duration;

#[logfn]
#[rstest]
fn test_unary_ok(runner: TestRunner) {
    runner.block_on(async move {
        let channel = MockChannel::new();
        let bridge = CallBridge::new(channel.clone());
        let mut metadata = Metadata::new();
        metadata.insert("x-request-id", "1");
        let options = CallOptions::default().with_metadata_map(metadata);
        let resp = bridge.start_unary(&SAY_HELLO, "hello".to_string(), options).expect("open");
        let call = channel.last_call::<String, String>();
        assert!(call.is_started());
        assert_eq!(*call.sent.lock().unwrap(), vec!["hello".to_string()]);
        assert_eq!(call.half_closes(), 1);
        // one for the response, one to detect an extra one
        assert_eq!(call.requested(), 2);
        let md = call.metadata.lock().unwrap().clone().expect("started");
        assert_eq!(md.get("x-request-id"), Some("1"));

        let _th = call.serve(vec!["OK".to_string()], Status::ok());
        assert_eq!(resp.await.expect("resp"), "OK");
        assert!(call.cancels().is_empty());
        log::debug!("unary ok done");
    });
}

#[logfn]
#[rstest]
fn test_unary_call_await(runner: TestRunner) {
    runner.block_on(async move {
        let channel = MockChannel::new();
        let bridge = CallBridge::new(channel.clone());
        let _channel = channel.clone();
        thread::spawn(move || {
            // the call is opened on the first poll of the future
            while _channel.calls_opened() == 0 {
                thread::sleep(Duration::from_millis(1));
            }
            let call = _channel.last_call::<String, String>();
            let _ = call.serve(vec!["hi world".to_string()], Status::ok());
        });
        let r = bridge.unary(&SAY_HELLO, "world".to_string(), CallOptions::default()).await;
        assert_eq!(r, Ok("hi world".to_string()));
    });
}

#[logfn]
#[rstest]
fn test_unary_cancel_through_handle(runner: TestRunner) {
    runner.block_on(async move {
        let channel = MockChannel::new();
        let bridge = CallBridge::new(channel.clone());
        let resp =
            bridge.start_unary(&SAY_HELLO, "hello".to_string(), CallOptions::default()).unwrap();
        let call = channel.last_call::<String, String>();
        let canceller = resp.canceller();
        let th = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            let first = canceller.cancel("user abort");
            let second = canceller.cancel("again");
            (first, second)
        });
        match resp.await {
            Err(CallError::Cancelled(cause)) => assert_eq!(cause, "user abort"),
            r => panic!("unexpected {:?}", r),
        }
        assert_eq!(th.join().unwrap(), (true, false));
        assert_eq!(
            call.cancels(),
            vec![("client cancelled".to_string(), Some("user abort".to_string()))]
        );
        // the transport closing the cancelled call is ignored
        wait_until("cancel echo", || call.is_closed()).await;
        call.emit("late".to_string());
        assert_eq!(call.cancels().len(), 1);
    });
}

#[logfn]
#[rstest]
fn test_unary_dropped_on_timeout(runner: TestRunner) {
    runner.block_on(async move {
        let channel = MockChannel::new();
        let bridge = CallBridge::new(channel.clone());
        let resp =
            bridge.start_unary(&SAY_HELLO, "hello".to_string(), CallOptions::default()).unwrap();
        let canceller = resp.canceller();
        let call = channel.last_call::<String, String>();
        assert!(RT::timeout(Duration::from_millis(30), resp).await.is_err());
        assert_eq!(
            call.cancels(),
            vec![("client cancelled".to_string(), Some("client cancelled".to_string()))]
        );
        // the handle outlives the call without keeping it
        assert!(!canceller.cancel("too late"));
        wait_until("call released", || canceller.state().is_none()).await;
    });
}

#[logfn]
#[rstest]
fn test_unary_server_error(runner: TestRunner) {
    runner.block_on(async move {
        let channel = MockChannel::new();
        let bridge = CallBridge::new(channel.clone());
        let resp =
            bridge.start_unary(&SAY_HELLO, "hello".to_string(), CallOptions::default()).unwrap();
        let canceller = resp.canceller();
        let call = channel.last_call::<String, String>();
        let _th = call.serve(vec![], Status::unavailable("server gone"));
        let e = resp.await.expect_err("failed");
        assert_eq!(e, Code::Unavailable);
        assert_eq!(e.status().message(), "server gone");
        assert!(call.cancels().is_empty());
        assert!(!canceller.cancel("after error"));
    });
}

#[logfn]
#[rstest]
fn test_unary_no_response(runner: TestRunner) {
    runner.block_on(async move {
        let channel = MockChannel::new();
        let bridge = CallBridge::new(channel.clone());
        let resp =
            bridge.start_unary(&SAY_HELLO, "hello".to_string(), CallOptions::default()).unwrap();
        let call = channel.last_call::<String, String>();
        let _th = call.serve(vec![], Status::ok());
        let e = resp.await.expect_err("no response");
        assert_eq!(e, Code::Internal);
        assert_eq!(e.status().message(), "no response received");
    });
}

#[logfn]
#[rstest]
fn test_unary_too_many_responses(runner: TestRunner) {
    runner.block_on(async move {
        let channel = MockChannel::new();
        let bridge = CallBridge::new(channel.clone());
        let mut resp =
            bridge.start_unary(&SAY_HELLO, "hello".to_string(), CallOptions::default()).unwrap();
        let canceller = resp.canceller();
        let call = channel.last_call::<String, String>();
        let _th = call.serve(vec!["1".to_string(), "2".to_string()], Status::ok());
        let e = (&mut resp).await.expect_err("too many");
        assert_eq!(e, Code::Internal);
        assert_eq!(e.status().message(), "too many responses");
        assert_eq!(call.cancels(), vec![("too many responses".to_string(), None)]);
        // the bridge cancelled the transport call itself
        assert_eq!(canceller.state(), Some(CallState::Cancelled));
        assert!(!canceller.cancel("failed already"));
        drop(resp);
        wait_until("call released", || canceller.state().is_none()).await;
    });
}

#[logfn]
#[rstest]
fn test_unary_open_failed(runner: TestRunner) {
    runner.block_on(async move {
        let channel = MockChannel::new();
        let bridge = CallBridge::new(channel.clone());
        channel.fail_next_open(Status::unavailable("no route"));
        let r = bridge.unary(&SAY_HELLO, "hello".to_string(), CallOptions::default()).await;
        assert_eq!(r, Err(CallError::Transport(Status::unavailable("no route"))));
        assert_eq!(channel.calls_opened(), 0);
    });
}

#[logfn]
#[rstest]
fn test_unary_state_through_canceller(runner: TestRunner) {
    runner.block_on(async move {
        let channel = MockChannel::new();
        let bridge = CallBridge::new(channel.clone());
        let resp =
            bridge.start_unary(&SAY_HELLO, "hello".to_string(), CallOptions::default()).unwrap();
        let canceller = resp.canceller();
        assert_eq!(canceller.state(), Some(CallState::Active));
        let call = channel.last_call::<String, String>();
        call.emit("OK".to_string());
        call.close(Status::ok());
        assert_eq!(canceller.state(), Some(CallState::Completed));
        assert!(!canceller.cancel("completed already"));
        assert_eq!(resp.await, Ok("OK".to_string()));
        assert!(call.cancels().is_empty());
    });
}
