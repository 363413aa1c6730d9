use crate::mock::*;
use crate::*;
use callbridge::{CallBridge, CallError, CallOptions, Code, Scope, Status};
use rstest::*;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// Count the points once the client half-closed, like a RecordRoute server
fn count_on_half_close(call: Arc<MockCall<String, usize>>) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        while call.half_closes() == 0 && !call.is_closed() {
            thread::sleep(Duration::from_millis(1));
        }
        let count = call.sent.lock().unwrap().len();
        call.emit(count);
        call.close(Status::ok());
    })
}

fn assert_send<T: Send>(_: &T) {}

#[logfn]
#[rstest]
fn test_client_streaming_ok(runner: TestRunner) {
    runner.block_on(async move {
        let channel = MockChannel::new();
        let bridge = CallBridge::new(channel.clone());
        let mut route = bridge.client_streaming(&RECORD_ROUTE, CallOptions::default()).unwrap();
        let call = channel.last_call::<String, usize>();
        assert!(call.is_started());
        assert_eq!(call.requested(), 2);
        let _th = count_on_half_close(call.clone());
        for i in 0..3 {
            route.send(format!("point{}", i)).await.expect("send");
        }
        assert_eq!(route.response().await, Ok(3));
        assert_eq!(call.half_closes(), 1);
        assert_eq!(
            *call.sent.lock().unwrap(),
            vec!["point0".to_string(), "point1".to_string(), "point2".to_string()]
        );
        assert!(call.cancels().is_empty());
    });
}

#[logfn]
#[rstest]
fn test_client_streaming_wait_for_credit(runner: TestRunner) {
    runner.block_on(async move {
        let channel = MockChannel::new();
        let bridge = CallBridge::new(channel.clone());
        let route = bridge.client_streaming(&RECORD_ROUTE, CallOptions::default()).unwrap();
        let call = channel.last_call::<String, usize>();
        let (mut sender, response) = route.split();
        call.set_ready(false);
        assert!(RT::timeout(Duration::from_millis(20), sender.send("p0".to_string())).await.is_err());
        assert!(call.sent.lock().unwrap().is_empty());

        let _call = call.clone();
        thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            _call.set_ready(true);
        });
        sender.send("p1".to_string()).await.expect("send after ready");
        assert_eq!(*call.sent.lock().unwrap(), vec!["p1".to_string()]);

        let _th = count_on_half_close(call.clone());
        drop(sender);
        assert_eq!(response.await, Ok(1));
    });
}

#[logfn]
#[rstest]
fn test_client_streaming_send_after_close(runner: TestRunner) {
    runner.block_on(async move {
        let channel = MockChannel::new();
        let bridge = CallBridge::new(channel.clone());
        let mut route = bridge.client_streaming(&RECORD_ROUTE, CallOptions::default()).unwrap();
        let call = channel.last_call::<String, usize>();
        route.send("p0".to_string()).await.expect("send");
        assert!(route.close());
        assert!(!route.close());
        assert_eq!(route.send("p1".to_string()).await, Err(CallError::StreamClosed));
        assert_eq!(call.half_closes(), 1);
        let _th = count_on_half_close(call.clone());
        assert_eq!(route.response().await, Ok(1));
        assert_eq!(call.half_closes(), 1);
    });
}

#[logfn]
#[rstest]
fn test_client_streaming_server_fails_while_waiting(runner: TestRunner) {
    runner.block_on(async move {
        let channel = MockChannel::new();
        let bridge = CallBridge::new(channel.clone());
        let mut route = bridge.client_streaming(&RECORD_ROUTE, CallOptions::default()).unwrap();
        let call = channel.last_call::<String, usize>();
        call.set_ready(false);
        let _call = call.clone();
        thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            _call.close(Status::unavailable("server restarting"));
        });
        // the blocked sender is woken up by the termination
        let e = route.send("p0".to_string()).await.expect_err("terminated");
        assert_eq!(e, Code::Unavailable);
        assert_eq!(route.send("p1".to_string()).await, Err(e.clone()));
        assert_eq!(route.response().await, Err(e));
        // terminated call is not half-closed on the transport
        assert_eq!(call.half_closes(), 0);
        assert!(call.cancels().is_empty());
    });
}

#[logfn]
#[rstest]
fn test_client_streaming_dropped(runner: TestRunner) {
    runner.block_on(async move {
        let channel = MockChannel::without_cancel_echo();
        let bridge = CallBridge::new(channel.clone());
        let mut route = bridge.client_streaming(&RECORD_ROUTE, CallOptions::default()).unwrap();
        let call = channel.last_call::<String, usize>();
        route.send("p0".to_string()).await.expect("send");
        drop(route);
        assert_eq!(
            call.cancels(),
            vec![("client cancelled".to_string(), Some("client cancelled".to_string()))]
        );
        assert_eq!(call.half_closes(), 0);
    });
}

#[logfn]
#[rstest]
fn test_client_streaming_send_from_task(runner: TestRunner) {
    runner.block_on(async move {
        let channel = MockChannel::new();
        let bridge = CallBridge::new(channel.clone());
        let route = bridge.client_streaming(&RECORD_ROUTE, CallOptions::default()).unwrap();
        let call = channel.last_call::<String, usize>();
        let (mut sender, response) = route.split();
        call.set_ready(false);
        let _call = call.clone();
        thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            _call.set_ready(true);
        });
        let _th = count_on_half_close(call.clone());
        // the sends wait for credit on another worker thread
        let task = async move {
            for i in 0..3 {
                sender.send(format!("p{}", i)).await.expect("send");
            }
        };
        assert_send(&task);
        async_spawn!(task);
        assert_eq!(response.await, Ok(3));
        assert_eq!(call.half_closes(), 1);
    });
}

#[logfn]
#[rstest]
fn test_client_streaming_scope_cancel(runner: TestRunner) {
    runner.block_on(async move {
        let channel = MockChannel::new();
        let bridge = CallBridge::new(channel.clone());
        let parent = Scope::new();
        let options = CallOptions::default().with_scope(parent.child());
        let route = bridge.client_streaming(&RECORD_ROUTE, options).unwrap();
        let call = channel.last_call::<String, usize>();
        let (mut sender, response) = route.split();
        sender.send("p0".to_string()).await.expect("send");
        call.set_ready(false);
        let _parent = parent.clone();
        thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            _parent.cancel("shutdown");
        });
        // the sender blocked on credit is woken up by the cancellation
        assert_eq!(sender.send("p1".to_string()).await, Err(CallError::ScopeCancelled));
        assert_eq!(response.await, Err(CallError::ScopeCancelled));
        assert_eq!(
            call.cancels(),
            vec![("call cancelled".to_string(), Some("shutdown".to_string()))]
        );
        drop(sender);
        assert_eq!(call.half_closes(), 0);
        assert_eq!(*call.sent.lock().unwrap(), vec!["p0".to_string()]);
    });
}
