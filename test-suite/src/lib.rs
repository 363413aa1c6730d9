pub mod mock;


extern crate captains_log;
extern crate log;
pub use callbridge::AsyncRT;
pub use captains_log::logfn;

use captains_log::*;
use rstest::*;
use std::fmt;
use std::future::Future;
use std::time::Duration;

#[cfg(feature = "tokio")]
use tokio::runtime::Runtime;

#[cfg(feature = "tokio")]
pub type RT = callbridge_tokio::TokioRT;
#[cfg(not(feature = "tokio"))]
pub type RT = callbridge_smol::SmolRT;

/// Must be called within `TestRunner::block_on()`
pub fn new_rt() -> RT {
    #[cfg(feature = "tokio")]
    {
        callbridge_tokio::TokioRT::current()
    }
    #[cfg(not(feature = "tokio"))]
    {
        callbridge_smol::SmolRT::new_global()
    }
}

#[macro_export]
macro_rules! async_spawn {
    ($f: expr) => {{
        #[cfg(feature = "tokio")]
        {
            let _ = tokio::spawn($f);
        }
        #[cfg(not(feature = "tokio"))]
        {
            let _ = smol::spawn($f).detach();
        }
    }};
}

/// Poll `cond` until it holds, panic after 5 seconds
pub async fn wait_until<F: Fn() -> bool>(what: &str, cond: F) {
    for _ in 0..5000 {
        if cond() {
            return;
        }
        RT::sleep(Duration::from_millis(1)).await;
    }
    panic!("timeout waiting for {}", what);
}

#[fixture]
pub fn runner() -> TestRunner {
    TestRunner::new()
}

impl fmt::Debug for TestRunner {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "")
    }
}

pub struct TestRunner {
    #[cfg(feature = "tokio")]
    rt: Runtime,
}

impl TestRunner {
    pub fn new() -> Self {
        recipe::raw_file_logger("/tmp/callbridge_test.log", Level::Trace)
            .test()
            .build()
            .expect("log");
        Self {
            #[cfg(feature = "tokio")]
            rt: tokio::runtime::Builder::new_multi_thread()
                .worker_threads(8)
                .enable_all()
                .build()
                .unwrap(),
        }
    }

    pub fn block_on<F: Future<Output = ()> + Send + 'static>(&self, f: F) {
        #[cfg(feature = "tokio")]
        {
            self.rt.block_on(f);
        }
        #[cfg(not(feature = "tokio"))]
        {
            smol::block_on(f);
        }
    }
}
