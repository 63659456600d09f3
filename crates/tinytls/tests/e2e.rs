//! End-to-end tests: a client and a server engine over an in-memory
//! channel, with the server driven by its own polling task.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tinytls::{
    Application, Engine, EngineConfig, MemoryChannel, Status, StateKey, TlsContext,
};
use tokio::sync::Notify;
use tokio::task::JoinHandle;

#[derive(Default)]
struct Collector {
    messages: Mutex<Vec<Vec<u8>>>,
    suites: Mutex<Vec<String>>,
    arrived: Notify,
}

impl Application for Collector {
    fn on_message(&self, plaintext: &[u8]) {
        self.messages.lock().unwrap().push(plaintext.to_vec());
        self.arrived.notify_one();
    }

    fn on_status(&self, status: Status, value: &str, _detail: &str) {
        if status == Status::ActiveCipherSuite {
            self.suites.lock().unwrap().push(value.to_string());
        }
    }
}

fn context() -> TlsContext {
    TlsContext::new(
        EngineConfig::builder()
            .poll_interval(Duration::from_millis(2))
            .max_connect_attempts(500)
            .connect_timeout(Duration::from_secs(10))
            .build(),
    )
    .unwrap()
}

/// Poll `engine` until it closes.
fn spawn_poller(engine: Arc<Engine>) -> JoinHandle<()> {
    tokio::spawn(async move {
        while !engine.is_closed() {
            let _ = engine.poll();
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
    })
}

struct Endpoints {
    client: Arc<Engine>,
    server: Arc<Engine>,
    client_app: Arc<Collector>,
    server_app: Arc<Collector>,
    server_task: JoinHandle<()>,
}

fn endpoints(ctx: &TlsContext, server_id: &str) -> Endpoints {
    let (client_channel, server_channel) = MemoryChannel::pair(server_id, "client");
    let client_app = Arc::new(Collector::default());
    let server_app = Arc::new(Collector::default());
    let client = Arc::new(Engine::new(ctx.clone(), client_channel, client_app.clone()));
    let server = Arc::new(Engine::new(ctx.clone(), server_channel, server_app.clone()));
    let server_task = spawn_poller(server.clone());
    Endpoints {
        client,
        server,
        client_app,
        server_app,
        server_task,
    }
}

async fn wait_for_message(app: &Collector) -> Vec<u8> {
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            if let Some(msg) = app.messages.lock().unwrap().first().cloned() {
                return msg;
            }
            app.arrived.notified().await;
        }
    })
    .await
    .expect("message did not arrive")
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_connect_report_and_deliver() {
    let ctx = context();
    let e = endpoints(&ctx, "server");

    assert!(e.client.connect().await.unwrap());
    assert!(e.client.is_finished());

    let client_suites = e.client_app.suites.lock().unwrap().clone();
    assert_eq!(client_suites.len(), 1);

    e.client.send(b"Application message").unwrap();
    let received = wait_for_message(&e.server_app).await;
    assert_eq!(received, b"Application message");
    assert_eq!(*e.server_app.suites.lock().unwrap(), client_suites);

    // Reply from the server; the client polls on its own.
    e.server.send(b"reply").unwrap();
    let client_poller = spawn_poller(e.client.clone());
    assert_eq!(wait_for_message(&e.client_app).await, b"reply");

    e.client.close().unwrap();
    tokio::time::timeout(Duration::from_secs(5), e.server_task)
        .await
        .expect("server did not see close_notify")
        .unwrap();
    assert!(e.server.is_closed());
    client_poller.await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_resume_with_new_engines() {
    let ctx = context();
    let first = endpoints(&ctx, "server");
    assert!(first.client.connect().await.unwrap());
    assert!(!first.client.is_resumed());
    let session_id = first.client.state().read().unwrap().session_id().to_vec();
    first.client.close().unwrap();
    first.server_task.await.unwrap();

    let second = endpoints(&ctx, "server");
    assert!(second.client.connect().await.unwrap());
    assert!(second.client.is_resumed());
    assert_eq!(
        second.client.state().read().unwrap().session_id(),
        session_id.as_slice()
    );
    assert!(ctx.sessions().find_state(StateKey::SessionId(&session_id)).is_some());

    second.client.send(b"again").unwrap();
    assert_eq!(wait_for_message(&second.server_app).await, b"again");
    second.client.close().unwrap();
    second.server_task.await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_connections_share_context() {
    let ctx = context();
    let mut handles = Vec::new();
    for i in 0..8 {
        let ctx = ctx.clone();
        handles.push(tokio::spawn(async move {
            let e = endpoints(&ctx, &format!("server-{i}"));
            let ok = e.client.connect().await.unwrap();
            e.client.send(format!("hello {i}").as_bytes()).unwrap();
            let msg = wait_for_message(&e.server_app).await;
            e.client.close().unwrap();
            e.server_task.await.unwrap();
            (ok, msg)
        }));
    }
    for (i, handle) in handles.into_iter().enumerate() {
        let (ok, msg) = handle.await.unwrap();
        assert!(ok);
        assert_eq!(msg, format!("hello {i}").into_bytes());
    }
    // Every engine registered its state.
    assert_eq!(ctx.sessions().len(), 16);
}
