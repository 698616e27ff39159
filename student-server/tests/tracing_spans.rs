// Runs in its own binary so the thread-local subscriber sees every request span.
use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};
use std::time::Duration;

use axum::{body::Body, http::{Request, StatusCode}};
use tower::util::ServiceExt; // for `oneshot`
use tracing::{span, Subscriber};
use tracing_subscriber::{layer::{Context, SubscriberExt}, Layer};

use student_server::handlers::{router, AppState};
use student_server::repository::RepositoryFactory;
use student_server::store::InMemoryStudentStore;

/// Counts spans named "request", the name `TraceLayer::new_for_http` uses.
struct RequestSpans(Arc<AtomicUsize>);

impl<S: Subscriber> Layer<S> for RequestSpans {
    fn on_new_span(&self, attrs: &span::Attributes<'_>, _id: &span::Id, _ctx: Context<'_, S>) {
        if attrs.metadata().name() == "request" {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }
}

#[tokio::test]
async fn served_router_opens_one_request_span() {
    let count = Arc::new(AtomicUsize::new(0));
    let subscriber = tracing_subscriber::registry().with(RequestSpans(count.clone()));
    let _guard = tracing::subscriber::set_default(subscriber);

    let state = AppState {
        students: Arc::new(InMemoryStudentStore::seeded().unwrap()),
        users: RepositoryFactory::in_memory(),
        lookup_timeout: Duration::from_millis(200),
        db: None,
    };
    let resp = router(state)
        .oneshot(Request::get("/home").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(count.load(Ordering::SeqCst), 1);
}
