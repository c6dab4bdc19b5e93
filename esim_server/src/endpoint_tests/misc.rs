use actix_web::{http::StatusCode, test::TestRequest};

use super::helpers::TestContext;

#[actix_web::test]
async fn health_endpoint() {
    let _ = env_logger::try_init();
    let ctx = TestContext::new().await;
    let (status, body) = ctx.call(TestRequest::get().uri("/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "👍️\n");
}

#[actix_web::test]
async fn unknown_routes() {
    let _ = env_logger::try_init();
    let ctx = TestContext::new().await;
    let (status, _) = ctx.call(TestRequest::get().uri("/admin/sync")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
