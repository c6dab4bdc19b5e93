use std::sync::atomic::Ordering;

use actix_web::{http::StatusCode, test::TestRequest};
use esim_engine::{catalog::CatalogSyncReport, db_types::UnifiedPackage};

use super::helpers::{package, register_static, TestContext, ADMIN_TOKEN};
use crate::helpers::ADMIN_TOKEN_HEADER;

fn sync_request(token: Option<&str>) -> TestRequest {
    let req = TestRequest::post().uri("/admin/sync");
    match token {
        Some(t) => req.insert_header((ADMIN_TOKEN_HEADER, t)),
        None => req,
    }
}

#[actix_web::test]
async fn manual_sync_requires_the_admin_token() {
    let _ = env_logger::try_init();
    let ctx = TestContext::new().await;
    let provider = ctx.add_provider("alpha").await;
    let calls = register_static(&ctx.providers, &ctx.db, provider, Some(vec![package("a-1", "FR", 450)]));

    let (status, body) = ctx.call(sync_request(None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body, r#"{"error":"Missing or invalid admin token"}"#);

    let (status, _) = ctx.call(sync_request(Some("guess"))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[actix_web::test]
async fn manual_sync_runs_a_full_pass() {
    let _ = env_logger::try_init();
    let ctx = TestContext::new().await;
    let alpha = ctx.add_provider("alpha").await;
    let beta = ctx.add_provider("beta").await;
    let alpha_calls = register_static(&ctx.providers, &ctx.db, alpha, Some(vec![package("a-1", "FR", 450)]));
    let beta_calls = register_static(&ctx.providers, &ctx.db, beta, None);

    let (status, body) = ctx.call(sync_request(Some(ADMIN_TOKEN))).await;
    assert_eq!(status, StatusCode::OK);
    let report: CatalogSyncReport = serde_json::from_str(&body).expect("Not a sync report");
    assert!(report.success);
    assert_eq!(report.providers.len(), 2);
    let alpha = report.providers.iter().find(|p| p.provider == "alpha").unwrap();
    assert!(alpha.success);
    assert_eq!(alpha.packages_synced, 1);
    let beta = report.providers.iter().find(|p| p.provider == "beta").unwrap();
    assert!(!beta.success);
    assert!(beta.error_message.as_deref().unwrap().contains("connection reset"));
    assert_eq!(alpha_calls.load(Ordering::SeqCst), 1);
    assert_eq!(beta_calls.load(Ordering::SeqCst), 1);

    let (status, body) = ctx.call(TestRequest::get().uri("/catalog")).await;
    assert_eq!(status, StatusCode::OK);
    let catalog: Vec<UnifiedPackage> = serde_json::from_str(&body).expect("Not a catalog");
    assert_eq!(catalog.len(), 1);
    assert_eq!(catalog[0].destination, "FR");
    assert_eq!(catalog[0].customer_price.value(), 450);
}
