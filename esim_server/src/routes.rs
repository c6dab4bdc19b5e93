//! Request handler definitions
//!
//! Define each route and it handler here.
//! Handlers that are more than a line or two MUST go into a separate module. Keep this module neat and tidy 🙏
//!
//! A note about performance:
//! Since each worker thread processes its requests sequentially, handlers which block the current thread will cause the
//! current worker to stop processing new requests. Any long, non-cpu-bound operation (e.g. a catalog sync, which calls
//! every provider in turn) must be awaited, never blocked on.
use actix_web::{get, web, HttpRequest, HttpResponse, Responder};
use bytes::Bytes;
use esim_engine::{api::PaymentFlowApi, catalog::CatalogSyncOrchestrator, traits::OrchestratorDatabase};
use log::*;

use crate::{
    errors::ServerError,
    helpers::{webhook_signature, AdminToken},
};

// Web-actix cannot handle generics in handlers, so it's implemented manually using the `route!` macro
#[macro_export]
macro_rules! route {
    ($name:ident => $method:ident $path:literal impl $($bounds:ty),+) => {
        paste::paste! { pub struct [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ >( $( core::marker::PhantomData<fn() -> [< T $bounds:camel> ] >,)+ );}
        paste::paste! { impl< $( [< T $bounds:camel> ],)+ > [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ > {
            #[allow(clippy::new_without_default)]
            pub fn new() -> Self {
                Self($( core::marker::PhantomData::<fn() -> [< T $bounds:camel> ] >,)+)
            }
        }}
        paste::paste! { impl<$( [< T $bounds:camel >] , )+> actix_web::dev::HttpServiceFactory for [<$name:camel Route>]<$([<T $bounds:camel>],)+>
        where
            $([<T $bounds:camel>]: $bounds + 'static,)+
        {
            fn register(self, config: &mut actix_web::dev::AppService) {
                let res = actix_web::Resource::new($path)
                    .name(stringify!($name))
                    .guard(actix_web::guard::$method())
                    .to($name::< $( [< T $bounds:camel >], )+>);
                actix_web::dev::HttpServiceFactory::register(res, config);
            }
        }}
    };
}

// ----------------------------------------------   Health  ----------------------------------------------------
#[get("/health")]
pub async fn health() -> impl Responder {
    trace!("💻️ Received health check request");
    HttpResponse::Ok().body("👍️\n")
}

//----------------------------------------------   Catalog  ----------------------------------------------------
route!(unified_catalog => Get "/catalog" impl OrchestratorDatabase);
/// The active rows of the unified catalog, with customer prices.
pub async fn unified_catalog<B: OrchestratorDatabase>(db: web::Data<B>) -> Result<HttpResponse, ServerError> {
    trace!("💻️ GET unified catalog");
    let catalog = db.fetch_unified_catalog(true).await?;
    Ok(HttpResponse::Ok().json(catalog))
}

//----------------------------------------------   Manual sync  ------------------------------------------------
route!(manual_sync => Post "/admin/sync" impl OrchestratorDatabase);
/// Route handler for the manual sync trigger
///
/// Runs the same catalog sync pass as the scheduler and returns its report. Callers must supply the admin token in
/// the `esim_admin_token` header. While another pass (manual or scheduled) is running the request gets a 409.
pub async fn manual_sync<B: OrchestratorDatabase>(
    req: HttpRequest,
    token: web::Data<AdminToken>,
    orchestrator: web::Data<CatalogSyncOrchestrator<B>>,
) -> Result<HttpResponse, ServerError> {
    token.authorize(&req)?;
    info!("💻️ Manual catalog sync requested");
    let report = orchestrator.run_sync_pass().await?;
    debug!("💻️ Manual catalog sync complete. {} providers failed", report.failed_providers().count());
    Ok(HttpResponse::Ok().json(report))
}

//----------------------------------------------   Webhooks  ---------------------------------------------------
route!(payment_webhook => Post "/webhooks/{gateway}" impl OrchestratorDatabase);
/// Route handler for payment gateway webhooks
///
/// The body is taken as raw bytes so that the signature is checked against exactly what the gateway sent. Nothing is
/// parsed or written before the gateway has verified the signature.
pub async fn payment_webhook<B: OrchestratorDatabase>(
    req: HttpRequest,
    path: web::Path<String>,
    body: Bytes,
    api: web::Data<PaymentFlowApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let gateway = path.into_inner();
    trace!("💻️ Received {gateway} webhook ({} bytes)", body.len());
    let signature = webhook_signature(&req).ok_or_else(|| {
        debug!("💻️ {gateway} webhook has no signature header");
        ServerError::InvalidWebhookSignature
    })?;
    let outcome = api.handle_webhook(&gateway, &body, signature).await?;
    Ok(HttpResponse::Ok().json(outcome))
}
