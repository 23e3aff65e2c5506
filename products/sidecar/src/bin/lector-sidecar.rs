use {
    clap::Parser,
    lector_base::{init_file_logger, init_stdout_logger, level_from_env, log, log_fatal},
    lector_decode::{Decoder, RxingDecoder},
    lector_scan::Pipeline,
    lector_sidecar::{AppState, SidecarArgs, router},
    std::sync::Arc,
};

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            log::warn!("cannot listen for ctrl-c: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                log::warn!("cannot listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    log::info!("shutdown requested");
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = SidecarArgs::parse();

    let level = level_from_env("LECTOR_LOG", log::LevelFilter::Info);
    match &args.log_dir {
        Some(dir) => init_file_logger(dir, level)?,
        None => init_stdout_logger(level),
    }

    log::info!("opening {:?} frame source", args.source);
    let source = match args.build_source() {
        Ok(source) => source,
        Err(e) => log_fatal!("{}", e),
    };

    log::info!("starting capture and decode workers");
    let decoder: Arc<dyn Decoder> = Arc::new(RxingDecoder::new());
    let mut pipeline = Pipeline::start(source, decoder, args.pipeline_config())?;

    let state = AppState::from_pipeline(&pipeline, args.server_settings());
    let stopper = state.clone();
    let app = router(state);

    let addr = args.addr();
    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(e) => {
            pipeline.shutdown();
            log_fatal!("cannot bind {}: {}", addr, e);
        }
    };
    log::info!("listening on http://{}", addr);

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            // end previews and long polls so in-flight responses can finish
            stopper.stop();
        })
        .await?;

    log::info!("stopping workers");
    pipeline.shutdown();
    Ok(())
}
