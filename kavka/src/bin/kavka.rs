use clap::Parser;
use kavka::cli::Cli;
use kavka::config::Config;
use kavka_broker::{Broker, TopicConfig};
use kavka_meta::MetaStore;
use kavka_observer::Observer;
use std::sync::Arc;
use tower_http::trace::{DefaultMakeSpan, TraceLayer};
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let cli = Cli::parse();
    let cfg = Config::load(&cli.config)?;

    let mut tracing_builder = kavka_tracing::TracingBuilder::default();
    if !cfg.global.logfile.is_empty() {
        tracing_builder = tracing_builder.logfile(cfg.global.logfile.clone());
    }
    let _tracing_handle = tracing_builder.build()?;

    let (driver_name, driver_params) = cfg.storage_driver();
    let store = kavka_store::from_config(driver_name, driver_params)?;

    let meta_path = std::env::var("KAVKA_META_DIR").unwrap_or_else(|_| "/var/lib/kavka/meta".to_string());
    let meta = MetaStore::open(&meta_path)?;

    let observer = Arc::new(Observer::new(meta.clone()));
    let topics_watch = observer.clone().spawn("/blobs");

    let topic_config = TopicConfig {
        allow_topics_creation: cfg.topic.allow_topics_creation,
        write_concern: cfg.topic.write_concern,
        message_retention_period: cfg.topic.message_retention_period,
        max_partition_size: cfg.topic.max_partition_size,
        max_message_size: cfg.topic.max_message_size,
        max_chunk_size: cfg.topic.max_chunk_size,
    };

    let broker = Broker::new(
        store,
        meta,
        observer,
        topic_config,
        cfg.global.hostname.clone(),
        cfg.global.group.clone(),
        cfg.global.port,
    );

    kavka_broker::cluster::register(&broker)?;

    let sync_filter = kavka_broker::syncer::filter(broker.clone(), cfg.storage.sync_pool);
    sync_filter.start().await;

    let queue_sweeper = kavka_broker::cleanup::queue::spawn(broker.clone());
    let storage_sweeper = kavka_broker::cleanup::storage::spawn(broker.clone(), cfg.storage.cleanup_period);

    let state = kavka_http::AppState::new(broker);
    let app = kavka_http::gen_router()
        .layer(TraceLayer::new_for_http().make_span_with(DefaultMakeSpan::new().level(tracing::Level::INFO)))
        .with_state(state);

    let listen_address = &cli.listen_args.listen_address.unwrap_or_else(|| {
        format!("[::]:{}", if cfg.global.port == 0 { 9000 } else { cfg.global.port })
            .parse()
            .expect("invalid fallback listen address")
    });

    let listener = tokio_listener::Listener::bind(
        listen_address,
        &Default::default(),
        &cli.listen_args.listener_options,
    )
    .await?;

    info!(listen_address = %listen_address, "starting kavka");

    tokio_listener::axum07::serve(
        listener,
        app.into_make_service_with_connect_info::<tokio_listener::SomeSocketAddrClonable>(),
    )
    .await?;

    sync_filter.stop().await;
    queue_sweeper.abort();
    storage_sweeper.abort();
    topics_watch.abort();

    Ok(())
}
