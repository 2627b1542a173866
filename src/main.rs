use anyhow::Result;
use chorddfs::config::Args;
use chorddfs::http;
use chorddfs::service::NodeService;
use chorddfs::storage::LocalStorageBackend;
use chorddfs::transport::HttpTransport;
use clap::Parser;
use log::info;
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    pretty_env_logger::init();

    let transport = Arc::new(HttpTransport::new(args.rpc_timeout()));
    let storage = Arc::new(LocalStorageBackend::new(&args.storage_path).await?);

    let service = NodeService::boot(&args, transport, storage).await?;
    info!(
        "node {} listening on {}",
        service.id(),
        service.address()
    );

    let _stabilizer = service.clone().run_stabilization_loop();

    let bind_address = service.address().to_string();
    http::serve(service, &bind_address).await?;

    Ok(())
}
