use crate::rpc::NodeServiceClient;
use tarpc::tokio_serde::formats::Bincode;
use log::debug;

pub async fn setup_client(addr: &str) -> std::io::Result<NodeServiceClient> {
	debug!("connecting to {}", addr);
	let transport = tarpc::serde_transport::tcp::connect(addr, Bincode::default).await?;
	debug!("connected to {}", addr);
	Ok(NodeServiceClient::new(tarpc::client::Config::default(), transport).spawn())
}
