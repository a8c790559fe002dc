use chord_ring::{
	core::{config::Config, id_for_addr, node::Node},
	server,
	transport::tcp::TcpTransport
};
use clap::Parser;

#[derive(Parser)]
struct Args {
	/// Local addr to bind (<host>:<port>)
	addr: String,

	/// Join an existing node on init (<host>:<port>)
	#[clap(short, long)]
	join: Option<String>,

	/// Key-bit width of the ring (every member must agree)
	#[clap(short, long, default_value_t = 64)]
	bits: u32
}


#[tokio::main]
async fn main() -> anyhow::Result<()> {
	let args = Args::parse();
	let config = Config {
		num_bits: args.bits,
		..Config::default()
	};
	if config.logging {
		env_logger::init();
	}

	let id = id_for_addr(&args.addr, config.num_bits);
	let transport = TcpTransport::new(id.clone(), &args.addr, &config);
	let node = Node::new(id, config, transport.clone());

	let manager = server::serve(node.clone(), transport.clone()).await?;
	if let Some(join_addr) = args.join.as_ref() {
		let bootstrap = transport.connect_peer(join_addr).await?;
		node.join(&bootstrap).await?;
	}
	node.start_lifecycle();

	manager.wait().await?;
	Ok(())
}
