use clap::Parser;

use netbdd::ip::IpWildcard;
use netbdd::ip_space::{IpSpace, NamedIpSpaces};
use netbdd::packet::BddPacket;
use netbdd::simplifier::IpSpaceSimplifier;
use netbdd::to_bdd::IpSpaceToBdd;

#[derive(Debug, Parser)]
#[command(author, version)]
struct Cli {
    /// Included wildcards (`a.b.c.d`, `a.b.c.d/len` or `a.b.c.d:mask`).
    #[arg(long, value_name = "WILDCARD", num_args = 1..)]
    include: Vec<IpWildcard>,

    /// Excluded wildcards.
    #[arg(long, value_name = "WILDCARD", num_args = 0..)]
    exclude: Vec<IpWildcard>,
}

fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;

    simplelog::TermLogger::init(
        simplelog::LevelFilter::Debug,
        simplelog::Config::default(),
        simplelog::TerminalMode::Mixed,
        simplelog::ColorChoice::Auto,
    )?;

    let args = Cli::parse();
    println!("args = {:?}", args);

    let packet = BddPacket::default();
    let named = NamedIpSpaces::new();
    let to_bdd = IpSpaceToBdd::new(packet.bdd(), packet.dst_ip(), &named);

    let space = IpSpace::wildcard_set(args.include, args.exclude);
    let f = to_bdd.to_bdd(&space)?;
    println!("space:      {}", space);
    println!("addresses:  {}", packet.count_ips(f));

    let simplifier = IpSpaceSimplifier::new(to_bdd);
    let simplified = simplifier.simplify(&space)?;
    println!("simplified: {}", simplified);

    Ok(())
}
