use clap::Parser;

use netbdd::dot::DotConfig;
use netbdd::trace::{Flow, FlowDisposition, Hop, Step};
use netbdd::trace_dag::{Node, TraceDag};

#[derive(Debug, Parser)]
#[command(author, version)]
struct Cli {
    /// Number of equal-cost next hops at every stage.
    #[arg(long, value_name = "INT", default_value = "2")]
    fanout: usize,

    /// Number of stages between the ingress and the destination.
    #[arg(long, value_name = "INT", default_value = "10")]
    depth: usize,

    /// Maximum number of traces to print.
    #[arg(long, value_name = "INT", default_value = "5")]
    limit: usize,

    /// Write the DAG in DOT format to this file.
    #[arg(long, value_name = "FILE")]
    dot: Option<std::path::PathBuf>,

    /// Logging level.
    #[arg(long, value_name = "LEVEL", default_value = "info")]
    log_level: simplelog::LevelFilter,
}

/// A network where every stage forwards to each of `fanout` routers in the
/// next stage, and the last stage delivers to the destination subnet.
fn ecmp_dag(fanout: usize, depth: usize) -> color_eyre::Result<TraceDag> {
    let flow = Flow {
        ingress_node: "ingress".to_string(),
        src_ip: "10.0.0.1".parse()?,
        dst_ip: "10.9.0.1".parse()?,
        ip_protocol: 6,
        src_port: 49152,
        dst_port: 443,
    };

    let mut nodes = Vec::new();
    let delivered = Node::leaf(
        Hop::new("dst", vec![Step::EnterInterface("eth0".to_string()), Step::Delivered]),
        None,
        FlowDisposition::DeliveredToSubnet,
        Some(flow.reverse("dst")),
    )?;
    nodes.push(delivered);

    // Ids of the previous stage, built back to front.
    let mut next_stage = vec![0];
    for stage in (0..depth).rev() {
        let mut current = Vec::new();
        for i in 0..fanout {
            let hop = Hop::new(
                format!("r{}-{}", stage, i),
                vec![
                    Step::EnterInterface("eth0".to_string()),
                    Step::Routing { next_hop: None },
                    Step::ExitInterface("eth1".to_string()),
                ],
            );
            nodes.push(Node::inner(hop, None, next_stage.clone())?);
            current.push(nodes.len() - 1);
        }
        next_stage = current;
    }

    let ingress = Hop::new("ingress", vec![Step::Originated, Step::Routing { next_hop: None }]);
    nodes.push(Node::inner(ingress, None, next_stage)?);
    let root = nodes.len() - 1;

    Ok(TraceDag::new(nodes, vec![root])?)
}

fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;

    let args = Cli::parse();

    simplelog::TermLogger::init(
        args.log_level,
        simplelog::Config::default(),
        simplelog::TerminalMode::Mixed,
        simplelog::ColorChoice::Auto,
    )?;

    println!("args = {:?}", args);

    let time_total = std::time::Instant::now();

    let dag = ecmp_dag(args.fanout.max(1), args.depth)?;
    println!("nodes: {}", dag.count_nodes());
    println!("edges: {}", dag.count_edges());
    println!("traces: {}", dag.size());

    for (i, t) in dag.traces().take(args.limit).enumerate() {
        let path: Vec<&str> = t.trace.hops.iter().map(|h| h.node.as_str()).collect();
        println!("#{} {} [{}]", i + 1, t.trace.disposition, path.join(" -> "));
        if let Some(reverse) = &t.reverse_flow {
            println!("   reverse: {}", reverse);
        }
    }

    if let Some(path) = &args.dot {
        let dot = dag.to_dot_with_config(&DotConfig {
            show_steps: true,
            ..DotConfig::default()
        })?;
        std::fs::write(path, dot)?;
        println!("DOT written to {}", path.display());
    }

    println!("Total time: {:.3} s", time_total.elapsed().as_secs_f64());
    Ok(())
}
