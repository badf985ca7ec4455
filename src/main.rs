use bspline_mesh::{Domain, DomainError, MeshConfig};

use clap::Parser;
use std::io::{self, BufWriter, Write};

#[derive(Parser, Debug)]
#[command(
    name = "bspline_mesh",
    version,
    about = "Build a graded mesh around a point singularity and print one of its views"
)]
struct Args {
    /// Output view: draw-neighbors, draw-plain, draw-supports, galois, gnuplot, knots or draw-tree
    #[arg(short, long)]
    view: Option<String>,
    /// Mesh shape: quadratic or rectangular
    #[arg(short, long)]
    shape: Option<String>,
    /// Edge pattern: unedged, edged-4 or edged-8
    #[arg(short, long)]
    mesh_type: Option<String>,
    /// JSON configuration file (command line values take precedence)
    #[arg(short, long)]
    config: Option<String>,
    /// Also export the whole Domain to this JSON file
    #[cfg(feature = "json_export")]
    #[arg(long)]
    json: Option<String>,
    /// Number of refinement levels
    depth: Option<usize>,
    /// B-spline order
    order: Option<usize>,
}

impl Args {
    fn mesh_config(&self) -> Result<MeshConfig, DomainError> {
        let mut config = match &self.config {
            Some(path) => MeshConfig::from_file(path)?,
            None => MeshConfig::default(),
        };

        if let Some(view) = &self.view {
            config.view = view.parse()?;
        }
        if let Some(shape) = &self.shape {
            config.shape = shape.parse()?;
        }
        if let Some(mesh_type) = &self.mesh_type {
            config.mesh_type = mesh_type.parse()?;
        }
        if let Some(depth) = self.depth {
            config.depth = depth;
        }
        if let Some(order) = self.order {
            config.order = order;
        }

        Ok(config)
    }
}

fn run(args: Args) -> Result<(), DomainError> {
    let domain = Domain::build(args.mesh_config()?)?;

    let stdout = io::stdout();
    let mut w = BufWriter::new(stdout.lock());
    domain.write_view(&mut w)?;
    w.flush()?;

    #[cfg(feature = "json_export")]
    if let Some(path) = &args.json {
        domain.export_to_json(path)?;
    }

    Ok(())
}

fn main() {
    env_logger::init();

    if let Err(err) = run(Args::parse()) {
        eprintln!("{}", err);
        std::process::exit(1);
    }
}
