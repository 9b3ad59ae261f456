use std::io::{stdout, Stdout};
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use crossterm::{
    execute,
    style::{Color, Print, ResetColor, SetForegroundColor},
};

use atrousnet_core::Tensor;
use atrousnet_io::{load_json, load_weights, save_weights};
use atrousnet_nets::{AtrousNet, AtrousNetConfig, Prediction, DEFAULT_IMAGE_SIZE};

#[derive(Parser, Debug)]
#[command(author, version, about = "AtrousNet image classifier", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the layer table for a 32x32 input
    Summary {
        #[command(flatten)]
        net: NetArgs,
    },
    /// Initialize a network and write its weights
    Init {
        #[command(flatten)]
        net: NetArgs,

        #[arg(short, long, value_name = "PATH")]
        out: PathBuf,
    },
    /// Run a forward pass and print the top class of every image
    Predict {
        #[command(flatten)]
        net: NetArgs,

        /// Checkpoint to load before running
        #[arg(short, long, value_name = "PATH")]
        weights: Option<PathBuf>,

        /// NHWC image tensor as JSON; a random batch is used when absent
        #[arg(short, long, value_name = "PATH")]
        images: Option<PathBuf>,

        /// Size of the random batch
        #[arg(long, default_value_t = 1)]
        batch_size: usize,
    },
}

#[derive(Args, Debug)]
struct NetArgs {
    /// JSON file with an AtrousNetConfig; flags override its values
    #[arg(short, long, value_name = "PATH")]
    config: Option<PathBuf>,

    #[arg(long)]
    num_classes: Option<usize>,

    #[arg(long)]
    seed: Option<u64>,

    /// softmax, sigmoid or identity
    #[arg(long)]
    prediction: Option<Prediction>,

    /// Enable dropout
    #[arg(long)]
    training: bool,

    #[arg(long)]
    keep_prob: Option<f64>,

    #[arg(long)]
    weight_decay: Option<f64>,

    /// Channels of the input images
    #[arg(long, default_value_t = 3)]
    channels: usize,
}

impl NetArgs {
    fn config(&self) -> Result<AtrousNetConfig> {
        let mut config = match &self.config {
            Some(path) => load_json(path)
                .with_context(|| format!("reading config {}", path.display()))?,
            None => AtrousNetConfig::default(),
        };
        if let Some(n) = self.num_classes {
            config.num_classes = n;
        }
        if let Some(seed) = self.seed {
            config.seed = Some(seed);
        }
        if let Some(p) = self.prediction {
            config.prediction = p;
        }
        if self.training {
            config.is_training = true;
        }
        if let Some(k) = self.keep_prob {
            config.dropout_keep_prob = k;
        }
        if let Some(wd) = self.weight_decay {
            config.weight_decay = wd;
        }
        Ok(config)
    }

    fn build(&self) -> Result<(AtrousNetConfig, AtrousNet)> {
        let config = self.config()?;
        let net = AtrousNet::new(self.channels, &config, &config.arg_scope())
            .context("building network")?;
        Ok((config, net))
    }
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    if let Err(err) = run(Cli::parse()) {
        log::error!("{:#}", err);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let mut out = stdout();
    match cli.command {
        Command::Summary { net } => {
            let (_, net) = net.build()?;
            summary(&mut out, &net)
        }
        Command::Init { net, out: path } => {
            let (_, net) = net.build()?;
            save_weights(&net.to_weights(), &path)?;
            heading(&mut out, &format!("wrote {} parameters to {}", net.num_parameters(), path.display()))
        }
        Command::Predict { net, weights, images, batch_size } => {
            let (config, mut net) = net.build()?;
            if let Some(path) = weights {
                net.load_weights(&load_weights(&path)?)
                    .with_context(|| format!("loading {}", path.display()))?;
            }
            let images = match images {
                Some(path) => load_json::<Tensor>(&path)
                    .with_context(|| format!("reading images {}", path.display()))?,
                None => {
                    if batch_size == 0 {
                        bail!("--batch-size must be positive");
                    }
                    Tensor::rand(
                        vec![batch_size, DEFAULT_IMAGE_SIZE, DEFAULT_IMAGE_SIZE, net.in_channels()],
                        config.seed,
                    )
                }
            };
            predict(&mut out, &net, &images)
        }
    }
}

fn heading(out: &mut Stdout, text: &str) -> Result<()> {
    execute!(out, SetForegroundColor(Color::Cyan), Print(text), Print("\n"), ResetColor)?;
    Ok(())
}

fn summary(out: &mut Stdout, net: &AtrousNet) -> Result<()> {
    heading(out, &format!("{} ({} classes)", net.scope(), net.num_classes()))?;
    execute!(
        out,
        SetForegroundColor(Color::DarkGrey),
        Print(format!("{:<24} {:<18} {:>10}\n", "layer", "output", "params")),
        ResetColor
    )?;
    for row in net.summary(DEFAULT_IMAGE_SIZE, DEFAULT_IMAGE_SIZE)? {
        let shape = row
            .output_shape
            .iter()
            .map(|d| d.to_string())
            .collect::<Vec<_>>()
            .join("x");
        execute!(out, Print(format!("{:<24} {:<18} {:>10}\n", row.name, shape, row.parameters)))?;
    }
    execute!(
        out,
        SetForegroundColor(Color::Green),
        Print(format!("total parameters: {}\n", net.num_parameters())),
        ResetColor
    )?;
    Ok(())
}

fn predict(out: &mut Stdout, net: &AtrousNet, images: &Tensor) -> Result<()> {
    let (_, end_points) = net.forward(images)?;
    let predictions = &end_points.predictions;
    let classes = predictions.argmax_last()?;
    let width = net.num_classes();

    heading(out, &format!("{} ({})", net.scope(), net.prediction()))?;
    for (i, &class) in classes.iter().enumerate() {
        let score = predictions.data()[i * width + class];
        execute!(
            out,
            Print(format!("image {:>3}: class ", i)),
            SetForegroundColor(Color::Green),
            Print(format!("{:>3}", class)),
            ResetColor,
            Print(format!("  {:.4}\n", score))
        )?;
    }
    Ok(())
}
