// ============================================================
// Layer 1 — CLI / Presentation Layer
// ============================================================
// Parses arguments with clap, hands a config to one use case
// and prints what it returns. Results go to stdout; progress
// and diagnostics go through tracing.

pub mod commands;

use anyhow::Result;
use clap::Parser;
use commands::{BertCommand, Commands, MnistCommand};

use crate::application::{mnist_use_case::*, sentiment_use_case::*};
use crate::infra::export::Manifest;

#[derive(Parser, Debug)]
#[command(
    name = "classifier-bench",
    version = "0.1.0",
    about = "Train, export and evaluate an MNIST CNN and an SST-2 BERT classifier."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    pub fn run(self) -> Result<()> {
        match self.command {
            Commands::Mnist(cmd) => run_mnist(cmd),
            Commands::Bert(cmd)  => run_bert(cmd),
        }
    }
}

fn run_mnist(cmd: MnistCommand) -> Result<()> {
    match cmd {
        MnistCommand::Train(args) => {
            tracing::info!("Training digit classifier from '{}'", args.data_dir);
            MnistTrainUseCase::new(args.into()).execute()?;
            println!("Training complete. Checkpoint saved.");
        }
        MnistCommand::Export(args) => {
            let manifest = MnistExportUseCase::new(args.into()).execute()?;
            print_exported(&manifest);
        }
        MnistCommand::Eval(args) => {
            let out = MnistEvalUseCase::new(args.into()).execute()?;
            println!("loaded test set: {:?} [{}]", out.x_shape, out.y_len);
            print_interface(&out.manifest);
            println!("Test accuracy (exported, from archive): {:.4}", out.report.accuracy());
        }
    }
    Ok(())
}

fn run_bert(cmd: BertCommand) -> Result<()> {
    match cmd {
        BertCommand::Train(args) => {
            tracing::info!("Fine-tuning '{}' on '{}'", args.pretrained_dir, args.train_file);
            let report = SentimentTrainUseCase::new(args.into()).execute()?;
            println!(
                "Final eval: eval_loss={:.4} eval_accuracy={:.4}",
                report.eval_loss, report.eval_accuracy
            );
        }
        BertCommand::Export(args) => {
            let manifest = SentimentExportUseCase::new(args.into()).execute()?;
            print_exported(&manifest);
        }
        BertCommand::Check(args) => {
            let out = SentimentCheckUseCase::new(args.into()).execute()?;
            println!("model structure: OK");
            print_interface(&out.manifest);
            for s in &out.sentences {
                println!("text:   {}", s.text);
                println!("logits: {:?}", s.prediction.logits);
                println!("probs:  {:?}", s.prediction.probabilities);
                match s.label() {
                    Some(label) => println!(
                        "pred_id: {} label: {} confidence: {:.4}",
                        s.prediction.class_index, label, s.prediction.confidence()
                    ),
                    None => println!("pred_id: {}", s.prediction.class_index),
                }
                println!("{}", "-".repeat(40));
            }
            println!("DONE");
        }
        BertCommand::Eval(args) => {
            let eval_file = args.eval_file.clone();
            let report = SentimentEvalUseCase::new(args.into()).execute()?;
            println!(
                "Accuracy (exported) on '{}': {:.4} ({}/{})",
                eval_file, report.accuracy(), report.correct, report.total
            );
        }
    }
    Ok(())
}

fn print_exported(manifest: &Manifest) {
    println!("Exported {} ({} bytes, sha256 {})", manifest.weights_file, manifest.weights_bytes, manifest.weights_sha256);
    print_interface(manifest);
}

fn print_interface(manifest: &Manifest) {
    println!("inputs:  {}", manifest.inputs.iter().map(|t| t.describe()).collect::<Vec<_>>().join(", "));
    println!("outputs: {}", manifest.outputs.iter().map(|t| t.describe()).collect::<Vec<_>>().join(", "));
}
